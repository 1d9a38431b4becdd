//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, TimeZone, Utc};
use scheduler_domain::entities::{Priority, ScheduleDefinition, TaskEnvelope, TaskMetadata};
use scheduler_domain::value_objects::RecurrenceRule;
use serde_json::{Map, Value};

/// Fixed instant used as the default creation time so builders stay deterministic
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Builder for creating test TaskEnvelope entities
pub struct EnvelopeBuilder {
    envelope: TaskEnvelope,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            envelope: TaskEnvelope::new(
                "test_task",
                "test.noop",
                Priority::Normal,
                Map::new(),
                TaskMetadata {
                    created_at: fixed_time(),
                    retry_count: 0,
                    max_retries: 3,
                    user_id: None,
                },
            ),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.envelope.id = id.to_string();
        self
    }

    pub fn with_type(mut self, task_type: &str) -> Self {
        self.envelope.task_type = task_type.to_string();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.envelope.priority = priority;
        self
    }

    pub fn with_payload_field(mut self, key: &str, value: Value) -> Self {
        self.envelope.payload.insert(key.to_string(), value);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.envelope.metadata.retry_count = retry_count;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.envelope.metadata.max_retries = max_retries;
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.envelope.metadata.user_id = Some(user_id.to_string());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.envelope.metadata.created_at = created_at;
        self
    }

    pub fn build(self) -> TaskEnvelope {
        self.envelope
    }
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ScheduleDefinition entities
pub struct ScheduleBuilder {
    schedule: ScheduleDefinition,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self {
            schedule: ScheduleDefinition::new("schedule_1", "user_1", true, "*/5 * * * *", None),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.schedule.id = id.to_string();
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.schedule.user_id = user_id.to_string();
        self
    }

    pub fn with_cron(mut self, cron_expression: &str) -> Self {
        self.schedule.recurrence = RecurrenceRule::parse(cron_expression);
        self
    }

    pub fn last_executed(mut self, at: DateTime<Utc>) -> Self {
        self.schedule.last_executed = Some(at);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.schedule.is_active = false;
        self
    }

    pub fn build(self) -> ScheduleDefinition {
        self.schedule
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
