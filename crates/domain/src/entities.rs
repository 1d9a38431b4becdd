use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use scheduler_errors::{SchedulerError, SchedulerResult};

use crate::value_objects::RecurrenceRule;

/// 任务优先级
///
/// 每个优先级对应唯一的队列 `{priority}_tasks`，处理顺序为
/// critical → high → normal → low。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    /// 按处理顺序排列的全部优先级
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// 目标队列名称
    pub fn queue_name(&self) -> String {
        format!("{}_tasks", self.as_str())
    }
}

/// 优先级到队列名称的映射，对四个取值是全函数
pub fn queue_for_priority(priority: Priority) -> String {
    priority.queue_name()
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(SchedulerError::UnknownPriority(s.to_string())),
        }
    }
}

/// 任务元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 任务信封：分发的基本单位
///
/// 信封从不原地修改，重试时发送一份 `retry_count + 1` 的副本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// 调用方生成的ID，用于幂等与日志关联，代理不保证唯一
    pub id: String,
    /// 处理器类型，点号分隔的命名空间，例如 `home_assistant.scheduled_action`
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: Priority,
    /// 处理器私有数据，调度器不会读取
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub metadata: TaskMetadata,
}

impl TaskEnvelope {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        priority: Priority,
        payload: Map<String, Value>,
        metadata: TaskMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            priority,
            payload,
            metadata,
        }
    }

    /// 生成 `{type}_{sourceId}_{epochMillis}` 形式的ID
    pub fn generate_id(task_type: &str, source_id: &str, at: DateTime<Utc>) -> String {
        format!("{}_{}_{}", task_type, source_id, at.timestamp_millis())
    }

    pub fn queue_name(&self) -> String {
        self.priority.queue_name()
    }

    pub fn can_retry(&self) -> bool {
        self.metadata.retry_count < self.metadata.max_retries
    }

    /// 重试副本：ID与其余字段不变，`retry_count` 加一
    pub fn retry_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.metadata.retry_count = self.metadata.retry_count.saturating_add(1);
        copy
    }
}

/// 消息代理返回的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub msg_id: i64,
    /// 被读取的次数
    pub read_ct: i32,
    pub enqueued_at: DateTime<Utc>,
    /// 重新可见的时间
    pub vt: DateTime<Utc>,
    pub message: TaskEnvelope,
}

/// 调度定义：用户维护的周期规则
///
/// 周期表达式在加载时解析为 [`RecurrenceRule`]，序列化时仍使用 `cron_expression` 文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    #[serde(rename = "cron_expression")]
    pub recurrence: RecurrenceRule,
    pub last_executed: Option<DateTime<Utc>>,
}

impl ScheduleDefinition {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        is_active: bool,
        cron_expression: &str,
        last_executed: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            is_active,
            recurrence: RecurrenceRule::parse(cron_expression),
            last_executed,
        }
    }
}

/// 任务执行日志，每次执行尝试写入一条，只追加不更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub task_id: String,
    pub task_type: String,
    pub priority: Priority,
    pub success: bool,
    pub execution_time_ms: u64,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl TaskLogEntry {
    pub fn for_attempt(
        envelope: &TaskEnvelope,
        success: bool,
        execution_time_ms: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: envelope.id.clone(),
            task_type: envelope.task_type.clone(),
            priority: envelope.priority,
            success,
            execution_time_ms,
            retry_count: envelope.metadata.retry_count,
            created_at,
        }
    }
}

/// 单个队列的处理统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueReport {
    pub queue: String,
    pub processed: usize,
}

/// 一次 `process_queues` 的处理结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub requeued: usize,
    pub queues: Vec<QueueReport>,
}
