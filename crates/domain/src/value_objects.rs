use std::fmt;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::TaskEnvelope;

/// 周期规则
///
/// 只支持固定的几种形式，不是完整的cron解析器。调度定义加载时解析一次，
/// 之后通过 match 判断是否到期。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecurrenceRule {
    /// `*/n * * * *`
    EveryNMinutes(u32),
    /// `0 * * * *` / `@hourly`
    Hourly,
    /// `m h * * *` / `@daily` / `@midnight`
    DailyAt { hour: u32, minute: u32 },
    /// 无法识别的表达式，保留原文用于日志
    Unrecognized(String),
}

impl RecurrenceRule {
    pub fn parse(expression: &str) -> Self {
        let raw = expression.trim();
        match raw {
            "@hourly" => return RecurrenceRule::Hourly,
            "@daily" | "@midnight" => return RecurrenceRule::DailyAt { hour: 0, minute: 0 },
            _ => {}
        }

        let fields: Vec<&str> = raw.split_whitespace().collect();
        if let [minute, hour, "*", "*", "*"] = fields.as_slice() {
            if let Some(rule) = Self::parse_minute_hour(minute, hour) {
                return rule;
            }
        }

        RecurrenceRule::Unrecognized(raw.to_string())
    }

    fn parse_minute_hour(minute: &str, hour: &str) -> Option<Self> {
        if hour == "*" {
            if minute == "*" {
                return Some(RecurrenceRule::EveryNMinutes(1));
            }
            if minute == "0" {
                return Some(RecurrenceRule::Hourly);
            }
            let step = minute.strip_prefix("*/")?.parse::<u32>().ok()?;
            return (1..=59)
                .contains(&step)
                .then_some(RecurrenceRule::EveryNMinutes(step));
        }

        let minute = minute.parse::<u32>().ok()?;
        let hour = hour.parse::<u32>().ok()?;
        (minute < 60 && hour < 24).then_some(RecurrenceRule::DailyAt { hour, minute })
    }

    /// 已有上次执行时间时使用的最小间隔
    ///
    /// 无法识别的规则按每小时处理。
    pub fn threshold(&self) -> Duration {
        match self {
            RecurrenceRule::EveryNMinutes(n) => Duration::minutes(i64::from(*n)),
            RecurrenceRule::Hourly | RecurrenceRule::Unrecognized(_) => Duration::hours(1),
            RecurrenceRule::DailyAt { .. } => Duration::hours(24),
        }
    }

    /// 没有上次执行时间时，检查 `now` 是否落在规则的触发刻度上
    pub fn matches_tick(&self, now: DateTime<Utc>) -> bool {
        let minute = now.minute();
        let hour = now.hour();
        match self {
            RecurrenceRule::EveryNMinutes(n) => *n > 0 && minute % n == 0,
            RecurrenceRule::Hourly => minute == 0,
            RecurrenceRule::DailyAt {
                hour: at_hour,
                minute: at_minute,
            } => hour == *at_hour && minute == *at_minute,
            RecurrenceRule::Unrecognized(_) => false,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, RecurrenceRule::Unrecognized(_))
    }

    /// 规则对应的cron文本，`@hourly` 等别名输出为等价的五段式
    pub fn expression(&self) -> String {
        match self {
            RecurrenceRule::EveryNMinutes(n) => format!("*/{n} * * * *"),
            RecurrenceRule::Hourly => "0 * * * *".to_string(),
            RecurrenceRule::DailyAt { hour, minute } => format!("{minute} {hour} * * *"),
            RecurrenceRule::Unrecognized(raw) => raw.clone(),
        }
    }
}

impl From<String> for RecurrenceRule {
    fn from(expression: String) -> Self {
        RecurrenceRule::parse(&expression)
    }
}

impl From<RecurrenceRule> for String {
    fn from(rule: RecurrenceRule) -> Self {
        rule.expression()
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::EveryNMinutes(n) => write!(f, "every {n} minutes"),
            RecurrenceRule::Hourly => f.write_str("hourly"),
            RecurrenceRule::DailyAt { hour, minute } => {
                write!(f, "daily at {hour:02}:{minute:02} UTC")
            }
            RecurrenceRule::Unrecognized(raw) => write!(f, "unrecognized '{raw}'"),
        }
    }
}

/// 重试退避策略
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// 立即重新入队
    None,
    Fixed {
        seconds: u64,
    },
    Exponential {
        base_seconds: u64,
        multiplier: f64,
        max_seconds: u64,
        /// 随机抖动范围（0.0-1.0）
        jitter_factor: f64,
    },
}

/// 重试策略
///
/// 每个信封自带 `max_retries`，`max_retries` 字段是额外的全局上限，
/// 两者取较严格的一个。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: Option<u32>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            backoff: Backoff::None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: Option<u32>, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn should_retry(&self, envelope: &TaskEnvelope) -> bool {
        let under_cap = self
            .max_retries
            .map_or(true, |cap| envelope.metadata.retry_count < cap);
        envelope.can_retry() && under_cap
    }

    /// 第 `attempt` 次重试（从1开始）的延迟秒数
    pub fn delay_for(&self, attempt: u32) -> u64 {
        match &self.backoff {
            Backoff::None => 0,
            Backoff::Fixed { seconds } => *seconds,
            Backoff::Exponential {
                base_seconds,
                multiplier,
                max_seconds,
                jitter_factor,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let base = *base_seconds as f64;
                let capped = (base * multiplier.powi(exponent)).min(*max_seconds as f64);

                // 随机抖动避免雷群效应
                let jitter = if *jitter_factor > 0.0 {
                    capped * jitter_factor * (rand::random::<f64>() - 0.5) * 2.0
                } else {
                    0.0
                };

                (capped + jitter).max(base).min(*max_seconds as f64).round() as u64
            }
        }
    }
}
