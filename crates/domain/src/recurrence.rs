//! 调度定义到期判断
//!
//! 纯函数，不读取系统时间，所有时间均为UTC。

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::entities::ScheduleDefinition;
use crate::value_objects::RecurrenceRule;

/// 判断调度定义在 `now` 时刻是否到期
pub fn is_due(schedule: &ScheduleDefinition, now: DateTime<Utc>) -> bool {
    let rule = &schedule.recurrence;
    if !rule.is_recognized() && schedule.last_executed.is_some() {
        warn!(
            "调度 {} 的周期表达式无法识别: '{}'，按每小时处理",
            schedule.id,
            rule.expression()
        );
    }
    is_rule_due(rule, schedule.last_executed, now)
}

/// 给定已解析的规则与上次执行时间，判断是否到期
///
/// 从未执行过时按触发刻度匹配；否则比较距上次执行的时间与规则的最小间隔。
/// 上次执行时间晚于 `now`（时钟偏差）时不会到期。
pub fn is_rule_due(
    rule: &RecurrenceRule,
    last_executed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_executed {
        None => rule.matches_tick(now),
        Some(last) => {
            let elapsed = now - last;
            elapsed >= Duration::zero() && elapsed >= rule.threshold()
        }
    }
}
