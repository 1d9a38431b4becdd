use std::collections::HashMap;
use std::sync::Arc;

use scheduler_config::HandlersConfig;
use scheduler_domain::services::TaskHandler;
use scheduler_errors::SchedulerResult;
use tracing::{info, warn};

use crate::handlers::HttpTaskHandler;

/// 任务类型到处理器的映射
///
/// 在进程启动时构造，之后只读。
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 根据配置注册HTTP处理器
    pub fn from_config(config: &HandlersConfig) -> SchedulerResult<Self> {
        let mut registry = Self::new();
        for handler_config in &config.http {
            let handler = HttpTaskHandler::from_config(handler_config)?;
            registry.register(handler_config.task_type.clone(), Arc::new(handler));
        }
        info!("已注册 {} 个任务处理器", registry.len());
        Ok(registry)
    }

    /// 注册处理器，同一类型重复注册时覆盖旧的
    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let task_type = task_type.into();
        info!("注册任务处理器: {} -> {}", task_type, handler.name());
        if self.handlers.insert(task_type.clone(), handler).is_some() {
            warn!("任务类型 {} 的处理器被覆盖", task_type);
        }
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// 已注册的任务类型，按名称排序
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
