// 事件日志
// 在 tracing 输出之外，把结构化日志写入 log_entries 表

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::database::{LogEntry, LogLevel, LogRepository};

#[derive(Clone, Default)]
pub struct EventLog {
    sender: Option<mpsc::UnboundedSender<LogEntry>>,
}

impl EventLog {
    /// 启动后台写入任务，所有发送端释放后任务结束
    pub fn spawn(repo: Arc<dyn LogRepository>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<LogEntry>();

        let handle = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                if let Err(e) = repo.insert(&entry).await {
                    tracing::error!("Failed to persist log entry: {}", e);
                }
            }
            tracing::debug!("Event log writer stopped");
        });

        (
            Self {
                sender: Some(sender),
            },
            handle,
        )
    }

    /// 只输出 tracing，不落库
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn record(&self, level: LogLevel, message: Value) {
        match level {
            LogLevel::Info => tracing::info!(target: "event_log", %message),
            LogLevel::Warning => tracing::warn!(target: "event_log", %message),
            LogLevel::Error => tracing::error!(target: "event_log", %message),
            LogLevel::Debug => tracing::debug!(target: "event_log", %message),
        }

        if let Some(sender) = &self.sender {
            let entry = LogEntry {
                timestamp: Utc::now(),
                level,
                message,
            };
            if sender.send(entry).is_err() {
                tracing::warn!("Event log writer is gone, entry dropped");
            }
        }
    }

    pub fn info(&self, message: Value) {
        self.record(LogLevel::Info, message);
    }

    pub fn warning(&self, message: Value) {
        self.record(LogLevel::Warning, message);
    }

    pub fn error(&self, message: Value) {
        self.record(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn entries_are_written_by_the_background_task() {
        let store = MemoryStore::new();
        let (log, handle) = EventLog::spawn(Arc::new(store.clone()));

        log.info(json!({ "message": "cache hit", "key": "cache:user_list:x" }));
        log.error(json!({ "msg": "boom" }));
        drop(log);
        handle.await.unwrap();

        let entries = store.log_entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message["message"], "cache hit");
        assert_eq!(entries[1].level, LogLevel::Error);
    }

    #[test]
    fn disabled_log_does_not_panic() {
        EventLog::disabled().warning(json!("nothing to see"));
    }
}
