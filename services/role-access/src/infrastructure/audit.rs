//! 审计写入实现

use async_trait::async_trait;
use clinic_errors::{AppError, AppResult};
use clinic_ports::{AuditEntry, AuditSink};
use tokio::sync::RwLock;
use tracing::info;

/// 以结构化日志输出审计记录，由日志管道转送审计服务
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        let new_value = entry
            .new_value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        let old_value = entry
            .old_value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();

        info!(
            target: "audit",
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            actor_id = ?entry.actor_id,
            occurred_at = %entry.occurred_at,
            old_value = %old_value,
            new_value = %new_value,
            "Audit entry"
        );
        Ok(())
    }
}

/// 丢弃所有审计记录
#[derive(Debug, Default, Clone)]
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _entry: AuditEntry) -> AppResult<()> {
        Ok(())
    }
}

/// 内存审计记录 (测试用)，可设置为始终失败
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
    failing: bool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入都返回错误
    pub fn failing() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            failing: true,
        }
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn actions(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        if self.failing {
            return Err(AppError::internal("Audit sink unavailable"));
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_collects_entries() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditEntry::new(None, "role.created", "role", "r-1"))
            .await
            .unwrap();
        assert_eq!(sink.actions().await, vec!["role.created".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_sink() {
        let sink = InMemoryAuditSink::failing();
        assert!(
            sink.record(AuditEntry::new(None, "role.created", "role", "r-1"))
                .await
                .is_err()
        );
        assert!(sink.entries().await.is_empty());
    }
}
