//! 提交后写审计

use std::sync::Arc;

use clinic_ports::{AuditEntry, AuditSink};
use tracing::warn;

use crate::infrastructure::metrics::AccessMetrics;

/// 审计记录器
///
/// 只在事务提交后调用；写入失败记日志，不影响已提交的变更。
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        let resource_id = entry.resource_id.clone();
        if let Err(e) = self.sink.record(entry).await {
            AccessMetrics::record_audit_failure(&action);
            warn!(
                action = %action,
                resource_id = %resource_id,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }
}

/// 序列化为审计值，失败时记为 null
pub(crate) fn audit_value<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
