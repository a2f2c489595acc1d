//! 角色分配与权限解析的指标

use clinic_errors::{AppError, ErrorKind};
use metrics::{counter, histogram};
use std::time::Instant;

/// 慢操作阈值 (毫秒)
const SLOW_OPERATION_MS: u128 = 200;

/// 指标记录工具
pub struct AccessMetrics;

impl AccessMetrics {
    /// 记录一次分配，`outcome` 为台账变化或错误类别
    pub fn record_assignment(archetype: &str, outcome: &str) {
        counter!(
            "role_assignment_total",
            "archetype" => archetype.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    /// 记录一次撤销
    pub fn record_revocation(archetype: &str, outcome: &str) {
        counter!(
            "role_revocation_total",
            "archetype" => archetype.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    /// 记录权限解析耗时与结果数
    pub fn record_resolution(start: Instant, granted: usize) {
        histogram!("permission_resolution_duration_ms")
            .record(start.elapsed().as_millis() as f64);
        histogram!("permission_resolution_granted").record(granted as f64);
    }

    /// 记录目录变更
    pub fn record_catalog_change(resource: &str, operation: &str) {
        counter!(
            "catalog_changes_total",
            "resource" => resource.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    /// 错误类别标签
    pub fn error_label(err: &AppError) -> &'static str {
        match err.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransactionFailure => "transaction_failure",
            ErrorKind::Internal => "internal",
        }
    }

    /// 记录审计写入失败
    pub fn record_audit_failure(action: &str) {
        counter!("audit_write_failures_total", "action" => action.to_string()).increment(1);
    }
}

/// 用于计时的守卫结构
pub struct OperationTimer {
    start: Instant,
    operation: &'static str,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis();
        histogram!("role_access_operation_duration_ms", "operation" => self.operation)
            .record(duration_ms as f64);

        if duration_ms > SLOW_OPERATION_MS {
            tracing::warn!(
                operation = self.operation,
                duration_ms = %duration_ms,
                "Slow operation detected"
            );
        }
    }
}
