//! 审计日志 trait 定义

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_common::ActorId;
use clinic_errors::AppResult;
use serde::{Deserialize, Serialize};

/// 审计记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: Option<ActorId>,
    /// 操作标识，如 "role.assigned"
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: Option<ActorId>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            old_value: None,
            new_value: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_old_value(mut self, value: serde_json::Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn with_new_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }
}

/// 审计日志写入方
///
/// 由外部审计服务实现。写入失败不影响已提交的业务变更。
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

