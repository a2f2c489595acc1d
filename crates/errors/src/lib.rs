//! clinic-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// 事务内的意外错误，已整体回滚
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 调用方可区分的错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    TransactionFailure,
    Internal,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn transaction_failure(msg: impl Into<String>) -> Self {
        Self::TransactionFailure(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::TransactionFailure(_) | Self::Database(_) => ErrorKind::TransactionFailure,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 是否为存储层或运行时的意外错误 (而非业务拒绝)
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::TransactionFailure(_)
        )
    }

    /// 将事务中的意外错误归一为 TransactionFailure，业务错误原样保留
    pub fn into_transaction_failure(self) -> Self {
        match self {
            Self::Database(msg) | Self::Internal(msg) => Self::TransactionFailure(msg),
            other => other,
        }
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::TransactionFailure(_) => 500,
            Self::Database(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: format!("https://clinic.local/problems/{}", self.problem_slug()),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.public_detail(),
            instance: None,
        }
    }

    fn problem_slug(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransactionFailure => "transaction-failure",
            ErrorKind::Internal => "internal",
        }
    }

    fn problem_title(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "Resource Not Found",
            ErrorKind::Validation => "Validation Error",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::TransactionFailure => "Operation Failed",
            ErrorKind::Internal => "Internal Server Error",
        }
    }

    // 存储细节不对外暴露
    fn public_detail(&self) -> String {
        if self.is_unexpected() {
            "The operation could not be completed and was rolled back".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
