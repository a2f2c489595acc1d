//! 角色与权限目录

pub mod permission;
pub mod role;

use clinic_errors::{AppError, AppResult};

pub use permission::{
    LinkChange, Permission, PermissionId, PermissionSummary, RolePermissionLink,
};
pub use role::{Role, RoleId, RoleSummary};

/// 名称最大长度
pub const MAX_NAME_LEN: usize = 100;
/// 备注 / 描述最大长度
pub const MAX_NOTE_LEN: usize = 1000;

/// 校验名称并返回去除首尾空白后的值
pub fn validate_name(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// 校验可选备注，空白视为未填写
pub fn validate_note(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.chars().count() > MAX_NOTE_LEN => Err(AppError::validation(format!(
            "{} must be at most {} characters",
            field, MAX_NOTE_LEN
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("Role name", "  Doctor ").unwrap(), "Doctor");
        assert!(validate_name("Role name", "   ").is_err());
        assert!(validate_name("Role name", &"x".repeat(101)).is_err());
        assert!(validate_name("Role name", &"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_note() {
        assert_eq!(validate_note("Note", Some("  ".to_string())).unwrap(), None);
        assert_eq!(validate_note("Note", None).unwrap(), None);
        assert!(validate_note("Note", Some("x".repeat(1001))).is_err());
    }
}
