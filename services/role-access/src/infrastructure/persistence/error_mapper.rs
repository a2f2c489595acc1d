//! SQLx 错误到 AppError 的映射
//!
//! 约束名来自迁移脚本，冲突与外键错误按约束给出具体描述。

use clinic_errors::AppError;

fn unique_violation(constraint: Option<&str>) -> AppError {
    AppError::conflict(match constraint {
        Some("roles_name_active_uidx") => "Role name already exists",
        Some("permissions_name_active_uidx") => "Permission name already exists",
        Some("role_assignments_primary_uidx") => "Identity already has a primary role",
        Some("role_permissions_pkey") | Some("role_assignments_pkey") => {
            "Link was created concurrently"
        }
        _ => "Duplicate entry violates unique constraint",
    })
}

/// 外键只指向角色与权限，违规即引用对象已不存在
fn foreign_key_violation(constraint: Option<&str>) -> AppError {
    match constraint {
        Some("role_assignments_role_id_fkey") | Some("role_permissions_role_id_fkey") => {
            AppError::not_found("Role not found")
        }
        Some("role_permissions_permission_id_fkey") => AppError::not_found("Permission not found"),
        _ => AppError::validation("Foreign key constraint violation"),
    }
}

pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    let db_err = match e {
        sqlx::Error::Database(db_err) => db_err,
        sqlx::Error::RowNotFound => return AppError::not_found("Record not found"),
        unavailable @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
            return AppError::transaction_failure(format!("Database unavailable: {}", unavailable));
        }
        other => return AppError::database(other.to_string()),
    };

    let Some(code) = db_err.code() else {
        return AppError::database(db_err.to_string());
    };
    match code.as_ref() {
        "23505" => unique_violation(db_err.constraint()),
        "23503" => foreign_key_violation(db_err.constraint()),
        "23502" | "23514" | "22001" | "22P02" => {
            AppError::validation(format!("Invalid value: {}", db_err.message()))
        }
        // 序列化失败与死锁：整个事务已回滚
        "40001" | "40P01" => AppError::transaction_failure(db_err.message().to_string()),
        _ => AppError::database(format!("Database error ({}): {}", code, db_err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_pool_timeout_fails_transaction() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::TransactionFailure(_)));
    }

    #[test]
    fn test_constraint_messages() {
        assert_eq!(
            unique_violation(Some("roles_name_active_uidx")).to_string(),
            AppError::conflict("Role name already exists").to_string()
        );
        assert!(matches!(
            foreign_key_violation(Some("role_permissions_permission_id_fkey")),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            foreign_key_violation(None),
            AppError::Validation(_)
        ));
    }
}
