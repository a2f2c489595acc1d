//! 事务收尾

use clinic_errors::AppResult;
use tracing::{debug, error, warn};

use crate::domain::unit_of_work::UnitOfWork;

/// 成功则提交，失败则回滚
///
/// 存储层和运行时的意外错误统一返回 TransactionFailure，业务错误原样返回。
pub(crate) async fn complete<T>(
    uow: Box<dyn UnitOfWork>,
    result: AppResult<T>,
    operation: &'static str,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await.map_err(|e| {
                error!(operation, error = %e, "Commit failed, transaction rolled back");
                e.into_transaction_failure()
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(operation, error = %rollback_err, "Rollback failed");
            }
            if err.is_unexpected() {
                error!(operation, error = %err, "Operation failed, transaction rolled back");
            } else {
                debug!(operation, error = %err, "Operation rejected");
            }
            Err(err.into_transaction_failure())
        }
    }
}
