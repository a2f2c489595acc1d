//! 角色与权限目录管理

pub mod commands;
pub mod handlers;
pub mod queries;
pub mod query_handlers;

pub use commands::*;
pub use handlers::{CatalogCommandHandler, LinkOutcome};
pub use queries::*;
pub use query_handlers::CatalogQueryHandler;
