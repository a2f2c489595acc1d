//! 应用层模块

pub mod assignment;
mod audit;
pub mod catalog;
pub mod permissions;
mod transaction;

pub use assignment::{
    AssignRoleCommand, AssignmentOutcome, RevocationOutcome, RevokeRoleCommand,
    RoleAssignmentService,
};
pub use audit::AuditRecorder;
pub use catalog::{CatalogCommandHandler, CatalogQueryHandler, LinkOutcome};
pub use permissions::PermissionResolver;
