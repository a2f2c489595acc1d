//! 角色分配引擎

pub mod commands;
pub mod service;

pub use commands::{AssignRoleCommand, AssignmentOutcome, RevocationOutcome, RevokeRoleCommand};
pub use service::RoleAssignmentService;
