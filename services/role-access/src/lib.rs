//! Role Access - 角色分配、权限解析与角色/权限目录
//!
//! 分配提升类角色 (practitioner / administrator / organization) 时，
//! 账户的权威联系记录会在账户存储与对应的专属档案之间迁移。

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;

pub use config::{AccessConfig, AuditMode, ServiceConfig};
pub use runtime::{AccessServices, MIGRATOR, run_migrations};
