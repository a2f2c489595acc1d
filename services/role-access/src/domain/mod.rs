//! 角色分配领域模块

pub mod archetype;
pub mod assignment;
pub mod catalog;
pub mod identity;
pub mod profile;
pub mod repository;
pub mod services;
pub mod unit_of_work;

pub use archetype::{Archetype, ArchetypeRules};
pub use assignment::{HeldRole, LedgerChange, RoleAssignment};
pub use identity::{ContactInfo, Identity};
pub use profile::{ProfileDetails, ProfileKind, SpecializedProfile};
pub use services::{AuthoritativeRecord, RecordLocation};
pub use unit_of_work::{UnitOfWork, UnitOfWorkFactory};
