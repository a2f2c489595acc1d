//! 领域服务

pub mod locator;
pub mod placement;
pub mod relocation;

pub use locator::{AuthoritativeRecord, RecordLocation, locate_authoritative_record};
pub use placement::{holds_super_admin, resettle_identity, settle_location};
pub use relocation::{Relocation, relocate_authoritative_record};
