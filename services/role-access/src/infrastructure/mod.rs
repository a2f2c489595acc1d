//! 基础设施层

pub mod audit;
pub mod metrics;
pub mod persistence;

pub use audit::{InMemoryAuditSink, NoOpAuditSink, TracingAuditSink};
