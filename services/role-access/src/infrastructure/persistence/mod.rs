//! 持久化实现

pub mod error_mapper;
pub mod memory;
mod rows;
pub mod tx_repositories;
pub mod unit_of_work;

pub use memory::{FaultPoint, InMemoryStore, MemoryState};
pub use unit_of_work::PostgresUnitOfWorkFactory;
