//! Object-reuse pool for entities that are costly to build and cheap to reset.
//!
//! A [`Pool`] keeps released instances in a LIFO free-list and hands them
//! back out on the next [`Pool::spawn`], only calling its factory when the
//! free-list is empty. Pooled types implement [`Poolable`] to get one-time
//! construction and per-spawn activation hooks.

pub mod config;
pub mod error;
pub mod placement;
pub mod pool;

pub use config::PoolConfig;
pub use error::{FactoryError, PoolError, Rejected};
pub use placement::Placement;
pub use pool::handle::{Recyclable, SharedPool};
pub use pool::lifecycle::{Factory, Poolable};
pub use pool::{Pool, PoolId, PoolStats, Pooled};
