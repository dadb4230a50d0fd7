//! Service layer: business logic orchestration.
//!
//! [`PoolService`] authorizes each [`crate::auth::Caller`], delegates to the
//! [`crate::domain::PoolRegistry`], and emits events through the
//! [`crate::domain::EventBus`].

pub mod pool_service;

pub use pool_service::{PoolService, ServiceSettings};
