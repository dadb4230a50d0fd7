//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::PoolEvent`]s
//! for the topics a client subscribed to. Members may subscribe to pools
//! they joined; operators may also subscribe to whole cities or to `"*"`.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
