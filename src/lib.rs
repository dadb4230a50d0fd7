//! # poolshield-gateway
//!
//! REST API and WebSocket gateway for click-fraud protection pools.
//!
//! Businesses in the same city and sector share one pool, identified by a
//! 5-digit code (`"34001"`: city plate `34`, sector slot `001`). Members
//! choose how many suspicious clicks a source may make before it is
//! blocked, and every block is shared with the rest of the pool.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Caller extractor (auth)
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── PoolService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── PoolRegistry + CityCatalog (domain/)
//!     │
//!     └── PostgreSQL event log (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
