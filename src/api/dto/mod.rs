//! Data Transfer Objects for REST request/response serialization.
//!
//! Codes travel as strings (`"34001"`); monetary amounts are serialized
//! as JSON strings to prevent rounding.

pub mod block_dto;
pub mod common_dto;
pub mod operator_dto;
pub mod pool_dto;

pub use block_dto::*;
pub use common_dto::*;
pub use operator_dto::*;
pub use pool_dto::*;
