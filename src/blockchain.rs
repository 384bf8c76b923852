// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// hashing, chain management, validation and queries.

pub mod core;
pub use self::core::*;
