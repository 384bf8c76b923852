// core.rs splits ledger responsibilities into submodules for easier maintenance.
pub mod chain;
pub mod hashing;
pub mod query;
pub mod validation;

pub use chain::*;
pub use hashing::hash_block;
pub use validation::*;
