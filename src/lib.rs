//! ChainDrug - a peer ledger for drug custody transfers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, canonical hashing, chain validation and queries
//! - [`transaction`] - Transfer records and their validation
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search
//! - [`consensus`] - Longest-valid-chain conflict resolution
//!
//! ## Cryptography
//! - [`crypto`] - Sender authentication over per-node identity parameters
//!
//! ## Networking & Integration
//! - [`network`] - HTTP client for peer nodes
//! - [`sync`] - Concurrent peer fan-out and per-peer bookkeeping
//! - [`node`] - Node orchestration
//! - [`api`] - REST API
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Networking & Integration
// ============================================================================
pub mod api;
pub mod network;
pub mod node;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
