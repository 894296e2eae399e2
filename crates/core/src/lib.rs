//! Domain logic for the boutique POS integration layer.
//!
//! Everything here is free of I/O so it can be shared by the repository,
//! adapter and HTTP layers without pulling in their dependencies.

pub mod audit;
pub mod crypto;
pub mod error;
pub mod hashing;
pub mod ids;
pub mod money;
pub mod normalized;
pub mod oauth_state;
pub mod provider;
pub mod signature;
pub mod types;
pub mod webhook;
