//! Boutique POS integration API server library.
//!
//! Exposes the building blocks (config, state, error handling, POS services,
//! routes) so integration tests and the binary entrypoint can both use them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod pos;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
