//! POS provider adapters.
//!
//! Each supported platform implements [`adapter::PosAdapter`]. The
//! [`registry::ProviderRegistry`] is built once at startup from
//! [`config::PosConfig`] and holds only the providers that are configured.

pub mod adapter;
pub mod config;
pub mod error;
pub mod http;
pub mod lightspeed;
pub mod registry;
pub mod shopify;
pub mod square;

pub use adapter::PosAdapter;
pub use error::PosError;
pub use registry::ProviderRegistry;
