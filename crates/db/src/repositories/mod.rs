//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod order_repo;
pub mod pos_connection_repo;
pub mod review_session_repo;
pub mod store_repo;
pub mod webhook_event_repo;

pub use audit_repo::AuditEventRepo;
pub use order_repo::OrderRepo;
pub use pos_connection_repo::PosConnectionRepo;
pub use review_session_repo::ReviewSessionRepo;
pub use store_repo::StoreRepo;
pub use webhook_event_repo::WebhookEventRepo;
