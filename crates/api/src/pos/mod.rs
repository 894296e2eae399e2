//! POS integration services: connection management, webhook processing,
//! the OAuth flow and the audit sink they share.

pub mod audit;
pub mod connections;
pub mod oauth;
pub mod webhooks;

pub use connections::ConnectionManager;
pub use oauth::OAuthFlow;
pub use webhooks::WebhookProcessor;
