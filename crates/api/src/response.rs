//! Shared response envelope types for API handlers.
//!
//! Resource endpoints use a `{ "data": ... }` envelope. Webhook
//! acknowledgements use [`WebhookAck`], the shape providers and the
//! operator tooling expect.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Body returned to a provider for every webhook delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    pub fn ok(event_id: impl Into<String>, message: Option<&str>) -> Self {
        Self {
            ok: true,
            event_id: Some(event_id.into()),
            message: message.map(str::to_string),
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            ok: false,
            event_id: None,
            message: Some(message.to_string()),
        }
    }
}
