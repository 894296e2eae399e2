//! Webhook Processor.
//!
//! Every delivery goes through the same steps: verify the signature, take
//! the event id, deduplicate on `(provider, event_id)`, write the event as
//! `RECEIVED`, then classify and act on it. The row ends in exactly one of
//! `PROCESSED`, `SKIPPED` or `FAILED`.

use std::collections::HashMap;
use std::sync::Arc;

use boutique_core::audit::event_types;
use boutique_core::ids::generate_session_public_id;
use boutique_core::normalized::TransactionStatus;
use boutique_core::provider::PosProvider;
use boutique_core::types::DbId;
use boutique_core::webhook::WebhookStatus;
use boutique_db::models::order::CreateOrder;
use boutique_db::models::webhook_event::{CreateWebhookEvent, WebhookEvent};
use boutique_db::repositories::{OrderRepo, WebhookEventRepo};
use boutique_pos::adapter::{ProviderOptions, WebhookRequest};
use boutique_pos::{PosAdapter, PosError};
use serde_json::json;

use super::audit;
use super::connections::{ConnectionManager, ProviderIdentifiers};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const MSG_DUPLICATE: &str = "Duplicate event";
pub const MSG_NOT_TRANSACTION: &str = "Not a transaction event";
pub const MSG_NOT_COMPLETED: &str = "Non-completed transaction";
pub const MSG_NO_CONNECTION: &str = "No matching connection";
pub const MSG_ORDER_EXISTS: &str = "Order already exists";

/// Successful outcome of a delivery. All of these are acknowledged with 2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// An order and review session were created, or the order already existed.
    Processed {
        event_id: String,
        message: Option<&'static str>,
    },
    /// Deliberately ignored; the row is `SKIPPED`.
    Skipped {
        event_id: String,
        reason: &'static str,
    },
    /// The event id was seen before; nothing was done.
    Duplicate { event_id: String },
}

impl WebhookOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Processed { event_id, .. }
            | Self::Skipped { event_id, .. }
            | Self::Duplicate { event_id } => event_id,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::Processed { message, .. } => *message,
            Self::Skipped { reason, .. } => Some(reason),
            Self::Duplicate { .. } => Some(MSG_DUPLICATE),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Signature missing or wrong. No row is written.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The delivery carried no usable event id. No row is written.
    #[error("Missing event ID")]
    MissingEventId,

    /// Failed before the event was recorded (unknown provider, database).
    #[error(transparent)]
    Rejected(#[from] AppError),

    /// Failed after the event was recorded; the row is `FAILED` and a
    /// redelivery will retry it.
    #[error("Webhook {event_id} failed: {source}")]
    Failed {
        event_id: String,
        #[source]
        source: AppError,
    },
}

impl From<PosError> for WebhookError {
    fn from(err: PosError) -> Self {
        Self::Rejected(err.into())
    }
}

impl From<sqlx::Error> for WebhookError {
    fn from(err: sqlx::Error) -> Self {
        Self::Rejected(err.into())
    }
}

/// An inbound delivery as received by the HTTP layer.
#[derive(Debug)]
pub struct InboundWebhook<'a> {
    pub provider: &'a str,
    pub body: &'a [u8],
    /// Lower-case header names.
    pub headers: &'a HashMap<String, String>,
    /// Full public URL the provider posted to.
    pub notification_url: &'a str,
}

enum Handled {
    Processed(Option<&'static str>),
    Skipped(&'static str),
}

pub struct WebhookProcessor<'a> {
    state: &'a AppState,
}

impl<'a> WebhookProcessor<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn process(
        &self,
        inbound: &InboundWebhook<'_>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let pool = &self.state.pool;
        let (provider, adapter) = self.state.registry.resolve(inbound.provider)?;
        let secret = self
            .state
            .config
            .pos
            .webhook_secret(provider)
            .ok_or_else(|| PosError::NotRegistered(provider.to_string()))?;

        // 1. Authenticate.
        let validation = adapter.validate_webhook(
            &WebhookRequest {
                body: inbound.body,
                headers: inbound.headers,
                notification_url: inbound.notification_url,
            },
            secret,
        );
        if !validation.is_valid {
            tracing::warn!(provider = %provider, "Rejected webhook with invalid signature");
            return Err(WebhookError::InvalidSignature);
        }

        // 2. Identify.
        let Some(event_id) = validation.event_id.filter(|id| !id.trim().is_empty()) else {
            tracing::warn!(provider = %provider, "Rejected webhook without an event id");
            return Err(WebhookError::MissingEventId);
        };
        let event_type = validation.event_type.as_deref().unwrap_or("unknown");
        let payload = validation.payload.unwrap_or(serde_json::Value::Null);

        // 3. Deduplicate and record.
        let Some(row) = self
            .claim_event(provider, &event_id, event_type, &payload)
            .await?
        else {
            tracing::info!(provider = %provider, event_id = %event_id, "Duplicate webhook ignored");
            return Ok(WebhookOutcome::Duplicate { event_id });
        };

        // 4. Act.
        let result = self
            .handle(
                row.id,
                provider,
                adapter,
                &payload,
                validation.shop_domain.as_deref(),
            )
            .await;

        match result {
            Ok(Handled::Processed(message)) => {
                if let Err(e) =
                    WebhookEventRepo::mark_status(pool, row.id, WebhookStatus::Processed, None).await
                {
                    tracing::error!(provider = %provider, event_id = %event_id, error = %e, "Failed to record webhook outcome");
                    return Err(self.record_failure(row.id, provider, event_id, e.into()).await);
                }
                tracing::info!(provider = %provider, event_id = %event_id, event_type, "Webhook processed");
                Ok(WebhookOutcome::Processed { event_id, message })
            }
            Ok(Handled::Skipped(reason)) => {
                if let Err(e) =
                    WebhookEventRepo::mark_status(pool, row.id, WebhookStatus::Skipped, Some(reason))
                        .await
                {
                    tracing::error!(provider = %provider, event_id = %event_id, error = %e, "Failed to record webhook outcome");
                    return Err(self.record_failure(row.id, provider, event_id, e.into()).await);
                }
                tracing::info!(provider = %provider, event_id = %event_id, event_type, reason, "Webhook skipped");
                Ok(WebhookOutcome::Skipped { event_id, reason })
            }
            Err(err) => {
                tracing::error!(
                    provider = %provider,
                    event_id = %event_id,
                    event_type,
                    error = %err,
                    "Webhook processing failed",
                );
                Err(self.record_failure(row.id, provider, event_id, err).await)
            }
        }
    }

    /// Move a `RECEIVED` row to `FAILED` so a redelivery can claim it again.
    ///
    /// If even that write fails the row stays `RECEIVED` and every redelivery
    /// answers as a duplicate, so it is logged for an operator to replay.
    async fn record_failure(
        &self,
        webhook_event_id: DbId,
        provider: PosProvider,
        event_id: String,
        err: AppError,
    ) -> WebhookError {
        let message = err.to_string();
        if let Err(e) = WebhookEventRepo::mark_status(
            &self.state.pool,
            webhook_event_id,
            WebhookStatus::Failed,
            Some(&message),
        )
        .await
        {
            tracing::error!(
                provider = %provider,
                event_id = %event_id,
                webhook_event_id,
                error = %e,
                "Webhook left in RECEIVED; replay it manually",
            );
        }
        WebhookError::Failed {
            event_id,
            source: err,
        }
    }

    /// Write the `RECEIVED` row, or take over a `FAILED` one for a retry.
    /// `None` means another delivery owns this event.
    async fn claim_event(
        &self,
        provider: PosProvider,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<WebhookEvent>, WebhookError> {
        let pool = &self.state.pool;
        if let Some(existing) =
            WebhookEventRepo::find_by_provider_event(pool, provider.as_str(), event_id).await?
        {
            if existing.status == WebhookStatus::Failed.as_str()
                && WebhookEventRepo::reset_failed(pool, existing.id).await?
            {
                tracing::info!(provider = %provider, event_id, "Retrying previously failed webhook");
                return Ok(Some(existing));
            }
            return Ok(None);
        }

        // A concurrent delivery may insert first; ON CONFLICT leaves us `None`.
        Ok(WebhookEventRepo::create_received(
            pool,
            &CreateWebhookEvent {
                provider: provider.as_str(),
                event_id,
                event_type,
                payload,
            },
        )
        .await?)
    }

    async fn handle(
        &self,
        webhook_event_id: DbId,
        provider: PosProvider,
        adapter: Arc<dyn PosAdapter>,
        payload: &serde_json::Value,
        shop_domain: Option<&str>,
    ) -> AppResult<Handled> {
        let pool = &self.state.pool;
        let connections = ConnectionManager::new(self.state);

        let Some(tx) = adapter.parse_transaction(payload) else {
            return Ok(Handled::Skipped(MSG_NOT_TRANSACTION));
        };
        if tx.status != TransactionStatus::Completed {
            return Ok(Handled::Skipped(MSG_NOT_COMPLETED));
        }

        let ids = ProviderIdentifiers {
            merchant_id: tx.merchant_id.as_deref(),
            location_id: tx.location_id.as_deref(),
            shop_domain,
        };
        let Some(conn) = connections.find_by_provider_identifier(provider, &ids).await? else {
            return Ok(Handled::Skipped(MSG_NO_CONNECTION));
        };
        WebhookEventRepo::set_connection(pool, webhook_event_id, conn.id).await?;

        if OrderRepo::find_by_external_id(pool, provider.as_str(), &tx.external_order_id)
            .await?
            .is_some()
        {
            return Ok(Handled::Processed(Some(MSG_ORDER_EXISTS)));
        }

        let access_token = connections.access_token_for(&conn).await?;
        let order = adapter
            .get_order(
                &access_token,
                &tx.external_order_id,
                &ProviderOptions {
                    shop: conn.shop_domain.clone(),
                },
            )
            .await?;

        let line_items = serde_json::to_value(&order.line_items)
            .map_err(|e| AppError::InternalError(format!("Failed to encode line items: {e}")))?;
        let input = CreateOrder {
            store_id: conn.store_id,
            pos_connection_id: Some(conn.id),
            provider: provider.as_str().to_string(),
            external_order_id: tx.external_order_id.clone(),
            total_amount: order.total_amount,
            currency: order.currency,
            line_items,
            raw_payload: Some(order.raw_payload),
        };

        let Some((order, session)) =
            OrderRepo::create_with_pending_session(pool, &input, &generate_session_public_id())
                .await?
        else {
            return Ok(Handled::Processed(Some(MSG_ORDER_EXISTS)));
        };

        tracing::info!(
            store_id = conn.store_id,
            order_id = order.id,
            session = %session.public_id,
            "Review session created from POS order",
        );
        audit::record(
            pool,
            conn.store_id,
            event_types::SESSION_CREATED,
            json!({
                "orderId": order.id,
                "externalOrderId": order.external_order_id,
                "provider": provider.as_str(),
                "sessionId": session.public_id,
            }),
            Some(session.id),
        )
        .await;

        Ok(Handled::Processed(None))
    }
}
