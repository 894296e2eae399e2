//! Square adapter.
//!
//! Square tokens expire (30 days) and are refreshed with a long-lived
//! refresh token. Amounts in the Orders API are already in minor units.
//! Webhooks are signed over the notification URL followed by the body.

use async_trait::async_trait;
use boutique_core::normalized::{
    LineItem, NormalizedOrder, NormalizedTransaction, TransactionStatus,
};
use boutique_core::oauth_state::OAuthState;
use boutique_core::provider::PosProvider;
use boutique_core::signature::{verify_hmac_sha256, SignatureEncoding};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{
    json_id, json_str, json_timestamp, parse_quantity, AuthorizationOptions, MerchantInfo,
    MerchantLocation, OAuthTokens, PosAdapter, ProviderOptions, WebhookRequest,
    WebhookValidation,
};
use crate::config::SquareConfig;
use crate::error::PosError;
use crate::http::parse_json;

/// Pinned Square API version sent on every request.
pub const SQUARE_API_VERSION: &str = "2024-01-18";

pub const SIGNATURE_HEADER: &str = "x-square-hmacsha256-signature";

const SCOPES: &str = "MERCHANT_PROFILE_READ ORDERS_READ ORDERS_WRITE";

/// Lifetime assumed when the token response omits `expires_at`.
const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 30;

const PAYMENT_EVENTS: [&str; 3] = ["payment.created", "payment.updated", "payment.completed"];

pub struct SquareAdapter {
    config: SquareConfig,
    client: reqwest::Client,
}

impl SquareAdapter {
    pub fn new(config: SquareConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn base_url(&self) -> &'static str {
        self.config.environment.base_url()
    }

    fn get(&self, path: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url()))
            .bearer_auth(access_token)
            .header("Square-Version", SQUARE_API_VERSION)
    }

    async fn token_request(&self, grant: TokenGrant<'_>) -> Result<OAuthTokens, PosError> {
        let body = TokenRequest {
            client_id: &self.config.app_id,
            client_secret: self.config.app_secret.expose(),
            grant,
        };
        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url()))
            .header("Square-Version", SQUARE_API_VERSION)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = parse_json(PosProvider::Square, response).await?;
        Ok(token.into_tokens())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(flatten)]
    grant: TokenGrant<'a>,
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum TokenGrant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    merchant_id: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self) -> OAuthTokens {
        let expires_at = self
            .expires_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS));
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Some(expires_at),
            shop_domain: None,
            extra: json!({ "merchantId": self.merchant_id }),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON mapping
// ---------------------------------------------------------------------------

fn map_payment_status(status: Option<&str>) -> TransactionStatus {
    match status {
        Some("COMPLETED" | "APPROVED") => TransactionStatus::Completed,
        Some("CANCELED" | "FAILED") => TransactionStatus::Failed,
        _ => TransactionStatus::Pending,
    }
}

fn money_amount(value: &Value) -> i64 {
    value.get("amount").and_then(Value::as_i64).unwrap_or(0)
}

fn money_currency(value: &Value) -> String {
    json_str(value, "currency").unwrap_or("USD").to_uppercase()
}

/// Build a [`NormalizedOrder`] from a `GET /v2/orders/{id}` response.
pub(crate) fn order_from_response(body: Value) -> Result<NormalizedOrder, PosError> {
    let order = body
        .get("order")
        .ok_or_else(|| PosError::decode(PosProvider::Square, "response has no order"))?;
    let external_order_id = json_id(order, "id")
        .ok_or_else(|| PosError::decode(PosProvider::Square, "order has no id"))?;
    let total = order.get("total_money").cloned().unwrap_or(Value::Null);

    let line_items = order
        .get("line_items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| LineItem {
                    name: json_str(item, "name").unwrap_or("Item").to_string(),
                    quantity: parse_quantity(item.get("quantity")),
                    amount: item.get("total_money").map(money_amount).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(NormalizedOrder {
        external_order_id,
        provider: PosProvider::Square,
        total_amount: money_amount(&total),
        currency: money_currency(&total),
        line_items,
        created_at: json_timestamp(order, "created_at"),
        location_id: json_id(order, "location_id"),
        raw_payload: body.clone(),
    })
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[async_trait]
impl PosAdapter for SquareAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Square
    }

    fn authorization_url(
        &self,
        store_public_id: &str,
        _redirect_uri: &str,
        options: &AuthorizationOptions,
    ) -> Result<String, PosError> {
        // Square redirects to the URL registered on the application.
        let state = OAuthState::new(store_public_id, PosProvider::Square)
            .with_return_url(options.return_url.clone())
            .encode();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth2/authorize", self.base_url()),
            &[
                ("client_id", self.config.app_id.as_str()),
                ("scope", SCOPES),
                ("session", "false"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| PosError::InvalidInput(format!("Invalid authorization URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
        _options: &ProviderOptions,
    ) -> Result<OAuthTokens, PosError> {
        self.token_request(TokenGrant::AuthorizationCode { code }).await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<OAuthTokens, PosError> {
        self.token_request(TokenGrant::RefreshToken { refresh_token })
            .await
    }

    async fn merchant_info(
        &self,
        access_token: &str,
        _options: &ProviderOptions,
    ) -> Result<MerchantInfo, PosError> {
        let merchant: Value = parse_json(
            PosProvider::Square,
            self.get("/v2/merchants/me", access_token).send().await?,
        )
        .await?;
        let merchant = merchant.get("merchant").cloned().unwrap_or(Value::Null);
        let merchant_id = json_id(&merchant, "id")
            .ok_or_else(|| PosError::decode(PosProvider::Square, "merchant has no id"))?;

        let locations: Value = parse_json(
            PosProvider::Square,
            self.get("/v2/locations", access_token).send().await?,
        )
        .await?;
        let locations = locations
            .get("locations")
            .and_then(Value::as_array)
            .map(|all| {
                all.iter()
                    .filter_map(|loc| {
                        Some(MerchantLocation {
                            id: json_id(loc, "id")?,
                            name: json_str(loc, "name")
                                .unwrap_or("Unnamed Location")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(MerchantInfo {
            merchant_id,
            business_name: json_str(&merchant, "business_name")
                .unwrap_or("Unknown Business")
                .to_string(),
            locations,
        })
    }

    async fn get_order(
        &self,
        access_token: &str,
        order_id: &str,
        _options: &ProviderOptions,
    ) -> Result<NormalizedOrder, PosError> {
        let response = self
            .get(&format!("/v2/orders/{order_id}"), access_token)
            .send()
            .await?;
        order_from_response(parse_json(PosProvider::Square, response).await?)
    }

    fn validate_webhook(&self, request: &WebhookRequest<'_>, secret: &str) -> WebhookValidation {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return WebhookValidation::invalid();
        };
        let mut message = Vec::with_capacity(request.notification_url.len() + request.body.len());
        message.extend_from_slice(request.notification_url.as_bytes());
        message.extend_from_slice(request.body);
        if !verify_hmac_sha256(
            secret.as_bytes(),
            &message,
            signature,
            SignatureEncoding::Base64,
        ) {
            return WebhookValidation::invalid();
        }

        let payload: Option<Value> = serde_json::from_slice(request.body).ok();
        WebhookValidation {
            is_valid: true,
            event_id: payload.as_ref().and_then(|p| json_id(p, "event_id")),
            event_type: payload
                .as_ref()
                .and_then(|p| json_str(p, "type"))
                .map(str::to_string),
            payload,
            shop_domain: None,
        }
    }

    fn parse_transaction(&self, payload: &Value) -> Option<NormalizedTransaction> {
        let event_type = json_str(payload, "type")?;
        if !PAYMENT_EVENTS.contains(&event_type) {
            return None;
        }
        let payment = payload.get("data")?.get("object")?.get("payment")?;
        let external_order_id = json_id(payment, "order_id")?;
        let amount = payment.get("amount_money").cloned().unwrap_or(Value::Null);

        Some(NormalizedTransaction {
            external_transaction_id: json_id(payment, "id")
                .unwrap_or_else(|| external_order_id.clone()),
            external_order_id,
            provider: PosProvider::Square,
            amount: money_amount(&amount),
            currency: money_currency(&amount),
            status: map_payment_status(json_str(payment, "status")),
            location_id: json_id(payment, "location_id"),
            merchant_id: json_id(payment, "merchant_id")
                .or_else(|| json_id(payload, "merchant_id")),
            created_at: json_timestamp(payment, "created_at"),
        })
    }
}
