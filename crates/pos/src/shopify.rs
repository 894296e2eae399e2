//! Shopify adapter.
//!
//! Every shop has its own API host, so most calls need the shop domain.
//! Offline access tokens are permanent: there is no refresh token and no
//! expiry.

use std::sync::LazyLock;

use async_trait::async_trait;
use boutique_core::hashing::sha256_hex;
use boutique_core::money::decimal_to_minor_units;
use boutique_core::normalized::{
    LineItem, NormalizedOrder, NormalizedTransaction, TransactionStatus,
};
use boutique_core::oauth_state::OAuthState;
use boutique_core::provider::PosProvider;
use boutique_core::signature::{verify_hmac_sha256, SignatureEncoding};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapter::{
    json_id, json_str, json_timestamp, parse_quantity, AuthorizationOptions, MerchantInfo,
    MerchantLocation, OAuthTokens, PosAdapter, ProviderOptions, WebhookRequest,
    WebhookValidation,
};
use crate::config::ShopifyConfig;
use crate::error::PosError;
use crate::http::{ensure_success, parse_json};

pub const SIGNATURE_HEADER: &str = "x-shopify-hmac-sha256";
pub const TOPIC_HEADER: &str = "x-shopify-topic";
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";
pub const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

const SCOPES: &str = "read_orders,read_products";
const SHOP_SUFFIX: &str = ".myshopify.com";
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Topics subscribed for every connected shop.
pub const WEBHOOK_TOPICS: [&str; 2] = ["orders/paid", "orders/fulfilled"];

static SHOP_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
        .expect("shop host pattern is valid")
});

/// Normalise user input such as `https://Demo.myshopify.com/` or `demo` to
/// `demo.myshopify.com`.
pub fn normalize_shop_domain(raw: &str) -> Result<String, PosError> {
    let lowered = raw.trim().to_ascii_lowercase();
    let host = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered)
        .trim_end_matches('/');
    let shop = if host.ends_with(SHOP_SUFFIX) {
        host.to_string()
    } else {
        format!("{host}{SHOP_SUFFIX}")
    };
    if !SHOP_HOST.is_match(&shop) {
        return Err(PosError::InvalidInput(format!(
            "Invalid Shopify shop domain: {raw}"
        )));
    }
    Ok(shop)
}

fn require_shop(shop: Option<&str>) -> Result<String, PosError> {
    match shop {
        Some(shop) if !shop.trim().is_empty() => normalize_shop_domain(shop),
        _ => Err(PosError::InvalidInput(
            "Shop domain is required for Shopify".into(),
        )),
    }
}

pub struct ShopifyAdapter {
    config: ShopifyConfig,
    client: reqwest::Client,
}

impl ShopifyAdapter {
    pub fn new(config: ShopifyConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn admin_url(&self, shop: &str, path: &str) -> String {
        format!(
            "https://{shop}/admin/api/{}/{path}",
            self.config.api_version
        )
    }

    fn get(&self, shop: &str, path: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.admin_url(shop, path))
            .header(ACCESS_TOKEN_HEADER, access_token)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    scope: Option<String>,
}

#[derive(Serialize)]
struct WebhookSubscription<'a> {
    webhook: WebhookSubscriptionBody<'a>,
}

#[derive(Serialize)]
struct WebhookSubscriptionBody<'a> {
    topic: &'a str,
    address: &'a str,
    format: &'static str,
}

// ---------------------------------------------------------------------------
// JSON mapping
// ---------------------------------------------------------------------------

/// Minor units of a decimal field; missing means zero.
fn decimal_field(value: &Value, key: &str) -> Result<i64, PosError> {
    let raw = match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(0),
    };
    decimal_to_minor_units(&raw).map_err(|e| PosError::money(PosProvider::Shopify, e))
}

fn currency(value: &Value) -> String {
    json_str(value, "currency").unwrap_or("USD").to_uppercase()
}

/// Build a [`NormalizedOrder`] from an `orders/{id}.json` response.
pub(crate) fn order_from_response(body: Value) -> Result<NormalizedOrder, PosError> {
    let order = body
        .get("order")
        .ok_or_else(|| PosError::decode(PosProvider::Shopify, "response has no order"))?;
    let external_order_id = json_id(order, "id")
        .ok_or_else(|| PosError::decode(PosProvider::Shopify, "order has no id"))?;

    let mut line_items = Vec::new();
    for item in order
        .get("line_items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let quantity = parse_quantity(item.get("quantity"));
        let amount = decimal_field(item, "price")?
            .checked_mul(quantity)
            .ok_or_else(|| PosError::decode(PosProvider::Shopify, "line amount overflow"))?;
        let name = json_str(item, "title")
            .or_else(|| json_str(item, "name"))
            .unwrap_or("Item");
        line_items.push(LineItem {
            name: name.to_string(),
            quantity,
            amount,
        });
    }

    Ok(NormalizedOrder {
        external_order_id,
        provider: PosProvider::Shopify,
        total_amount: decimal_field(order, "total_price")?,
        currency: currency(order),
        line_items,
        created_at: json_timestamp(order, "created_at"),
        location_id: json_id(order, "location_id"),
        raw_payload: body.clone(),
    })
}

/// Event id for a delivery: Shopify's own webhook id, or one derived from
/// the order id, topic and body digest.
fn event_id(request: &WebhookRequest<'_>, payload: Option<&Value>, topic: &str) -> Option<String> {
    if let Some(id) = request.header(WEBHOOK_ID_HEADER) {
        return Some(id.to_string());
    }
    let order_id = json_id(payload?, "id")?;
    let digest = sha256_hex(request.body);
    Some(format!("{order_id}-{topic}-{}", &digest[..16]))
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[async_trait]
impl PosAdapter for ShopifyAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Shopify
    }

    fn authorization_url(
        &self,
        store_public_id: &str,
        redirect_uri: &str,
        options: &AuthorizationOptions,
    ) -> Result<String, PosError> {
        let shop = require_shop(options.shop.as_deref())?;
        let state = OAuthState::new(store_public_id, PosProvider::Shopify)
            .with_shop_domain(Some(shop.clone()))
            .with_return_url(options.return_url.clone())
            .encode();
        let url = reqwest::Url::parse_with_params(
            &format!("https://{shop}/admin/oauth/authorize"),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("scope", SCOPES),
                ("redirect_uri", redirect_uri),
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
        options: &ProviderOptions,
    ) -> Result<OAuthTokens, PosError> {
        let shop = require_shop(options.shop.as_deref())?;
        let response = self
            .client
            .post(format!("https://{shop}/admin/oauth/access_token"))
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: self.config.client_secret.expose(),
                code,
            })
            .send()
            .await?;
        let token: TokenResponse = parse_json(PosProvider::Shopify, response).await?;
        Ok(OAuthTokens {
            access_token: token.access_token,
            refresh_token: None,
            expires_at: None,
            shop_domain: Some(shop),
            extra: json!({ "scope": token.scope }),
        })
    }

    async fn refresh_tokens(&self, _refresh_token: &str) -> Result<OAuthTokens, PosError> {
        Err(PosError::Unsupported {
            provider: PosProvider::Shopify,
            operation: "token refresh",
        })
    }

    fn needs_refresh(&self, _expires_at: Option<boutique_core::types::Timestamp>) -> bool {
        false
    }

    async fn merchant_info(
        &self,
        access_token: &str,
        options: &ProviderOptions,
    ) -> Result<MerchantInfo, PosError> {
        let shop = require_shop(options.shop.as_deref())?;
        let body: Value = parse_json(
            PosProvider::Shopify,
            self.get(&shop, "shop.json", access_token).send().await?,
        )
        .await?;
        let info = body
            .get("shop")
            .ok_or_else(|| PosError::decode(PosProvider::Shopify, "response has no shop"))?;
        let shop_id = json_id(info, "id")
            .ok_or_else(|| PosError::decode(PosProvider::Shopify, "shop has no id"))?;
        let name = json_str(info, "name");

        Ok(MerchantInfo {
            merchant_id: shop_id.clone(),
            business_name: name.unwrap_or(&shop).to_string(),
            // Shopify has no POS locations here; the shop stands in for one.
            locations: vec![MerchantLocation {
                id: shop_id,
                name: name.unwrap_or("Online Store").to_string(),
            }],
        })
    }

    async fn get_order(
        &self,
        access_token: &str,
        order_id: &str,
        options: &ProviderOptions,
    ) -> Result<NormalizedOrder, PosError> {
        let shop = require_shop(options.shop.as_deref())?;
        let response = self
            .get(&shop, &format!("orders/{order_id}.json"), access_token)
            .send()
            .await?;
        order_from_response(parse_json(PosProvider::Shopify, response).await?)
    }

    fn validate_webhook(&self, request: &WebhookRequest<'_>, secret: &str) -> WebhookValidation {
        let Some(signature) = request.header(SIGNATURE_HEADER) else {
            return WebhookValidation::invalid();
        };
        if !verify_hmac_sha256(
            secret.as_bytes(),
            request.body,
            signature,
            SignatureEncoding::Base64,
        ) {
            return WebhookValidation::invalid();
        }

        let payload: Option<Value> = serde_json::from_slice(request.body).ok();
        let topic = request.header(TOPIC_HEADER).unwrap_or("unknown");
        WebhookValidation {
            is_valid: true,
            event_id: event_id(request, payload.as_ref(), topic),
            event_type: Some(topic.to_string()),
            payload,
            shop_domain: request
                .header(SHOP_DOMAIN_HEADER)
                .map(|s| s.to_ascii_lowercase()),
        }
    }

    fn parse_transaction(&self, payload: &Value) -> Option<NormalizedTransaction> {
        if json_str(payload, "financial_status") != Some("paid") {
            return None;
        }
        let order_id = json_id(payload, "id")?;
        // An unparseable total is not actionable.
        let amount = decimal_field(payload, "total_price").ok()?;

        Some(NormalizedTransaction {
            external_transaction_id: order_id.clone(),
            external_order_id: order_id,
            provider: PosProvider::Shopify,
            amount,
            currency: currency(payload),
            status: TransactionStatus::Completed,
            location_id: json_id(payload, "location_id"),
            merchant_id: json_id(payload, "shop_id"),
            created_at: json_timestamp(payload, "created_at"),
        })
    }

    async fn register_webhooks(
        &self,
        access_token: &str,
        options: &ProviderOptions,
        callback_url: &str,
    ) -> Result<(), PosError> {
        let shop = require_shop(options.shop.as_deref())?;
        for topic in WEBHOOK_TOPICS {
            let request = self
                .client
                .post(self.admin_url(&shop, "webhooks.json"))
                .header(ACCESS_TOKEN_HEADER, access_token)
                .json(&WebhookSubscription {
                    webhook: WebhookSubscriptionBody {
                        topic,
                        address: callback_url,
                        format: "json",
                    },
                });
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(shop = %shop, topic, error = %e, "Failed to register Shopify webhook");
                    continue;
                }
            };
            if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
                tracing::debug!(shop = %shop, topic, "Shopify webhook already registered");
                continue;
            }
            match ensure_success(PosProvider::Shopify, response).await {
                Ok(_) => tracing::info!(shop = %shop, topic, "Registered Shopify webhook"),
                Err(e) => {
                    tracing::warn!(shop = %shop, topic, error = %e, "Failed to register Shopify webhook")
                }
            }
        }
        Ok(())
    }
}
