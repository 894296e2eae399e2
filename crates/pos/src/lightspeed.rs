//! Lightspeed Retail (R-Series) adapter.
//!
//! Access tokens live for an hour and are refreshed with a form-encoded
//! grant. The API returns a single object where a list has one element, so
//! collection fields are read with [`one_or_many`].

use async_trait::async_trait;
use boutique_core::hashing::sha256_hex;
use boutique_core::money::decimal_to_minor_units;
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
use crate::config::LightspeedConfig;
use crate::error::PosError;
use crate::http::parse_json;

pub const AUTHORIZE_URL: &str = "https://cloud.lightspeedapp.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://cloud.lightspeedapp.com/oauth/access_token";
pub const API_BASE_URL: &str = "https://api.lightspeedapp.com/API/V3";

/// Signature headers, in the order they are checked.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-lightspeed-signature", "x-ls-signature"];

const SCOPES: &str = "employee:orders:read employee:inventory:read";
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
const DEFAULT_EVENT_TYPE: &str = "sale.completed";

pub struct LightspeedAdapter {
    config: LightspeedConfig,
    client: reqwest::Client,
}

impl LightspeedAdapter {
    pub fn new(config: LightspeedConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn get(&self, path: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{API_BASE_URL}{path}"))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn token_request(&self, form: &TokenForm<'_>) -> Result<TokenResponse, PosError> {
        let response = self.client.post(TOKEN_URL).form(form).send().await?;
        parse_json(PosProvider::Lightspeed, response).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TokenForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    account_id: Option<Value>,
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh_token: Option<&str>) -> OAuthTokens {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            expires_at: Some(Utc::now() + Duration::seconds(lifetime)),
            shop_domain: None,
            extra: json!({ "accountId": self.account_id }),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON mapping
// ---------------------------------------------------------------------------

/// Items of a field that may hold one object or an array of them.
pub(crate) fn one_or_many<'a>(value: Option<&'a Value>) -> Vec<&'a Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

fn decimal_field(value: &Value, key: &str) -> Result<i64, PosError> {
    let raw = match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(0),
    };
    decimal_to_minor_units(&raw).map_err(|e| PosError::money(PosProvider::Lightspeed, e))
}

fn is_completed(sale: &Value) -> bool {
    match sale.get("completed") {
        Some(Value::Bool(done)) => *done,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Webhooks send the sale either bare or wrapped in `Sale`.
fn sale_of(payload: &Value) -> &Value {
    payload.get("Sale").unwrap_or(payload)
}

/// Build a [`NormalizedOrder`] from a `Sale/{id}` response.
pub(crate) fn order_from_response(body: Value) -> Result<NormalizedOrder, PosError> {
    let sale = body
        .get("Sale")
        .ok_or_else(|| PosError::decode(PosProvider::Lightspeed, "response has no Sale"))?;
    let external_order_id = json_id(sale, "saleID")
        .ok_or_else(|| PosError::decode(PosProvider::Lightspeed, "sale has no saleID"))?;

    let lines = sale.get("SaleLines").and_then(|l| l.get("SaleLine"));
    let mut line_items = Vec::new();
    for line in one_or_many(lines) {
        line_items.push(LineItem {
            name: json_str(line, "itemDescription")
                .unwrap_or("Item")
                .to_string(),
            quantity: parse_quantity(line.get("unitQuantity")),
            amount: decimal_field(line, "calcSubtotal")?,
        });
    }

    Ok(NormalizedOrder {
        external_order_id,
        provider: PosProvider::Lightspeed,
        total_amount: decimal_field(sale, "calcTotal")?,
        currency: "USD".to_string(),
        line_items,
        created_at: json_timestamp(sale, "createTime"),
        location_id: json_id(sale, "shopID"),
        raw_payload: body.clone(),
    })
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[async_trait]
impl PosAdapter for LightspeedAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Lightspeed
    }

    fn authorization_url(
        &self,
        store_public_id: &str,
        redirect_uri: &str,
        options: &AuthorizationOptions,
    ) -> Result<String, PosError> {
        let state = OAuthState::new(store_public_id, PosProvider::Lightspeed)
            .with_return_url(options.return_url.clone())
            .encode();
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
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
        redirect_uri: &str,
        _options: &ProviderOptions,
    ) -> Result<OAuthTokens, PosError> {
        let token = self
            .token_request(&TokenForm {
                client_id: &self.config.client_id,
                client_secret: self.config.client_secret.expose(),
                grant_type: "authorization_code",
                code: Some(code),
                redirect_uri: Some(redirect_uri),
                refresh_token: None,
            })
            .await?;
        Ok(token.into_tokens(None))
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<OAuthTokens, PosError> {
        let token = self
            .token_request(&TokenForm {
                client_id: &self.config.client_id,
                client_secret: self.config.client_secret.expose(),
                grant_type: "refresh_token",
                code: None,
                redirect_uri: None,
                refresh_token: Some(refresh_token),
            })
            .await?;
        Ok(token.into_tokens(Some(refresh_token)))
    }

    async fn merchant_info(
        &self,
        access_token: &str,
        _options: &ProviderOptions,
    ) -> Result<MerchantInfo, PosError> {
        let body: Value = parse_json(
            PosProvider::Lightspeed,
            self.get("/Account", access_token).send().await?,
        )
        .await?;
        let account = one_or_many(body.get("Account"))
            .into_iter()
            .next()
            .ok_or_else(|| PosError::decode(PosProvider::Lightspeed, "response has no Account"))?;
        let account_id = json_id(account, "accountID")
            .ok_or_else(|| PosError::decode(PosProvider::Lightspeed, "account has no accountID"))?;

        // Shops are optional detail; an error here leaves the list empty.
        let shops = self
            .get(&format!("/Account/{account_id}/Shop"), access_token)
            .send()
            .await?;
        let locations = if shops.status().is_success() {
            let shops: Value = shops
                .json()
                .await
                .map_err(|e| PosError::decode(PosProvider::Lightspeed, e.to_string()))?;
            one_or_many(shops.get("Shop"))
                .into_iter()
                .filter_map(|shop| {
                    Some(MerchantLocation {
                        id: json_id(shop, "shopID")?,
                        name: json_str(shop, "name").unwrap_or("Shop").to_string(),
                    })
                })
                .collect()
        } else {
            tracing::warn!(
                account_id = %account_id,
                status = shops.status().as_u16(),
                "Could not list Lightspeed shops",
            );
            Vec::new()
        };

        Ok(MerchantInfo {
            merchant_id: account_id,
            business_name: json_str(account, "name")
                .unwrap_or("Lightspeed Business")
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
            .get(&format!("/Account/~/Sale/{order_id}"), access_token)
            .send()
            .await?;
        order_from_response(parse_json(PosProvider::Lightspeed, response).await?)
    }

    fn validate_webhook(&self, request: &WebhookRequest<'_>, secret: &str) -> WebhookValidation {
        let Some(signature) = SIGNATURE_HEADERS.iter().find_map(|h| request.header(h)) else {
            return WebhookValidation::invalid();
        };
        if !verify_hmac_sha256(
            secret.as_bytes(),
            request.body,
            signature,
            SignatureEncoding::Hex,
        ) {
            return WebhookValidation::invalid();
        }

        let payload: Option<Value> = serde_json::from_slice(request.body).ok();
        let event_id = event_id(request.body, payload.as_ref());
        let event_type = payload
            .as_ref()
            .and_then(|p| json_str(p, "type"))
            .unwrap_or(DEFAULT_EVENT_TYPE)
            .to_string();

        WebhookValidation {
            is_valid: true,
            event_id: Some(event_id),
            event_type: Some(event_type),
            payload,
            shop_domain: None,
        }
    }

    fn parse_transaction(&self, payload: &Value) -> Option<NormalizedTransaction> {
        let sale = sale_of(payload);
        if !is_completed(sale) {
            return None;
        }
        let sale_id = json_id(sale, "saleID")?;
        let amount = decimal_field(sale, "calcTotal").ok()?;

        Some(NormalizedTransaction {
            external_transaction_id: sale_id.clone(),
            external_order_id: sale_id,
            provider: PosProvider::Lightspeed,
            amount,
            currency: json_str(payload, "currency")
                .unwrap_or("USD")
                .to_uppercase(),
            status: TransactionStatus::Completed,
            location_id: json_id(sale, "shopID"),
            merchant_id: json_id(sale, "accountID").or_else(|| json_id(payload, "accountID")),
            created_at: json_timestamp(sale, "createTime"),
        })
    }
}

/// Event id for a delivery: Lightspeed's own id, or one derived from the
/// sale id and body digest. A sale is delivered once per lifecycle change,
/// so the sale id alone would collide across its updates.
fn event_id(body: &[u8], payload: Option<&Value>) -> String {
    let digest = sha256_hex(body);
    let Some(payload) = payload else {
        return digest;
    };
    if let Some(id) = json_id(payload, "id") {
        return id;
    }
    match json_id(sale_of(payload), "saleID") {
        Some(sale_id) => format!("{sale_id}-{}", &digest[..16]),
        None => digest,
    }
}
