//! Jupiter API client (multi-route backend)

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::QuoteError;

const NO_ROUTE_ERROR: &str = "COULD_NOT_FIND_ANY_ROUTE";

/// Amounts arrive as JSON numbers or strings depending on API version
fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub label: String,
    #[serde(deserialize_with = "de_amount")]
    pub in_amount: String,
    #[serde(deserialize_with = "de_amount")]
    pub out_amount: String,
    #[serde(deserialize_with = "de_amount")]
    pub price_impact_pct: String,
    #[serde(default)]
    pub platform_fee: Option<PlatformFee>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformFee {
    #[serde(deserialize_with = "de_amount")]
    pub pct: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterRoute {
    #[serde(deserialize_with = "de_amount")]
    pub in_amount: String,
    #[serde(deserialize_with = "de_amount")]
    pub out_amount: String,
    #[serde(deserialize_with = "de_amount")]
    pub other_amount_threshold: String,
    /// Fraction, e.g. 0.0012 for 0.12%
    #[serde(deserialize_with = "de_amount")]
    pub price_impact_pct: String,
    pub market_infos: Vec<MarketInfo>,
    /// Route exactly as received; posted back verbatim for the swap call
    #[serde(skip)]
    pub raw: Value,
}

/// Routes in the backend's best-first order
#[derive(Debug, Clone, Default)]
pub struct JupiterQuote {
    pub routes: Vec<JupiterRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterErrorBody {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_insufficient_liquidity: Option<bool>,
}

impl JupiterErrorBody {
    pub fn is_insufficient_liquidity(&self) -> bool {
        self.is_insufficient_liquidity.unwrap_or(false)
            || self.error == NO_ROUTE_ERROR
            || self.message.contains("No routes found")
    }
}

impl From<JupiterErrorBody> for QuoteError {
    fn from(body: JupiterErrorBody) -> Self {
        let reason = if body.message.is_empty() { body.error.clone() } else { body.message.clone() };
        if body.is_insufficient_liquidity() {
            QuoteError::InsufficientLiquidity { reason }
        } else {
            QuoteError::Backend {
                code: body
                    .status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| body.error.clone()),
                reason,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JupiterRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Base units of the input mint
    pub amount: String,
    /// Percent
    pub slippage_percent: Decimal,
    pub fee_bps: Option<u32>,
}

/// Serialized transactions for one swap, in submission order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterSwapTransactions {
    #[serde(default)]
    pub setup_transaction: Option<String>,
    pub swap_transaction: String,
    #[serde(default)]
    pub cleanup_transaction: Option<String>,
}

impl JupiterSwapTransactions {
    pub fn ordered(&self) -> Vec<String> {
        self.setup_transaction
            .iter()
            .chain(std::iter::once(&self.swap_transaction))
            .chain(self.cleanup_transaction.iter())
            .cloned()
            .collect()
    }
}

/// Multi-route backend
#[async_trait]
pub trait JupiterApi: Send + Sync {
    async fn quote(&self, request: &JupiterRequest) -> Result<JupiterQuote, QuoteError>;

    async fn swap_transactions(
        &self,
        route: &Value,
        user_public_key: &str,
    ) -> Result<JupiterSwapTransactions, QuoteError>;
}

/// Parse a quote body, keeping each raw route next to its typed view
pub fn parse_quote(body: &str) -> Result<JupiterQuote, QuoteError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| QuoteError::InvalidResponse(format!("Failed to parse Jupiter response: {}", e)))?;

    let routes = parsed
        .get("routes")
        .or_else(|| parsed.get("data"))
        .and_then(Value::as_array)
        .ok_or_else(|| QuoteError::InvalidResponse("Jupiter response has no routes".to_string()))?;

    routes
        .iter()
        .map(|raw| {
            let mut route: JupiterRoute = serde_json::from_value(raw.clone())
                .map_err(|e| QuoteError::InvalidResponse(format!("Invalid Jupiter route: {}", e)))?;
            route.raw = raw.clone();
            Ok(route)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|routes| JupiterQuote { routes })
}

pub struct JupiterClient {
    client: Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, QuoteError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        debug!("Jupiter API status: {}, body length: {}", status, body.len());

        if status.is_success() {
            return Ok(body);
        }

        Err(match serde_json::from_str::<JupiterErrorBody>(&body) {
            Ok(error_body) => error_body.into(),
            Err(_) => QuoteError::Backend {
                code: status.as_u16().to_string(),
                reason: body,
            },
        })
    }
}

#[async_trait]
impl JupiterApi for JupiterClient {
    async fn quote(&self, request: &JupiterRequest) -> Result<JupiterQuote, QuoteError> {
        let mut url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippage={}&onlyDirectRoutes=false",
            self.base_url,
            request.input_mint,
            request.output_mint,
            request.amount,
            request.slippage_percent.normalize()
        );
        if let Some(fee_bps) = request.fee_bps {
            url.push_str(&format!("&feeBps={}", fee_bps));
        }

        debug!("Jupiter API URL: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        parse_quote(&Self::read_body(response).await?)
    }

    async fn swap_transactions(
        &self,
        route: &Value,
        user_public_key: &str,
    ) -> Result<JupiterSwapTransactions, QuoteError> {
        let url = format!("{}/swap", self.base_url);
        let payload = json!({
            "route": route,
            "userPublicKey": user_public_key,
            "wrapUnwrapSOL": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        let body = Self::read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| QuoteError::InvalidResponse(format!("Failed to parse Jupiter swap response: {}", e)))
    }
}
