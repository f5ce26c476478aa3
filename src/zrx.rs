//! 0x Swap API client (order-router backend)

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::{ZRX_API_BASE, ZRX_PRICE_ENDPOINT, ZRX_QUOTE_ENDPOINT};
use crate::error::QuoteError;

const INSUFFICIENT_LIQUIDITY_REASON: &str = "INSUFFICIENT_ASSET_LIQUIDITY";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroExQuote {
    pub price: String,
    #[serde(default)]
    pub guaranteed_price: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(default)]
    pub estimated_gas: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    pub buy_amount: String,
    pub sell_amount: String,
    pub buy_token_address: String,
    pub sell_token_address: String,
    pub allowance_target: String,
    #[serde(default)]
    pub estimated_price_impact: Option<String>,
    #[serde(default)]
    pub sources: Vec<ZeroExSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZeroExSource {
    pub name: String,
    pub proportion: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroExErrorBody {
    pub code: i64,
    pub reason: String,
    #[serde(default)]
    pub validation_errors: Vec<ZeroExValidationError>,
    #[serde(default)]
    pub is_insufficient_liquidity: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZeroExValidationError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub reason: String,
}

impl ZeroExErrorBody {
    pub fn is_insufficient_liquidity(&self) -> bool {
        self.is_insufficient_liquidity.unwrap_or(false)
            || self
                .validation_errors
                .iter()
                .any(|e| e.reason == INSUFFICIENT_LIQUIDITY_REASON)
    }
}

impl From<ZeroExErrorBody> for QuoteError {
    fn from(body: ZeroExErrorBody) -> Self {
        if body.is_insufficient_liquidity() {
            QuoteError::InsufficientLiquidity { reason: body.reason }
        } else {
            QuoteError::Backend {
                code: body.code.to_string(),
                reason: body.reason,
            }
        }
    }
}

/// Exactly one of `sell_amount` / `buy_amount` is set
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroExRequest {
    pub taker_address: String,
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: Option<String>,
    pub buy_amount: Option<String>,
    /// Fraction, e.g. 0.005 for 0.5%
    pub slippage_percentage: Decimal,
    pub gas_price: Option<String>,
    pub fee_recipient: Option<String>,
    /// Fraction of the buy amount
    pub buy_token_percentage_fee: Option<Decimal>,
}

impl ZeroExRequest {
    pub fn query_string(&self) -> String {
        let mut query = format!(
            "sellToken={}&buyToken={}&slippagePercentage={}",
            self.sell_token,
            self.buy_token,
            self.slippage_percentage.normalize()
        );
        if !self.taker_address.is_empty() {
            query.push_str(&format!("&takerAddress={}", self.taker_address));
        }
        if let Some(sell) = &self.sell_amount {
            query.push_str(&format!("&sellAmount={}", sell));
        }
        if let Some(buy) = &self.buy_amount {
            query.push_str(&format!("&buyAmount={}", buy));
        }
        if let Some(gas_price) = &self.gas_price {
            query.push_str(&format!("&gasPrice={}", gas_price));
        }
        if let (Some(recipient), Some(fee)) = (&self.fee_recipient, self.buy_token_percentage_fee) {
            query.push_str(&format!(
                "&feeRecipient={}&buyTokenPercentageFee={}",
                recipient,
                fee.normalize()
            ));
        }
        query
    }
}

/// Order-router backend
#[async_trait]
pub trait ZeroExApi: Send + Sync {
    /// Indicative price quote
    async fn price_quote(&self, chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError>;

    /// Firm quote carrying `to`/`data` for execution
    async fn firm_quote(&self, chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError>;
}

pub struct ZrxClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ZrxClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// 0x serves each chain from its own host
    fn host_for(&self, chain_id: &str) -> String {
        if self.base_url != ZRX_API_BASE {
            return self.base_url.clone();
        }
        let prefix = match chain_id {
            "0x89" => "polygon.",
            "0x38" => "bsc.",
            "0xa" => "optimism.",
            "0xa4b1" => "arbitrum.",
            "0xa86a" => "avalanche.",
            "0xfa" => "fantom.",
            "0xa4ec" => "celo.",
            "0x2105" => "base.",
            _ => "",
        };
        self.base_url.replacen("https://", &format!("https://{}", prefix), 1)
    }

    async fn get(&self, chain_id: &str, endpoint: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError> {
        let url = format!("{}{}?{}", self.host_for(chain_id), endpoint, request.query_string());

        debug!("0x API URL: {}", url);

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.header("0x-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        debug!("0x API status: {}, body length: {}", status, body.len());

        if !status.is_success() {
            return Err(match serde_json::from_str::<ZeroExErrorBody>(&body) {
                Ok(error_body) => error_body.into(),
                Err(_) => QuoteError::Backend {
                    code: status.as_u16().to_string(),
                    reason: body,
                },
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| QuoteError::InvalidResponse(format!("Failed to parse 0x response: {}. Body: {}", e, body)))
    }
}

#[async_trait]
impl ZeroExApi for ZrxClient {
    async fn price_quote(&self, chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError> {
        self.get(chain_id, ZRX_PRICE_ENDPOINT, request).await
    }

    async fn firm_quote(&self, chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError> {
        self.get(chain_id, ZRX_QUOTE_ENDPOINT, request).await
    }
}
