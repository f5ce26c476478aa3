//! Spot price API client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::WalletError;
use crate::token::{BlockchainToken, CoinType};
use crate::wallet::PriceSource;

/// Price API client (CoinGecko-compatible `simple/price` endpoints)
pub struct PriceApiClient {
    client: Client,
    base_url: String,
    vs_currency: String,
}

impl PriceApiClient {
    pub fn new(base_url: &str, vs_currency: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency: vs_currency.to_lowercase(),
        }
    }

    fn url_for(&self, token: &BlockchainToken) -> Option<(String, String)> {
        if let Some(id) = price_id(token) {
            let url = format!(
                "{}/simple/price?ids={}&vs_currencies={}",
                self.base_url, id, self.vs_currency
            );
            return Some((url, id));
        }

        let platform = platform_for(token)?;
        let key = token.contract_address.to_lowercase();
        let url = format!(
            "{}/simple/token_price/{}?contract_addresses={}&vs_currencies={}",
            self.base_url, platform, token.contract_address, self.vs_currency
        );
        Some((url, key))
    }
}

/// Explicit coingecko id, or a well-known id for native assets
fn price_id(token: &BlockchainToken) -> Option<String> {
    if !token.coingecko_id.is_empty() {
        return Some(token.coingecko_id.clone());
    }
    if !token.is_native() {
        return None;
    }
    let id = match token.symbol.to_uppercase().as_str() {
        "ETH" => "ethereum",
        "SOL" => "solana",
        "FIL" => "filecoin",
        "MATIC" | "POL" => "matic-network",
        "BNB" => "binancecoin",
        "AVAX" => "avalanche-2",
        _ => return None,
    };
    Some(id.to_string())
}

fn platform_for(token: &BlockchainToken) -> Option<&'static str> {
    match token.coin {
        CoinType::Sol => Some("solana"),
        CoinType::Eth => match token.chain_id.as_str() {
            "0x1" => Some("ethereum"),
            "0x89" => Some("polygon-pos"),
            "0x38" => Some("binance-smart-chain"),
            "0xa" => Some("optimistic-ethereum"),
            "0xa4b1" => Some("arbitrum-one"),
            "0x2105" => Some("base"),
            _ => None,
        },
        CoinType::Fil => None,
    }
}

/// Extracts `body[key][currency]` as a decimal string
fn extract_price(body: &Value, key: &str, currency: &str) -> Option<String> {
    let value = body.get(key)?.get(currency)?;
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl PriceSource for PriceApiClient {
    async fn get_token_price(&self, token: &BlockchainToken) -> Result<String, WalletError> {
        let (url, key) = self.url_for(token).ok_or_else(|| WalletError::PriceUnavailable {
            symbol: token.symbol.clone(),
            reason: "no price id or platform".to_string(),
        })?;

        debug!("Price API URL: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        if !status.is_success() {
            return Err(WalletError::PriceUnavailable {
                symbol: token.symbol.clone(),
                reason: format!("{} - {}", status, body),
            });
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| WalletError::Rpc(format!("Failed to parse price response: {}", e)))?;

        extract_price(&parsed, &key, &self.vs_currency).ok_or_else(|| WalletError::PriceUnavailable {
            symbol: token.symbol.clone(),
            reason: "missing from response".to_string(),
        })
    }
}
