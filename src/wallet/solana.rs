//! Solana JSON-RPC client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ChainReader, SolWalletAdapter};
use crate::error::WalletError;
use crate::token::CoinType;

/// Protocol base fee per signature
const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct SolanaClient {
    client: Client,
    rpc_url: String,
}

impl SolanaClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: Client::new(),
            rpc_url: rpc_url.to_string(),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!("Solana RPC {}", method);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        if !status.is_success() {
            return Err(WalletError::Rpc(format!("{} - {}", status, text)));
        }

        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| WalletError::Rpc(format!("Failed to parse RPC response: {}. Body: {}", e, text)))?;

        if let Some(err) = parsed.error {
            return Err(WalletError::Rpc(format!("{} ({})", err.message, err.code)));
        }

        parsed
            .result
            .ok_or_else(|| WalletError::Rpc(format!("{} returned no result", method)))
    }
}

fn ensure_sol(coin: CoinType, operation: &str) -> Result<(), WalletError> {
    if coin == CoinType::Sol {
        Ok(())
    } else {
        Err(WalletError::UnsupportedCoin {
            coin: coin.to_string(),
            operation: operation.to_string(),
        })
    }
}

/// Sums `tokenAmount.amount` across every token account the owner holds for a mint
fn sum_token_accounts(result: &Value) -> Result<String, WalletError> {
    let accounts = result
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| WalletError::Rpc("getTokenAccountsByOwner: missing value".to_string()))?;

    let mut total: u128 = 0;
    for account in accounts {
        let amount = account
            .pointer("/account/data/parsed/info/tokenAmount/amount")
            .and_then(Value::as_str)
            .ok_or_else(|| WalletError::Rpc("token account without amount".to_string()))?;
        let amount: u128 = amount
            .parse()
            .map_err(|_| WalletError::Rpc(format!("invalid token amount {}", amount)))?;
        total = total.saturating_add(amount);
    }

    Ok(total.to_string())
}

#[async_trait]
impl ChainReader for SolanaClient {
    async fn get_balance(
        &self,
        address: &str,
        coin: CoinType,
        _chain_id: &str,
    ) -> Result<String, WalletError> {
        ensure_sol(coin, "get_balance")?;
        let result = self.request("getBalance", json!([address])).await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .map(|lamports| lamports.to_string())
            .ok_or_else(|| WalletError::Rpc("getBalance: missing value".to_string()))
    }

    async fn get_token_balance(
        &self,
        contract_address: &str,
        address: &str,
        coin: CoinType,
        _chain_id: &str,
    ) -> Result<String, WalletError> {
        ensure_sol(coin, "get_token_balance")?;
        let result = self
            .request(
                "getTokenAccountsByOwner",
                json!([address, { "mint": contract_address }, { "encoding": "jsonParsed" }]),
            )
            .await?;
        sum_token_accounts(&result)
    }
}

#[async_trait]
impl SolWalletAdapter for SolanaClient {
    async fn lamports_per_signature(&self) -> Result<u64, WalletError> {
        Ok(LAMPORTS_PER_SIGNATURE)
    }

    async fn send_serialized_transaction(&self, encoded: &str) -> Result<String, WalletError> {
        let result = self
            .request("sendTransaction", json!([encoded, { "encoding": "base64" }]))
            .await
            .map_err(|e| WalletError::Rejected(e.to_string()))?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::Rejected("sendTransaction returned no signature".to_string()))
    }
}
