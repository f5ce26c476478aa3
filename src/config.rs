//! Swap engine configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;

// Order router (0x Swap API)
pub const ZRX_API_BASE: &str = "https://api.0x.org";
pub const ZRX_PRICE_ENDPOINT: &str = "/swap/v1/price";
pub const ZRX_QUOTE_ENDPOINT: &str = "/swap/v1/quote";

// Multi-route router (Jupiter)
pub const JUPITER_API_BASE: &str = "https://quote-api.jup.ag/v1";

// Spot prices
pub const PRICE_API_BASE: &str = "https://api.coingecko.com/api/v3";
pub const FIAT_CURRENCY: &str = "usd";

// RPC defaults
pub const DEFAULT_EVM_RPC: &str = "https://ethereum-rpc.publicnode.com";
pub const DEFAULT_SOLANA_RPC: &str = "https://api.mainnet-beta.solana.com";

/// Assets fetched per balance chunk; also the in-chunk concurrency bound
pub const BALANCE_CHUNK_SIZE: usize = 10;

pub const QUOTE_POLL_INTERVAL_MS: u64 = 10_000;

pub const DEFAULT_SLIPPAGE_PERCENT: Decimal = dec!(0.5);
pub const MAX_SLIPPAGE_PERCENT: Decimal = dec!(50);

// Platform fee applied on top of every quote
pub const BRAVE_FEE_PERCENT: Decimal = dec!(0.875);
pub const BRAVE_FEE_DISCOUNT_PERCENT: Decimal = dec!(0);

/// Gas units assumed when the order router omits an estimate
pub const FALLBACK_SWAP_GAS: u64 = 250_000;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub evm_rpc_url: String,
    pub solana_rpc_url: String,
    pub zrx_api_base: String,
    pub zrx_api_key: Option<String>,
    pub jupiter_api_base: String,
    pub price_api_base: String,
    pub quote_poll_interval: Duration,
    pub slippage_percent: Decimal,
    pub balance_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evm_rpc_url: DEFAULT_EVM_RPC.to_string(),
            solana_rpc_url: DEFAULT_SOLANA_RPC.to_string(),
            zrx_api_base: ZRX_API_BASE.to_string(),
            zrx_api_key: None,
            jupiter_api_base: JUPITER_API_BASE.to_string(),
            price_api_base: PRICE_API_BASE.to_string(),
            quote_poll_interval: Duration::from_millis(QUOTE_POLL_INTERVAL_MS),
            slippage_percent: DEFAULT_SLIPPAGE_PERCENT,
            balance_chunk_size: BALANCE_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let quote_poll_interval = match std::env::var("QUOTE_POLL_INTERVAL_MS") {
            Ok(raw) => Duration::from_millis(raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "QUOTE_POLL_INTERVAL_MS".to_string(),
                value: raw.clone(),
            })?),
            Err(_) => defaults.quote_poll_interval,
        };

        let slippage_percent = match std::env::var("SWAP_SLIPPAGE_PERCENT") {
            Ok(raw) => parse_slippage(&raw)?,
            Err(_) => defaults.slippage_percent,
        };

        Ok(Self {
            evm_rpc_url: std::env::var("SWAP_EVM_RPC_URL").unwrap_or(defaults.evm_rpc_url),
            solana_rpc_url: std::env::var("SWAP_SOLANA_RPC_URL").unwrap_or(defaults.solana_rpc_url),
            zrx_api_base: std::env::var("ZRX_API_BASE").unwrap_or(defaults.zrx_api_base),
            zrx_api_key: std::env::var("ZRX_API_KEY").ok(),
            jupiter_api_base: std::env::var("JUPITER_API_BASE").unwrap_or(defaults.jupiter_api_base),
            price_api_base: std::env::var("PRICE_API_BASE").unwrap_or(defaults.price_api_base),
            quote_poll_interval,
            slippage_percent,
            balance_chunk_size: defaults.balance_chunk_size,
        })
    }

    /// Log configuration on startup for debugging
    pub fn log_config(&self) {
        info!(
            evm_rpc = %self.evm_rpc_url,
            solana_rpc = %self.solana_rpc_url,
            zrx_api = %self.zrx_api_base,
            zrx_key_set = self.zrx_api_key.is_some(),
            jupiter_api = %self.jupiter_api_base,
            price_api = %self.price_api_base,
            poll_ms = self.quote_poll_interval.as_millis() as u64,
            slippage = %self.slippage_percent,
            "swap engine configuration"
        );
    }
}

/// Slippage in percent, bounded to (0, MAX_SLIPPAGE_PERCENT]
pub fn parse_slippage(raw: &str) -> Result<Decimal, ConfigError> {
    let value = Decimal::from_str(raw.trim()).map_err(|_| ConfigError::InvalidValue {
        key: "SWAP_SLIPPAGE_PERCENT".to_string(),
        value: raw.to_string(),
    })?;

    if value <= Decimal::ZERO || value > MAX_SLIPPAGE_PERCENT {
        return Err(ConfigError::SlippageOutOfRange {
            value: value.to_string(),
            max: MAX_SLIPPAGE_PERCENT.to_string(),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slippage_bounds() {
        assert_eq!(parse_slippage("1.5").unwrap(), dec!(1.5));
        assert!(parse_slippage("0").is_err());
        assert!(parse_slippage("51").is_err());
        assert!(parse_slippage("abc").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.balance_chunk_size, 10);
        assert_eq!(config.slippage_percent, dec!(0.5));
    }
}
