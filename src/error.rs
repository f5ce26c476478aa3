//! Error types

use thiserror::Error;

/// Amount parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid decimal amount: {raw}")]
    Invalid { raw: String },
}

/// Failures reported by wallet / chain collaborators
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Unsupported coin type {coin} for {operation}")]
    UnsupportedCoin { coin: String, operation: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Price unavailable for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

/// Failures surfaced through a quote adapter's `error` field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Insufficient liquidity: {reason}")]
    InsufficientLiquidity { reason: String },

    #[error("Quote backend error {code}: {reason}")]
    Backend { code: String, reason: String },

    #[error("Quote transport error: {0}")]
    Transport(String),

    #[error("Invalid quote response: {0}")]
    InvalidResponse(String),

    #[error("Allowance check failed: {0}")]
    Allowance(String),

    #[error("Swap execution failed: {0}")]
    Execution(String),
}

impl QuoteError {
    /// Backend explicitly says no route exists
    pub fn is_insufficient_liquidity(&self) -> bool {
        matches!(self, QuoteError::InsufficientLiquidity { .. })
    }
}

impl From<WalletError> for QuoteError {
    fn from(err: WalletError) -> Self {
        QuoteError::Transport(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Slippage must be within (0, {max}]%, got {value}")]
    SlippageOutOfRange { value: String, max: String },
}
