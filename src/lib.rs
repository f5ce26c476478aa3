//! Swap quote engine
//!
//! Normalizes quotes from an EVM order router and a Solana multi-route router
//! into one comparable model, validates the trade against balances and fees,
//! and keeps balances and spot prices fresh with bounded concurrency.

pub mod amount;
pub mod balances;
pub mod config;
pub mod engine;
pub mod error;
pub mod jupiter;
pub mod poller;
pub mod price;
pub mod quote;
pub mod spot_prices;
pub mod token;
pub mod validation;
pub mod wallet;
pub mod zrx;

#[cfg(test)]
pub(crate) mod test_utils;

pub use amount::AmountValue;
pub use engine::{InputSide, RefreshOverrides, SwapEngine};
pub use error::{AmountError, ConfigError, QuoteError, WalletError};
pub use quote::{QuoteOption, QuoteSourceAdapter};
pub use token::{BlockchainToken, CoinType, NetworkInfo};
pub use validation::SwapValidationError;
