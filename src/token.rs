//! Token and network value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoinType {
    Eth,
    Sol,
    Fil,
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinType::Eth => write!(f, "ETH"),
            CoinType::Sol => write!(f, "SOL"),
            CoinType::Fil => write!(f, "FIL"),
        }
    }
}

/// Token as supplied by the token list. An empty `contract_address` marks the
/// chain's native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainToken {
    pub contract_address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub is_token: bool,
    pub chain_id: String,
    pub coin: CoinType,
    #[serde(default)]
    pub coingecko_id: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl BlockchainToken {
    pub fn is_native(&self) -> bool {
        self.contract_address.is_empty()
    }

    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(self.coin, &self.chain_id, &self.contract_address)
    }
}

/// Registry key: `(coin, chainId, lowercased contractAddress)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub coin: CoinType,
    pub chain_id: String,
    pub contract_address: String,
}

impl BalanceKey {
    pub fn new(coin: CoinType, chain_id: &str, contract_address: &str) -> Self {
        Self {
            coin,
            chain_id: chain_id.to_string(),
            contract_address: contract_address.to_lowercase(),
        }
    }
}

/// Chain metadata for the selected network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub chain_id: String,
    pub chain_name: String,
    pub coin: CoinType,
    pub symbol: String,
    pub symbol_name: String,
    pub decimals: u32,
    /// Whether gas/fee estimation applies on this network
    pub supports_fee_estimation: bool,
}

impl NetworkInfo {
    /// Native asset synthesized from network metadata
    pub fn native_asset(&self) -> BlockchainToken {
        BlockchainToken {
            contract_address: String::new(),
            name: self.symbol_name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            is_token: false,
            chain_id: self.chain_id.clone(),
            coin: self.coin,
            coingecko_id: String::new(),
            visible: true,
        }
    }

    pub fn ethereum_mainnet() -> Self {
        Self {
            chain_id: "0x1".to_string(),
            chain_name: "Ethereum Mainnet".to_string(),
            coin: CoinType::Eth,
            symbol: "ETH".to_string(),
            symbol_name: "Ethereum".to_string(),
            decimals: 18,
            supports_fee_estimation: true,
        }
    }

    pub fn solana_mainnet() -> Self {
        Self {
            chain_id: "0x65".to_string(),
            chain_name: "Solana Mainnet Beta".to_string(),
            coin: CoinType::Sol,
            symbol: "SOL".to_string(),
            symbol_name: "Solana".to_string(),
            decimals: 9,
            supports_fee_estimation: true,
        }
    }

    /// Numeric chain id for EVM backends (`"0x1"` -> 1)
    pub fn evm_chain_id(&self) -> Option<u64> {
        Self::parse_chain_id(&self.chain_id)
    }

    pub fn parse_chain_id(chain_id: &str) -> Option<u64> {
        let raw = chain_id.trim();
        match raw.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => raw.parse().ok(),
        }
    }
}

/// Multi-route backends address the native asset by its wrapped mint
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Order-router backends address the native asset with this sentinel
pub const NATIVE_EVM_ASSET: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_key_lowercases_address() {
        let a = BalanceKey::new(CoinType::Eth, "0x1", "0xAbC");
        let b = BalanceKey::new(CoinType::Eth, "0x1", "0xabc");
        assert_eq!(a, b);
        assert_ne!(a, BalanceKey::new(CoinType::Eth, "0x89", "0xabc"));
    }

    #[test]
    fn test_native_asset_synthesized() {
        let native = NetworkInfo::ethereum_mainnet().native_asset();
        assert!(native.is_native());
        assert!(!native.is_token);
        assert_eq!(native.decimals, 18);
    }

    #[test]
    fn test_evm_chain_id() {
        assert_eq!(NetworkInfo::ethereum_mainnet().evm_chain_id(), Some(1));
        let mut polygon = NetworkInfo::ethereum_mainnet();
        polygon.chain_id = "0x89".to_string();
        assert_eq!(polygon.evm_chain_id(), Some(137));
    }
}
