//! Wallet and chain collaborators
//!
//! The engine never reaches for ambient globals: every chain read, price lookup
//! and wallet action goes through one of these traits, handed in at construction.

pub mod evm;
pub mod solana;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::WalletError;
use crate::token::{BlockchainToken, CoinType};

pub use evm::EvmClient;
pub use solana::SolanaClient;

/// Balance reads, in the asset's smallest unit
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn get_balance(
        &self,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError>;

    async fn get_token_balance(
        &self,
        contract_address: &str,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError>;
}

/// Spot price of a token as a decimal string in the shared fiat unit
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_token_price(&self, token: &BlockchainToken) -> Result<String, WalletError>;
}

/// Unsigned EVM transaction handed to the wallet for signing and broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransaction {
    pub from: String,
    pub to: String,
    /// 0x-prefixed calldata
    pub data: String,
    /// Native value in wei
    pub value: String,
    pub gas_limit: Option<u64>,
    pub chain_id: String,
}

/// ETH-family wallet adapter
#[async_trait]
pub trait EthWalletAdapter: Send + Sync {
    async fn get_erc20_allowance(
        &self,
        contract_address: &str,
        owner: &str,
        spender: &str,
        chain_id: &str,
    ) -> Result<String, WalletError>;

    /// 0x-prefixed `approve(spender, amount)` calldata
    async fn get_erc20_approve_data(
        &self,
        spender: &str,
        amount: &str,
    ) -> Result<String, WalletError>;

    /// Current gas price in wei
    async fn gas_price(&self, chain_id: &str) -> Result<String, WalletError>;

    /// Returns the transaction hash
    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, WalletError>;
}

/// SOL-family wallet adapter
#[async_trait]
pub trait SolWalletAdapter: Send + Sync {
    async fn lamports_per_signature(&self) -> Result<u64, WalletError>;

    /// Submits a base64 serialized transaction; returns its signature
    async fn send_serialized_transaction(&self, encoded: &str) -> Result<String, WalletError>;
}

/// Routes balance reads to the right chain client by coin family
pub struct MultiChainReader {
    evm: Arc<dyn ChainReader>,
    solana: Arc<dyn ChainReader>,
}

impl MultiChainReader {
    pub fn new(evm: Arc<dyn ChainReader>, solana: Arc<dyn ChainReader>) -> Self {
        Self { evm, solana }
    }

    fn reader_for(&self, coin: CoinType, operation: &str) -> Result<&Arc<dyn ChainReader>, WalletError> {
        match coin {
            CoinType::Eth => Ok(&self.evm),
            CoinType::Sol => Ok(&self.solana),
            other => Err(WalletError::UnsupportedCoin {
                coin: other.to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChainReader for MultiChainReader {
    async fn get_balance(
        &self,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError> {
        self.reader_for(coin, "get_balance")?
            .get_balance(address, coin, chain_id)
            .await
    }

    async fn get_token_balance(
        &self,
        contract_address: &str,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError> {
        self.reader_for(coin, "get_token_balance")?
            .get_token_balance(contract_address, address, coin, chain_id)
            .await
    }
}

/// Collaborators the engine is constructed with
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainReader>,
    pub prices: Arc<dyn PriceSource>,
    pub eth_wallet: Arc<dyn EthWalletAdapter>,
    pub sol_wallet: Arc<dyn SolWalletAdapter>,
}
