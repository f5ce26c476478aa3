//! EVM chain reader and wallet backed by an alloy provider

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::str::FromStr;
use tracing::debug;

use super::{ChainReader, EthWalletAdapter, EvmTransaction};
use crate::error::WalletError;
use crate::token::CoinType;

// ERC20 surface used by the swap flow
sol! {
    #[derive(Debug)]
    function balanceOf(address account) external view returns (uint256);

    #[derive(Debug)]
    function allowance(address owner, address spender) external view returns (uint256);

    #[derive(Debug)]
    function approve(address spender, uint256 amount) external returns (bool);
}

pub struct EvmClient<P> {
    provider: P,
}

impl<P: Provider> EvmClient<P> {
    /// `provider` should carry a wallet filler if `send_transaction` is used
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, WalletError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(calldata)));

        self.provider
            .call(tx)
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))
    }
}

fn parse_address(raw: &str) -> Result<Address, WalletError> {
    Address::from_str(raw.trim()).map_err(|_| WalletError::InvalidAddress(raw.to_string()))
}

fn parse_u256(raw: &str) -> Result<U256, WalletError> {
    U256::from_str(raw.trim()).map_err(|e| WalletError::Rpc(format!("invalid amount {}: {}", raw, e)))
}

fn ensure_eth(coin: CoinType, operation: &str) -> Result<(), WalletError> {
    if coin == CoinType::Eth {
        Ok(())
    } else {
        Err(WalletError::UnsupportedCoin {
            coin: coin.to_string(),
            operation: operation.to_string(),
        })
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> ChainReader for EvmClient<P> {
    async fn get_balance(
        &self,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError> {
        ensure_eth(coin, "get_balance")?;
        let owner = parse_address(address)?;

        debug!("eth_getBalance {} on {}", owner, chain_id);
        let balance = self
            .provider
            .get_balance(owner)
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        Ok(balance.to_string())
    }

    async fn get_token_balance(
        &self,
        contract_address: &str,
        address: &str,
        coin: CoinType,
        chain_id: &str,
    ) -> Result<String, WalletError> {
        ensure_eth(coin, "get_token_balance")?;
        let token = parse_address(contract_address)?;
        let owner = parse_address(address)?;

        debug!("balanceOf {} on token {} ({})", owner, token, chain_id);
        let call = balanceOfCall { account: owner };
        let result = self.eth_call(token, call.abi_encode()).await?;
        let balance = balanceOfCall::abi_decode_returns(&result)
            .map_err(|e| WalletError::Rpc(format!("balanceOf decode: {}", e)))?;

        Ok(balance.to_string())
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> EthWalletAdapter for EvmClient<P> {
    async fn get_erc20_allowance(
        &self,
        contract_address: &str,
        owner: &str,
        spender: &str,
        chain_id: &str,
    ) -> Result<String, WalletError> {
        let token = parse_address(contract_address)?;
        let call = allowanceCall {
            owner: parse_address(owner)?,
            spender: parse_address(spender)?,
        };

        debug!("allowance on token {} ({})", token, chain_id);
        let result = self.eth_call(token, call.abi_encode()).await?;
        let allowance = allowanceCall::abi_decode_returns(&result)
            .map_err(|e| WalletError::Rpc(format!("allowance decode: {}", e)))?;

        Ok(allowance.to_string())
    }

    async fn get_erc20_approve_data(
        &self,
        spender: &str,
        amount: &str,
    ) -> Result<String, WalletError> {
        let call = approveCall {
            spender: parse_address(spender)?,
            amount: parse_u256(amount)?,
        };
        Ok(format!("0x{}", hex::encode(call.abi_encode())))
    }

    async fn gas_price(&self, chain_id: &str) -> Result<String, WalletError> {
        debug!("eth_gasPrice on {}", chain_id);
        let price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;
        Ok(price.to_string())
    }

    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, WalletError> {
        let calldata = hex::decode(tx.data.trim_start_matches("0x"))
            .map_err(|e| WalletError::Rejected(format!("invalid calldata: {}", e)))?;

        let mut request = TransactionRequest::default()
            .from(parse_address(&tx.from)?)
            .to(parse_address(&tx.to)?)
            .value(parse_u256(if tx.value.is_empty() { "0" } else { &tx.value })?)
            .input(TransactionInput::new(Bytes::from(calldata)));

        if let Some(gas_limit) = tx.gas_limit {
            request = request.gas_limit(gas_limit);
        }
        if let Some(chain_id) = crate::token::NetworkInfo::parse_chain_id(&tx.chain_id) {
            request = request.with_chain_id(chain_id);
        }

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| WalletError::Rejected(e.to_string()))?;

        Ok(format!("{:?}", pending.tx_hash()))
    }
}
