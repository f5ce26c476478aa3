//! Fixtures and mock collaborators shared by unit tests
//!
//! Every mock records its calls and can be told to fail or to delay.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::amount::AmountValue;
use crate::error::{QuoteError, WalletError};
use crate::jupiter::{JupiterApi, JupiterQuote, JupiterRequest, JupiterRoute, JupiterSwapTransactions, MarketInfo};
use crate::quote::{LiquiditySource, QuoteOption, Routing};
use crate::token::{BlockchainToken, CoinType, NetworkInfo};
use crate::wallet::{ChainReader, EthWalletAdapter, EvmTransaction, PriceSource, SolWalletAdapter};
use crate::zrx::{ZeroExApi, ZeroExQuote, ZeroExRequest, ZeroExSource};

pub fn eth_network() -> NetworkInfo {
    NetworkInfo::ethereum_mainnet()
}

pub fn sol_network() -> NetworkInfo {
    NetworkInfo::solana_mainnet()
}

pub fn erc20_token(contract: &str, symbol: &str, decimals: u32) -> BlockchainToken {
    BlockchainToken {
        contract_address: contract.to_string(),
        name: symbol.to_string(),
        symbol: symbol.to_string(),
        decimals,
        is_token: true,
        chain_id: "0x1".to_string(),
        coin: CoinType::Eth,
        coingecko_id: String::new(),
        visible: true,
    }
}

pub fn spl_token(mint: &str, symbol: &str, decimals: u32) -> BlockchainToken {
    BlockchainToken {
        chain_id: "0x65".to_string(),
        coin: CoinType::Sol,
        ..erc20_token(mint, symbol, decimals)
    }
}

/// ETH -> USDC option with the given display `to_amount`
pub fn sample_quote_option(to_amount: &str) -> QuoteOption {
    let to_amount = AmountValue::new(to_amount);
    QuoteOption {
        from_amount: AmountValue::new("1"),
        to_amount: to_amount.clone(),
        minimum_to_amount: Some(to_amount.clone()),
        from_token: eth_network().native_asset(),
        to_token: erc20_token("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6),
        rate: to_amount,
        price_impact: AmountValue::zero(),
        sources: vec![LiquiditySource {
            name: "Uniswap_V3".to_string(),
            proportion: AmountValue::new("1"),
        }],
        routing: Routing::Split,
        network_fee: "0.003 ETH".to_string(),
        brave_fee: None,
    }
}

/// Price response: 150000 gas at 20 gwei, one zero-proportion venue
pub fn zero_ex_quote(sell_amount: &str, buy_amount: &str) -> ZeroExQuote {
    ZeroExQuote {
        price: "1".to_string(),
        guaranteed_price: None,
        to: None,
        data: None,
        value: None,
        gas: Some("200000".to_string()),
        estimated_gas: Some("150000".to_string()),
        gas_price: Some("20000000000".to_string()),
        buy_amount: buy_amount.to_string(),
        sell_amount: sell_amount.to_string(),
        buy_token_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
        sell_token_address: "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".to_string(),
        allowance_target: "0xdef1c0ded9bec7f1a1670819833240f027b25eff".to_string(),
        estimated_price_impact: Some("0.12".to_string()),
        sources: vec![
            ZeroExSource { name: "Uniswap_V3".to_string(), proportion: "0.7".to_string() },
            ZeroExSource { name: "Curve".to_string(), proportion: "0.3".to_string() },
            ZeroExSource { name: "Balancer".to_string(), proportion: "0".to_string() },
        ],
    }
}

/// 1 SOL in, one market per label
pub fn jupiter_route(out_amount: &str, threshold: &str, labels: &[&str]) -> JupiterRoute {
    let market_infos = labels
        .iter()
        .map(|label| MarketInfo {
            label: label.to_string(),
            in_amount: "1000000000".to_string(),
            out_amount: out_amount.to_string(),
            price_impact_pct: "0.0012".to_string(),
            platform_fee: None,
        })
        .collect();

    JupiterRoute {
        in_amount: "1000000000".to_string(),
        out_amount: out_amount.to_string(),
        other_amount_threshold: threshold.to_string(),
        price_impact_pct: "0.0012".to_string(),
        market_infos,
        raw: json!({
            "inAmount": "1000000000",
            "outAmount": out_amount,
            "otherAmountThreshold": threshold,
        }),
    }
}

/// Chain reader with per-contract balances, failures and latency
#[derive(Default)]
pub struct MockChainReader {
    native_balance: Option<String>,
    /// Native balance and latency per account, overriding the defaults
    accounts: HashMap<String, (String, Duration)>,
    token_balances: HashMap<String, String>,
    failing: HashSet<String>,
    delay: Duration,
    call_tracker: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native_balance(mut self, balance: &str) -> Self {
        self.native_balance = Some(balance.to_string());
        self
    }

    pub fn with_account_native(mut self, account: &str, balance: &str, delay: Duration) -> Self {
        self.accounts.insert(account.to_string(), (balance.to_string(), delay));
        self
    }

    pub fn with_token_balance(mut self, contract: &str, balance: &str) -> Self {
        self.token_balances.insert(contract.to_lowercase(), balance.to_string());
        self
    }

    /// `""` targets the native balance
    pub fn failing_for(mut self, contract: &str) -> Self {
        self.failing.insert(contract.to_lowercase());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.call_tracker.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Contract addresses in request order, `""` for native
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    async fn lookup(&self, key: String, address: &str) -> Result<String, WalletError> {
        self.call_tracker.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(key.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let account = self.accounts.get(address);
        let delay = account.map(|(_, delay)| *delay).unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&key) {
            return Err(WalletError::Rpc(format!("mock failure for {:?}", key)));
        }
        let balance = if key.is_empty() {
            account
                .map(|(balance, _)| balance.clone())
                .or_else(|| self.native_balance.clone())
        } else {
            self.token_balances.get(&key).cloned()
        };
        Ok(balance.unwrap_or_else(|| "0".to_string()))
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn get_balance(&self, address: &str, _coin: CoinType, _chain_id: &str) -> Result<String, WalletError> {
        self.lookup(String::new(), address).await
    }

    async fn get_token_balance(
        &self,
        contract_address: &str,
        address: &str,
        _coin: CoinType,
        _chain_id: &str,
    ) -> Result<String, WalletError> {
        self.lookup(contract_address.to_lowercase(), address).await
    }
}

/// Prices by symbol; unknown symbols fail
#[derive(Default)]
pub struct MockPriceSource {
    prices: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    requested: Mutex<Vec<String>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: &str) -> Self {
        self.prices.insert(symbol.to_string(), price.to_string());
        self
    }

    pub fn with_price_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn get_token_price(&self, token: &BlockchainToken) -> Result<String, WalletError> {
        self.requested.lock().push(token.symbol.clone());
        match self.delays.get(&token.symbol) {
            Some(delay) => tokio::time::sleep(*delay).await,
            None => tokio::task::yield_now().await,
        }
        self.prices
            .get(&token.symbol)
            .cloned()
            .ok_or_else(|| WalletError::PriceUnavailable {
                symbol: token.symbol.clone(),
                reason: "mock has no price".to_string(),
            })
    }
}

pub struct MockEthWallet {
    allowance: String,
    gas_price: String,
    fail_send: bool,
    allowance_tracker: AtomicUsize,
    sent: Mutex<Vec<EvmTransaction>>,
}

impl MockEthWallet {
    /// Unlimited allowance, 20 gwei gas
    pub fn new() -> Self {
        Self {
            allowance: "115792089237316195423570985008687907853269984665640564039457584007913129639935".to_string(),
            gas_price: "20000000000".to_string(),
            fail_send: false,
            allowance_tracker: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_allowance(mut self, allowance: &str) -> Self {
        self.allowance = allowance.to_string();
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn allowance_calls(&self) -> usize {
        self.allowance_tracker.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EvmTransaction> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EthWalletAdapter for MockEthWallet {
    async fn get_erc20_allowance(
        &self,
        _contract_address: &str,
        _owner: &str,
        _spender: &str,
        _chain_id: &str,
    ) -> Result<String, WalletError> {
        self.allowance_tracker.fetch_add(1, Ordering::SeqCst);
        Ok(self.allowance.clone())
    }

    async fn get_erc20_approve_data(&self, spender: &str, amount: &str) -> Result<String, WalletError> {
        Ok(format!("0x095ea7b3{}{}", spender.trim_start_matches("0x"), amount))
    }

    async fn gas_price(&self, _chain_id: &str) -> Result<String, WalletError> {
        Ok(self.gas_price.clone())
    }

    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, WalletError> {
        if self.fail_send {
            return Err(WalletError::Rejected("user rejected".to_string()));
        }
        let mut sent = self.sent.lock();
        sent.push(tx);
        Ok(format!("0x{:064x}", sent.len()))
    }
}

pub struct MockSolWallet {
    lamports_per_signature: u64,
    sent: Mutex<Vec<String>>,
}

impl MockSolWallet {
    pub fn new() -> Self {
        Self {
            lamports_per_signature: 5000,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SolWalletAdapter for MockSolWallet {
    async fn lamports_per_signature(&self) -> Result<u64, WalletError> {
        Ok(self.lamports_per_signature)
    }

    async fn send_serialized_transaction(&self, encoded: &str) -> Result<String, WalletError> {
        let mut sent = self.sent.lock();
        sent.push(encoded.to_string());
        Ok(format!("sig{}", sent.len()))
    }
}

pub struct MockZeroExApi {
    response: Result<ZeroExQuote, QuoteError>,
    delay: Duration,
    call_tracker: AtomicUsize,
    firm_tracker: AtomicUsize,
    requests: Mutex<Vec<ZeroExRequest>>,
}

impl MockZeroExApi {
    pub fn new(quote: ZeroExQuote) -> Self {
        Self::with_response(Ok(quote))
    }

    pub fn failing(error: QuoteError) -> Self {
        Self::with_response(Err(error))
    }

    fn with_response(response: Result<ZeroExQuote, QuoteError>) -> Self {
        Self {
            response,
            delay: Duration::ZERO,
            call_tracker: AtomicUsize::new(0),
            firm_tracker: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.call_tracker.load(Ordering::SeqCst)
    }

    pub fn firm_calls(&self) -> usize {
        self.firm_tracker.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ZeroExRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ZeroExApi for MockZeroExApi {
    async fn price_quote(&self, _chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError> {
        self.call_tracker.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }

    async fn firm_quote(&self, _chain_id: &str, request: &ZeroExRequest) -> Result<ZeroExQuote, QuoteError> {
        self.firm_tracker.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.response.clone()
    }
}

pub struct MockJupiterApi {
    response: Result<JupiterQuote, QuoteError>,
    transactions: JupiterSwapTransactions,
    delay: Duration,
    call_tracker: AtomicUsize,
    requests: Mutex<Vec<JupiterRequest>>,
    swap_routes: Mutex<Vec<Value>>,
}

impl MockJupiterApi {
    pub fn new(quote: JupiterQuote) -> Self {
        Self::with_response(Ok(quote))
    }

    pub fn failing(error: QuoteError) -> Self {
        Self::with_response(Err(error))
    }

    fn with_response(response: Result<JupiterQuote, QuoteError>) -> Self {
        Self {
            response,
            transactions: JupiterSwapTransactions {
                setup_transaction: None,
                swap_transaction: "c3dhcA==".to_string(),
                cleanup_transaction: None,
            },
            delay: Duration::ZERO,
            call_tracker: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            swap_routes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_transactions(mut self, transactions: JupiterSwapTransactions) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.call_tracker.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<JupiterRequest> {
        self.requests.lock().clone()
    }

    /// Raw routes posted to the swap endpoint
    pub fn swap_routes(&self) -> Vec<Value> {
        self.swap_routes.lock().clone()
    }
}

#[async_trait]
impl JupiterApi for MockJupiterApi {
    async fn quote(&self, request: &JupiterRequest) -> Result<JupiterQuote, QuoteError> {
        self.call_tracker.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }

    async fn swap_transactions(
        &self,
        route: &Value,
        _user_public_key: &str,
    ) -> Result<JupiterSwapTransactions, QuoteError> {
        self.swap_routes.lock().push(route.clone());
        Ok(self.transactions.clone())
    }
}
