//! Swap engine: form state, the active quote adapter, balances and prices
//!
//! All state lives in one [`SwapState`] behind a lock that is never held across
//! an `.await`. Derived values (validation verdict, submit control, fiat values)
//! are recomputed from that state on every call.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::amount::{has_decimals_overflow, AmountValue};
use crate::balances::{BalanceRefreshPipeline, BalanceRegistry};
use crate::config::{EngineConfig, BRAVE_FEE_DISCOUNT_PERCENT, BRAVE_FEE_PERCENT, FIAT_CURRENCY, MAX_SLIPPAGE_PERCENT};
use crate::error::ConfigError;
use crate::jupiter::JupiterApi;
use crate::quote::{
    AdapterSnapshot, ExchangeOutcome, MultiRouteAdapter, OrderRouterAdapter, QuoteOption, QuoteParams,
    QuoteSourceAdapter, QuoteStore, RefreshOutcome, SwapFee,
};
use crate::spot_prices::{SpotPriceRefresh, SpotPrices};
use crate::token::{BlockchainToken, CoinType, NetworkInfo};
use crate::validation::{is_submit_disabled, submit_button_text, validate_swap, SwapValidationError, ValidationInput};
use crate::wallet::Collaborators;
use crate::zrx::ZeroExApi;

/// Which amount field the user typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSide {
    #[default]
    From,
    To,
}

#[derive(Debug, Clone)]
struct SwapState {
    network: NetworkInfo,
    account: String,
    from_token: Option<BlockchainToken>,
    to_token: Option<BlockchainToken>,
    from_amount: String,
    to_amount: String,
    input_side: InputSide,
    slippage_percent: Decimal,
    quotes: QuoteStore,
    token_list: Vec<BlockchainToken>,
}

impl SwapState {
    /// The dependent amount is left out so that filling it from a quote does
    /// not turn the quote stale.
    fn quote_params(&self) -> QuoteParams {
        let (from_amount, to_amount) = match self.input_side {
            InputSide::From => (self.from_amount.clone(), String::new()),
            InputSide::To => (String::new(), self.to_amount.clone()),
        };
        QuoteParams {
            network: self.network.clone(),
            from_token: self.from_token.clone(),
            to_token: self.to_token.clone(),
            from_amount,
            to_amount,
            slippage_percent: self.slippage_percent,
            from_address: self.account.clone(),
        }
    }

    fn clear_dependent_amount(&mut self) {
        match self.input_side {
            InputSide::From => self.to_amount.clear(),
            InputSide::To => self.from_amount.clear(),
        }
    }
}

/// Optional replacements for the current selection when refreshing
#[derive(Debug, Clone, Default)]
pub struct RefreshOverrides {
    pub account: Option<String>,
    pub network: Option<NetworkInfo>,
    pub from_token: Option<BlockchainToken>,
    pub to_token: Option<BlockchainToken>,
    pub assets: Option<Vec<BlockchainToken>>,
}

pub struct SwapEngine {
    order_router: Arc<dyn QuoteSourceAdapter>,
    multi_route: Arc<dyn QuoteSourceAdapter>,
    balances: BalanceRefreshPipeline,
    spot_prices: SpotPriceRefresh,
    state: RwLock<SwapState>,
}

impl SwapEngine {
    pub fn new(
        config: &EngineConfig,
        collaborators: Collaborators,
        order_router: Arc<dyn QuoteSourceAdapter>,
        multi_route: Arc<dyn QuoteSourceAdapter>,
        network: NetworkInfo,
    ) -> Self {
        let balances = BalanceRefreshPipeline::new(collaborators.chain.clone(), Arc::default())
            .with_chunk_size(config.balance_chunk_size);

        Self {
            order_router,
            multi_route,
            balances,
            spot_prices: SpotPriceRefresh::new(collaborators.prices.clone()),
            state: RwLock::new(SwapState {
                from_token: Some(network.native_asset()),
                network,
                account: String::new(),
                to_token: None,
                from_amount: String::new(),
                to_amount: String::new(),
                input_side: InputSide::From,
                slippage_percent: config.slippage_percent,
                quotes: QuoteStore::default(),
                token_list: Vec::new(),
            }),
        }
    }

    /// Build both adapters over the given backends
    pub fn with_backends(
        config: &EngineConfig,
        collaborators: Collaborators,
        zero_ex: Arc<dyn ZeroExApi>,
        jupiter: Arc<dyn JupiterApi>,
        network: NetworkInfo,
    ) -> Self {
        let order_router = OrderRouterAdapter::new(zero_ex, collaborators.eth_wallet.clone())
            .with_fee(SwapFee::new(BRAVE_FEE_PERCENT, BRAVE_FEE_DISCOUNT_PERCENT), None);
        let multi_route = MultiRouteAdapter::new(jupiter, collaborators.sol_wallet.clone());

        Self::new(config, collaborators, Arc::new(order_router), Arc::new(multi_route), network)
    }

    /// Adapter for the selected network's coin family
    fn active_adapter(&self) -> Option<Arc<dyn QuoteSourceAdapter>> {
        let coin = self.state.read().network.coin;
        [&self.order_router, &self.multi_route]
            .into_iter()
            .find(|adapter| adapter.coin() == coin)
            .cloned()
    }

    fn adapter_snapshot(&self) -> AdapterSnapshot {
        self.active_adapter()
            .map(|adapter| adapter.snapshot())
            .unwrap_or_default()
    }

    /// Reset both adapters and drop quotes derived from the old selection
    fn reset_quotes(&self) {
        self.order_router.reset();
        self.multi_route.reset();
        let mut state = self.state.write();
        state.quotes.clear();
        state.clear_dependent_amount();
    }

    // ---- quotes ----

    /// Re-issue the active adapter's refresh with the current parameters.
    /// Results for parameters that changed meanwhile are discarded.
    pub async fn refresh_quote(&self) -> RefreshOutcome {
        let Some(adapter) = self.active_adapter() else {
            return RefreshOutcome::NotApplicable;
        };
        let params = self.state.read().quote_params();

        let outcome = adapter.refresh(&params).await;

        let mut state = self.state.write();
        if state.quote_params() != params {
            warn!("Discarding {} quote for superseded parameters", adapter.name());
            return RefreshOutcome::Superseded;
        }

        match &outcome {
            RefreshOutcome::Quoted(options) => {
                state.quotes.replace(options.clone());
                let best = options.first();
                match state.input_side {
                    InputSide::From => {
                        state.to_amount = best.map(|o| o.to_amount.format(Some(6))).unwrap_or_default();
                    }
                    InputSide::To => {
                        state.from_amount = best.map(|o| o.from_amount.format(None)).unwrap_or_default();
                    }
                }
            }
            RefreshOutcome::NotApplicable | RefreshOutcome::Failed(_) => {
                state.quotes.clear();
                state.clear_dependent_amount();
            }
            RefreshOutcome::Superseded => {}
        }

        outcome
    }

    /// Exact-input entry. Amounts the from-token cannot represent never reach a backend.
    pub async fn handle_on_set_from_amount(&self, value: &str) -> RefreshOutcome {
        if !self.set_amount(InputSide::From, value) {
            return RefreshOutcome::NotApplicable;
        }
        self.refresh_quote().await
    }

    /// Exact-output entry; the from-amount is back-filled from the quote
    pub async fn handle_on_set_to_amount(&self, value: &str) -> RefreshOutcome {
        if !self.set_amount(InputSide::To, value) {
            return RefreshOutcome::NotApplicable;
        }
        self.refresh_quote().await
    }

    /// Returns whether a quote should be requested
    fn set_amount(&self, side: InputSide, value: &str) -> bool {
        let quotable = {
            let mut state = self.state.write();
            state.input_side = side;
            let token = match side {
                InputSide::From => {
                    state.from_amount = value.to_string();
                    state.from_token.clone()
                }
                InputSide::To => {
                    state.to_amount = value.to_string();
                    state.to_token.clone()
                }
            };
            let overflow = token.is_some_and(|token| has_decimals_overflow(value, &token));
            if value.trim().is_empty() || overflow {
                state.quotes.clear();
                state.clear_dependent_amount();
                false
            } else {
                true
            }
        };

        if !quotable {
            self.order_router.reset();
            self.multi_route.reset();
        }
        quotable
    }

    pub fn quote_options(&self) -> Vec<QuoteOption> {
        self.state.read().quotes.options().to_vec()
    }

    pub fn selected_quote_option_index(&self) -> usize {
        self.state.read().quotes.selected_index()
    }

    pub fn selected_quote_option(&self) -> Option<QuoteOption> {
        self.state.read().quotes.selected().cloned()
    }

    /// Select option `index`: the displayed to-amount follows it and the
    /// adapter executes that route. Out-of-range indices are ignored.
    pub fn on_select_quote_option(&self, index: usize) -> bool {
        {
            let mut state = self.state.write();
            let to_amount = match state.quotes.select(index) {
                Some(option) => option.to_amount.format(Some(6)),
                None => return false,
            };
            state.to_amount = to_amount;
        }

        if let Some(adapter) = self.active_adapter() {
            adapter.select_route(index);
        }
        true
    }

    /// Hand the selected quote to the wallet; allowance verdicts send the approval
    pub async fn submit(&self) -> ExchangeOutcome {
        if self.is_submit_button_disabled() {
            return ExchangeOutcome::NotApplicable;
        }
        let Some(adapter) = self.active_adapter() else {
            return ExchangeOutcome::NotApplicable;
        };
        let params = self.state.read().quote_params();

        info!("Submitting swap through {}", adapter.name());
        adapter.exchange(&params).await
    }

    // ---- selection ----

    /// Selecting the current to-token flips the pair
    pub fn select_from_token(&self, token: BlockchainToken) {
        {
            let mut state = self.state.write();
            if state.to_token.as_ref() == Some(&token) {
                state.to_token = state.from_token.take();
            }
            state.from_token = Some(token);
        }
        self.spot_prices.invalidate();
        self.reset_quotes();
    }

    pub fn select_to_token(&self, token: BlockchainToken) {
        {
            let mut state = self.state.write();
            if state.from_token.as_ref() == Some(&token) {
                state.from_token = state.to_token.take();
            }
            state.to_token = Some(token);
        }
        self.spot_prices.invalidate();
        self.reset_quotes();
    }

    /// Swap the pair and the amounts; the typed amount keeps its value
    pub fn flip_tokens(&self) {
        {
            let mut state = self.state.write();
            let state = &mut *state;
            std::mem::swap(&mut state.from_token, &mut state.to_token);
            std::mem::swap(&mut state.from_amount, &mut state.to_amount);
            state.input_side = match state.input_side {
                InputSide::From => InputSide::To,
                InputSide::To => InputSide::From,
            };
        }
        self.spot_prices.invalidate();
        self.reset_quotes();
    }

    /// New network: from-token becomes its native asset
    pub fn switch_network(&self, network: NetworkInfo) {
        {
            let mut state = self.state.write();
            info!("Switching network to {} ({})", network.chain_name, network.chain_id);
            state.from_token = Some(network.native_asset());
            state.to_token = None;
            state.from_amount.clear();
            state.to_amount.clear();
            state.input_side = InputSide::From;
            state.token_list.clear();
            state.network = network;
        }
        self.balances.invalidate();
        self.spot_prices.invalidate();
        self.reset_quotes();
    }

    /// A different account forgets the previous account's balances
    pub fn set_account(&self, account: &str) {
        let changed = {
            let mut state = self.state.write();
            let changed = state.account != account;
            state.account = account.to_string();
            changed
        };
        if changed {
            self.balances.reset();
        }
        self.reset_quotes();
    }

    pub fn set_token_list(&self, tokens: Vec<BlockchainToken>) {
        self.state.write().token_list = tokens;
    }

    pub fn set_slippage(&self, slippage_percent: Decimal) -> Result<(), ConfigError> {
        if slippage_percent <= Decimal::ZERO || slippage_percent > MAX_SLIPPAGE_PERCENT {
            return Err(ConfigError::SlippageOutOfRange {
                value: slippage_percent.to_string(),
                max: MAX_SLIPPAGE_PERCENT.to_string(),
            });
        }
        self.state.write().slippage_percent = slippage_percent;
        Ok(())
    }

    pub fn network(&self) -> NetworkInfo {
        self.state.read().network.clone()
    }

    pub fn from_amount(&self) -> String {
        self.state.read().from_amount.clone()
    }

    pub fn to_amount(&self) -> String {
        self.state.read().to_amount.clone()
    }

    // ---- validation ----

    pub fn swap_validation_error(&self) -> Option<SwapValidationError> {
        let snapshot = self.adapter_snapshot();
        let balances = self.balances.snapshot();
        let state = self.state.read();

        let from_balance = state
            .from_token
            .as_ref()
            .map(|token| balances.balance_of(token))
            .unwrap_or_default();
        let native_balance = balances.balance_of(&state.network.native_asset());

        validate_swap(&ValidationInput {
            from_amount: &state.from_amount,
            to_amount: &state.to_amount,
            from_token: state.from_token.as_ref(),
            to_token: state.to_token.as_ref(),
            coin: state.network.coin,
            fees_wrapped: &snapshot.network_fee_base,
            from_asset_balance: &from_balance,
            native_asset_balance: &native_balance,
            adapter_error: snapshot.error.as_ref(),
            adapter_has_allowance: snapshot.has_allowance,
            adapter_quote_route_count: snapshot.route_count,
        })
    }

    pub fn is_submit_button_disabled(&self) -> bool {
        let verdict = self.swap_validation_error();
        let loading = self.adapter_snapshot().loading;
        let state = self.state.read();
        is_submit_disabled(verdict, loading, &state.from_amount, &state.to_amount)
    }

    pub fn submit_button_text(&self) -> String {
        let verdict = self.swap_validation_error();
        let state = self.state.read();
        let symbol = state.from_token.as_ref().map(|t| t.symbol.as_str()).unwrap_or_default();
        submit_button_text(verdict, &state.from_amount, &state.to_amount, symbol)
    }

    // ---- balances and prices ----

    /// Base units; undefined when never fetched or the last fetch failed
    pub fn get_cached_asset_balance(&self, token: &BlockchainToken) -> AmountValue {
        self.balances.snapshot().balance_of(token)
    }

    pub fn balances(&self) -> BalanceRegistry {
        self.balances.snapshot()
    }

    /// Refresh balances of the native asset, the selected pair and the token list
    pub async fn refresh_blockchain_state(&self, overrides: RefreshOverrides) -> BalanceRegistry {
        let ticket = self.balances.begin();
        let (account, network, assets) = {
            let state = self.state.read();
            let network = overrides.network.unwrap_or_else(|| state.network.clone());
            let account = overrides.account.unwrap_or_else(|| state.account.clone());

            let mut assets = vec![network.native_asset()];
            assets.extend(overrides.from_token.or_else(|| state.from_token.clone()));
            assets.extend(overrides.to_token.or_else(|| state.to_token.clone()));
            assets.extend(overrides.assets.unwrap_or_else(|| state.token_list.clone()));

            let mut seen = HashSet::new();
            assets.retain(|asset| asset.coin == network.coin && seen.insert(asset.balance_key()));
            (account, network, assets)
        };

        self.balances.refresh_at(ticket, &account, &network, &assets).await
    }

    pub async fn refresh_spot_prices(&self, overrides: RefreshOverrides) -> SpotPrices {
        let ticket = self.spot_prices.begin();
        let (native, from, to) = {
            let state = self.state.read();
            let network = overrides.network.unwrap_or_else(|| state.network.clone());
            (
                network.native_asset(),
                overrides.from_token.or_else(|| state.from_token.clone()),
                overrides.to_token.or_else(|| state.to_token.clone()),
            )
        };

        self.spot_prices.refresh_at(ticket, &native, from.as_ref(), to.as_ref()).await
    }

    pub fn spot_prices(&self) -> SpotPrices {
        self.spot_prices.snapshot()
    }

    /// Percent difference between the selected quote's rate and the spot rate
    /// (maker price / taker price). Undefined when a price is missing or zero.
    pub fn spot_price_delta(&self) -> AmountValue {
        let Some(option) = self.selected_quote_option() else {
            return AmountValue::undefined();
        };
        let prices = self.spot_prices.snapshot();
        let spot_rate = prices.maker().div(&prices.taker());

        option
            .rate
            .minus(&spot_rate)
            .div(&spot_rate)
            .times(&AmountValue::from(100u64))
    }

    /// Display-unit `amount` of `token` in fiat, or `""` without a price
    pub fn fiat_value(&self, amount: &AmountValue, token: &BlockchainToken) -> String {
        let prices = self.spot_prices.snapshot();
        let state = self.state.read();
        let key = token.balance_key();

        let price = if state.from_token.as_ref().is_some_and(|t| t.balance_key() == key) {
            prices.maker()
        } else if state.to_token.as_ref().is_some_and(|t| t.balance_key() == key) {
            prices.taker()
        } else if token.is_native() && token.coin == state.network.coin {
            prices.native()
        } else {
            AmountValue::undefined()
        };

        amount.times(&price).format_as_fiat(FIAT_CURRENCY)
    }

    pub fn coin(&self) -> CoinType {
        self.state.read().network.coin
    }
}
