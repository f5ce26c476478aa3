//! Order-router adapter (single route per quote, EVM)

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    AdapterSnapshot, ExchangeOutcome, LiquiditySource, QuoteOption, QuoteParams, QuoteSourceAdapter,
    RefreshOutcome, RequestGate, Routing, SwapFee,
};
use crate::amount::AmountValue;
use crate::config::FALLBACK_SWAP_GAS;
use crate::error::QuoteError;
use crate::token::{BlockchainToken, CoinType, NetworkInfo, NATIVE_EVM_ASSET};
use crate::wallet::{EthWalletAdapter, EvmTransaction};
use crate::zrx::{ZeroExApi, ZeroExQuote, ZeroExRequest};

#[derive(Default)]
struct OrderRouterState {
    snapshot: AdapterSnapshot,
    last_quote: Option<ZeroExQuote>,
}

pub struct OrderRouterAdapter {
    api: Arc<dyn ZeroExApi>,
    wallet: Arc<dyn EthWalletAdapter>,
    fee: Option<SwapFee>,
    fee_recipient: Option<String>,
    gate: RequestGate<OrderRouterState>,
}

impl OrderRouterAdapter {
    pub fn new(api: Arc<dyn ZeroExApi>, wallet: Arc<dyn EthWalletAdapter>) -> Self {
        Self {
            api,
            wallet,
            fee: None,
            fee_recipient: None,
            gate: RequestGate::default(),
        }
    }

    /// Charge `fee` on the buy side, paid to `recipient`
    pub fn with_fee(mut self, fee: SwapFee, recipient: Option<String>) -> Self {
        self.fee = Some(fee);
        self.fee_recipient = recipient;
        self
    }

    fn build_request(&self, params: &QuoteParams) -> Option<ZeroExRequest> {
        let (from, to) = params.tokens()?;

        let (sell_amount, buy_amount) = if !params.from_amount.trim().is_empty() {
            (Some(to_base_units(&params.from_amount, from)?), None)
        } else if !params.to_amount.trim().is_empty() {
            (None, Some(to_base_units(&params.to_amount, to)?))
        } else {
            return None;
        };

        Some(ZeroExRequest {
            taker_address: params.from_address.clone(),
            sell_token: token_param(from),
            buy_token: token_param(to),
            sell_amount,
            buy_amount,
            slippage_percentage: params.slippage_percent / Decimal::ONE_HUNDRED,
            gas_price: None,
            fee_recipient: self.fee_recipient.clone(),
            buy_token_percentage_fee: self
                .fee
                .map(|fee| fee.effective_fee_percent / Decimal::ONE_HUNDRED),
        })
    }

    /// gasPrice x gas, in wei. Undefined when no gas price is obtainable.
    async fn estimate_network_fee(&self, quote: &ZeroExQuote, network: &NetworkInfo) -> AmountValue {
        let gas = quote
            .estimated_gas
            .as_deref()
            .or(quote.gas.as_deref())
            .map(AmountValue::new)
            .filter(|gas| !gas.is_undefined())
            .unwrap_or_else(|| AmountValue::from(FALLBACK_SWAP_GAS));

        let gas_price = match &quote.gas_price {
            Some(price) => AmountValue::new(price),
            None => match self.wallet.gas_price(&network.chain_id).await {
                Ok(price) => AmountValue::new(&price),
                Err(e) => {
                    warn!("Gas price unavailable on {}: {}", network.chain_id, e);
                    AmountValue::undefined()
                }
            },
        };

        gas.times(&gas_price)
    }

    /// Native sells need no approval
    async fn check_allowance(
        &self,
        quote: &ZeroExQuote,
        from: &BlockchainToken,
        owner: &str,
    ) -> Result<bool, QuoteError> {
        if from.is_native() {
            return Ok(true);
        }
        if owner.is_empty() {
            return Ok(false);
        }

        let allowance = self
            .wallet
            .get_erc20_allowance(&from.contract_address, owner, &quote.allowance_target, &from.chain_id)
            .await
            .map_err(|e| QuoteError::Allowance(e.to_string()))?;

        Ok(AmountValue::new(&allowance).gte(&AmountValue::new(&quote.sell_amount)))
    }

    async fn send_approval(
        &self,
        quote: &ZeroExQuote,
        from: &BlockchainToken,
        params: &QuoteParams,
    ) -> Result<String, QuoteError> {
        let data = self
            .wallet
            .get_erc20_approve_data(&quote.allowance_target, &quote.sell_amount)
            .await?;

        info!("Approving {} for spender {}", from.symbol, quote.allowance_target);

        self.wallet
            .send_transaction(EvmTransaction {
                from: params.from_address.clone(),
                to: from.contract_address.clone(),
                data,
                value: "0".to_string(),
                gas_limit: None,
                chain_id: params.network.chain_id.clone(),
            })
            .await
            .map_err(|e| QuoteError::Execution(e.to_string()))
    }

    async fn send_swap(
        &self,
        request: &ZeroExRequest,
        from: &BlockchainToken,
        params: &QuoteParams,
    ) -> Result<String, QuoteError> {
        let firm = self.api.firm_quote(&params.network.chain_id, request).await?;

        let to = firm
            .to
            .clone()
            .ok_or_else(|| QuoteError::InvalidResponse("firm quote without `to`".to_string()))?;
        let data = firm
            .data
            .clone()
            .ok_or_else(|| QuoteError::InvalidResponse("firm quote without `data`".to_string()))?;
        let value = match &firm.value {
            Some(value) => value.clone(),
            None if from.is_native() => firm.sell_amount.clone(),
            None => "0".to_string(),
        };

        info!("Submitting swap {} -> {} via {}", firm.sell_token_address, firm.buy_token_address, to);

        self.wallet
            .send_transaction(EvmTransaction {
                from: params.from_address.clone(),
                to,
                data,
                value,
                gas_limit: firm.gas.as_deref().and_then(|g| g.parse().ok()),
                chain_id: params.network.chain_id.clone(),
            })
            .await
            .map_err(|e| QuoteError::Execution(e.to_string()))
    }
}

/// Display amount -> base units; rejects amounts the token cannot represent
fn to_base_units(amount: &str, token: &BlockchainToken) -> Option<String> {
    let base = AmountValue::new(amount).multiply_by_decimals(token.decimals);
    if base.is_undefined() || base.is_zero() || base.has_fractional_digits() {
        return None;
    }
    Some(base.format(None))
}

fn token_param(token: &BlockchainToken) -> String {
    if token.is_native() {
        NATIVE_EVM_ASSET.to_string()
    } else {
        token.contract_address.clone()
    }
}

/// Normalize one order-router response into its single quote option
pub fn normalize_quote(
    quote: &ZeroExQuote,
    from: &BlockchainToken,
    to: &BlockchainToken,
    network: &NetworkInfo,
    fee_base: &AmountValue,
    brave_fee: Option<SwapFee>,
) -> Result<QuoteOption, QuoteError> {
    let to_amount = AmountValue::new(&quote.buy_amount).divide_by_decimals(to.decimals);
    let from_amount = AmountValue::new(&quote.sell_amount).divide_by_decimals(from.decimals);

    if to_amount.is_undefined() || from_amount.is_undefined() {
        return Err(QuoteError::InvalidResponse(format!(
            "unparseable amounts buy={} sell={}",
            quote.buy_amount, quote.sell_amount
        )));
    }

    let sources = quote
        .sources
        .iter()
        .map(|s| LiquiditySource {
            name: s.name.clone(),
            proportion: AmountValue::new(&s.proportion),
        })
        .filter(|s| s.proportion.gt(&AmountValue::zero()))
        .collect();

    Ok(QuoteOption {
        rate: to_amount.div(&from_amount),
        minimum_to_amount: Some(to_amount.clone()),
        from_amount,
        to_amount,
        from_token: from.clone(),
        to_token: to.clone(),
        price_impact: AmountValue::new(quote.estimated_price_impact.as_deref().unwrap_or("")),
        sources,
        routing: Routing::Split,
        network_fee: fee_base
            .divide_by_decimals(network.decimals)
            .format_as_asset(Some(6), &network.symbol),
        brave_fee,
    })
}

#[async_trait]
impl QuoteSourceAdapter for OrderRouterAdapter {
    fn name(&self) -> &'static str {
        "order-router"
    }

    fn coin(&self) -> CoinType {
        CoinType::Eth
    }

    async fn refresh(&self, params: &QuoteParams) -> RefreshOutcome {
        let Some(request) = self.build_request(params) else {
            self.gate.invalidate(|s| *s = OrderRouterState::default());
            return RefreshOutcome::NotApplicable;
        };
        let Some((from, to)) = params.tokens() else {
            return RefreshOutcome::NotApplicable;
        };

        let ticket = self.gate.issue(|s| s.snapshot.loading = true);
        debug!("Order-router quote {} -> {}", from.symbol, to.symbol);

        let quote = match self.api.price_quote(&params.network.chain_id, &request).await {
            Ok(quote) => quote,
            Err(err) => {
                warn!("Order-router quote failed: {}", err);
                return self
                    .gate
                    .commit(ticket, |s| {
                        s.last_quote = None;
                        s.snapshot = AdapterSnapshot {
                            error: Some(err.clone()),
                            ..AdapterSnapshot::default()
                        };
                    })
                    .map(|_| RefreshOutcome::Failed(err))
                    .unwrap_or(RefreshOutcome::Superseded);
            }
        };

        let fee_base = self.estimate_network_fee(&quote, &params.network).await;
        let option = match normalize_quote(&quote, from, to, &params.network, &fee_base, self.fee) {
            Ok(option) => option,
            Err(err) => {
                warn!("Order-router response rejected: {}", err);
                return self
                    .gate
                    .commit(ticket, |s| {
                        s.last_quote = None;
                        s.snapshot = AdapterSnapshot {
                            error: Some(err.clone()),
                            ..AdapterSnapshot::default()
                        };
                    })
                    .map(|_| RefreshOutcome::Failed(err))
                    .unwrap_or(RefreshOutcome::Superseded);
            }
        };

        let allowance = self.check_allowance(&quote, from, &params.from_address).await;
        let network_fee = fee_base.divide_by_decimals(params.network.decimals);
        let options = vec![option];

        self.gate
            .commit(ticket, |s| {
                let (has_allowance, error) = match &allowance {
                    Ok(has) => (*has, None),
                    Err(err) => (false, Some(err.clone())),
                };
                s.snapshot = AdapterSnapshot {
                    loading: false,
                    error,
                    network_fee,
                    network_fee_base: fee_base,
                    quote_options: options.clone(),
                    has_allowance,
                    route_count: Some(1),
                    selected_route: 0,
                };
                s.last_quote = Some(quote);
            })
            .map(|_| match allowance {
                Ok(_) => RefreshOutcome::Quoted(options),
                Err(err) => {
                    warn!("Allowance check failed: {}", err);
                    RefreshOutcome::Failed(err)
                }
            })
            .unwrap_or(RefreshOutcome::Superseded)
    }

    async fn exchange(&self, params: &QuoteParams) -> ExchangeOutcome {
        let (Some(request), Some((from, _))) = (self.build_request(params), params.tokens()) else {
            return ExchangeOutcome::NotApplicable;
        };
        if params.from_address.is_empty() {
            return ExchangeOutcome::NotApplicable;
        }

        let (has_allowance, last_quote) =
            self.gate.read(|s| (s.snapshot.has_allowance, s.last_quote.clone()));
        let Some(quote) = last_quote else {
            return ExchangeOutcome::NotApplicable;
        };

        let result = if !has_allowance && !from.is_native() {
            self.send_approval(&quote, from, params).await.map(|hash| (hash, true))
        } else {
            self.send_swap(&request, from, params).await.map(|hash| (hash, false))
        };

        match result {
            Ok((hash, approval)) => ExchangeOutcome::Submitted {
                tx_ids: vec![hash],
                approval,
            },
            Err(err) => {
                warn!("Order-router exchange failed: {}", err);
                self.gate.update(|s| s.snapshot.error = Some(err.clone()));
                ExchangeOutcome::Failed(err)
            }
        }
    }

    fn reset(&self) {
        self.gate.invalidate(|s| *s = OrderRouterState::default());
    }

    fn snapshot(&self) -> AdapterSnapshot {
        self.gate.read(|s| s.snapshot.clone())
    }
}
