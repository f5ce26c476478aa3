//! Multi-route adapter (one option per route, SOL)

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    parse_liquidity_sources, AdapterSnapshot, ExchangeOutcome, LiquiditySource, QuoteOption, QuoteParams,
    QuoteSourceAdapter, RefreshOutcome, RequestGate, Routing, SwapFee,
};
use crate::amount::AmountValue;
use crate::error::QuoteError;
use crate::jupiter::{JupiterApi, JupiterRequest, JupiterRoute};
use crate::token::{BlockchainToken, CoinType, NetworkInfo, WRAPPED_SOL_MINT};
use crate::wallet::SolWalletAdapter;

#[derive(Default)]
struct MultiRouteState {
    snapshot: AdapterSnapshot,
    routes: Vec<JupiterRoute>,
    lamports_per_signature: Option<u64>,
}

pub struct MultiRouteAdapter {
    api: Arc<dyn JupiterApi>,
    wallet: Arc<dyn SolWalletAdapter>,
    fee_bps: Option<u32>,
    gate: RequestGate<MultiRouteState>,
}

impl MultiRouteAdapter {
    pub fn new(api: Arc<dyn JupiterApi>, wallet: Arc<dyn SolWalletAdapter>) -> Self {
        Self {
            api,
            wallet,
            fee_bps: None,
            gate: RequestGate::default(),
        }
    }

    /// Platform fee requested from the backend, in basis points
    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = Some(fee_bps);
        self
    }

    /// Exact-input only
    fn build_request(&self, params: &QuoteParams) -> Option<JupiterRequest> {
        let (from, to) = params.tokens()?;
        if params.from_amount.trim().is_empty() {
            return None;
        }

        let amount = AmountValue::new(&params.from_amount).multiply_by_decimals(from.decimals);
        if amount.is_undefined() || amount.is_zero() || amount.has_fractional_digits() {
            return None;
        }

        Some(JupiterRequest {
            input_mint: mint_for(from),
            output_mint: mint_for(to),
            amount: amount.format(None),
            slippage_percent: params.slippage_percent,
            fee_bps: self.fee_bps,
        })
    }

    async fn lamports_per_signature(&self) -> Option<u64> {
        if let Some(cached) = self.gate.read(|s| s.lamports_per_signature) {
            return Some(cached);
        }
        match self.wallet.lamports_per_signature().await {
            Ok(lamports) => {
                self.gate.update(|s| s.lamports_per_signature = Some(lamports));
                Some(lamports)
            }
            Err(e) => {
                warn!("Fee rate unavailable: {}", e);
                None
            }
        }
    }
}

fn mint_for(token: &BlockchainToken) -> String {
    if token.is_native() {
        WRAPPED_SOL_MINT.to_string()
    } else {
        token.contract_address.clone()
    }
}

/// Fee in lamports for `signatures` signatures; undefined without a rate
fn signature_fee(lamports_per_signature: Option<u64>, signatures: usize) -> AmountValue {
    match lamports_per_signature {
        Some(lamports) => AmountValue::from(lamports).times(&AmountValue::from(signatures as u64)),
        None => AmountValue::undefined(),
    }
}

fn platform_fee(route: &JupiterRoute) -> Option<SwapFee> {
    route
        .market_infos
        .iter()
        .filter_map(|info| info.platform_fee.as_ref())
        .filter_map(|fee| {
            Decimal::from_str(&fee.pct)
                .or_else(|_| Decimal::from_scientific(&fee.pct))
                .ok()
        })
        .find(|pct| !pct.is_zero())
        .map(|pct| SwapFee::new(pct, Decimal::ZERO))
}

/// Normalize one backend route
pub fn normalize_route(
    route: &JupiterRoute,
    from: &BlockchainToken,
    to: &BlockchainToken,
    network: &NetworkInfo,
    fee_base: &AmountValue,
) -> Result<QuoteOption, QuoteError> {
    let from_amount = AmountValue::new(&route.in_amount).divide_by_decimals(from.decimals);
    let to_amount = AmountValue::new(&route.out_amount).divide_by_decimals(to.decimals);
    let minimum_to_amount =
        AmountValue::new(&route.other_amount_threshold).divide_by_decimals(to.decimals);

    if from_amount.is_undefined() || to_amount.is_undefined() {
        return Err(QuoteError::InvalidResponse(format!(
            "unparseable route amounts in={} out={}",
            route.in_amount, route.out_amount
        )));
    }

    let routing = if route.market_infos.len() > 1 {
        Routing::Flow
    } else {
        Routing::Split
    };

    Ok(QuoteOption {
        rate: minimum_to_amount.div(&from_amount),
        from_amount,
        to_amount,
        minimum_to_amount: Some(minimum_to_amount).filter(|m| !m.is_undefined()),
        from_token: from.clone(),
        to_token: to.clone(),
        price_impact: AmountValue::new(&route.price_impact_pct).times(&AmountValue::from(100u64)),
        sources: hop_sources(route),
        routing,
        network_fee: fee_base
            .divide_by_decimals(network.decimals)
            .format_as_asset(Some(6), &network.symbol),
        brave_fee: platform_fee(route),
    })
}

/// Sources of every hop, each hop weighted by `1 / hops` so a route sums to 1
fn hop_sources(route: &JupiterRoute) -> Vec<LiquiditySource> {
    let hops = AmountValue::from(route.market_infos.len().max(1) as u64);
    route
        .market_infos
        .iter()
        .flat_map(|info| parse_liquidity_sources(&info.label))
        .map(|source| LiquiditySource {
            proportion: source.proportion.div(&hops),
            ..source
        })
        .collect()
}

#[async_trait]
impl QuoteSourceAdapter for MultiRouteAdapter {
    fn name(&self) -> &'static str {
        "multi-route"
    }

    fn coin(&self) -> CoinType {
        CoinType::Sol
    }

    async fn refresh(&self, params: &QuoteParams) -> RefreshOutcome {
        let (Some(request), Some((from, to))) = (self.build_request(params), params.tokens()) else {
            self.gate.invalidate(|s| {
                s.snapshot = AdapterSnapshot::default();
                s.routes.clear();
            });
            return RefreshOutcome::NotApplicable;
        };

        let ticket = self.gate.issue(|s| s.snapshot.loading = true);
        debug!("Multi-route quote {} -> {} amount {}", from.symbol, to.symbol, request.amount);

        let quote = match self.api.quote(&request).await {
            Ok(quote) => quote,
            Err(err) => {
                warn!("Multi-route quote failed: {}", err);
                return self
                    .gate
                    .commit(ticket, |s| {
                        s.routes.clear();
                        s.snapshot = AdapterSnapshot {
                            error: Some(err.clone()),
                            ..AdapterSnapshot::default()
                        };
                    })
                    .map(|_| RefreshOutcome::Failed(err))
                    .unwrap_or(RefreshOutcome::Superseded);
            }
        };

        let fee_base = signature_fee(self.lamports_per_signature().await, 1);
        let options = quote
            .routes
            .iter()
            .map(|route| normalize_route(route, from, to, &params.network, &fee_base))
            .collect::<Result<Vec<_>, _>>();

        let options = match options {
            Ok(options) => options,
            Err(err) => {
                warn!("Multi-route response rejected: {}", err);
                return self
                    .gate
                    .commit(ticket, |s| {
                        s.routes.clear();
                        s.snapshot = AdapterSnapshot {
                            error: Some(err.clone()),
                            ..AdapterSnapshot::default()
                        };
                    })
                    .map(|_| RefreshOutcome::Failed(err))
                    .unwrap_or(RefreshOutcome::Superseded);
            }
        };

        debug!("Multi-route returned {} routes", options.len());
        let network_fee = fee_base.divide_by_decimals(params.network.decimals);

        self.gate
            .commit(ticket, |s| {
                s.snapshot = AdapterSnapshot {
                    loading: false,
                    error: None,
                    network_fee,
                    network_fee_base: fee_base,
                    quote_options: options.clone(),
                    has_allowance: true,
                    route_count: Some(quote.routes.len()),
                    selected_route: 0,
                };
                s.routes = quote.routes;
            })
            .map(|_| RefreshOutcome::Quoted(options))
            .unwrap_or(RefreshOutcome::Superseded)
    }

    async fn exchange(&self, params: &QuoteParams) -> ExchangeOutcome {
        if params.from_address.is_empty() || self.build_request(params).is_none() {
            return ExchangeOutcome::NotApplicable;
        }

        let (index, route) = self.gate.read(|s| {
            let index = s.snapshot.selected_route;
            (index, s.routes.get(index).map(|r| r.raw.clone()))
        });
        let Some(route) = route else {
            return ExchangeOutcome::NotApplicable;
        };

        let result: Result<Vec<String>, QuoteError> = async {
            let transactions = self.api.swap_transactions(&route, &params.from_address).await?;
            let ordered = transactions.ordered();

            let fee_base = signature_fee(self.lamports_per_signature().await, ordered.len());
            let network_fee = fee_base.divide_by_decimals(params.network.decimals);
            self.gate.update(|s| {
                s.snapshot.network_fee_base = fee_base;
                s.snapshot.network_fee = network_fee;
            });

            info!("Submitting {} transaction(s) for route {}", ordered.len(), index);

            let mut signatures = Vec::with_capacity(ordered.len());
            for encoded in &ordered {
                let signature = self
                    .wallet
                    .send_serialized_transaction(encoded)
                    .await
                    .map_err(|e| QuoteError::Execution(e.to_string()))?;
                signatures.push(signature);
            }
            Ok(signatures)
        }
        .await;

        match result {
            Ok(tx_ids) => ExchangeOutcome::Submitted {
                tx_ids,
                approval: false,
            },
            Err(err) => {
                warn!("Multi-route exchange failed: {}", err);
                self.gate.update(|s| s.snapshot.error = Some(err.clone()));
                ExchangeOutcome::Failed(err)
            }
        }
    }

    fn reset(&self) {
        self.gate.invalidate(|s| {
            s.snapshot = AdapterSnapshot::default();
            s.routes.clear();
        });
    }

    fn snapshot(&self) -> AdapterSnapshot {
        self.gate.read(|s| s.snapshot.clone())
    }

    fn select_route(&self, index: usize) -> bool {
        self.gate.update(|s| {
            if index < s.routes.len() {
                s.snapshot.selected_route = index;
                true
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jupiter::{JupiterQuote, JupiterSwapTransactions};
    use crate::test_utils::{jupiter_route, sol_network, spl_token, MockJupiterApi, MockSolWallet};
    use rust_decimal_macros::dec;

    fn usdc() -> BlockchainToken {
        spl_token("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6)
    }

    fn params(from_amount: &str) -> QuoteParams {
        QuoteParams {
            network: sol_network(),
            from_token: Some(sol_network().native_asset()),
            to_token: Some(usdc()),
            from_amount: from_amount.to_string(),
            to_amount: String::new(),
            slippage_percent: dec!(0.5),
            from_address: "8fK1hQ2RMiLqpwqtYUbZcG7rD8Z3Nx6TRxVW5XJzrQx1".to_string(),
        }
    }

    fn three_routes() -> JupiterQuote {
        JupiterQuote {
            routes: vec![
                jupiter_route("25000000", "24875000", &["Orca"]),
                jupiter_route("24900000", "24775500", &["Cykura (95%) + Lifinity (5%)"]),
                jupiter_route("24800000", "24676000", &["Raydium", "Serum"]),
            ],
        }
    }

    #[test]
    fn test_normalize_route() {
        let network = sol_network();
        let route = jupiter_route("24800000", "24676000", &["Raydium", "Serum"]);
        let option =
            normalize_route(&route, &network.native_asset(), &usdc(), &network, &AmountValue::from(5000u64))
                .unwrap();

        assert_eq!(option.from_amount.format(None), "1");
        assert_eq!(option.to_amount.format(None), "24.8");
        assert_eq!(option.minimum_to_amount.as_ref().unwrap().format(None), "24.676");
        // rate follows the slippage floor
        assert_eq!(option.rate.format(None), "24.676");
        assert_eq!(option.routing, Routing::Flow);
        assert_eq!(option.sources.len(), 2);
        assert_eq!(option.sources[0].proportion.format(None), "0.5");
        assert_eq!(option.sources_total().format(None), "1");
        assert_eq!(option.price_impact.format(None), "0.12");
        assert_eq!(option.network_fee, "0.000005 SOL");
    }

    #[test]
    fn test_single_market_is_split() {
        let network = sol_network();
        let route = jupiter_route("25000000", "24875000", &["Cykura (95%) + Lifinity (5%)"]);
        let option =
            normalize_route(&route, &network.native_asset(), &usdc(), &network, &AmountValue::zero()).unwrap();
        assert_eq!(option.routing, Routing::Split);
        assert_eq!(option.sources_total().format(None), "1");
    }

    #[tokio::test]
    async fn test_one_option_per_route_in_backend_order() {
        let api = Arc::new(MockJupiterApi::new(three_routes()));
        let adapter = MultiRouteAdapter::new(api.clone(), Arc::new(MockSolWallet::new()));

        let outcome = adapter.refresh(&params("1")).await;
        let RefreshOutcome::Quoted(options) = outcome else {
            panic!("expected quotes, got {:?}", outcome);
        };
        let amounts: Vec<String> = options.iter().map(|o| o.to_amount.format(None)).collect();
        assert_eq!(amounts, vec!["25", "24.9", "24.8"]);

        let snapshot = adapter.snapshot();
        assert_eq!(snapshot.route_count, Some(3));
        assert!(snapshot.has_allowance);
        assert_eq!(snapshot.network_fee_base.format(None), "5000");
        assert_eq!(api.requests()[0].amount, "1000000000");
        assert_eq!(api.requests()[0].input_mint, WRAPPED_SOL_MINT);
    }

    #[tokio::test]
    async fn test_exact_output_not_supported() {
        let api = Arc::new(MockJupiterApi::new(three_routes()));
        let adapter = MultiRouteAdapter::new(api.clone(), Arc::new(MockSolWallet::new()));

        let mut p = params("");
        p.to_amount = "10".to_string();
        assert_eq!(adapter.refresh(&p).await, RefreshOutcome::NotApplicable);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_routes_reports_zero_count() {
        let adapter = MultiRouteAdapter::new(
            Arc::new(MockJupiterApi::new(JupiterQuote::default())),
            Arc::new(MockSolWallet::new()),
        );
        assert_eq!(adapter.refresh(&params("1")).await, RefreshOutcome::Quoted(vec![]));
        let snapshot = adapter.snapshot();
        assert_eq!(snapshot.route_count, Some(0));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_select_route_bounds() {
        let adapter = MultiRouteAdapter::new(
            Arc::new(MockJupiterApi::new(three_routes())),
            Arc::new(MockSolWallet::new()),
        );
        assert!(!adapter.select_route(1));

        adapter.refresh(&params("1")).await;
        assert!(adapter.select_route(2));
        assert_eq!(adapter.snapshot().selected_route, 2);
        assert!(!adapter.select_route(3));
        assert_eq!(adapter.snapshot().selected_route, 2);
    }

    #[tokio::test]
    async fn test_exchange_uses_selected_route() {
        let api = Arc::new(MockJupiterApi::new(three_routes()).with_transactions(JupiterSwapTransactions {
            setup_transaction: Some("c2V0dXA=".to_string()),
            swap_transaction: "c3dhcA==".to_string(),
            cleanup_transaction: None,
        }));
        let wallet = Arc::new(MockSolWallet::new());
        let adapter = MultiRouteAdapter::new(api.clone(), wallet.clone());

        adapter.refresh(&params("1")).await;
        adapter.select_route(2);
        let outcome = adapter.exchange(&params("1")).await;

        assert!(matches!(outcome, ExchangeOutcome::Submitted { ref tx_ids, approval: false } if tx_ids.len() == 2));
        assert_eq!(api.swap_routes()[0]["outAmount"], "24800000");
        assert_eq!(wallet.sent(), vec!["c2V0dXA=".to_string(), "c3dhcA==".to_string()]);
        assert_eq!(adapter.snapshot().network_fee_base.format(None), "10000");
    }

    #[tokio::test]
    async fn test_backend_failure_stored() {
        let adapter = MultiRouteAdapter::new(
            Arc::new(MockJupiterApi::failing(QuoteError::Transport("timeout".to_string()))),
            Arc::new(MockSolWallet::new()),
        );
        let outcome = adapter.refresh(&params("1")).await;
        assert_eq!(outcome, RefreshOutcome::Failed(QuoteError::Transport("timeout".to_string())));
        assert_eq!(
            adapter.snapshot().error,
            Some(QuoteError::Transport("timeout".to_string()))
        );
    }
}
