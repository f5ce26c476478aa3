//! Canonical quote model and the adapter contract
//!
//! Both backends normalize into [`QuoteOption`]. Adapters keep their state behind a
//! [`RequestGate`] so that a response issued for an older selection can never
//! overwrite state for a newer one.

pub mod multi_route;
pub mod order_router;
pub mod route_label;
pub mod store;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fmt;
use tracing::warn;

use crate::amount::AmountValue;
use crate::error::QuoteError;
use crate::token::{BlockchainToken, CoinType, NetworkInfo};

pub use multi_route::MultiRouteAdapter;
pub use order_router::OrderRouterAdapter;
pub use route_label::parse_liquidity_sources;
pub use store::QuoteStore;

/// How a route fills the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Single hop across parallel venues
    Split,
    /// Multi-hop through intermediate assets
    Flow,
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routing::Split => write!(f, "split"),
            Routing::Flow => write!(f, "flow"),
        }
    }
}

/// One venue contributing to a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquiditySource {
    pub name: String,
    /// In [0, 1]
    pub proportion: AmountValue,
}

/// Platform fee with an optional discount, all in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFee {
    pub fee_percent: Decimal,
    pub discount_percent: Decimal,
    pub effective_fee_percent: Decimal,
}

impl SwapFee {
    pub fn new(fee_percent: Decimal, discount_percent: Decimal) -> Self {
        let effective_fee_percent =
            fee_percent * (Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED);
        Self {
            fee_percent,
            discount_percent,
            effective_fee_percent,
        }
    }
}

/// Canonical, comparable trade quote. Recreated on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteOption {
    pub from_amount: AmountValue,
    pub to_amount: AmountValue,
    /// Absent when the backend gives no slippage floor
    pub minimum_to_amount: Option<AmountValue>,
    pub from_token: BlockchainToken,
    pub to_token: BlockchainToken,
    /// Always derived from the amounts above, never copied from upstream
    pub rate: AmountValue,
    /// Percent
    pub price_impact: AmountValue,
    pub sources: Vec<LiquiditySource>,
    pub routing: Routing,
    /// Display string in the native asset, e.g. `"0.0042 ETH"`
    pub network_fee: String,
    pub brave_fee: Option<SwapFee>,
}

impl QuoteOption {
    /// Sum of source proportions (1 for a split route)
    pub fn sources_total(&self) -> AmountValue {
        self.sources
            .iter()
            .fold(AmountValue::zero(), |acc, s| acc.plus(&s.proportion))
    }
}

/// Inputs a refresh was issued for. Two refreshes with equal params are
/// interchangeable; anything else is a different request.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteParams {
    pub network: NetworkInfo,
    pub from_token: Option<BlockchainToken>,
    pub to_token: Option<BlockchainToken>,
    /// Display units; empty for exact-output quotes
    pub from_amount: String,
    /// Display units; empty for exact-input quotes
    pub to_amount: String,
    pub slippage_percent: Decimal,
    pub from_address: String,
}

impl QuoteParams {
    /// Both tokens and at least one amount are required to quote
    pub fn tokens(&self) -> Option<(&BlockchainToken, &BlockchainToken)> {
        match (&self.from_token, &self.to_token) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }
}

/// Observable adapter state
#[derive(Debug, Clone, Default)]
pub struct AdapterSnapshot {
    pub loading: bool,
    pub error: Option<QuoteError>,
    /// Display units of the native asset
    pub network_fee: AmountValue,
    /// Base units of the native asset
    pub network_fee_base: AmountValue,
    pub quote_options: Vec<QuoteOption>,
    pub has_allowance: bool,
    /// Routes in the last successful quote; `None` before any quote
    pub route_count: Option<usize>,
    pub selected_route: usize,
}

/// Result of one refresh call
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Required inputs missing; stored quote cleared
    NotApplicable,
    Quoted(Vec<QuoteOption>),
    Failed(QuoteError),
    /// A newer request or a reset happened while this one was in flight
    Superseded,
}

/// Result of handing a trade to the wallet
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Submitted { tx_ids: Vec<String>, approval: bool },
    NotApplicable,
    Failed(QuoteError),
}

/// One external quote backend normalized to the canonical model.
///
/// Neither `refresh` nor `exchange` returns an error: failures land in the
/// adapter's `error` field and in the returned outcome.
#[async_trait]
pub trait QuoteSourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Coin family this adapter serves
    fn coin(&self) -> CoinType;

    async fn refresh(&self, params: &QuoteParams) -> RefreshOutcome;

    async fn exchange(&self, params: &QuoteParams) -> ExchangeOutcome;

    /// Drop quote/error state and invalidate anything in flight
    fn reset(&self);

    fn snapshot(&self) -> AdapterSnapshot;

    /// Point subsequent execution at route `index`
    fn select_route(&self, index: usize) -> bool {
        index == 0
    }
}

/// Ticket handed out when a request is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

struct GateInner<S> {
    generation: u64,
    state: S,
}

/// Generation-tagged state cell: results are committed only if no newer request
/// or reset happened since their ticket was issued.
pub struct RequestGate<S> {
    inner: Mutex<GateInner<S>>,
}

impl<S: Default> Default for RequestGate<S> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                generation: 0,
                state: S::default(),
            }),
        }
    }
}

impl<S> RequestGate<S> {
    /// Start a new request; earlier tickets become stale
    pub fn issue<F: FnOnce(&mut S)>(&self, prepare: F) -> Ticket {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        prepare(&mut inner.state);
        Ticket(inner.generation)
    }

    /// Ticket for the current generation; issues nothing new
    pub fn current(&self) -> Ticket {
        Ticket(self.inner.lock().generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.inner.lock().generation == ticket.0
    }

    /// Apply `update` only if `ticket` is still current
    pub fn commit<R, F: FnOnce(&mut S) -> R>(&self, ticket: Ticket, update: F) -> Option<R> {
        let mut inner = self.inner.lock();
        if inner.generation != ticket.0 {
            warn!(
                "Discarding stale result (ticket {}, current {})",
                ticket.0, inner.generation
            );
            return None;
        }
        Some(update(&mut inner.state))
    }

    /// Invalidate every outstanding ticket and apply `update`
    pub fn invalidate<F: FnOnce(&mut S)>(&self, update: F) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        update(&mut inner.state);
    }

    /// Mutate without touching the generation
    pub fn update<R, F: FnOnce(&mut S) -> R>(&self, update: F) -> R {
        update(&mut self.inner.lock().state)
    }

    pub fn read<R, F: FnOnce(&S) -> R>(&self, read: F) -> R {
        read(&self.inner.lock().state)
    }
}
