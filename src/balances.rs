//! Balance registry and the chunked refresh pipeline

use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::amount::AmountValue;
use crate::config::BALANCE_CHUNK_SIZE;
use crate::quote::{RequestGate, Ticket};
use crate::token::{BalanceKey, BlockchainToken, NetworkInfo};
use crate::wallet::ChainReader;

/// Balances in base units by asset identity. A missing entry means "never
/// fetched"; failed fetches are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceRegistry {
    entries: HashMap<BalanceKey, String>,
}

impl BalanceRegistry {
    pub fn get(&self, key: &BalanceKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Undefined when the balance is unknown
    pub fn balance_of(&self, token: &BlockchainToken) -> AmountValue {
        match self.get(&token.balance_key()) {
            Some(raw) if !raw.is_empty() => AmountValue::new(raw),
            _ => AmountValue::undefined(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New registry with `updates` laid over this one
    pub fn merged<I>(&self, updates: I) -> BalanceRegistry
    where
        I: IntoIterator<Item = (BalanceKey, String)>,
    {
        let mut next = self.clone();
        next.merge_in_place(updates);
        next
    }

    fn merge_in_place<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (BalanceKey, String)>,
    {
        self.entries.extend(updates.into_iter().filter(|(_, balance)| !balance.is_empty()));
    }
}

/// Fetches balances chunk by chunk: chunks run one after another, assets within
/// a chunk run concurrently, and each chunk is merged before the next starts.
///
/// A run merges only while its generation is current. Account and network
/// changes bump the generation, so an older run cannot land on newer state.
pub struct BalanceRefreshPipeline {
    chain: Arc<dyn ChainReader>,
    registry: Arc<RwLock<BalanceRegistry>>,
    chunk_size: usize,
    gate: RequestGate<()>,
}

impl BalanceRefreshPipeline {
    pub fn new(chain: Arc<dyn ChainReader>, registry: Arc<RwLock<BalanceRegistry>>) -> Self {
        Self {
            chain,
            registry,
            chunk_size: BALANCE_CHUNK_SIZE,
            gate: RequestGate::default(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn snapshot(&self) -> BalanceRegistry {
        self.registry.read().clone()
    }

    /// Stop runs in flight from merging anything further
    pub fn invalidate(&self) {
        self.gate.invalidate(|_| {});
    }

    /// Invalidate runs in flight and forget every stored balance
    pub fn reset(&self) {
        self.gate.invalidate(|_| self.registry.write().entries.clear());
    }

    /// Tag for a run about to start. Take it before reading the selection the
    /// run is for.
    pub fn begin(&self) -> Ticket {
        self.gate.current()
    }

    /// Refresh `assets` for `account` and return the merged registry
    pub async fn refresh(
        &self,
        account: &str,
        network: &NetworkInfo,
        assets: &[BlockchainToken],
    ) -> BalanceRegistry {
        self.refresh_at(self.begin(), account, network, assets).await
    }

    /// As [`Self::refresh`], merging only while `ticket` is current
    pub async fn refresh_at(
        &self,
        ticket: Ticket,
        account: &str,
        network: &NetworkInfo,
        assets: &[BlockchainToken],
    ) -> BalanceRegistry {
        if account.is_empty() || assets.is_empty() {
            return self.snapshot();
        }

        info!(
            "Refreshing {} balances on {} in chunks of {}",
            assets.len(),
            network.chain_name,
            self.chunk_size
        );

        for (index, chunk) in assets.chunks(self.chunk_size).enumerate() {
            let results = join_all(chunk.iter().map(|asset| self.fetch_balance(account, asset))).await;

            let fetched: Vec<(BalanceKey, String)> = results
                .into_iter()
                .filter(|(_, balance)| !balance.is_empty())
                .collect();

            debug!(
                "Balance chunk {}: {}/{} fetched",
                index,
                fetched.len(),
                chunk.len()
            );

            let merged = self
                .gate
                .commit(ticket, |_| self.registry.write().merge_in_place(fetched));
            if merged.is_none() {
                break;
            }
        }

        self.snapshot()
    }

    /// Never fails: a failed fetch yields `""`
    async fn fetch_balance(&self, account: &str, asset: &BlockchainToken) -> (BalanceKey, String) {
        let result = if asset.is_native() {
            self.chain.get_balance(account, asset.coin, &asset.chain_id).await
        } else {
            self.chain
                .get_token_balance(&asset.contract_address, account, asset.coin, &asset.chain_id)
                .await
        };

        let balance = result.unwrap_or_else(|e| {
            warn!("Balance fetch failed for {} on {}: {}", asset.symbol, asset.chain_id, e);
            String::new()
        });

        (asset.balance_key(), balance)
    }
}
