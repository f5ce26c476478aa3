//! Periodic quote refresh

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::engine::SwapEngine;
use crate::quote::RefreshOutcome;

/// Re-issues the active adapter's refresh on a fixed interval until stopped or dropped
pub struct QuotePoller {
    handle: JoinHandle<()>,
}

impl QuotePoller {
    /// The first tick is skipped: whatever started polling has just refreshed
    pub fn spawn(engine: Arc<SwapEngine>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match engine.refresh_quote().await {
                    RefreshOutcome::Failed(e) => warn!("Quote poll failed: {}", e),
                    RefreshOutcome::Quoted(options) => debug!("Quote poll: {} options", options.len()),
                    RefreshOutcome::Superseded => debug!("Quote poll superseded"),
                    RefreshOutcome::NotApplicable => {}
                }
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for QuotePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::jupiter::JupiterQuote;
    use crate::test_utils::{
        erc20_token, eth_network, zero_ex_quote, MockChainReader, MockEthWallet, MockJupiterApi,
        MockPriceSource, MockSolWallet, MockZeroExApi,
    };
    use crate::wallet::Collaborators;

    async fn quoting_engine(api: Arc<MockZeroExApi>) -> Arc<SwapEngine> {
        let engine = SwapEngine::with_backends(
            &EngineConfig::default(),
            Collaborators {
                chain: Arc::new(MockChainReader::new()),
                prices: Arc::new(MockPriceSource::new()),
                eth_wallet: Arc::new(MockEthWallet::new()),
                sol_wallet: Arc::new(MockSolWallet::new()),
            },
            api,
            Arc::new(MockJupiterApi::new(JupiterQuote::default())),
            eth_network(),
        );
        engine.select_to_token(erc20_token("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6));
        engine.handle_on_set_from_amount("1").await;
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_polls_until_stopped() {
        let api = Arc::new(MockZeroExApi::new(zero_ex_quote("1000000000000000000", "1800500000")));
        let engine = quoting_engine(api.clone()).await;
        assert_eq!(api.calls(), 1);

        let poller = QuotePoller::spawn(engine, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(5)).await;
        // first tick skipped
        assert_eq!(api.calls(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let polled = api.calls();
        assert!(polled >= 2);

        poller.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!poller.is_running());
        let after_stop = api.calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(api.calls(), after_stop);
    }

    #[tokio::test]
    async fn test_drop_aborts() {
        let api = Arc::new(MockZeroExApi::new(zero_ex_quote("1000000000000000000", "1800500000")));
        let engine = quoting_engine(api.clone()).await;

        let poller = QuotePoller::spawn(engine, Duration::from_millis(10));
        drop(poller);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(api.calls(), 1);
    }
}
