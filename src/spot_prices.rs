//! Spot prices for the native, maker and taker assets

use std::sync::Arc;
use tracing::{debug, warn};

use crate::amount::AmountValue;
use crate::quote::{RequestGate, Ticket};
use crate::token::BlockchainToken;
use crate::wallet::PriceSource;

/// Decimal strings in the shared fiat unit; `""` when unknown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpotPrices {
    pub native_asset: String,
    pub maker_asset: String,
    pub taker_asset: String,
}

impl SpotPrices {
    pub fn native(&self) -> AmountValue {
        AmountValue::new(&self.native_asset)
    }

    pub fn maker(&self) -> AmountValue {
        AmountValue::new(&self.maker_asset)
    }

    pub fn taker(&self) -> AmountValue {
        AmountValue::new(&self.taker_asset)
    }
}

/// Only the latest refresh may write; earlier ones still in flight are dropped
pub struct SpotPriceRefresh {
    prices: Arc<dyn PriceSource>,
    gate: RequestGate<SpotPrices>,
}

impl SpotPriceRefresh {
    pub fn new(prices: Arc<dyn PriceSource>) -> Self {
        Self {
            prices,
            gate: RequestGate::default(),
        }
    }

    pub fn snapshot(&self) -> SpotPrices {
        self.gate.read(SpotPrices::clone)
    }

    /// Drop results of refreshes issued for the previous selection
    pub fn invalidate(&self) {
        self.gate.invalidate(|_| {});
    }

    /// Start a refresh; every earlier one becomes stale
    pub fn begin(&self) -> Ticket {
        self.gate.issue(|_| {})
    }

    /// Fetch the requested prices concurrently and overwrite only their slots.
    /// A native from-asset is priced once and used for both slots.
    pub async fn refresh(
        &self,
        native: &BlockchainToken,
        from: Option<&BlockchainToken>,
        to: Option<&BlockchainToken>,
    ) -> SpotPrices {
        self.refresh_at(self.begin(), native, from, to).await
    }

    /// As [`Self::refresh`]; results are dropped unless `ticket` is still current
    pub async fn refresh_at(
        &self,
        ticket: Ticket,
        native: &BlockchainToken,
        from: Option<&BlockchainToken>,
        to: Option<&BlockchainToken>,
    ) -> SpotPrices {
        let from_is_native = from.is_some_and(|token| token.is_native() && token.chain_id == native.chain_id);

        let native_price = async {
            if from_is_native {
                None
            } else {
                Some(self.fetch(native).await)
            }
        };
        let maker_price = async {
            match from {
                Some(token) => Some(self.fetch(token).await),
                None => None,
            }
        };
        let taker_price = async {
            match to {
                Some(token) => Some(self.fetch(token).await),
                None => None,
            }
        };

        let (native_price, maker_price, taker_price) =
            futures::join!(native_price, maker_price, taker_price);
        let native_price = if from_is_native { maker_price.clone() } else { native_price };

        self.gate
            .commit(ticket, |state| {
                if let Some(price) = native_price {
                    state.native_asset = price;
                }
                if let Some(price) = maker_price {
                    state.maker_asset = price;
                }
                if let Some(price) = taker_price {
                    state.taker_asset = price;
                }
                state.clone()
            })
            .unwrap_or_else(|| self.snapshot())
    }

    async fn fetch(&self, token: &BlockchainToken) -> String {
        match self.prices.get_token_price(token).await {
            Ok(price) => {
                debug!("Spot price {} = {}", token.symbol, price);
                price
            }
            Err(e) => {
                warn!("Spot price unavailable for {}: {}", token.symbol, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{erc20_token, eth_network, MockPriceSource};
    use std::time::Duration;

    fn usdc() -> BlockchainToken {
        erc20_token("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", 6)
    }

    #[tokio::test]
    async fn test_native_from_asset_priced_once() {
        let source = Arc::new(MockPriceSource::new().with_price("ETH", "1800.5").with_price("USDC", "1"));
        let refresh = SpotPriceRefresh::new(source.clone());
        let native = eth_network().native_asset();

        let prices = refresh.refresh(&native, Some(&native), Some(&usdc())).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(prices.native_asset, "1800.5");
        assert_eq!(prices.maker_asset, "1800.5");
        assert_eq!(prices.taker_asset, "1");
    }

    #[tokio::test]
    async fn test_unrequested_slots_untouched() {
        let source = Arc::new(MockPriceSource::new().with_price("ETH", "1800").with_price("USDC", "1"));
        let refresh = SpotPriceRefresh::new(source.clone());
        let native = eth_network().native_asset();

        refresh.refresh(&native, Some(&usdc()), Some(&native)).await;
        let prices = refresh.refresh(&native, None, None).await;

        assert_eq!(source.requested(), vec!["ETH", "USDC", "ETH", "ETH"]);
        assert_eq!(prices.maker_asset, "1");
        assert_eq!(prices.taker_asset, "1800");
    }

    #[tokio::test]
    async fn test_failed_price_becomes_empty() {
        let source = Arc::new(MockPriceSource::new().with_price("ETH", "1800"));
        let refresh = SpotPriceRefresh::new(source);
        let native = eth_network().native_asset();

        let prices = refresh.refresh(&native, Some(&usdc()), None).await;
        assert_eq!(prices.maker_asset, "");
        assert!(prices.maker().is_undefined());
        assert_eq!(prices.native().format(None), "1800");
    }

    #[tokio::test]
    async fn test_older_refresh_cannot_overwrite_newer_selection() {
        let aaa = erc20_token("0x00000000000000000000000000000000000000a1", "AAA", 18);
        let bbb = erc20_token("0x00000000000000000000000000000000000000b2", "BBB", 18);
        let source = MockPriceSource::new()
            .with_price("ETH", "1800")
            .with_price("AAA", "10")
            .with_price("BBB", "20")
            .with_price_delay("AAA", Duration::from_millis(50));
        let refresh = SpotPriceRefresh::new(Arc::new(source));
        let native = eth_network().native_asset();

        let slow = refresh.refresh(&native, Some(&aaa), None);
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            refresh.refresh(&native, Some(&bbb), None).await
        };
        let (slow_result, fast_result) = futures::join!(slow, fast);

        assert_eq!(fast_result.maker_asset, "20");
        assert_eq!(slow_result.maker_asset, "20");
        assert_eq!(refresh.snapshot().maker_asset, "20");
    }

    #[tokio::test]
    async fn test_invalidate_drops_refresh_in_flight() {
        let source = MockPriceSource::new()
            .with_price("ETH", "1800")
            .with_price("USDC", "1")
            .with_price_delay("USDC", Duration::from_millis(30));
        let refresh = SpotPriceRefresh::new(Arc::new(source));
        let native = eth_network().native_asset();

        let quote = usdc();
        let pending = refresh.refresh(&native, Some(&quote), None);
        let switch = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            refresh.invalidate();
        };
        futures::join!(pending, switch);

        assert_eq!(refresh.snapshot(), SpotPrices::default());
    }
}
