//! Execution layer - bounded broker calls and dry-run order routing

use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::{Error, Gateway, OrderId, Result, Side, Symbol};

/// Order router - every broker call the engine makes goes through here.
///
/// Each call is capped by `timeout` so a hung request costs one cycle, not
/// the whole session. In dry-run mode quotes and balance still come from
/// the gateway, but orders never leave the process.
pub struct OrderRouter {
    gateway: Arc<dyn Gateway>,
    dry_run: bool,
    timeout: Duration,
}

impl OrderRouter {
    pub fn new(gateway: Arc<dyn Gateway>, dry_run: bool, timeout: Duration) -> Self {
        Self {
            gateway,
            dry_run,
            timeout,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    pub async fn available_balance(&self) -> Result<Decimal> {
        self.bounded("balance", self.gateway.available_balance(), Error::Gateway)
            .await
    }

    pub async fn last_price(&self, symbol: &Symbol) -> Result<Decimal> {
        self.bounded("quote", self.gateway.last_price(symbol), Error::Gateway)
            .await
    }

    /// Place a market order, or mint a synthetic id in dry-run mode.
    pub async fn submit(&self, symbol: &Symbol, quantity: u64, side: Side) -> Result<OrderId> {
        if self.dry_run {
            let id = OrderId::synthetic(side, symbol, Utc::now().timestamp());
            info!(%symbol, qty = quantity, %side, order_id = %id, "DRY RUN order");
            return Ok(id);
        }

        info!(%symbol, qty = quantity, %side, gateway = self.gateway.name(), "Placing market order");
        self.bounded(
            "order",
            self.gateway.place_order(symbol, quantity, side),
            Error::Order,
        )
        .await
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T>>,
        on_timeout: fn(String) -> Error,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(format!(
                "{} request timed out after {:?}",
                what, self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use rust_decimal_macros::dec;

    fn router(gateway: Arc<MockGateway>, dry_run: bool) -> OrderRouter {
        OrderRouter::new(gateway, dry_run, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_dry_run_never_places_live_orders() {
        let gw = Arc::new(MockGateway::new(dec!(1000)).with_price("INFY", dec!(400)));
        let router = router(gw.clone(), true);

        let buy = router.submit(&Symbol::new("INFY"), 2, Side::Buy).await.unwrap();
        let sell = router.submit(&Symbol::new("INFY"), 2, Side::Sell).await.unwrap();

        assert!(buy.is_synthetic());
        assert!(buy.as_str().starts_with("dry-run-buy-INFY-"));
        assert!(sell.as_str().starts_with("dry-run-sell-INFY-"));
        assert!(gw.orders().is_empty());

        // quotes still come from the gateway
        assert_eq!(router.last_price(&Symbol::new("INFY")).await.unwrap(), dec!(400));
    }

    #[tokio::test]
    async fn test_live_orders_reach_gateway() {
        let gw = Arc::new(MockGateway::new(dec!(1000)));
        let router = router(gw.clone(), false);

        let id = router.submit(&Symbol::new("TCS"), 1, Side::Buy).await.unwrap();
        assert!(!id.is_synthetic());
        assert_eq!(gw.orders(), vec![(Symbol::new("TCS"), 1, Side::Buy)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_calls_time_out() {
        let gw = Arc::new(
            MockGateway::new(dec!(1000))
                .with_price("INFY", dec!(400))
                .with_latency(Duration::from_secs(60)),
        );
        let router = router(gw.clone(), false);

        let quote = router.last_price(&Symbol::new("INFY")).await;
        assert!(matches!(quote, Err(Error::Gateway(_))));

        let order = router.submit(&Symbol::new("INFY"), 1, Side::Buy).await;
        assert!(matches!(order, Err(Error::Order(_))));
    }
}
