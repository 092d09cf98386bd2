//! Order inbox filled from strategy hooks during a replay

use meridian_core::OrderInfo;
use meridian_strategy::{ExposureView, OrderRouter};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects orders routed by the strategy; the replay loop drains them after
/// every callback.
#[derive(Clone, Default)]
pub struct BacktestRouter {
    inbox: Arc<Mutex<Vec<OrderInfo>>>,
}

impl BacktestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<OrderInfo> {
        std::mem::take(&mut *self.inbox.lock())
    }
}

impl OrderRouter for BacktestRouter {
    fn route(&self, order: OrderInfo, _view: &ExposureView) -> meridian_strategy::Result<()> {
        self.inbox.lock().push(order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn test_drain_empties_inbox() {
        let router = BacktestRouter::new();
        let view = ExposureView::default();
        router
            .route(OrderInfo::market("s", "AAPL", Side::Buy, dec!(1)), &view)
            .unwrap();
        router
            .route(OrderInfo::market("s", "AAPL", Side::Sell, dec!(1)), &view)
            .unwrap();
        assert_eq!(router.drain().len(), 2);
        assert!(router.drain().is_empty());
    }
}
