//! Bar fill rules for resting orders

use meridian_core::{MarketData, OrderInfo, OrderType, Price, Side};

/// An order waiting for a bar that satisfies it
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub order: OrderInfo,
    /// Set once a stop-limit's stop has traded; it then rests as a limit
    pub triggered: bool,
}

impl PendingOrder {
    pub fn new(order: OrderInfo) -> Self {
        Self {
            order,
            triggered: false,
        }
    }
}

fn limit_fill(side: Side, limit: Price, bar: &MarketData) -> Option<Price> {
    match side {
        Side::Buy if bar.low <= limit => Some(limit.min(bar.open)),
        Side::Sell if bar.high >= limit => Some(limit.max(bar.open)),
        _ => None,
    }
}

fn stop_triggered(side: Side, stop: Price, bar: &MarketData) -> bool {
    match side {
        Side::Buy => bar.high >= stop,
        Side::Sell => bar.low <= stop,
    }
}

/// Price at which the order executes against `bar`, before slippage.
///
/// - market: the open
/// - buy limit: `min(limit, open)` once `low <= limit`; sell limit mirrored
/// - stop: `max(stop, open)` for buys, `min(stop, open)` for sells, once the
///   bar's range reaches the stop
/// - stop-limit: the limit rule once the stop has triggered on this or an
///   earlier bar
pub fn fill_price(pending: &mut PendingOrder, bar: &MarketData) -> Option<Price> {
    let order = &pending.order;
    match order.order_type {
        OrderType::Market => Some(bar.open),
        OrderType::Limit => limit_fill(order.side, order.price?, bar),
        OrderType::Stop => {
            let stop = order.stop_price?;
            if !stop_triggered(order.side, stop, bar) {
                return None;
            }
            Some(match order.side {
                Side::Buy => stop.max(bar.open),
                Side::Sell => stop.min(bar.open),
            })
        }
        OrderType::StopLimit => {
            let limit = order.price?;
            if !pending.triggered {
                let stop = order.stop_price?;
                if !stop_triggered(order.side, stop, bar) {
                    return None;
                }
                pending.triggered = true;
            }
            limit_fill(order.side, limit, bar)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar() -> MarketData {
        // open 100, high 105, low 95
        MarketData::bar("AAPL", Utc::now(), dec!(100), dec!(105), dec!(95), dec!(102), dec!(10000))
    }

    fn pending(
        side: Side,
        order_type: OrderType,
        price: Option<Decimal>,
        stop: Option<Decimal>,
    ) -> PendingOrder {
        PendingOrder::new(OrderInfo::new_with_time(
            "s",
            "AAPL",
            side,
            order_type,
            dec!(10),
            price,
            stop,
            Utc::now(),
        ))
    }

    #[test]
    fn test_market_fills_at_open() {
        let mut order = pending(Side::Sell, OrderType::Market, None, None);
        assert_eq!(fill_price(&mut order, &bar()), Some(dec!(100)));
    }

    #[test]
    fn test_buy_limit() {
        let mut below_low = pending(Side::Buy, OrderType::Limit, Some(dec!(94.99)), None);
        assert_eq!(fill_price(&mut below_low, &bar()), None);

        let mut at_low = pending(Side::Buy, OrderType::Limit, Some(dec!(95)), None);
        assert_eq!(fill_price(&mut at_low, &bar()), Some(dec!(95)));

        // gap through the limit fills at the better open
        let mut above_open = pending(Side::Buy, OrderType::Limit, Some(dec!(103)), None);
        assert_eq!(fill_price(&mut above_open, &bar()), Some(dec!(100)));
    }

    #[test]
    fn test_sell_limit() {
        let mut above_high = pending(Side::Sell, OrderType::Limit, Some(dec!(105.01)), None);
        assert_eq!(fill_price(&mut above_high, &bar()), None);

        let mut inside = pending(Side::Sell, OrderType::Limit, Some(dec!(104)), None);
        assert_eq!(fill_price(&mut inside, &bar()), Some(dec!(104)));

        let mut below_open = pending(Side::Sell, OrderType::Limit, Some(dec!(98)), None);
        assert_eq!(fill_price(&mut below_open, &bar()), Some(dec!(100)));
    }

    #[test]
    fn test_stops() {
        let mut buy_stop = pending(Side::Buy, OrderType::Stop, None, Some(dec!(104)));
        assert_eq!(fill_price(&mut buy_stop, &bar()), Some(dec!(104)));

        let mut buy_stop_gap = pending(Side::Buy, OrderType::Stop, None, Some(dec!(98)));
        assert_eq!(fill_price(&mut buy_stop_gap, &bar()), Some(dec!(100)));

        let mut sell_stop = pending(Side::Sell, OrderType::Stop, None, Some(dec!(96)));
        assert_eq!(fill_price(&mut sell_stop, &bar()), Some(dec!(96)));

        let mut untouched = pending(Side::Sell, OrderType::Stop, None, Some(dec!(90)));
        assert_eq!(fill_price(&mut untouched, &bar()), None);
    }

    #[test]
    fn test_stop_limit_stays_triggered() {
        // stop at 104 trades, but the 94 limit is below the low
        let mut order = pending(Side::Buy, OrderType::StopLimit, Some(dec!(94)), Some(dec!(104)));
        assert_eq!(fill_price(&mut order, &bar()), None);
        assert!(order.triggered);

        let lower = MarketData::bar(
            "AAPL",
            Utc::now(),
            dec!(95),
            dec!(96),
            dec!(93),
            dec!(94),
            dec!(10000),
        );
        assert_eq!(fill_price(&mut order, &lower), Some(dec!(94)));
    }
}
