//! Simulated Broker
//!
//! In-process [`BrokerAdapter`] that fills against the price cache:
//! - Market orders at the cached last price, slipped against the taker
//! - Limit orders at the supplied limit price
//! - Stop orders at the last price once triggered, stop-limits at the limit
//!
//! Rates stamped on the order take precedence over the configured ones.
//! Unknown symbols, untriggered stops and opening orders larger than the
//! configured share of the last record's volume are rejected; reduce-only
//! orders are not capped.

use async_trait::async_trait;
use chrono::Utc;
use meridian_core::{OrderInfo, OrderType, Price, Side};
use meridian_ports::{BrokerAdapter, ExecutionReport, PortError, PortResult};
use rust_decimal::Decimal;

use crate::config::BrokerConfig;
use crate::price_cache::PriceCache;

pub struct SimulatedBroker {
    config: BrokerConfig,
    prices: PriceCache,
}

impl SimulatedBroker {
    pub fn new(config: BrokerConfig, prices: PriceCache) -> Self {
        Self { config, prices }
    }

    fn slipped(&self, order: &OrderInfo, price: Price) -> Price {
        let rate = order.slippage_rate.unwrap_or(self.config.slippage_rate);
        price * (Decimal::ONE + rate * order.side.sign())
    }

    fn stop_triggered(side: Side, last: Price, stop: Price) -> bool {
        match side {
            Side::Buy => last >= stop,
            Side::Sell => last <= stop,
        }
    }

    fn fill_price(&self, order: &OrderInfo, last: Price) -> PortResult<Price> {
        let missing = |field: &str| {
            PortError::Rejected(format!("{} order {} has no {}", order.order_type, order.id, field))
        };
        match order.order_type {
            OrderType::Market => Ok(self.slipped(order, last)),
            OrderType::Limit => order.price.ok_or_else(|| missing("limit price")),
            OrderType::Stop => {
                let stop = order.stop_price.ok_or_else(|| missing("stop price"))?;
                if !Self::stop_triggered(order.side, last, stop) {
                    return Err(PortError::Rejected(format!(
                        "stop {} not triggered at {}",
                        stop, last
                    )));
                }
                Ok(self.slipped(order, last))
            }
            OrderType::StopLimit => {
                let stop = order.stop_price.ok_or_else(|| missing("stop price"))?;
                let limit = order.price.ok_or_else(|| missing("limit price"))?;
                if !Self::stop_triggered(order.side, last, stop) {
                    return Err(PortError::Rejected(format!(
                        "stop {} not triggered at {}",
                        stop, last
                    )));
                }
                Ok(limit)
            }
        }
    }
}

#[async_trait]
impl BrokerAdapter for SimulatedBroker {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, order: &OrderInfo) -> PortResult<ExecutionReport> {
        let data = self
            .prices
            .latest(&order.symbol)
            .ok_or_else(|| PortError::UnknownSymbol(order.symbol.clone()))?;

        let quantity = order.remaining_quantity();
        if quantity <= Decimal::ZERO {
            return Err(PortError::Rejected(format!("order {} has nothing left to fill", order.id)));
        }

        let participation = self.config.max_volume_participation;
        if !order.reduce_only && participation > Decimal::ZERO && data.volume > Decimal::ZERO {
            let available = data.volume * participation;
            if quantity > available {
                return Err(PortError::InsufficientLiquidity {
                    symbol: order.symbol.clone(),
                    requested: quantity,
                    available,
                });
            }
        }

        let price = self.fill_price(order, data.last_price())?;
        let commission_rate = order.commission_rate.unwrap_or(self.config.commission_rate);
        let commission = quantity * price * commission_rate;

        log::debug!(
            "[Broker] {} {} {} @ {} (commission {})",
            order.side,
            quantity,
            order.symbol,
            price,
            commission
        );

        Ok(ExecutionReport {
            order_id: order.id,
            symbol: order.symbol.clone(),
            quantity,
            price,
            commission,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::MarketData;
    use rust_decimal_macros::dec;

    fn broker(slippage: Decimal) -> SimulatedBroker {
        let prices = PriceCache::new();
        prices.update(&MarketData::tick("AAPL", Utc::now(), dec!(100), dec!(1000)));
        let config = BrokerConfig {
            commission_rate: dec!(0.001),
            slippage_rate: slippage,
            max_volume_participation: dec!(0.1),
        };
        SimulatedBroker::new(config, prices)
    }

    #[tokio::test]
    async fn test_market_and_limit_fills() {
        let broker = broker(dec!(0.01));

        let market = OrderInfo::market("s", "AAPL", Side::Buy, dec!(10));
        let report = broker.execute(&market).await.unwrap();
        assert_eq!(report.price, dec!(101));
        assert_eq!(report.commission, dec!(1.01));

        let limit = OrderInfo::limit("s", "AAPL", Side::Sell, dec!(10), dec!(105));
        assert_eq!(broker.execute(&limit).await.unwrap().price, dec!(105));
    }

    #[tokio::test]
    async fn test_rejections() {
        let broker = broker(Decimal::ZERO);

        let unknown = OrderInfo::market("s", "MSFT", Side::Buy, dec!(1));
        assert_eq!(
            broker.execute(&unknown).await,
            Err(PortError::UnknownSymbol("MSFT".to_string()))
        );

        let too_big = OrderInfo::market("s", "AAPL", Side::Buy, dec!(101));
        assert!(matches!(
            broker.execute(&too_big).await,
            Err(PortError::InsufficientLiquidity { .. })
        ));

        let mut stop = OrderInfo::market("s", "AAPL", Side::Buy, dec!(1));
        stop.order_type = OrderType::Stop;
        stop.stop_price = Some(dec!(110));
        assert!(matches!(broker.execute(&stop).await, Err(PortError::Rejected(_))));
        stop.stop_price = Some(dec!(95));
        assert_eq!(broker.execute(&stop).await.unwrap().price, dec!(100));
    }

    #[tokio::test]
    async fn test_order_rates_override_config() {
        let broker = broker(dec!(0.01));
        let order = OrderInfo::market("s", "AAPL", Side::Sell, dec!(10))
            .with_costs(Decimal::ZERO, dec!(0.02));
        let report = broker.execute(&order).await.unwrap();
        assert_eq!(report.price, dec!(98));
        assert_eq!(report.commission, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reduce_only_orders_skip_participation_cap() {
        let broker = broker(Decimal::ZERO);
        let exit = OrderInfo::market("s", "AAPL", Side::Sell, dec!(300));
        assert!(matches!(
            broker.execute(&exit).await,
            Err(PortError::InsufficientLiquidity { .. })
        ));
        let report = broker.execute(&exit.reducing()).await.unwrap();
        assert_eq!(report.quantity, dec!(300));
    }
}
