//! Order routing from strategy hooks into the engine's order queue

use meridian_core::{OrderInfo, TradeInfo};
use meridian_strategy::{ExposureView, OrderGate, OrderRouter, StrategyError};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::stats::EngineCounters;

/// Result of an order delivered to its per-order callback
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    Filled(TradeInfo),
    Rejected { order: OrderInfo, reason: String },
}

pub type OrderCallback = Box<dyn FnOnce(OrderOutcome) + Send>;

pub(crate) struct QueuedOrder {
    pub order: OrderInfo,
    pub callback: Option<OrderCallback>,
}

/// Pre-trade gate slot, filled in once a risk layer is attached
pub type GateSlot = Arc<RwLock<Option<Arc<dyn OrderGate>>>>;

/// Runs the gate (if any) over an order
pub(crate) fn gate_check(gate: &GateSlot, order: &OrderInfo, view: &ExposureView) -> Result<(), String> {
    let gate = gate.read().clone();
    match gate {
        Some(gate) => {
            let check = gate.check_order(order, view);
            if check.approved {
                Ok(())
            } else {
                Err(check.reason.unwrap_or_else(|| "rejected by risk gate".to_string()))
            }
        }
        None => Ok(()),
    }
}

/// Router handed to every strategy registered with the engine
pub struct EngineOrderRouter {
    order_tx: mpsc::Sender<QueuedOrder>,
    gate: GateSlot,
    counters: Arc<EngineCounters>,
}

impl EngineOrderRouter {
    pub(crate) fn new(
        order_tx: mpsc::Sender<QueuedOrder>,
        gate: GateSlot,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            order_tx,
            gate,
            counters,
        }
    }
}

impl OrderRouter for EngineOrderRouter {
    fn route(&self, order: OrderInfo, view: &ExposureView) -> meridian_strategy::Result<()> {
        gate_check(&self.gate, &order, view).map_err(StrategyError::rejected)?;

        match self.order_tx.try_send(QueuedOrder {
            order,
            callback: None,
        }) {
            Ok(()) => {
                EngineCounters::incr(&self.counters.orders_queued);
                Ok(())
            }
            Err(TrySendError::Full(queued)) => {
                EngineCounters::incr(&self.counters.orders_dropped);
                log::warn!(
                    "[Engine] Order queue full, dropping {} {} {}",
                    queued.order.side,
                    queued.order.quantity,
                    queued.order.symbol
                );
                Err(StrategyError::Routing("order queue full".to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                Err(StrategyError::Routing("order queue closed".to_string()))
            }
        }
    }
}
