use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters shared by the engine tasks and its order routers
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub data_processed: AtomicU64,
    pub data_dropped: AtomicU64,
    pub orders_queued: AtomicU64,
    pub orders_executed: AtomicU64,
    pub orders_rejected: AtomicU64,
    pub orders_dropped: AtomicU64,
}

impl EngineCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Health summary produced by the supervisor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_strategies: usize,
    pub running: usize,
    pub paused: usize,
    pub stopped: usize,
    pub errored: usize,
    pub crashed: usize,
    pub data_queue_len: usize,
    pub data_queue_capacity: usize,
    pub order_queue_len: usize,
    pub order_queue_capacity: usize,
    pub data_processed: u64,
    pub data_dropped: u64,
    pub orders_queued: u64,
    pub orders_executed: u64,
    pub orders_rejected: u64,
    pub orders_dropped: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl EngineStats {
    pub fn data_utilisation(&self) -> f64 {
        if self.data_queue_capacity == 0 {
            0.0
        } else {
            self.data_queue_len as f64 / self.data_queue_capacity as f64
        }
    }

    pub fn order_utilisation(&self) -> f64 {
        if self.order_queue_capacity == 0 {
            0.0
        } else {
            self.order_queue_len as f64 / self.order_queue_capacity as f64
        }
    }
}
