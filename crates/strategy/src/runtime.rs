//! Tokio glue for shared strategies: snapshot timer and delayed restarts.
//!
//! Both tasks hold only a `Weak` handle, so a strategy removed from its
//! driver is dropped even while a timer or restart is outstanding.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::Result;
use crate::managed::{ManagedStrategy, SharedStrategy};
use crate::state::StrategyState;

/// Start a shared strategy and arm its snapshot timer
pub async fn start_shared(shared: &SharedStrategy) -> Result<()> {
    let mut guard = shared.lock().await;
    let result = guard.start().await;
    follow_up(shared, &mut guard);
    result
}

/// Act on what the last callback left behind: schedule a pending restart
/// and make sure a running strategy has a live timer.
pub fn follow_up(shared: &SharedStrategy, strategy: &mut ManagedStrategy) {
    if let Some(delay) = strategy.take_pending_restart() {
        schedule_restart(Arc::downgrade(shared), delay);
    }
    if strategy.state() == StrategyState::Running && !strategy.has_timer() {
        arm_snapshot_timer(shared, strategy);
    }
}

fn arm_snapshot_timer(shared: &SharedStrategy, strategy: &mut ManagedStrategy) {
    let weak = Arc::downgrade(shared);
    let period = strategy.config().monitoring_interval();
    // set_timer bumps the epoch, the new task owns the next one
    let epoch = strategy.timer_epoch() + 1;

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            let mut guard = shared.lock().await;
            if guard.timer_epoch() != epoch {
                break;
            }
            guard.handle_timer().await;
            follow_up(&shared, &mut guard);
        }
    });
    strategy.set_timer(handle);
}

fn schedule_restart(weak: Weak<tokio::sync::Mutex<ManagedStrategy>>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut guard = shared.lock().await;
        if let Err(e) = guard.restart_after_backoff().await {
            log::error!("[{}] Restart failed: {}", guard.id(), e);
        }
        follow_up(&shared, &mut guard);
    });
}
