use std::future::pending;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::actor_trait::TimerCallback;
use crate::error::Result;

/// Timer owned by the actor loop. `Idle` never fires.
#[derive(Default)]
pub(crate) enum TimerState {
    #[default]
    Idle,
    Active {
        period: Duration,
        interval: Interval,
        callback: Box<dyn TimerCallback>,
    },
}

impl TimerState {
    /// Replace whatever timer is installed. The old interval is dropped before
    /// the new one exists, so their ticks can never overlap. The first tick
    /// lands one full period from now.
    pub fn replace(&mut self, period: Duration, callback: Box<dyn TimerCallback>) {
        self.cancel();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        *self = TimerState::Active {
            period,
            interval,
            callback,
        };
    }

    pub fn cancel(&mut self) {
        *self = TimerState::Idle;
    }

    pub fn period(&self) -> Option<Duration> {
        match self {
            TimerState::Idle => None,
            TimerState::Active { period, .. } => Some(*period),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TimerState::Active { .. })
    }

    /// Resolves on the next tick; pending forever while idle.
    pub async fn tick(&mut self) {
        match self {
            TimerState::Idle => pending::<()>().await,
            TimerState::Active { interval, .. } => {
                interval.tick().await;
            }
        }
    }

    pub fn fire(&mut self) -> Result<()> {
        match self {
            TimerState::Idle => Ok(()),
            TimerState::Active { callback, .. } => callback.on_tick(),
        }
    }
}
