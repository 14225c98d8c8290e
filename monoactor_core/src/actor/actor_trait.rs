use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::Result;

/// Actor status enumeration
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ActorStatus {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorStatus::Idle => write!(f, "Idle"),
            ActorStatus::Running => write!(f, "Running"),
            ActorStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Receives every successfully decoded envelope, on the actor loop.
///
/// Returning an error, or panicking, is contained by the loop: it is logged and
/// the next envelope is dispatched normally.
pub trait MessageHandler<M>: Send + 'static {
    fn handle(&mut self, producer_id: u32, target_id: u64, msg: M) -> Result<()>;
}

impl<M, F> MessageHandler<M> for F
where
    F: FnMut(u32, u64, M) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, producer_id: u32, target_id: u64, msg: M) -> Result<()> {
        self(producer_id, target_id, msg)
    }
}

/// Periodic callback run on the actor loop. Blocks mailbox processing while it
/// runs, so keep it short.
pub trait TimerCallback: Send + 'static {
    fn on_tick(&mut self) -> Result<()>;
}

impl<F> TimerCallback for F
where
    F: FnMut() -> Result<()> + Send + 'static,
{
    fn on_tick(&mut self) -> Result<()> {
        self()
    }
}

/// Point-in-time counters for one actor.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ActorStats {
    pub loops_started: u64,
    pub loops_stopped: u64,
    pub wakeups: u64,
    pub drains: u64,
    pub envelopes_dispatched: u64,
    pub decode_failures: u64,
    pub faults_contained: u64,
    pub timer_ticks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ActorMetrics {
    pub loops_started: AtomicU64,
    pub loops_stopped: AtomicU64,
    pub wakeups: AtomicU64,
    pub drains: AtomicU64,
    pub envelopes_dispatched: AtomicU64,
    pub decode_failures: AtomicU64,
    pub faults_contained: AtomicU64,
    pub timer_ticks: AtomicU64,
}

impl ActorMetrics {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ActorStats {
        ActorStats {
            loops_started: self.loops_started.load(Ordering::Relaxed),
            loops_stopped: self.loops_stopped.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            envelopes_dispatched: self.envelopes_dispatched.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            faults_contained: self.faults_contained.load(Ordering::Relaxed),
            timer_ticks: self.timer_ticks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActorError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_actor_status_display() {
        assert_eq!(format!("{}", ActorStatus::Idle), "Idle");
        assert_eq!(format!("{}", ActorStatus::Running), "Running");
        assert_eq!(format!("{}", ActorStatus::Stopped), "Stopped");
    }

    #[test]
    fn test_closures_are_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut handler = move |producer: u32, target: u64, msg: String| -> Result<()> {
            sink.lock().push((producer, target, msg));
            Ok(())
        };
        handler.handle(1, 2, "a".to_string()).unwrap();
        handler.handle(3, 4, "b".to_string()).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![(1, 2, "a".to_string()), (3, 4, "b".to_string())]
        );

        let mut failing = |_: u32, _: u64, _: ()| -> Result<()> {
            Err(ActorError::HandlerFailed("nope".to_string()))?
        };
        assert!(failing.handle(0, 0, ()).is_err());
    }

    #[test]
    fn test_closures_are_timer_callbacks() {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let mut callback = move || -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        callback.on_tick().unwrap();
        callback.on_tick().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = ActorMetrics::default();
        ActorMetrics::bump(&metrics.drains);
        ActorMetrics::bump(&metrics.drains);
        ActorMetrics::bump(&metrics.timer_ticks);

        let stats = metrics.snapshot();
        assert_eq!(stats.drains, 2);
        assert_eq!(stats.timer_ticks, 1);
        assert_eq!(stats.envelopes_dispatched, 0);
    }
}
