//! The actor event loop.
//!
//! One task per actor multiplexes four sources with `select!`: the wake
//! notification (drain the mailbox), the cancellation token (shut down), the
//! timer, and control commands sent by [`Actor`](super::Actor) handles. All
//! loop state lives in [`LoopCore`] and is only touched from inside the task.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::actor_trait::{ActorMetrics, MessageHandler, TimerCallback};
use super::codec::{CodecKind, MessageRegistry};
use super::mailbox::{Envelope, Mailbox};
use super::timer::TimerState;
use super::wake::WakeSignal;
use crate::error::{ActorError, Result};

pub(crate) type RegistryUpdate<M> = Box<dyn FnOnce(&mut MessageRegistry<M>) + Send>;

/// Requests applied by the loop on behalf of other threads.
pub(crate) enum Control<M> {
    RegisterTimer {
        period: Duration,
        callback: Box<dyn TimerCallback>,
    },
    CancelTimer,
    SetCodec(CodecKind),
    RegisterMessage(RegistryUpdate<M>),
    SetHandler(Box<dyn MessageHandler<M>>),
}

/// State shared between actor handles, producers and the loop.
pub(crate) struct Shared<M> {
    pub name: String,
    pub mailbox: Box<dyn Mailbox<Envelope>>,
    pub wake: WakeSignal,
    pub started: AtomicBool,
    pub slot: Mutex<LoopSlot<M>>,
    pub metrics: ActorMetrics,
    pub stop_timeout: Duration,
}

/// Where the loop state currently is.
pub(crate) enum LoopSlot<M> {
    /// Not running; the state waits here for the next `start`.
    Parked(Box<LoopCore<M>>),
    Running(RunningLoop),
    /// A stop is in flight, or the loop died without parking its state.
    Vacant,
}

pub(crate) struct RunningLoop {
    pub token: CancellationToken,
    pub handle: JoinHandle<()>,
}

/// Everything the loop owns exclusively.
pub(crate) struct LoopCore<M> {
    registry: MessageRegistry<M>,
    handler: Option<Box<dyn MessageHandler<M>>>,
    timer: TimerState,
    control: mpsc::UnboundedReceiver<Control<M>>,
}

impl<M: Send + 'static> LoopCore<M> {
    pub fn new(
        registry: MessageRegistry<M>,
        handler: Option<Box<dyn MessageHandler<M>>>,
        control: mpsc::UnboundedReceiver<Control<M>>,
    ) -> Self {
        Self {
            registry,
            handler,
            timer: TimerState::default(),
            control,
        }
    }

    fn apply(&mut self, cmd: Control<M>) {
        match cmd {
            Control::RegisterTimer { period, callback } => {
                let replaced = self.timer.is_active();
                self.timer.replace(period, callback);
                debug!(?period, replaced, "Timer registered");
            }
            Control::CancelTimer => {
                self.timer.cancel();
                debug!("Timer cancelled");
            }
            Control::SetCodec(codec) => {
                self.registry.set_codec(codec);
                debug!(%codec, "Codec changed");
            }
            Control::RegisterMessage(update) => update(&mut self.registry),
            Control::SetHandler(handler) => {
                self.handler = Some(handler);
                debug!("Message handler installed");
            }
        }
    }

    fn apply_pending_control(&mut self) {
        while let Ok(cmd) = self.control.try_recv() {
            self.apply(cmd);
        }
    }

    /// Empty the mailbox, then clear the wake flag. If something landed
    /// between the last pop and the clear, the producer that pushed it lost
    /// its CAS and sent no wake, so take the flag back and keep going.
    fn drain(&mut self, shared: &Shared<M>) {
        self.apply_pending_control();
        ActorMetrics::bump(&shared.metrics.drains);

        let mut drained = 0u64;
        loop {
            while let Some(envelope) = shared.mailbox.pop() {
                self.dispatch(shared, envelope);
                drained += 1;
            }
            shared.wake.clear();
            if shared.mailbox.is_empty() || !shared.wake.claim() {
                break;
            }
        }
        debug!(drained, "Mailbox drained");
    }

    fn dispatch(&mut self, shared: &Shared<M>, envelope: Envelope) {
        let Envelope {
            producer_id,
            target_id,
            payload,
        } = envelope;
        ActorMetrics::bump(&shared.metrics.envelopes_dispatched);

        let msg = match self.registry.decode(&payload) {
            Ok(msg) => msg,
            Err(e) => {
                ActorMetrics::bump(&shared.metrics.decode_failures);
                warn!(producer_id, target_id, error = %e, "Failed to decode envelope");
                return;
            }
        };

        let Some(handler) = self.handler.as_mut() else {
            debug!(producer_id, target_id, "No message handler installed, dropping message");
            return;
        };

        if let Err(report) = contain(|| handler.handle(producer_id, target_id, msg)) {
            ActorMetrics::bump(&shared.metrics.faults_contained);
            error!(producer_id, target_id, error = ?report, "Message handler fault contained");
        }
    }

    fn on_timer(&mut self, shared: &Shared<M>) {
        ActorMetrics::bump(&shared.metrics.timer_ticks);
        let timer = &mut self.timer;
        if let Err(report) = contain(|| timer.fire()) {
            ActorMetrics::bump(&shared.metrics.faults_contained);
            error!(error = ?report, "Timer callback fault contained");
        }
    }

    /// Teardown, run by the loop itself on exit.
    fn clear(&mut self) {
        if let Some(period) = self.timer.period() {
            debug!(?period, "Releasing timer");
        }
        self.timer.cancel();
    }
}

/// Resets the start flag when the loop task dies without reaching teardown,
/// including when its runtime drops it. Normal exits disarm it.
struct StartedGuard<'a> {
    started: &'a AtomicBool,
    armed: bool,
}

impl<'a> StartedGuard<'a> {
    fn new(started: &'a AtomicBool) -> Self {
        Self {
            started,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartedGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.started.store(false, Ordering::SeqCst);
        }
    }
}

pub(crate) async fn run_loop<M: Send + 'static>(
    core: Box<LoopCore<M>>,
    shared: Arc<Shared<M>>,
    token: CancellationToken,
) {
    let mut guard = StartedGuard::new(&shared.started);
    let mut core = *core;
    info!("Actor loop running");

    core.apply_pending_control();

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Stop requested, leaving actor loop");
                break;
            }
            _ = shared.wake.notified() => core.drain(&shared),
            cmd = core.control.recv() => match cmd {
                Some(cmd) => core.apply(cmd),
                None => {
                    info!("All actor handles dropped, leaving actor loop");
                    break;
                }
            },
            _ = core.timer.tick() => core.on_timer(&shared),
        }
    }

    core.clear();
    {
        // Parked state and a cleared flag become visible together to `start`.
        let mut slot = shared.slot.lock();
        *slot = LoopSlot::Parked(Box::new(core));
        ActorMetrics::bump(&shared.metrics.loops_stopped);
        shared.started.store(false, Ordering::SeqCst);
    }
    guard.disarm();
    info!("Actor loop stopped, timer released");
}

/// Run one handler invocation, turning a panic into an error report.
pub(crate) fn contain<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Report::new(ActorError::HandlerPanicked(panic_message(
            payload.as_ref(),
        )))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::mailbox::ChannelMailbox;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::AtomicU64;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tick(u64);

    fn shared_with_core(
        handler: Option<Box<dyn MessageHandler<Tick>>>,
    ) -> (Arc<Shared<Tick>>, LoopCore<Tick>, mpsc::UnboundedSender<Control<Tick>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = MessageRegistry::new(CodecKind::Bincode);
        registry.register::<Tick>(1);
        let shared = Arc::new(Shared {
            name: "test".to_string(),
            mailbox: Box::new(ChannelMailbox::new()),
            wake: WakeSignal::new(),
            started: AtomicBool::new(false),
            slot: Mutex::new(LoopSlot::Vacant),
            metrics: ActorMetrics::default(),
            stop_timeout: Duration::from_secs(1),
        });
        (shared, LoopCore::new(registry, handler, rx), tx)
    }

    fn boxed<H: MessageHandler<Tick>>(handler: H) -> Box<dyn MessageHandler<Tick>> {
        Box::new(handler)
    }

    fn push(shared: &Shared<Tick>, producer: u32, n: u64) {
        let frame = crate::actor::codec::encode_frame(CodecKind::Bincode, 1, &Tick(n)).unwrap();
        shared.mailbox.push(Envelope::new(producer, n, frame));
        shared.wake.raise();
    }

    #[test]
    fn test_contain_passes_results_through() {
        assert!(contain(|| Ok(())).is_ok());

        let err = contain(|| Err(ActorError::HandlerFailed("bad".to_string()))?).unwrap_err();
        assert!(matches!(err.current_context(), ActorError::HandlerFailed(_)));
    }

    #[test]
    fn test_contain_catches_panics() {
        let err = contain(|| panic!("boom")).unwrap_err();
        match err.current_context() {
            ActorError::HandlerPanicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = contain(|| panic!("code {}", 7)).unwrap_err();
        match err.current_context() {
            ActorError::HandlerPanicked(msg) => assert_eq!(msg, "code 7"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_drain_clears_flag_and_dispatches_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = boxed(move |_: u32, _: u64, msg: Tick| -> Result<()> {
            sink.lock().push(msg.0);
            Ok(())
        });
        let (shared, mut core, _tx) = shared_with_core(Some(handler));

        for n in 0..10 {
            push(&shared, 1, n);
        }
        assert!(shared.wake.is_raised());

        core.drain(&shared);
        assert!(!shared.wake.is_raised());
        assert!(shared.mailbox.is_empty());
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());

        let stats = shared.metrics.snapshot();
        assert_eq!(stats.drains, 1);
        assert_eq!(stats.envelopes_dispatched, 10);
    }

    #[test]
    fn test_drain_picks_up_push_that_lost_the_wake_race() {
        let handled = Arc::new(AtomicU64::new(0));
        let counter = handled.clone();
        let (shared, mut core, _tx) = shared_with_core(Some(boxed(
            move |_: u32, _: u64, _: Tick| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )));

        // A push whose raise failed because the flag was already held: no
        // notification exists for it, only the envelope.
        assert!(shared.wake.claim());
        let frame = crate::actor::codec::encode_frame(CodecKind::Bincode, 1, &Tick(5)).unwrap();
        shared.mailbox.push(Envelope::new(1, 5, frame));
        assert!(!shared.wake.raise());

        core.drain(&shared);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert!(shared.mailbox.is_empty());
        assert!(!shared.wake.is_raised());
    }

    #[test]
    fn test_decode_failure_and_missing_handler_are_not_faults() {
        let (shared, mut core, _tx) = shared_with_core(None);
        shared.mailbox.push(Envelope::new(1, 1, vec![9, 9]));
        push(&shared, 1, 2);

        core.drain(&shared);
        let stats = shared.metrics.snapshot();
        assert_eq!(stats.envelopes_dispatched, 2);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.faults_contained, 0);
    }

    #[test]
    fn test_pending_control_applies_before_dispatch() {
        let (shared, mut core, tx) = shared_with_core(None);
        let handled = Arc::new(AtomicU64::new(0));
        let counter = handled.clone();

        tx.send(Control::SetHandler(boxed(
            move |_: u32, _: u64, _: Tick| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )))
        .unwrap();
        push(&shared, 3, 1);

        core.drain(&shared);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_fault_does_not_stop_drain() {
        let handled = Arc::new(AtomicU64::new(0));
        let counter = handled.clone();
        let (shared, mut core, _tx) = shared_with_core(Some(boxed(
            move |_: u32, target: u64, _: Tick| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                match target {
                    2 => Err(ActorError::HandlerFailed("target 2".to_string()))?,
                    4 => panic!("target 4"),
                    _ => Ok(()),
                }
            },
        )));

        for n in 1..=6 {
            push(&shared, 1, n);
        }
        core.drain(&shared);

        assert_eq!(handled.load(Ordering::SeqCst), 6);
        assert_eq!(shared.metrics.snapshot().faults_contained, 2);
    }
}
