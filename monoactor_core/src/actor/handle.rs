use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use error_stack::Report;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::actor_trait::{ActorMetrics, ActorStats, ActorStatus, MessageHandler, TimerCallback};
use super::codec::{CodecKind, MessageRegistry};
use super::mailbox::{ChannelMailbox, Envelope, Mailbox};
use super::runner::{run_loop, Control, LoopCore, LoopSlot, RunningLoop, Shared};
use super::wake::WakeSignal;
use crate::config::{ActorConfig, DEFAULT_STOP_TIMEOUT};
use crate::error::{ActorError, Result};

/// Handle to a single actor.
///
/// Cloning is cheap and every clone addresses the same actor. `send` may be
/// called from any thread, including threads outside the tokio runtime.
pub struct Actor<M> {
    shared: Arc<Shared<M>>,
    control: mpsc::UnboundedSender<Control<M>>,
}

impl<M> Clone for Actor<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            control: self.control.clone(),
        }
    }
}

impl<M: Send + 'static> Actor<M> {
    /// A fresh, not-started actor: no timer, default codec, no handler.
    pub fn new(name: impl Into<String>) -> Self {
        ActorBuilder::new().name(name).build()
    }

    pub fn from_config(config: &ActorConfig) -> Self {
        ActorBuilder::new().config(config).build()
    }

    pub fn builder() -> ActorBuilder<M> {
        ActorBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Spawn the loop on the current tokio runtime. Returns `Ok(false)` when
    /// a loop is already running.
    ///
    /// Fails with `Stopping` while an earlier stop is still tearing the loop
    /// down. A loop that ended without parking its state, for example because
    /// its runtime shut down underneath it, takes the registry and handler
    /// with it: `start` then reports `LoopLost` and the actor must be rebuilt.
    pub fn start(&self) -> Result<bool> {
        let shared = &self.shared;
        let Ok(runtime) = Handle::try_current() else {
            return Err(Report::new(ActorError::NoRuntime)
                .attach_printable(format!("starting actor `{}`", shared.name)));
        };

        let mut slot = shared.slot.lock();
        let core = match std::mem::replace(&mut *slot, LoopSlot::Vacant) {
            LoopSlot::Parked(core) => core,
            LoopSlot::Running(running) if !running.handle.is_finished() => {
                *slot = LoopSlot::Running(running);
                debug!(actor = %shared.name, "Actor already started");
                return Ok(false);
            }
            LoopSlot::Running(_) => {
                shared.started.store(false, Ordering::SeqCst);
                return Err(Report::new(ActorError::LoopLost).attach_printable(format!(
                    "actor `{}` loop ended without parking its state",
                    shared.name
                )));
            }
            LoopSlot::Vacant if shared.started.load(Ordering::SeqCst) => {
                return Err(Report::new(ActorError::Stopping)
                    .attach_printable(format!("starting actor `{}`", shared.name)));
            }
            LoopSlot::Vacant => {
                return Err(Report::new(ActorError::LoopLost)
                    .attach_printable(format!("starting actor `{}`", shared.name)));
            }
        };

        if shared
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            *slot = LoopSlot::Parked(core);
            debug!(actor = %shared.name, "Actor already started");
            return Ok(false);
        }

        let token = CancellationToken::new();
        let span = info_span!("actor", name = %shared.name);
        let handle = runtime.spawn(run_loop(core, shared.clone(), token.clone()).instrument(span));
        *slot = LoopSlot::Running(RunningLoop { token, handle });
        drop(slot);

        ActorMetrics::bump(&shared.metrics.loops_started);
        info!(actor = %shared.name, "Actor started");
        Ok(true)
    }

    /// Ask the loop to stop. The returned ack resolves once teardown is done;
    /// the caller decides how long to wait for it.
    pub fn request_stop(&self) -> Result<StopAck> {
        let mut slot = self.shared.slot.lock();
        match std::mem::replace(&mut *slot, LoopSlot::Vacant) {
            LoopSlot::Running(running) => {
                running.token.cancel();
                debug!(actor = %self.shared.name, "Stop requested");
                Ok(StopAck {
                    handle: running.handle,
                })
            }
            other => {
                *slot = other;
                Err(Report::new(ActorError::NotRunning)
                    .attach_printable(format!("stopping actor `{}`", self.shared.name)))
            }
        }
    }

    /// Stop the loop and wait for it, bounded by the configured stop timeout.
    pub async fn stop(&self) -> Result<()> {
        let ack = self.request_stop()?;
        let limit = self.shared.stop_timeout;
        match tokio::time::timeout(limit, ack.wait()).await {
            Ok(result) => result,
            Err(_) => Err(Report::new(ActorError::StopTimedOut(limit))
                .attach_printable(format!("stopping actor `{}`", self.shared.name))),
        }
    }

    /// Queue an envelope. Never blocks and never fails; only the producer that
    /// flips the wake flag notifies the loop.
    pub fn send(&self, producer_id: u32, target_id: u64, payload: impl Into<Bytes>) {
        self.shared
            .mailbox
            .push(Envelope::new(producer_id, target_id, payload));
        if self.shared.wake.raise() {
            ActorMetrics::bump(&self.shared.metrics.wakeups);
        }
    }

    /// Replace the timer. The old timer stops before the new one starts.
    pub fn register_timer<C: TimerCallback>(&self, period: Duration, callback: C) -> Result<()> {
        if period.is_zero() {
            Err(ActorError::InvalidTimerPeriod)?
        }
        self.control(Control::RegisterTimer {
            period,
            callback: Box::new(callback),
        });
        Ok(())
    }

    pub fn cancel_timer(&self) {
        self.control(Control::CancelTimer);
    }

    pub fn set_codec(&self, codec: CodecKind) {
        self.control(Control::SetCodec(codec));
    }

    /// Decode frames tagged `id` as `T`, then convert into the actor's message type.
    pub fn register_message<T>(&self, id: u32)
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        self.control(Control::RegisterMessage(Box::new(
            move |registry: &mut MessageRegistry<M>| registry.register::<T>(id),
        )));
    }

    pub fn set_handler<H: MessageHandler<M>>(&self, handler: H) {
        self.control(Control::SetHandler(Box::new(handler)));
    }

    pub fn is_running(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ActorStatus {
        if self.is_running() {
            ActorStatus::Running
        } else if self.shared.metrics.loops_stopped.load(Ordering::Relaxed) > 0 {
            ActorStatus::Stopped
        } else {
            ActorStatus::Idle
        }
    }

    pub fn stats(&self) -> ActorStats {
        self.shared.metrics.snapshot()
    }

    /// Envelopes queued but not yet popped by the loop.
    pub fn pending(&self) -> usize {
        self.shared.mailbox.len()
    }

    fn control(&self, cmd: Control<M>) {
        if self.control.send(cmd).is_err() {
            warn!(actor = %self.shared.name, "Actor loop state is gone, control command dropped");
        }
    }
}

/// Acknowledgement for a stop request.
#[derive(Debug)]
#[must_use = "a stop is only confirmed once the ack is awaited"]
pub struct StopAck {
    handle: JoinHandle<()>,
}

impl StopAck {
    /// Resolves after the loop has torn down and the actor can be restarted.
    pub async fn wait(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| Report::new(ActorError::LoopAborted(e.to_string())))
    }
}

/// Builder for [`Actor`]. Everything set here is in place before the loop's
/// first iteration.
pub struct ActorBuilder<M> {
    name: String,
    stop_timeout: Duration,
    registry: MessageRegistry<M>,
    handler: Option<Box<dyn MessageHandler<M>>>,
    mailbox: Option<Box<dyn Mailbox<Envelope>>>,
    timer: Option<(Duration, Box<dyn TimerCallback>)>,
}

impl<M: Send + 'static> ActorBuilder<M> {
    pub fn new() -> Self {
        Self {
            name: "actor".to_string(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            registry: MessageRegistry::new(CodecKind::default()),
            handler: None,
            mailbox: None,
            timer: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Apply name, codec and stop timeout from a config. A configured timer
    /// period needs a callback, so it is left to [`ActorBuilder::timer`].
    pub fn config(mut self, config: &ActorConfig) -> Self {
        self.name = config.name.clone();
        self.stop_timeout = config.stop_timeout;
        self.registry.set_codec(config.codec);
        self
    }

    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.registry.set_codec(codec);
        self
    }

    pub fn stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn register<T>(mut self, id: u32) -> Self
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        self.registry.register::<T>(id);
        self
    }

    pub fn handler<H: MessageHandler<M>>(mut self, handler: H) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn mailbox<B: Mailbox<Envelope> + 'static>(mut self, mailbox: B) -> Self {
        self.mailbox = Some(Box::new(mailbox));
        self
    }

    /// Install a timer when the loop first starts. A zero period is ignored
    /// with a warning.
    pub fn timer<C: TimerCallback>(mut self, period: Duration, callback: C) -> Self {
        if period.is_zero() {
            warn!(actor = %self.name, "Ignoring zero timer period");
        } else {
            self.timer = Some((period, Box::new(callback)));
        }
        self
    }

    pub fn build(self) -> Actor<M> {
        let (control, rx) = mpsc::unbounded_channel();
        if let Some((period, callback)) = self.timer {
            // The receiver is alive right here, so this cannot fail.
            let _ = control.send(Control::RegisterTimer { period, callback });
        }

        let core = LoopCore::new(self.registry, self.handler, rx);
        let shared = Shared {
            name: self.name,
            mailbox: self
                .mailbox
                .unwrap_or_else(|| Box::new(ChannelMailbox::new())),
            wake: WakeSignal::new(),
            started: AtomicBool::new(false),
            slot: Mutex::new(LoopSlot::Parked(Box::new(core))),
            metrics: ActorMetrics::default(),
            stop_timeout: self.stop_timeout,
        };

        Actor {
            shared: Arc::new(shared),
            control,
        }
    }
}

impl<M: Send + 'static> Default for ActorBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}
