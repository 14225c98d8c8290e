//! Load driver behind `monoactor run`.
//!
//! Each TOML file configures one actor (`[actor]`) and the load thrown at it
//! (`[load]`). Producers are plain OS threads, so every envelope crosses from
//! outside the runtime into the actor loop.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use monoactor_core::{
    encode_frame, load_config_from_toml, Actor, ActorConfig, ActorStats, CodecKind,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::{debug, info, trace, warn};

use crate::errors::{CLIError, CLIResult};

pub const PING_ID: u32 = 1;

/// The one message the load driver sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u64,
    pub payload: Vec<u8>,
}

fn default_producers() -> u32 {
    4
}

fn default_messages_per_producer() -> u32 {
    250
}

fn default_payload_bytes() -> usize {
    16
}

fn default_settle_timeout() -> Duration {
    Duration::from_secs(10)
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadProfile {
    #[serde(default = "default_producers")]
    pub producers: u32,

    #[serde(default = "default_messages_per_producer")]
    pub messages_per_producer: u32,

    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,

    /// How long to wait for the actor to handle everything that was sent.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_settle_timeout", rename = "settle_timeout_ms")]
    pub settle_timeout: Duration,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            messages_per_producer: default_messages_per_producer(),
            payload_bytes: default_payload_bytes(),
            settle_timeout: default_settle_timeout(),
        }
    }
}

impl LoadProfile {
    pub fn total(&self) -> u64 {
        u64::from(self.producers) * u64::from(self.messages_per_producer)
    }
}

#[derive(Debug, Deserialize)]
struct LoadFile {
    #[serde(default)]
    load: LoadProfile,
}

/// What `run` prints for each file.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub actor: String,
    pub sent: u64,
    pub handled: u64,
    pub settled: bool,
    pub stats: ActorStats,
}

pub fn load_profile(toml: &str) -> CLIResult<LoadProfile> {
    let file: LoadFile = toml::from_str(toml)
        .map_err(|e| CLIError::TomlRead(e.to_string()))?;
    if file.load.producers == 0 {
        Err(CLIError::TomlRead("load.producers must be at least 1".to_string()))?
    }
    Ok(file.load)
}

/// Parse both tables of a file without running anything.
pub async fn read_file(path: &Path) -> CLIResult<(ActorConfig, LoadProfile)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(CLIError::Io)
        .attach_printable_lazy(|| format!("reading {}", path.display()))?;
    let config = load_config_from_toml(&content)
        .await
        .change_context(CLIError::Config(path.display().to_string()))?;
    let profile =
        load_profile(&content).attach_printable_lazy(|| format!("in {}", path.display()))?;
    Ok((config, profile))
}

pub async fn run_file(path: &Path) -> CLIResult<RunReport> {
    let (config, profile) = read_file(path).await?;
    drive(&config, &profile).await
}

/// Start an actor for `config`, push `profile` through it and stop it again.
pub async fn drive(config: &ActorConfig, profile: &LoadProfile) -> CLIResult<RunReport> {
    let handled = Arc::new(AtomicU64::new(0));
    let counter = handled.clone();

    let mut builder = Actor::<Ping>::builder()
        .config(config)
        .register::<Ping>(PING_ID)
        .handler(
            move |producer_id: u32, target_id: u64, ping: Ping| -> monoactor_core::Result<()> {
                trace!(producer_id, target_id, seq = ping.seq, "ping");
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
        );
    if let Some(period) = config.timer_period {
        let name = config.name.clone();
        builder = builder.timer(period, move || -> monoactor_core::Result<()> {
            debug!(actor = %name, "heartbeat");
            Ok(())
        });
    }
    let actor = builder.build();

    actor
        .start()
        .change_context(CLIError::Actor(config.name.clone()))?;
    info!(
        actor = %config.name,
        producers = profile.producers,
        messages = profile.total(),
        "Driving load"
    );

    let sent = {
        let actor = actor.clone();
        let profile = profile.clone();
        let codec = config.codec;
        tokio::task::spawn_blocking(move || produce(&actor, &profile, codec))
            .await
            .map_err(|e| Report::new(CLIError::Other(format!("producer pool failed: {e}"))))??
    };

    let settled = settle(&handled, sent, profile.settle_timeout).await;
    if !settled {
        warn!(
            actor = %config.name,
            sent,
            handled = handled.load(Ordering::Relaxed),
            "Load did not settle in time"
        );
    }

    actor
        .stop()
        .await
        .change_context(CLIError::Actor(config.name.clone()))?;

    Ok(RunReport {
        actor: config.name.clone(),
        sent,
        handled: handled.load(Ordering::Relaxed),
        settled,
        stats: actor.stats(),
    })
}

pub fn render(report: &RunReport) -> CLIResult<String> {
    toml::to_string(report).map_err(|e| Report::new(CLIError::Other(e.to_string())))
}

fn produce(actor: &Actor<Ping>, profile: &LoadProfile, codec: CodecKind) -> CLIResult<u64> {
    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..profile.producers)
            .map(|producer_id| {
                let actor = actor.clone();
                scope.spawn(move || -> CLIResult<u64> {
                    let fill = (producer_id % 256) as u8;
                    for seq in 0..u64::from(profile.messages_per_producer) {
                        let ping = Ping {
                            seq,
                            payload: vec![fill; profile.payload_bytes],
                        };
                        let frame = encode_frame(codec, PING_ID, &ping)
                            .change_context(CLIError::Other("encoding ping".to_string()))?;
                        actor.send(producer_id, seq, frame);
                    }
                    Ok(u64::from(profile.messages_per_producer))
                })
            })
            .collect();

        let mut sent = 0;
        for worker in workers {
            sent += worker.join().map_err(|_| {
                Report::new(CLIError::Other("producer thread panicked".to_string()))
            })??;
        }
        Ok(sent)
    })
}

async fn settle(handled: &AtomicU64, expected: u64, limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        while handled.load(Ordering::Relaxed) < expected {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}
