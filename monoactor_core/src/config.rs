use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use tokio::fs;

use crate::actor::CodecKind;
use crate::error::{ActorError, Result};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn default_name() -> String {
    "actor".to_string()
}

fn default_stop_timeout() -> Duration {
    DEFAULT_STOP_TIMEOUT
}

/// Settings for one actor, usually read from the `[actor]` table of a TOML
/// file.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActorConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub codec: CodecKind,

    /// Period for a timer the embedding code registers; absent means no timer.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "timer_period_ms")]
    pub timer_period: Option<Duration>,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_stop_timeout", rename = "stop_timeout_ms")]
    pub stop_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            codec: CodecKind::default(),
            timer_period: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    actor: ActorConfig,
}

pub async fn load_config_from_toml(toml: &str) -> Result<ActorConfig> {
    let file: ConfigFile = toml::de::from_str(toml).map_err(ActorError::TomlError)?;
    validate(&file.actor)?;
    Ok(file.actor)
}

pub async fn load_config_from_toml_file(file_path: &str) -> Result<ActorConfig> {
    let toml_content = fs::read_to_string(file_path)
        .await
        .map_err(ActorError::FileError)?;
    let config = load_config_from_toml(&toml_content).await?;
    Ok(config)
}

fn validate(config: &ActorConfig) -> Result<()> {
    if config.timer_period == Some(Duration::ZERO) {
        Err(ActorError::InvalidTimerPeriod)?
    }
    if config.stop_timeout.is_zero() {
        Err(ActorError::TomlDeserializationError(
            "stop_timeout_ms must be greater than zero".to_string(),
        ))?
    }
    Ok(())
}
