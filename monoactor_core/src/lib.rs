//! A single actor: one mailbox, one serial event loop, an optional periodic
//! timer, and containment of handler faults.

pub mod actor;
pub mod config;
pub mod error;

pub use actor::{encode_frame, Actor, ActorBuilder, ActorStats, ActorStatus, CodecKind, Envelope};
pub use config::{load_config_from_toml, load_config_from_toml_file, ActorConfig};
pub use error::{ActorError, Result};
