//! Message codec and registry.
//!
//! Payloads travel as a small frame: a little-endian `u32` message id followed
//! by the body encoded with the actor's [`CodecKind`]. The registry maps each
//! id to a decode function producing the actor's domain message type `M`.

use std::collections::HashMap;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ActorError, Result};

/// Size of the message id prefix on every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Body encoding used by a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::Bincode => write!(f, "bincode"),
            CodecKind::Json => write!(f, "json"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame is {0} bytes, shorter than the message id header")]
    Truncated(usize),

    #[error("no message registered for id {0}")]
    UnknownMessage(u32),

    #[error("malformed {codec} body for message {id}: {reason}")]
    Malformed {
        id: u32,
        codec: CodecKind,
        reason: String,
    },
}

type DecodeFn<M> = Box<dyn Fn(CodecKind, &[u8]) -> std::result::Result<M, String> + Send>;

/// Typed registry from message ids to decode logic.
pub struct MessageRegistry<M> {
    codec: CodecKind,
    decoders: HashMap<u32, DecodeFn<M>>,
}

impl<M: 'static> MessageRegistry<M> {
    pub fn new(codec: CodecKind) -> Self {
        Self {
            codec,
            decoders: HashMap::new(),
        }
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub fn set_codec(&mut self, codec: CodecKind) {
        self.codec = codec;
    }

    /// Associate `id` with the body type `T`. Registering an id twice replaces
    /// the earlier decoder.
    pub fn register<T>(&mut self, id: u32)
    where
        T: DeserializeOwned + Into<M> + 'static,
    {
        let decode: DecodeFn<M> = Box::new(
            |codec: CodecKind, body: &[u8]| -> std::result::Result<M, String> {
                let value: T = match codec {
                    CodecKind::Bincode => bincode::deserialize(body).map_err(|e| e.to_string())?,
                    CodecKind::Json => serde_json::from_slice(body).map_err(|e| e.to_string())?,
                };
                Ok(value.into())
            },
        );
        self.decoders.insert(id, decode);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.decoders.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode one frame into a domain message.
    pub fn decode(&self, frame: &[u8]) -> std::result::Result<M, DecodeError> {
        let (id, body) = split_frame(frame)?;
        let decode = self
            .decoders
            .get(&id)
            .ok_or(DecodeError::UnknownMessage(id))?;
        decode(self.codec, body).map_err(|reason| DecodeError::Malformed {
            id,
            codec: self.codec,
            reason,
        })
    }
}

impl<M: 'static> Default for MessageRegistry<M> {
    fn default() -> Self {
        Self::new(CodecKind::default())
    }
}

impl<M> fmt::Debug for MessageRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("MessageRegistry")
            .field("codec", &self.codec)
            .field("ids", &ids)
            .finish()
    }
}

fn split_frame(frame: &[u8]) -> std::result::Result<(u32, &[u8]), DecodeError> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(DecodeError::Truncated(frame.len()));
    }
    let (header, body) = frame.split_at(FRAME_HEADER_LEN);
    let id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    Ok((id, body))
}

/// Build a frame for `message` under `id`, for producers feeding an actor.
pub fn encode_frame<T: Serialize>(codec: CodecKind, id: u32, message: &T) -> Result<Vec<u8>> {
    let body = match codec {
        CodecKind::Bincode => bincode::serialize(message).map_err(|e| e.to_string()),
        CodecKind::Json => serde_json::to_vec(message).map_err(|e| e.to_string()),
    }
    .map_err(|reason| ActorError::EncodeError { id, reason })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}
