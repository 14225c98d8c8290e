/*!
# Actor

A single-actor primitive: one loop that owns a mailbox, handles envelopes one
at a time and optionally runs a periodic timer.

## Core Components

### [`handle`] - Public Surface
- `Actor<M>` - Cloneable handle: `start`, `stop`, `send`, `register_timer`, ...
- `ActorBuilder<M>` - Configure registry, handler, timer and mailbox up front
- `StopAck` - Acknowledgement the caller awaits under its own timeout

### `runner` - Event Loop
Multiplexes mailbox wake-ups, stop requests, timer ticks and control commands.
Every handler call is contained: errors and panics are logged, never fatal.

### [`wake`] - Wake Protocol
An atomic flag in front of a `Notify` so concurrent sends trigger at most one
pending drain.

### [`mailbox`], [`codec`], `timer`
- `Mailbox<T>` / `ChannelMailbox<T>` - MPSC queue seam and its default
- `MessageRegistry<M>` / `CodecKind` - id-tagged frames decoded into `M`
- timer state, `Idle` until a timer is registered

## Usage Example

```rust,no_run
use std::time::Duration;

use monoactor_core::actor::{encode_frame, Actor, CodecKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Greet {
    name: String,
}

# #[tokio::main]
# async fn main() -> monoactor_core::error::Result<()> {
let actor = Actor::<Greet>::builder()
    .name("greeter")
    .register::<Greet>(1)
    .handler(|producer: u32, target: u64, msg: Greet| -> monoactor_core::error::Result<()> {
        println!("{producer}->{target}: hello {}", msg.name);
        Ok(())
    })
    .build();

actor.start()?;
actor.register_timer(Duration::from_secs(1), || -> monoactor_core::error::Result<()> {
    println!("tick");
    Ok(())
})?;

let frame = encode_frame(CodecKind::Bincode, 1, &Greet { name: "loop".into() })?;
actor.send(1, 42, frame);

actor.stop().await?;
# Ok(())
# }
```
*/

pub mod actor_trait;
pub mod codec;
pub mod handle;
pub mod mailbox;
mod runner;
mod timer;
pub mod wake;

pub use actor_trait::{ActorStats, ActorStatus, MessageHandler, TimerCallback};
pub use codec::{encode_frame, CodecKind, DecodeError, MessageRegistry, FRAME_HEADER_LEN};
pub use handle::{Actor, ActorBuilder, StopAck};
pub use mailbox::{ChannelMailbox, Envelope, Mailbox};
pub use wake::WakeSignal;
