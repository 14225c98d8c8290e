use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// One unit of mailbox traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub producer_id: u32,
    pub target_id: u64,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(producer_id: u32, target_id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            producer_id,
            target_id,
            payload: payload.into(),
        }
    }
}

/// Multi-producer, single-consumer FIFO backing an actor.
///
/// `push` may be called from any thread. `pop` and `is_empty` are only called
/// from the actor loop.
pub trait Mailbox<T>: Send + Sync {
    fn push(&self, item: T);

    fn pop(&self) -> Option<T>;

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;
}

/// Unbounded mailbox on top of a crossbeam channel.
pub struct ChannelMailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> ChannelMailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl<T> Default for ChannelMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Mailbox<T> for ChannelMailbox<T> {
    fn push(&self, item: T) {
        // Both halves live in `self`, so the channel can never be disconnected here.
        let _ = self.tx.send(item);
    }

    fn pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_producer() {
        let mailbox = ChannelMailbox::new();
        assert!(mailbox.is_empty());

        for i in 0..5u64 {
            mailbox.push(Envelope::new(1, i, vec![i as u8]));
        }
        assert_eq!(mailbox.len(), 5);

        for i in 0..5u64 {
            let env = mailbox.pop().unwrap();
            assert_eq!(env.target_id, i);
            assert_eq!(&env.payload[..], &[i as u8]);
        }
        assert!(mailbox.pop().is_none());
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let mailbox: Arc<ChannelMailbox<Envelope>> = Arc::new(ChannelMailbox::new());

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    for seq in 0..500u64 {
                        mailbox.push(Envelope::new(p, seq, Bytes::new()));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut next = [0u64; 4];
        while let Some(env) = mailbox.pop() {
            let p = env.producer_id as usize;
            assert_eq!(env.target_id, next[p]);
            next[p] += 1;
        }
        assert_eq!(next, [500; 4]);
    }
}
