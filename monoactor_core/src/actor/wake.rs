//! Wake-up deduplication between producers and the actor loop.
//!
//! Producers raise the flag after every push; only the producer that moves it
//! from clear to raised notifies the loop. `Notify` keeps a single permit when
//! the loop is busy, so at most one drain is ever pending no matter how many
//! pushes race in.

use std::sync::atomic::{fence, AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct WakeSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a producer after its push. Returns `true` when this call won
    /// the transition and sent the notification.
    pub fn raise(&self) -> bool {
        // Pairs with the fence in `clear`: either the loop sees our push when
        // it rechecks the mailbox, or we see the cleared flag here.
        fence(Ordering::SeqCst);
        if self.claim() {
            self.notify.notify_one();
            true
        } else {
            false
        }
    }

    /// Take the flag without notifying. Used by the loop to keep draining when
    /// it finds work after clearing.
    pub fn claim(&self) -> bool {
        self.raised
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Reset the flag once the mailbox has been observed empty.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
        fence(Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_only_first_raise_notifies() {
        let wake = WakeSignal::new();
        assert!(!wake.is_raised());
        assert!(wake.raise());
        assert!(!wake.raise());
        assert!(!wake.raise());
        assert!(wake.is_raised());

        wake.clear();
        assert!(!wake.is_raised());
        assert!(wake.raise());
    }

    #[test]
    fn test_claim_does_not_steal_raised_flag() {
        let wake = WakeSignal::new();
        assert!(wake.claim());
        assert!(!wake.claim());
        assert!(!wake.raise());
        wake.clear();
        assert!(wake.claim());
    }

    #[tokio::test]
    async fn test_permit_survives_until_loop_waits() {
        let wake = WakeSignal::new();
        assert!(wake.raise());

        // The loop was not waiting yet; the stored permit must still wake it.
        tokio::time::timeout(Duration::from_millis(100), wake.notified())
            .await
            .expect("stored permit should complete the wait");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_raises_send_one_notification() {
        let wake = Arc::new(WakeSignal::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let wake = wake.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if wake.raise() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        wake.notified().await;
    }
}
