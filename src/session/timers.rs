//! Keyed one-shot timers with arm-and-replace semantics.
//!
//! Each key has at most one pending timer.  Arming a key aborts the previous
//! sleep and bumps the key's sequence number; a fire message whose sequence
//! is no longer current is discarded by [`TimerSet::take_fired`], so a sleep
//! that finished just before it was replaced can never act twice.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct TimerSet<K> {
    tx: mpsc::UnboundedSender<(K, u64)>,
    pending: HashMap<K, (u64, JoinHandle<()>)>,
    next_seq: u64,
}

impl<K> TimerSet<K>
where
    K: Copy + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    /// The receiver yields `(key, seq)` for every sleep that completes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(K, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: HashMap::new(),
                next_seq: 0,
            },
            rx,
        )
    }

    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, key: K, delay: Duration) {
        self.cancel(key);
        self.next_seq += 1;
        let seq = self.next_seq;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((key, seq));
        });
        self.pending.insert(key, (seq, handle));
    }

    pub fn cancel(&mut self, key: K) {
        if let Some((_, handle)) = self.pending.remove(&key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Accept a fire message.  Returns `false` for a replaced or cancelled
    /// timer.
    pub fn take_fired(&mut self, key: K, seq: u64) -> bool {
        match self.pending.get(&key) {
            Some((current, _)) if *current == seq => {
                self.pending.remove(&key);
                true
            }
            _ => {
                log::debug!("timers: dropping stale {key:?} (seq {seq})");
                false
            }
        }
    }
}

impl<K> Drop for TimerSet<K> {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }
}
