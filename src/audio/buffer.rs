//! Bounded FIFO of 16 kHz mono samples shared between the capture callback
//! and the recognizer ([`AudioFeed`]).
//!
//! The capture side appends; the recognizer periodically drains whatever
//! arrived since its last poll.  When the reader falls behind, the oldest
//! samples are discarded so memory stays bounded.
//!
//! ```rust
//! use interview_voice::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.dropped(), 1);
//! assert_eq!(buf.drain(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed-capacity FIFO that overwrites its oldest entries on overflow.
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T: Copy> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push_slice(&mut self, data: &[T]) {
        // Only the newest `capacity` items of `data` can survive.
        let skip = data.len().saturating_sub(self.capacity);
        self.dropped += skip as u64;
        for &item in &data[skip..] {
            if self.items.len() == self.capacity {
                self.items.pop_front();
                self.dropped += 1;
            }
            self.items.push_back(item);
        }
    }

    /// Take every stored item in arrival order.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items overwritten since creation (reader too slow).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// 30 s of 16 kHz audio.
pub const DEFAULT_FEED_CAPACITY: usize = 16_000 * 30;

/// Sample feed shared by the capture stream (writer) and the recognizer
/// (reader), plus a flag the capture side raises when the device goes away.
pub struct AudioFeed {
    samples: Mutex<RingBuffer<f32>>,
    lost: AtomicBool,
}

impl AudioFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(RingBuffer::new(capacity)),
            lost: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer<f32>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, samples: &[f32]) {
        self.lock().push_slice(samples);
    }

    pub fn drain(&self) -> Vec<f32> {
        self.lock().drain()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::SeqCst);
    }

    /// Called when a fresh stream is opened.
    pub fn mark_live(&self) {
        self.lost.store(false, Ordering::SeqCst);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

impl Default for AudioFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

pub type SharedFeed = Arc<AudioFeed>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_in_order_and_empties() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1, 2, 3]);
        buf.push_slice(&[4]);
        assert_eq!(buf.drain(), vec![1, 2, 3, 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_keeps_newest() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1, 2]);
        buf.push_slice(&[3, 4, 5, 6, 7]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped(), 4);
        assert_eq!(buf.drain(), vec![5, 6, 7]);
    }

    #[test]
    fn feed_tracks_loss_and_drains() {
        let feed = AudioFeed::new(16);
        feed.push(&[0.1, 0.2]);
        assert!(!feed.is_lost());
        feed.mark_lost();
        assert!(feed.is_lost());
        feed.mark_live();
        assert!(!feed.is_lost());
        assert_eq!(feed.drain(), vec![0.1, 0.2]);
        assert!(feed.drain().is_empty());
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<f32>::new(0);
    }
}
