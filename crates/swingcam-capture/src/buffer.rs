//! Fixed-capacity chronological frame ring.
//!
//! Frames live in a pool of pre-allocated slots; the ring holds slot
//! indices oldest first. Each slot is an `Arc<Frame>`: snapshots hand out
//! handles instead of pixel copies, so readers hold the lock only long
//! enough to bump reference counts. Pushing past capacity recycles the
//! oldest slot's pixel storage in place when no snapshot still holds it,
//! so a warm buffer performs no allocation per frame.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use swingcam_core::{Frame, GrayImage};

pub const DEFAULT_CAPACITY: usize = 40;

/// Buffered frame handle; cloning it never copies pixels.
pub type SharedFrame = Arc<Frame>;

#[derive(Clone, Debug)]
struct Slot {
    frame: SharedFrame,
    /// Host clock reading when the frame was pushed.
    received: Instant,
}

#[derive(Clone, Debug)]
pub struct FrameBuffer {
    slots: Vec<Slot>,
    ring: VecDeque<usize>,
    free: Vec<usize>,
    capacity: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let now = Instant::now();
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    frame: Arc::new(Frame::new(GrayImage::default(), Duration::ZERO, 0)),
                    received: now,
                })
                .collect(),
            ring: VecDeque::with_capacity(capacity),
            free: (0..capacity).rev().collect(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Copy `frame` into the ring stamped with the current time.
    pub fn push(&mut self, frame: &Frame) {
        self.push_received(frame, Instant::now());
    }

    /// Copy `frame` into the ring, evicting the oldest frame when full.
    pub fn push_received(&mut self, frame: &Frame, received: Instant) {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => match self.ring.pop_front() {
                Some(oldest) => oldest,
                None => return,
            },
        };
        let dst = &mut self.slots[slot];
        match Arc::get_mut(&mut dst.frame) {
            Some(stored) => {
                stored.image.copy_from(&frame.view());
                stored.timestamp = frame.timestamp;
                stored.sequence = frame.sequence;
            }
            // A snapshot still holds the old pixels; leave them to it.
            None => dst.frame = Arc::new(frame.clone()),
        }
        dst.received = received;
        self.ring.push_back(slot);
    }

    pub fn clear(&mut self) {
        while let Some(slot) = self.ring.pop_front() {
            self.free.push(slot);
        }
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Frame> + ExactSizeIterator + '_ {
        self.ring.iter().map(move |&i| self.slots[i].frame.as_ref())
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.ring.back().map(|&i| self.slots[i].frame.as_ref())
    }

    pub fn latest_handle(&self) -> Option<SharedFrame> {
        self.ring.back().map(|&i| self.slots[i].frame.clone())
    }

    /// Sequence number of the newest frame.
    pub fn latest_sequence(&self) -> Option<u64> {
        self.latest().map(|f| f.sequence)
    }

    /// Sequence of the newest frame pushed no later than `at`.
    pub fn last_received_by(&self, at: Instant) -> Option<u64> {
        self.ring
            .iter()
            .rev()
            .map(|&i| &self.slots[i])
            .find(|s| s.received <= at)
            .map(|s| s.frame.sequence)
    }

    /// Handles of all frames with `sequence <= upto`, oldest first.
    pub fn snapshot_until(&self, upto: u64) -> Vec<SharedFrame> {
        self.handles(|seq| seq <= upto)
    }

    /// Handles of all frames with `sequence > after`, oldest first.
    pub fn frames_after(&self, after: u64) -> Vec<SharedFrame> {
        self.handles(|seq| seq > after)
    }

    pub fn snapshot(&self) -> Vec<SharedFrame> {
        self.handles(|_| true)
    }

    fn handles(&self, keep: impl Fn(u64) -> bool) -> Vec<SharedFrame> {
        self.ring
            .iter()
            .map(|&i| &self.slots[i].frame)
            .filter(|f| keep(f.sequence))
            .cloned()
            .collect()
    }
}
