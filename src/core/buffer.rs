//! Bounded frame history with cooldown-anchor bookkeeping.
//!
//! Buffer indices shift down by one for every evicted frame. The only index
//! held outside the buffer is the cooldown anchor, so the buffer owns it and
//! re-bases it in the same call that evicts.

use crate::core::event::FeatureRecord;
use crate::core::features::FrameFeatures;
use crate::pose::types::{ConfidenceMap, FrameImage, JointMap};
use std::collections::VecDeque;

/// One ingested frame together with its derived features.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Monotonic ingestion counter, never reused
    pub sequence: u64,
    pub timestamp_ms: f64,
    pub image: Option<FrameImage>,
    pub landmarks: JointMap,
    pub visibility: ConfidenceMap,
    pub features: FrameFeatures,
}

impl FrameSample {
    /// Feature snapshot used in diagnostic history.
    pub fn record(&self) -> FeatureRecord {
        FeatureRecord {
            sequence: self.sequence,
            timestamp_ms: self.timestamp_ms,
            elbow_angle: self.features.elbow_angle,
            wrist_y: self.features.wrist_y,
            wrist_above_shoulder: self.features.wrist_above_shoulder,
            confident: self.features.confident,
        }
    }
}

/// FIFO frame buffer of bounded length.
#[derive(Debug)]
pub struct RingBuffer {
    samples: VecDeque<FrameSample>,
    capacity: usize,
    /// Buffer index of the last accepted release
    anchor: Option<usize>,
    evicted_total: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
            anchor: None,
            evicted_total: 0,
        }
    }

    /// Append a sample, evicting from the head until the length fits the
    /// capacity again, and shift the anchor by the number evicted.
    ///
    /// Returns the number of evicted samples.
    pub fn push(&mut self, sample: FrameSample) -> usize {
        self.samples.push_back(sample);

        let mut evicted = 0;
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            self.evicted_total += evicted as u64;
            // An anchor that falls off the head is infinitely long ago.
            self.anchor = self.anchor.and_then(|index| index.checked_sub(evicted));
        }

        evicted
    }

    /// Index of the newest sample, if any.
    pub fn tail_index(&self) -> Option<usize> {
        self.samples.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&FrameSample> {
        self.samples.get(index)
    }

    pub fn latest(&self) -> Option<&FrameSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSample> {
        self.samples.iter()
    }

    /// Remember `index` as the last accepted release.
    ///
    /// Out-of-range indices clear the anchor.
    pub fn mark_anchor(&mut self, index: usize) {
        self.anchor = (index < self.samples.len()).then_some(index);
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Frames between the anchor and the tail, or `None` if there is no anchor.
    pub fn frames_since_anchor(&self) -> Option<usize> {
        let tail = self.tail_index()?;
        self.anchor.map(|anchor| tail - anchor)
    }

    /// Total frames evicted since creation or the last [`clear`](Self::clear).
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.anchor = None;
        self.evicted_total = 0;
    }
}
