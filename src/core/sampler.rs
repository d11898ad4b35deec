//! Key-frame sampling and event packaging.

use crate::config::EngineConfig;
use crate::core::buffer::RingBuffer;
use crate::core::event::{KeyFrame, KeyFrameIndices, KeyFrameLabel, MotionEvent};
use crate::core::features::FeatureExtractor;
use crate::core::locator::LoadPoint;

/// Derives the eight key-frame indices from a load/release pair and copies
/// the frames out of the buffer.
#[derive(Debug, Clone)]
pub struct KeyFrameSampler {
    stance_offset: usize,
    follow_through_offset: usize,
    mid_fractions: [f64; 4],
    history_margin: usize,
}

impl KeyFrameSampler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            stance_offset: config.stance_offset,
            follow_through_offset: config.follow_through_offset,
            mid_fractions: config.mid_fractions,
            history_margin: config.history_margin,
        }
    }

    /// Key-frame indices for a buffer of length `len`.
    ///
    /// Every index is clamped into `[0, len - 1]`. Callers guarantee
    /// `load <= release < len`.
    pub fn indices(&self, load: usize, release: usize, len: usize) -> KeyFrameIndices {
        let last = len.saturating_sub(1);
        let clamp = |index: usize| index.min(last);

        let duration = release.saturating_sub(load);
        let mid = self
            .mid_fractions
            .map(|fraction| clamp(load + (fraction * duration as f64).floor() as usize));

        KeyFrameIndices {
            stance: clamp(load.saturating_sub(self.stance_offset)),
            load: clamp(load),
            mid,
            release: clamp(release),
            follow_through: clamp(release.saturating_add(self.follow_through_offset)),
        }
    }

    /// Package an accepted shot.
    ///
    /// Returns `None` only if the release frame is not in the buffer or has
    /// no elbow angle, which the detector never lets happen.
    pub fn sample(
        &self,
        buffer: &RingBuffer,
        load: LoadPoint,
        release: usize,
        shot_number: u64,
        extractor: &FeatureExtractor,
    ) -> Option<MotionEvent> {
        let indices = self.indices(load.index, release, buffer.len());

        let mut key_frames = Vec::with_capacity(KeyFrameLabel::ALL.len());
        for (label, index) in KeyFrameLabel::ALL.into_iter().zip(indices.as_array()) {
            let sample = buffer.get(index)?;
            key_frames.push(KeyFrame {
                label,
                buffer_index: index,
                sequence: sample.sequence,
                timestamp_ms: sample.timestamp_ms,
                elbow_angle: sample.features.elbow_angle,
                landmarks: sample.landmarks.clone(),
                image: sample.image.clone(),
            });
        }

        let release_sample = buffer.get(indices.release)?;
        let release_angle = release_sample.features.elbow_angle?;
        let load_sample = buffer.get(indices.load)?;

        let history_start = indices.stance.saturating_sub(self.history_margin);
        let history_end = indices
            .follow_through
            .saturating_add(self.history_margin)
            .min(buffer.len().saturating_sub(1));
        let history = (history_start..=history_end)
            .filter_map(|index| buffer.get(index))
            .map(|sample| sample.record())
            .collect();

        Some(MotionEvent {
            shot_number,
            indices,
            key_frames,
            load_angle: load.angle,
            release_angle,
            duration_frames: indices.duration(),
            knee_angle_load: extractor.knee_angle(&load_sample.landmarks),
            wrist_height_release: extractor.wrist_height(&release_sample.landmarks),
            release_sequence: release_sample.sequence,
            release_timestamp_ms: release_sample.timestamp_ms,
            history,
        })
    }
}
