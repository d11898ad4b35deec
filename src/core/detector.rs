//! The shot detection engine.
//!
//! [`ShotDetector::ingest`] is the only way to mutate engine state. Each call
//! runs the full per-frame pipeline:
//!
//! 1. extract features and update the stability gate
//! 2. append to the ring buffer (evicting and re-basing the cooldown anchor)
//! 3. take the tail index as the release candidate
//! 4. check stability, the release rule and the cooldown
//! 5. locate the load point and, if accepted, sample the key frames
//!
//! The engine does no I/O and never blocks.

use crate::config::{ConfigError, EngineConfig};
use crate::core::buffer::{FrameSample, RingBuffer};
use crate::core::event::MotionEvent;
use crate::core::features::{FeatureExtractor, FrameFeatures};
use crate::core::locator::{LoadLocator, LoadRejection};
use crate::core::sampler::KeyFrameSampler;
use crate::core::stability::StabilityGate;
use crate::pose::types::PoseFrame;
use serde::{Deserialize, Serialize};

/// Running totals for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorCounters {
    pub frames_ingested: u64,
    /// Release candidates that reached the load search
    pub candidates_fired: u64,
    pub candidates_rejected: u64,
    pub events_emitted: u64,
    /// Frames that met the release rule inside the cooldown
    pub cooldown_suppressed: u64,
}

/// Online single-pass shot segmenter for one subject.
#[derive(Debug)]
pub struct ShotDetector {
    config: EngineConfig,
    extractor: FeatureExtractor,
    gate: StabilityGate,
    buffer: RingBuffer,
    locator: LoadLocator,
    sampler: KeyFrameSampler,
    next_sequence: u64,
    counters: DetectorCounters,
    last_rejection: Option<LoadRejection>,
}

impl ShotDetector {
    /// Create a detector, rejecting configurations it cannot honor.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            extractor: FeatureExtractor::new(config.lead_side, config.confidence_threshold),
            gate: StabilityGate::new(config.stability_frames),
            buffer: RingBuffer::new(config.buffer_capacity),
            locator: LoadLocator::new(config.load_search_window, config.min_duration_frames),
            sampler: KeyFrameSampler::new(&config),
            next_sequence: 0,
            counters: DetectorCounters::default(),
            last_rejection: None,
            config,
        })
    }

    /// Process one frame. Returns a shot when this frame completes one.
    pub fn ingest(&mut self, frame: PoseFrame) -> Option<MotionEvent> {
        let features = self.extractor.extract(&frame);
        self.gate.observe(features.confident);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.counters.frames_ingested += 1;

        self.buffer.push(FrameSample {
            sequence,
            timestamp_ms: frame.timestamp_ms,
            image: frame.image,
            landmarks: frame.landmarks,
            visibility: frame.visibility,
            features,
        });
        let release = self.buffer.tail_index()?;

        if !self.gate.is_satisfied() || !self.is_release(&features) {
            return None;
        }

        if let Some(elapsed) = self.buffer.frames_since_anchor() {
            if elapsed < self.config.cooldown_frames {
                self.counters.cooldown_suppressed += 1;
                tracing::debug!(
                    "Release at frame {} suppressed: {} frames since last shot (cooldown {})",
                    sequence,
                    elapsed,
                    self.config.cooldown_frames
                );
                return None;
            }
        }

        self.counters.candidates_fired += 1;
        let load = match self.locator.locate(&self.buffer, release) {
            Ok(load) => load,
            Err(rejection) => {
                // A rejected candidate leaves the cooldown untouched.
                self.counters.candidates_rejected += 1;
                self.last_rejection = Some(rejection);
                tracing::debug!("Release at frame {} rejected: {}", sequence, rejection);
                return None;
            }
        };

        let shot_number = self.counters.events_emitted + 1;
        let event = self
            .sampler
            .sample(&self.buffer, load, release, shot_number, &self.extractor)?;

        self.buffer.mark_anchor(release);
        self.counters.events_emitted = shot_number;
        self.last_rejection = None;

        tracing::info!(
            "Shot {} detected at frame {}: load {:.1}° -> release {:.1}° over {} frames",
            shot_number,
            sequence,
            event.load_angle,
            event.release_angle,
            event.duration_frames
        );

        Some(event)
    }

    fn is_release(&self, features: &FrameFeatures) -> bool {
        features.wrist_above_shoulder
            && features
                .elbow_angle
                .map_or(false, |angle| angle > self.config.release_angle)
    }

    /// Forget all buffered frames and counters. Configuration is kept.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.buffer.clear();
        self.next_sequence = 0;
        self.counters = DetectorCounters::default();
        self.last_rejection = None;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> DetectorCounters {
        self.counters
    }

    /// Current run of consecutive confident frames.
    pub fn stability_run(&self) -> u32 {
        self.gate.run_length()
    }

    pub fn is_stable(&self) -> bool {
        self.gate.is_satisfied()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer index of the last accepted release, if still buffered.
    pub fn cooldown_anchor(&self) -> Option<usize> {
        self.buffer.anchor()
    }

    pub fn frames_since_last_shot(&self) -> Option<usize> {
        self.buffer.frames_since_anchor()
    }

    /// Elbow angle of the newest frame.
    pub fn current_angle(&self) -> Option<f64> {
        self.buffer.latest().and_then(|s| s.features.elbow_angle)
    }

    pub fn latest_features(&self) -> Option<FrameFeatures> {
        self.buffer.latest().map(|s| s.features)
    }

    /// Why the most recent candidate was declined, cleared by the next shot.
    pub fn last_rejection(&self) -> Option<LoadRejection> {
        self.last_rejection
    }

    /// Total frames evicted from the buffer.
    pub fn frames_evicted(&self) -> u64 {
        self.buffer.evicted_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeadSide;
    use crate::pose::types::{Joint, JointPosition};

    /// Right arm with the given elbow angle; the wrist sits above or below
    /// the shoulder depending on `raised`.
    fn arm_frame(angle: f64, raised: bool) -> PoseFrame {
        let shoulder = JointPosition::planar(0.5, 0.4);
        let elbow = JointPosition::planar(0.65, 0.4);
        let theta = angle.to_radians();
        let dy = if raised { -theta.sin() } else { theta.sin() };
        let wrist = JointPosition::planar(elbow.x - 0.15 * theta.cos(), elbow.y + 0.15 * dy);

        let mut frame = PoseFrame::default();
        for (joint, pos) in [
            (Joint::RightShoulder, shoulder),
            (Joint::RightElbow, elbow),
            (Joint::RightWrist, wrist),
        ] {
            frame.landmarks.insert(joint, pos);
            frame.visibility.insert(joint, 0.95);
        }
        frame
    }

    fn detector() -> ShotDetector {
        ShotDetector::new(EngineConfig::for_side(LeadSide::Right)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EngineConfig {
            buffer_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(ShotDetector::new(config).is_err());
    }

    #[test]
    fn test_no_release_before_stability() {
        let mut detector = detector();
        for _ in 0..7 {
            assert!(detector.ingest(arm_frame(170.0, true)).is_none());
        }
        assert_eq!(detector.stability_run(), 7);
        assert!(!detector.is_stable());
        assert_eq!(detector.counters().candidates_fired, 0);

        // Eighth confident frame opens the gate; no load yet, so rejected.
        assert!(detector.ingest(arm_frame(170.0, true)).is_none());
        assert_eq!(detector.counters().candidates_fired, 1);
        assert!(matches!(
            detector.last_rejection(),
            Some(LoadRejection::TooShort { .. })
        ));
    }

    #[test]
    fn test_low_confidence_resets_stability() {
        let mut detector = detector();
        for _ in 0..10 {
            detector.ingest(arm_frame(120.0, false));
        }
        let mut blurry = arm_frame(120.0, false);
        blurry.visibility.insert(Joint::RightWrist, 0.3);
        detector.ingest(blurry);
        assert_eq!(detector.stability_run(), 0);
        assert_eq!(detector.buffer_len(), 11);
    }

    #[test]
    fn test_simple_shot() {
        let mut detector = detector();
        for _ in 0..20 {
            assert!(detector.ingest(arm_frame(150.0, false)).is_none());
        }
        for i in 0..10 {
            let angle = 140.0 - i as f64 * 5.0;
            assert!(detector.ingest(arm_frame(angle, false)).is_none());
        }
        // Load at index 29 (95 degrees), rising to release.
        let mut event = None;
        for i in 1..=12 {
            let angle = 95.0 + i as f64 * 6.0;
            let raised = angle > 155.0;
            if let Some(e) = detector.ingest(arm_frame(angle, raised)) {
                event = Some(e);
                break;
            }
        }

        let event = event.expect("shot should be detected");
        assert_eq!(event.shot_number, 1);
        assert_eq!(event.indices.load, 29);
        assert_eq!(event.indices.release, 40);
        assert!((event.load_angle - 95.0).abs() < 0.1);
        assert!(event.release_angle > 155.0);
        assert_eq!(event.duration_frames, 11);
        assert_eq!(event.key_frames.len(), 8);
        assert_eq!(detector.cooldown_anchor(), Some(40));
        assert_eq!(detector.counters().events_emitted, 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = detector();
        for _ in 0..12 {
            detector.ingest(arm_frame(170.0, true));
        }
        detector.reset();
        assert_eq!(detector.buffer_len(), 0);
        assert_eq!(detector.stability_run(), 0);
        assert_eq!(detector.counters(), DetectorCounters::default());
        assert_eq!(detector.current_angle(), None);
    }

    #[test]
    fn test_reset_forgets_evictions() {
        let config = EngineConfig {
            buffer_capacity: 10,
            cooldown_frames: 5,
            ..EngineConfig::for_side(LeadSide::Right)
        };
        let mut detector = ShotDetector::new(config).unwrap();
        for _ in 0..15 {
            detector.ingest(arm_frame(120.0, false));
        }
        assert_eq!(detector.frames_evicted(), 5);

        detector.reset();
        assert_eq!(detector.frames_evicted(), 0);
        assert_eq!(detector.cooldown_anchor(), None);
    }
}
