//! Synthetic pose clips for integration tests.
//!
//! The right arm is drawn with the shoulder and elbow fixed and the forearm
//! rotated so the elbow angle equals the requested value. A "raised" frame
//! puts the wrist above the shoulder line, everything else keeps it below.

#![allow(dead_code)]

use formcheck_segmenter::pose::{Joint, JointPosition, PoseFrame};

pub const FRAME_MS: f64 = 1000.0 / 30.0;

const SHOULDER: (f64, f64) = (0.5, 0.4);
const ELBOW: (f64, f64) = (0.65, 0.4);
const FOREARM: f64 = 0.15;

/// One right-arm frame with the given elbow angle.
pub fn arm_frame(angle: f64, raised: bool) -> PoseFrame {
    let theta = angle.to_radians();
    let dy = if raised { -theta.sin() } else { theta.sin() };
    let wrist = (ELBOW.0 - FOREARM * theta.cos(), ELBOW.1 + FOREARM * dy);

    let mut frame = PoseFrame::default();
    for (joint, (x, y)) in [
        (Joint::RightShoulder, SHOULDER),
        (Joint::RightElbow, ELBOW),
        (Joint::RightWrist, wrist),
        (Joint::RightHip, (0.5, 0.7)),
        (Joint::RightKnee, (0.45, 0.85)),
        (Joint::RightAnkle, (0.5, 1.0)),
    ] {
        frame.landmarks.insert(joint, JointPosition::planar(x, y));
        frame.visibility.insert(joint, 0.95);
    }
    frame
}

/// Builds a clip segment by segment, tracking the current elbow angle.
pub struct Clip {
    frames: Vec<PoseFrame>,
    angle: f64,
}

impl Clip {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            angle: 170.0,
        }
    }

    /// `count` frames at a fixed angle, wrist low.
    pub fn hold(self, count: usize, angle: f64) -> Self {
        self.repeat(count, angle, false)
    }

    /// `count` frames at a fixed angle, wrist high.
    pub fn raised(self, count: usize, angle: f64) -> Self {
        self.repeat(count, angle, true)
    }

    /// Linear move to `target` over `count` frames, wrist low.
    pub fn ramp(self, count: usize, target: f64) -> Self {
        self.sweep(count, target, false)
    }

    /// Linear move to `target` over `count` frames; only the last frame has
    /// the wrist above the shoulder.
    pub fn release(self, count: usize, target: f64) -> Self {
        self.sweep(count, target, true)
    }

    /// Drop the arm confidence of the most recent frame.
    pub fn blink(mut self) -> Self {
        if let Some(frame) = self.frames.last_mut() {
            frame.visibility.insert(Joint::RightElbow, 0.1);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn into_frames(self) -> Vec<PoseFrame> {
        self.frames
    }

    fn repeat(mut self, count: usize, angle: f64, raised: bool) -> Self {
        for _ in 0..count {
            self.push(angle, raised);
        }
        self.angle = angle;
        self
    }

    fn sweep(mut self, count: usize, target: f64, raise_last: bool) -> Self {
        let start = self.angle;
        for k in 1..=count {
            let angle = start + (target - start) * k as f64 / count as f64;
            self.push(angle, raise_last && k == count);
        }
        self.angle = target;
        self
    }

    fn push(&mut self, angle: f64, raised: bool) {
        let mut frame = arm_frame(angle, raised);
        frame.timestamp_ms = self.frames.len() as f64 * FRAME_MS;
        self.frames.push(frame);
    }
}

/// Stance, a 20-frame dip to `load` and a 15-frame rise to release.
///
/// With 60 stance frames the load lands on frame 79 and the release on 94.
pub fn single_shot(stance: usize, load: f64) -> Clip {
    Clip::new()
        .hold(stance, 170.0)
        .ramp(20, load)
        .release(15, 170.0)
}

/// Minimal deterministic generator so sweeps are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform integer in `[low, high]`.
    pub fn range(&mut self, low: usize, high: usize) -> usize {
        low + self.next_u32() as usize % (high - low + 1)
    }

    /// Uniform float in `[low, high)`.
    pub fn float(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * (self.next_u32() as f64 / (u32::MAX as f64 + 1.0))
    }
}
