//! Motion events emitted by the shot detector.

use crate::pose::types::{FrameImage, JointMap};
use serde::{Deserialize, Serialize};

/// The eight canonical instants of a shot, in temporal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFrameLabel {
    Stance,
    Load,
    Mid1,
    Mid2,
    Mid3,
    Mid4,
    Release,
    FollowThrough,
}

impl KeyFrameLabel {
    pub const ALL: [KeyFrameLabel; 8] = [
        KeyFrameLabel::Stance,
        KeyFrameLabel::Load,
        KeyFrameLabel::Mid1,
        KeyFrameLabel::Mid2,
        KeyFrameLabel::Mid3,
        KeyFrameLabel::Mid4,
        KeyFrameLabel::Release,
        KeyFrameLabel::FollowThrough,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFrameLabel::Stance => "stance",
            KeyFrameLabel::Load => "load",
            KeyFrameLabel::Mid1 => "mid1",
            KeyFrameLabel::Mid2 => "mid2",
            KeyFrameLabel::Mid3 => "mid3",
            KeyFrameLabel::Mid4 => "mid4",
            KeyFrameLabel::Release => "release",
            KeyFrameLabel::FollowThrough => "follow_through",
        }
    }
}

impl std::fmt::Display for KeyFrameLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffer indices of the eight key frames at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFrameIndices {
    pub stance: usize,
    pub load: usize,
    pub mid: [usize; 4],
    pub release: usize,
    pub follow_through: usize,
}

impl KeyFrameIndices {
    /// Indices in [`KeyFrameLabel::ALL`] order.
    pub fn as_array(&self) -> [usize; 8] {
        [
            self.stance,
            self.load,
            self.mid[0],
            self.mid[1],
            self.mid[2],
            self.mid[3],
            self.release,
            self.follow_through,
        ]
    }

    /// Stance through follow-through never go backwards.
    pub fn is_ordered(&self) -> bool {
        self.as_array().windows(2).all(|pair| pair[0] <= pair[1])
    }

    pub fn duration(&self) -> usize {
        self.release - self.load
    }
}

/// Derived features of one buffered frame, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub sequence: u64,
    pub timestamp_ms: f64,
    pub elbow_angle: Option<f64>,
    pub wrist_y: Option<f64>,
    pub wrist_above_shoulder: bool,
    pub confident: bool,
}

/// A frame copied out of the buffer at emission time.
#[derive(Debug, Clone)]
pub struct KeyFrame {
    pub label: KeyFrameLabel,
    /// Buffer index when the event was emitted
    pub buffer_index: usize,
    pub sequence: u64,
    pub timestamp_ms: f64,
    pub elbow_angle: Option<f64>,
    pub landmarks: JointMap,
    pub image: Option<FrameImage>,
}

/// One detected shot.
///
/// Owns copies of everything it refers to, so it stays valid after the
/// buffer moves on.
#[derive(Debug, Clone)]
pub struct MotionEvent {
    /// 1-based ordinal among accepted shots
    pub shot_number: u64,
    pub indices: KeyFrameIndices,
    /// Key frames in [`KeyFrameLabel::ALL`] order
    pub key_frames: Vec<KeyFrame>,
    /// Minimum elbow angle, at the load frame
    pub load_angle: f64,
    /// Elbow angle at the release frame
    pub release_angle: f64,
    pub duration_frames: usize,
    /// Knee angle at the load frame
    pub knee_angle_load: Option<f64>,
    /// Wrist height above the hip at release, in torso lengths
    pub wrist_height_release: Option<f64>,
    pub release_sequence: u64,
    pub release_timestamp_ms: f64,
    /// Feature history around the key-frame span
    pub history: Vec<FeatureRecord>,
}

impl MotionEvent {
    pub fn key_frame(&self, label: KeyFrameLabel) -> Option<&KeyFrame> {
        self.key_frames.iter().find(|frame| frame.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_ordering() {
        let indices = KeyFrameIndices {
            stance: 74,
            load: 79,
            mid: [82, 85, 88, 91],
            release: 94,
            follow_through: 94,
        };
        assert!(indices.is_ordered());
        assert_eq!(indices.duration(), 15);
        assert_eq!(indices.as_array()[7], 94);

        let broken = KeyFrameIndices {
            mid: [82, 90, 88, 91],
            ..indices
        };
        assert!(!broken.is_ordered());
    }

    #[test]
    fn test_label_names() {
        assert_eq!(KeyFrameLabel::FollowThrough.to_string(), "follow_through");
        assert_eq!(
            serde_json::to_string(&KeyFrameLabel::Mid3).unwrap(),
            "\"mid3\""
        );
        assert_eq!(KeyFrameLabel::ALL.len(), 8);
    }
}
