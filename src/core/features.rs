//! Per-frame kinematic feature extraction.
//!
//! Angles are measured in the image plane (x/y); depth from a monocular pose
//! estimator is too noisy to help and is ignored.

use crate::config::LeadSide;
use crate::pose::types::{JointMap, JointPosition, PoseFrame, SideJoints};
use serde::{Deserialize, Serialize};

/// Added to the vector-norm product so degenerate joints never divide by zero.
const NORM_EPSILON: f64 = 1e-6;

/// Torso lengths shorter than this make the relative wrist height meaningless.
const MIN_TORSO_LENGTH: f64 = 0.01;

/// Features derived from one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    /// Elbow angle in degrees; `None` when shoulder, elbow or wrist is missing
    pub elbow_angle: Option<f64>,
    /// Vertical wrist position (smaller = higher on screen)
    pub wrist_y: Option<f64>,
    /// Wrist is higher on screen than the shoulder
    pub wrist_above_shoulder: bool,
    /// All three arm joints present with confidence above threshold
    pub confident: bool,
}

/// Angle at `vertex` between the rays to `a` and `c`, in degrees.
///
/// The cosine is clamped to [-1, 1] to absorb floating-point drift.
pub fn joint_angle(a: JointPosition, vertex: JointPosition, c: JointPosition) -> f64 {
    let v1 = (a.x - vertex.x, a.y - vertex.y);
    let v2 = (c.x - vertex.x, c.y - vertex.y);

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let norm1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let norm2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    let cos_angle = (dot / (norm1 * norm2 + NORM_EPSILON)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Extracts the release-rule features for the configured shooting arm.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    joints: SideJoints,
    confidence_threshold: f64,
}

impl FeatureExtractor {
    pub fn new(side: LeadSide, confidence_threshold: f64) -> Self {
        Self {
            joints: SideJoints::for_side(side),
            confidence_threshold,
        }
    }

    pub fn joints(&self) -> SideJoints {
        self.joints
    }

    /// Compute the features of one frame.
    pub fn extract(&self, frame: &PoseFrame) -> FrameFeatures {
        let shoulder = frame.position(self.joints.shoulder);
        let elbow = frame.position(self.joints.elbow);
        let wrist = frame.position(self.joints.wrist);

        let (shoulder, elbow, wrist) = match (shoulder, elbow, wrist) {
            (Some(s), Some(e), Some(w)) => (s, e, w),
            // Missing joints leave the angle undefined rather than zero.
            _ => return FrameFeatures::default(),
        };

        let confident = self
            .joints
            .arm()
            .iter()
            .all(|&joint| frame.confidence(joint) > self.confidence_threshold);

        FrameFeatures {
            elbow_angle: Some(joint_angle(shoulder, elbow, wrist)),
            wrist_y: Some(wrist.y),
            wrist_above_shoulder: wrist.y < shoulder.y,
            confident,
        }
    }

    /// Knee angle (hip-knee-ankle) on the lead side.
    pub fn knee_angle(&self, landmarks: &JointMap) -> Option<f64> {
        let hip = landmarks.get(&self.joints.hip)?;
        let knee = landmarks.get(&self.joints.knee)?;
        let ankle = landmarks.get(&self.joints.ankle)?;
        Some(joint_angle(*hip, *knee, *ankle))
    }

    /// Wrist height above the hip, in torso lengths (shoulder height = 1.0).
    pub fn wrist_height(&self, landmarks: &JointMap) -> Option<f64> {
        let wrist = landmarks.get(&self.joints.wrist)?;
        let hip = landmarks.get(&self.joints.hip)?;
        let shoulder = landmarks.get(&self.joints.shoulder)?;

        let torso = (shoulder.y - hip.y).abs();
        if torso < MIN_TORSO_LENGTH {
            return None;
        }
        Some((hip.y - wrist.y) / torso)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::{Joint, JointMap};

    fn frame_with(points: &[(Joint, (f64, f64), f64)]) -> PoseFrame {
        let mut frame = PoseFrame::default();
        for &(joint, (x, y), conf) in points {
            frame.landmarks.insert(joint, JointPosition::planar(x, y));
            frame.visibility.insert(joint, conf);
        }
        frame
    }

    #[test]
    fn test_straight_arm() {
        let angle = joint_angle(
            JointPosition::planar(0.0, 0.0),
            JointPosition::planar(0.5, 0.0),
            JointPosition::planar(1.0, 0.0),
        );
        // The epsilon guard pulls a fully straight arm slightly under 180.
        assert!(angle < 180.0);
        assert!((angle - 180.0).abs() < 0.5);
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(
            JointPosition::planar(0.0, 0.0),
            JointPosition::planar(0.5, 0.0),
            JointPosition::planar(0.5, 0.5),
        );
        assert!((angle - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_degenerate_joint_is_finite() {
        let p = JointPosition::planar(0.3, 0.3);
        let angle = joint_angle(p, p, p);
        assert!(angle.is_finite());
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_depth_is_ignored() {
        let flat = joint_angle(
            JointPosition::new(0.0, 0.0, 0.0),
            JointPosition::new(0.5, 0.0, 0.0),
            JointPosition::new(0.5, 0.5, 0.0),
        );
        let deep = joint_angle(
            JointPosition::new(0.0, 0.0, 0.9),
            JointPosition::new(0.5, 0.0, -0.4),
            JointPosition::new(0.5, 0.5, 0.3),
        );
        assert_eq!(flat, deep);
    }

    #[test]
    fn test_extract_raised_arm() {
        let extractor = FeatureExtractor::new(LeadSide::Right, 0.5);
        let frame = frame_with(&[
            (Joint::RightShoulder, (0.5, 0.4), 0.9),
            (Joint::RightElbow, (0.5, 0.3), 0.9),
            (Joint::RightWrist, (0.5, 0.2), 0.9),
        ]);
        let features = extractor.extract(&frame);
        assert!((features.elbow_angle.unwrap() - 180.0).abs() < 1.0);
        assert_eq!(features.wrist_y, Some(0.2));
        assert!(features.wrist_above_shoulder);
        assert!(features.confident);
    }

    #[test]
    fn test_missing_joint_leaves_angle_undefined() {
        let extractor = FeatureExtractor::new(LeadSide::Right, 0.5);
        let frame = frame_with(&[
            (Joint::RightShoulder, (0.5, 0.4), 0.9),
            (Joint::RightElbow, (0.5, 0.3), 0.9),
            // Wrong side: the left wrist does not count.
            (Joint::LeftWrist, (0.5, 0.2), 0.9),
        ]);
        let features = extractor.extract(&frame);
        assert_eq!(features.elbow_angle, None);
        assert_eq!(features.wrist_y, None);
        assert!(!features.wrist_above_shoulder);
        assert!(!features.confident);
    }

    #[test]
    fn test_confidence_must_exceed_threshold() {
        let extractor = FeatureExtractor::new(LeadSide::Left, 0.5);
        let frame = frame_with(&[
            (Joint::LeftShoulder, (0.5, 0.4), 0.9),
            (Joint::LeftElbow, (0.6, 0.4), 0.5),
            (Joint::LeftWrist, (0.6, 0.5), 0.9),
        ]);
        let features = extractor.extract(&frame);
        assert!(features.elbow_angle.is_some());
        assert!(!features.wrist_above_shoulder);
        assert!(!features.confident);
    }

    #[test]
    fn test_knee_angle_and_wrist_height() {
        let extractor = FeatureExtractor::new(LeadSide::Right, 0.5);
        let frame = frame_with(&[
            (Joint::RightShoulder, (0.5, 0.4), 0.9),
            (Joint::RightWrist, (0.5, 0.1), 0.9),
            (Joint::RightHip, (0.5, 0.7), 0.9),
            (Joint::RightKnee, (0.5, 0.85), 0.9),
            (Joint::RightAnkle, (0.65, 0.85), 0.9),
        ]);
        let knee = extractor.knee_angle(&frame.landmarks).unwrap();
        assert!((knee - 90.0).abs() < 0.01);

        // Wrist 0.6 above the hip with a 0.3 torso: two torso lengths.
        let height = extractor.wrist_height(&frame.landmarks).unwrap();
        assert!((height - 2.0).abs() < 1e-9);

        let empty = JointMap::new();
        assert_eq!(extractor.knee_angle(&empty), None);
        assert_eq!(extractor.wrist_height(&empty), None);
    }

    #[test]
    fn test_collapsed_torso_has_no_wrist_height() {
        let extractor = FeatureExtractor::new(LeadSide::Right, 0.5);
        let frame = frame_with(&[
            (Joint::RightShoulder, (0.5, 0.5), 0.9),
            (Joint::RightWrist, (0.5, 0.1), 0.9),
            (Joint::RightHip, (0.5, 0.505), 0.9),
        ]);
        assert_eq!(extractor.wrist_height(&frame.landmarks), None);
    }
}
