//! Pose input types for the segmentation engine.
//!
//! Positions are normalized image coordinates: x grows to the right, y grows
//! downward (smaller y = higher on screen), z is the estimator's relative depth.

use crate::config::LeadSide;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named body landmarks supplied by the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// The joints of one side of the body that the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideJoints {
    pub shoulder: Joint,
    pub elbow: Joint,
    pub wrist: Joint,
    pub hip: Joint,
    pub knee: Joint,
    pub ankle: Joint,
}

impl SideJoints {
    pub fn for_side(side: LeadSide) -> Self {
        match side {
            LeadSide::Left => Self {
                shoulder: Joint::LeftShoulder,
                elbow: Joint::LeftElbow,
                wrist: Joint::LeftWrist,
                hip: Joint::LeftHip,
                knee: Joint::LeftKnee,
                ankle: Joint::LeftAnkle,
            },
            LeadSide::Right => Self {
                shoulder: Joint::RightShoulder,
                elbow: Joint::RightElbow,
                wrist: Joint::RightWrist,
                hip: Joint::RightHip,
                knee: Joint::RightKnee,
                ankle: Joint::RightAnkle,
            },
        }
    }

    /// Shoulder, elbow and wrist: the joints the release rule depends on.
    pub fn arm(&self) -> [Joint; 3] {
        [self.shoulder, self.elbow, self.wrist]
    }
}

/// A normalized 3D landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct JointPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl JointPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position in the image plane, depth ignored.
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

impl From<[f64; 3]> for JointPosition {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<JointPosition> for [f64; 3] {
    fn from(p: JointPosition) -> Self {
        [p.x, p.y, p.z]
    }
}

pub type JointMap = HashMap<Joint, JointPosition>;
pub type ConfidenceMap = HashMap<Joint, f64>;

/// Raw frame pixels, owned by whoever holds the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    /// Packed pixel data, row-major
    pub data: Vec<u8>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Output of the upstream pose estimator for one image.
#[derive(Debug, Clone, Default)]
pub struct PoseDetection {
    pub landmarks: JointMap,
    pub visibility: ConfidenceMap,
}

/// Upstream pose estimation collaborator.
///
/// An estimator that finds nobody in the image returns empty maps rather than
/// an error; errors are reserved for estimator failures.
pub trait PoseEstimator {
    type Error: std::error::Error;

    fn detect(&mut self, image: &FrameImage) -> Result<PoseDetection, Self::Error>;
}

/// One frame of engine input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Media or wall-clock timestamp in milliseconds
    #[serde(default)]
    pub timestamp_ms: f64,
    /// Landmark positions keyed by joint; absent joints were not detected
    #[serde(default)]
    pub landmarks: JointMap,
    /// Landmark confidence scores in [0, 1]
    #[serde(default)]
    pub visibility: ConfidenceMap,
    /// Source image, if the caller wants it carried into key frames
    #[serde(skip)]
    pub image: Option<FrameImage>,
}

impl PoseFrame {
    pub fn new(timestamp_ms: f64, landmarks: JointMap, visibility: ConfidenceMap) -> Self {
        Self {
            timestamp_ms,
            landmarks,
            visibility,
            image: None,
        }
    }

    /// Run an estimator over an image and wrap the result as engine input.
    pub fn from_detection<E: PoseEstimator>(
        estimator: &mut E,
        image: FrameImage,
        timestamp_ms: f64,
    ) -> Result<Self, E::Error> {
        let detection = estimator.detect(&image)?;
        Ok(Self {
            timestamp_ms,
            landmarks: detection.landmarks,
            visibility: detection.visibility,
            image: Some(image),
        })
    }

    pub fn with_image(mut self, image: FrameImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn position(&self, joint: Joint) -> Option<JointPosition> {
        self.landmarks.get(&joint).copied()
    }

    /// Confidence for a joint; a missing score counts as zero.
    pub fn confidence(&self, joint: Joint) -> f64 {
        self.visibility.get(&joint).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EstimatorDown;

    impl std::fmt::Display for EstimatorDown {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "estimator unavailable")
        }
    }

    impl std::error::Error for EstimatorDown {}

    struct FixedEstimator {
        calls: usize,
        fail: bool,
    }

    impl PoseEstimator for FixedEstimator {
        type Error = EstimatorDown;

        fn detect(&mut self, _image: &FrameImage) -> Result<PoseDetection, Self::Error> {
            self.calls += 1;
            if self.fail {
                return Err(EstimatorDown);
            }
            let mut detection = PoseDetection::default();
            detection
                .landmarks
                .insert(Joint::RightWrist, JointPosition::new(0.4, 0.2, -0.1));
            detection.visibility.insert(Joint::RightWrist, 0.9);
            Ok(detection)
        }
    }

    #[test]
    fn test_pose_frame_json_shape() {
        let json = r#"{
            "timestamp_ms": 33.3,
            "landmarks": {"right_wrist": [0.5, 0.25, -0.1]},
            "visibility": {"right_wrist": 0.8}
        }"#;
        let frame: PoseFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame.position(Joint::RightWrist),
            Some(JointPosition::new(0.5, 0.25, -0.1))
        );
        assert_eq!(frame.confidence(Joint::RightWrist), 0.8);
        assert_eq!(frame.confidence(Joint::RightElbow), 0.0);
        assert!(frame.image.is_none());
    }

    #[test]
    fn test_side_joints() {
        let left = SideJoints::for_side(LeadSide::Left);
        assert_eq!(
            left.arm(),
            [Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist]
        );
        let right = SideJoints::for_side(LeadSide::Right);
        assert_eq!(right.knee, Joint::RightKnee);
    }

    #[test]
    fn test_frame_from_estimator() {
        let mut estimator = FixedEstimator {
            calls: 0,
            fail: false,
        };
        let image = FrameImage::new(2, 1, vec![0, 0, 0, 255, 255, 255]);
        let frame = PoseFrame::from_detection(&mut estimator, image.clone(), 66.6).unwrap();
        assert_eq!(estimator.calls, 1);
        assert_eq!(frame.image, Some(image.clone()));
        assert_eq!(frame.confidence(Joint::RightWrist), 0.9);

        estimator.fail = true;
        assert!(PoseFrame::from_detection(&mut estimator, image, 99.9).is_err());
    }
}
