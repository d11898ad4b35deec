//! Pose input for the FormCheck segmenter.
//!
//! Pose estimation itself happens upstream; this module defines the frame
//! format the engine consumes and a replay source for recorded or piped
//! pose streams.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{ReplayInput, ReplaySource, SourceError};
pub use types::{
    ConfidenceMap, FrameImage, Joint, JointMap, JointPosition, PoseDetection, PoseEstimator,
    PoseFrame, SideJoints,
};
