//! Core functionality for the FormCheck segmenter.
//!
//! This module contains:
//! - The shot detection engine and its building blocks
//! - Motion events and key-frame sampling
//! - Form assessment, shot reports and session statistics

pub mod buffer;
pub mod detector;
pub mod event;
pub mod features;
pub mod form;
pub mod locator;
pub mod report;
pub mod sampler;
pub mod stability;
pub mod summary;

// Re-export commonly used types
pub use buffer::{FrameSample, RingBuffer};
pub use detector::{DetectorCounters, ShotDetector};
pub use event::{FeatureRecord, KeyFrame, KeyFrameIndices, KeyFrameLabel, MotionEvent};
pub use features::{joint_angle, FeatureExtractor, FrameFeatures};
pub use form::{assess, FormAssessment, FormGrade, FormMetric, FormRange, MetricAssessment};
pub use locator::{LoadLocator, LoadPoint, LoadRejection};
pub use report::{
    KeyFrameSummary, ReportBuilder, ShotMetrics, ShotReport, PRODUCER_NAME, REPORT_SCHEMA_VERSION,
};
pub use sampler::KeyFrameSampler;
pub use stability::StabilityGate;
pub use summary::{FeedbackTally, MetricStats, OutcomeProfile, SessionSummary, SummaryMetric};
