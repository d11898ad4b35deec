//! Serializable shot reports for downstream consumers.
//!
//! A [`ShotReport`] is the self-contained payload handed to persistence and
//! the feedback service. Frame images are never included.

use crate::config::LeadSide;
use crate::core::event::{FeatureRecord, KeyFrame, KeyFrameLabel, MotionEvent};
use crate::core::form::{assess, FormAssessment};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "formcheck-segmenter";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// A key frame without its pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrameSummary {
    pub label: KeyFrameLabel,
    pub buffer_index: usize,
    pub sequence: u64,
    pub timestamp_ms: f64,
    pub elbow_angle: Option<f64>,
}

impl From<&KeyFrame> for KeyFrameSummary {
    fn from(frame: &KeyFrame) -> Self {
        Self {
            label: frame.label,
            buffer_index: frame.buffer_index,
            sequence: frame.sequence,
            timestamp_ms: frame.timestamp_ms,
            elbow_angle: frame.elbow_angle,
        }
    }
}

/// Scalar kinematics of one shot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotMetrics {
    pub load_angle: f64,
    pub release_angle: f64,
    pub duration_frames: usize,
    pub knee_angle_load: Option<f64>,
    pub wrist_height_release: Option<f64>,
}

/// Report for one detected shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub report_id: String,
    /// Report schema version (currently "1.0")
    pub schema_version: String,
    pub producer: ReportProducer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub shot_number: u64,
    pub lead_side: LeadSide,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    pub release_timestamp_ms: f64,
    pub key_frames: Vec<KeyFrameSummary>,
    pub metrics: ShotMetrics,
    pub form: FormAssessment,
    pub history: Vec<FeatureRecord>,
}

impl ShotReport {
    pub fn key_frame(&self, label: KeyFrameLabel) -> Option<&KeyFrameSummary> {
        self.key_frames.iter().find(|frame| frame.label == label)
    }
}

/// Builder for shot reports.
///
/// One builder per run, so every report carries the same instance id.
pub struct ReportBuilder {
    instance_id: Uuid,
    session_id: Option<String>,
    lead_side: LeadSide,
}

impl ReportBuilder {
    /// Create a new report builder with a unique instance ID.
    pub fn new(lead_side: LeadSide) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: None,
            lead_side,
        }
    }

    /// Set the session ID for generated reports.
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn build(&self, event: &MotionEvent) -> ShotReport {
        ShotReport {
            report_id: Uuid::new_v4().to_string(),
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: Some(self.instance_id.to_string()),
            },
            session_id: self.session_id.clone(),
            shot_number: event.shot_number,
            lead_side: self.lead_side,
            computed_at_utc: Utc::now().to_rfc3339(),
            release_timestamp_ms: event.release_timestamp_ms,
            key_frames: event.key_frames.iter().map(KeyFrameSummary::from).collect(),
            metrics: ShotMetrics {
                load_angle: event.load_angle,
                release_angle: event.release_angle,
                duration_frames: event.duration_frames,
                knee_angle_load: event.knee_angle_load,
                wrist_height_release: event.wrist_height_release,
            },
            form: assess(event),
            history: event.history.clone(),
        }
    }

    /// Build and serialize a report to JSON.
    pub fn build_json(&self, event: &MotionEvent) -> String {
        let report = self.build(event);
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::event::KeyFrameIndices;
    use crate::pose::types::{FrameImage, JointMap};

    /// A plausible emitted shot for report-level tests.
    pub(crate) fn sample_event(shot_number: u64, load_angle: f64) -> MotionEvent {
        let indices = KeyFrameIndices {
            stance: 74,
            load: 79,
            mid: [82, 85, 88, 91],
            release: 94,
            follow_through: 94,
        };
        let key_frames = KeyFrameLabel::ALL
            .into_iter()
            .zip(indices.as_array())
            .map(|(label, index)| KeyFrame {
                label,
                buffer_index: index,
                sequence: index as u64 + 1000,
                timestamp_ms: index as f64 * 33.3,
                elbow_angle: Some(120.0),
                landmarks: JointMap::new(),
                image: Some(FrameImage::new(1, 1, vec![0, 0, 0])),
            })
            .collect();

        MotionEvent {
            shot_number,
            indices,
            key_frames,
            load_angle,
            release_angle: 168.0,
            duration_frames: 15,
            knee_angle_load: Some(150.0),
            wrist_height_release: Some(1.3),
            release_sequence: 1094,
            release_timestamp_ms: 94.0 * 33.3,
            history: Vec::new(),
        }
    }

    #[test]
    fn test_report_builder_instance_id() {
        let builder1 = ReportBuilder::new(LeadSide::Right);
        let builder2 = ReportBuilder::new(LeadSide::Right);
        assert_ne!(builder1.instance_id(), builder2.instance_id());
    }

    #[test]
    fn test_report_from_event() {
        let builder = ReportBuilder::new(LeadSide::Left).with_session_id("gym-1".to_string());
        let report = builder.build(&sample_event(3, 92.0));

        assert_eq!(report.schema_version, REPORT_SCHEMA_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.session_id.as_deref(), Some("gym-1"));
        assert_eq!(report.shot_number, 3);
        assert_eq!(report.lead_side, LeadSide::Left);
        assert_eq!(report.key_frames.len(), 8);
        assert_eq!(
            report.key_frame(KeyFrameLabel::Load).map(|k| k.sequence),
            Some(1079)
        );
        assert_eq!(report.metrics.duration_frames, 15);
        assert_eq!(report.form.within_count(), 4);
    }

    #[test]
    fn test_report_json_has_no_pixels() {
        let builder = ReportBuilder::new(LeadSide::Right);
        let json = builder.build_json(&sample_event(1, 90.0));

        assert!(json.contains("schema_version"));
        assert!(json.contains("computed_at_utc"));
        assert!(json.contains("follow_through"));
        assert!(!json.contains("image"));

        let parsed: ShotReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.metrics.load_angle, 90.0);
    }
}
