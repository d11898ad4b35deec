//! Shooting-form assessment against published reference ranges.
//!
//! This grades mechanics only. Whether the shot went in is not judged here.

use crate::core::event::MotionEvent;
use serde::{Deserialize, Serialize};

/// Reference range for one form metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormRange {
    pub min: f64,
    pub max: f64,
    pub ideal: f64,
    pub unit: &'static str,
}

impl FormRange {
    pub fn grade(&self, value: f64) -> FormGrade {
        if value < self.min {
            FormGrade::Below
        } else if value > self.max {
            FormGrade::Above
        } else {
            FormGrade::Within
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.grade(value) == FormGrade::Within
    }
}

/// Elbow angle at the set point.
pub const ELBOW_AT_LOAD: FormRange = FormRange {
    min: 80.0,
    max: 100.0,
    ideal: 90.0,
    unit: "deg",
};

/// Elbow extension at release.
pub const ELBOW_AT_RELEASE: FormRange = FormRange {
    min: 160.0,
    max: 180.0,
    ideal: 170.0,
    unit: "deg",
};

/// Knee flexion (180 minus the hip-knee-ankle angle) at the set point.
pub const KNEE_FLEXION_AT_LOAD: FormRange = FormRange {
    min: 15.0,
    max: 45.0,
    ideal: 30.0,
    unit: "deg",
};

/// Wrist height at release; 1.0 is shoulder level.
pub const RELEASE_HEIGHT: FormRange = FormRange {
    min: 1.05,
    max: 1.40,
    ideal: 1.20,
    unit: "torso",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormGrade {
    Below,
    Within,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMetric {
    ElbowAtLoad,
    ElbowAtRelease,
    KneeFlexionAtLoad,
    ReleaseHeight,
}

impl FormMetric {
    pub fn range(&self) -> FormRange {
        match self {
            FormMetric::ElbowAtLoad => ELBOW_AT_LOAD,
            FormMetric::ElbowAtRelease => ELBOW_AT_RELEASE,
            FormMetric::KneeFlexionAtLoad => KNEE_FLEXION_AT_LOAD,
            FormMetric::ReleaseHeight => RELEASE_HEIGHT,
        }
    }
}

/// A single graded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAssessment {
    pub metric: FormMetric,
    pub value: f64,
    pub grade: FormGrade,
    /// Signed difference from the ideal value
    pub deviation: f64,
}

impl MetricAssessment {
    pub fn new(metric: FormMetric, value: f64) -> Self {
        let range = metric.range();
        Self {
            metric,
            value,
            grade: range.grade(value),
            deviation: value - range.ideal,
        }
    }
}

/// Form grades for one shot. Metrics that could not be measured are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormAssessment {
    pub elbow_at_load: MetricAssessment,
    pub elbow_at_release: MetricAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knee_flexion_at_load: Option<MetricAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_height: Option<MetricAssessment>,
}

impl FormAssessment {
    pub fn metrics(&self) -> impl Iterator<Item = &MetricAssessment> {
        [Some(&self.elbow_at_load), Some(&self.elbow_at_release)]
            .into_iter()
            .chain([
                self.knee_flexion_at_load.as_ref(),
                self.release_height.as_ref(),
            ])
            .flatten()
    }

    /// Number of measured metrics inside their reference range.
    pub fn within_count(&self) -> usize {
        self.metrics()
            .filter(|m| m.grade == FormGrade::Within)
            .count()
    }

    /// The measured metric furthest from ideal, relative to its range width.
    pub fn weakest(&self) -> Option<&MetricAssessment> {
        self.metrics()
            .filter(|m| m.grade != FormGrade::Within)
            .max_by(|a, b| relative_miss(a).total_cmp(&relative_miss(b)))
    }
}

fn relative_miss(assessment: &MetricAssessment) -> f64 {
    let range = assessment.metric.range();
    assessment.deviation.abs() / (range.max - range.min)
}

/// Grade an emitted shot.
pub fn assess(event: &MotionEvent) -> FormAssessment {
    FormAssessment {
        elbow_at_load: MetricAssessment::new(FormMetric::ElbowAtLoad, event.load_angle),
        elbow_at_release: MetricAssessment::new(FormMetric::ElbowAtRelease, event.release_angle),
        knee_flexion_at_load: event
            .knee_angle_load
            .map(|knee| MetricAssessment::new(FormMetric::KneeFlexionAtLoad, 180.0 - knee)),
        release_height: event
            .wrist_height_release
            .map(|height| MetricAssessment::new(FormMetric::ReleaseHeight, height)),
    }
}
