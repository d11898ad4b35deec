//! Session-level statistics over many shot reports.

use crate::core::form::ELBOW_AT_LOAD;
use crate::core::report::ShotReport;
use crate::feedback::FeedbackResponse;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Descriptive statistics for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    /// Sample standard deviation; needs at least two shots
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = (values.len() >= 2).then(|| values.std_dev());
        Some(Self {
            mean: values.mean(),
            std_dev,
            min: Statistics::min(values),
            max: Statistics::max(values),
        })
    }

    /// Standard deviation relative to the mean.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        let std_dev = self.std_dev?;
        if self.mean.abs() < f64::EPSILON {
            return None;
        }
        Some(std_dev / self.mean.abs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMetric {
    LoadAngle,
    ReleaseAngle,
    Duration,
}

impl std::fmt::Display for SummaryMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryMetric::LoadAngle => write!(f, "load angle"),
            SummaryMetric::ReleaseAngle => write!(f, "release angle"),
            SummaryMetric::Duration => write!(f, "load-to-release duration"),
        }
    }
}

/// Aggregate view of a shooting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub shots: usize,
    pub load_angle: Option<MetricStats>,
    pub release_angle: Option<MetricStats>,
    pub duration_frames: Option<MetricStats>,
    /// Shots whose load angle falls inside the reference range
    pub load_within_range: usize,
    /// Metric with the lowest coefficient of variation
    pub most_consistent: Option<SummaryMetric>,
    /// Verdicts returned by the feedback service, if any arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackTally>,
}

impl SessionSummary {
    pub fn from_reports(reports: &[ShotReport]) -> Self {
        let load: Vec<f64> = reports.iter().map(|r| r.metrics.load_angle).collect();
        let release: Vec<f64> = reports.iter().map(|r| r.metrics.release_angle).collect();
        let duration: Vec<f64> = reports
            .iter()
            .map(|r| r.metrics.duration_frames as f64)
            .collect();

        let load_angle = MetricStats::from_values(&load);
        let release_angle = MetricStats::from_values(&release);
        let duration_frames = MetricStats::from_values(&duration);

        let most_consistent = [
            (SummaryMetric::LoadAngle, load_angle),
            (SummaryMetric::ReleaseAngle, release_angle),
            (SummaryMetric::Duration, duration_frames),
        ]
        .into_iter()
        .filter_map(|(metric, stats)| Some((metric, stats?.coefficient_of_variation()?)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(metric, _)| metric);

        Self {
            shots: reports.len(),
            load_angle,
            release_angle,
            duration_frames,
            load_within_range: load.iter().filter(|&&a| ELBOW_AT_LOAD.contains(a)).count(),
            most_consistent,
            feedback: None,
        }
    }

    /// Attach feedback verdicts, each paired with the report it answers.
    pub fn with_feedback<'a>(
        mut self,
        verdicts: impl IntoIterator<Item = (&'a ShotReport, &'a FeedbackResponse)>,
    ) -> Self {
        self.feedback = FeedbackTally::from_verdicts(verdicts);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.shots == 0
    }
}

/// Average mechanics of the shots sharing one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProfile {
    pub shots: usize,
    /// Mean load angle in degrees
    pub load_angle: f64,
    /// Mean release height; `None` when no shot in the group had one
    pub wrist_height_release: Option<f64>,
}

impl OutcomeProfile {
    fn from_reports(reports: &[&ShotReport]) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let load: Vec<f64> = reports.iter().map(|r| r.metrics.load_angle).collect();
        let heights: Vec<f64> = reports
            .iter()
            .filter_map(|r| r.metrics.wrist_height_release)
            .collect();

        Some(Self {
            shots: reports.len(),
            load_angle: Statistics::mean(&load),
            wrist_height_release: (!heights.is_empty()).then(|| Statistics::mean(&heights)),
        })
    }
}

/// Tally of the feedback service's made/missed calls and coaching output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTally {
    /// Shots that received feedback
    pub responses: usize,
    pub made: usize,
    pub missed: usize,
    /// Made shots as a percentage of shots with a verdict
    pub shooting_percentage: Option<f64>,
    pub average_form_rating: Option<f64>,
    pub most_common_miss_type: Option<String>,
    /// Distinct quick cues, in the order first given
    pub quick_cues: Vec<String>,
    pub makes: Option<OutcomeProfile>,
    pub misses: Option<OutcomeProfile>,
}

impl FeedbackTally {
    /// `None` when there are no verdicts at all.
    pub fn from_verdicts<'a>(
        verdicts: impl IntoIterator<Item = (&'a ShotReport, &'a FeedbackResponse)>,
    ) -> Option<Self> {
        let verdicts: Vec<(&'a ShotReport, &'a FeedbackResponse)> = verdicts.into_iter().collect();
        if verdicts.is_empty() {
            return None;
        }

        let with_outcome = |made: bool| -> Vec<&'a ShotReport> {
            verdicts
                .iter()
                .filter(|(_, response)| response.made == Some(made))
                .map(|(report, _)| *report)
                .collect()
        };
        let makes = with_outcome(true);
        let misses = with_outcome(false);

        let decided = makes.len() + misses.len();
        let shooting_percentage =
            (decided > 0).then(|| makes.len() as f64 / decided as f64 * 100.0);

        let ratings: Vec<f64> = verdicts
            .iter()
            .filter_map(|(_, response)| response.form_rating)
            .map(f64::from)
            .collect();
        let average_form_rating = (!ratings.is_empty()).then(|| Statistics::mean(&ratings));

        let mut miss_types: Vec<(&str, usize)> = Vec::new();
        let mut quick_cues: Vec<String> = Vec::new();
        for (_, response) in &verdicts {
            if let Some(ref kind) = response.miss_type {
                match miss_types.iter_mut().find(|(seen, _)| *seen == kind.as_str()) {
                    Some(entry) => entry.1 += 1,
                    None => miss_types.push((kind.as_str(), 1)),
                }
            }
            if let Some(ref cue) = response.quick_cue {
                if !quick_cues.contains(cue) {
                    quick_cues.push(cue.clone());
                }
            }
        }
        // Ties go to the miss type reported first.
        let most_common_miss_type = miss_types
            .iter()
            .fold(None, |best: Option<(&str, usize)>, &(kind, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((kind, count)),
            })
            .map(|(kind, _)| kind.to_string());

        Some(Self {
            responses: verdicts.len(),
            made: makes.len(),
            missed: misses.len(),
            shooting_percentage,
            average_form_rating,
            most_common_miss_type,
            quick_cues,
            makes: OutcomeProfile::from_reports(&makes),
            misses: OutcomeProfile::from_reports(&misses),
        })
    }
}
