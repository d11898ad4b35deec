//! Backward search for the load point of a shot.

use crate::core::buffer::RingBuffer;

/// The deepest elbow bend before a release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadPoint {
    pub index: usize,
    pub angle: f64,
}

/// Why a release candidate was not turned into a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRejection {
    /// No frame in the search window had a measurable elbow angle
    NoDefinedAngle,
    /// Load and release are too close together to be a real shot
    TooShort { duration: usize, minimum: usize },
}

impl std::fmt::Display for LoadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadRejection::NoDefinedAngle => write!(f, "no measurable elbow angle before release"),
            LoadRejection::TooShort { duration, minimum } => write!(
                f,
                "load-to-release took {duration} frames, need at least {minimum}"
            ),
        }
    }
}

/// Scans a fixed window before the release for the minimum elbow angle.
#[derive(Debug, Clone, Copy)]
pub struct LoadLocator {
    window: usize,
    min_duration: usize,
}

impl LoadLocator {
    pub fn new(window: usize, min_duration: usize) -> Self {
        Self {
            window,
            min_duration,
        }
    }

    /// Find the load point for a release at buffer index `release`.
    ///
    /// Searches `[release - window, release)`, clipped at the buffer start.
    /// Frames without an angle are skipped; the earliest of equal minima wins.
    pub fn locate(&self, buffer: &RingBuffer, release: usize) -> Result<LoadPoint, LoadRejection> {
        let start = release.saturating_sub(self.window);

        let mut best: Option<LoadPoint> = None;
        for index in start..release {
            let Some(angle) = buffer.get(index).and_then(|s| s.features.elbow_angle) else {
                continue;
            };
            if best.map_or(true, |b| angle < b.angle) {
                best = Some(LoadPoint { index, angle });
            }
        }

        let load = best.ok_or(LoadRejection::NoDefinedAngle)?;
        let duration = release - load.index;
        if duration < self.min_duration {
            return Err(LoadRejection::TooShort {
                duration,
                minimum: self.min_duration,
            });
        }
        Ok(load)
    }
}
