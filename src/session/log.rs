//! Cumulative session counters.
//!
//! Counters are atomics so the detection loop and the dispatch worker can
//! update one shared log without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session file name under the data directory.
pub const SESSION_LOG_FILE: &str = "session_log.json";

/// Counters for everything the segmenter has done.
#[derive(Debug)]
pub struct SessionLog {
    frames_processed: AtomicU64,
    shots_detected: AtomicU64,
    candidates_rejected: AtomicU64,
    reports_stored: AtomicU64,
    feedback_received: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            shots_detected: AtomicU64::new(0),
            candidates_rejected: AtomicU64::new(0),
            reports_stored: AtomicU64::new(0),
            feedback_received: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by a file, picking up totals from earlier runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous session totals: {}", e);
        }

        log
    }

    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames(&self, count: u64) {
        self.frames_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_shot(&self) {
        self.shots_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejections(&self, count: u64) {
        self.candidates_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_report_stored(&self) {
        self.reports_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feedback(&self) {
        self.feedback_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            shots_detected: self.shots_detected.load(Ordering::Relaxed),
            candidates_rejected: self.candidates_rejected.load(Ordering::Relaxed),
            reports_stored: self.reports_stored.load(Ordering::Relaxed),
            feedback_received: self.feedback_received.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Totals:\n\
             - Frames processed: {}\n\
             - Shots detected: {}\n\
             - Candidates rejected: {}\n\
             - Reports stored: {}\n\
             - Feedback received: {}\n\
             - Session duration: {} seconds",
            stats.frames_processed,
            stats.shots_detected,
            stats.candidates_rejected,
            stats.reports_stored,
            stats.feedback_received,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk. A log without a path does nothing.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stats = self.stats();
        let persisted = PersistedTotals {
            frames_processed: stats.frames_processed,
            shots_detected: stats.shots_detected,
            candidates_rejected: stats.candidates_rejected,
            reports_stored: stats.reports_stored,
            feedback_received: stats.feedback_received,
            last_updated: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedTotals =
            serde_json::from_str(&content).map_err(std::io::Error::other)?;

        self.frames_processed
            .store(persisted.frames_processed, Ordering::Relaxed);
        self.shots_detected
            .store(persisted.shots_detected, Ordering::Relaxed);
        self.candidates_rejected
            .store(persisted.candidates_rejected, Ordering::Relaxed);
        self.reports_stored
            .store(persisted.reports_stored, Ordering::Relaxed);
        self.feedback_received
            .store(persisted.feedback_received, Ordering::Relaxed);
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.shots_detected.store(0, Ordering::Relaxed);
        self.candidates_rejected.store(0, Ordering::Relaxed);
        self.reports_stored.store(0, Ordering::Relaxed);
        self.feedback_received.store(0, Ordering::Relaxed);
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub shots_detected: u64,
    pub candidates_rejected: u64,
    pub reports_stored: u64,
    pub feedback_received: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTotals {
    frames_processed: u64,
    shots_detected: u64,
    #[serde(default)]
    candidates_rejected: u64,
    #[serde(default)]
    reports_stored: u64,
    #[serde(default)]
    feedback_received: u64,
    last_updated: DateTime<Utc>,
}

pub type SharedSessionLog = Arc<SessionLog>;

pub fn create_shared_log() -> SharedSessionLog {
    Arc::new(SessionLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedSessionLog {
    Arc::new(SessionLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_log_counting() {
        let log = SessionLog::new();

        log.record_frames(90);
        log.record_frame();
        log.record_shot();
        log.record_rejections(3);

        let stats = log.stats();
        assert_eq!(stats.frames_processed, 91);
        assert_eq!(stats.shots_detected, 1);
        assert_eq!(stats.candidates_rejected, 3);
        assert_eq!(stats.reports_stored, 0);
    }

    #[test]
    fn test_session_log_reset() {
        let log = SessionLog::new();
        log.record_frames(100);
        log.record_feedback();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(stats.feedback_received, 0);
    }

    #[test]
    fn test_totals_survive_restart() {
        let path = std::env::temp_dir()
            .join(format!("formcheck-session-{}", uuid::Uuid::new_v4()))
            .join(SESSION_LOG_FILE);

        let log = SessionLog::with_persistence(path.clone());
        log.record_frames(300);
        log.record_shot();
        log.record_report_stored();
        log.save().unwrap();

        let reloaded = SessionLog::with_persistence(path.clone());
        reloaded.record_shot();
        let stats = reloaded.stats();
        assert_eq!(stats.frames_processed, 300);
        assert_eq!(stats.shots_detected, 2);
        assert_eq!(stats.reports_stored, 1);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionLog::new().summary();
        assert!(summary.contains("Frames processed"));
        assert!(summary.contains("Shots detected"));
    }
}
