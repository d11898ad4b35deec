//! Session bookkeeping for the FormCheck segmenter.
//!
//! Tracks how much the segmenter has processed across runs so the CLI can
//! report cumulative totals.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SessionLog, SessionStats,
    SharedSessionLog,
};
