//! FormCheck Segmenter - real-time shot segmentation from pose streams.
//!
//! This library turns a stream of per-frame body landmarks into discrete
//! shooting motions ("shots"), each summarized by eight key frames and a
//! handful of kinematic features.
//!
//! # Detection
//!
//! - **Single pass**: every frame is seen once, with no look-ahead
//! - **Bounded memory**: a fixed-size ring buffer holds recent frames
//! - **Deterministic**: the same frames always yield the same shots
//! - **Never fails**: missing or noisy joints mean "no shot this frame"
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      FormCheck Segmenter                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  PoseFrame  │──▶│  Features   │──▶│ Ring Buffer │        │
//! │  │  (replay)   │   │ + Stability │   │ (evict/base)│        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                                             │                 │
//! │                                             ▼                 │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Key-Frame  │◀──│    Load     │◀──│   Release   │        │
//! │  │   Sampler   │   │   Locator   │   │  + Cooldown │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                                                     │
//! │         ▼                                                     │
//! │   MotionEvent ──▶ ShotReport ──▶ Dispatcher ──▶ store/feedback│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use formcheck_segmenter::{config::EngineConfig, core::ShotDetector, pose::PoseFrame};
//!
//! let mut detector = ShotDetector::new(EngineConfig::default()).expect("valid config");
//!
//! # let frames: Vec<PoseFrame> = Vec::new();
//! for frame in frames {
//!     if let Some(shot) = detector.ingest(frame) {
//!         println!("shot {} released at {:.0} deg", shot.shot_number, shot.release_angle);
//!     }
//! }
//! ```

pub mod config;
pub mod core;
pub mod dispatch;
pub mod feedback;
pub mod pose;
pub mod session;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, EngineConfig, LeadSide};
pub use core::{
    KeyFrameLabel, MotionEvent, ReportBuilder, SessionSummary, ShotDetector, ShotReport,
};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher};
pub use feedback::{FeedbackConfig, FeedbackError, FeedbackResponse};
pub use pose::{PoseFrame, ReplayInput, ReplaySource};
pub use session::{SessionLog, SessionStats, SharedSessionLog};
pub use store::{ReportStore, StoreError};

// Feedback client re-exports (when enabled)
#[cfg(feature = "feedback")]
pub use feedback::{BlockingFeedbackClient, FeedbackClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
