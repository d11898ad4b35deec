//! Configuration for the FormCheck segmenter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration for the segmenter and its CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Detection engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Path for exporting shot reports and session summaries
    pub export_path: PathBuf,

    /// Path for storing the session log
    pub data_path: PathBuf,

    /// Base URL of the coaching feedback service, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formcheck");

        Self {
            engine: EngineConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            feedback_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, falling back to defaults when absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formcheck")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Which arm is tracked as the shooting arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadSide {
    Left,
    #[default]
    Right,
}

impl LeadSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSide::Left => "left",
            LeadSide::Right => "right",
        }
    }
}

impl std::fmt::Display for LeadSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSide {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(LeadSide::Left),
            "right" | "r" => Ok(LeadSide::Right),
            other => Err(ConfigError::Invalid(format!(
                "lead side must be 'left' or 'right', got '{other}'"
            ))),
        }
    }
}

/// Tuning knobs for the shot detection engine.
///
/// Defaults assume ~30 fps input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tracked shooting arm
    pub lead_side: LeadSide,
    /// Maximum number of frames retained in the ring buffer
    pub buffer_capacity: usize,
    /// Consecutive confident frames required before a release may fire
    pub stability_frames: u32,
    /// Per-joint confidence that must be exceeded for a frame to count as stable
    pub confidence_threshold: f64,
    /// Elbow angle (degrees) that must be exceeded to recognize a release
    pub release_angle: f64,
    /// Minimum frame distance between two accepted shots
    pub cooldown_frames: usize,
    /// Minimum load-to-release distance in frames
    pub min_duration_frames: usize,
    /// How far back from the release the load search looks
    pub load_search_window: usize,
    /// Frames between stance and load
    pub stance_offset: usize,
    /// Frames between release and follow-through
    pub follow_through_offset: usize,
    /// Fractions of the load-to-release span used for the four mid frames
    pub mid_fractions: [f64; 4],
    /// Frames of feature history kept on either side of the key-frame span
    pub history_margin: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lead_side: LeadSide::Right,
            buffer_capacity: 180,
            stability_frames: 8,
            confidence_threshold: 0.5,
            release_angle: 155.0,
            cooldown_frames: 45, // ~1.5s at 30fps
            min_duration_frames: 10,
            load_search_window: 60,
            stance_offset: 5,
            follow_through_offset: 5,
            mid_fractions: [0.20, 0.40, 0.60, 0.80],
            history_margin: 10,
        }
    }
}

impl EngineConfig {
    /// Shorthand for a default configuration tracking the given arm.
    pub fn for_side(lead_side: LeadSide) -> Self {
        Self {
            lead_side,
            ..Self::default()
        }
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        // An evicted cooldown anchor counts as "long ago", which is only true
        // when the buffer spans at least one full cooldown.
        if self.cooldown_frames > self.buffer_capacity {
            return Err(ConfigError::Invalid(format!(
                "cooldown_frames ({}) cannot exceed buffer_capacity ({})",
                self.cooldown_frames, self.buffer_capacity
            )));
        }
        if self.load_search_window == 0 {
            return Err(ConfigError::Invalid(
                "load_search_window must be at least 1".to_string(),
            ));
        }
        if self.min_duration_frames == 0 {
            return Err(ConfigError::Invalid(
                "min_duration_frames must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !self.release_angle.is_finite() {
            return Err(ConfigError::Invalid(
                "release_angle must be finite".to_string(),
            ));
        }
        let fractions_ok = self.mid_fractions.iter().all(|f| (0.0..=1.0).contains(f))
            && self.mid_fractions.windows(2).all(|pair| pair[0] <= pair[1]);
        if !fractions_ok {
            return Err(ConfigError::Invalid(format!(
                "mid_fractions must be non-decreasing within [0, 1], got {:?}",
                self.mid_fractions
            )));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Parse error: {e}"),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
