//! Client for the coaching feedback service.
//!
//! The service receives one shot report at a time and answers with a
//! made/missed call and coaching text. Everything about how it reaches
//! that answer lives on the other side of the wire.

use crate::core::report::ShotReport;
use serde::{Deserialize, Serialize};

/// Environment variable holding the service base URL.
pub const FEEDBACK_URL_ENV: &str = "FORMCHECK_FEEDBACK_URL";

/// Environment variable holding the bearer token.
pub const FEEDBACK_TOKEN_ENV: &str = "FORMCHECK_FEEDBACK_TOKEN";

/// Feedback service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackConfig {
    /// Base URL, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Bearer authentication token
    pub token: Option<String>,
}

impl FeedbackConfig {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Build a configuration from explicit values, falling back to the
    /// environment for whatever is missing.
    pub fn resolve(url: Option<String>, token: Option<String>) -> Result<Self, FeedbackError> {
        let url = url
            .or_else(|| std::env::var(FEEDBACK_URL_ENV).ok())
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                FeedbackError::Config(format!(
                    "No feedback service URL; pass --feedback-url or set {FEEDBACK_URL_ENV}"
                ))
            })?;
        let token = token.or_else(|| std::env::var(FEEDBACK_TOKEN_ENV).ok());
        Ok(Self::new(url, token))
    }

    /// Get the analyze endpoint URL.
    pub fn analyze_url(&self) -> String {
        format!("{}/v1/analyze", self.base_url)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Feedback client error types.
#[derive(Debug)]
pub enum FeedbackError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for FeedbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackError::Config(msg) => write!(f, "Feedback config error: {msg}"),
            FeedbackError::Network(msg) => write!(f, "Feedback network error: {msg}"),
            FeedbackError::Server { status, message } => {
                write!(f, "Feedback server error ({status}): {message}")
            }
            FeedbackError::Serialization(msg) => write!(f, "Feedback serialization error: {msg}"),
        }
    }
}

impl std::error::Error for FeedbackError {}

/// Request body for the analyze endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest<'a> {
    pub device_id: &'a str,
    /// IANA timezone name of the device
    pub timezone: String,
    pub shot: &'a ShotReport,
}

/// Coaching feedback for one shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub made: Option<bool>,
    /// e.g. "short", "long", "left", "right"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miss_type: Option<String>,
    /// Overall form score from 1 to 10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_rating: Option<u8>,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_issue: Option<String>,
    /// One short cue for the next attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_cue: Option<String>,
}

impl std::fmt::Display for FeedbackResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match self.made {
            Some(true) => "made",
            Some(false) => "missed",
            None => "unknown",
        };
        write!(f, "[{outcome}]")?;
        if let Some(rating) = self.form_rating {
            write!(f, " {rating}/10")?;
        }
        write!(f, " {}", self.feedback)?;
        if let Some(ref cue) = self.quick_cue {
            write!(f, " (cue: {cue})")?;
        }
        Ok(())
    }
}

/// Timezone reported with each request: `TZ` if it names a known zone, else UTC.
pub fn local_timezone() -> String {
    std::env::var("TZ")
        .ok()
        .and_then(|tz| tz.parse::<chrono_tz::Tz>().ok())
        .unwrap_or(chrono_tz::Tz::UTC)
        .to_string()
}

/// Device identifier: hostname plus a per-process suffix.
pub fn device_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!(
        "formcheck-{}-{}",
        hostname,
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    )
}

/// Async client for the feedback service.
#[cfg(feature = "feedback")]
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    config: FeedbackConfig,
    client: reqwest::Client,
    device_id: String,
    timezone: String,
}

#[cfg(feature = "feedback")]
impl FeedbackClient {
    /// Create a new feedback client.
    pub fn new(config: FeedbackConfig) -> Result<Self, FeedbackError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FeedbackError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            device_id: device_id(),
            timezone: local_timezone(),
        })
    }

    /// Test connection to the service.
    pub async fn test_connection(&self) -> Result<bool, FeedbackError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| FeedbackError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Ask for coaching feedback on one shot.
    pub async fn analyze(&self, report: &ShotReport) -> Result<FeedbackResponse, FeedbackError> {
        let request = FeedbackRequest {
            device_id: &self.device_id,
            timezone: self.timezone.clone(),
            shot: report,
        };

        let mut builder = self.client.post(self.config.analyze_url()).json(&request);
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FeedbackError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FeedbackError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<FeedbackResponse>()
            .await
            .map_err(|e| FeedbackError::Serialization(e.to_string()))
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Blocking feedback client for use in synchronous contexts.
#[cfg(feature = "feedback")]
pub struct BlockingFeedbackClient {
    inner: FeedbackClient,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "feedback")]
impl BlockingFeedbackClient {
    /// Create a new blocking feedback client.
    pub fn new(config: FeedbackConfig) -> Result<Self, FeedbackError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FeedbackError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: FeedbackClient::new(config)?,
            runtime,
        })
    }

    /// Test connection to the service.
    pub fn test_connection(&self) -> Result<bool, FeedbackError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    /// Ask for coaching feedback on one shot.
    pub fn analyze(&self, report: &ShotReport) -> Result<FeedbackResponse, FeedbackError> {
        self.runtime.block_on(self.inner.analyze(report))
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        self.inner.device_id()
    }
}
