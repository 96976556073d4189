//! Configuration types for document restoration.
//!
//! All behaviour is controlled through [`RestorationConfig`], built via its
//! [`RestorationConfigBuilder`]. The same struct feeds both the Gemini client
//! (model, endpoint, temperature, timeout) and the workflow (progress tick
//! cadence, completion delay, export file name).

use crate::error::ColoriFxError;
use std::fmt;
use std::time::Duration;

/// Default image model. Must be able to answer with an inline image part.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default Generative Language API origin.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Configuration for a restoration session.
///
/// Built via [`RestorationConfig::builder()`] or using
/// [`RestorationConfig::default()`].
///
/// # Example
/// ```rust
/// use colorifx::RestorationConfig;
///
/// let config = RestorationConfig::builder()
///     .model("gemini-2.5-flash-image")
///     .temperature(0.1)
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.tick_interval_ms, 100);
/// ```
#[derive(Clone)]
pub struct RestorationConfig {
    /// API key. If None, read from `GEMINI_API_KEY` then `API_KEY` when the
    /// client is built.
    pub api_key: Option<String>,

    /// Image model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// API origin, without trailing slash. Default: [`DEFAULT_BASE_URL`].
    ///
    /// Point this at a proxy or a local stub server in tests.
    pub base_url: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Kept low so the model redraws the document it was given instead of
    /// inventing one.
    pub temperature: f32,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// Image generation is slow; two minutes covers large scans.
    pub api_timeout_secs: u64,

    /// Custom restoration prompt. If None, uses
    /// [`crate::prompts::RESTORATION_PROMPT`].
    pub prompt_template: Option<String>,

    /// Progress tick interval in milliseconds. Default: 100.
    pub tick_interval_ms: u64,

    /// Pause between reaching 100 % and revealing the result, in
    /// milliseconds. Default: 400.
    pub completion_delay_ms: u64,

    /// File stem used when exporting the result into a directory.
    /// Default: `colorized-restoration`.
    pub export_file_stem: String,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            api_timeout_secs: 120,
            prompt_template: None,
            tick_interval_ms: 100,
            completion_delay_ms: 400,
            export_file_stem: "colorized-restoration".to_string(),
        }
    }
}

impl fmt::Debug for RestorationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestorationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt_template", &self.prompt_template.as_ref().map(|p| p.len()))
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("completion_delay_ms", &self.completion_delay_ms)
            .field("export_file_stem", &self.export_file_stem)
            .finish()
    }
}

impl RestorationConfig {
    /// Create a new builder for `RestorationConfig`.
    pub fn builder() -> RestorationConfigBuilder {
        RestorationConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// The explicit key, else the first non-empty key found in
    /// [`API_KEY_ENV_VARS`].
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.is_empty())
    }
}

/// Builder for [`RestorationConfig`].
#[derive(Debug)]
pub struct RestorationConfigBuilder {
    config: RestorationConfig,
}

impl RestorationConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompt_template(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_template = Some(prompt.into());
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms.max(1);
        self
    }

    pub fn completion_delay_ms(mut self, ms: u64) -> Self {
        self.config.completion_delay_ms = ms;
        self
    }

    pub fn export_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.export_file_stem = stem.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RestorationConfig, ColoriFxError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ColoriFxError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ColoriFxError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ColoriFxError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.export_file_stem.is_empty() || c.export_file_stem.contains(['/', '\\']) {
            return Err(ColoriFxError::InvalidConfig(format!(
                "export file stem must be a bare file name, got '{}'",
                c.export_file_stem
            )));
        }
        Ok(self.config)
    }
}
