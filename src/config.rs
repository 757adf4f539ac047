//! Configuration types for course extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The session credential is deliberately
//! *not* part of the config: it lives in [`crate::session::Session`] so a
//! config can be logged, cloned and reused across credential rotations.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Default Gemini model, matching the model the extractor was tuned on.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use course_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-1.5-pro")
///     .pace_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-pro");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Vision model identifier. Default: `gemini-1.5-flash`.
    pub model: String,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    ///
    /// `None` (the default) or `"gemini"` uses the built-in Gemini REST
    /// client with the session credential. Any other name is resolved through
    /// `edgequake_llm::ProviderFactory`, which reads that provider's API key
    /// from the environment.
    pub provider_name: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription, not generation; a low temperature keeps
    /// the model literal.
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 2048.
    pub max_tokens: usize,

    /// Per-call timeout imposed by the HTTP adapter, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Longest image side sent to the model, in pixels. Default: 2000.
    ///
    /// Phone photos of flyers are often 4000 px or more; larger images only
    /// cost upload time and tokens.
    pub max_image_pixels: u32,

    /// Pause between finishing one image and starting the next, in
    /// milliseconds. Default: 3000. `0` disables pacing.
    pub pace_ms: u64,

    /// Reuse results for byte-identical images within a session. Default: true.
    pub cache_results: bool,

    /// Custom extraction prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Base URL of the Gemini REST API. Overridable for proxies and tests.
    pub gemini_base_url: String,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            temperature: 0.1,
            max_tokens: 2048,
            api_timeout_secs: 60,
            max_image_pixels: 2000,
            pace_ms: 3000,
            cache_results: true,
            prompt: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("pace_ms", &self.pace_ms)
            .field("cache_results", &self.cache_results)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("gemini_base_url", &self.gemini_base_url)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt that will actually be sent.
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::EXTRACTION_PROMPT.as_str())
    }

    /// `true` when the built-in Gemini client handles model calls.
    pub fn uses_gemini_client(&self) -> bool {
        match self.provider_name.as_deref() {
            None => true,
            Some(name) => name.eq_ignore_ascii_case("gemini"),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn pace_ms(mut self, ms: u64) -> Self {
        self.config.pace_ms = ms;
        self
    }

    pub fn cache_results(mut self, v: bool) -> Self {
        self.config.cache_results = v;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if !(c.gemini_base_url.starts_with("http://") || c.gemini_base_url.starts_with("https://"))
        {
            return Err(ExtractError::InvalidConfig(format!(
                "Gemini base URL must be http(s), got '{}'",
                c.gemini_base_url
            )));
        }
        if let Some(ref p) = c.prompt {
            if p.trim().is_empty() {
                return Err(ExtractError::InvalidConfig("Prompt must not be empty".into()));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.model, "gemini-1.5-flash");
        assert_eq!(c.pace_ms, 3000);
        assert!(c.cache_results);
        assert!(c.uses_gemini_client());
        assert_eq!(c.effective_prompt(), crate::prompts::EXTRACTION_PROMPT.as_str());
    }

    #[test]
    fn builder_clamps() {
        let c = ExtractionConfig::builder()
            .temperature(5.0)
            .max_image_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_image_pixels, 100);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ExtractionConfig::builder().model("  ").build().is_err());
        assert!(ExtractionConfig::builder().max_tokens(0).build().is_err());
        assert!(ExtractionConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(ExtractionConfig::builder()
            .gemini_base_url("ftp://x")
            .build()
            .is_err());
        assert!(ExtractionConfig::builder().prompt("").build().is_err());
    }

    #[test]
    fn provider_selection() {
        let c = ExtractionConfig::builder().provider_name("Gemini").build().unwrap();
        assert!(c.uses_gemini_client());
        let c = ExtractionConfig::builder().provider_name("openai").build().unwrap();
        assert!(!c.uses_gemini_client());
    }

    #[test]
    fn prompt_override_wins() {
        let c = ExtractionConfig::builder().prompt("just JSON").build().unwrap();
        assert_eq!(c.effective_prompt(), "just JSON");
    }

    #[test]
    fn debug_hides_prompt_body() {
        let c = ExtractionConfig::builder().prompt("secret-ish prompt").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-ish"));
    }
}
