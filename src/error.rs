//! Error types for the course-extract library.
//!
//! Three tiers of failure exist, and only the first one ever reaches the
//! caller as an `Err`:
//!
//! * [`ExtractError`] is fatal: nothing can be extracted at all (no
//!   credential, invalid configuration, provider cannot be built, export
//!   cannot be written). Returned from constructors and export helpers.
//!
//! * [`ModelInvocationError`] is per-image: the call to the vision model
//!   failed (network, auth, quota, malformed request). The orchestrator
//!   absorbs it and finalises that image with an all-null record.
//!
//! * [`ResponseDecodeError`] is recovered locally: the model answered, but
//!   no JSON object could be decoded from its text. The response parser
//!   absorbs it and substitutes the all-null fallback.
//!
//! Absorbed failures are surfaced as an [`ImageError`] annotation on
//! [`crate::extract::ExtractionOutcome`] so callers can still report them.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the course-extract library.
///
/// Per-image failures use [`ImageError`] and are stored on the extraction
/// outcome rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Session errors ────────────────────────────────────────────────────
    /// No API credential has been supplied for this session.
    #[error("No API credential supplied.\nSet GEMINI_API_KEY or pass --api-key <KEY>.")]
    CredentialMissing,

    // ── Input errors ──────────────────────────────────────────────────────
    /// An input path (file or directory) could not be listed or read.
    #[error("Cannot read input '{path}': {source}\nCheck the path exists and is readable.")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The named edgequake-llm provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The HTTP client for the model endpoint could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Export errors ─────────────────────────────────────────────────────
    /// Could not create or write the exported table.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialising the result table failed.
    #[error("Failed to export results: {0}")]
    Export(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call across the model boundary.
///
/// Fatal for the single image being processed, never for the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelInvocationError {
    /// The request never got a response (DNS, TLS, connection reset, …).
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The boundary adapter gave up waiting for the model.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The credential was rejected (HTTP 401/403 or an invalid-key 400).
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    /// Quota exhausted or rate limit hit (HTTP 429).
    #[error("rate limit exceeded{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider refused the request as malformed (other 4xx).
    #[error("invalid request (HTTP {status}): {detail}")]
    InvalidRequest { status: u16, detail: String },

    /// The provider failed on its side (5xx or unexpected status).
    #[error("model API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// An edgequake-llm provider reported a failure.
    #[error("provider '{provider}' failed: {detail}")]
    Provider { provider: String, detail: String },
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

/// The model's text did not contain a decodable JSON object.
///
/// Never propagated past [`crate::pipeline::parse`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResponseDecodeError {
    /// The text (after fence stripping) is not valid JSON.
    #[error("response is not valid JSON: {detail}")]
    NotJson { detail: String },

    /// The text is valid JSON, but not an object.
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// A non-fatal error annotation for a single image.
///
/// Stored on [`crate::extract::ExtractionOutcome`] alongside the fallback
/// record. The batch always continues.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image could not be read, is not PNG/JPEG, or failed to decode.
    #[error("{name}: invalid image: {detail}")]
    InvalidImage { name: String, detail: String },

    /// The vision model call failed.
    #[error("{name}: model call failed: {detail}")]
    ModelFailed { name: String, detail: String },

    /// The model answered but no JSON object could be recovered.
    #[error("{name}: unparseable model response: {detail}")]
    Unparseable { name: String, detail: String },
}
