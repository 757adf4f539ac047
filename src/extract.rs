//! Extraction orchestrator: one image in, one finalised record out.
//!
//! Each image walks the same small state machine:
//!
//! ```text
//! Pending ──▶ Prompted ──▶ Invoked ──▶ Parsed ──▶ Finalized
//!    │                        │
//!    └── bad image ───────────┴── adapter error ──▶ Finalized (all-null)
//! ```
//!
//! Nothing here ever returns `Err` for a single image. Load failures and
//! model failures finalise the image with the fallback record and attach an
//! [`ImageError`] so callers can still see what happened; a batch of many
//! images is never derailed by one bad extraction.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ImageError};
use crate::pipeline::input::{self, ImageSource};
use crate::pipeline::model::{self, VisionModel};
use crate::pipeline::{encode, parse};
use crate::record::{CourseFields, CourseRecord};
use crate::session::Session;
use crate::table::ResultTable;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-image pipeline state, reported at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionStage {
    Pending,
    Prompted,
    Invoked,
    Parsed,
    Finalized,
}

/// The result of extracting one image.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub record: CourseRecord,
    /// Set when the record is a fallback (or the response was unparseable).
    pub error: Option<ImageError>,
    /// The record came from the session cache; no model call was made.
    pub from_cache: bool,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl ExtractionOutcome {
    fn fallback(name: String, error: ImageError, start: Instant) -> Self {
        Self {
            record: CourseRecord::fallback(name),
            error: Some(error),
            from_cache: false,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives images through the pipeline against one session.
#[derive(Clone)]
pub struct Extractor {
    session: Arc<Session>,
    model: Arc<dyn VisionModel>,
    config: ExtractionConfig,
}

impl Extractor {
    /// Build an extractor using the adapter selected by `config`.
    pub fn new(session: Arc<Session>, config: ExtractionConfig) -> Result<Self, ExtractError> {
        let model = model::build_model(&session, &config)?;
        info!("Extractor ready: model {}", model.name());
        Ok(Self::with_model(session, model, config))
    }

    /// Build an extractor around a caller-supplied adapter.
    pub fn with_model(
        session: Arc<Session>,
        model: Arc<dyn VisionModel>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            session,
            model,
            config,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Extract one image. Never fails; see [`ExtractionOutcome::error`].
    pub async fn extract(&self, source: &ImageSource) -> ExtractionOutcome {
        let start = Instant::now();
        let name = source.display_name();
        let mut stage = ExtractionStage::Pending;
        debug!("{}: {:?}", name, stage);

        let loaded = match input::load_image(source).await {
            Ok(l) => l,
            Err(e) => {
                warn!("{}", e);
                debug!("{}: {:?} → {:?}", name, stage, ExtractionStage::Finalized);
                return ExtractionOutcome::fallback(name, e, start);
            }
        };

        if self.config.cache_results {
            if let Some(fields) = self.session.cache().get(&loaded.digest) {
                debug!("{}: cache hit ({})", name, loaded.digest);
                return ExtractionOutcome {
                    record: CourseRecord::new(name, fields),
                    error: None,
                    from_cache: true,
                    input_tokens: 0,
                    output_tokens: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        }

        let image = match encode::encode_image(&loaded, self.config.max_image_pixels) {
            Ok(data) => data,
            Err(e) => {
                let err = ImageError::InvalidImage {
                    name: name.clone(),
                    detail: format!("encoding failed: {e}"),
                };
                warn!("{}", err);
                return ExtractionOutcome::fallback(name, err, start);
            }
        };

        let prompt = self.config.effective_prompt();
        stage = advance(&name, stage, ExtractionStage::Prompted);

        let reply = self.model.generate(prompt, &image).await;
        stage = advance(&name, stage, ExtractionStage::Invoked);

        let reply = match reply {
            Ok(r) => r,
            Err(e) => {
                let err = ImageError::ModelFailed {
                    name: name.clone(),
                    detail: e.to_string(),
                };
                warn!("{}", err);
                advance(&name, stage, ExtractionStage::Finalized);
                return ExtractionOutcome::fallback(name, err, start);
            }
        };

        let (fields, error) = match parse::parse_response(&reply.text) {
            Ok(fields) => {
                if self.config.cache_results {
                    self.session.cache().insert(loaded.digest, fields.clone());
                }
                (fields, None)
            }
            Err(e) => {
                let err = ImageError::Unparseable {
                    name: name.clone(),
                    detail: e.to_string(),
                };
                warn!("Error parsing model response, using fallback: {}", err);
                (CourseFields::empty(), Some(err))
            }
        };
        stage = advance(&name, stage, ExtractionStage::Parsed);
        advance(&name, stage, ExtractionStage::Finalized);

        ExtractionOutcome {
            record: CourseRecord::new(name, fields),
            error,
            from_cache: false,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Extract a batch, one image at a time, in submission order.
    ///
    /// The configured pacing delay separates consecutive images; it is not
    /// applied after the last one.
    pub async fn extract_all(&self, sources: &[ImageSource]) -> Vec<ExtractionOutcome> {
        let total = sources.len();
        let batch_start = Instant::now();
        info!("Starting extraction of {} images", total);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut outcomes = Vec::with_capacity(total);
        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }
            let outcome = self.extract_one_reported(i + 1, total, source).await;
            outcomes.push(outcome);
        }

        let success = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "Extraction complete: {}/{} images, {}ms total",
            success,
            total,
            batch_start.elapsed().as_millis()
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, success);
        }

        outcomes
    }

    /// Extract a batch and append every record to `table`, in order.
    pub async fn extract_into(
        &self,
        sources: &[ImageSource],
        table: &mut ResultTable,
    ) -> Vec<ExtractionOutcome> {
        let outcomes = self.extract_all(sources).await;
        table.extend(outcomes.iter().map(|o| o.record.clone()));
        outcomes
    }

    /// [`Extractor::extract`] wrapped with progress events.
    pub(crate) async fn extract_one_reported(
        &self,
        index: usize,
        total: usize,
        source: &ImageSource,
    ) -> ExtractionOutcome {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_image_start(index, total, &source.display_name());
        }
        let outcome = self.extract(source).await;
        if let Some(ref cb) = self.config.progress_callback {
            match &outcome.error {
                None => cb.on_image_complete(index, total, &outcome.record),
                Some(e) => cb.on_image_error(index, total, &outcome.record.source_file, &e.to_string()),
            }
        }
        outcome
    }

    pub(crate) async fn pace(&self) {
        if self.config.pace_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.pace_ms)).await;
        }
    }
}

fn advance(name: &str, from: ExtractionStage, to: ExtractionStage) -> ExtractionStage {
    debug!("{}: {:?} → {:?}", name, from, to);
    to
}

/// Synchronous wrapper around [`Extractor::extract_all`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn extract_sync(
    extractor: &Extractor,
    sources: &[ImageSource],
) -> Result<Vec<ExtractionOutcome>, ExtractError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(runtime.block_on(extractor.extract_all(sources)))
}
