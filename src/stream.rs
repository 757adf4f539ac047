//! Streaming extraction API: emit outcomes as each image finalises.
//!
//! [`Extractor::extract_all`] returns only after the whole batch is done.
//! [`extract_stream`] yields each [`ExtractionOutcome`] as soon as its image
//! is finalised, so callers can fill a table or print rows incrementally.
//!
//! Images are processed one at a time and outcomes arrive in submission
//! order. The configured pacing delay runs before each image except the
//! first, so dropping the stream after the last item never waits.

use crate::extract::{ExtractionOutcome, Extractor};
use crate::pipeline::input::ImageSource;
use futures::stream;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-image outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = ExtractionOutcome> + Send>>;

/// Extract `sources` lazily, yielding outcomes in submission order.
///
/// Progress callbacks fire per image as with the eager API; the batch-level
/// start and completion events are not emitted because the caller controls
/// how much of the stream is consumed.
///
/// # Example
/// ```rust,no_run
/// use course_extract::{extract_stream, ExtractionConfig, Extractor, ImageSource, Session};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Arc::new(Session::new(std::env::var("GEMINI_API_KEY")?)?);
/// let extractor = Extractor::new(session, ExtractionConfig::default())?;
/// let sources = vec![ImageSource::from_path("flyer.png")];
/// let mut outcomes = extract_stream(extractor, sources);
/// while let Some(o) = outcomes.next().await {
///     println!("{}: {:?}", o.record.source_file, o.record.fields.course_name);
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_stream(extractor: Extractor, sources: Vec<ImageSource>) -> OutcomeStream {
    let total = sources.len();
    info!("Starting streaming extraction of {} images", total);

    let state = (extractor, sources.into_iter().enumerate());
    let s = stream::unfold(state, move |(extractor, mut pending)| async move {
        let (i, source) = pending.next()?;
        if i > 0 {
            extractor.pace().await;
        }
        let outcome = extractor.extract_one_reported(i + 1, total, &source).await;
        Some((outcome, (extractor, pending)))
    });

    Box::pin(s)
}
