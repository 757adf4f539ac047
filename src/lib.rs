//! # course-extract
//!
//! Turn photos and scans of course advertisements into structured rows using
//! a Vision Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Flyers for training courses put the same handful of facts (name, fees,
//! schedule, outline) in wildly different layouts. OCR plus rules breaks on
//! every new template. Instead this crate sends each image to a VLM with a
//! fixed extraction prompt and projects the reply onto a closed schema, so
//! every image yields exactly one row with the same eight columns.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path or upload)
//!  │
//!  ├─ 1. Input    read, sniff PNG/JPEG, hash, decode (spawn_blocking)
//!  ├─ 2. Cache    same bytes seen this session? reuse the fields
//!  ├─ 3. Encode   downscale, base64 ImageData
//!  ├─ 4. VLM      Gemini REST or any edgequake-llm provider
//!  ├─ 5. Parse    strip fences, decode JSON, project onto the schema
//!  └─ 6. Table    append the record; export CSV or JSON
//! ```
//!
//! A single image never fails the batch: unreadable images, model errors and
//! unparseable replies all finalise as the all-null record for that file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use course_extract::{ExtractionConfig, Extractor, ImageSource, ResultTable, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(Session::new(std::env::var("GEMINI_API_KEY")?)?);
//!     let extractor = Extractor::new(session, ExtractionConfig::default())?;
//!
//!     let mut table = ResultTable::new();
//!     let sources = vec![ImageSource::from_path("flyer.jpg")];
//!     extractor.extract_into(&sources, &mut table).await;
//!
//!     table.write_csv("extracted_courses.csv").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `course-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! course-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod schema;
pub mod session;
pub mod stream;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, ImageError, ModelInvocationError, ResponseDecodeError};
pub use extract::{extract_sync, ExtractionOutcome, ExtractionStage, Extractor};
pub use pipeline::input::{collect_images, ImageSource};
pub use pipeline::model::{GeminiModel, ModelReply, ProviderModel, VisionModel};
pub use pipeline::parse::{parse_record, parse_response};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, EXTRACTION_PROMPT};
pub use record::{CourseFields, CourseRecord};
pub use schema::{FeeType, Field};
pub use session::{Credential, Session};
pub use stream::{extract_stream, OutcomeStream};
pub use table::{ResultTable, TablePage};
