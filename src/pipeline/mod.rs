//! Pipeline stages for course extraction.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the model backend can be swapped without touching parsing.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ model ──▶ parse
//! (path/bytes) (base64)  (VLM)   (JSON → record)
//! ```
//!
//! 1. [`input`] : read and sniff the upload or file, hash it, decode it
//! 2. [`encode`]: downscale and base64-wrap the image for the request body
//! 3. [`model`] : the only stage with network I/O; returns raw text
//! 4. [`parse`] : strip fences, decode, project onto the schema, fall back

pub mod encode;
pub mod input;
pub mod model;
pub mod parse;
