//! Input resolution: turn an uploaded buffer or a filesystem path into a
//! decoded in-memory image.
//!
//! Both input kinds converge on [`LoadedImage`] before anything reaches the
//! prompt or the model adapter. Only PNG and JPEG are accepted; the format is
//! sniffed from the magic bytes, never trusted from the file extension.

use crate::error::{ExtractError, ImageError};
use crate::session::ContentDigest;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions picked up when a directory is given as input.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One image to extract from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image file on disk. Displayed by its file name.
    Path(PathBuf),
    /// An uploaded image already in memory.
    Bytes { name: String, bytes: Vec<u8> },
}

impl ImageSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        ImageSource::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// The name shown in the `Source File` column.
    pub fn display_name(&self) -> String {
        match self {
            ImageSource::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Image container formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// Sniff the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<ImageKind> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// A validated, decoded image ready for encoding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub name: String,
    pub kind: ImageKind,
    /// Digest of the original bytes; the session cache key.
    pub digest: ContentDigest,
    pub image: DynamicImage,
}

/// Read the source bytes (from disk when needed) without decoding.
pub async fn read_source(source: &ImageSource) -> Result<Vec<u8>, ImageError> {
    match source {
        ImageSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
            ImageError::InvalidImage {
                name: source.display_name(),
                detail: format!("cannot read '{}': {}", path.display(), e),
            }
        }),
        ImageSource::Bytes { bytes, .. } => Ok(bytes.clone()),
    }
}

/// Load, sniff, hash and decode one image.
///
/// Decoding is CPU-bound, so it runs on the blocking pool.
pub async fn load_image(source: &ImageSource) -> Result<LoadedImage, ImageError> {
    let name = source.display_name();
    let bytes = read_source(source).await?;

    let kind = ImageKind::sniff(&bytes).ok_or_else(|| ImageError::InvalidImage {
        name: name.clone(),
        detail: "not a PNG or JPEG image".to_string(),
    })?;
    let digest = ContentDigest::of(&bytes);

    let image = tokio::task::spawn_blocking(move || {
        image::load_from_memory_with_format(&bytes, kind.format())
    })
    .await
    .map_err(|e| ImageError::InvalidImage {
        name: name.clone(),
        detail: format!("decoder task failed: {e}"),
    })?
    .map_err(|e| ImageError::InvalidImage {
        name: name.clone(),
        detail: format!("decode failed: {e}"),
    })?;

    debug!(
        "Loaded {} ({:?}, {}x{}, digest {})",
        name,
        kind,
        image.width(),
        image.height(),
        digest
    );

    Ok(LoadedImage {
        name,
        kind,
        digest,
        image,
    })
}

/// `true` when the path has one of the [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Expand the user's inputs into image sources, in order.
///
/// Files are taken as given, whatever their extension, so a mislabelled or
/// missing file still yields a row. Directories contribute their image files
/// (by extension, non-recursive), sorted by name so runs are reproducible.
pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<ImageSource>, ExtractError> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| ExtractError::InputUnreadable {
                path: input.clone(),
                source: e,
            })?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();
            debug!("{}: {} image files", input.display(), files.len());
            sources.extend(files.into_iter().map(ImageSource::Path));
        } else {
            sources.push(ImageSource::Path(input.clone()));
        }
    }
    Ok(sources)
}
