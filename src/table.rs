//! The session's result table: append-only rows, pagination and export.

use crate::error::ExtractError;
use crate::record::CourseRecord;
use crate::schema;
use std::ops::Range;
use std::path::Path;

/// Page sizes offered to the user.
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [5, 10, 25, 50];

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Number of pages needed for `len` rows. Never less than one.
pub fn total_pages(len: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    len.div_ceil(size).max(1)
}

/// Index range of 1-based `page` within `len` items.
///
/// Page 0 is treated as page 1 and pages past the end clamp to the last page,
/// so the result is always a valid (possibly empty) slice range.
pub fn page_bounds(len: usize, page: usize, page_size: usize) -> Range<usize> {
    let size = page_size.max(1);
    let page = page.clamp(1, total_pages(len, size));
    let start = ((page - 1) * size).min(len);
    let end = (start + size).min(len);
    start..end
}

/// One page of records.
#[derive(Debug, Clone, Copy)]
pub struct TablePage<'a> {
    /// 1-based page number actually shown (after clamping).
    pub number: usize,
    pub total_pages: usize,
    pub records: &'a [CourseRecord],
}

/// Ordered, append-only collection of extracted records.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<CourseRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalised record. Rows are never edited or removed.
    pub fn push(&mut self, record: CourseRecord) {
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.rows.iter()
    }

    /// Header row: `Source File` then the schema fields.
    pub fn columns(&self) -> [&'static str; 8] {
        schema::columns()
    }

    pub fn total_pages(&self, page_size: usize) -> usize {
        total_pages(self.rows.len(), page_size)
    }

    /// The rows on 1-based `page`.
    pub fn page(&self, page: usize, page_size: usize) -> TablePage<'_> {
        let bounds = page_bounds(self.rows.len(), page, page_size);
        let size = page_size.max(1);
        TablePage {
            number: bounds.start / size + 1,
            total_pages: self.total_pages(size),
            records: &self.rows[bounds],
        }
    }

    /// Render the table as CSV. Nulls become empty fields.
    pub fn to_csv(&self) -> Result<String, ExtractError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(schema::columns())
            .map_err(|e| ExtractError::Export(e.to_string()))?;
        for record in &self.rows {
            wtr.write_record(record.cells().map(|c| c.unwrap_or("")))
                .map_err(|e| ExtractError::Export(e.to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| ExtractError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ExtractError::Export(e.to_string()))
    }

    /// Render the table as a pretty JSON array with explicit nulls.
    pub fn to_json(&self) -> Result<String, ExtractError> {
        serde_json::to_string_pretty(&self.rows).map_err(|e| ExtractError::Export(e.to_string()))
    }

    /// Write the CSV export to `path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let csv = self.to_csv()?;
        write_atomic(path.as_ref(), csv.as_bytes()).await
    }

    /// Write the JSON export to `path`, atomically.
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        let json = self.to_json()?;
        write_atomic(path.as_ref(), json.as_bytes()).await
    }
}

impl Extend<CourseRecord> for ResultTable {
    fn extend<I: IntoIterator<Item = CourseRecord>>(&mut self, iter: I) {
        self.rows.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a CourseRecord;
    type IntoIter = std::slice::Iter<'a, CourseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExtractError> {
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
