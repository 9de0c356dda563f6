//! Persisted list of previously opened files.
//!
//! Only metadata is stored (name, size, upload time, page count), keyed by a
//! generated id, as a JSON array. Document bytes are never persisted; every
//! view or conversion starts from fresh bytes supplied by the caller.
//!
//! Saves go through a temp file in the same directory followed by a rename,
//! so a crash mid-save leaves the previous library intact.

use crate::error::Pdf2DocxError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Metadata of one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub page_count: Option<usize>,
}

/// Newest-first list of [`FileRecord`]s backed by a JSON file.
#[derive(Debug)]
pub struct FileLibrary {
    path: PathBuf,
    records: Vec<FileRecord>,
}

impl FileLibrary {
    /// `$PDF2DOCX_LIBRARY`, else `library.json` under the per-user data
    /// directory:
    ///
    /// - **macOS**: `~/Library/Application Support/pdf2docx/library.json`
    /// - **Linux**: `~/.local/share/pdf2docx/library.json`
    /// - **Windows**: `%APPDATA%\pdf2docx\library.json`
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("PDF2DOCX_LIBRARY").filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("pdf2docx").join("library.json")
    }

    /// Load the library at `path`. A missing file is an empty library.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Pdf2DocxError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Pdf2DocxError::LibraryFailed {
                    path: path.clone(),
                    detail: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(Pdf2DocxError::LibraryFailed {
                    path,
                    detail: e.to_string(),
                })
            }
        };
        debug!("Opened file library {} ({} records)", path.display(), records.len());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, newest first.
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Record a file uploaded at `uploaded_at`.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        size: u64,
        page_count: Option<usize>,
        uploaded_at: DateTime<Utc>,
    ) -> FileRecord {
        let record = FileRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            size,
            uploaded_at,
            page_count,
        };
        self.records.insert(0, record.clone());
        record
    }

    /// Forget `id`. Returns the removed record.
    pub fn remove(&mut self, id: Uuid) -> Option<FileRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Write the library back to its file.
    pub fn save(&self) -> Result<(), Pdf2DocxError> {
        let fail = |detail: String| Pdf2DocxError::LibraryFailed {
            path: self.path.clone(),
            detail,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| fail(e.to_string()))?;

        let json = serde_json::to_vec_pretty(&self.records).map_err(|e| fail(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| fail(e.to_string()))?;
        tmp.write_all(&json).map_err(|e| fail(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| fail(e.error.to_string()))?;

        info!("Saved file library ({} records)", self.records.len());
        Ok(())
    }
}

/// How long ago `then` was, relative to `now`: `Just now`, `5m ago`,
/// `3h ago`, `2d ago`.
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", elapsed.num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let ago = |d: Duration| format_relative_time(now - d, now);
        assert_eq!(ago(Duration::zero()), "Just now");
        assert_eq!(ago(Duration::seconds(59)), "Just now");
        assert_eq!(ago(Duration::minutes(5)), "5m ago");
        assert_eq!(ago(Duration::hours(3)), "3h ago");
        assert_eq!(ago(Duration::hours(50)), "2d ago");
        // Clock skew: future timestamps read as now.
        assert_eq!(format_relative_time(now + Duration::seconds(100), now), "Just now");
    }

    #[test]
    fn default_path_is_absolute_without_override() {
        if std::env::var_os("PDF2DOCX_LIBRARY").is_some() {
            return;
        }
        let path = FileLibrary::default_path();
        assert!(path.is_absolute(), "{}", path.display());
        assert!(path.ends_with("pdf2docx/library.json"));
    }

    #[test]
    fn add_remove_clear_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib").join("library.json");

        let mut lib = FileLibrary::open(&path).unwrap();
        assert!(lib.is_empty());
        let a = lib.add("a.pdf", 10, Some(2), Utc::now());
        let b = lib.add("b.pdf", 20, None, Utc::now());
        assert_ne!(a.id, b.id);
        assert_eq!(lib.records()[0].name, "b.pdf");
        lib.save().unwrap();

        let mut lib = FileLibrary::open(&path).unwrap();
        assert_eq!(lib.len(), 2);
        let stored = lib.get(a.id).unwrap();
        assert_eq!(stored.page_count, Some(2));
        assert_eq!(stored.uploaded_at, a.uploaded_at);
        assert_eq!(lib.remove(a.id).unwrap().name, "a.pdf");
        assert!(lib.remove(a.id).is_none());
        lib.clear();
        lib.save().unwrap();

        assert!(FileLibrary::open(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_library_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = FileLibrary::open(&path).unwrap_err();
        assert_eq!(err.kind(), "library_failed");
    }
}
