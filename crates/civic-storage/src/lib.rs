use chrono::{DateTime, Local};
use civic_core::Issue;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub mod accounts;
pub mod document;
pub mod integrity;

pub use accounts::{AccountError, AccountStore};
pub use document::{IssueDocument, Record, SkippedRecord};
pub use integrity::IntegrityReport;

pub const ISSUES_FILE: &str = "issues.json";
pub const BACKUP_DIR: &str = "backups";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("{} is not a valid JSON document: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backup not found: {}", .0.display())]
    BackupNotFound(PathBuf),
}

/// Handle on the flat JSON issues document. Every mutation rewrites the whole
/// file; nothing guards against a second writer doing the same.
#[derive(Debug, Clone)]
pub struct IssueStore {
    path: PathBuf,
}

impl IssueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(ISSUES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Absent document → empty collection; a document that is not a JSON
    /// array → [`StoreError::Corrupt`]; array entries that are not issues are
    /// left out and logged. Use [`IssueStore::load_document`] to keep them.
    pub fn load(&self) -> Result<Vec<Issue>, StoreError> {
        Ok(self.load_document()?.into_issues())
    }

    /// Every record of the document in file order, unreadable ones included.
    pub fn load_document(&self) -> Result<IssueDocument, StoreError> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(IssueDocument::default());
        };
        let raw = parse_array(&self.path, &content)?;
        Ok(IssueDocument::decode(&self.path, raw))
    }

    /// Lenient form of [`IssueStore::load`] for read-only views: any failure
    /// is logged and reads as an empty collection.
    pub fn load_or_empty(&self) -> Vec<Issue> {
        match self.load() {
            Ok(issues) => issues,
            Err(err) => {
                warn!(error = %err, "issue store unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Writes exactly `issues`. Mutations of an existing document go through
    /// [`IssueStore::save_document`] instead.
    pub fn save(&self, issues: &[Issue]) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &issues)
    }

    pub fn save_document(&self, document: &IssueDocument) -> Result<(), StoreError> {
        write_json_atomic(&self.path, document)
    }

    pub fn append(&self, issue: Issue) -> Result<(), StoreError> {
        let mut document = self.load_document()?;
        let id = issue.id.clone();
        document.push(issue);
        self.save_document(&document)?;
        info!(issue_id = %id, total = document.len(), "issue saved");
        Ok(())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir().join(BACKUP_DIR)
    }

    /// Copies the current document to `backups/issues_<stamp>.json` next to
    /// it and returns the backup path.
    pub fn backup(&self, now: DateTime<Local>) -> Result<PathBuf, StoreError> {
        let document = self.load_document()?;
        let backup_path = self
            .backup_dir()
            .join(format!("issues_{}.json", now.format("%Y%m%d_%H%M%S")));
        write_json_atomic(&backup_path, &document)?;
        info!(path = %backup_path.display(), total = document.len(), "issues backed up");
        Ok(backup_path)
    }

    /// Replaces the document with the contents of a backup. Returns the
    /// number of issues restored.
    pub fn restore(&self, backup_path: &Path) -> Result<usize, StoreError> {
        let Some(content) = read_optional(backup_path)? else {
            return Err(StoreError::BackupNotFound(backup_path.to_path_buf()));
        };
        let document = IssueDocument::decode(backup_path, parse_array(backup_path, &content)?);
        self.save_document(&document)?;
        let restored = document.issue_count();
        info!(
            path = %backup_path.display(),
            restored,
            unreadable = document.len() - restored,
            "issues restored from backup"
        );
        Ok(restored)
    }

    pub fn validate(&self) -> Result<IntegrityReport, StoreError> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(IntegrityReport::default());
        };
        let raw = parse_array(&self.path, &content)?;
        Ok(IntegrityReport::from_records(&raw))
    }

    fn data_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_array(path: &Path, content: &str) -> Result<Vec<Value>, StoreError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Value>>(content).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-prints `value` to a temp sibling and renames it over `path`,
/// creating the parent directory first.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let payload = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(|source| StoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
