// # File Record Store
//
// File-based implementation of RecordStore: one table of registrations in a
// JSON sheet document.
//
// ## Purpose
//
// Durable storage for accepted registrations, readable by people and
// spreadsheet tooling alike. The medium is created lazily on first append.
//
// ## Write Safety
//
// - Serialized appends: one async mutex per medium, shared process-wide by
//   absolute path, guards the whole read/check/write sequence
// - Atomic writes: new sheet written to a temporary file, then renamed
// - Backup: the previous sheet is kept as `.backup` before each replace
// - Corruption: a sheet that fails to parse is never overwritten
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sheet": "Users",
//   "columns": ["Name", "Contact", "Email", "Course", "Country", "University", "Date"],
//   "rows": [
//     ["Jane Doe", "+1 555 123 4567", "jane@x.com", "CS", "USA", "MIT", "2025-01-09T12:00:00+00:00"]
//   ]
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::record_store::{
    AppendOutcome, COLUMNS, CONTACT_COLUMN, CandidateRecord, EMAIL_COLUMN, RecordStore,
    RecordStoreFactory, RegistrationRecord,
};

/// Sheet file format version
const SHEET_FILE_VERSION: &str = "1.0";

/// Name of the single table in the document
const SHEET_NAME: &str = "Users";

/// Append locks, one per medium
static MEDIUM_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

/// Get the append lock for the medium at `path`
///
/// Every store instance pointing at the same file shares one lock.
fn medium_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = MEDIUM_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(key).or_default().clone()
}

/// Whether an I/O error means another program holds the file
fn is_lock_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock | io::ErrorKind::ResourceBusy
    ) || (cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33)))
}

/// Serializable sheet document
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SheetDocument {
    version: String,
    sheet: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SheetDocument {
    fn new() -> Self {
        Self {
            version: SHEET_FILE_VERSION.to_string(),
            sheet: SHEET_NAME.to_string(),
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// `(email, contact)` cells of every row
    fn unique_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().map(|row| {
            let email = row.get(EMAIL_COLUMN).map_or("", String::as_str);
            let contact = row.get(CONTACT_COLUMN).map_or("", String::as_str);
            (email, contact)
        })
    }
}

/// File-based record store
///
/// # Example
///
/// ```rust,no_run
/// use intake_core::store::FileRecordStore;
/// use intake_core::traits::{AppendOutcome, CandidateRecord, RecordStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/intake/user_data.json");
///     let candidate = CandidateRecord {
///         name: "Jane Doe".into(),
///         contact: "9876543210".into(),
///         email: "jane@x.com".into(),
///         course: "CS".into(),
///         country: "USA".into(),
///         university: "MIT".into(),
///     };
///
///     // Creates the sheet on first use
///     let outcome = store.append(candidate).await?;
///     assert!(matches!(outcome, AppendOutcome::Inserted(_)));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
    medium_lock: Arc<Mutex<()>>,
}

impl FileRecordStore {
    /// Create a store for the sheet at `path`
    ///
    /// No I/O happens until the first call.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let medium_lock = medium_lock(&path);
        Self { path, medium_lock }
    }

    /// Path of the sheet file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name shown to users when the medium is locked
    pub fn medium_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Map an I/O failure to a storage error
    fn io_error(&self, action: &str, path: &Path, err: io::Error) -> Error {
        if is_lock_error(&err) {
            tracing::error!("Sheet {} is locked ({}): {}", path.display(), action, err);
            Error::storage_locked(self.medium_name())
        } else {
            Error::storage(format!(
                "Failed to {} {}: {}",
                action,
                path.display(),
                err
            ))
        }
    }

    /// Load the sheet, or `None` if the medium does not exist yet
    async fn load_sheet(&self) -> Result<Option<SheetDocument>, Error> {
        let exists = fs::try_exists(&self.path)
            .await
            .map_err(|e| self.io_error("check", &self.path, e))?;
        if !exists {
            tracing::debug!("Sheet does not exist yet: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error("read", &self.path, e))?;

        let sheet: SheetDocument = serde_json::from_str(&content).map_err(|e| {
            Error::storage(format!(
                "Failed to parse sheet {}: {}. \
                File may be corrupted. Try restoring from {}.",
                self.path.display(),
                e,
                Self::backup_path(&self.path).display()
            ))
        })?;

        if sheet.version != SHEET_FILE_VERSION {
            tracing::warn!(
                "Sheet version mismatch: expected {}, got {}. Attempting to load anyway.",
                SHEET_FILE_VERSION,
                sheet.version
            );
        }

        if sheet.columns.iter().map(String::as_str).ne(COLUMNS) {
            return Err(Error::storage(format!(
                "Sheet {} has unexpected columns {:?}",
                self.path.display(),
                sheet.columns
            )));
        }

        Ok(Some(sheet))
    }

    /// Write the sheet atomically
    async fn write_sheet(&self, sheet: &SheetDocument) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error("create directory", parent, e))?;
        }

        let json = serde_json::to_string_pretty(sheet)
            .map_err(|e| Error::storage(format!("Failed to serialize sheet: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| self.io_error("create", &temp_path, e))?;

            file.write_all(json.as_bytes())
                .await
                .map_err(|e| self.io_error("write", &temp_path, e))?;

            file.sync_all()
                .await
                .map_err(|e| self.io_error("sync", &temp_path, e))?;
        }

        // Keep the previous sheet as backup
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error("replace", &self.path, e))?;

        tracing::trace!("Sheet written to file: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        Self::sibling_path(&self.path, "tmp")
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        Self::sibling_path(path, "backup")
    }

    /// `path` with `.suffix` appended to the full file name
    fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        path.with_file_name(name)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn append(&self, candidate: CandidateRecord) -> Result<AppendOutcome, Error> {
        let _guard = self.medium_lock.lock().await;

        let mut sheet = match self.load_sheet().await? {
            Some(sheet) => sheet,
            None => {
                tracing::info!("Creating sheet {}", self.path.display());
                SheetDocument::new()
            }
        };

        if let Some(field) = super::find_duplicate(&candidate, sheet.unique_keys()) {
            tracing::debug!("Duplicate {} rejected: {}", field, candidate.email);
            return Ok(AppendOutcome::Duplicate { field });
        }

        let record = candidate.into_record(chrono::Utc::now());
        sheet.rows.push(record.to_row());
        self.write_sheet(&sheet).await?;

        tracing::debug!(
            "Appended row {} to {}",
            sheet.rows.len(),
            self.path.display()
        );
        Ok(AppendOutcome::Inserted(record))
    }

    async fn records(&self) -> Result<Vec<RegistrationRecord>, Error> {
        match self.load_sheet().await? {
            Some(sheet) => sheet
                .rows
                .iter()
                .map(|row| RegistrationRecord::from_row(row))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every append is written before it returns
        Ok(())
    }

    fn descriptor(&self) -> &'static str {
        "tabular-file"
    }
}

/// Factory for the `file` store type
#[derive(Debug, Default)]
pub struct FileRecordStoreFactory;

impl RecordStoreFactory for FileRecordStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileRecordStore::new(path))),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
