//! Notebook persistence: one JSON file per notebook.
//!
//! ```text
//! <data_dir>/
//!   ├── 6f1c…e2.json
//!   └── a90b…11.json
//! ```
//!
//! Writes go to a sibling temp file that is then renamed over the target,
//! so a crash mid-save leaves the previous version intact. There is no
//! stronger guarantee: the last save wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use notebridge_core::{Notebook, NotebookSummary, PageSize, Template};

const EXTENSION: &str = "json";

/// Storage errors.
#[derive(Debug)]
pub enum StoreError {
    /// Notebook file doesn't exist
    NotFound(String),
    /// Id would escape the data directory
    InvalidId(String),
    SerializationError(String),
    DeserializationError(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Notebook not found: {id}"),
            StoreError::InvalidId(id) => write!(f, "Invalid notebook id: {id:?}"),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
            StoreError::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            StoreError::IoError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::IoError(e)
    }
}

/// Directory of notebook files.
#[derive(Debug, Clone)]
pub struct NotebookStore {
    dir: PathBuf,
}

impl NotebookStore {
    /// Open (creating if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            log::info!("Created notebooks directory {}", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    /// Create a one-page notebook and save it.
    pub fn create(
        &self,
        name: impl Into<String>,
        page_size: PageSize,
        template: Template,
    ) -> Result<Notebook, StoreError> {
        let mut notebook = Notebook::new(name, page_size, template);
        self.save(&mut notebook)?;
        log::info!("Created notebook {} ({})", notebook.name, notebook.id);
        Ok(notebook)
    }

    /// Write `notebook`, stamping its `updated_at`.
    pub fn save(&self, notebook: &mut Notebook) -> Result<(), StoreError> {
        let path = self.path_for(&notebook.id)?;
        notebook.touch();

        let data = serde_json::to_vec_pretty(notebook)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        log::debug!("Saved notebook {} ({} bytes)", notebook.id, data.len());
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Notebook, StoreError> {
        let path = self.path_for(id)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data).map_err(|e| StoreError::DeserializationError(e.to_string()))
    }

    /// Summaries of every readable notebook, most recently updated first.
    ///
    /// Files that fail to parse are logged and skipped.
    pub fn list(&self) -> Result<Vec<NotebookSummary>, StoreError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|data| {
                    serde_json::from_slice::<Notebook>(&data)
                        .map_err(|e| StoreError::DeserializationError(e.to_string()))
                });
            match parsed {
                Ok(notebook) => summaries.push(notebook.summary()),
                Err(e) => log::error!("Failed to read notebook {}: {e}", path.display()),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Load, rename and save. Returns the updated notebook.
    pub fn rename(&self, id: &str, name: impl Into<String>) -> Result<Notebook, StoreError> {
        let mut notebook = self.load(id)?;
        notebook.rename(name);
        self.save(&mut notebook)?;
        Ok(notebook)
    }

    /// Delete a notebook. Returns `false` if it didn't exist.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted notebook {id}");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The most recently updated notebook, if any.
    pub fn load_most_recent(&self) -> Result<Option<Notebook>, StoreError> {
        match self.list()?.first() {
            Some(summary) => self.load(&summary.id).map(Some),
            None => Ok(None),
        }
    }
}
