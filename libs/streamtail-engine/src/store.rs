//! Where a tail loop keeps its cursor between runs.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use streamtail_api::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cursor file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cursor file {path}: invalid content '{content}'")]
    Corrupt { path: PathBuf, content: String },
}

/// Persistence for one stream's cursor.
pub trait CursorStore: Send {
    /// Last saved cursor, `None` when nothing was ever saved.
    fn load(&mut self) -> Result<Option<RecordId>, StoreError>;

    fn save(&mut self, id: RecordId) -> Result<(), StoreError>;
}

/// Keeps the cursor for the lifetime of the process only. A restart
/// replays the stream from the configured start.
#[derive(Debug, Default, Clone)]
pub struct MemoryCursorStore {
    saved: Option<RecordId>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<RecordId> {
        self.saved
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&mut self) -> Result<Option<RecordId>, StoreError> {
        Ok(self.saved)
    }

    fn save(&mut self, id: RecordId) -> Result<(), StoreError> {
        self.saved = Some(id);
        Ok(())
    }
}

/// Single-line text file holding `<ms>-<seq>`. Written to a sibling temp
/// file then renamed over the target, so a crash never leaves a torn id.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&mut self) -> Result<Option<RecordId>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<RecordId>()
            .map(Some)
            .map_err(|_| StoreError::Corrupt {
                path: self.path.clone(),
                content: trimmed.to_string(),
            })
    }

    fn save(&mut self, id: RecordId) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| self.io_err(e))?;
        writeln!(file, "{id}").map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_err(e))
    }
}
