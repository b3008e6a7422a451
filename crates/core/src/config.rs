//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables while
//! handling an operation; the binary reads them once and builds a [`CoreConfig`].

use crate::constants::{DEFAULT_DATA_DIR, RECORD_FILENAME};
use crate::{DossierError, DossierResult};
use dossier_types::DossierId;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `DossierError::InvalidInput` if `data_dir` is empty.
    pub fn new(data_dir: PathBuf) -> DossierResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(DossierError::InvalidInput(
                "data_dir cannot be empty".into(),
            ));
        }

        Ok(Self { data_dir })
    }

    /// Root directory holding one sub-directory per dossier.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory owned by one dossier (record plus attachments).
    pub fn dossier_dir(&self, id: &DossierId) -> PathBuf {
        self.data_dir.join(id.as_str())
    }

    /// Location of the persisted record of one dossier.
    pub fn record_path(&self, id: &DossierId) -> PathBuf {
        self.dossier_dir(id).join(RECORD_FILENAME)
    }

    /// Base that persisted document references are relative to.
    ///
    /// Symlinks are resolved when the root exists, so it matches the paths handed out by the
    /// document store.
    pub fn document_root(&self) -> PathBuf {
        self.data_dir
            .canonicalize()
            .unwrap_or_else(|_| self.data_dir.clone())
    }

    /// Creates the data root if it does not exist yet.
    pub fn ensure_data_dir(&self) -> DossierResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(DossierError::StorageDirCreation)
    }
}

/// Resolve the data root from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATA_DIR`].
pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
