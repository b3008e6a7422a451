//! Directory index over persisted dossiers.
//!
//! The index has no storage of its own: it scans the data root every time it is asked. A
//! directory is a dossier when its name is a valid identifier and it holds a record file.
//! Records that cannot be read are logged and skipped, so one corrupt dossier never hides the
//! others.

use crate::config::CoreConfig;
use crate::error::{DossierError, DossierResult};
use crate::repositories::dossiers::{read_record, state_from_record};
use chrono::{DateTime, Utc};
use dossier_types::DossierId;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Projection of one dossier for listings and the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DossierSummary {
    pub identifier: DossierId,
    pub receiver_name: String,
    pub donor_name: String,
    pub tribunal_status: String,
    pub ministere_status: String,
    pub organisme_status: String,
    /// Last modification of the record file, when the filesystem reports it.
    pub modified_at: Option<DateTime<Utc>>,
}

/// What [`DossierIndex::search`] matches the query against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SearchBy {
    #[default]
    Identifier,
    /// Receiver full name, `nom prenom`.
    Name,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SearchMatch {
    pub identifier: DossierId,
    pub name: String,
}

/// Snapshot of the dossier directories present when it was taken, ordered by identifier.
///
/// Records are only read while iterating, and [`DossierListing::iter`] can be called again
/// to restart from the first dossier.
#[derive(Clone, Debug)]
pub struct DossierListing {
    root: PathBuf,
    entries: Vec<(DossierId, PathBuf)>,
}

impl DossierListing {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DossierSummary> + '_ {
        self.entries
            .iter()
            .filter_map(|(id, record_path)| summarise(id, record_path, &self.root))
    }
}

/// Unwraps one directory entry of the data root, logging entries that cannot be read.
fn readable_entry<T>(entry: io::Result<T>, root: &Path) -> Option<T> {
    match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(
                root = %root.display(),
                "skipping unreadable directory entry: {}",
                e
            );
            None
        }
    }
}

fn summarise(id: &DossierId, record_path: &Path, root: &Path) -> Option<DossierSummary> {
    let record = match read_record(record_path, id) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(dossier = %id, "skipping unreadable dossier record: {}", e);
            return None;
        }
    };
    let state = state_from_record(&record, record_path, root);

    let modified_at = fs::metadata(record_path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    Some(DossierSummary {
        identifier: id.clone(),
        receiver_name: state.receiver_full_name(),
        donor_name: state.donor_full_name(),
        tribunal_status: state.text("accord_tribunal").to_string(),
        ministere_status: state.text("accord_ministere").to_string(),
        organisme_status: state.text("organisme_accord_statut").to_string(),
        modified_at,
    })
}

/// Lists, searches and deletes persisted dossiers.
#[derive(Clone, Debug)]
pub struct DossierIndex {
    cfg: Arc<CoreConfig>,
}

impl DossierIndex {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Enumerates the dossiers under the data root.
    ///
    /// A missing data root is an empty listing. Directories whose name is not a valid
    /// identifier are logged and skipped; directories without a record are skipped silently.
    ///
    /// # Errors
    ///
    /// `FileRead` if the data root exists but cannot be read.
    pub fn list_all(&self) -> DossierResult<DossierListing> {
        let dir_iter = match fs::read_dir(self.cfg.data_dir()) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(DossierListing {
                    root: self.cfg.document_root(),
                    entries: Vec::new(),
                })
            }
            Err(e) => return Err(DossierError::FileRead(e)),
        };

        let mut entries = Vec::new();
        for entry in dir_iter {
            let Some(entry) = readable_entry(entry, self.cfg.data_dir()) else {
                continue;
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let id = match name.to_str().map(DossierId::parse) {
                Some(Ok(id)) => id,
                _ => {
                    tracing::warn!(
                        directory = %path.display(),
                        "skipping directory that is not a dossier identifier"
                    );
                    continue;
                }
            };

            let record_path = self.cfg.record_path(&id);
            if record_path.is_file() {
                entries.push((id, record_path));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(DossierListing {
            root: self.cfg.document_root(),
            entries,
        })
    }

    /// Case-insensitive substring search over the listing.
    ///
    /// The query is trimmed; an empty query matches nothing. Matches come back in listing
    /// order.
    pub fn search(&self, query: &str, by: SearchBy) -> DossierResult<Vec<SearchMatch>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let listing = self.list_all()?;
        let matches = listing
            .iter()
            .filter(|summary| {
                let haystack = match by {
                    SearchBy::Identifier => summary.identifier.as_str().to_lowercase(),
                    SearchBy::Name => summary.receiver_name.to_lowercase(),
                };
                haystack.contains(&needle)
            })
            .map(|summary| SearchMatch {
                identifier: summary.identifier,
                name: summary.receiver_name,
            })
            .collect();

        Ok(matches)
    }

    /// Removes a dossier: its record and every attachment.
    ///
    /// This cannot be undone; callers confirm with the operator first.
    ///
    /// # Errors
    ///
    /// - `MissingIdentifier`/`InvalidIdentifier` for an unusable identifier
    /// - `RecordNotFound` if the dossier has no record
    /// - `FileDelete` if the directory cannot be removed
    pub fn delete(&self, identifier: &str) -> DossierResult<()> {
        let id = DossierId::parse(identifier.trim())?;
        if !self.cfg.record_path(&id).is_file() {
            return Err(DossierError::RecordNotFound(id.to_string()));
        }

        let dossier_dir = self.cfg.dossier_dir(&id);
        fs::remove_dir_all(&dossier_dir).map_err(DossierError::FileDelete)?;

        tracing::info!(dossier = %id, path = %dossier_dir.display(), "dossier deleted");
        Ok(())
    }
}
