//! Dossier document attachments.
//!
//! Binds the low-level [`FilesService`] to the field registry: a document is always stored for
//! one registered slot of one dossier, and the slot's reference in the [`DossierState`] is only
//! updated once the file is on disk.

use crate::config::CoreConfig;
use crate::error::{DossierError, DossierResult};
use crate::registry::{FieldKind, FieldRegistry};
use crate::state::DossierState;
use dossier_files::{DocumentCategory, FilesService, StoredDocument};
use dossier_types::DossierId;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stores and reads the attachments of dossiers under the configured data root.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    files: FilesService,
}

impl DocumentStore {
    /// Opens the document store, creating the data root if needed.
    ///
    /// # Errors
    ///
    /// `StorageDirCreation` if the root cannot be created, `Files` if it is not a usable
    /// directory.
    pub fn new(cfg: Arc<CoreConfig>) -> DossierResult<Self> {
        cfg.ensure_data_dir()?;
        let files = FilesService::new(cfg.data_dir())?;
        Ok(Self { files })
    }

    /// Stores `bytes` as `filename` for document `slot` of the dossier held in `state`.
    ///
    /// The identifier is validated before anything touches the filesystem. Re-uploading the
    /// same filename replaces the file; a new filename is stored alongside and the slot then
    /// references the newest one.
    ///
    /// # Errors
    ///
    /// - `UnknownField` if `slot` is not registered, `TypeMismatch` if it is not a document slot
    /// - `MissingIdentifier`/`InvalidIdentifier` for an unusable identifier
    /// - `Files` if the filename is rejected or the write fails; `state` is left untouched
    pub fn store(
        &self,
        state: &mut DossierState,
        slot: &str,
        filename: &str,
        bytes: &[u8],
    ) -> DossierResult<StoredDocument> {
        let spec = FieldRegistry::lookup(slot)?;
        let FieldKind::Document(category) = spec.kind else {
            return Err(DossierError::TypeMismatch {
                field: spec.name,
                expected: "document",
            });
        };
        let dossier_id = state.dossier_id()?;

        let stored = self.files.store(&dossier_id, category, filename, bytes)?;
        for other in slots_sharing(state, &stored.path, spec.name) {
            tracing::warn!(
                dossier = %dossier_id,
                slot = spec.name,
                other,
                document = %stored.path.display(),
                "upload replaced a document another slot still references"
            );
        }
        state.set_document(spec, stored.path.clone());

        Ok(stored)
    }

    /// Files currently present in one category directory of a dossier, sorted by name.
    pub fn documents(
        &self,
        dossier_id: &DossierId,
        category: DocumentCategory,
    ) -> DossierResult<Vec<PathBuf>> {
        Ok(self.files.list(dossier_id, category)?)
    }

    /// Reads back a stored document. Paths outside the data root are refused.
    pub fn read(&self, path: &Path) -> DossierResult<Vec<u8>> {
        Ok(self.files.read(path)?)
    }

    pub fn root_directory(&self) -> &Path {
        self.files.root_directory()
    }
}

/// Document slots other than `slot` that reference `path`.
fn slots_sharing<'a>(
    state: &'a DossierState,
    path: &'a Path,
    slot: &'a str,
) -> impl Iterator<Item = &'static str> + 'a {
    state
        .fields()
        .filter(move |(spec, value)| spec.name != slot && value.as_document() == Some(path))
        .map(|(spec, _)| spec.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IDENTIFIER_FIELD;
    use dossier_files::FilesError;
    use std::fs;
    use tempfile::TempDir;

    fn test_store(temp: &TempDir) -> DocumentStore {
        let cfg = CoreConfig::new(temp.path().join("uploads")).expect("valid config");
        DocumentStore::new(Arc::new(cfg)).expect("DocumentStore::new should succeed")
    }

    fn state_with_id(id: &str) -> DossierState {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, id).unwrap();
        state
    }

    #[test]
    fn test_new_creates_data_root() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        assert!(store.root_directory().is_dir());
    }

    #[test]
    fn test_store_updates_slot_reference() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = state_with_id("IPP-001");

        let stored = store
            .store(&mut state, "admin_doc_cin_pere", "cin.pdf", b"%PDF-1.4")
            .expect("store should succeed");

        assert!(stored.path.ends_with("IPP-001/tribunal/cin.pdf"));
        assert_eq!(state.document("admin_doc_cin_pere"), Some(stored.path.as_path()));
        assert_eq!(store.read(&stored.path).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_store_without_identifier_writes_nothing() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = DossierState::new();

        let err = store
            .store(&mut state, "ministere_doc_rapport_medical", "rapport.pdf", b"data")
            .unwrap_err();

        assert!(matches!(err, DossierError::MissingIdentifier));
        assert_eq!(state.document("ministere_doc_rapport_medical"), None);
        let entries: Vec<_> = fs::read_dir(store.root_directory()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_store_rejects_non_document_slot() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = state_with_id("IPP-001");

        let err = store
            .store(&mut state, "receveur_nom", "cin.pdf", b"data")
            .unwrap_err();

        assert!(matches!(err, DossierError::TypeMismatch { field: "receveur_nom", .. }));
    }

    #[test]
    fn test_failed_store_keeps_previous_reference() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = state_with_id("IPP-001");
        let first = store
            .store(&mut state, "organisme_accord_document", "accord.png", b"png")
            .unwrap();

        let err = store
            .store(&mut state, "organisme_accord_document", "accord.exe", b"MZ")
            .unwrap_err();

        assert!(matches!(
            err,
            DossierError::Files(FilesError::UnsupportedDocumentType(_))
        ));
        assert_eq!(state.document("organisme_accord_document"), Some(first.path.as_path()));
    }

    #[test]
    fn test_same_filename_in_two_slots_is_detected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = state_with_id("IPP-001");

        let father = store
            .store(&mut state, "admin_doc_cin_pere", "scan.pdf", b"FATHER")
            .unwrap();
        assert_eq!(
            slots_sharing(&state, &father.path, "admin_doc_cin_mere").collect::<Vec<_>>(),
            vec!["admin_doc_cin_pere"]
        );

        let mother = store
            .store(&mut state, "admin_doc_cin_mere", "scan.pdf", b"MOTHER")
            .unwrap();

        assert_eq!(mother.path, father.path);
        assert_eq!(store.read(&father.path).unwrap(), b"MOTHER");
        assert_eq!(
            slots_sharing(&state, &mother.path, "admin_doc_cin_pere").collect::<Vec<_>>(),
            vec!["admin_doc_cin_mere"]
        );
        assert_eq!(slots_sharing(&state, &mother.path, "admin_doc_cin_mere").count(), 1);
    }

    #[test]
    fn test_new_filename_is_stored_alongside() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = test_store(&temp);
        let mut state = state_with_id("IPP-001");

        store
            .store(&mut state, "admin_doc_cin_mere", "cin-v1.pdf", b"one")
            .unwrap();
        let second = store
            .store(&mut state, "admin_doc_cin_mere", "cin-v2.pdf", b"two")
            .unwrap();

        let id = state.dossier_id().unwrap();
        let listed = store.documents(&id, DocumentCategory::Tribunal).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(state.document("admin_doc_cin_mere"), Some(second.path.as_path()));
    }
}
