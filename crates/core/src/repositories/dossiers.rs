//! Dossier record persistence.
//!
//! Each dossier is persisted as one flat JSON object in its own directory:
//!
//! ```text
//! <data_root>/
//!   <identifier>/
//!     patient_data.json    # every registered field, keyed by its registry name
//!     tribunal/ ministere/ organisme/
//! ```
//!
//! Document references are stored relative to the data root (`IPP-001/tribunal/cin.pdf`).
//! Absolute references written by older records are still accepted.
//!
//! Saving writes the full record to a temporary sibling and renames it into place, so a
//! reader never observes a half-written record. Loading is strict about the record as a whole
//! and lenient per field: a field that cannot be decoded keeps its default and is logged.
//!
//! There is no locking. Two sessions saving the same identifier race and the last write wins.

use crate::config::CoreConfig;
use crate::constants::RECORD_PARTIAL_SUFFIX;
use crate::error::{DossierError, DossierResult};
use crate::registry::{FieldKind, FieldRegistry, FieldValue, IDENTIFIER_FIELD};
use crate::state::DossierState;
use crate::wizard::Stage;
use dossier_types::DossierId;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads and writes dossier records under the configured data root.
#[derive(Clone, Debug)]
pub struct DossierRepository {
    cfg: Arc<CoreConfig>,
}

impl DossierRepository {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Whether a record exists for `id`.
    pub fn exists(&self, id: &DossierId) -> bool {
        self.cfg.record_path(id).is_file()
    }

    /// Persists every registered field of `state`, replacing any existing record in full.
    ///
    /// Control fields (current stage, edit mode, active page) are never written.
    ///
    /// # Errors
    ///
    /// - `MissingIdentifier`/`InvalidIdentifier` before anything is written
    /// - `StorageDirCreation` if the dossier directory cannot be created
    /// - `Serialization` or `FileWrite` if the record cannot be written
    pub fn save(&self, state: &DossierState) -> DossierResult<DossierId> {
        let id = state.dossier_id()?;
        let record_path = self.cfg.record_path(&id);

        if !state.edit_mode() && record_path.is_file() {
            tracing::warn!(
                dossier = %id,
                "new dossier replaces an existing record with the same identifier"
            );
        }

        let root = self.cfg.document_root();
        let record: Map<String, Value> = state
            .fields()
            .map(|(spec, value)| (spec.name.to_string(), spec.encode(value, &root)))
            .collect();
        let raw = serde_json::to_string_pretty(&Value::Object(record))
            .map_err(DossierError::Serialization)?;

        fs::create_dir_all(self.cfg.dossier_dir(&id)).map_err(DossierError::StorageDirCreation)?;
        write_replacing(&record_path, raw.as_bytes())?;

        tracing::info!(dossier = %id, path = %record_path.display(), "dossier saved");
        Ok(id)
    }

    /// Loads the record of `identifier` into a fresh state in edit mode.
    ///
    /// Unknown keys are ignored. A field whose stored value cannot be decoded keeps its
    /// default, and a document reference whose file has disappeared is dropped; both are
    /// logged. The returned state is on the first stage with the identifier locked.
    ///
    /// # Errors
    ///
    /// - `MissingIdentifier`/`InvalidIdentifier` for an unusable identifier
    /// - `RecordNotFound` if no record exists
    /// - `MalformedRecord` if the record is not a JSON object
    /// - `FileRead` for other I/O failures
    pub fn load(&self, identifier: &str) -> DossierResult<DossierState> {
        let id = DossierId::parse(identifier.trim())?;
        let record_path = self.cfg.record_path(&id);
        let record = read_record(&record_path, &id)?;

        let mut state = state_from_record(&record, &record_path, &self.cfg.document_root());
        if let Some(spec) = FieldRegistry::get(IDENTIFIER_FIELD) {
            state.overlay(spec, FieldValue::Text(id.as_str().to_string()));
        }
        state.set_edit_mode(true);
        state.set_current_step(Stage::Receveur);

        tracing::info!(dossier = %id, "dossier loaded");
        Ok(state)
    }
}

/// Reads a record file and checks that it holds a JSON object.
pub(crate) fn read_record(path: &Path, id: &DossierId) -> DossierResult<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DossierError::RecordNotFound(id.to_string()))
        }
        Err(e) => return Err(DossierError::FileRead(e)),
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(DossierError::MalformedRecord {
            path: path.to_path_buf(),
            reason: "record is not a JSON object".into(),
        }),
        Err(e) => Err(DossierError::MalformedRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Overlays the registered keys of `record` onto a default state. Relative document
/// references are resolved against `root`.
pub(crate) fn state_from_record(
    record: &Map<String, Value>,
    path: &Path,
    root: &Path,
) -> DossierState {
    let mut state = DossierState::new();

    for spec in FieldRegistry::all() {
        let Some(raw) = record.get(spec.name) else {
            continue;
        };

        let value = match spec.decode(raw, root) {
            Ok(value) => value,
            Err(reason) => {
                tracing::warn!(
                    field = spec.name,
                    path = %path.display(),
                    "keeping default for undecodable field: {}",
                    reason
                );
                continue;
            }
        };

        if let (FieldKind::Document(_), Some(doc)) = (spec.kind, value.as_document()) {
            if !doc.is_file() {
                tracing::warn!(
                    field = spec.name,
                    document = %doc.display(),
                    "dropping reference to missing document"
                );
                continue;
            }
        }

        state.overlay(spec, value);
    }

    state
}

fn write_replacing(target: &Path, contents: &[u8]) -> DossierResult<()> {
    let mut partial = target.as_os_str().to_owned();
    partial.push(RECORD_PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    if let Err(e) = fs::write(&partial, contents) {
        let _ = fs::remove_file(&partial);
        return Err(DossierError::FileWrite(e));
    }

    fs::rename(&partial, target).map_err(|e| {
        let _ = fs::remove_file(&partial);
        DossierError::FileWrite(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RECORD_FILENAME;
    use crate::documents::DocumentStore;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn test_cfg(temp: &TempDir) -> Arc<CoreConfig> {
        Arc::new(CoreConfig::new(temp.path().to_path_buf()).expect("CoreConfig::new should succeed"))
    }

    fn sample_state() -> DossierState {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, "IPP-001").unwrap();
        state.set("receveur_nom", "Ali Ben").unwrap();
        state.set("receveur_groupage", "AB-").unwrap();
        state.set("receveur_age_pere", 61i64).unwrap();
        state
            .set("donneur_date_naissance", NaiveDate::from_ymd_opt(1990, 7, 14).unwrap())
            .unwrap();
        state.set("medical_exam_fish", true).unwrap();
        state.set("accord_tribunal", "Accordé").unwrap();
        state
    }

    fn write_raw_record(temp: &TempDir, id: &str, contents: &str) -> PathBuf {
        let dir = temp.path().join(id);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(RECORD_FILENAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_save_writes_flat_record() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));

        let id = repo.save(&sample_state()).expect("save should succeed");

        let raw = fs::read_to_string(temp.path().join("IPP-001").join(RECORD_FILENAME)).unwrap();
        let record: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(id.as_str(), "IPP-001");
        assert_eq!(record["receveur_ipp"], "IPP-001");
        assert_eq!(record["receveur_nom"], "Ali Ben");
        assert_eq!(record["receveur_age_pere"], 61);
        assert_eq!(record["donneur_date_naissance"], "1990-07-14");
        assert_eq!(record["medical_exam_fish"], true);
        assert_eq!(record["admin_doc_cin_pere"], Value::Null);
        assert!(record.get("current_step").is_none());
        assert!(record.get("edit_mode").is_none());
        assert_eq!(
            record.as_object().unwrap().len(),
            FieldRegistry::all().len()
        );
    }

    #[test]
    fn test_save_without_identifier_writes_nothing() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));

        let err = repo.save(&DossierState::new()).unwrap_err();

        assert!(matches!(err, DossierError::MissingIdentifier));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_leaves_no_partial_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));

        repo.save(&sample_state()).unwrap();

        let names: Vec<_> = fs::read_dir(temp.path().join("IPP-001"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(RECORD_FILENAME)]);
    }

    #[test]
    fn test_load_round_trips_every_field() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        let original = sample_state();
        repo.save(&original).unwrap();

        let loaded = repo.load("IPP-001").expect("load should succeed");

        for (spec, value) in original.fields() {
            assert_eq!(loaded.get(spec.name).unwrap(), value, "{}", spec.name);
        }
        assert!(loaded.edit_mode());
        assert_eq!(loaded.current_step(), Stage::Receveur);
    }

    #[test]
    fn test_load_missing_record() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));

        let err = repo.load("IPP-404").unwrap_err();

        assert!(matches!(err, DossierError::RecordNotFound(id) if id == "IPP-404"));
    }

    #[test]
    fn test_load_rejects_corrupt_record() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        write_raw_record(&temp, "IPP-002", "{ not json");
        write_raw_record(&temp, "IPP-003", "[1, 2, 3]");

        assert!(matches!(
            repo.load("IPP-002"),
            Err(DossierError::MalformedRecord { .. })
        ));
        assert!(matches!(
            repo.load("IPP-003"),
            Err(DossierError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_load_keeps_default_for_bad_date() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        write_raw_record(
            &temp,
            "IPP-004",
            r#"{
                "receveur_ipp": "IPP-004",
                "receveur_nom": "Ben",
                "receveur_date_naissance": "30/02/2001",
                "donneur_date_naissance": "1985-11-02T10:15:00",
                "receveur_age_mere": "quarante",
                "receveur_sexe": "Inconnu",
                "champ_obsolete": 42
            }"#,
        );

        let state = repo.load("IPP-004").expect("lenient load should succeed");

        assert_eq!(
            state.get("receveur_date_naissance").unwrap().as_date(),
            NaiveDate::from_ymd_opt(2000, 1, 1)
        );
        assert_eq!(
            state.get("donneur_date_naissance").unwrap().as_date(),
            NaiveDate::from_ymd_opt(1985, 11, 2)
        );
        assert_eq!(state.get("receveur_age_mere").unwrap().as_int(), Some(0));
        assert_eq!(state.text("receveur_sexe"), "Homme");
        assert_eq!(state.text("receveur_nom"), "Ben");
    }

    #[test]
    fn test_load_sets_identifier_from_key() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        write_raw_record(&temp, "IPP-005", r#"{"receveur_ipp": "autre"}"#);

        let state = repo.load(" IPP-005 ").unwrap();

        assert_eq!(state.identifier(), "IPP-005");
    }

    #[test]
    fn test_load_drops_missing_document_paths() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        let present = temp.path().join("IPP-006").join("tribunal").join("cin.pdf");
        fs::create_dir_all(present.parent().unwrap()).unwrap();
        fs::write(&present, b"%PDF").unwrap();
        let record = serde_json::json!({
            "receveur_ipp": "IPP-006",
            "admin_doc_cin_pere": present,
            "admin_doc_cin_mere": temp.path().join("IPP-006/tribunal/gone.pdf"),
        });
        write_raw_record(&temp, "IPP-006", &record.to_string());

        let state = repo.load("IPP-006").unwrap();

        assert_eq!(state.document("admin_doc_cin_pere"), Some(present.as_path()));
        assert_eq!(state.document("admin_doc_cin_mere"), None);
    }

    #[test]
    fn test_document_reference_survives_moved_root() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let old_root = temp.path().join("old");
        let old_cfg = Arc::new(CoreConfig::new(old_root.clone()).unwrap());
        let documents = DocumentStore::new(old_cfg.clone()).unwrap();
        let mut state = sample_state();
        documents
            .store(&mut state, "admin_doc_cin_pere", "cin.pdf", b"%PDF-1.4")
            .unwrap();
        DossierRepository::new(old_cfg).save(&state).unwrap();

        let new_root = temp.path().join("new");
        fs::rename(&old_root, &new_root).unwrap();
        let new_cfg = Arc::new(CoreConfig::new(new_root.clone()).unwrap());
        let repo = DossierRepository::new(new_cfg.clone());
        let loaded = repo.load("IPP-001").expect("load should succeed");

        let expected = new_cfg.document_root().join("IPP-001/tribunal/cin.pdf");
        assert_eq!(loaded.document("admin_doc_cin_pere"), Some(expected.as_path()));

        repo.save(&loaded).unwrap();
        let raw = fs::read_to_string(new_root.join("IPP-001").join(RECORD_FILENAME)).unwrap();
        let record: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(record["admin_doc_cin_pere"], "IPP-001/tribunal/cin.pdf");
    }

    #[test]
    fn test_exists() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let repo = DossierRepository::new(test_cfg(&temp));
        let id = DossierId::parse("IPP-001").unwrap();

        assert!(!repo.exists(&id));
        repo.save(&sample_state()).unwrap();
        assert!(repo.exists(&id));
    }
}
