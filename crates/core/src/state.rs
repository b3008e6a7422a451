//! Dossier state.
//!
//! [`DossierState`] is the in-memory record of one dossier being created or edited. It is an
//! owned value: the wizard holds it, nothing else mutates it. Every registered field has a
//! value from construction onwards.

use crate::error::{DossierError, DossierResult};
use crate::registry::{FieldRegistry, FieldSpec, FieldValue, IDENTIFIER_FIELD};
use crate::wizard::Stage;
use dossier_types::DossierId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level navigation target selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivePage {
    #[default]
    NewDossier,
    Search,
    Dashboard,
}

impl ActivePage {
    pub fn label(self) -> &'static str {
        match self {
            ActivePage::NewDossier => "Nouveau Dossier",
            ActivePage::Search => "Rechercher / Modifier",
            ActivePage::Dashboard => "Tableau de Bord",
        }
    }
}

/// Mutable state of one in-progress or loaded dossier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DossierState {
    values: BTreeMap<&'static str, FieldValue>,
    current_step: Stage,
    edit_mode: bool,
    active_page: ActivePage,
}

impl Default for DossierState {
    fn default() -> Self {
        Self::new()
    }
}

impl DossierState {
    /// A new dossier: every field at its default, first stage, not in edit mode.
    pub fn new() -> Self {
        let values = FieldRegistry::all()
            .iter()
            .map(|spec| (spec.name, spec.default_value()))
            .collect();

        Self {
            values,
            current_step: Stage::Receveur,
            edit_mode: false,
            active_page: ActivePage::default(),
        }
    }

    /// Current value of a registered field.
    ///
    /// # Errors
    ///
    /// `UnknownField` if `name` is not registered.
    pub fn get(&self, name: &str) -> DossierResult<&FieldValue> {
        let spec = FieldRegistry::lookup(name)?;
        self.values
            .get(spec.name)
            .ok_or_else(|| DossierError::UnknownField(name.to_string()))
    }

    /// Sets a registered field after checking the value against its declaration.
    ///
    /// The identifier is trimmed, and cannot be changed in edit mode. Changing the identifier
    /// of a new dossier drops every document reference, since those files live under the
    /// previous identifier.
    ///
    /// # Errors
    ///
    /// `UnknownField`, `TypeMismatch`, `InvalidOption`, `OutOfRange`,
    /// `DocumentFieldNotSettable` or `IdentifierLocked`.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> DossierResult<()> {
        let spec = FieldRegistry::lookup(name)?;
        if spec.is_document() {
            return Err(DossierError::DocumentFieldNotSettable(spec.name));
        }

        let mut value = value.into();
        spec.check(&value)?;

        if spec.name == IDENTIFIER_FIELD {
            if let FieldValue::Text(raw) = &value {
                value = FieldValue::Text(raw.trim().to_string());
            }
            if value.as_text() == Some(self.identifier()) {
                return Ok(());
            }
            if self.edit_mode {
                return Err(DossierError::IdentifierLocked);
            }
            self.clear_documents();
        }

        self.values.insert(spec.name, value);
        Ok(())
    }

    /// Text value of a text or enum field, empty for anything else.
    pub fn text(&self, name: &str) -> &str {
        self.get(name)
            .ok()
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
    }

    /// Raw identifier text (may be empty).
    pub fn identifier(&self) -> &str {
        self.text(IDENTIFIER_FIELD)
    }

    /// Validated identifier.
    ///
    /// # Errors
    ///
    /// `MissingIdentifier` when empty, `InvalidIdentifier` when unusable as a storage key.
    pub fn dossier_id(&self) -> DossierResult<DossierId> {
        Ok(DossierId::parse(self.identifier())?)
    }

    /// Receiver name as `nom prenom`, trimmed.
    pub fn receiver_full_name(&self) -> String {
        full_name(self.text("receveur_nom"), self.text("receveur_prenom"))
    }

    /// Donor name as `nom prenom`, trimmed.
    pub fn donor_full_name(&self) -> String {
        full_name(self.text("donneur_nom"), self.text("donneur_prenom"))
    }

    /// Stored path referenced by a document slot.
    pub fn document(&self, slot: &str) -> Option<&Path> {
        self.get(slot).ok().and_then(FieldValue::as_document)
    }

    /// Every field with its value, in registry order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, &FieldValue)> {
        FieldRegistry::all()
            .iter()
            .filter_map(|spec| self.values.get(spec.name).map(|value| (spec, value)))
    }

    pub fn current_step(&self) -> Stage {
        self.current_step
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn active_page(&self) -> ActivePage {
        self.active_page
    }

    /// Discards every field value and returns to a new dossier.
    ///
    /// Only `active_page` survives; edit mode is left and the first stage selected.
    pub fn reset(&mut self) {
        let active_page = self.active_page;
        *self = Self::new();
        self.active_page = active_page;
    }

    pub(crate) fn set_current_step(&mut self, stage: Stage) {
        self.current_step = stage;
    }

    pub(crate) fn set_edit_mode(&mut self, edit_mode: bool) {
        self.edit_mode = edit_mode;
    }

    pub(crate) fn set_active_page(&mut self, page: ActivePage) {
        self.active_page = page;
    }

    /// Records a stored document. Only the document store calls this, after the write.
    pub(crate) fn set_document(&mut self, spec: &'static FieldSpec, path: PathBuf) {
        debug_assert!(spec.is_document());
        self.values.insert(spec.name, FieldValue::Document(Some(path)));
    }

    /// Writes a decoded value without the setter's mode rules. Used when loading a record.
    pub(crate) fn overlay(&mut self, spec: &'static FieldSpec, value: FieldValue) {
        self.values.insert(spec.name, value);
    }

    fn clear_documents(&mut self) {
        for spec in FieldRegistry::all().iter().filter(|s| s.is_document()) {
            if self.document(spec.name).is_some() {
                tracing::warn!(
                    slot = spec.name,
                    "identifier changed, dropping document reference"
                );
                self.values.insert(spec.name, FieldValue::Document(None));
            }
        }
    }
}

fn full_name(nom: &str, prenom: &str) -> String {
    format!("{nom} {prenom}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_new_state_has_every_field_at_default() {
        let state = DossierState::new();

        for spec in FieldRegistry::all() {
            let value = state.get(spec.name).expect("every field has a value");
            if spec.name != "organisme_accord_date_validation" {
                assert_eq!(value, &spec.default_value(), "{}", spec.name);
            }
        }
        assert_eq!(state.current_step(), Stage::Receveur);
        assert!(!state.edit_mode());
        assert_eq!(state.active_page(), ActivePage::NewDossier);
    }

    #[test]
    fn test_documented_defaults() {
        let state = DossierState::new();

        assert_eq!(state.identifier(), "");
        assert_eq!(state.text("receveur_sexe"), "Homme");
        assert_eq!(state.text("receveur_groupage"), "O+");
        assert_eq!(state.text("receveur_organisme"), "PAYANT");
        assert_eq!(state.text("accord_tribunal"), "En cours");
        assert_eq!(
            state.get("receveur_date_naissance").unwrap().as_date(),
            NaiveDate::from_ymd_opt(2000, 1, 1)
        );
        assert_eq!(state.get("receveur_age_mere").unwrap().as_int(), Some(0));
        assert_eq!(state.get("medical_exam_fish").unwrap().as_bool(), Some(false));
        assert_eq!(state.document("admin_doc_cin_pere"), None);
    }

    #[test]
    fn test_set_and_get_typed_values() {
        let mut state = DossierState::new();

        state.set("receveur_nom", "Ali").unwrap();
        state.set("receveur_age_pere", 54i64).unwrap();
        state.set("medical_exam_typage_hla", true).unwrap();
        let date = NaiveDate::from_ymd_opt(2012, 5, 30).unwrap();
        state.set("receveur_date_naissance", date).unwrap();

        assert_eq!(state.text("receveur_nom"), "Ali");
        assert_eq!(state.get("receveur_age_pere").unwrap().as_int(), Some(54));
        assert_eq!(state.get("medical_exam_typage_hla").unwrap().as_bool(), Some(true));
        assert_eq!(state.get("receveur_date_naissance").unwrap().as_date(), Some(date));
    }

    #[test]
    fn test_set_rejects_unknown_and_invalid_values() {
        let mut state = DossierState::new();

        assert!(matches!(
            state.set("receveur_surnom", "x"),
            Err(DossierError::UnknownField(_))
        ));
        assert!(matches!(
            state.set("receveur_groupage", "Z+"),
            Err(DossierError::InvalidOption { .. })
        ));
        assert!(matches!(
            state.set("receveur_date_naissance", "2000-01-01"),
            Err(DossierError::TypeMismatch { .. })
        ));
        assert_eq!(state.text("receveur_groupage"), "O+");
        assert_eq!(
            state.get("receveur_date_naissance").unwrap().as_date(),
            NaiveDate::from_ymd_opt(2000, 1, 1)
        );
    }

    #[test]
    fn test_set_refuses_document_fields() {
        let mut state = DossierState::new();

        let err = state
            .set("admin_doc_cin_pere", FieldValue::Document(Some("/etc/passwd".into())))
            .unwrap_err();

        assert!(matches!(err, DossierError::DocumentFieldNotSettable("admin_doc_cin_pere")));
        assert_eq!(state.document("admin_doc_cin_pere"), None);
    }

    #[test]
    fn test_identifier_is_trimmed() {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, "  IPP-001 ").unwrap();
        assert_eq!(state.identifier(), "IPP-001");
        assert_eq!(state.dossier_id().unwrap().as_str(), "IPP-001");
    }

    #[test]
    fn test_identifier_locked_in_edit_mode() {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, "IPP-001").unwrap();
        state.set_edit_mode(true);

        assert!(matches!(
            state.set(IDENTIFIER_FIELD, "IPP-002"),
            Err(DossierError::IdentifierLocked)
        ));
        state
            .set(IDENTIFIER_FIELD, "IPP-001")
            .expect("re-setting the same identifier is a no-op");
        assert_eq!(state.identifier(), "IPP-001");
    }

    #[test]
    fn test_identifier_change_drops_document_references() {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, "IPP-001").unwrap();
        let slot = FieldRegistry::lookup("admin_doc_cin_pere").unwrap();
        state.set_document(slot, PathBuf::from("/data/IPP-001/tribunal/cin.pdf"));

        state.set(IDENTIFIER_FIELD, "IPP-002").unwrap();

        assert_eq!(state.document("admin_doc_cin_pere"), None);
    }

    #[test]
    fn test_dossier_id_requires_identifier() {
        let state = DossierState::new();
        assert!(matches!(state.dossier_id(), Err(DossierError::MissingIdentifier)));
    }

    #[test]
    fn test_reset_keeps_only_active_page() {
        let mut state = DossierState::new();
        state.set(IDENTIFIER_FIELD, "IPP-001").unwrap();
        state.set("receveur_nom", "Ben").unwrap();
        state.set("accord_ministere", "Refusé").unwrap();
        let slot = FieldRegistry::lookup("organisme_accord_document").unwrap();
        state.set_document(slot, PathBuf::from("/data/IPP-001/organisme/accord.pdf"));
        state.set_current_step(Stage::Organisme);
        state.set_edit_mode(true);
        state.set_active_page(ActivePage::Dashboard);

        state.reset();

        assert_eq!(state.identifier(), "");
        assert_eq!(state.text("receveur_nom"), "");
        assert_eq!(state.text("accord_ministere"), "En cours");
        assert_eq!(state.document("organisme_accord_document"), None);
        assert_eq!(state.current_step(), Stage::Receveur);
        assert!(!state.edit_mode());
        assert_eq!(state.active_page(), ActivePage::Dashboard);
    }

    #[test]
    fn test_full_names_are_trimmed() {
        let mut state = DossierState::new();
        state.set("receveur_nom", "Ali").unwrap();
        assert_eq!(state.receiver_full_name(), "Ali");
        state.set("receveur_prenom", "Ben").unwrap();
        assert_eq!(state.receiver_full_name(), "Ali Ben");
        assert_eq!(state.donor_full_name(), "");
    }
}
