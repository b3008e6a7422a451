//! Field registry.
//!
//! Every field a dossier can hold is declared here, once, with a stable key, a display
//! label, the wizard stage that shows it, its kind and its default. Keys are ASCII and
//! independent of the labels, so relabelling a field never changes what is stored.
//!
//! The registry also owns the typed JSON codec used by the persistence layer: values are
//! encoded by kind and decoded back by kind, never by guessing from the stored JSON.

use crate::constants::{
    APPROVAL_OPTIONS, BLOOD_GROUP_OPTIONS, MAX_PARENT_AGE, PAYER_OPTIONS, SEX_OPTIONS,
};
use crate::error::{DossierError, DossierResult};
use crate::wizard::Stage;
use crate::wizard::Stage::{Donneur, Ministere, Organisme, Receveur, Tribunal};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use dossier_files::DocumentCategory;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Key of the patient identifier field.
pub const IDENTIFIER_FIELD: &str = "receveur_ipp";

/// Semantic type of a registered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    Int { min: i64, max: i64 },
    Bool,
    Enum(&'static [&'static str]),
    Document(DocumentCategory),
}

impl FieldKind {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Int { .. } => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::Enum(_) => "option",
            FieldKind::Document(_) => "document",
        }
    }
}

/// Default value of a registered field.
///
/// `Today` is resolved when a state is initialised, not when the registry is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Text(&'static str),
    Date { year: i32, month: u32, day: u32 },
    Today,
    Int(i64),
    Bool(bool),
    NoDocument,
}

/// Typed value held by a dossier field.
///
/// Enum fields hold a `Text` value restricted to their options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Int(i64),
    Bool(bool),
    Document(Option<PathBuf>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Stored path of a document field, `None` when unset or not a document.
    pub fn as_document(&self) -> Option<&Path> {
        match self {
            FieldValue::Document(Some(p)) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Declaration of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub stage: Stage,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    /// Fresh default value for this field.
    pub fn default_value(&self) -> FieldValue {
        match self.default {
            FieldDefault::Text(s) => FieldValue::Text(s.to_string()),
            FieldDefault::Date { year, month, day } => {
                FieldValue::Date(NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default())
            }
            FieldDefault::Today => FieldValue::Date(Local::now().date_naive()),
            FieldDefault::Int(n) => FieldValue::Int(n),
            FieldDefault::Bool(b) => FieldValue::Bool(b),
            FieldDefault::NoDocument => FieldValue::Document(None),
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.kind, FieldKind::Document(_))
    }

    /// Checks that `value` is acceptable for this field.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the value has the wrong shape, `InvalidOption` for an enum value
    /// outside the options, `OutOfRange` for an integer outside the bounds.
    pub fn check(&self, value: &FieldValue) -> DossierResult<()> {
        match (&self.kind, value) {
            (FieldKind::Text, FieldValue::Text(_))
            | (FieldKind::Date, FieldValue::Date(_))
            | (FieldKind::Bool, FieldValue::Bool(_))
            | (FieldKind::Document(_), FieldValue::Document(_)) => Ok(()),
            (FieldKind::Int { min, max }, FieldValue::Int(n)) => {
                if (*min..=*max).contains(n) {
                    Ok(())
                } else {
                    Err(DossierError::OutOfRange {
                        field: self.name,
                        value: *n,
                        min: *min,
                        max: *max,
                    })
                }
            }
            (FieldKind::Enum(options), FieldValue::Text(s)) => {
                if options.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(DossierError::InvalidOption {
                        field: self.name,
                        value: s.clone(),
                    })
                }
            }
            _ => Err(DossierError::TypeMismatch {
                field: self.name,
                expected: self.kind.name(),
            }),
        }
    }

    /// Encodes a value for the persisted record.
    ///
    /// Document references under `root` are stored relative to it so a record survives the
    /// data root being moved.
    pub(crate) fn encode(&self, value: &FieldValue, root: &Path) -> Value {
        match value {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Document(None) => Value::Null,
            FieldValue::Document(Some(p)) => {
                let stored = p.strip_prefix(root).unwrap_or(p);
                Value::String(stored.to_string_lossy().into_owned())
            }
        }
    }

    /// Decodes a stored JSON value according to this field's kind.
    ///
    /// Relative document references are resolved against `root`; absolute ones are kept as
    /// written. Returns a human-readable reason when the stored value cannot be used; the
    /// caller decides whether that is fatal.
    pub(crate) fn decode(&self, raw: &Value, root: &Path) -> Result<FieldValue, String> {
        let value = match (&self.kind, raw) {
            (FieldKind::Text | FieldKind::Enum(_), Value::String(s)) => FieldValue::Text(s.clone()),
            (FieldKind::Date, Value::String(s)) => FieldValue::Date(
                parse_iso_date(s).ok_or_else(|| format!("unparseable date {s:?}"))?,
            ),
            (FieldKind::Int { .. }, Value::Number(n)) => FieldValue::Int(
                n.as_i64()
                    .ok_or_else(|| format!("{n} is not an integer"))?,
            ),
            (FieldKind::Bool, Value::Bool(b)) => FieldValue::Bool(*b),
            (FieldKind::Document(_), Value::Null) => FieldValue::Document(None),
            (FieldKind::Document(_), Value::String(s)) if !s.is_empty() => {
                let stored = Path::new(s);
                if stored.is_absolute() {
                    FieldValue::Document(Some(stored.to_path_buf()))
                } else {
                    FieldValue::Document(Some(root.join(stored)))
                }
            }
            (FieldKind::Document(_), Value::String(_)) => FieldValue::Document(None),
            (kind, other) => {
                return Err(format!(
                    "expected a {} value, found {}",
                    kind.name(),
                    json_type_name(other)
                ))
            }
        };

        self.check(&value).map_err(|e| e.to_string())?;
        Ok(value)
    }
}

/// Parses `YYYY-MM-DD`, then falls back to a full ISO-8601 date-time and keeps its date.
pub(crate) fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const fn text(name: &'static str, label: &'static str, stage: Stage) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage,
        kind: FieldKind::Text,
        default: FieldDefault::Text(""),
    }
}

const fn choice(
    name: &'static str,
    label: &'static str,
    stage: Stage,
    options: &'static [&'static str],
    default: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage,
        kind: FieldKind::Enum(options),
        default: FieldDefault::Text(default),
    }
}

const fn birth_date(name: &'static str, label: &'static str, stage: Stage) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage,
        kind: FieldKind::Date,
        default: FieldDefault::Date {
            year: 2000,
            month: 1,
            day: 1,
        },
    }
}

const fn parent_age(name: &'static str, label: &'static str, stage: Stage) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage,
        kind: FieldKind::Int {
            min: 0,
            max: MAX_PARENT_AGE,
        },
        default: FieldDefault::Int(0),
    }
}

const fn exam(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage: Stage::Medical,
        kind: FieldKind::Bool,
        default: FieldDefault::Bool(false),
    }
}

const fn document(
    name: &'static str,
    label: &'static str,
    stage: Stage,
    category: DocumentCategory,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        stage,
        kind: FieldKind::Document(category),
        default: FieldDefault::NoDocument,
    }
}

static FIELDS: &[FieldSpec] = &[
    // Receveur
    text(IDENTIFIER_FIELD, "IPP", Receveur),
    text("receveur_nom", "Nom", Receveur),
    text("receveur_prenom", "Prénom", Receveur),
    birth_date("receveur_date_naissance", "Date de naissance", Receveur),
    text("receveur_adresse", "Adresse", Receveur),
    choice("receveur_sexe", "Sexe", Receveur, SEX_OPTIONS, "Homme"),
    choice("receveur_groupage", "Groupage sanguin", Receveur, BLOOD_GROUP_OPTIONS, "O+"),
    text("receveur_contact_principal", "Contact principal", Receveur),
    text("receveur_nom_pere", "Nom du père", Receveur),
    parent_age("receveur_age_pere", "Âge du père", Receveur),
    text("receveur_nom_mere", "Nom de la mère", Receveur),
    parent_age("receveur_age_mere", "Âge de la mère", Receveur),
    choice("receveur_organisme", "Organisme payeur", Receveur, PAYER_OPTIONS, "PAYANT"),
    // Donneur
    text("donneur_nom", "Nom du donneur", Donneur),
    text("donneur_prenom", "Prénom du donneur", Donneur),
    birth_date("donneur_date_naissance", "Date de naissance du donneur", Donneur),
    text("donneur_adresse", "Adresse du donneur", Donneur),
    choice("donneur_sexe", "Sexe du donneur", Donneur, SEX_OPTIONS, "Homme"),
    choice("donneur_groupage", "Groupage sanguin du donneur", Donneur, BLOOD_GROUP_OPTIONS, "O+"),
    text("donneur_contact_principal", "Contact principal du donneur", Donneur),
    text("donneur_nom_pere", "Nom du père du donneur", Donneur),
    parent_age("donneur_age_pere", "Âge du père du donneur", Donneur),
    text("donneur_nom_mere", "Nom de la mère du donneur", Donneur),
    parent_age("donneur_age_mere", "Âge de la mère du donneur", Donneur),
    choice("donneur_organisme", "Organisme payeur du donneur", Donneur, PAYER_OPTIONS, "PAYANT"),
    // Tribunal
    choice("accord_tribunal", "Statut de l'accord du tribunal", Tribunal, APPROVAL_OPTIONS, "En cours"),
    document("admin_doc_extrait_naissance_pere", "Extrait d'acte de naissance (Père)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_extrait_naissance_mere", "Extrait d'acte de naissance (Mère)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_copie_integrale_receveur", "Copie intégrale (Receveur)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_copie_integrale_donneur", "Copie intégrale (Donneur)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_certificat_nationalite_pere", "Certificat de nationalité (Père)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_certificat_nationalite_mere", "Certificat de nationalité (Mère)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_cin_pere", "CIN (Père)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_cin_mere", "CIN (Mère)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_cin_receveur", "CIN (Receveur)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_cin_donneur", "CIN (Donneur)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_consentement_receveur", "Consentement éclairé (Receveur)", Tribunal, DocumentCategory::Tribunal),
    document("admin_doc_consentement_donneur", "Consentement éclairé (Donneur)", Tribunal, DocumentCategory::Tribunal),
    // Médical
    exam("medical_exam_rx_thorax", "Rx Thorax"),
    exam("medical_exam_echographie_cardiaque", "Échographie Cardiaque"),
    exam("medical_exam_fish", "FISH"),
    exam("medical_exam_bilan_hepatique", "Bilan Hépatique"),
    exam("medical_exam_bilan_renal", "Bilan Rénal"),
    exam("medical_exam_serologies_virales", "Sérologies Virales (VIH, VHB, VHC)"),
    exam("medical_exam_consultation_anesthesie", "Consultation Anesthésie"),
    exam("medical_exam_typage_hla", "Typage HLA"),
    // Ministère
    choice("accord_ministere", "Statut de l'accord du ministère", Ministere, APPROVAL_OPTIONS, "En cours"),
    document("ministere_doc_rapport_medical", "Rapport Médical", Ministere, DocumentCategory::Ministere),
    document("ministere_doc_certificat_medical", "Certificat médical", Ministere, DocumentCategory::Ministere),
    document("ministere_doc_acte_mariage", "Acte de mariage (si applicable)", Ministere, DocumentCategory::Ministere),
    document("ministere_doc_cin_legalise_pere", "CIN légalisé du père", Ministere, DocumentCategory::Ministere),
    document("ministere_doc_cin_legalise_mere", "CIN légalisé de la Mère", Ministere, DocumentCategory::Ministere),
    document("ministere_doc_demande_manuscrite", "Demande manuscrite au ministère", Ministere, DocumentCategory::Ministere),
    // Organisme
    text("organisme_accord_nom_specifique", "Nom de l'organisme", Organisme),
    choice("organisme_accord_statut", "Statut de l'accord de l'organisme", Organisme, APPROVAL_OPTIONS, "En cours"),
    FieldSpec {
        name: "organisme_accord_date_validation",
        label: "Date de validation de l'accord",
        stage: Organisme,
        kind: FieldKind::Date,
        default: FieldDefault::Today,
    },
    document("organisme_accord_document", "Document de l'accord", Organisme, DocumentCategory::Organisme),
];

/// Read-only access to the registered fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRegistry;

impl FieldRegistry {
    /// Every registered field, in wizard order.
    pub fn all() -> &'static [FieldSpec] {
        FIELDS
    }

    pub fn get(name: &str) -> Option<&'static FieldSpec> {
        FIELDS.iter().find(|spec| spec.name == name)
    }

    /// Like [`FieldRegistry::get`], failing with `UnknownField` for unregistered names.
    pub fn lookup(name: &str) -> DossierResult<&'static FieldSpec> {
        Self::get(name).ok_or_else(|| DossierError::UnknownField(name.to_string()))
    }

    /// Fields shown on `stage`, in declaration order.
    pub fn for_stage(stage: Stage) -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS.iter().filter(move |spec| spec.stage == stage)
    }

    /// Document slots of `category`, in declaration order.
    pub fn document_slots(category: DocumentCategory) -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS
            .iter()
            .filter(move |spec| spec.kind == FieldKind::Document(category))
    }

    /// The medical exam checklist flags.
    pub fn exams() -> impl Iterator<Item = &'static FieldSpec> {
        FIELDS
            .iter()
            .filter(|spec| spec.stage == Stage::Medical && spec.kind == FieldKind::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in FieldRegistry::all() {
            assert!(seen.insert(spec.name), "duplicate field {}", spec.name);
        }
    }

    #[test]
    fn test_field_names_are_ascii_keys() {
        for spec in FieldRegistry::all() {
            assert!(
                spec.name
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'),
                "{} is not a stable ASCII key",
                spec.name
            );
        }
    }

    #[test]
    fn test_defaults_satisfy_their_own_kind() {
        for spec in FieldRegistry::all() {
            spec.check(&spec.default_value())
                .unwrap_or_else(|e| panic!("default of {} is invalid: {e}", spec.name));
        }
    }

    #[test]
    fn test_slot_and_exam_counts() {
        assert_eq!(FieldRegistry::document_slots(DocumentCategory::Tribunal).count(), 12);
        assert_eq!(FieldRegistry::document_slots(DocumentCategory::Ministere).count(), 6);
        assert_eq!(FieldRegistry::document_slots(DocumentCategory::Organisme).count(), 1);
        assert_eq!(FieldRegistry::exams().count(), 8);
    }

    #[test]
    fn test_document_slots_live_on_their_category_stage() {
        for spec in FieldRegistry::all() {
            if let FieldKind::Document(category) = spec.kind {
                assert_eq!(spec.stage.document_category(), Some(category), "{}", spec.name);
            }
        }
    }

    #[test]
    fn test_confirmation_stage_has_no_fields() {
        assert_eq!(FieldRegistry::for_stage(Stage::Confirmation).count(), 0);
    }

    #[test]
    fn test_lookup_unknown_field_fails() {
        let err = FieldRegistry::lookup("receveur_nom_complet").unwrap_err();
        assert!(matches!(err, DossierError::UnknownField(name) if name == "receveur_nom_complet"));
    }

    #[test]
    fn test_check_enforces_options_and_ranges() {
        let sexe = FieldRegistry::lookup("receveur_sexe").unwrap();
        assert!(sexe.check(&"Femme".into()).is_ok());
        assert!(matches!(
            sexe.check(&"Autre".into()),
            Err(DossierError::InvalidOption { .. })
        ));

        let age = FieldRegistry::lookup("receveur_age_pere").unwrap();
        assert!(age.check(&FieldValue::Int(120)).is_ok());
        assert!(matches!(
            age.check(&FieldValue::Int(121)),
            Err(DossierError::OutOfRange { .. })
        ));
        assert!(matches!(
            age.check(&"40".into()),
            Err(DossierError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_dates_accepts_plain_and_full_iso() {
        let spec = FieldRegistry::lookup("receveur_date_naissance").unwrap();
        let expected = NaiveDate::from_ymd_opt(1987, 3, 14).unwrap();

        let root = Path::new("/data");

        assert_eq!(spec.decode(&json!("1987-03-14"), root), Ok(FieldValue::Date(expected)));
        assert_eq!(
            spec.decode(&json!("1987-03-14T08:30:00"), root),
            Ok(FieldValue::Date(expected))
        );
        assert_eq!(
            spec.decode(&json!("1987-03-14T08:30:00+01:00"), root),
            Ok(FieldValue::Date(expected))
        );
        assert!(spec.decode(&json!("14/03/1987"), root).is_err());
        assert!(spec.decode(&json!(19870314), root).is_err());
    }

    #[test]
    fn test_decode_documents() {
        let spec = FieldRegistry::lookup("admin_doc_cin_pere").unwrap();
        let root = Path::new("/srv/dossiers");

        assert_eq!(spec.decode(&Value::Null, root), Ok(FieldValue::Document(None)));
        assert_eq!(
            spec.decode(&json!("IPP-1/tribunal/cin.pdf"), root),
            Ok(FieldValue::Document(Some(PathBuf::from(
                "/srv/dossiers/IPP-1/tribunal/cin.pdf"
            ))))
        );
        assert_eq!(
            spec.decode(&json!("/data/IPP-1/tribunal/cin.pdf"), root),
            Ok(FieldValue::Document(Some(PathBuf::from(
                "/data/IPP-1/tribunal/cin.pdf"
            ))))
        );
        assert!(spec.decode(&json!(true), root).is_err());
    }

    #[test]
    fn test_encode_documents_relative_to_root() {
        let spec = FieldRegistry::lookup("admin_doc_cin_pere").unwrap();
        let root = Path::new("/srv/dossiers");

        let inside = FieldValue::Document(Some(PathBuf::from(
            "/srv/dossiers/IPP-1/tribunal/cin.pdf",
        )));
        assert_eq!(spec.encode(&inside, root), json!("IPP-1/tribunal/cin.pdf"));

        let outside = FieldValue::Document(Some(PathBuf::from("/elsewhere/cin.pdf")));
        assert_eq!(spec.encode(&outside, root), json!("/elsewhere/cin.pdf"));
        assert_eq!(spec.encode(&FieldValue::Document(None), root), Value::Null);
    }

    #[test]
    fn test_decode_rejects_enum_value_outside_options() {
        let spec = FieldRegistry::lookup("accord_tribunal").unwrap();
        assert_eq!(
            spec.decode(&json!("Accordé"), Path::new("/data")),
            Ok(FieldValue::Text("Accordé".into()))
        );
        assert!(spec.decode(&json!("Peut-être"), Path::new("/data")).is_err());
    }

    #[test]
    fn test_encode_dates_as_iso_strings() {
        let spec = FieldRegistry::lookup("donneur_date_naissance").unwrap();
        let value = FieldValue::Date(NaiveDate::from_ymd_opt(2001, 9, 2).unwrap());
        assert_eq!(spec.encode(&value, Path::new("/data")), json!("2001-09-02"));
    }
}
