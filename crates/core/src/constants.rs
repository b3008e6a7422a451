//! Constants used throughout the dossier core crate.
//!
//! This module contains path, filename and option-list constants to keep them
//! consistent across the codebase.

/// Default directory for dossier storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "patient_uploads_allogreffe";

/// Filename of the persisted record inside a dossier directory.
pub const RECORD_FILENAME: &str = "patient_data.json";

/// Suffix of the temporary sibling used while a record is being written.
pub const RECORD_PARTIAL_SUFFIX: &str = ".partial";

/// Number of wizard stages.
pub const STAGE_COUNT: usize = 7;

/// Approval statuses shared by the court, ministry and payer organisation.
pub const APPROVAL_OPTIONS: &[&str] = &["En cours", "Accordé", "Refusé"];

/// Sex options.
pub const SEX_OPTIONS: &[&str] = &["Homme", "Femme"];

/// ABO/Rh blood groups.
pub const BLOOD_GROUP_OPTIONS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

/// Payer organisations.
pub const PAYER_OPTIONS: &[&str] = &["PAYANT", "CNAM", "CNOPS", "AXA", "FAR- Sociales", "Autre"];

/// Upper bound accepted for a parent's age.
pub const MAX_PARENT_AGE: i64 = 120;
