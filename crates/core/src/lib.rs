//! # Dossier Core
//!
//! Core business logic for allogeneic transplant dossiers.
//!
//! This crate contains pure data operations and file/folder management:
//! - The field registry: every field a dossier holds, with its kind and default
//! - The dossier state and the wizard that steps an operator through it
//! - Document attachments stored per dossier and category
//! - JSON record persistence, listing, search and deletion under the data root
//! - A read-only report with Markdown rendering
//!
//! **No boundary concerns**: argument parsing, prompts and logging setup belong in
//! `dossier-cli`. Services receive an `Arc<CoreConfig>` resolved once at start-up.
//!
//! ## Example
//!
//! ```no_run
//! use dossier_core::{CoreConfig, DossierWizard};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), dossier_core::DossierError> {
//! let cfg = Arc::new(CoreConfig::new("patient_uploads_allogreffe".into())?);
//! let mut wizard = DossierWizard::new(cfg)?;
//! wizard.set("receveur_ipp", "IPP-001")?;
//! wizard.set("receveur_nom", "Ali Ben")?;
//! while wizard.next().is_ok() {}
//! let receipt = wizard.submit()?;
//! println!("saved {}", receipt.record_path.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod documents;
pub mod error;
pub mod registry;
pub mod report;
pub mod repositories;
pub mod state;
pub mod wizard;

pub use config::{data_dir_from_env_value, CoreConfig};
pub use documents::DocumentStore;
pub use error::{DossierError, DossierResult};
pub use registry::{FieldKind, FieldRegistry, FieldSpec, FieldValue, IDENTIFIER_FIELD};
pub use report::DossierReport;
pub use repositories::dossiers::DossierRepository;
pub use repositories::index::{DossierIndex, DossierListing, DossierSummary, SearchBy, SearchMatch};
pub use state::{ActivePage, DossierState};
pub use wizard::{DossierWizard, Stage, StageProgress, StageView, SubmitReceipt, Uploads};

pub use dossier_files::{DocumentCategory, StoredDocument};
pub use dossier_types::{DossierId, NonEmptyText};
