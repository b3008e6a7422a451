//! Dossier attachment storage
//!
//! This crate stores the scanned documents attached to a dossier (court papers, ministry
//! documents, payer organisation approval).
//!
//! ## Design Principles
//!
//! - Each dossier owns its own attachment tree; there is no shared namespace
//! - Documents keep their original filename
//! - Re-uploading a filename replaces the previous file; other files are left alone
//! - Nothing is deduplicated or pruned
//!
//! ## Storage Model
//!
//! ```text
//! <data_root>/
//! └── <identifier>/
//!     ├── patient_data.json      # written by dossier-core, not by this crate
//!     ├── tribunal/
//!     │   └── acte_naissance.pdf
//!     ├── ministere/
//!     └── organisme/
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use dossier_files::{DocumentCategory, FilesService};
//! use dossier_types::DossierId;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("patient_uploads_allogreffe"))?;
//! let id = DossierId::parse("IPP-001")?;
//! let stored = service.store(&id, DocumentCategory::Tribunal, "cin.pdf", b"%PDF-1.4")?;
//! println!("stored at {}", stored.path.display());
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{
    ACCEPTED_EXTENSIONS, MINISTERE_DIR_NAME, ORGANISME_DIR_NAME, TRIBUNAL_DIR_NAME,
};
pub use dossier_types::DossierId;
pub use files::{DocumentCategory, FilesService, StoredDocument};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Filename or stored path failed validation (traversal, separators, empty)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The file extension is not one of the accepted document types
    #[error("Unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
