//! Dossier-scoped document storage service
//!
//! This module provides [`FilesService`], which writes uploaded documents into the
//! attachment tree of a dossier and reads them back.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/<identifier>/<category>/<original-filename>
//! ```
//!
//! `category` is one of `tribunal`, `ministere`, `organisme`.
//!
//! # Write Semantics
//!
//! - The target directory is created on demand
//! - Bytes are written to a `.partial` sibling and renamed into place, so a failed
//!   upload never truncates a previously stored document
//! - A file with the same name in the same category is replaced
//!
//! # Security Model
//!
//! - The root is canonicalised at construction time
//! - Identifiers are [`DossierId`] values, which are single path components
//! - Filenames must be plain file names (no separators, no `..`)
//! - Reads are refused for paths outside the root

use crate::constants::{
    ACCEPTED_EXTENSIONS, MINISTERE_DIR_NAME, ORGANISME_DIR_NAME, PARTIAL_SUFFIX,
    TRIBUNAL_DIR_NAME,
};
use crate::FilesError;
use chrono::{DateTime, Utc};
use dossier_types::{DossierId, NonEmptyText};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Attachment category, which is also the sub-directory name inside a dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    /// Court approval file (administrative documents).
    Tribunal,
    /// Ministry approval file.
    Ministere,
    /// Payer organisation approval.
    Organisme,
}

impl DocumentCategory {
    /// All categories, in wizard order.
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::Tribunal,
        DocumentCategory::Ministere,
        DocumentCategory::Organisme,
    ];

    /// Directory name used on disk for this category.
    pub fn dir_name(self) -> &'static str {
        match self {
            DocumentCategory::Tribunal => TRIBUNAL_DIR_NAME,
            DocumentCategory::Ministere => MINISTERE_DIR_NAME,
            DocumentCategory::Organisme => ORGANISME_DIR_NAME,
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Metadata for a stored document.
///
/// Returned by [`FilesService::store`] once the bytes are in place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredDocument {
    /// Absolute path of the stored file
    pub path: PathBuf,

    /// Category directory the file was written to
    pub category: DocumentCategory,

    /// Original filename, as uploaded
    pub original_filename: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the content
    pub sha256: String,

    /// Detected media type, if available
    ///
    /// Best-effort sniffing of the content; not authoritative.
    pub media_type: Option<String>,

    /// UTC timestamp when the file was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for writing and reading dossier attachments under a data root.
#[derive(Debug, Clone)]
pub struct FilesService {
    /// Canonicalised data root
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` over an existing data root.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Stores `bytes` as `filename` in the `category` directory of dossier `dossier_id`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `filename` is not a plain file name (`InvalidPath`)
    /// - the extension is not an accepted document type (`UnsupportedDocumentType`)
    /// - the directory cannot be created or the file cannot be written (`Io`)
    pub fn store(
        &self,
        dossier_id: &DossierId,
        category: DocumentCategory,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredDocument, FilesError> {
        let original_filename = validate_filename(filename)?;
        validate_extension(original_filename.as_str())?;

        let category_dir = self.category_dir(dossier_id, category);
        fs::create_dir_all(&category_dir).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create document directory {}: {}",
                    category_dir.display(),
                    e
                ),
            ))
        })?;

        let target = category_dir.join(original_filename.as_str());
        let partial = category_dir.join(format!(
            "{}{}",
            original_filename.as_str(),
            PARTIAL_SUFFIX
        ));

        if let Err(e) = fs::write(&partial, bytes) {
            let _ = fs::remove_file(&partial);
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", partial.display(), e),
            )));
        }

        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to move file into {}: {}", target.display(), e),
            )));
        }

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let sha256 = hex::encode(hasher.finalize());

        let media_type = infer::get(bytes).map(|kind| kind.mime_type().to_string());

        tracing::info!(
            dossier = %dossier_id,
            category = %category,
            path = %target.display(),
            "document stored"
        );

        Ok(StoredDocument {
            path: target,
            category,
            original_filename,
            size_bytes: bytes.len() as u64,
            sha256,
            media_type,
            stored_at: Utc::now(),
        })
    }

    /// Reads back a stored document.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPath` if `path` lies outside the data root, or
    /// `FilesError::Io` if it cannot be read.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, FilesError> {
        let resolved = path.canonicalize().map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("File not found: {}: {}", path.display(), e),
            ))
        })?;

        if !resolved.starts_with(&self.root_directory) {
            return Err(FilesError::InvalidPath(format!(
                "{} is outside the data root",
                path.display()
            )));
        }

        fs::read(&resolved).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", resolved.display(), e),
            ))
        })
    }

    /// Lists the documents currently present in one category of a dossier.
    ///
    /// Returns an empty list when the category directory does not exist. Partial
    /// writes are not reported. Entries are sorted by filename.
    pub fn list(
        &self,
        dossier_id: &DossierId,
        category: DocumentCategory,
    ) -> Result<Vec<PathBuf>, FilesError> {
        let category_dir = self.category_dir(dossier_id, category);
        let entries = match fs::read_dir(&category_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FilesError::Io(e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));
            if !is_partial {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths)
    }

    /// Returns the canonicalised data root.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Returns the directory owned by a dossier.
    ///
    /// Note: this directory may not exist yet.
    #[must_use]
    pub fn dossier_dir(&self, dossier_id: &DossierId) -> PathBuf {
        self.root_directory.join(dossier_id.as_str())
    }

    /// Returns the directory of one attachment category of a dossier.
    #[must_use]
    pub fn category_dir(&self, dossier_id: &DossierId, category: DocumentCategory) -> PathBuf {
        self.dossier_dir(dossier_id).join(category.dir_name())
    }
}

fn validate_filename(filename: &str) -> Result<NonEmptyText, FilesError> {
    let name = NonEmptyText::new(filename)
        .map_err(|_| FilesError::InvalidPath("filename cannot be empty".into()))?;

    if name.as_str() != filename {
        return Err(FilesError::InvalidPath(
            "filename must not start or end with whitespace".into(),
        ));
    }

    if filename.contains('/') || filename.contains('\\') || filename.contains('\0') {
        return Err(FilesError::InvalidPath(format!(
            "filename must be a plain file name: {filename}"
        )));
    }

    if filename == "." || filename == ".." || filename.ends_with(PARTIAL_SUFFIX) {
        return Err(FilesError::InvalidPath(format!(
            "filename is reserved: {filename}"
        )));
    }

    Ok(name)
}

fn validate_extension(filename: &str) -> Result<(), FilesError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(FilesError::UnsupportedDocumentType(filename.to_string()))
    }
}
