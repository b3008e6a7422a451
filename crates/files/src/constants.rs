/// Directory holding court (tribunal) documents inside a dossier.
pub const TRIBUNAL_DIR_NAME: &str = "tribunal";

/// Directory holding ministry documents inside a dossier.
pub const MINISTERE_DIR_NAME: &str = "ministere";

/// Directory holding the payer organisation approval inside a dossier.
pub const ORGANISME_DIR_NAME: &str = "organisme";

/// File extensions accepted for scanned documents (compared case-insensitively).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Suffix of the temporary sibling used while a document is being written.
pub const PARTIAL_SUFFIX: &str = ".partial";
