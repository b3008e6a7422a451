//! Validated primitive types shared by the dossier crates.
//!
//! - [`NonEmptyText`]: trimmed text guaranteed to contain something.
//! - [`DossierId`]: the operator-supplied patient identifier (IPP), safe to use as a
//!   directory name under the data root.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors raised while validating a dossier identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// No identifier was supplied (empty or whitespace only).
    #[error("identifier is required")]
    Empty,
    /// The identifier cannot be used as a storage key.
    #[error("invalid identifier: {0}")]
    Invalid(&'static str),
}

/// Patient identifier (IPP) used as the primary key of a dossier.
///
/// The identifier names the dossier directory on disk, so it must be a single path
/// component: no separators, no `..`, no NUL byte, no surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DossierId(String);

impl DossierId {
    /// Maximum identifier length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Validates `input` as a dossier identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] for empty or whitespace-only input and
    /// [`IdentifierError::Invalid`] when the value cannot name a directory.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let raw = input.as_ref();

        if raw.trim().is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.trim() != raw {
            return Err(IdentifierError::Invalid(
                "identifier must not start or end with whitespace",
            ));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(IdentifierError::Invalid("identifier is too long"));
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(IdentifierError::Invalid(
                "identifier must not contain path separators",
            ));
        }
        if raw.contains("..") || raw == "." {
            return Err(IdentifierError::Invalid(
                "identifier must not contain '..' or be '.'",
            ));
        }
        if raw.contains('\0') {
            return Err(IdentifierError::Invalid(
                "identifier must not contain null bytes",
            ));
        }

        Ok(Self(raw.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DossierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DossierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for DossierId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for DossierId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DossierId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DossierId::parse(&s).map_err(serde::de::Error::custom)
    }
}
