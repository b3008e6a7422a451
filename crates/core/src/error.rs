use crate::wizard::Stage;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("the patient identifier (IPP) is required")]
    MissingIdentifier,
    #[error("invalid patient identifier: {0}")]
    InvalidIdentifier(String),
    #[error("the patient identifier cannot change while editing an existing dossier")]
    IdentifierLocked,
    #[error("no dossier found for identifier {0}")]
    RecordNotFound(String),
    #[error("dossier record is unreadable (path: {path}): {reason}", path = path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field {field} expects a {expected} value")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
    #[error("{value:?} is not an allowed value for {field}")]
    InvalidOption { field: &'static str, value: String },
    #[error("{value} is out of range for {field} ({min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("document field {0} can only be set by storing a document")]
    DocumentFieldNotSettable(&'static str),

    #[error("cannot move {direction} from stage {stage}")]
    NavigationBlocked {
        stage: Stage,
        direction: &'static str,
    },
    #[error("submit is only available from the confirmation stage (current: {0})")]
    SubmitNotAllowed(Stage),
    #[error("document slot {slot} does not belong to stage {stage}")]
    SlotNotOnStage { slot: &'static str, stage: Stage },

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write dossier file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read dossier file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to delete dossier: {0}")]
    FileDelete(std::io::Error),
    #[error("failed to serialize dossier: {0}")]
    Serialization(serde_json::Error),

    #[error("document storage error: {0}")]
    Files(#[from] dossier_files::FilesError),
}

impl From<dossier_types::IdentifierError> for DossierError {
    fn from(err: dossier_types::IdentifierError) -> Self {
        match err {
            dossier_types::IdentifierError::Empty => DossierError::MissingIdentifier,
            dossier_types::IdentifierError::Invalid(reason) => {
                DossierError::InvalidIdentifier(reason.to_string())
            }
        }
    }
}

pub type DossierResult<T> = std::result::Result<T, DossierError>;
