//! Dossier wizard.
//!
//! A dossier is entered through seven ordered stages. The wizard owns the [`DossierState`] of
//! the dossier on screen and is the only way the rendering layer changes it: field edits,
//! stage navigation, document attachment, submit, load and reset all go through
//! [`DossierWizard`].
//!
//! ```text
//! Receveur -> Donneur -> Tribunal -> Medical -> Ministere -> Organisme -> Confirmation
//! ```
//!
//! Navigation is linear. Submit is only available from `Confirmation` and does not move.

use crate::config::CoreConfig;
use crate::constants::STAGE_COUNT;
use crate::documents::DocumentStore;
use crate::error::{DossierError, DossierResult};
use crate::registry::{FieldKind, FieldRegistry, FieldSpec, FieldValue};
use crate::report::DossierReport;
use crate::repositories::dossiers::DossierRepository;
use crate::state::{ActivePage, DossierState};
use dossier_files::{DocumentCategory, StoredDocument};
use dossier_types::DossierId;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One step of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Receveur,
    Donneur,
    Tribunal,
    Medical,
    Ministere,
    Organisme,
    Confirmation,
}

impl Stage {
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Receveur,
        Stage::Donneur,
        Stage::Tribunal,
        Stage::Medical,
        Stage::Ministere,
        Stage::Organisme,
        Stage::Confirmation,
    ];

    /// Zero-based position in the wizard.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Stage> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Stage> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Receveur => "Receveur",
            Stage::Donneur => "Donneur",
            Stage::Tribunal => "Tribunaux",
            Stage::Medical => "Médical",
            Stage::Ministere => "Ministère",
            Stage::Organisme => "Organisme",
            Stage::Confirmation => "Confirmation",
        }
    }

    /// Attachment category collected on this stage, if any.
    pub fn document_category(self) -> Option<DocumentCategory> {
        match self {
            Stage::Tribunal => Some(DocumentCategory::Tribunal),
            Stage::Ministere => Some(DocumentCategory::Ministere),
            Stage::Organisme => Some(DocumentCategory::Organisme),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.title(), self.index() + 1, STAGE_COUNT)
    }
}

/// Marker for the step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageProgress {
    Completed,
    Active,
    Upcoming,
}

/// Upload affordance of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uploads {
    /// The stage collects no documents.
    NotApplicable,
    /// Slots that accept a document.
    Available(Vec<&'static FieldSpec>),
    /// The stage collects documents but no identifier has been entered yet; only statuses
    /// can be edited.
    Suspended,
}

/// Decides the upload affordance of `stage`. Every document stage goes through here.
fn uploads_for(stage: Stage, state: &DossierState) -> Uploads {
    let Some(category) = stage.document_category() else {
        return Uploads::NotApplicable;
    };
    if state.identifier().is_empty() {
        return Uploads::Suspended;
    }
    Uploads::Available(FieldRegistry::document_slots(category).collect())
}

/// What the rendering layer needs to draw the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView {
    pub stage: Stage,
    pub title: &'static str,
    /// Editable fields of the stage, document slots excluded.
    pub fields: Vec<&'static FieldSpec>,
    pub uploads: Uploads,
}

/// Outcome of a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub identifier: DossierId,
    pub record_path: PathBuf,
    /// Whether an existing record was replaced.
    pub updated: bool,
}

/// Drives one dossier through the wizard.
#[derive(Debug, Clone)]
pub struct DossierWizard {
    cfg: Arc<CoreConfig>,
    state: DossierState,
    repository: DossierRepository,
    documents: DocumentStore,
}

impl DossierWizard {
    /// Starts a wizard on a new dossier.
    ///
    /// # Errors
    ///
    /// Fails if the data root cannot be created.
    pub fn new(cfg: Arc<CoreConfig>) -> DossierResult<Self> {
        let documents = DocumentStore::new(cfg.clone())?;
        let repository = DossierRepository::new(cfg.clone());
        Ok(Self {
            cfg,
            state: DossierState::new(),
            repository,
            documents,
        })
    }

    pub fn state(&self) -> &DossierState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.current_step()
    }

    pub fn is_edit_mode(&self) -> bool {
        self.state.edit_mode()
    }

    pub fn active_page(&self) -> ActivePage {
        self.state.active_page()
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn get(&self, name: &str) -> DossierResult<&FieldValue> {
        self.state.get(name)
    }

    /// Edits a field. Any registered non-document field can be edited from any stage.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> DossierResult<()> {
        self.state.set(name, value)
    }

    /// Moves to the following stage.
    ///
    /// # Errors
    ///
    /// `NavigationBlocked` on the last stage; the stage is unchanged.
    pub fn next(&mut self) -> DossierResult<Stage> {
        let current = self.stage();
        let next = current.next().ok_or(DossierError::NavigationBlocked {
            stage: current,
            direction: "forward",
        })?;
        self.state.set_current_step(next);
        tracing::debug!(from = %current, to = %next, "wizard moved forward");
        Ok(next)
    }

    /// Moves to the preceding stage.
    ///
    /// # Errors
    ///
    /// `NavigationBlocked` on the first stage; the stage is unchanged.
    pub fn previous(&mut self) -> DossierResult<Stage> {
        let current = self.stage();
        let previous = current.previous().ok_or(DossierError::NavigationBlocked {
            stage: current,
            direction: "back",
        })?;
        self.state.set_current_step(previous);
        tracing::debug!(from = %current, to = %previous, "wizard moved back");
        Ok(previous)
    }

    /// Step indicator: every stage with its progress marker.
    pub fn progress(&self) -> Vec<(Stage, StageProgress)> {
        let current = self.stage();
        Stage::ALL
            .iter()
            .map(|&stage| {
                let marker = match stage.cmp(&current) {
                    std::cmp::Ordering::Less => StageProgress::Completed,
                    std::cmp::Ordering::Equal => StageProgress::Active,
                    std::cmp::Ordering::Greater => StageProgress::Upcoming,
                };
                (stage, marker)
            })
            .collect()
    }

    pub fn view(&self) -> StageView {
        let stage = self.stage();
        StageView {
            stage,
            title: stage.title(),
            fields: FieldRegistry::for_stage(stage)
                .filter(|spec| !spec.is_document())
                .collect(),
            uploads: uploads_for(stage, &self.state),
        }
    }

    /// Attaches a document to a slot of the current stage.
    ///
    /// # Errors
    ///
    /// - `UnknownField` for an unregistered slot, `TypeMismatch` for a non-document field
    /// - `SlotNotOnStage` if the slot belongs to another stage
    /// - `MissingIdentifier` while uploads are suspended; nothing is written
    /// - any document store error; the slot keeps its previous reference
    pub fn attach_document(
        &mut self,
        slot: &str,
        filename: &str,
        bytes: &[u8],
    ) -> DossierResult<StoredDocument> {
        let spec = FieldRegistry::lookup(slot)?;
        if !matches!(spec.kind, FieldKind::Document(_)) {
            return Err(DossierError::TypeMismatch {
                field: spec.name,
                expected: "document",
            });
        }

        let stage = self.stage();
        if spec.stage != stage {
            return Err(DossierError::SlotNotOnStage {
                slot: spec.name,
                stage,
            });
        }

        match uploads_for(stage, &self.state) {
            Uploads::Available(_) => {}
            Uploads::Suspended => return Err(DossierError::MissingIdentifier),
            Uploads::NotApplicable => {
                return Err(DossierError::SlotNotOnStage {
                    slot: spec.name,
                    stage,
                })
            }
        }

        self.documents.store(&mut self.state, slot, filename, bytes)
    }

    /// Persists the dossier. Only available on the confirmation stage; the stage does not
    /// change. After a successful submit the dossier is in edit mode and its identifier is
    /// locked.
    ///
    /// # Errors
    ///
    /// `SubmitNotAllowed` outside `Confirmation`, otherwise any persistence error.
    pub fn submit(&mut self) -> DossierResult<SubmitReceipt> {
        let stage = self.stage();
        if stage != Stage::Confirmation {
            return Err(DossierError::SubmitNotAllowed(stage));
        }

        let id = self.state.dossier_id()?;
        let updated = self.repository.exists(&id);
        let identifier = self.repository.save(&self.state)?;
        self.state.set_edit_mode(true);

        Ok(SubmitReceipt {
            record_path: self.cfg.record_path(&identifier),
            identifier,
            updated,
        })
    }

    /// Replaces the current dossier with the persisted one and shows it on the new-dossier
    /// page, first stage, in edit mode.
    ///
    /// # Errors
    ///
    /// Any load error; the current dossier is kept.
    pub fn load(&mut self, identifier: &str) -> DossierResult<()> {
        let mut state = self.repository.load(identifier)?;
        state.set_active_page(ActivePage::NewDossier);
        self.state = state;
        Ok(())
    }

    /// Discards the current dossier and starts a new one.
    pub fn reset(&mut self) {
        self.state.reset();
        tracing::debug!("wizard reset");
    }

    /// Switches the top-level page. Opening the new-dossier page outside edit mode starts a
    /// fresh dossier; in edit mode the loaded dossier stays on screen.
    pub fn navigate(&mut self, page: ActivePage) {
        if page == ActivePage::NewDossier && !self.is_edit_mode() {
            self.state.reset();
        }
        self.state.set_active_page(page);
        tracing::debug!(page = page.label(), "page selected");
    }

    pub fn report(&self) -> DossierReport {
        DossierReport::from_state(&self.state)
    }
}
