//! Dossier report.
//!
//! A read-only summary of a dossier, built from a [`DossierState`] snapshot for the
//! confirmation stage and for `dossier show`. Every value is read leniently: a report can be
//! built from a dossier that was never filled in.
//!
//! Markdown rendering escapes operator-entered text so a name or address can never inject
//! headings, emphasis, links or code into the rendered document.

use crate::registry::FieldRegistry;
use crate::state::DossierState;
use dossier_files::DocumentCategory;

/// Shown in place of an empty value.
const MISSING: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportItem {
    Entry { label: &'static str, value: String },
    Check { label: &'static str, done: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: &'static str,
    pub items: Vec<ReportItem>,
}

/// Summary of one dossier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DossierReport {
    pub identifier: String,
    pub receiver_name: String,
    /// Whether the dossier already exists and is being updated.
    pub updating: bool,
    pub sections: Vec<ReportSection>,
}

impl DossierReport {
    pub fn from_state(state: &DossierState) -> Self {
        let entry = |label, value: String| ReportItem::Entry { label, value };
        let date = |name: &str| {
            state
                .get(name)
                .ok()
                .and_then(|v| v.as_date())
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_default()
        };

        let receiver = ReportSection {
            title: "Récapitulatif Receveur",
            items: vec![
                entry("IPP", state.identifier().to_string()),
                entry("Nom Complet", state.receiver_full_name()),
                entry("Date de Naissance", date("receveur_date_naissance")),
                entry("Sexe", state.text("receveur_sexe").to_string()),
                entry("Groupage", state.text("receveur_groupage").to_string()),
                entry("Organisme", state.text("receveur_organisme").to_string()),
            ],
        };

        let donor = ReportSection {
            title: "Récapitulatif Donneur",
            items: vec![
                entry("Nom Complet", state.donor_full_name()),
                entry("Date de Naissance", date("donneur_date_naissance")),
                entry("Groupage", state.text("donneur_groupage").to_string()),
            ],
        };

        let approvals = ReportSection {
            title: "Statuts des Accords",
            items: vec![
                entry("Tribunal", state.text("accord_tribunal").to_string()),
                entry("Ministère", state.text("accord_ministere").to_string()),
                entry("Organisme", state.text("organisme_accord_statut").to_string()),
                entry(
                    "Nom de l'organisme",
                    state.text("organisme_accord_nom_specifique").to_string(),
                ),
                entry(
                    "Date de validation",
                    date("organisme_accord_date_validation"),
                ),
            ],
        };

        let exams = ReportSection {
            title: "Examens Médicaux",
            items: FieldRegistry::exams()
                .map(|spec| ReportItem::Check {
                    label: spec.label,
                    done: state
                        .get(spec.name)
                        .ok()
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                })
                .collect(),
        };

        let documents = ReportSection {
            title: "Documents",
            items: DocumentCategory::ALL
                .iter()
                .map(|&category| {
                    let slots: Vec<_> = FieldRegistry::document_slots(category).collect();
                    let attached = slots
                        .iter()
                        .filter(|spec| state.document(spec.name).is_some())
                        .count();
                    entry(category_label(category), format!("{attached}/{}", slots.len()))
                })
                .collect(),
        };

        Self {
            identifier: state.identifier().to_string(),
            receiver_name: state.receiver_full_name(),
            updating: state.edit_mode(),
            sections: vec![receiver, donor, approvals, exams, documents],
        }
    }

    /// Text meant to be encoded in the dossier's QR code.
    pub fn share_payload(&self) -> String {
        format!(
            "IPP: {}\nPatient: {}",
            or_missing(&self.identifier),
            self.receiver_name
        )
    }

    /// Renders the report as Markdown.
    ///
    /// Format produced:
    /// ```markdown
    /// # Dossier IPP-001
    ///
    /// ## Récapitulatif Receveur
    ///
    /// - **IPP:** IPP-001
    /// - **Nom Complet:** Ali Ben
    ///
    /// ## Examens Médicaux
    ///
    /// - [x] FISH
    /// - [ ] Typage HLA
    /// ```
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Dossier {}\n", escape_inline(or_missing(&self.identifier)));
        if self.updating {
            out.push_str("\n_Mise à jour d'un dossier existant._\n");
        }

        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n", section.title));
            for item in &section.items {
                let line = match item {
                    ReportItem::Entry { label, value } => {
                        format!("- **{label}:** {}\n", escape_inline(or_missing(value)))
                    }
                    ReportItem::Check { label, done } => {
                        format!("- [{}] {label}\n", if *done { "x" } else { " " })
                    }
                };
                out.push_str(&line);
            }
        }

        out
    }
}

fn category_label(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::Tribunal => "Tribunal",
        DocumentCategory::Ministere => "Ministère",
        DocumentCategory::Organisme => "Organisme",
    }
}

fn or_missing(value: &str) -> &str {
    if value.trim().is_empty() {
        MISSING
    } else {
        value
    }
}

/// Escapes Markdown syntax in a single-line value. Line breaks are folded into spaces.
fn escape_inline(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '#' | '[' | ']' | '<' | '>' | '|' | '!' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}
