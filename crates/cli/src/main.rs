use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dossier_core::{
    data_dir_from_env_value, CoreConfig, DossierIndex, DossierReport, DossierRepository,
    SearchBy,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dossier")]
#[command(about = "Allogeneic transplant dossier management CLI")]
struct Cli {
    /// Data root holding one directory per dossier (overrides DOSSIER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all dossiers
    List {
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Search dossiers by identifier or receiver name
    Search {
        /// Case-insensitive text to look for
        query: String,
        /// What to match the query against
        #[arg(long, value_enum, default_value_t = SearchField::Identifier)]
        by: SearchField,
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Print the report of one dossier as Markdown
    Show {
        /// Patient identifier (IPP)
        id: String,
        /// Also print the share payload
        #[arg(long)]
        share: bool,
    },
    /// Delete a dossier and all its documents
    Delete {
        /// Patient identifier (IPP)
        id: String,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchField {
    Identifier,
    Name,
}

impl From<SearchField> for SearchBy {
    fn from(field: SearchField) -> Self {
        match field {
            SearchField::Identifier => SearchBy::Identifier,
            SearchField::Name => SearchBy::Name,
        }
    }
}

/// Entry point for the dossier CLI.
///
/// # Environment Variables
/// - `DOSSIER_DATA_DIR`: data root (default: "patient_uploads_allogreffe")
/// - `RUST_LOG`: log filter (default directive: "dossier=info")
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dossier=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| data_dir_from_env_value(std::env::var("DOSSIER_DATA_DIR").ok()));
    let cfg = Arc::new(CoreConfig::new(data_dir)?);
    tracing::debug!(data_dir = %cfg.data_dir().display(), "configuration resolved");

    match cli.command {
        Some(Commands::List { json }) => {
            let listing = DossierIndex::new(cfg).list_all()?;
            if listing.is_empty() && !json {
                println!("No dossiers found.");
            }
            for summary in listing.iter() {
                if json {
                    println!("{}", serde_json::to_string(&summary)?);
                    continue;
                }
                let modified = summary
                    .modified_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "IPP: {}, Receveur: {}, Donneur: {}, Tribunal: {}, Ministère: {}, Organisme: {}, Modifié: {}",
                    summary.identifier,
                    summary.receiver_name,
                    summary.donor_name,
                    summary.tribunal_status,
                    summary.ministere_status,
                    summary.organisme_status,
                    modified
                );
            }
        }
        Some(Commands::Search { query, by, json }) => {
            let matches = DossierIndex::new(cfg).search(&query, by.into())?;
            if json {
                for found in &matches {
                    println!("{}", serde_json::to_string(found)?);
                }
                return Ok(());
            }
            println!("{} result(s)", matches.len());
            for found in matches {
                println!("IPP: {}, Nom: {}", found.identifier, found.name);
            }
        }
        Some(Commands::Show { id, share }) => {
            let state = DossierRepository::new(cfg).load(&id)?;
            let report = DossierReport::from_state(&state);
            print!("{}", report.render_markdown());
            if share {
                println!("\n{}", report.share_payload());
            }
        }
        Some(Commands::Delete { id, yes }) => {
            if !yes && !confirm(&format!("Delete dossier {id} and all its documents?"))? {
                println!("Aborted.");
                return Ok(());
            }
            DossierIndex::new(cfg)
                .delete(&id)
                .with_context(|| format!("failed to delete dossier {id}"))?;
            println!("Deleted dossier {id}");
        }
        None => {
            println!("Use 'dossier --help' for commands");
        }
    }

    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "o" | "oui"))
}
