//! # cvrag CLI
//!
//! ```bash
//! cvrag --config ./config/cvrag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cvrag init` | Create the SQLite database and schema |
//! | `cvrag ingest --doc <tag>=<path>...` | Extract, chunk and index documents |
//! | `cvrag retrieve "<query>"` | One filtered, deduplicated retrieval |
//! | `cvrag context cv` | Job analysis plus candidate superset |
//! | `cvrag context cover-letter` | Job and company plus relevant background |
//! | `cvrag context section <name>` | Context for one CV section |
//! | `cvrag context jd` / `background` | Job-only or candidate-only context |
//! | `cvrag summarize [file]` | Character, word and source counts |
//! | `cvrag stats` | What is indexed, per source tag |
//!
//! ## Examples
//!
//! ```bash
//! cvrag init
//! cvrag ingest --doc job_description=./jd.pdf --doc experience_superset=./experience.md
//! cvrag context cover-letter --company "open source culture" --summary
//! cvrag context section skills | cvrag summarize
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cvrag::commands::{self, ContextKind};
use cvrag::ingest::DocSpec;
use cvrag::{config, ingest, logging, migrate, stats};
use cvrag_core::Section;

/// Retrieval-augmented context assembly for tailored CVs and cover letters.
#[derive(Parser)]
#[command(name = "cvrag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cvrag.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest documents, replacing anything stored under the same tag.
    Ingest {
        /// Document as `<source_tag>=<path>`, e.g. `job_description=./jd.pdf`.
        #[arg(long = "doc", required = true)]
        docs: Vec<DocSpec>,
    },

    /// Run one retrieval and print the assembled context.
    Retrieve {
        query: String,

        /// Keep only chunks whose source tag contains this value (repeatable).
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Build a named context bundle.
    Context {
        #[command(subcommand)]
        kind: ContextCommand,

        /// Append character, word, paragraph and source counts.
        #[arg(long, global = true)]
        summary: bool,
    },

    /// Summarize a context string from a file or stdin.
    Summarize {
        file: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Show document, chunk and embedding counts.
    Stats,
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Context for CV generation.
    Cv,
    /// Context for a cover letter.
    CoverLetter {
        /// Replaces the default company-culture query.
        #[arg(long)]
        company: Option<String>,
    },
    /// Context for one CV section: career_summary, experience, skills or cover_letter.
    Section { name: Section },
    /// Job description context only.
    Jd {
        /// Custom query (repeatable). Defaults to the built-in job queries.
        #[arg(long = "query")]
        queries: Vec<String>,
    },
    /// Candidate background context only.
    Background {
        #[arg(long)]
        skill_focus: Option<String>,
    },
}

impl From<ContextCommand> for ContextKind {
    fn from(cmd: ContextCommand) -> Self {
        match cmd {
            ContextCommand::Cv => ContextKind::Cv,
            ContextCommand::CoverLetter { company } => ContextKind::CoverLetter { company },
            ContextCommand::Section { name } => ContextKind::Section(name),
            ContextCommand::Jd { queries } => ContextKind::JobDescription { queries },
            ContextCommand::Background { skill_focus } => ContextKind::Background { skill_focus },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Needs no database.
    if let Commands::Summarize { file, json } = &cli.command {
        return commands::run_summarize(file.as_deref(), *json);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { docs } => {
            ingest::run_ingest(&cfg, &docs).await?;
        }
        Commands::Retrieve {
            query,
            sources,
            json,
        } => {
            commands::run_retrieve(&cfg, &query, &sources, json).await?;
        }
        Commands::Context { kind, summary } => {
            commands::run_context(&cfg, &kind.into(), summary).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Summarize { .. } => {}
    }

    Ok(())
}
