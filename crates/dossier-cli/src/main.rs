mod commands;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use dossier_core::session::{ReportSource, ReportType};
use dossier_core::{paths, DossierConfig, DossierContext};

// ============================================================================
// CLI Types
// ============================================================================

/// Dossier - run research against a streaming research server and keep the reports
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config directory (defaults to $DOSSIER_CONFIG_DIR or ~/.config/dossier)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a research session and print the report
    Run {
        /// What to research
        query: String,

        /// research_report, deep or multi_agent
        #[arg(long, default_value = "research_report")]
        report_type: ReportType,

        /// web, static, local or hybrid
        #[arg(long, default_value = "web")]
        source: ReportSource,

        /// Source URL for static or hybrid research (repeatable)
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,

        /// Let the server add web sources to the given URLs
        #[arg(long)]
        complement: bool,

        /// Uploaded document id for local or hybrid research (repeatable)
        #[arg(long = "document", value_name = "ID")]
        documents: Vec<String>,

        /// Also write the finished report as markdown into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },

    /// Browse saved reports
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage documents on the research server
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List saved reports, newest first
    List,
    /// Print one saved report
    Show { id: String },
    /// Find reports whose query or text contains a keyword
    Search { keyword: String },
    /// Delete a saved report
    Delete { id: String },
    /// Write a saved report as markdown
    Export {
        id: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Show storage statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum DocsAction {
    /// List uploaded documents
    List,
    /// Upload a file
    Upload { path: PathBuf },
    /// Delete an uploaded document
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective config
    Show,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => paths::default_config_dir().map_err(|e| anyhow!(e))?,
    };

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config::show(&config_dir),
            ConfigAction::Init { force } => commands::config::init(&config_dir, *force),
        };
    }

    let config = DossierConfig::load(&config_dir)?;
    let ctx = DossierContext::builder()
        .config_dir(config_dir)
        .config(config)
        .build();

    match cli.command {
        Commands::Run {
            query,
            report_type,
            source,
            urls,
            complement,
            documents,
            export,
        } => {
            let params = dossier_core::SubmitParams {
                query,
                report_type,
                report_source: source,
                source_urls: urls,
                complement_source_urls: complement,
                document_ids: documents,
            };
            commands::run::run(&ctx, params, export.as_deref()).await
        }
        Commands::History { action } => match action {
            HistoryAction::List => commands::history::list(&ctx),
            HistoryAction::Show { id } => commands::history::show(&ctx, &id),
            HistoryAction::Search { keyword } => commands::history::search(&ctx, &keyword).await,
            HistoryAction::Delete { id } => commands::history::delete(&ctx, &id),
            HistoryAction::Export { id, out } => commands::history::export(&ctx, &id, &out),
            HistoryAction::Stats => commands::history::stats(&ctx),
        },
        Commands::Docs { action } => match action {
            DocsAction::List => commands::docs::list(&ctx).await,
            DocsAction::Upload { path } => commands::docs::upload(&ctx, &path).await,
            DocsAction::Delete { id } => commands::docs::delete(&ctx, &id).await,
        },
        Commands::Config { .. } => Ok(()),
    }
}
