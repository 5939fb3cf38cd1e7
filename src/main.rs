use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commitlore::storage::DbLogLayer;

#[derive(Parser)]
#[command(name = "commitlore")]
#[command(
    version,
    about = "Mines a repository's commit history and enriches it with LLM classification and summaries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize commitlore in the current directory
    Init {
        #[arg(help = "Path to the repository to mine (defaults to '.')")]
        repo: Option<PathBuf>,
    },

    /// Run the pipeline: extract, filter, normalize, checkpoint, enrich
    Run {
        #[arg(long, help = "Repository path override")]
        repo: Option<PathBuf>,
        #[arg(long, help = "Branch to walk (repository HEAD when unset)")]
        branch: Option<String>,
        #[arg(long, short, help = "Experiment name (working checkpoint)")]
        experiment: Option<String>,
        #[arg(long, help = "LLM provider (ollama, openai)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(
            long,
            help = "Re-run the persistence fan-out for every record without recomputing fields"
        )]
        repersist: bool,
        #[arg(long, help = "Clear summary rows and index documents before running")]
        fresh: bool,
    },

    /// Show checkpoint and enrichment progress
    Status,

    /// Index the repository's documentation files
    IndexDocs {
        #[arg(help = "Directory to scan (defaults to the configured repository)")]
        path: Option<PathBuf>,
    },

    /// Score predicted categories against a hand-labeled sample
    Validate {
        #[arg(help = "Labels file, one category per line, oldest labeled commit first")]
        labels: Option<PathBuf>,
    },

    /// Clean up experiment state
    Clean {
        #[arg(long, help = "Remove everything, including the raw checkpoint")]
        all: bool,
        #[arg(long, help = "Only delete summary rows")]
        summaries: bool,
        #[arg(long, help = "Only clear index collections")]
        documents: bool,
        #[arg(long, help = "Only remove the experiment checkpoint")]
        checkpoints: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Output as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize the global configuration file
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31mcommitlore panicked:\x1b[0m {}", message);
        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mat {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // Pipeline commands mirror their log events into the database, so the
    // database handle is opened before the subscriber is installed. Failures
    // here (e.g. uninitialized project) are reported by the command itself.
    let db_handle = match &cli.command {
        Commands::Run { .. } => commitlore::cli::commands::open_database().ok(),
        _ => None,
    };
    let db_layer = db_handle.clone().map(DbLogLayer::new);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(db_layer)
        .init();

    match cli.command {
        Commands::Init { repo } => {
            commitlore::cli::commands::init::run(repo)?;
        }
        Commands::Run {
            repo,
            branch,
            experiment,
            provider,
            model,
            repersist,
            fresh,
        } => {
            let options = commitlore::cli::commands::run::RunOptions {
                repo,
                branch,
                experiment,
                provider,
                model,
                repersist,
                fresh,
            };
            let rt = Runtime::new()?;
            rt.block_on(commitlore::cli::commands::run::run(options, db_handle))?;
        }
        Commands::Status => {
            commitlore::cli::commands::status::run()?;
        }
        Commands::IndexDocs { path } => {
            let rt = Runtime::new()?;
            rt.block_on(commitlore::cli::commands::index_docs::run(path))?;
        }
        Commands::Validate { labels } => {
            commitlore::cli::commands::validate::run(labels)?;
        }
        Commands::Clean {
            all,
            summaries,
            documents,
            checkpoints,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commitlore::cli::commands::clean::run(
                all,
                summaries,
                documents,
                checkpoints,
            ))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                commitlore::cli::commands::config::show(json)?;
            }
            ConfigAction::Path => {
                commitlore::cli::commands::config::path()?;
            }
            ConfigAction::Init { force } => {
                commitlore::cli::commands::config::init_global(force)?;
            }
        },
    }

    Ok(())
}
