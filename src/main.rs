use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use threadview_core::{demo_forest, CommentStore, Forest};
use threadview_ui::{build_rows, plain_text, UiConfig, UiStates};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod script;

#[derive(Parser)]
#[command(name = "threadview")]
#[command(about = "Nested comment threads in the terminal", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.threadview/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive comment view
    Tui {
        /// Start from a thread exported as JSON
        #[arg(long)]
        load: Option<PathBuf>,
        /// Start with no comments
        #[arg(long, conflicts_with = "load")]
        empty: bool,
    },
    /// Apply a script of comment operations and print the resulting thread
    Run {
        /// Script file, one command per line
        script: PathBuf,
        /// Print the thread as JSON
        #[arg(long)]
        json: bool,
        /// Author until the script says otherwise (defaults to the configured user name)
        #[arg(long)]
        author: Option<String>,
        /// Start from the sample thread
        #[arg(long)]
        demo: bool,
    },
    /// Print the sample thread
    Demo {
        /// Print the thread as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // the TUI owns the terminal, so it only logs when given a file
    let log_to_stderr = !matches!(cli.command, Commands::Tui { .. });
    init_logging(cli.log_file.as_deref(), log_to_stderr)?;

    let config = match &cli.config {
        Some(path) => UiConfig::load_from(path)?,
        None => UiConfig::load()?,
    };

    match cli.command {
        Commands::Tui { load, empty } => {
            let forest = if let Some(path) = load {
                load_forest(&path)?
            } else if empty || !config.seed_demo {
                Forest::new()
            } else {
                demo_forest()
            };
            info!(comments = forest.len(), "starting tui");
            threadview_ui::run_tui(config, forest)?;
        }
        Commands::Run { script: path, json, author, demo } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading script {}", path.display()))?;
            let parsed = script::Script::parse(&text)?;

            let start = if demo { demo_forest() } else { Forest::new() };
            let mut store = CommentStore::from_forest(start)?;
            let author = author.unwrap_or_else(|| config.user_name.clone());
            let options = script::RunOptions {
                author: &author,
                now: Utc::now(),
                date_format: &config.date_format,
                indent_width: usize::from(config.indent_width),
            };

            let stdout = io::stdout();
            let report = script::run(&parsed, &mut store, &options, &mut stdout.lock())?;
            for (line, err) in &report.rejected {
                eprintln!("line {}: {}", line, err);
            }

            print_forest(store.forest(), &config, json)?;
            if !report.rejected.is_empty() {
                eprintln!(
                    "{} applied, {} rejected",
                    report.applied,
                    report.rejected.len()
                );
            }
        }
        Commands::Demo { json } => {
            print_forest(&demo_forest(), &config, json)?;
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>, to_stderr: bool) -> Result<()> {
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if to_stderr {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

fn load_forest(path: &Path) -> Result<Forest> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Forest::from_json(&json).with_context(|| format!("loading comments from {}", path.display()))
}

fn print_forest(forest: &Forest, config: &UiConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", forest.to_json()?);
    } else {
        let rows = build_rows(forest, &UiStates::new(), Utc::now(), &config.date_format);
        print!("{}", plain_text(forest, &rows, usize::from(config.indent_width)));
    }
    Ok(())
}
