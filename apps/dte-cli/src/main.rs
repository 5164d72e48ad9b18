//! # dte
//!
//! Command-line front end for the Discover → Train → Execute plan progress.
//!
//! - `dte status` — derived state of the three steps
//! - `dte complete <step>` / `dte reset` — apply transitions
//! - `dte dashboard` — open the plan view once and show any unlock notification
//! - `dte watch` — keep the plan view open, following changes from other processes
//! - `dte answer` / `dte score` — knowledge-check answers and summary
//!
//! Every process pointed at the same `--store-dir` shares one progress record.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dte_progress::Step;
use tracing_subscriber::EnvFilter;

use commands::Context;

/// Discover → Train → Execute plan progress.
#[derive(Parser)]
#[command(name = "dte", version, about)]
struct Cli {
    /// Configuration file (missing file means defaults).
    #[arg(long, default_value = "dte.toml")]
    config: PathBuf,

    /// Progress store directory (overrides `store_dir` from the config).
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Session id. Invocations with the same id share session-scoped flags;
    /// without it every invocation is a fresh session.
    #[arg(long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the derived state of each step.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Mark a step as completed.
    Complete {
        /// Step to complete (discover, train, execute).
        step: Step,
    },
    /// Clear all progress and notification flags.
    Reset,
    /// Open the plan view once.
    Dashboard {
        /// Arriving straight from the Discover flow.
        #[arg(long)]
        from_discover: bool,
    },
    /// Keep the plan view open and follow changes until `quit` or Ctrl-C.
    Watch {
        /// Arriving straight from the Discover flow.
        #[arg(long)]
        from_discover: bool,
    },
    /// Record a knowledge-check answer.
    Answer {
        /// Question identifier (e.g., "exec-q1").
        question_id: String,
        /// Zero-based index of the chosen option.
        choice: usize,
        /// Number of options the question offered.
        #[arg(long)]
        answers: usize,
        /// Zero-based index of the correct option.
        #[arg(long)]
        correct: usize,
        /// Text of the chosen option.
        #[arg(long)]
        text: Option<String>,
    },
    /// Show the knowledge-check summary.
    Score,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for `--json` output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("dte_progress=info".parse()?)
                .add_directive("dte=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let ctx = Context::open(&cli.config, cli.store_dir, cli.session.as_deref())?;

    match &cli.command {
        Commands::Status { json } => commands::progress::status(&ctx, *json),
        Commands::Complete { step } => commands::progress::complete(&ctx, *step),
        Commands::Reset => commands::progress::reset(&ctx),
        Commands::Dashboard { from_discover } => commands::view::dashboard(&ctx, *from_discover),
        Commands::Watch { from_discover } => commands::view::watch(&ctx, *from_discover),
        Commands::Answer {
            question_id,
            choice,
            answers,
            correct,
            text,
        } => commands::score::answer(&ctx, question_id, *choice, *answers, *correct, text.clone()),
        Commands::Score => commands::score::show(&ctx),
    }
}
