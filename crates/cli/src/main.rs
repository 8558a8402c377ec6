//! Scrivener CLI: the main entry point.
//!
//! Commands:
//! - `init`      Write a default config file
//! - `write`     Interactive draft-and-revise session against a library
//! - `entities`  List stored entities
//! - `outline`   Show recent chapter outlines
//! - `rollback`  Drop entity history after a timestamp
//! - `forget`    Delete an entity
//! - `patch`     Apply edit instructions to a text file offline

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod ui;

#[derive(Parser)]
#[command(
    name = "scrivener",
    about = "Scrivener: iterative long-form writing with line-level revision",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Library directory (overrides `library.dir` from the config)
    #[arg(short, long, global = true, env = "SCRIVENER_LIBRARY")]
    library: Option<PathBuf>,

    /// Color output: always, never or auto
    #[arg(long, global = true, default_value = "auto")]
    color: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Start an interactive writing session
    Write,

    /// List stored entities, optionally only the named ones
    Entities {
        /// Entity names to show
        names: Vec<String>,
    },

    /// Show the most recent chapter outlines
    Outline {
        /// How many outlines to show
        #[arg(short = 'k', long, default_value_t = 3)]
        count: usize,
    },

    /// Drop entity history newer than a timestamp (YYYYMMDDHHMM)
    Rollback {
        stamp: String,
    },

    /// Delete an entity by name
    Forget {
        name: String,
    },

    /// Apply edit instructions to a text file
    Patch {
        /// The text file to revise
        file: PathBuf,

        /// File holding `<line>.<op>.<text>` instructions
        instructions: PathBuf,

        /// Overwrite the file with the merged text instead of printing it
        #[arg(short, long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let color = ui::ColorMode::from_flag(&cli.color)
        .ok_or_else(|| format!("Invalid color mode '{}': use always, never or auto", cli.color))?;
    let style = ui::Style::new(color);
    let library = cli.library;

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Write => commands::write::run(library, style).await?,
        Commands::Entities { names } => commands::library::entities(library, names).await?,
        Commands::Outline { count } => commands::library::outline(library, count).await?,
        Commands::Rollback { stamp } => commands::library::rollback(library, &stamp).await?,
        Commands::Forget { name } => commands::library::forget(library, &name).await?,
        Commands::Patch {
            file,
            instructions,
            write,
        } => commands::patch::run(&file, &instructions, write, style).await?,
    }

    Ok(())
}
