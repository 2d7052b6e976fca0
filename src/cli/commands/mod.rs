//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod leads;
mod run;
mod serve;
mod skips;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "marketlead")]
#[command(about = "Marketplace feed crawler that turns fresh listings into leads")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the listing, lead and skip stores
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every configured city once
    Run {
        /// Only crawl these cities (by name, repeatable)
        #[arg(long = "city")]
        cities: Vec<String>,
        /// Multiplier for the randomized pauses (0 disables them)
        #[arg(long)]
        pacing: Option<f64>,
    },

    /// Start the HTTP service and the background scheduler
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default from config)
        bind: Option<String>,
    },

    /// Print the lead store as JSON
    Leads {
        /// Only the most recent N leads
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Inspect or reset the security skip table
    Skips {
        #[command(subcommand)]
        command: SkipCommands,
    },

    /// Run field extraction on a saved listing page
    Extract {
        /// HTML file of a listing page
        file: PathBuf,
        /// City to record on the printed record
        #[arg(long, default_value = "offline")]
        city: String,
    },

    /// Parse a relative posting time such as "Listed 3 hours ago"
    ParseTime {
        /// Text to parse
        text: String,
    },
}

#[derive(Subcommand)]
enum SkipCommands {
    /// List links and their checkpoint hit counts
    List,
    /// Forget one link, or every link when none is given
    Reset {
        /// Link to reset
        link: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let (settings, _config) = load_settings(options).await?;

    match cli.command {
        Commands::Run { cities, pacing } => run::cmd_run(settings, &cities, pacing).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Leads { limit } => leads::cmd_leads(&settings, limit),
        Commands::Skips { command } => match command {
            SkipCommands::List => skips::cmd_skips_list(&settings),
            SkipCommands::Reset { link } => skips::cmd_skips_reset(&settings, link.as_deref()),
        },
        Commands::Extract { file, city } => extract::cmd_extract(&file, &city),
        Commands::ParseTime { text } => {
            extract::cmd_parse_time(&text);
            Ok(())
        }
    }
}
