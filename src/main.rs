//! hktracker CLI - ingest the checklist, inspect progress, serve the API

use clap::{Parser, Subcommand};
use hktracker::config::{self, TrackerConfig};
use hktracker::query::GroupBy;
use hktracker::ui::{self, Icons, StatsTable};
use hktracker::{parser, Catalog};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hktracker")]
#[command(version)]
#[command(about = "Hollow Knight 112% completion tracker")]
#[command(long_about = r#"
hktracker loads the 112% checklist (a markdown table) into a SQLite catalog
and serves it over HTTP:
  • Filter items by found status, category, region or name
  • Completion stats overall, per region and per category
  • Group items into play sessions
  • Read-only SQL console

Example usage:
  hktracker init --checklist "HK 112% Checklist.md"
  hktracker stats
  hktracker serve --port 8000
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the checklist and load it into the database
    Init {
        /// Path to the markdown checklist
        #[arg(long)]
        checklist: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Drop and reload the items table if it is already populated
        #[arg(short, long)]
        force: bool,
    },

    /// Parse the checklist without touching the database
    Parse {
        /// Path to the markdown checklist
        #[arg(long)]
        checklist: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Checklist to ingest if the database is empty
        #[arg(long)]
        checklist: Option<PathBuf>,
    },

    /// Show completion statistics
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Break down by region or category
        #[arg(short, long, default_value = "region")]
        by: String,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a starter hktracker.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let loaded = config::load_config(cli.config.as_deref())?;
    let cfg = loaded.as_ref();

    match cli.command {
        Commands::Init { checklist, database, force } => {
            let checklist = require_checklist(checklist, cfg)?;
            let database = config::database_path(database, cfg);

            let entries = parser::parse_file(&checklist)?;
            ui::info("Checklist", &checklist.display().to_string());
            ui::info("Entries", &entries.len().to_string());

            let catalog = Catalog::open(&database)?;
            let loaded = if force {
                catalog.reinitialize(&entries)?
            } else if catalog.is_initialized()? {
                ui::warn(&format!(
                    "Database at {} is already initialized (use --force to reload)",
                    database.display()
                ));
                return Ok(());
            } else {
                catalog.initialize(&entries)?
            };

            ui::success(&format!("Loaded {} items into {}", loaded, database.display()));
        }

        Commands::Parse { checklist, format } => {
            let checklist = require_checklist(checklist, cfg)?;
            let entries = parser::parse_file(&checklist)?;

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    let marker = if entry.found {
                        Icons::FOUND.style(ui::theme().found.clone()).to_string()
                    } else {
                        Icons::MISSING.style(ui::theme().missing.clone()).to_string()
                    };
                    println!("{} {} [{} / {}]", marker, entry.name, entry.category, entry.region);
                }
                ui::section("Summary");
                ui::summary_row("Entries:", &entries.len().to_string());
                ui::summary_row(
                    "Found:",
                    &entries.iter().filter(|e| e.found).count().to_string(),
                );
            }
        }

        Commands::Serve { port, database, checklist } => {
            let database = config::database_path(database, cfg);
            let port = config::port(port, cfg);
            let catalog = Catalog::open(&database)?;

            if !catalog.is_initialized()? {
                match config::checklist_path(checklist, cfg) {
                    Some(path) => ingest(&catalog, &path)?,
                    None => ui::warn("Catalog is empty; run `hktracker init` to load the checklist"),
                }
            }

            let origins = cfg.map(|c| c.allowed_origins.clone()).unwrap_or_default();
            ui::header(&format!("Serving {} at http://0.0.0.0:{}", database.display(), port));

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(hktracker::server::start_server(port, catalog, &origins))?;
        }

        Commands::Stats { database, by } => {
            let database = config::database_path(database, cfg);
            let by: GroupBy = by.parse()?;
            let catalog = Catalog::open(&database)?;

            let overall = catalog.stats()?;
            println!("{} Completion ({})", Icons::STATS, database.display());
            println!("------------------------------------");
            println!("{}", overall);

            let mut table = StatsTable::new();
            table.add_groups(&catalog.group_stats(by)?);
            ui::section(&format!("By {}", by));
            println!("{}", table.build());
        }

        Commands::Config { command: ConfigCommands::Init { force } } => {
            let path = cli.config.clone().unwrap_or_else(config::default_config_path);
            config::write_config(&path, &TrackerConfig::starter(), force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}

fn require_checklist(flag: Option<PathBuf>, cfg: Option<&TrackerConfig>) -> anyhow::Result<PathBuf> {
    config::checklist_path(flag, cfg)
        .ok_or_else(|| anyhow::anyhow!("no checklist given (use --checklist or set `checklist` in hktracker.toml)"))
}

fn ingest(catalog: &Catalog, checklist: &Path) -> anyhow::Result<()> {
    if !checklist.exists() {
        anyhow::bail!(
            "checklist not found: {} (fix `checklist` in hktracker.toml or pass --checklist)",
            checklist.display()
        );
    }

    println!("{} Parsing checklist from {}", Icons::FILE, checklist.display());
    let entries = parser::parse_file(checklist)?;
    let loaded = catalog.initialize(&entries)?;
    println!("{} Loaded {} items into {}", Icons::DATABASE, loaded, catalog.path().display());
    Ok(())
}
