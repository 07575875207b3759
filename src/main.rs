//! Repokit CLI - inspect and edit the session table and its id counter

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use repokit::config::Settings;
use repokit::tables::{SessionFilter, SessionKey, SESSION_COUNTER_TABLE};
use repokit::ui;
use repokit::Dao;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "repokit")]
#[command(version = "0.0.1")]
#[command(about = "Typed repositories over SQLite - manage sessions and their id counter")]
#[command(long_about = r#"
Repokit keeps a `session` table and a `session_counter` id counter in a
single SQLite file.

Example usage:
  repokit init
  repokit session add "warmup"
  repokit session list --json
  repokit counter show
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: repokit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Operate on the session id counter
    Counter {
        #[command(subcommand)]
        action: CounterAction,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum CounterAction {
    /// Print the next id to be allocated
    Show,
    /// Advance the counter by one
    Increment,
    /// Set the counter back to 1
    Reset,
    /// Set the counter to a value
    Set { value: i64 },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Add a session
    Add {
        label: String,

        /// Explicit id (allocated from the counter when omitted)
        #[arg(long)]
        id: Option<i64>,
    },

    /// List sessions
    List {
        /// Only sessions with this label
        #[arg(short, long)]
        label: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one session
    Show { id: i64 },

    /// Remove sessions; either every id is removed or none is
    Remove {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let base = std::env::current_dir()?;

    match cli.command {
        Commands::Init { force } => {
            let settings = Settings::fresh(cli.config, cli.database, &base);
            settings.config.save(&settings.config_path, force)?;
            settings.open_store()?;

            ui::config_written(&settings.config_path, &settings.db_path);
        }

        Commands::Counter { action } => {
            let store = Settings::resolve(cli.config, cli.database, &base)?.open_store()?;

            match action {
                CounterAction::Show => {}
                CounterAction::Increment => store.counter.increment_counter()?,
                CounterAction::Reset => store.counter.reset_counter()?,
                CounterAction::Set { value } => store.counter.insert_counter(value)?,
            }
            ui::counter_value(SESSION_COUNTER_TABLE, store.counter.select_counter()?);
        }

        Commands::Session { action } => {
            let settings = Settings::resolve(cli.config, cli.database, &base)?;
            let store = settings.open_store()?;

            match action {
                SessionAction::Add { label, id } => {
                    let session = store.add(label, id)?;
                    ui::session_added(&session);
                }

                SessionAction::List { label, json } => {
                    let sessions = match label {
                        Some(label) => store.sessions.select_where(&SessionFilter { label: Some(label) })?,
                        None => store.sessions.select_all()?,
                    };

                    if json {
                        println!("{}", serde_json::to_string_pretty(&sessions)?);
                    } else {
                        ui::session_listing(&sessions, &settings.db_path);
                    }
                }

                SessionAction::Show { id } => match store.sessions.select(&SessionKey::new(id)) {
                    Ok(session) => ui::session_detail(&session),
                    Err(e) if e.is_not_found() => ui::session_missing(id),
                    Err(e) => return Err(e.into()),
                },

                SessionAction::Remove { ids } => {
                    let keys: Vec<SessionKey> = ids.iter().copied().map(SessionKey::new).collect();
                    match store.sessions.delete_all(&keys) {
                        Ok(removed) => ui::sessions_removed(removed, keys.len()),
                        Err(e) => {
                            ui::failure("Nothing was removed");
                            return Err(e.into());
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
