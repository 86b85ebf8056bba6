//! Schema migration runner
//!
//! Usage:
//!   migrate [--config <path>] [--dir <path>] [--verbose] <up|down [--all]|status>
//!
//! Commands:
//!   up       Apply every pending migration in the migrations directory
//!   down     Roll back the highest-versioned applied migration (`--all` for every one)
//!   status   List applied migrations
//!
//! Environment:
//!   DB_URL   SQLite connection string (required)

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use hello_world::{
    db::{self, MigrationTracker, Migrator},
    models::{ApplyOutcome, MigrationStatus, RollbackOutcome},
    AppConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Up,
    Down { all: bool },
    Status,
}

#[derive(Debug, Default)]
struct Options {
    command: Option<Command>,
    config_path: Option<PathBuf>,
    migrations_dir: Option<PathBuf>,
    verbose: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut down_all = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "--dir" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| format!("Missing value for {}", args[i]))?;
                if args[i] == "--config" {
                    options.config_path = Some(PathBuf::from(value));
                } else {
                    options.migrations_dir = Some(PathBuf::from(value));
                }
                i += 1;
            }
            "--all" => down_all = true,
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => options.help = true,
            arg if options.command.is_none() && !arg.starts_with('-') => {
                options.command = Some(match arg {
                    "up" => Command::Up,
                    "down" => Command::Down { all: false },
                    "status" => Command::Status,
                    other => return Err(format!("Unknown command: {}", other)),
                });
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    match options.command {
        Some(Command::Down { .. }) => options.command = Some(Command::Down { all: down_all }),
        _ if down_all => return Err("--all is only valid with down".to_string()),
        _ => {}
    }

    Ok(options)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            return ExitCode::FAILURE;
        }
    };

    if options.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let Some(command) = options.command else {
        print_help();
        return ExitCode::FAILURE;
    };

    let log_level = if options.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(command, &options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, options: &Options) -> Result<()> {
    if let Some(ref path) = options.config_path {
        env::set_var("HELLO_CONFIG", path);
    }
    let mut config = AppConfig::load()?;
    if let Some(ref dir) = options.migrations_dir {
        config.migrations.dir = dir.clone();
    }
    config.database.max_connections = 1;

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to create migrator")?;
    let tracker = MigrationTracker::with_table(pool.clone(), config.migrations.table.clone());

    let result = match command {
        Command::Up => {
            // Read at apply time so edits to the directory are picked up per run
            let units = db::load_dir(&config.migrations.dir)?;
            info!(
                "Loaded {} migration(s) from {:?}",
                units.len(),
                config.migrations.dir
            );
            up(&Migrator::new(tracker, units)).await
        }
        Command::Down { all } => {
            let units = db::load_dir(&config.migrations.dir)?;
            down(&Migrator::new(tracker, units), all).await
        }
        Command::Status => status(&tracker).await,
    };

    pool.close().await;
    result
}

async fn up(migrator: &Migrator) -> Result<()> {
    let outcomes = migrator.up().await.context("Migration up failed")?;

    for (version, outcome) in outcomes {
        match outcome {
            ApplyOutcome::Applied => println!("Applied migration: {}", version),
            ApplyOutcome::AlreadyApplied => {
                println!("Migration {} already applied, skipping", version)
            }
        }
    }
    println!("Migration completed successfully!");
    Ok(())
}

async fn down(migrator: &Migrator, all: bool) -> Result<()> {
    let outcomes = if all {
        migrator.down_all().await
    } else {
        migrator.down().await.map(|o| o.into_iter().collect())
    }
    .context("Migration down failed")?;

    if outcomes.is_empty() {
        println!("No migrations applied, nothing to roll back");
    }
    for (version, outcome) in outcomes {
        match outcome {
            RollbackOutcome::RolledBack => println!("Rolled back migration: {}", version),
            RollbackOutcome::NotApplied => {
                println!("Migration {} not applied, nothing to roll back", version)
            }
        }
    }
    println!("Migration rollback completed!");
    Ok(())
}

async fn status(tracker: &MigrationTracker) -> Result<()> {
    let status = tracker
        .status()
        .await
        .context("Failed to get migration status")?;

    match status {
        MigrationStatus::NoTrackingTable => {
            println!("Migrations table does not exist. No migrations have been run.");
        }
        MigrationStatus::Tracked(records) => {
            println!("Applied migrations:");
            if records.is_empty() {
                println!("  No migrations have been applied.");
            }
            for record in records {
                println!(
                    "  {} (applied at: {})",
                    record.version,
                    record.applied_at.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"migrate {}

USAGE:
    migrate [OPTIONS] <COMMAND>

COMMANDS:
    up              Apply every pending migration
    down            Roll back the highest-versioned applied migration
    down --all      Roll back every applied migration, highest version first
    status          List applied migrations

OPTIONS:
    --config <path> Path to configuration file
    --dir <path>    Migrations directory (default: migrations)
    -v, --verbose   Enable debug output
    -h, --help      Print this help message

ENVIRONMENT:
    DB_URL          SQLite connection string (required)"#,
        env!("CARGO_PKG_VERSION")
    );
}
