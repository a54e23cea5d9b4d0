//! oracle-pg-migrate CLI - Oracle to PostgreSQL schema and data migration.

use clap::{Parser, Subcommand};
use oracle_pg_migrate::{Config, MigrateError, MigrationOrchestrator, MigrationResult, TaskStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "oracle-pg-migrate")]
#[command(about = "Oracle to PostgreSQL schema and data migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the schema and transfer all data
    Run {
        /// Override source schema
        #[arg(long)]
        source_schema: Option<String>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Truncate target tables before transfer
        #[arg(long)]
        truncate: bool,

        /// Migrate only these tables (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,
    },

    /// Convert the schema without transferring data
    ConvertOnly,

    /// Transfer data into already-converted tables
    DataOnly {
        /// Truncate target tables before transfer
        #[arg(long)]
        truncate: bool,
    },

    /// Compare row counts between source and target
    Validate {
        /// Validate only these tables (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(MigrateError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            source_schema,
            target_schema,
            truncate,
            tables,
        } => {
            if let Some(schema) = source_schema {
                config.source.schema = schema;
            }
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if truncate {
                config.migration.truncate = true;
            }
            if !tables.is_empty() {
                config.migration.include_tables = tables;
            }

            let mut orchestrator = MigrationOrchestrator::new(config)?;
            let result = orchestrator.run()?;
            report(&result, cli.output_json)?;
        }

        Commands::ConvertOnly => {
            let mut orchestrator = MigrationOrchestrator::new(config)?;
            let result = orchestrator.convert_only()?;
            report(&result, cli.output_json)?;
        }

        Commands::DataOnly { truncate } => {
            if truncate {
                config.migration.truncate = true;
            }
            let mut orchestrator = MigrationOrchestrator::new(config)?;
            let result = orchestrator.migrate_only()?;
            report(&result, cli.output_json)?;
        }

        Commands::Validate { tables } => {
            if !tables.is_empty() {
                config.migration.include_tables = tables;
            }
            let tables = config.migration.include_tables.clone();
            let mut orchestrator = MigrationOrchestrator::new(config)?;
            let validations = orchestrator.validate(&tables)?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&validations)?);
            } else {
                for v in &validations {
                    println!(
                        "  {} {} (source: {}, target: {})",
                        if v.matched { "OK " } else { "DIFF" },
                        v.table,
                        v.source_rows,
                        v.target_rows
                    );
                }
                let mismatched = validations.iter().filter(|v| !v.matched).count();
                println!(
                    "\nValidated {} tables, {} mismatched",
                    validations.len(),
                    mismatched
                );
            }
        }
    }

    Ok(())
}

fn report(result: &MigrationResult, as_json: bool) -> Result<(), MigrateError> {
    if as_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    let rows: u64 = result.tables.iter().map(|t| t.rows_written).sum();

    let headline = match result.status {
        TaskStatus::Success => "Migration completed!",
        TaskStatus::Partial => "Migration completed with errors.",
        TaskStatus::Failed => "Migration failed.",
    };
    println!("\n{}", headline);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}/{}", result.tables_success, result.tables_total);
    println!("  Rows written: {}", rows);
    for t in result.tables.iter().filter(|t| t.error.is_some()) {
        println!(
            "  Failed: {} ({})",
            t.table,
            t.error.as_deref().unwrap_or("unknown")
        );
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
