//! oxide-schema CLI
//!
//! Command-line tool for creating, rebuilding and inspecting tables.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::config::DEFAULT_DATABASE_URL;
use oxide_schema::prelude::*;

/// Runtime table creation and alteration for SQLite.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database: String,

    /// Maximum pooled connections (always 1 for in-memory databases).
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the built-in application tables and the default project.
    Init,

    /// Create a table from a JSON table spec.
    Create {
        /// Spec file, or `-` for stdin.
        #[arg(short, long)]
        spec: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild an existing table into the shape of a JSON table spec.
    Update {
        /// Table to rebuild.
        table: String,

        /// Spec file, or `-` for stdin. A `name` in the file renames the table.
        #[arg(short, long)]
        spec: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the live schema as JSON.
    Schema {
        /// Only this table.
        #[arg(short, long)]
        table: Option<String>,
    },
}

fn read_spec(path: &Path) -> anyhow::Result<TableSpec> {
    let raw = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_sql(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = DatabaseConfig::new(&cli.database)
        .max_connections(cli.max_connections)
        .connect()
        .await?;
    let coordinator = SchemaCoordinator::new(pool);

    match cli.command {
        Commands::Init => {
            info!("Ensuring built-in tables...");
            let created = ensure_builtin_tables(&coordinator).await?;
            if created.is_empty() {
                info!("All built-in tables already exist.");
            } else {
                info!(tables = ?created, "Built-in tables created.");
            }
        }

        Commands::Create { spec, dry_run } => {
            let spec = read_spec(&spec)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                print_sql(&coordinator.preview_create(&spec).await?);
            } else {
                print_json(&coordinator.create_table(&spec).await?)?;
            }
        }

        Commands::Update {
            table,
            spec,
            dry_run,
        } => {
            let spec = read_spec(&spec)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                print_sql(&coordinator.preview_update(&table, &spec).await?);
            } else {
                print_json(&coordinator.update_table(&table, &spec).await?)?;
            }
        }

        Commands::Schema { table } => match table {
            Some(table) => print_json(&coordinator.table_schema(&table).await?)?,
            None => print_json(&coordinator.get_schema().await?)?,
        },
    }

    Ok(())
}
