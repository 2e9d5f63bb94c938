// ABOUTME: CLI entry point for sqlite-mirror
// ABOUTME: Parses commands and routes to appropriate handlers

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sqlite_mirror::commands;
use sqlite_mirror::config;
use sqlite_mirror::rows::KeyColumnPolicy;

#[derive(Parser)]
#[command(name = "sqlite-mirror")]
#[command(about = "Diff-and-sync mirroring for SQLite databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending schema and row differences without applying them
    Diff {
        /// Source database file
        #[arg(long)]
        source: PathBuf,
        /// Destination database file
        #[arg(long)]
        dest: PathBuf,
        /// Restrict row comparison to these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
        /// Key column override in the form table=column (repeatable)
        #[arg(long = "key-column")]
        key_columns: Vec<String>,
        /// Path to a sqlite-mirror.toml with batch size and key column overrides
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Apply schema and row changes so the destination matches the source
    Sync {
        /// Source database file (never modified)
        #[arg(long)]
        source: PathBuf,
        /// Destination database file (created if missing)
        #[arg(long)]
        dest: PathBuf,
        /// Keys per delete/copy statement; 0 disables batching
        #[arg(long)]
        batch_size: Option<usize>,
        /// Apply schema changes only, skip row sync
        #[arg(long)]
        schema_only: bool,
        /// Restrict row sync to these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
        /// Key column override in the form table=column (repeatable)
        #[arg(long = "key-column")]
        key_columns: Vec<String>,
        /// Path to a sqlite-mirror.toml with batch size and key column overrides
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Export every row of each table to newline-delimited JSON snapshot files
    Export {
        /// Source database file
        #[arg(long)]
        source: PathBuf,
        /// Output directory, one file per table
        #[arg(long)]
        dir: PathBuf,
        /// Restrict the dump to these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG has highest precedence, then --log, defaulting to "info".
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Diff {
            source,
            dest,
            tables,
            key_columns,
            config,
        } => {
            let (_, policy) = resolve_options(config.as_deref(), None, &key_columns)?;
            let opts = commands::diff::DiffOptions {
                tables,
                key_columns: policy,
            };
            commands::diff::run(&source, &dest, &opts)
        }
        Commands::Sync {
            source,
            dest,
            batch_size,
            schema_only,
            tables,
            key_columns,
            config,
        } => {
            let (batch_size, policy) = resolve_options(config.as_deref(), batch_size, &key_columns)?;
            let opts = commands::sync::SyncOptions {
                batch_size,
                schema_only,
                tables,
                key_columns: policy,
            };
            commands::sync::run(&source, &dest, &opts)
        }
        Commands::Export { source, dir, tables } => {
            let opts = commands::export::ExportOptions { tables };
            commands::export::run(&source, &dir, &opts)
        }
    }
}

/// Merge config file values with CLI flags. Flags win over file values,
/// file values win over defaults.
fn resolve_options(
    config_path: Option<&std::path::Path>,
    batch_size_flag: Option<usize>,
    key_column_flags: &[String],
) -> anyhow::Result<(usize, KeyColumnPolicy)> {
    let file_config = match config_path {
        Some(path) => config::load_config(path)?,
        None => config::MirrorConfig::default(),
    };

    let batch_size = batch_size_flag
        .or(file_config.batch_size)
        .unwrap_or(sqlite_mirror::rows::applier::DEFAULT_BATCH_SIZE);

    let mut policy = KeyColumnPolicy::default();
    file_config.apply_key_columns(&mut policy);
    for flag in key_column_flags {
        let Some((table, column)) = flag.split_once('=') else {
            bail!("Invalid --key-column value '{}', expected table=column", flag);
        };
        if table.is_empty() || column.is_empty() {
            bail!("Invalid --key-column value '{}', expected table=column", flag);
        }
        policy.set_override(table, column);
    }

    Ok((batch_size, policy))
}
