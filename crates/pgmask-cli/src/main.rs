mod logging;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use pgmask_core::DbMap;
use pgmask_introspect::{
    IntrospectOptions, build_map_skeleton, table_row_counts, verify_row_counts, write_row_counts,
};
use pgmask_process::{ProcessOptions, process_dump};

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] pgmask_core::Error),
    #[error("process error: {0}")]
    Process(#[from] pgmask_process::ProcessError),
    #[error("introspect error: {0}")]
    Introspect(#[from] pgmask_introspect::IntrospectError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "pgmask", version, about = "Anonymize PostgreSQL logical dumps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build or refresh a column-map skeleton from a live database.
    Map(MapArgs),
    /// Rewrite a dump file according to a column map.
    Process(ProcessArgs),
    /// Write the per-table row-count CSV for a database.
    Rowcount(RowcountArgs),
    /// Compare a row-count CSV against a database.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Database connection string.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: String,
    /// Path of the map document to write (merged if it already exists).
    #[arg(long, default_value = "map.json")]
    map_file: PathBuf,
    /// Schema name(s) to include.
    #[arg(long, value_name = "SCHEMA")]
    schema: Vec<String>,
    /// Sharded-schema prefix, recorded as `PREFIX*` in the map.
    #[arg(long, default_value = "")]
    schema_prefix: String,
    /// `schema.table` names to leave out of the map.
    #[arg(long, value_name = "SCHEMA.TABLE")]
    exclude_table: Vec<String>,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Path of the map document.
    #[arg(long, default_value = "map.json")]
    map_file: PathBuf,
    /// Source dump file.
    #[arg(long)]
    source: PathBuf,
    /// Destination for the processed dump.
    #[arg(long)]
    destination: PathBuf,
    /// SQL file injected before the processed dump.
    #[arg(long)]
    pre_process: Option<PathBuf>,
    /// SQL file injected after the processed dump.
    #[arg(long)]
    post_process: Option<PathBuf>,
    /// Draw the seed from OS entropy instead of the map document.
    #[arg(long, default_value_t = false)]
    generate_seed: bool,
    /// Fail when a dumped column has no entry in the map.
    #[arg(long, default_value_t = false)]
    inclusive: bool,
    /// Worker count; 0 means one per available core.
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Directory holding intermediate partial files.
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,
}

#[derive(Args, Debug)]
struct RowcountArgs {
    /// Database connection string.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: String,
    /// Destination CSV path.
    #[arg(long, default_value = "row_counts.csv")]
    out: PathBuf,
    /// Sharded-schema prefix for exclusion matching.
    #[arg(long, default_value = "")]
    schema_prefix: String,
    /// `schema.table` names to skip.
    #[arg(long, value_name = "SCHEMA.TABLE")]
    exclude_table: Vec<String>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Database connection string.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: String,
    /// Row-count CSV to compare against.
    #[arg(long)]
    counts: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Map(args) => run_map(args).await,
        Command::Process(args) => run_process(args),
        Command::Rowcount(args) => run_rowcount(args).await,
        Command::Verify(args) => run_verify(args).await,
    }
}

async fn run_map(args: MapArgs) -> Result<(), CliError> {
    let pool = connect(&args.conn).await?;

    let existing = if args.map_file.exists() {
        tracing::info!(event = "merging_existing_map", path = %args.map_file.display());
        Some(DbMap::load(&args.map_file)?)
    } else {
        None
    };

    let options = IntrospectOptions {
        schema_prefix: args.schema_prefix,
        schemas: args.schema,
        exclude_tables: args.exclude_table,
    };

    let timer = Instant::now();
    let map = build_map_skeleton(&pool, existing, &options).await?;
    map.save(&args.map_file)?;

    tracing::info!(
        event = "map_written",
        path = %args.map_file.display(),
        columns = map.column_maps.len(),
        duration_ms = timer.elapsed().as_millis() as u64,
    );
    Ok(())
}

fn run_process(args: ProcessArgs) -> Result<(), CliError> {
    let map = DbMap::load(&args.map_file)?;

    let options = ProcessOptions {
        source: args.source,
        destination: args.destination,
        preprocess_file: args.pre_process,
        postprocess_file: args.post_process,
        generate_seed: args.generate_seed,
        inclusive: args.inclusive,
        workers: args.workers,
        work_dir: args.work_dir,
    };

    let timer = Instant::now();
    process_dump(&map, &options)?;
    tracing::info!(
        event = "dump_processed",
        destination = %options.destination.display(),
        duration_ms = timer.elapsed().as_millis() as u64,
    );
    Ok(())
}

async fn run_rowcount(args: RowcountArgs) -> Result<(), CliError> {
    let pool = connect(&args.conn).await?;
    let counts = table_row_counts(&pool, &args.schema_prefix, &args.exclude_table).await?;
    write_row_counts(&args.out, &counts)?;
    tracing::info!(event = "row_counts_written", path = %args.out.display(), tables = counts.len());
    Ok(())
}

async fn run_verify(args: VerifyArgs) -> Result<(), CliError> {
    let pool = connect(&args.conn).await?;
    let mismatches = verify_row_counts(&pool, &args.counts).await?;
    if mismatches == 0 {
        tracing::info!(event = "row_counts_verified");
    } else {
        tracing::warn!(event = "row_counts_diverged", mismatches);
    }
    Ok(())
}

async fn connect(conn: &str) -> Result<PgPool, CliError> {
    if !conn.starts_with("postgres://") && !conn.starts_with("postgresql://") {
        return Err(CliError::InvalidConfig(format!(
            "unsupported connection string: {conn}"
        )));
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await?;
    Ok(pool)
}
