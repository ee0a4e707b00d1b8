use clap::Parser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use lib::{
    DuplicateIdPolicy, IfExists, LoadConfig, PersistConfig, PipelineError, SimpleLogger,
    TransformConfig, ValuePolicy, clean_data, load_data, save_data, write_csv, write_json,
    write_parquet,
};
use lib::structs::DEFAULT_TABLE;
use log::debug;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

const USAGE: &str = "Please provide the filepaths of the messages and categories \
datasets as the first and second argument respectively, as well as the filepath of \
the database to save the cleaned data to as the third argument. \n\nExample: \
disaster-etl disaster_messages.csv disaster_categories.csv DisasterResponse.db";

#[derive(Parser, Debug)]
#[command(author, version, about = "Clean disaster messages and load them into SQLite", long_about = None)]
struct Args {
    /// CSV file containing messages (must have an `id` column)
    messages_file: PathBuf,

    /// CSV file containing categories (`id` and `categories` columns)
    categories_file: PathBuf,

    /// SQLite database file to save the cleaned data to
    database_file: PathBuf,

    /// Name of the table written to the database
    #[arg(long, default_value_t = DEFAULT_TABLE.to_string())]
    table: String,

    /// How to treat category values other than 0 and 1
    #[arg(long, default_value = "reject")]
    value_policy: ValuePolicy,

    /// How to treat an id repeated within one input file
    #[arg(long, default_value = "reject")]
    duplicate_ids: DuplicateIdPolicy,

    /// What to do if the table already exists in the database
    #[arg(long, default_value = "fail")]
    if_exists: IfExists,

    /// Also write the cleaned table as .csv, .json and .parquet files into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Log level for output
    #[arg(long, default_value_t = false)]
    debug: bool,
}

/// Parses the command line. `Ok(None)` means the number of file paths was wrong.
fn parse_args<I, T>(argv: I) -> Result<Option<Args>, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Ok(Some(args)),
        Err(e) if is_wrong_path_count(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

fn is_wrong_path_count(e: &clap::Error) -> bool {
    match e.kind() {
        ErrorKind::MissingRequiredArgument => true,
        // An extra positional shows up as an unknown argument without a leading dash
        ErrorKind::UnknownArgument => matches!(
            e.get(ContextKind::InvalidArg),
            Some(ContextValue::String(arg)) if !arg.starts_with('-')
        ),
        _ => false,
    }
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER).map_err(|e| PipelineError::Logger(e.to_string()))?;
    log::set_max_level(log::LevelFilter::Info);

    // Wrong number of paths prints guidance and does no work
    let args = match parse_args(std::env::args_os()) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(e) => e.exit(),
    };
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }
    debug!(
        "Value policy: {:?} | Duplicate ids: {:?} | If exists: {:?}",
        args.value_policy, args.duplicate_ids, args.if_exists
    );

    let load_config = LoadConfig {
        duplicate_ids: args.duplicate_ids,
        ..LoadConfig::default()
    };
    let transform_config = TransformConfig {
        value_policy: args.value_policy,
        ..TransformConfig::default()
    };
    let persist_config = PersistConfig {
        table: args.table.clone(),
        if_exists: args.if_exists,
    };

    println!(
        "Loading data...\n    MESSAGES: {}\n    CATEGORIES: {}",
        args.messages_file.display(),
        args.categories_file.display()
    );
    let stage_start = Instant::now();
    let joined = load_data(&args.messages_file, &args.categories_file, &load_config)?;
    println!(
        "Loaded {} joined records in {:.2?}",
        joined.len(),
        stage_start.elapsed()
    );

    println!("Cleaning data...");
    let stage_start = Instant::now();
    let cleaned = clean_data(joined, &transform_config)?;
    println!(
        "Cleaned {} records with {} columns in {:.2?}",
        cleaned.len(),
        cleaned.columns.len(),
        stage_start.elapsed()
    );

    println!("Saving data...\n    DATABASE: {}", args.database_file.display());
    let stage_start = Instant::now();
    let written = save_data(&cleaned, &args.database_file, &persist_config)?;
    debug!(
        "Wrote {} rows to table {} in {:.2?}",
        written,
        persist_config.table,
        stage_start.elapsed()
    );

    if let Some(export_dir) = &args.export_dir {
        fs::create_dir_all(export_dir)?;
        let csv_path = export_dir.join(format!("{}.csv", args.table));
        let json_path = export_dir.join(format!("{}.json", args.table));
        let parquet_path = export_dir.join(format!("{}.parquet", args.table));

        let csv_start = Instant::now();
        write_csv(&cleaned, &csv_path)?;
        println!("CSV write took {:.2?}", csv_start.elapsed());

        let json_start = Instant::now();
        write_json(&cleaned, &json_path)?;
        println!("JSON write took {:.2?}", json_start.elapsed());

        let parquet_start = Instant::now();
        write_parquet(&cleaned, &parquet_path)?;
        println!("Parquet write took {:.2?}", parquet_start.elapsed());

        println!("Wrote export files to directory: {}", export_dir.display());
    }

    println!("Cleaned data saved to database!");
    debug!("Total runtime: {:.2?}", total_start.elapsed());
    Ok(())
}
