//! viewdb CLI
//!
//! Command-line interface for querying and loading a viewdb data directory.

use std::collections::BTreeMap;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use viewdb::importer::DEFAULT_IMPORT_PATH;
use viewdb::{Column, Config, Engine, FieldValue, Importer, Query, Record, Result, StoreError};

/// viewdb CLI
#[derive(Parser, Debug)]
#[command(name = "viewdb")]
#[command(about = "Embedded columnar record store for viewing records")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, global = true, default_value = ".")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query with select, order and filter
    Query {
        /// Columns to print
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,

        /// Columns to order by; the last one is the primary key
        #[arg(short, long, value_delimiter = ',')]
        order: Vec<String>,

        /// key=value equality filters
        #[arg(short, long, value_delimiter = ',')]
        filter: Vec<String>,
    },

    /// Import a pipe-delimited file
    Import {
        /// File to import
        #[arg(default_value = DEFAULT_IMPORT_PATH)]
        file: String,
    },

    /// Print the record stored under a key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete the record stored under a key
    Delete {
        /// The key to delete
        key: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,viewdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder().data_dir(&args.data_dir).build();
    let mut engine = Engine::open(config)?;

    match args.command {
        Commands::Query {
            select,
            order,
            filter,
        } => {
            let query = Query::new()
                .select(select)
                .order(order)
                .filter_clause(parse_filters(&filter)?);
            let results = engine.query(&query);
            for record in &results {
                println!("{}", render(record, &query.select_columns));
            }
            println!("({} rows)", results.len());
        }
        Commands::Import { file } => {
            let summary = Importer::new(file).import(&mut engine)?;
            println!(
                "imported {} rows ({} new, {} updated)",
                summary.rows_read, summary.inserted, summary.updated
            );
        }
        Commands::Get { key } => {
            let record = engine.get(&key)?;
            println!("{}", record);
        }
        Commands::Delete { key } => {
            engine.delete(&key)?;
            println!("deleted {}", key);
        }
    }

    engine.close()
}

/// Parse `column=value` pairs, typing each value by its column
fn parse_filters(raw: &[String]) -> Result<BTreeMap<String, FieldValue>> {
    let mut clause = BTreeMap::new();
    for pair in raw {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| StoreError::Parse(format!("filter {:?} is not key=value", pair)))?;
        let name = name.trim();
        let value = match name.parse::<Column>() {
            Ok(column) => column.parse_value(value)?,
            Err(_) => {
                tracing::warn!(column = name, "unknown filter column matches nothing");
                FieldValue::from(value)
            }
        };
        clause.insert(name.to_string(), value);
    }
    Ok(clause)
}

/// Pipe-join the selected columns, or the whole record when none are selected
fn render(record: &Record, select: &[String]) -> String {
    if select.is_empty() {
        return record.to_string();
    }
    select
        .iter()
        .map(|name| {
            record
                .field_value(name)
                .map(|value| value.to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("|")
}
