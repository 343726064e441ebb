use anyhow::{bail, Context, Result};
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

use meter_readings::{build_engine, init_logging, Config, IngestError};

/// Database used by the CLI when METER_DATABASE_PATH is not set
const DEFAULT_CLI_DATABASE: &str = "meter_readings.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut config = Config::from_env()?;
    if config.database_path.is_none() {
        config.database_path = Some(PathBuf::from(DEFAULT_CLI_DATABASE));
    }
    init_logging(config.log_format);

    match args.get(1).map(String::as_str) {
        Some("ingest") => match args.get(2) {
            Some(path) => run_ingest(&config, Path::new(path)),
            None => bail!("usage: meter-readings ingest <readings.csv>"),
        },
        Some("list") => run_list(&config),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("meter-readings {}", meter_readings::VERSION);
    println!();
    println!("USAGE:");
    println!("    meter-readings ingest <readings.csv>   Apply a meter reading upload");
    println!("    meter-readings list                    Show the current reading per account");
    println!();
    println!("Readings are stored in $METER_DATABASE_PATH (default: {})", DEFAULT_CLI_DATABASE);
}

fn run_ingest(config: &Config, csv_path: &Path) -> Result<()> {
    let engine = build_engine(config)?;

    let file = File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;

    match engine.ingest_csv(file) {
        Ok(report) => {
            println!("✓ {}", report.summary());
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Err(err @ (IngestError::StructuralParse { .. } | IngestError::ValueFormat { .. })) => {
            eprintln!("❌ Upload rejected: {}", err);
            std::process::exit(2);
        }
        Err(err) => Err(err.into()),
    }
}

fn run_list(config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let readings = engine.store().list()?;

    println!("{:<10} {:<18} {:>8}", "ACCOUNT", "READ AT", "VALUE");
    for reading in &readings {
        println!(
            "{:<10} {:<18} {:>8}",
            reading.account_id, reading.meter_reading_date_time, reading.meter_read_value
        );
    }
    println!("✓ {} accounts with readings", readings.len());

    Ok(())
}
