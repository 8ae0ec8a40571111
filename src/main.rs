mod audit;
mod data;
mod errors;
mod etl;
mod shape;
mod sink;
mod tags;
mod validate;

use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::{Error, ErrorKind, Result};
use crate::etl::osm_tables::OsmTablesEtl;
use crate::etl::Etl;

#[derive(Parser)]
#[command(version, about = "Reshape an OpenStreetMap export into CSV tables for bulk loading")]
struct Args {
    #[arg(short, long, default_value = "config/osm_tables.json")]
    config: String,

    /// Check every record against the table schema (much slower).
    #[arg(long)]
    validate: bool,

    /// Remove previously written tables before running.
    #[arg(long)]
    force: bool,
}

fn default_skip_incomplete_ways() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub reject_problem_keys: bool,
    #[serde(default = "default_skip_incomplete_ways")]
    pub skip_incomplete_ways: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| Error::new(ErrorKind::Config, format!("Could not open config file {}: {}", path, err)))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut user_config = load_user_config(&args.config)?;
    user_config.validate |= args.validate;
    setup_logging(&user_config.log_level);

    let output_dir = create_output_dir(&user_config)?;
    let mut etl = OsmTablesEtl::new(&user_config);
    if args.force {
        info!(output_dir = output_dir.display().to_string().as_str(); "Removing cached tables");
        etl.clean(&output_dir)?;
    }
    etl.process(&output_dir)?;

    Ok(())
}
