pub mod element_source;
pub mod osm_tables;

use std::{fs, path::{Path, PathBuf}};
use log::{info, error};

use crate::errors::Result;


/// An extract, transform, load step whose results live as files in one
/// output directory.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    /// Files this step writes into `dir`.
    fn output_paths(&self, dir: &Path) -> Vec<PathBuf>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        for path in self.output_paths(dir) {
            if !path.try_exists()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for path in self.output_paths(dir) {
            if path.try_exists()? {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn log_stage<T>(&self, stage: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!(etl_name = self.etl_name(), stage = stage, err = err.message.as_str(); "Stage failed with error");
        }
        result
    }

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let extracted = self.extract(dir);
            let input = self.log_stage("extract", extracted)?;

            info!(etl_name = self.etl_name(); "Transforming");
            let transformed = self.transform(input);
            let output = self.log_stage("transform", transformed)?;

            // Lazy outputs do their real work here.
            info!(etl_name = self.etl_name(); "Loading");
            let loaded = self.load(dir, output);
            self.log_stage("load", loaded)?;
        }
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}
