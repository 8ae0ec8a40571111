use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::UserConfig;
use crate::data::osm::ElementKind;
use crate::data::tables::{ShapedElement, Table};
use crate::errors::{ErrorKind, Result};
use crate::etl::element_source::{open_source, ElementSource};
use crate::etl::Etl;
use crate::shape::shape;
use crate::sink::{write_element, CsvTables, RowSink};
use crate::validate::{validate, Schema};

pub const ETL_NAME: &str = "osm_tables";

const PROGRESS_EVERY: u64 = 100_000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub elements: u64,
    pub nodes: u64,
    pub ways: u64,
    pub skipped_ways: u64,
}

/// Shapes (and optionally validates) elements as they are pulled from the
/// source. Nothing is read ahead.
pub struct ShapedElements<R: BufRead> {
    source: ElementSource<R>,
    schema: Option<Schema>,
    skip_incomplete_ways: bool,
    summary: Summary,
}

impl<R: BufRead> ShapedElements<R> {
    pub fn new(source: ElementSource<R>, schema: Option<Schema>, skip_incomplete_ways: bool) -> Self {
        ShapedElements {
            source,
            schema,
            skip_incomplete_ways,
            summary: Summary::default(),
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

impl<R: BufRead> Iterator for ShapedElements<R> {
    type Item = Result<ShapedElement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let element = match self.source.next()? {
                Ok(element) => element,
                Err(err) => return Some(Err(err)),
            };
            self.summary.elements += 1;
            if self.summary.elements % PROGRESS_EVERY == 0 {
                info!(etl_name = ETL_NAME, elements = self.summary.elements; "Shaping in progress");
            }

            let shaped = match shape(&element) {
                Ok(Some(shaped)) => shaped,
                Ok(None) => continue,
                Err(err) if err.kind == ErrorKind::MissingRequiredField && self.skip_incomplete_ways => {
                    warn!(etl_name = ETL_NAME, err = err.message.as_str(); "Skipping incomplete way");
                    self.summary.skipped_ways += 1;
                    continue;
                },
                Err(err) => return Some(Err(err)),
            };

            if let Some(schema) = &self.schema {
                if let Err(err) = validate(&shaped, schema) {
                    return Some(Err(err.into()));
                }
            }

            match shaped {
                ShapedElement::Node { .. } => self.summary.nodes += 1,
                ShapedElement::Way { .. } => self.summary.ways += 1,
            }
            return Some(Ok(shaped));
        }
    }
}

/// Streams an .osm export into the five CSV tables.
pub struct OsmTablesEtl<'a> {
    config: &'a UserConfig,
}

impl OsmTablesEtl<'_> {
    fn schema(&self) -> Option<Schema> {
        match (self.config.validate, self.config.reject_problem_keys) {
            (false, _) => None,
            (true, false) => Some(Schema::default()),
            (true, true) => Some(Schema::rejecting_problem_keys()),
        }
    }

    fn drain<R: BufRead>(sink: &mut impl RowSink, output: &mut ShapedElements<R>) -> Result<u64> {
        let mut rows = 0;
        for shaped in output.by_ref() {
            rows += write_element(sink, &shaped?)? as u64;
        }
        Ok(rows)
    }

    pub fn new(config: &UserConfig) -> OsmTablesEtl<'_> {
        OsmTablesEtl {
            config
        }
    }
}

impl Etl for OsmTablesEtl<'_> {
    type Input = ElementSource<Box<dyn BufRead>>;
    type Output = ShapedElements<Box<dyn BufRead>>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_paths(&self, dir: &Path) -> Vec<PathBuf> {
        Table::ALL.iter().map(|table| dir.join(table.file_name())).collect()
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        let reader = open_source(Path::new(&self.config.data_path))?;
        Ok(ElementSource::new(reader, &[ElementKind::Node, ElementKind::Way]))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(ShapedElements::new(input, self.schema(), self.config.skip_incomplete_ways))
    }

    fn load(&mut self, dir: &Path, mut output: Self::Output) -> Result<()> {
        let mut tables = CsvTables::create(dir)?;
        let rows = match Self::drain(&mut tables, &mut output) {
            Ok(rows) => rows,
            Err(err) => {
                // Partial tables stay on disk, flushed, under their partial names.
                if let Err(flush_err) = tables.flush() {
                    warn!(etl_name = ETL_NAME, err = flush_err.message.as_str(); "Could not flush partial tables");
                }
                return Err(err);
            },
        };
        tables.commit(dir)?;

        let summary = output.summary();
        info!(
            etl_name = ETL_NAME,
            elements = summary.elements,
            nodes = summary.nodes,
            ways = summary.ways,
            rows = rows,
            skipped_ways = summary.skipped_ways;
            "Tables written"
        );
        Ok(())
    }
}
