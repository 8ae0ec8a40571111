use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::data::tables::{Row, ShapedElement, Table};
use crate::errors::Result;

/// Destination for table rows.
pub trait RowSink {
    fn write_row(&mut self, table: Table, row: &dyn Row) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// One CSV writer per table. Headers are written as soon as the writers are
/// opened, so a table with no rows still gets its header line.
///
/// Files are created under their partial names and only take their final
/// names on `commit`, so an aborted run never leaves tables that look complete.
pub struct CsvTables<W: Write> {
    nodes: Writer<W>,
    node_tags: Writer<W>,
    ways: Writer<W>,
    way_nodes: Writer<W>,
    way_tags: Writer<W>,
}

impl CsvTables<File> {
    pub fn create(dir: &Path) -> Result<Self> {
        Self::open_with(|table| Ok(File::create(dir.join(table.partial_file_name()))?))
    }

    pub fn commit(mut self, dir: &Path) -> Result<()> {
        RowSink::flush(&mut self)?;
        drop(self);
        for table in Table::ALL {
            fs::rename(dir.join(table.partial_file_name()), dir.join(table.file_name()))?;
        }
        Ok(())
    }
}

impl<W: Write> CsvTables<W> {
    pub fn open_with<F>(mut open: F) -> Result<Self>
    where
        F: FnMut(Table) -> Result<W>,
    {
        let mut header_led = |table: Table| -> Result<Writer<W>> {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_writer(open(table)?);
            writer.write_record(table.columns())?;
            Ok(writer)
        };

        Ok(CsvTables {
            nodes: header_led(Table::Nodes)?,
            node_tags: header_led(Table::NodeTags)?,
            ways: header_led(Table::Ways)?,
            way_nodes: header_led(Table::WayNodes)?,
            way_tags: header_led(Table::WayTags)?,
        })
    }

    fn writer(&mut self, table: Table) -> &mut Writer<W> {
        match table {
            Table::Nodes => &mut self.nodes,
            Table::NodeTags => &mut self.node_tags,
            Table::Ways => &mut self.ways,
            Table::WayNodes => &mut self.way_nodes,
            Table::WayTags => &mut self.way_tags,
        }
    }
}

impl<W: Write> RowSink for CsvTables<W> {
    fn write_row(&mut self, table: Table, row: &dyn Row) -> Result<()> {
        let values = row.values();
        self.writer(table).write_record(values.iter().map(|value| value.as_bytes()))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for table in Table::ALL {
            self.writer(table).flush()?;
        }
        Ok(())
    }
}

/// Writes every row of `element` to its table, returning the number of rows.
pub fn write_element(sink: &mut impl RowSink, element: &ShapedElement) -> Result<usize> {
    let rows = element.rows();
    for (table, row) in &rows {
        sink.write_row(*table, *row)?;
    }
    Ok(rows.len())
}
