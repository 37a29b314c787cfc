use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Writes command results as CSV rows to any `Write` sink (e.g., Stdout).
///
/// Headers come from the field names of the first serialized row.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Serializes every row and flushes the sink.
    pub fn write_records<T, I>(&mut self, rows: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
