//! CSV writer with a single header row.

use crate::extraction::{PropertyListing, LISTING_FIELDS};
use std::io::{self, Write};

pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    /// Wrap `out` and write the header row immediately.
    pub fn new(out: W) -> io::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(LISTING_FIELDS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append one row per listing, then flush.
    pub fn write_rows(&mut self, rows: &[PropertyListing]) -> io::Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> io::Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_once_and_quoting() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        let row = PropertyListing {
            property_id: "456".into(),
            listing_url: "https://www.zillow.com/homes/123-Main-St-City-CA-12345/456_zpid/".into(),
            address: "123 Main St, Unit 4".into(),
            city: "City".into(),
            state: "CA".into(),
            zipcode: "12345".into(),
            last_modified: "2024-01-15T12:00:00Z".into(),
            last_modified_est: "2024-01-15 07:00:00 EST".into(),
        };
        sink.write_rows(&[row.clone()]).unwrap();
        sink.write_rows(&[row]).unwrap();
        sink.close().unwrap();

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "property_id,listing_url,address,city,state,zipcode,last_modified,last_modified_est"
        );
        assert!(lines[1].starts_with("456,https://www.zillow.com/homes/"));
        assert!(lines[1].contains("\"123 Main St, Unit 4\""));
    }
}
