//! Streaming JSON array writer.
//!
//! The file is valid JSON once [`JsonArraySink::close`] has run: `[]` when
//! nothing was written, otherwise a pretty-printed array of objects. After a
//! failed write the sink is poisoned: the file may end mid-object, so no
//! footer is written and every later call fails.

use crate::extraction::PropertyListing;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    /// Nothing written yet, not even `[`.
    Empty,
    /// `[` and at least one object written.
    Open,
    /// Footer written; further writes are rejected.
    Closed,
    /// A write failed partway; the array cannot be completed.
    Poisoned,
}

pub struct JsonArraySink<W: Write> {
    out: W,
    state: ArrayState,
}

impl<W: Write> JsonArraySink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: ArrayState::Empty,
        }
    }

    /// Append listings as array elements and flush.
    pub fn write_rows(&mut self, rows: &[PropertyListing]) -> io::Result<()> {
        for row in rows {
            self.write_one(row)?;
        }
        self.guarded(|out| out.flush())
    }

    fn write_one(&mut self, row: &PropertyListing) -> io::Result<()> {
        let mut element = match self.state {
            ArrayState::Empty => String::from("[\n"),
            ArrayState::Open => String::from(",\n"),
            ArrayState::Closed => return Err(io::Error::other("JSON array already closed")),
            ArrayState::Poisoned => return Err(poisoned()),
        };
        let object = serde_json::to_string_pretty(row)?;
        for (i, line) in object.lines().enumerate() {
            if i > 0 {
                element.push('\n');
            }
            element.push_str("  ");
            element.push_str(line);
        }

        self.guarded(|out| out.write_all(element.as_bytes()))?;
        self.state = ArrayState::Open;
        Ok(())
    }

    /// Write the closing bracket. Calling it again is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        let footer: &[u8] = match self.state {
            ArrayState::Empty => b"[]\n",
            ArrayState::Open => b"\n]\n",
            ArrayState::Closed => return Ok(()),
            ArrayState::Poisoned => return Err(poisoned()),
        };
        self.guarded(|out| {
            out.write_all(footer)?;
            out.flush()
        })?;
        self.state = ArrayState::Closed;
        Ok(())
    }

    fn guarded(&mut self, op: impl FnOnce(&mut W) -> io::Result<()>) -> io::Result<()> {
        op(&mut self.out).inspect_err(|_| self.state = ArrayState::Poisoned)
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn poisoned() -> io::Error {
    io::Error::other("JSON array left incomplete by an earlier write failure")
}
