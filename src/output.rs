// Copyright (C) 2022 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.

//! The document output layer.
//!
//! This module defines the [`Output`] trait that all implementations must support, as well as
//! stdout & generic [`std::io::Write`] implementations. Delivery to a remote collector is
//! deliberately not this crate's concern; shippers tailing a file or stream expect GELF
//! documents newline-delimited, so both implementations append `\n` after each document.
//!
//! # Examples
//!
//! To write GELF documents to stdout:
//!
//! ```rust
//! use tracing_gelf_layout::output::StdoutOutput;
//! let output = StdoutOutput;
//! ```
//!
//! To write them to anything implementing [`std::io::Write`]:
//!
//! ```rust
//! use tracing_gelf_layout::output::WriterOutput;
//! let output = WriterOutput::new(Vec::<u8>::new());
//! ```

use crate::{
    error::{Error, Result},
    formatter::Formatter,
};

use backtrace::Backtrace;

use std::io::Write;
use std::sync::Mutex;

/// Operations all output layers must support.
///
/// The type parameter ensures the only thing that can be handed to an [`Output`] is something a
/// [`Formatter`] produced (see the discussion on [`Formatter::Output`]).
pub trait Output<F: Formatter> {
    /// Write one complete document to this output mechanism.
    fn send(&self, message: F::Output) -> Result<usize>;
}

/// Writing GELF documents to stdout, one per line.
pub struct StdoutOutput;

impl<F: Formatter> Output<F> for StdoutOutput {
    fn send(&self, message: F::Output) -> Result<usize> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&message)
            .and_then(|_| handle.write_all(b"\n"))
            .map_err(|err| Error::Output {
                source: Box::new(err),
                back: Backtrace::new(),
            })?;
        Ok(message.len() + 1)
    }
}

/// Writing GELF documents to any [`std::io::Write`], one per line.
///
/// The writer sits behind a [`Mutex`] so one [`WriterOutput`] may serve concurrent callers;
/// each document (plus its newline) is written & flushed under a single acquisition, so
/// documents never interleave.
pub struct WriterOutput<W: Write> {
    writer: Mutex<W>,
}

impl<W: Write> WriterOutput<W> {
    pub fn new(writer: W) -> WriterOutput<W> {
        WriterOutput {
            writer: Mutex::new(writer),
        }
    }
}

impl<F: Formatter, W: Write> Output<F> for WriterOutput<W> {
    fn send(&self, message: F::Output) -> Result<usize> {
        // A poisoned lock just means another caller panicked mid-write; the writer itself is
        // still ours to use.
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer
            .write_all(&message)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|err| Error::Output {
                source: Box::new(err),
                back: Backtrace::new(),
            })?;
        Ok(message.len() + 1)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::gelf::Gelf;

    #[test]
    fn test_writer_output() {
        let output = WriterOutput::new(Vec::<u8>::new());
        <WriterOutput<Vec<u8>> as Output<Gelf>>::send(&output, b"{\"version\":\"1.1\"}".to_vec())
            .unwrap();
        <WriterOutput<Vec<u8>> as Output<Gelf>>::send(&output, b"{\"version\":\"1.1\"}".to_vec())
            .unwrap();
        let written = output.writer.into_inner().unwrap();
        assert_eq!(
            std::str::from_utf8(&written).unwrap(),
            "{\"version\":\"1.1\"}\n{\"version\":\"1.1\"}\n"
        );
    }
}
