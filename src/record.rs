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

//! The log record handed to the GELF converter.
//!
//! [`LogRecord`] is the fully-populated, read-only input to [`Gelf`]: the converter does not know
//! (or care) whether a record was captured from a [`tracing`] [`Event`] by
//! [`DefaultEventMapper`], or assembled by hand by the host.
//!
//! [`Gelf`]: crate::gelf::Gelf
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [`DefaultEventMapper`]: crate::tracing::DefaultEventMapper

use crate::{level::Level, value::Value};

use chrono::prelude::*;

/// Exception details attached to a [`LogRecord`].
///
/// Rendered by the converter as the `_ExceptionSource`, `_ExceptionMessage`, `_ExceptionType` &
/// `_StackTrace` additional fields. Rust has no exceptions, of course; the closest native notion
/// is an [`std::error::Error`] and its `source()` chain, and [`Exception::from_error`] flattens
/// exactly that. Hosts bridging richer error types may fill in the fields themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct Exception {
    /// Originating subsystem or component, if the host tracks one
    pub source: Option<String>,
    /// Human-readable description of the failure
    pub message: String,
    /// Name of the concrete error type, if the host tracks one
    pub type_name: Option<String>,
    /// Formatted rendition of the failure & its causes
    pub stack_trace: Option<String>,
}

impl Exception {
    /// Build an [`Exception`] from any [`std::error::Error`].
    ///
    /// `dyn Error` exposes neither an originating component nor a type name, so `source` &
    /// `type_name` come back `None`; the stack-trace analogue is the flattened `source()` chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Exception {
        let mut stack_trace = err.to_string();
        let mut cause = err.source();
        while let Some(err) = cause {
            stack_trace.push_str("\ncaused by: ");
            stack_trace.push_str(&err.to_string());
            cause = err.source();
        }
        Exception {
            source: None,
            message: err.to_string(),
            type_name: None,
            stack_trace: Some(stack_trace),
        }
    }
}

/// One captured log event, ready for conversion.
///
/// The two property bags are ordered & may contain duplicate keys; the converter applies its own
/// precedence and exclusion policy when merging them into the document (first writer wins).
/// `scope_properties` is the ambient context supplied by the host (per-request correlation
/// values and the like), listed innermost scope first.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// The formatted message text
    pub message: String,
    pub logger_name: String,
    /// Caller source file, if known
    pub file: Option<String>,
    /// Caller line number, if known
    pub line: Option<u32>,
    pub exception: Option<Exception>,
    pub properties: Vec<(String, Value)>,
    pub scope_properties: Vec<(String, Value)>,
}

impl LogRecord {
    /// Construct a record with the given level & message, timestamped now; everything else empty.
    pub fn new<M: Into<String>>(level: Level, message: M) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            logger_name: String::new(),
            file: None,
            line: None,
            exception: None,
            properties: Vec::new(),
            scope_properties: Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_exception_from_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "inner failure");
        let err: Box<dyn std::error::Error> = Box::new(io);

        let ex = Exception::from_error(err.as_ref());
        assert_eq!(ex.message, "inner failure");
        assert_eq!(ex.source, None);
        assert_eq!(ex.type_name, None);
        assert_eq!(ex.stack_trace.as_deref(), Some("inner failure"));
    }

    #[test]
    fn test_exception_flattens_cause_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "outer failure")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner failure"));
        let ex = Exception::from_error(&err);
        assert_eq!(ex.message, "outer failure");
        assert_eq!(
            ex.stack_trace.as_deref(),
            Some("outer failure\ncaused by: inner failure")
        );
    }
}
