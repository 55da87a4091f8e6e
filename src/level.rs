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

//! GELF severity level definitions.
//!
//! GELF consumers understand the syslog-derived numeric severities of RFC [5424], but log
//! frameworks hand us a richer, ordered set of named levels. [`Level`] models the latter;
//! [`Level::ordinal`] performs the (lossy, fixed) mapping to the former.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424

type StdResult<T, E> = std::result::Result<T, E>;

/// The discrete, ordered severity levels a [`LogRecord`] may carry.
///
/// [`LogRecord`]: crate::record::LogRecord
///
/// The variants mirror the classic log-framework ladder (trace at the chatty end, fatal at the
/// other). Note that [`tracing`] has no `Fatal`; records built from tracing [`Event`]s will never
/// carry it, but hosts constructing [`LogRecord`]s directly may.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
/// [`LogRecord`]: crate::record::LogRecord
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Level {
    /// finer-grained than debug; typically only enabled while chasing a particular problem
    Trace,
    /// diagnostic information for developers
    Debug,
    /// normal operation
    Info,
    /// something unexpected, but the program can continue
    Warn,
    /// an operation failed
    Error,
    /// the program cannot continue
    Fatal,
}

impl Level {
    /// Map this level to the numeric severity GELF-consuming servers expect.
    ///
    /// The table is fixed (it descends from the log4net `SyslogSeverity` mapping that the Graylog
    /// ecosystem standardized on): Trace & Debug map to syslog debug (7), Info to informational
    /// (6), Warn to warning (4), Fatal to critical (2), and Error to error (3).
    pub fn ordinal(&self) -> u8 {
        match self {
            Level::Trace | Level::Debug => 7,
            Level::Info => 6,
            Level::Warn => 4,
            Level::Fatal => 2,
            Level::Error => 3,
        }
    }
}

impl std::default::Default for Level {
    /// The default level is `Info`.
    fn default() -> Self {
        Level::Info
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Level::Trace => "Trace",
                Level::Debug => "Debug",
                Level::Info => "Info",
                Level::Warn => "Warn",
                Level::Error => "Error",
                Level::Fatal => "Fatal",
            }
        )
    }
}

impl std::convert::From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}
