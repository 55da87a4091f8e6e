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

//! [tracing-gelf-layout](crate) errors

use backtrace::Backtrace;

/// [tracing-gelf-layout](crate) error type
///
/// [tracing-gelf-layout](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of
/// a straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to repond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// An extra field's rendered text could not be converted to its declared target type
    BadFieldValue {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// Failed to fetch hostname (via libc)
    NoHostname {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// The output sink rejected a completed document
    Output {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// The JSON writer failed mid-document
    Serialize {
        source: serde_json::Error,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadFieldValue { name, source, .. } => {
                write!(
                    f,
                    "While converting the value for extra field '{}', got {}",
                    name, source
                )
            }
            Error::NoHostname { source, .. } => {
                write!(f, "While resolving this host's name, got {}", source)
            }
            Error::Output { source, .. } => {
                write!(f, "While writing a GELF document, got {}", source)
            }
            Error::Serialize { source, .. } => {
                write!(f, "While serializing a GELF document, got {}", source)
            }
            _ => write!(f, "tracing-gelf-layout error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadFieldValue {
                name: _,
                source: _,
                back,
            } => write!(f, "{}\n{:#?}", self, back),
            Error::NoHostname { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Output { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Serialize { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize {
            source: err,
            back: Backtrace::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
