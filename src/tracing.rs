// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
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

//! Primitives for mapping [`tracing`] entities to [`LogRecord`]s.
//!
//! [`EventMapper`] implementations handle capturing [`Event`]s into the [`LogRecord`] the
//! converter consumes. This module provides a single implementation, [`DefaultEventMapper`],
//! which extracts the "message" field, records every other field with its native type, turns a
//! recorded error into the record's exception, and gathers span-scope fields stored by the
//! [`Layer`] as ambient scope properties.
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [`LogRecord`]: crate::record::LogRecord
//! [`Layer`]: crate::layer::Layer

use crate::{
    level::Level,
    record::{Exception, LogRecord},
    value::Value,
};

use backtrace::Backtrace;

type StdResult<T, E> = std::result::Result<T, E>;

#[non_exhaustive]
pub enum Error {
    NoMessageField { name: &'static str, back: Backtrace },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NoMessageField { name, .. } => {
                write!(f, "No message field found in event {}", name)
            }
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NoMessageField { name: _, back } => write!(f, "{:#?}\n{}", back, self),
        }
    }
}

impl std::error::Error for Error {}

/// Map [`tracing`] [`Event`]s to [`LogRecord`]s.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
/// [`LogRecord`]: crate::record::LogRecord
///
/// The translation from [`tracing`] events to GELF documents occurs in three parts:
///
/// 1. capturing the Event into a [`LogRecord`]
///
/// 2. formatting that record into a serialized GELF document
///
/// 3. handing that document to an output sink
///
/// Trait [`EventMapper`] formally defines step 1: implementations shall indicate, firstly,
/// whether this event shall produce a document at all, and if so, hand back the fully-populated
/// record the [`Formatter`] will consume. The converter downstream neither knows nor cares how
/// the record was computed.
///
/// [`Formatter`]: crate::formatter::Formatter
pub trait EventMapper<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    type Error: std::error::Error + 'static;
    /// An event has occurred
    fn on_event(
        &self,
        event: &tracing::Event,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> StdResult<Option<LogRecord>, Self::Error>;
}

fn default_level_mapping(level: &tracing::Level) -> Level {
    Level::from(level)
}

/// Fields recorded on a span, stashed in the span's extensions by the [`Layer`] so they are
/// still available when an event fires inside that span.
///
/// [`Layer`]: crate::layer::Layer
#[derive(Default)]
pub struct SpanFields(pub Vec<(String, Value)>);

/// A field visitor that captures the "message" field, an `error` recorded via
/// [`record_error`], and every other field as a typed [`Value`].
///
/// [`record_error`]: tracing::field::Visit::record_error
#[derive(Default)]
pub(crate) struct RecordVisitor {
    pub(crate) message: Option<String>,
    pub(crate) fields: Vec<(String, Value)>,
    pub(crate) exception: Option<Exception>,
}

impl tracing::field::Visit for RecordVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields.push((field.name().to_owned(), Value::F64(value)));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.push((field.name().to_owned(), Value::I64(value)));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.push((field.name().to_owned(), Value::U64(value)));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.push((field.name().to_owned(), Value::Bool(value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.fields.push((field.name().to_owned(), Value::from(value)));
        }
    }

    fn record_error(
        &mut self,
        _field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.exception = Some(Exception::from_error(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // Regrettably, we have only a `Debug` implementation available to us; but the tracing
            // macros `info!()`, `event!()` & the like all take care to "pre-format" the `mesage`
            // field so that `value` actually refers to a `std::fmt::Arguments` instance, which will
            // print to a debug format without enclosing double-quotes.
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .push((field.name().to_owned(), Value::Text(format!("{:?}", value))));
        }
    }
}

/// An [`EventMapper`] that captures an [`Event`]'s "message" field (failing if there is none),
/// its remaining fields as typed properties, & its enclosing spans' fields as scope properties.
///
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct DefaultEventMapper {
    map_level: Box<dyn Fn(&tracing::Level) -> Level + Send + Sync>,
}

impl std::default::Default for DefaultEventMapper {
    fn default() -> Self {
        DefaultEventMapper {
            map_level: Box::new(default_level_mapping),
        }
    }
}

impl DefaultEventMapper {
    /// Substitute a custom severity mapping.
    pub fn with_level_mapping<F>(map_level: F) -> DefaultEventMapper
    where
        F: Fn(&tracing::Level) -> Level + Send + Sync + 'static,
    {
        DefaultEventMapper {
            map_level: Box::new(map_level),
        }
    }
}

impl<S> EventMapper<S> for DefaultEventMapper
where
    S: tracing_core::subscriber::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    type Error = Error;
    fn on_event(
        &self,
        event: &tracing::Event,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> StdResult<Option<LogRecord>, Error> {
        // When the tracing-log feature is enabled, use normalized_metadata() to get
        // file/line info for events that originated from the `log` crate.
        // For native tracing events, normalized_metadata() returns None and we use
        // the event's own metadata.
        // See: https://github.com/tokio-rs/tracing/blob/9978c3663bcd58de14b3cf089ad24cb63d00a922/tracing-subscriber/src/fmt/format/pretty.rs#L182
        #[cfg(feature = "tracing-log")]
        let normalized_meta = tracing_log::NormalizeEvent::normalized_metadata(event);
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let message = visitor.message.ok_or(Error::NoMessageField {
            name: event.metadata().name(),
            back: Backtrace::new(),
        })?;

        let mut record = LogRecord::new((*self.map_level)(meta.level()), message);
        record.logger_name = meta.target().to_owned();
        record.file = meta.file().map(str::to_owned);
        record.line = meta.line();
        record.exception = visitor.exception;
        record.properties = visitor.fields;

        // Innermost scope first, so an inner span's value shadows an outer one under the
        // converter's first-writer-wins merge.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record.scope_properties.extend(fields.0.iter().cloned());
                }
            }
        }

        Ok(Some(record))
    }
}
