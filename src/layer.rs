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

//! [tracing-gelf-layout](crate) [`Layer`] implementations.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! A basic struct [`Layer`] is defined, but implementations are provided only for a few (sensible)
//! combinations of type parameters. Consumers of this crate are of course free to implement the
//! [`EventMapper`], [`Formatter`] and [`Output`] traits for themselves & provide their own
//! implementations.

use crate::{
    formatter::Formatter,
    gelf::Gelf,
    output::{Output, StdoutOutput},
    tracing::{DefaultEventMapper, EventMapper, RecordVisitor, SpanFields},
};

use backtrace::Backtrace;
use tracing::{span, Event};
use tracing_subscriber::layer::Context;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// module error type
#[non_exhaustive]
pub enum Error {
    /// Mapping or formatting layer error
    Format {
        source: Box<dyn std::error::Error>,
        back: Backtrace,
    },
    /// Output layer error
    Output {
        source: Box<dyn std::error::Error>,
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
            Error::Format { source, .. } => {
                write!(f, "While formatting an Event, got {}", source)
            }
            Error::Output { source, .. } => {
                write!(f, "While writing a GELF document, got {}", source)
            }
            _ => write!(f, "gelf output layer error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Format { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            Error::Output { source: _, back } => write!(f, "{}\n{:#?}", self, back),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          struct Layer                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that will format [`Event`]s as
/// GELF documents & hand them to an output sink.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// The layer also records every span's fields into that span's extensions (as [`SpanFields`]) so
/// that the mapper can surface them as ambient scope properties when an event fires inside the
/// span.
pub struct Layer<S, F: Formatter, M: EventMapper<S>, O: Output<F>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    formatter: F,
    mapper: M,
    output: O,
    // I need the Subscriber implementation type as a type parameter to transmit it to the
    // EventMapper trait. 👇 gets the compiler to shut-up about unused type parameters.
    subscriber_type: std::marker::PhantomData<S>,
}

/// A [`Layer`] implementation with the following characteristics:
///
/// - Uses the default mapper for capturing Tracing events into records
/// - Formats GELF documents with the default options (legacy layout, event properties included)
/// - Writes the resulting documents to stdout, one per line
///
/// May be used with any [`tracing_subscriber::Subscriber`] implementation that supports
/// [`LookupSpan`].
///
/// [`tracing_subscriber::Subscriber`]: https://docs.rs/tracing/latest/tracing/trait.Subscriber.html
/// [`LookupSpan`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/registry/trait.LookupSpan.html
impl<S> std::default::Default for Layer<S, Gelf, DefaultEventMapper, StdoutOutput>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn default() -> Self {
        Layer::with_output(StdoutOutput)
    }
}

impl<S, F: Formatter, M: EventMapper<S>, O: Output<F>> Layer<S, F, M, O>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// construct Layer with custom inners
    pub fn new(formatter: F, mapper: M, output: O) -> Self {
        Layer {
            formatter,
            mapper,
            output,
            subscriber_type: std::marker::PhantomData,
        }
    }
}

/// Customize a [`Layer`] implementation with the following characteristics:
///
/// - Uses the default mapper for capturing Tracing events into records
/// - Formats GELF documents
///
/// With a custom [`Output`] implementation. May be used with any
/// [`tracing_subscriber::Subscriber`] implementation that supports [`LookupSpan`].
///
/// [`Output`]: crate::output::Output
/// [`tracing_subscriber::Subscriber`]: https://docs.rs/tracing/latest/tracing/trait.Subscriber.html
/// [`LookupSpan`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/registry/trait.LookupSpan.html
impl<S, O: Output<Gelf>> Layer<S, Gelf, DefaultEventMapper, O>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Construct a Layer that will write default-formatted documents to output `output`
    pub fn with_output(output: O) -> Self {
        Layer {
            formatter: Gelf::default(),
            mapper: DefaultEventMapper::default(),
            output,
            subscriber_type: std::marker::PhantomData,
        }
    }

    /// Construct a Layer that will write documents formatted by `formatter` to output `output`
    pub fn with_output_and_formatter(output: O, formatter: Gelf) -> Self {
        Layer {
            formatter,
            mapper: DefaultEventMapper::default(),
            output,
            subscriber_type: std::marker::PhantomData,
        }
    }
}

/// This is the Big Tuna-- the [`Layer`] implementation.
///
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
impl<S, F, M, O> tracing_subscriber::layer::Layer<S> for Layer<S, F, M, O>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    F: Formatter + 'static,
    M: EventMapper<S> + 'static,
    O: Output<F> + 'static,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = RecordVisitor::default();
            attrs.record(&mut visitor);
            let mut extensions = span.extensions_mut();
            if let Some(fields) = extensions.get_mut::<SpanFields>() {
                fields.0.extend(visitor.fields);
            } else {
                extensions.insert(SpanFields(visitor.fields));
            }
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = RecordVisitor::default();
            values.record(&mut visitor);
            let mut extensions = span.extensions_mut();
            if let Some(fields) = extensions.get_mut::<SpanFields>() {
                fields.0.extend(visitor.fields);
            } else {
                extensions.insert(SpanFields(visitor.fields));
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.mapper
            .on_event(event, ctx) // :=> StdResult<Option<LogRecord>, <M as EventMapper>::Error>
            .map_err(|err| Error::Format {
                source: Box::new(err),
                back: Backtrace::new(),
            }) // 👈:=> StdResult<Option<LogRecord>, Error>
            .and_then(|x| {
                // x is an Option<LogRecord>
                if let Some(record) = x {
                    let message =
                        self.formatter
                            .format(&record)
                            .map_err(|err| Error::Format {
                                source: Box::new(err),
                                back: Backtrace::new(),
                            })?;
                    self.output.send(message).map_err(|err| Error::Output {
                        source: Box::new(err),
                        back: Backtrace::new(),
                    })?;
                }
                Ok(())
            })
            .unwrap_or_else(|err| {
                // Diagnostics stay off the tracing pipeline: reporting a failed event through
                // the same pipeline would re-enter this layer.
                eprintln!("gelf layer failed to emit an event: {}", err);
            })
    }
}
