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
//! A [`tracing-subscriber`] [`Layer`] implementation formatting [`tracing`] [`Event`]s as
//! [GELF] documents
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! # Introduction
//!
//! The [`tracing`] crate is a "scoped, structured logging and diagnostics system". It makes a
//! very clear distinction between producers of events & their consumers ([`Subscriber`]s, in
//! [`tracing`] parlance); so much so that the [`tracing`] crate provides no support for
//! _consuming_ events, other than the definition of the [`Subscriber`] trait. The
//! [`tracing-subscriber`] crate (also part of the [Tokio] project) fills that gap with the idea
//! of a [`Layer`]: "Unlike Subscribers, which implement a complete strategy for how trace data
//! is collected, Layers provide modular implementations of specific behaviors."
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Subscriber`]: https://docs.rs/tracing/0.1.34/tracing/trait.Subscriber.html
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/0.3.11/tracing_subscriber/index.html
//! [Tokio]: https://tokio.rs/
//! [`Layer`]: https://docs.rs/tracing-subscriber/0.3.11/tracing_subscriber/layer/trait.Layer.html
//!
//! This crate provides a [`Layer`] implementation that formats each event as one [GELF] (Graylog
//! Extended Log Format) document: a single-line, compact JSON object with a mandatory schema
//! (`version`, `host`, `short_message` & friends) plus an open-ended set of underscore-prefixed
//! "additional fields" carrying the event's structured data. The conversion is a pure,
//! synchronous, in-memory transformation; where the document goes afterwards is the business of
//! the [`Output`] implementation (and shipping it across the network is somebody else's business
//! entirely).
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//! [`Output`]: crate::output::Output
//!
//! The translation happens in three steps, each behind its own trait so it can be replaced
//! independently:
//!
//! 1. capturing the [`Event`] into a [`LogRecord`] ([`EventMapper`])
//!
//! 2. formatting that record into a serialized document ([`Formatter`])
//!
//! 3. handing the document to an output sink ([`Output`])
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [`LogRecord`]: crate::record::LogRecord
//! [`EventMapper`]: crate::tracing::EventMapper
//! [`Formatter`]: crate::formatter::Formatter
//! [`Output`]: crate::output::Output
//!
//! # Usage
//!
//! [`tracing-gelf-layout`](crate)'s [`Layer`] comes with sane defaults:
//!
//! ```rust
//! use tracing::info;
//! use tracing_gelf_layout::layer::Layer;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! // The default configuration formats events with the legacy GELF field set included
//! // and writes them to stdout, one document per line.
//! let subscriber = Registry::default().with(Layer::default());
//!
//! info!("Hello, world!");
//! ```
//!
//! Will produce GELF documents that look something like this:
//!
//! ```text
//! {"facility":"GELF","file":"...","full_message":"Hello, world!","host":"bree.local",...}
//! ```
//!
//! That said, the output sink, the document layout and the means of capturing [`tracing`]
//! [`Event`]s are configurable:
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! ```rust
//! use tracing::info;
//! use tracing_gelf_layout::field::ExtraField;
//! use tracing_gelf_layout::gelf::Gelf;
//! use tracing_gelf_layout::layer::Layer;
//! use tracing_gelf_layout::output::WriterOutput;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let formatter = Gelf::builder()
//!     .include_legacy_fields(false) // 1.1 layout: no facility/file/line
//!     .include_scope_properties(true)
//!     .host_name("app-01.example.com")
//!     .exclude_property("password")
//!     .extra_field(ExtraField::new("environment", |_| "staging".to_string()))
//!     .build();
//!
//! let subscriber = Registry::default().with(Layer::with_output_and_formatter(
//!     WriterOutput::new(std::io::sink()),
//!     formatter,
//! ));
//!
//! info!("Hello, world!");
//! ```
//!
//! Will emit 1.1-layout documents to the writer of your choosing.

pub mod error;
pub mod field;
pub mod formatter;
pub mod gelf;
pub mod layer;
pub mod level;
pub mod output;
pub mod record;
pub mod timestamp;
pub mod tracing;
pub mod value;
