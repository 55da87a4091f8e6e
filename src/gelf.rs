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

//! [GELF]-compliant document formatting
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//!
//! [`Gelf`] is a [`Formatter`] that renders each [`LogRecord`] as one compact JSON object. Two
//! schema layouts are supported, selected by [`GelfBuilder::include_legacy_fields`]: the legacy
//! 1.0 layout (which carries the deprecated `facility`, `file` & `line` fields) and the 1.1
//! layout (which omits them). In either layout, everything beyond the mandatory schema is
//! emitted as "additional fields" (keys prefixed with `_`), merged from four sources in fixed
//! precedence: the record's own property bag, synthesized exception fields, `_LoggerName`, and
//! the ambient scope bag, followed by any caller-declared [`ExtraField`]s. The first source to
//! claim a key wins.
//!
//! A single [`Gelf`] instance may be shared freely across threads: the one piece of lazily-
//! initialized state (the host name) sits behind a [`OnceLock`], and the optional
//! duplicate-timestamp fix is lock-free.
//!
//! [`OnceLock`]: std::sync::OnceLock

use crate::{
    error::{Error, Result},
    field::{canonical_key, comparison_key, ExtraField},
    formatter::Formatter,
    record::LogRecord,
    timestamp::{unix_timestamp, TimestampDeduper},
    value::{truncate_chars, Value, MAX_FIELD_CHARS},
};

use backtrace::Backtrace;
use serde::ser::{SerializeMap, Serializer};

use std::collections::HashSet;
use std::sync::OnceLock;

/// `short_message` is capped at this many characters.
pub const MAX_SHORT_MESSAGE_CHARS: usize = 250;

/// The version string written to every document (the legacy layout predates versioning; by
/// convention it carries the same value).
const GELF_VERSION: &str = "1.1";

/// GELF requires a non-empty facility; this is the mandated substitute.
const DEFAULT_FACILITY: &str = "GELF";

/// Substituted when the host name cannot be resolved.
const UNKNOWN_HOST: &str = "UnknownHost";

/// Property keys the converter claims for itself. These never pass through from a property bag,
/// with or without a leading underscore, in any case.
const RESERVED_KEYS: [&str; 5] = [
    "LoggerName",
    "ExceptionSource",
    "ExceptionMessage",
    "ExceptionType",
    "StackTrace",
];

fn optional_text(text: &Option<String>) -> Value {
    match text {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

/// A formatter producing GELF 1.0/1.1-conformant JSON documents.
pub struct Gelf {
    include_legacy_fields: bool,
    include_event_properties: bool,
    include_scope_properties: bool,
    facility: String,
    host_name: Option<String>,
    exclude_properties: HashSet<String>,
    extra_fields: Vec<ExtraField>,
    fix_duplicate_timestamp: bool,
    strict: bool,
    cached_host: OnceLock<String>,
    timestamps: TimestampDeduper,
}

impl std::default::Default for Gelf {
    fn default() -> Self {
        Gelf {
            include_legacy_fields: true,
            include_event_properties: true,
            include_scope_properties: false,
            facility: String::new(),
            host_name: None,
            exclude_properties: HashSet::new(),
            extra_fields: Vec::new(),
            fix_duplicate_timestamp: false,
            strict: false,
            cached_host: OnceLock::new(),
            timestamps: TimestampDeduper::new(),
        }
    }
}

pub struct GelfBuilder {
    imp: Gelf,
}

impl GelfBuilder {
    /// Emit the legacy 1.0 layout (`facility`, `file` & `line` included). On by default.
    pub fn include_legacy_fields(mut self, include_legacy_fields: bool) -> Self {
        self.imp.include_legacy_fields = include_legacy_fields;
        self
    }
    /// Forward the record's own property bag as additional fields. On by default.
    pub fn include_event_properties(mut self, include_event_properties: bool) -> Self {
        self.imp.include_event_properties = include_event_properties;
        self
    }
    /// Forward the ambient scope bag as additional fields. Off by default.
    pub fn include_scope_properties(mut self, include_scope_properties: bool) -> Self {
        self.imp.include_scope_properties = include_scope_properties;
        self
    }
    /// Set the legacy `facility` field; blank renders as `"GELF"`. Ignored by the 1.1 layout.
    pub fn facility<S: Into<String>>(mut self, facility: S) -> Self {
        self.imp.facility = facility.into();
        self
    }
    /// Use `host_name` instead of resolving this machine's name.
    pub fn host_name<S: Into<String>>(mut self, host_name: S) -> Self {
        self.imp.host_name = Some(host_name.into());
        self
    }
    /// Suppress a property key (case-insensitive, leading underscore or no).
    pub fn exclude_property<S: AsRef<str>>(mut self, key: S) -> Self {
        self.imp
            .exclude_properties
            .insert(comparison_key(key.as_ref()));
        self
    }
    /// Declare an extra field, evaluated against every record after all property sources.
    pub fn extra_field(mut self, field: ExtraField) -> Self {
        self.imp.extra_fields.push(field);
        self
    }
    /// Nudge colliding record timestamps apart (see [`TimestampDeduper`]). Off by default.
    pub fn fix_duplicate_timestamp(mut self, fix_duplicate_timestamp: bool) -> Self {
        self.imp.fix_duplicate_timestamp = fix_duplicate_timestamp;
        self
    }
    /// Escalate per-field & host-name failures into failing the whole conversion. Off by
    /// default (failures drop the field, or substitute `"UnknownHost"`, and continue).
    pub fn strict(mut self, strict: bool) -> Self {
        self.imp.strict = strict;
        self
    }
    pub fn build(self) -> Gelf {
        self.imp
    }
}

impl Gelf {
    pub fn builder() -> GelfBuilder {
        GelfBuilder {
            imp: Gelf::default(),
        }
    }

    /// True if `key` may not pass through from a property bag.
    fn is_excluded(&self, key: &str) -> bool {
        let key = key.trim();
        let clean = key.strip_prefix('_').unwrap_or(key);
        RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(clean))
            || self.exclude_properties.contains(&clean.to_ascii_lowercase())
    }

    /// The `host` field for this instance.
    ///
    /// An explicit override wins; otherwise the machine's name is resolved at most once &
    /// cached. The cache is only written on success, so a failed or empty lookup (rendered as
    /// `"UnknownHost"`, or an error under strict mode) will be retried on a later call.
    /// Racing writers all compute the same value, so the idempotent [`OnceLock`] write is safe.
    ///
    /// [`OnceLock`]: std::sync::OnceLock
    fn host_name(&self) -> Result<&str> {
        if let Some(name) = &self.host_name {
            return Ok(name);
        }
        if let Some(name) = self.cached_host.get() {
            return Ok(name);
        }
        match hostname::get() {
            Ok(name) if !name.is_empty() => Ok(self
                .cached_host
                .get_or_init(|| name.to_string_lossy().into_owned())
                .as_str()),
            Ok(_) if self.strict => Err(Error::NoHostname {
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "gethostname() returned an empty name",
                )),
                back: Backtrace::new(),
            }),
            Err(err) if self.strict => Err(Error::NoHostname {
                source: Box::new(err),
                back: Backtrace::new(),
            }),
            _ => Ok(UNKNOWN_HOST),
        }
    }

    /// Write `record` as one compact JSON object to `writer`.
    ///
    /// On failure the document is incomplete: the caller owns `writer` & must discard or
    /// truncate whatever was written (the [`Formatter`] impl formats into a fresh buffer for
    /// exactly this reason). On success, exactly one complete object has been written.
    pub fn write_record<W: std::io::Write>(&self, record: &LogRecord, writer: W) -> Result<()> {
        let mut ser = serde_json::Serializer::new(writer);
        let mut map = (&mut ser).serialize_map(None)?;

        let full_message = truncate_chars(&record.message, MAX_FIELD_CHARS);
        let short_message = truncate_chars(&record.message, MAX_SHORT_MESSAGE_CHARS);
        let host = self.host_name()?;
        let level = record.level.ordinal();
        let timestamp = if self.fix_duplicate_timestamp {
            unix_timestamp(self.timestamps.next(record.timestamp))
        } else {
            unix_timestamp(record.timestamp)
        };

        if self.include_legacy_fields {
            let facility = if self.facility.trim().is_empty() {
                DEFAULT_FACILITY
            } else {
                self.facility.as_str()
            };
            map.serialize_entry("facility", facility)?;
            map.serialize_entry(
                "file",
                record.file.as_deref().unwrap_or(record.logger_name.as_str()),
            )?;
            map.serialize_entry("full_message", full_message)?;
            map.serialize_entry("host", host)?;
            map.serialize_entry("level", &level)?;
            map.serialize_entry("line", &record.line.unwrap_or(0))?;
            map.serialize_entry("short_message", short_message)?;
            map.serialize_entry("timestamp", &timestamp)?;
            map.serialize_entry("version", GELF_VERSION)?;
        } else {
            map.serialize_entry("version", GELF_VERSION)?;
            map.serialize_entry("host", host)?;
            map.serialize_entry("short_message", short_message)?;
            map.serialize_entry("full_message", full_message)?;
            map.serialize_entry("timestamp", &timestamp)?;
            map.serialize_entry("level", &level)?;
        }

        // Additional fields, in source-precedence order. `seen` holds comparison-form keys so
        // that overlapping sources cannot emit the same key twice: the first writer wins.
        let mut seen: HashSet<String> = HashSet::new();

        if self.include_event_properties {
            for (key, value) in &record.properties {
                if self.is_excluded(key) {
                    continue;
                }
                let key = canonical_key(key);
                if !seen.insert(comparison_key(&key)) {
                    continue;
                }
                map.serialize_entry(&key, value)?;
            }
        }

        // Synthesized, not user properties: exempt from the exclusion set.
        if let Some(exception) = &record.exception {
            map.serialize_entry("_ExceptionSource", &optional_text(&exception.source))?;
            map.serialize_entry("_ExceptionMessage", &Value::Text(exception.message.clone()))?;
            map.serialize_entry("_ExceptionType", &optional_text(&exception.type_name))?;
            map.serialize_entry("_StackTrace", &optional_text(&exception.stack_trace))?;
        }

        map.serialize_entry("_LoggerName", record.logger_name.as_str())?;

        if self.include_scope_properties {
            for (key, value) in &record.scope_properties {
                if self.is_excluded(key) {
                    continue;
                }
                let key = canonical_key(key);
                if !seen.insert(comparison_key(&key)) {
                    continue;
                }
                map.serialize_entry(&key, value)?;
            }
        }

        for field in &self.extra_fields {
            if self.is_excluded(field.clean_name()) || seen.contains(field.clean_name()) {
                continue;
            }
            let text = field.render(record);
            if text.is_empty() && field.skips_empty() {
                continue;
            }
            match field.convert(&text) {
                Ok(value) => {
                    map.serialize_entry(field.field_name(), &value)?;
                    seen.insert(field.clean_name().to_owned());
                }
                Err(err) if self.strict => return Err(err),
                Err(err) => {
                    // Diagnostics stay off the tracing pipeline; a formatter that logs
                    // through the pipeline it serves can recurse.
                    eprintln!("dropping extra field {}: {}", field.field_name(), err);
                }
            }
        }

        map.end()?;
        Ok(())
    }
}

impl Formatter for Gelf {
    type Error = Error;
    type Output = Vec<u8>;
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        self.write_record(record, &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::field::FieldType;
    use crate::level::Level;
    use crate::record::Exception;

    use chrono::prelude::*;

    fn test_record() -> LogRecord {
        let mut record = LogRecord::new(Level::Info, "hello, gelf :)");
        record.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        record.logger_name = "TestLogger".to_owned();
        record
    }

    fn test_formatter() -> GelfBuilder {
        Gelf::builder()
            .facility("TestFacility")
            .host_name("bree.local")
    }

    fn render(formatter: &Gelf, record: &LogRecord) -> String {
        String::from_utf8(formatter.format(record).unwrap()).unwrap()
    }

    fn parse(formatter: &Gelf, record: &LogRecord) -> serde_json::Value {
        serde_json::from_str(&render(formatter, record)).unwrap()
    }

    #[test]
    fn test_render_legacy() {
        let f = test_formatter().build();
        assert_eq!(
            render(&f, &test_record()),
            "{\"facility\":\"TestFacility\",\
              \"file\":\"TestLogger\",\
              \"full_message\":\"hello, gelf :)\",\
              \"host\":\"bree.local\",\
              \"level\":6,\
              \"line\":0,\
              \"short_message\":\"hello, gelf :)\",\
              \"timestamp\":0.0,\
              \"version\":\"1.1\",\
              \"_LoggerName\":\"TestLogger\"}"
        );
    }

    #[test]
    fn test_render_current() {
        let f = test_formatter().include_legacy_fields(false).build();
        assert_eq!(
            render(&f, &test_record()),
            "{\"version\":\"1.1\",\
              \"host\":\"bree.local\",\
              \"short_message\":\"hello, gelf :)\",\
              \"full_message\":\"hello, gelf :)\",\
              \"timestamp\":0.0,\
              \"level\":6,\
              \"_LoggerName\":\"TestLogger\"}"
        );
    }

    #[test]
    fn test_typed_property_values() {
        let f = test_formatter().build();
        let mut record = test_record();
        record.properties = vec![
            ("stringKey".to_owned(), Value::from("stringVal")),
            ("intKey".to_owned(), Value::from(1_i32)),
            ("enumKey".to_owned(), Value::Symbol("Enum1")),
            (
                "dateTimeKey".to_owned(),
                Value::from(Utc.timestamp_opt(90, 0).unwrap()),
            ),
        ];
        let doc = render(&f, &record);
        assert!(doc.contains(
            "\"_stringKey\":\"stringVal\",\"_intKey\":1,\"_enumKey\":\"Enum1\",\"_dateTimeKey\":90.0"
        ));
    }

    #[test]
    fn test_exception_fields() {
        // Even an exclusion set naming the exception fields cannot suppress them: they are
        // synthesized by the converter, not read from a property bag.
        let f = test_formatter()
            .exclude_property("ExceptionMessage")
            .exclude_property("StackTrace")
            .build();
        let mut record = test_record();
        record.level = Level::Fatal;
        record.exception = Some(Exception {
            source: Some("test-app".to_owned()),
            message: "funny exception :D".to_owned(),
            type_name: Some("io::Error".to_owned()),
            stack_trace: Some("funny exception :D\ncaused by: very funny exception ::D".to_owned()),
        });
        let doc = parse(&f, &record);
        assert_eq!(doc["level"], 2);
        assert_eq!(doc["_ExceptionSource"], "test-app");
        assert_eq!(doc["_ExceptionMessage"], "funny exception :D");
        assert_eq!(doc["_ExceptionType"], "io::Error");
        assert_eq!(
            doc["_StackTrace"],
            "funny exception :D\ncaused by: very funny exception ::D"
        );
    }

    #[test]
    fn test_facility_fallback() {
        let f = Gelf::builder().host_name("bree.local").build();
        let doc = parse(&f, &test_record());
        assert_eq!(doc["facility"], "GELF");

        let f = Gelf::builder().facility("   ").host_name("bree.local").build();
        let doc = parse(&f, &test_record());
        assert_eq!(doc["facility"], "GELF");
    }

    #[test]
    fn test_message_clamping() {
        let f = test_formatter().build();
        let mut record = test_record();
        record.message = "界".repeat(MAX_FIELD_CHARS + 500);
        let doc = parse(&f, &record);
        assert_eq!(
            doc["full_message"].as_str().unwrap().chars().count(),
            MAX_FIELD_CHARS
        );
        assert_eq!(
            doc["short_message"].as_str().unwrap().chars().count(),
            MAX_SHORT_MESSAGE_CHARS
        );
    }

    #[test]
    fn test_key_normalization() {
        let f = test_formatter().build();
        let mut record = test_record();
        record.properties = vec![
            ("request-id".to_owned(), Value::from("abc")),
            ("id".to_owned(), Value::from(17_u32)),
        ];
        let doc = parse(&f, &record);
        assert_eq!(doc["_request_id"], "abc");
        assert_eq!(doc["_idx"], 17);
        assert!(doc.get("_id").is_none());
    }

    #[test]
    fn test_exclusions() {
        let f = test_formatter()
            .exclude_property("password")
            .extra_field(ExtraField::new("password", |_| "hunter2".to_owned()))
            .build();
        let mut record = test_record();
        record.properties = vec![
            ("password".to_owned(), Value::from("hunter2")),
            ("_Password".to_owned(), Value::from("hunter2")),
            ("LoggerName".to_owned(), Value::from("spoofed")),
            ("_StackTrace".to_owned(), Value::from("spoofed")),
            ("user".to_owned(), Value::from("gandalf")),
        ];
        let doc = parse(&f, &record);
        assert!(doc.get("_password").is_none());
        assert!(doc.get("_Password").is_none());
        assert_eq!(doc["_LoggerName"], "TestLogger");
        assert!(doc.get("_StackTrace").is_none());
        assert_eq!(doc["_user"], "gandalf");
    }

    #[test]
    fn test_event_properties_can_be_disabled() {
        let f = test_formatter().include_event_properties(false).build();
        let mut record = test_record();
        record.properties = vec![("user".to_owned(), Value::from("gandalf"))];
        let doc = parse(&f, &record);
        assert!(doc.get("_user").is_none());
    }

    #[test]
    fn test_scope_properties() {
        let f = test_formatter().include_scope_properties(true).build();
        let mut record = test_record();
        record.properties = vec![("request_id".to_owned(), Value::from("from-event"))];
        record.scope_properties = vec![
            ("request_id".to_owned(), Value::from("from-scope")),
            ("tenant".to_owned(), Value::from("acme")),
        ];
        let doc = parse(&f, &record);
        // The event property claimed the key first.
        assert_eq!(doc["_request_id"], "from-event");
        assert_eq!(doc["_tenant"], "acme");
    }

    #[test]
    fn test_scope_properties_off_by_default() {
        let f = test_formatter().build();
        let mut record = test_record();
        record.scope_properties = vec![("tenant".to_owned(), Value::from("acme"))];
        let doc = parse(&f, &record);
        assert!(doc.get("_tenant").is_none());
    }

    #[test]
    fn test_extra_fields() {
        let f = test_formatter()
            .extra_field(ExtraField::new("environment", |_| "staging".to_owned()))
            .extra_field(
                ExtraField::new("shard", |_| "12".to_owned()).value_type(FieldType::Integer),
            )
            .extra_field(
                ExtraField::new("payload", |_| "{\"a\":[1,2]}".to_owned())
                    .value_type(FieldType::Json),
            )
            .extra_field(
                ExtraField::new("maybe-empty", |_| String::new()).include_empty_value(false),
            )
            .extra_field(ExtraField::new("user", |_| "saruman".to_owned()))
            .build();
        let mut record = test_record();
        record.properties = vec![("user".to_owned(), Value::from("gandalf"))];
        let doc = parse(&f, &record);
        assert_eq!(doc["_environment"], "staging");
        assert_eq!(doc["_shard"], 12);
        assert_eq!(doc["_payload"]["a"][1], 2);
        assert!(doc.get("_maybe_empty").is_none());
        // The record property claimed `user` first; the extra field is skipped whole.
        assert_eq!(doc["_user"], "gandalf");
    }

    #[test]
    fn test_extra_field_conversion_failure_drops_field() {
        let f = test_formatter()
            .extra_field(
                ExtraField::new("shard", |_| "forty-two".to_owned())
                    .value_type(FieldType::Integer),
            )
            .build();
        let doc = parse(&f, &test_record());
        assert!(doc.get("_shard").is_none());
        assert_eq!(doc["_LoggerName"], "TestLogger");
    }

    #[test]
    fn test_strict_mode_escalates_conversion_failure() {
        let f = test_formatter()
            .strict(true)
            .extra_field(
                ExtraField::new("shard", |_| "forty-two".to_owned())
                    .value_type(FieldType::Integer),
            )
            .build();
        assert!(f.format(&test_record()).is_err());
    }

    #[test]
    fn test_fix_duplicate_timestamp() {
        let f = test_formatter().fix_duplicate_timestamp(true).build();
        let record = test_record();
        let timestamps: Vec<f64> = (0..5)
            .map(|_| parse(&f, &record)["timestamp"].as_f64().unwrap())
            .collect();
        for pair in timestamps.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        let source = unix_timestamp(record.timestamp);
        for t in &timestamps {
            assert!(*t >= source && *t <= source + 0.001);
        }
    }

    #[test]
    fn test_caller_location_fields() {
        let f = test_formatter().build();
        let mut record = test_record();
        record.file = Some("src/billing.rs".to_owned());
        record.line = Some(42);
        let doc = parse(&f, &record);
        assert_eq!(doc["file"], "src/billing.rs");
        assert_eq!(doc["line"], 42);
    }
}
