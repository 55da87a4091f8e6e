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

//! Caller-declared extra fields & additional-field key normalization.
//!
//! An [`ExtraField`] is a fixed declaration on the formatter: a field name, a closure producing
//! the field's text from each record, and a target type to coerce that text into. The name is
//! normalized once, at construction; [`canonical_key`] applies the same normalization to record
//! property keys so that collision checks & output keys agree everywhere.

use crate::{
    error::{Error, Result},
    record::LogRecord,
    value::Value,
};

use backtrace::Backtrace;

/// Normalize a key into GELF additional-field form.
///
/// Hyphens become underscores (Graylog rejects `-` in field names), a leading `_` is added if
/// absent, and the reserved key `_id` is rewritten to `_idx`; servers silently drop `_id`
/// because it would collide with their storage key.
pub fn canonical_key(key: &str) -> String {
    let key = key.trim();
    let mut name = String::with_capacity(key.len() + 1);
    if !key.starts_with('_') {
        name.push('_');
    }
    name.push_str(key);
    if name.contains('-') {
        name = name.replace('-', "_");
    }
    if name.eq_ignore_ascii_case("_id") {
        name = "_idx".to_owned();
    }
    name
}

/// The form of a canonical key used for collision & exclusion checks: no leading underscore,
/// ASCII-lowercased.
pub(crate) fn comparison_key(canonical: &str) -> String {
    canonical
        .strip_prefix('_')
        .unwrap_or(canonical)
        .to_ascii_lowercase()
}

/// The target type an [`ExtraField`]'s rendered text is converted into.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldType {
    /// Emit the rendered text as-is (the default)
    Text,
    /// Parse the text as a signed integer
    Integer,
    /// Parse the text as a floating-point number
    Double,
    /// Parse the text as `true`/`false`
    Boolean,
    /// Parse the text as a JSON document & emit the resulting structure
    Json,
}

impl std::default::Default for FieldType {
    fn default() -> Self {
        FieldType::Text
    }
}

impl FieldType {
    /// Convert rendered text into a [`Value`] of this type.
    ///
    /// A conversion failure is recoverable: the caller drops the field & continues the record
    /// (unless it opted into strict mode).
    pub(crate) fn convert(&self, name: &str, text: &str) -> Result<Value> {
        match self {
            FieldType::Text => Ok(Value::Text(text.to_owned())),
            FieldType::Integer => text
                .parse::<i64>()
                .map(Value::I64)
                .map_err(|err| Error::BadFieldValue {
                    name: name.to_owned(),
                    source: Box::new(err),
                    back: Backtrace::new(),
                }),
            FieldType::Double => text
                .parse::<f64>()
                .map(Value::F64)
                .map_err(|err| Error::BadFieldValue {
                    name: name.to_owned(),
                    source: Box::new(err),
                    back: Backtrace::new(),
                }),
            FieldType::Boolean => text
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|err| Error::BadFieldValue {
                    name: name.to_owned(),
                    source: Box::new(err),
                    back: Backtrace::new(),
                }),
            FieldType::Json => serde_json::from_str(text)
                .map(Value::Structured)
                .map_err(|err| Error::BadFieldValue {
                    name: name.to_owned(),
                    source: Box::new(err),
                    back: Backtrace::new(),
                }),
        }
    }
}

/// A caller-declared additional field, evaluated against every record.
pub struct ExtraField {
    field_name: String,
    clean_name: String,
    layout: Box<dyn Fn(&LogRecord) -> String + Send + Sync>,
    include_empty_value: bool,
    value_type: FieldType,
}

impl ExtraField {
    /// Declare an extra field.
    ///
    /// `name` is normalized immediately (see [`canonical_key`]); `layout` computes the field's
    /// text from each record. By default the text is emitted as a string, and empty renderings
    /// are still included.
    pub fn new<F>(name: &str, layout: F) -> ExtraField
    where
        F: Fn(&LogRecord) -> String + Send + Sync + 'static,
    {
        let field_name = canonical_key(name);
        let clean_name = comparison_key(&field_name);
        ExtraField {
            field_name,
            clean_name,
            layout: Box::new(layout),
            include_empty_value: true,
            value_type: FieldType::Text,
        }
    }

    /// Whether an empty rendering should still be emitted (defaults to true).
    pub fn include_empty_value(mut self, include_empty_value: bool) -> Self {
        self.include_empty_value = include_empty_value;
        self
    }

    /// Set the target type the rendered text is converted into.
    pub fn value_type(mut self, value_type: FieldType) -> Self {
        self.value_type = value_type;
        self
    }

    /// The key this field is emitted under (canonical form, leading `_`).
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub(crate) fn clean_name(&self) -> &str {
        &self.clean_name
    }

    pub(crate) fn skips_empty(&self) -> bool {
        !self.include_empty_value
    }

    pub(crate) fn render(&self, record: &LogRecord) -> String {
        (self.layout)(record)
    }

    pub(crate) fn convert(&self, text: &str) -> Result<Value> {
        self.value_type.convert(&self.field_name, text)
    }
}

impl std::fmt::Debug for ExtraField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ExtraField")
            .field("field_name", &self.field_name)
            .field("include_empty_value", &self.include_empty_value)
            .field("value_type", &self.value_type)
            .finish()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("user"), "_user");
        assert_eq!(canonical_key("_user"), "_user");
        assert_eq!(canonical_key("request-id"), "_request_id");
        assert_eq!(canonical_key(" padded "), "_padded");
        assert_eq!(canonical_key("id"), "_idx");
        assert_eq!(canonical_key("_id"), "_idx");
        assert_eq!(canonical_key("ID"), "_idx");
        assert_eq!(canonical_key("idx"), "_idx");
    }

    #[test]
    fn test_comparison_key() {
        assert_eq!(comparison_key("_Request_Id"), "request_id");
        assert_eq!(comparison_key("Plain"), "plain");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            FieldType::Integer.convert("_n", "42").unwrap(),
            Value::I64(42)
        );
        assert_eq!(
            FieldType::Double.convert("_x", "2.5").unwrap(),
            Value::F64(2.5)
        );
        assert_eq!(
            FieldType::Boolean.convert("_b", "true").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            FieldType::Text.convert("_s", "42").unwrap(),
            Value::Text("42".to_owned())
        );
        match FieldType::Json.convert("_j", "{\"a\":[1,2]}").unwrap() {
            Value::Structured(tree) => assert_eq!(tree["a"][1], 2),
            _ => panic!("expected a structured value"),
        }
    }

    #[test]
    fn test_conversion_failures_are_errors() {
        assert!(FieldType::Integer.convert("_n", "forty-two").is_err());
        assert!(FieldType::Boolean.convert("_b", "yes").is_err());
        assert!(FieldType::Json.convert("_j", "{not json").is_err());
    }

    #[test]
    fn test_extra_field_declaration() {
        let field = ExtraField::new("correlation-id", |record| record.logger_name.clone())
            .include_empty_value(false)
            .value_type(FieldType::Text);
        assert_eq!(field.field_name(), "_correlation_id");
        assert_eq!(field.clean_name(), "correlation_id");
        assert!(field.skips_empty());

        let mut record = crate::record::LogRecord::new(crate::level::Level::Info, "msg");
        record.logger_name = "TestLogger".to_owned();
        assert_eq!(field.render(&record), "TestLogger");
    }
}
