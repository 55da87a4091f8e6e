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

//! GELF-legal property values.
//!
//! GELF permits additional-field values to be JSON strings & numbers (and, in the wild, booleans,
//! nulls and nested structures); arbitrary runtime values have to be coerced into that set before
//! they hit the wire. Rather than inspect values dynamically at encode time, [`Value`] enumerates
//! the encodable kinds up-front as a closed sum & every source converts into it; the [`Serialize`]
//! implementation is then the entire encoder. The variant list is ordered by encoding priority:
//! null, boolean, date/time, text, floating-point, symbolic, integer, and finally a generic
//! structured fallback.
//!
//! [`Serialize`]: serde::Serialize
//!
//! Two escape hatches cover the open-ended cases: [`Value::structured`] runs any
//! [`serde::Serialize`] type through a generic tree encoding (a per-field failure is recoverable
//! & reported to the caller, never a panic), and [`Value::display`] renders values that cannot be
//! meaningfully serialized (handles, streams, type-metadata objects) as their textual
//! representation instead of traversing their internals.

use crate::{
    error::Result,
    timestamp::unix_timestamp,
};

use chrono::prelude::*;

type StdResult<T, E> = std::result::Result<T, E>;

/// GELF servers reject individual string values (and messages) longer than this, in characters.
pub const MAX_FIELD_CHARS: usize = 16383;

/// Truncate `s` to at most `max` characters, never splitting a multi-byte sequence.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Clamp every string inside a JSON tree to [`MAX_FIELD_CHARS`], recursively.
fn clamp_json_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            if s.chars().count() > MAX_FIELD_CHARS {
                *s = truncate_chars(s, MAX_FIELD_CHARS).to_owned();
            }
        }
        serde_json::Value::Array(elements) => {
            for element in elements {
                clamp_json_strings(element);
            }
        }
        serde_json::Value::Object(members) => {
            for (_, member) in members {
                clamp_json_strings(member);
            }
        }
        _ => (),
    }
}

/// A runtime value encodable as a GELF additional field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An absent value; encodes as JSON `null`
    Null,
    /// Encodes as a JSON boolean
    Bool(bool),
    /// A point in time; encodes as the same decimal epoch-seconds number as the record timestamp
    Timestamp(DateTime<Utc>),
    /// Free text; clamped to [`MAX_FIELD_CHARS`] characters on the way out
    Text(String),
    /// Encodes as a JSON number, keeping `f32`'s shorter decimal expansions
    F32(f32),
    /// Encodes as a JSON number
    F64(f64),
    /// An enumerated value; encodes as its name, not its underlying ordinal
    Symbol(&'static str),
    /// Any signed integer; encodes as a JSON number
    I64(i64),
    /// Any unsigned integer; encodes as a JSON number
    U64(u64),
    /// Pre-encoded structured data (objects, arrays); emitted as-is
    Structured(serde_json::Value),
}

impl Value {
    /// Generic structured serialization for composite values.
    ///
    /// Fields & elements are encoded recursively by the same rules as scalar [`Value`]s (strings
    /// clamped, etc.). `serde` trees cannot contain reference cycles, so unlike reflective
    /// encoders there is nothing to break. A failure here is per-field recoverable: callers drop
    /// the offending field & continue the record.
    pub fn structured<T: serde::Serialize>(value: &T) -> Result<Value> {
        let mut tree = serde_json::to_value(value)?;
        clamp_json_strings(&mut tree);
        Ok(Value::Structured(tree))
    }

    /// The textual fallback for values with no meaningful serialization.
    pub fn display<T: std::fmt::Display>(value: &T) -> Value {
        Value::Text(value.to_string())
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Timestamp(value) => serializer.serialize_f64(unix_timestamp(*value)),
            Value::Text(value) => serializer.serialize_str(truncate_chars(value, MAX_FIELD_CHARS)),
            Value::F32(value) => serializer.serialize_f32(*value),
            Value::F64(value) => serializer.serialize_f64(*value),
            Value::Symbol(name) => serializer.serialize_str(name),
            Value::I64(value) => serializer.serialize_i64(*value),
            Value::U64(value) => serializer.serialize_u64(*value),
            Value::Structured(value) => value.serialize(serializer),
        }
    }
}

impl std::convert::From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl std::convert::From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl std::convert::From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl std::convert::From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl std::convert::From<char> for Value {
    fn from(value: char) -> Self {
        Value::Text(value.to_string())
    }
}

impl std::convert::From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl std::convert::From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

macro_rules! value_from_signed {
    ($($t:ty),*) => {
        $(impl std::convert::From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::I64(value as i64)
            }
        })*
    };
}

macro_rules! value_from_unsigned {
    ($($t:ty),*) => {
        $(impl std::convert::From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::U64(value as u64)
            }
        })*
    };
}

value_from_signed!(i8, i16, i32, i64, isize);
value_from_unsigned!(u8, u16, u32, u64, usize);

impl std::convert::From<serde_json::Value> for Value {
    fn from(mut value: serde_json::Value) -> Self {
        clamp_json_strings(&mut value);
        Value::Structured(value)
    }
}

impl<T: Into<Value>> std::convert::From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}
