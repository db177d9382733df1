//! Typed setting values in the GVariant data model
//!
//! - **types**: the type grammar (`s`, `as`, `a{sv}`, ...)
//! - **parser**: the text format used by `gsettings` and by module arguments

mod parser;
mod types;

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde_json::{Map, Number, Value};

pub use parser::{ParseError, parse};
pub use types::{TypeError, VariantType};

/// A single typed value. Dictionaries are arrays of `DictEntry`.
///
/// Equality is structural and typed: `Int32(5)` and `Uint32(5)` differ, as
/// they do in the settings store. Doubles compare bitwise, so `nan` equals
/// itself and `0.0` differs from `-0.0`.
#[derive(Debug, Clone)]
pub enum Variant {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Handle(i32),
    Double(f64),
    String(String),
    ObjectPath(String),
    Signature(String),
    Variant(Box<Variant>),
    Maybe {
        inner: VariantType,
        value: Option<Box<Variant>>,
    },
    Array {
        element: VariantType,
        items: Vec<Variant>,
    },
    Tuple(Vec<Variant>),
    DictEntry(Box<Variant>, Box<Variant>),
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Double(a), Variant::Double(b)) => a.to_bits() == b.to_bits(),
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::Byte(a), Variant::Byte(b)) => a == b,
            (Variant::Int16(a), Variant::Int16(b)) => a == b,
            (Variant::Uint16(a), Variant::Uint16(b)) => a == b,
            (Variant::Int32(a), Variant::Int32(b)) | (Variant::Handle(a), Variant::Handle(b)) => a == b,
            (Variant::Uint32(a), Variant::Uint32(b)) => a == b,
            (Variant::Int64(a), Variant::Int64(b)) => a == b,
            (Variant::Uint64(a), Variant::Uint64(b)) => a == b,
            (Variant::String(a), Variant::String(b))
            | (Variant::ObjectPath(a), Variant::ObjectPath(b))
            | (Variant::Signature(a), Variant::Signature(b)) => a == b,
            (Variant::Variant(a), Variant::Variant(b)) => a == b,
            (Variant::Maybe { inner: ta, value: a }, Variant::Maybe { inner: tb, value: b }) => ta == tb && a == b,
            (Variant::Array { element: ta, items: a }, Variant::Array { element: tb, items: b }) => {
                ta == tb && a == b
            }
            (Variant::Tuple(a), Variant::Tuple(b)) => a == b,
            (Variant::DictEntry(ka, va), Variant::DictEntry(kb, vb)) => ka == kb && va == vb,
            _ => false,
        }
    }
}

impl Variant {
    /// Parse a text literal, resolving it against `hint` when the expected type is known.
    pub fn parse(text: &str, hint: Option<&VariantType>) -> Result<Self, ParseError> {
        parser::parse(text, hint)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Variant::String(value.into())
    }

    pub fn string_array<S: AsRef<str>>(values: &[S]) -> Self {
        Variant::Array {
            element: VariantType::String,
            items: values.iter().map(|s| Variant::string(s.as_ref())).collect(),
        }
    }

    pub fn value_type(&self) -> VariantType {
        match self {
            Variant::Bool(_) => VariantType::Bool,
            Variant::Byte(_) => VariantType::Byte,
            Variant::Int16(_) => VariantType::Int16,
            Variant::Uint16(_) => VariantType::Uint16,
            Variant::Int32(_) => VariantType::Int32,
            Variant::Uint32(_) => VariantType::Uint32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::Uint64(_) => VariantType::Uint64,
            Variant::Handle(_) => VariantType::Handle,
            Variant::Double(_) => VariantType::Double,
            Variant::String(_) => VariantType::String,
            Variant::ObjectPath(_) => VariantType::ObjectPath,
            Variant::Signature(_) => VariantType::Signature,
            Variant::Variant(_) => VariantType::Variant,
            Variant::Maybe { inner, .. } => VariantType::maybe_of(inner.clone()),
            Variant::Array { element, .. } => VariantType::array_of(element.clone()),
            Variant::Tuple(items) => VariantType::Tuple(items.iter().map(Variant::value_type).collect()),
            Variant::DictEntry(k, v) => VariantType::DictEntry(Box::new(k.value_type()), Box::new(v.value_type())),
        }
    }

    /// Unpack into plain JSON for reporting back to the caller.
    pub fn to_json(&self) -> Value {
        match self {
            Variant::Bool(b) => Value::Bool(*b),
            Variant::Byte(n) => Value::from(*n),
            Variant::Int16(n) => Value::from(*n),
            Variant::Uint16(n) => Value::from(*n),
            Variant::Int32(n) | Variant::Handle(n) => Value::from(*n),
            Variant::Uint32(n) => Value::from(*n),
            Variant::Int64(n) => Value::from(*n),
            Variant::Uint64(n) => Value::from(*n),
            Variant::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
            Variant::String(s) | Variant::ObjectPath(s) | Variant::Signature(s) => Value::String(s.clone()),
            Variant::Variant(inner) => inner.to_json(),
            Variant::Maybe { value, .. } => value.as_ref().map_or(Value::Null, |v| v.to_json()),
            Variant::Array {
                element: VariantType::DictEntry(..),
                items,
            } => {
                let mut map = Map::new();
                for item in items {
                    if let Variant::DictEntry(k, v) = item {
                        map.insert(k.json_key(), v.to_json());
                    }
                }
                Value::Object(map)
            }
            Variant::Array { items, .. } | Variant::Tuple(items) => {
                Value::Array(items.iter().map(Variant::to_json).collect())
            }
            Variant::DictEntry(k, v) => Value::Array(vec![k.to_json(), v.to_json()]),
        }
    }

    fn json_key(&self) -> String {
        match self {
            Variant::String(s) | Variant::ObjectPath(s) | Variant::Signature(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Print in GVariant text format. With `annotate`, type information is
    /// added wherever parsing the output without a hint would otherwise
    /// produce a different type.
    fn write_text(&self, out: &mut String, annotate: bool) -> fmt::Result {
        let prefix = |out: &mut String, keyword: &str| {
            if annotate {
                out.push_str(keyword);
                out.push(' ');
            }
        };
        match self {
            Variant::Bool(b) => write!(out, "{b}"),
            Variant::Byte(n) => {
                prefix(out, "byte");
                write!(out, "0x{n:02x}")
            }
            Variant::Int16(n) => {
                prefix(out, "int16");
                write!(out, "{n}")
            }
            Variant::Uint16(n) => {
                prefix(out, "uint16");
                write!(out, "{n}")
            }
            Variant::Int32(n) => write!(out, "{n}"),
            Variant::Uint32(n) => {
                prefix(out, "uint32");
                write!(out, "{n}")
            }
            Variant::Int64(n) => {
                prefix(out, "int64");
                write!(out, "{n}")
            }
            Variant::Uint64(n) => {
                prefix(out, "uint64");
                write!(out, "{n}")
            }
            Variant::Handle(n) => {
                prefix(out, "handle");
                write!(out, "{n}")
            }
            Variant::Double(d) => write_double(out, *d),
            Variant::String(s) => write_quoted(out, s),
            Variant::ObjectPath(s) => {
                prefix(out, "objectpath");
                write_quoted(out, s)
            }
            Variant::Signature(s) => {
                prefix(out, "signature");
                write_quoted(out, s)
            }
            Variant::Variant(inner) => {
                out.push('<');
                inner.write_text(out, true)?;
                out.push('>');
                Ok(())
            }
            Variant::Maybe { value: None, .. } => {
                if annotate {
                    write!(out, "@{} ", self.value_type())?;
                }
                out.push_str("nothing");
                Ok(())
            }
            Variant::Maybe { value: Some(inner), .. } => {
                out.push_str("just ");
                inner.write_text(out, annotate)
            }
            Variant::Array { element, items } => {
                if let Some(body) = bytestring_body(items) {
                    return write_bytestring(out, &body);
                }

                let is_dict = matches!(element, VariantType::DictEntry(..));
                if items.is_empty() {
                    if annotate {
                        write!(out, "@{} ", self.value_type())?;
                    }
                    out.push_str(if is_dict { "{}" } else { "[]" });
                    return Ok(());
                }

                out.push(if is_dict { '{' } else { '[' });
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    // The first element carries the annotation for the whole array
                    let annotate_item = annotate && i == 0;
                    match item {
                        Variant::DictEntry(k, v) if is_dict => {
                            k.write_text(out, annotate_item)?;
                            out.push_str(": ");
                            v.write_text(out, annotate_item)?;
                        }
                        other => other.write_text(out, annotate_item)?,
                    }
                }
                out.push(if is_dict { '}' } else { ']' });
                Ok(())
            }
            Variant::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_text(out, annotate)?;
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
                Ok(())
            }
            Variant::DictEntry(k, v) => {
                out.push('{');
                k.write_text(out, annotate)?;
                out.push_str(", ");
                v.write_text(out, annotate)?;
                out.push('}');
                Ok(())
            }
        }
    }
}

fn write_double(out: &mut String, d: f64) -> fmt::Result {
    if d.is_nan() {
        out.push_str("nan");
        Ok(())
    } else if d.is_infinite() {
        out.push_str(if d > 0.0 { "inf" } else { "-inf" });
        Ok(())
    } else {
        // Debug formatting always keeps a '.' or exponent, so the value re-parses as a double
        write!(out, "{d:?}")
    }
}

/// Bytes of a byte array that prints as `b'...'`: NUL-terminated with no
/// other NUL. The terminator is not included.
fn bytestring_body(items: &[Variant]) -> Option<Vec<u8>> {
    let (last, body) = items.split_last()?;
    if *last != Variant::Byte(0) {
        return None;
    }
    body.iter()
        .map(|item| match item {
            Variant::Byte(b) if *b != 0 => Some(*b),
            _ => None,
        })
        .collect()
}

fn write_bytestring(out: &mut String, body: &[u8]) -> fmt::Result {
    out.push_str("b'");
    for &b in body {
        match b {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            0x0b => out.push_str("\\v"),
            0x0c => out.push_str("\\f"),
            0x20..=0x7e => out.push(char::from(b)),
            other => write!(out, "\\{other:03o}")?,
        }
    }
    out.push('\'');
    Ok(())
}

fn write_quoted(out: &mut String, s: &str) -> fmt::Result {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0b}' => out.push_str("\\v"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_control() => write!(out, "\\u{:04x}", c as u32)?,
            c => out.push(c),
        }
    }
    out.push('\'');
    Ok(())
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_text(&mut out, true)?;
        f.write_str(&out)
    }
}

impl FromStr for Variant {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse(s, None)
    }
}
