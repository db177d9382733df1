//! GVariant type strings
//!
//! Only definite types are modelled; the indefinite wildcards (`*`, `?`, `r`)
//! never appear in schema key types.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid type string '{text}': {reason}")]
pub struct TypeError {
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariantType {
    Bool,
    Byte,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Handle,
    Double,
    String,
    ObjectPath,
    Signature,
    Variant,
    Maybe(Box<VariantType>),
    Array(Box<VariantType>),
    Tuple(Vec<VariantType>),
    DictEntry(Box<VariantType>, Box<VariantType>),
}

impl VariantType {
    /// Parse a complete type string such as `a{sv}`.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let bytes = text.as_bytes();
        let (ty, used) = Self::parse_prefix(bytes).map_err(|reason| TypeError {
            text: text.to_string(),
            reason,
        })?;
        if used != bytes.len() {
            return Err(TypeError {
                text: text.to_string(),
                reason: format!("trailing characters after position {used}"),
            });
        }
        Ok(ty)
    }

    /// Parse one type from the front of `bytes`, returning it and the number of bytes consumed.
    pub(crate) fn parse_prefix(bytes: &[u8]) -> Result<(Self, usize), String> {
        let Some(&first) = bytes.first() else {
            return Err("unexpected end of type string".to_string());
        };
        let basic = match first {
            b'b' => Some(VariantType::Bool),
            b'y' => Some(VariantType::Byte),
            b'n' => Some(VariantType::Int16),
            b'q' => Some(VariantType::Uint16),
            b'i' => Some(VariantType::Int32),
            b'u' => Some(VariantType::Uint32),
            b'x' => Some(VariantType::Int64),
            b't' => Some(VariantType::Uint64),
            b'h' => Some(VariantType::Handle),
            b'd' => Some(VariantType::Double),
            b's' => Some(VariantType::String),
            b'o' => Some(VariantType::ObjectPath),
            b'g' => Some(VariantType::Signature),
            b'v' => Some(VariantType::Variant),
            _ => None,
        };
        if let Some(ty) = basic {
            return Ok((ty, 1));
        }

        match first {
            b'm' => {
                let (inner, used) = Self::parse_prefix(&bytes[1..])?;
                Ok((VariantType::Maybe(Box::new(inner)), used + 1))
            }
            b'a' => {
                let (inner, used) = Self::parse_prefix(&bytes[1..])?;
                Ok((VariantType::Array(Box::new(inner)), used + 1))
            }
            b'(' => {
                let mut pos = 1;
                let mut members = Vec::new();
                loop {
                    match bytes.get(pos) {
                        Some(b')') => return Ok((VariantType::Tuple(members), pos + 1)),
                        Some(_) => {
                            let (member, used) = Self::parse_prefix(&bytes[pos..])?;
                            members.push(member);
                            pos += used;
                        }
                        None => return Err("unterminated tuple type".to_string()),
                    }
                }
            }
            b'{' => {
                let (key, key_len) = Self::parse_prefix(&bytes[1..])?;
                if !key.is_basic() {
                    return Err(format!("dictionary key type '{key}' is not a basic type"));
                }
                let (value, value_len) = Self::parse_prefix(&bytes[1 + key_len..])?;
                let end = 1 + key_len + value_len;
                if bytes.get(end) != Some(&b'}') {
                    return Err("unterminated dictionary entry type".to_string());
                }
                Ok((VariantType::DictEntry(Box::new(key), Box::new(value)), end + 1))
            }
            other => Err(format!("unknown type character '{}'", other as char)),
        }
    }

    /// Basic types are the ones allowed as dictionary keys.
    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            VariantType::Variant
                | VariantType::Maybe(_)
                | VariantType::Array(_)
                | VariantType::Tuple(_)
                | VariantType::DictEntry(..)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            VariantType::Byte
                | VariantType::Int16
                | VariantType::Uint16
                | VariantType::Int32
                | VariantType::Uint32
                | VariantType::Int64
                | VariantType::Uint64
                | VariantType::Handle
                | VariantType::Double
        )
    }

    pub fn array_of(element: VariantType) -> Self {
        VariantType::Array(Box::new(element))
    }

    pub fn maybe_of(inner: VariantType) -> Self {
        VariantType::Maybe(Box::new(inner))
    }

    /// Human readable name used in error messages.
    pub fn describe(&self) -> String {
        match self {
            VariantType::Bool => "boolean".to_string(),
            VariantType::String => "string".to_string(),
            VariantType::ObjectPath => "object path".to_string(),
            VariantType::Signature => "signature".to_string(),
            VariantType::Variant => "variant".to_string(),
            VariantType::Array(_) => format!("array '{self}'"),
            VariantType::Tuple(_) => format!("tuple '{self}'"),
            VariantType::Maybe(_) => format!("maybe '{self}'"),
            VariantType::DictEntry(..) => format!("dictionary entry '{self}'"),
            numeric => format!("number '{numeric}'"),
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantType::Bool => f.write_str("b"),
            VariantType::Byte => f.write_str("y"),
            VariantType::Int16 => f.write_str("n"),
            VariantType::Uint16 => f.write_str("q"),
            VariantType::Int32 => f.write_str("i"),
            VariantType::Uint32 => f.write_str("u"),
            VariantType::Int64 => f.write_str("x"),
            VariantType::Uint64 => f.write_str("t"),
            VariantType::Handle => f.write_str("h"),
            VariantType::Double => f.write_str("d"),
            VariantType::String => f.write_str("s"),
            VariantType::ObjectPath => f.write_str("o"),
            VariantType::Signature => f.write_str("g"),
            VariantType::Variant => f.write_str("v"),
            VariantType::Maybe(inner) => write!(f, "m{inner}"),
            VariantType::Array(inner) => write!(f, "a{inner}"),
            VariantType::Tuple(members) => {
                f.write_str("(")?;
                for member in members {
                    write!(f, "{member}")?;
                }
                f.write_str(")")
            }
            VariantType::DictEntry(key, value) => write!(f, "{{{key}{value}}}"),
        }
    }
}

impl FromStr for VariantType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantType::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_types() {
        assert_eq!(VariantType::parse("s").unwrap(), VariantType::String);
        assert_eq!(VariantType::parse("u").unwrap(), VariantType::Uint32);
        assert_eq!(VariantType::parse("d").unwrap(), VariantType::Double);
    }

    #[test]
    fn test_parse_containers() {
        assert_eq!(
            VariantType::parse("as").unwrap(),
            VariantType::array_of(VariantType::String)
        );
        assert_eq!(
            VariantType::parse("a{sv}").unwrap(),
            VariantType::array_of(VariantType::DictEntry(
                Box::new(VariantType::String),
                Box::new(VariantType::Variant)
            ))
        );
        assert_eq!(
            VariantType::parse("(ib)").unwrap(),
            VariantType::Tuple(vec![VariantType::Int32, VariantType::Bool])
        );
        assert_eq!(VariantType::parse("()").unwrap(), VariantType::Tuple(Vec::new()));
        assert_eq!(
            VariantType::parse("mas").unwrap(),
            VariantType::maybe_of(VariantType::array_of(VariantType::String))
        );
    }

    #[test]
    fn test_display_matches_input() {
        for text in ["a(ss)", "a{sa{sv}}", "mi", "(uuud)", "aay", "o"] {
            assert_eq!(VariantType::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_reject_invalid_type_strings() {
        assert!(VariantType::parse("").is_err());
        assert!(VariantType::parse("z").is_err());
        assert!(VariantType::parse("(ii").is_err());
        assert!(VariantType::parse("a").is_err());
        assert!(VariantType::parse("ss").is_err());
        // Dictionary keys must be basic
        assert!(VariantType::parse("{asi}").is_err());
    }
}
