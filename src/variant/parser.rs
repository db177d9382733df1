//! GVariant text format parser
//!
//! Parsing happens in two passes. `tokenize` + `Parser` build an untyped
//! syntax tree; `resolve` then walks the tree against a concrete type, which is
//! either the caller's hint (the key's declared type) or one inferred from the
//! tree itself.

use thiserror::Error;

use super::types::VariantType;
use super::Variant;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Parse `text` into a value, using `hint` as the expected type when given.
pub fn parse(text: &str, hint: Option<&VariantType>) -> Result<Variant, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: text.len(),
    };
    let node = parser.parse_value()?;
    if let Some(extra) = parser.peek() {
        return Err(ParseError::new(extra.offset, "unexpected trailing input"));
    }

    let ty = match hint {
        Some(ty) => ty.clone(),
        None => infer(&node)?
            .finalize()
            .ok_or_else(|| ParseError::new(node.offset, "unable to infer type of value"))?,
    };
    resolve(&node, &ty)
}

// ==============================================================================
// Tokens
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Number {
    Int(i128),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LAngle,
    RAngle,
    Comma,
    Colon,
    /// `@` followed by a type string
    Annotation(VariantType),
    Number(Number),
    Str(String),
    ByteStr(Vec<u8>),
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let simple = match c {
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'<' => Some(TokenKind::LAngle),
            b'>' => Some(TokenKind::RAngle),
            b',' => Some(TokenKind::Comma),
            b':' => Some(TokenKind::Colon),
            _ => None,
        };
        if let Some(kind) = simple {
            tokens.push(Token { kind, offset: start });
            pos += 1;
            continue;
        }

        if c.is_ascii_whitespace() {
            pos += 1;
        } else if c == b'@' {
            let (ty, used) = VariantType::parse_prefix(&bytes[pos + 1..])
                .map_err(|reason| ParseError::new(start, format!("invalid type annotation: {reason}")))?;
            tokens.push(Token {
                kind: TokenKind::Annotation(ty),
                offset: start,
            });
            pos += 1 + used;
        } else if c == b'\'' || c == b'"' {
            let (value, used) = lex_string(text, pos)?;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                offset: start,
            });
            pos += used;
        } else if c == b'b' && matches!(bytes.get(pos + 1), Some(b'\'') | Some(b'"')) {
            let (value, used) = lex_bytestring(text, pos + 1)?;
            tokens.push(Token {
                kind: TokenKind::ByteStr(value),
                offset: start,
            });
            pos += 1 + used;
        } else if (c == b'-' || c == b'+') && is_infinity_word(&bytes[pos + 1..]) {
            let value = if c == b'-' { f64::NEG_INFINITY } else { f64::INFINITY };
            tokens.push(Token {
                kind: TokenKind::Number(Number::Float(value)),
                offset: start,
            });
            pos += 4;
        } else if c.is_ascii_digit()
            || ((c == b'-' || c == b'+' || c == b'.')
                && bytes.get(pos + 1).is_some_and(|n| n.is_ascii_digit() || *n == b'.'))
        {
            let (number, used) = lex_number(text, pos)?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                offset: start,
            });
            pos += used;
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let kind = match &text[start..pos] {
                "inf" => TokenKind::Number(Number::Float(f64::INFINITY)),
                "nan" => TokenKind::Number(Number::Float(f64::NAN)),
                word => TokenKind::Word(word.to_string()),
            };
            tokens.push(Token { kind, offset: start });
        } else {
            let ch = text[pos..].chars().next().unwrap_or('?');
            return Err(ParseError::new(start, format!("unexpected character '{ch}'")));
        }
    }

    Ok(tokens)
}

/// Lex a quoted string starting at `start` (the opening quote). Returns the
/// decoded string and the number of bytes consumed including both quotes.
fn lex_string(text: &str, start: usize) -> Result<(String, usize), ParseError> {
    let quote = text.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = text[start + 1..].char_indices();

    while let Some((i, ch)) = chars.next() {
        let at = start + 1 + i;
        if ch == quote {
            return Ok((out, i + 2));
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            break;
        };
        let decoded = match escaped {
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'a' => '\u{07}',
            'v' => '\u{0b}',
            'u' | 'U' => {
                let len = if escaped == 'u' { 4 } else { 8 };
                let mut code = 0u32;
                for _ in 0..len {
                    let digit = chars
                        .next()
                        .and_then(|(_, d)| d.to_digit(16))
                        .ok_or_else(|| ParseError::new(at, "invalid unicode escape"))?;
                    code = code * 16 + digit;
                }
                char::from_u32(code)
                    .ok_or_else(|| ParseError::new(at, format!("invalid unicode code point {code:#x}")))?
            }
            other => {
                return Err(ParseError::new(at, format!("invalid escape sequence '\\{other}'")));
            }
        };
        out.push(decoded);
    }

    Err(ParseError::new(start, "unterminated string constant"))
}

/// Lex a bytestring starting at `start` (the opening quote). Besides the
/// single-character escapes, `\` followed by up to three octal digits gives a
/// raw byte. Returns the bytes without the terminating NUL.
fn lex_bytestring(text: &str, start: usize) -> Result<(Vec<u8>, usize), ParseError> {
    let bytes = text.as_bytes();
    let quote = bytes[start];
    let mut out = Vec::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b == quote {
            return Ok((out, pos + 1 - start));
        }
        if b != b'\\' {
            out.push(b);
            pos += 1;
            continue;
        }

        pos += 1;
        let Some(&escaped) = bytes.get(pos) else {
            break;
        };
        if is_octal_digit(escaped) {
            let mut value = 0u32;
            let mut digits = 0;
            while digits < 3 && bytes.get(pos).copied().is_some_and(is_octal_digit) {
                value = value * 8 + u32::from(bytes[pos] - b'0');
                pos += 1;
                digits += 1;
            }
            // Escapes above \377 keep their low byte
            out.push(value as u8);
            continue;
        }
        out.push(match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            other => other,
        });
        pos += 1;
    }

    Err(ParseError::new(start, "unterminated bytestring constant"))
}

fn is_octal_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

/// `inf` directly after a sign, not followed by more word characters.
fn is_infinity_word(rest: &[u8]) -> bool {
    rest.starts_with(b"inf") && !rest.get(3).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

fn lex_number(text: &str, start: usize) -> Result<(Number, usize), ParseError> {
    let bytes = text.as_bytes();
    let mut pos = start;
    if bytes[pos] == b'-' || bytes[pos] == b'+' {
        pos += 1;
    }
    let is_hex = bytes.get(pos) == Some(&b'0') && matches!(bytes.get(pos + 1), Some(b'x') | Some(b'X'));
    while pos < bytes.len() {
        let c = bytes[pos];
        let exponent_sign = (c == b'-' || c == b'+')
            && !is_hex
            && matches!(bytes.get(pos - 1), Some(b'e') | Some(b'E'));
        if c.is_ascii_alphanumeric() || c == b'.' || exponent_sign {
            pos += 1;
        } else {
            break;
        }
    }

    let literal = &text[start..pos];
    let (negative, digits) = match literal.as_bytes()[0] {
        b'-' => (true, &literal[1..]),
        b'+' => (false, &literal[1..]),
        _ => (false, literal),
    };
    let invalid = || ParseError::new(start, format!("invalid number '{literal}'"));

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else if digits.contains(['.', 'e', 'E']) {
        let value: f64 = literal.parse().map_err(|_| invalid())?;
        return Ok((Number::Float(value), pos - start));
    } else if digits.len() > 1 && digits.starts_with('0') {
        i128::from_str_radix(&digits[1..], 8).map_err(|_| invalid())?
    } else {
        digits.parse::<i128>().map_err(|_| invalid())?
    };

    let value = if negative { -magnitude } else { magnitude };
    Ok((Number::Int(value), pos - start))
}

// ==============================================================================
// Syntax tree
// ==============================================================================

#[derive(Debug, Clone)]
enum NodeKind {
    Bool(bool),
    Number(Number),
    Str(String),
    ByteStr(Vec<u8>),
    Array(Vec<Node>),
    Tuple(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    DictEntry(Box<Node>, Box<Node>),
    Boxed(Box<Node>),
    Just(Box<Node>),
    Nothing,
    /// `@type value` or a keyword cast such as `uint32 7`
    Typed(VariantType, Box<Node>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    offset: usize,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ParseError::new(self.end, "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(ParseError::new(token.offset, format!("expected '{what}'")))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Result<Node, ParseError> {
        let token = self.next()?;
        let offset = token.offset;
        let kind = match &token.kind {
            TokenKind::LBracket => NodeKind::Array(self.parse_sequence(TokenKind::RBracket, "]")?),
            TokenKind::LParen => self.parse_tuple()?,
            TokenKind::LBrace => self.parse_brace()?,
            TokenKind::LAngle => {
                let inner = self.parse_value()?;
                self.expect(TokenKind::RAngle, ">")?;
                NodeKind::Boxed(Box::new(inner))
            }
            TokenKind::Annotation(ty) => NodeKind::Typed(ty.clone(), Box::new(self.parse_value()?)),
            TokenKind::Number(number) => NodeKind::Number(number.clone()),
            TokenKind::Str(s) => NodeKind::Str(s.clone()),
            TokenKind::ByteStr(b) => NodeKind::ByteStr(b.clone()),
            TokenKind::Word(word) => match word.as_str() {
                "true" => NodeKind::Bool(true),
                "false" => NodeKind::Bool(false),
                "nothing" => NodeKind::Nothing,
                "just" => NodeKind::Just(Box::new(self.parse_value()?)),
                keyword => match keyword_type(keyword) {
                    Some(ty) => NodeKind::Typed(ty, Box::new(self.parse_value()?)),
                    None => return Err(ParseError::new(offset, format!("unknown keyword '{keyword}'"))),
                },
            },
            _ => return Err(ParseError::new(offset, "expected a value")),
        };
        Ok(Node { kind, offset })
    }

    /// Comma separated values up to `close`; the opening token is already consumed.
    fn parse_sequence(&mut self, close: TokenKind, close_text: &str) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_value()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(TokenKind::Comma, &format!(", or {close_text}"))?;
        }
    }

    fn parse_tuple(&mut self) -> Result<NodeKind, ParseError> {
        if self.eat(&TokenKind::RParen) {
            return Ok(NodeKind::Tuple(Vec::new()));
        }
        let first = self.parse_value()?;
        self.expect(TokenKind::Comma, ",")?;
        let mut items = vec![first];
        if self.eat(&TokenKind::RParen) {
            return Ok(NodeKind::Tuple(items));
        }
        items.extend(self.parse_sequence(TokenKind::RParen, ")")?);
        Ok(NodeKind::Tuple(items))
    }

    fn parse_brace(&mut self) -> Result<NodeKind, ParseError> {
        if self.eat(&TokenKind::RBrace) {
            return Ok(NodeKind::Dict(Vec::new()));
        }
        let key = self.parse_value()?;
        if self.eat(&TokenKind::Comma) {
            let value = self.parse_value()?;
            self.expect(TokenKind::RBrace, "}")?;
            return Ok(NodeKind::DictEntry(Box::new(key), Box::new(value)));
        }

        self.expect(TokenKind::Colon, ":")?;
        let mut entries = vec![(key, self.parse_value()?)];
        while !self.eat(&TokenKind::RBrace) {
            self.expect(TokenKind::Comma, ", or }")?;
            let key = self.parse_value()?;
            self.expect(TokenKind::Colon, ":")?;
            entries.push((key, self.parse_value()?));
        }
        Ok(NodeKind::Dict(entries))
    }
}

fn keyword_type(word: &str) -> Option<VariantType> {
    let ty = match word {
        "boolean" => VariantType::Bool,
        "byte" => VariantType::Byte,
        "int16" => VariantType::Int16,
        "uint16" => VariantType::Uint16,
        "int32" => VariantType::Int32,
        "uint32" => VariantType::Uint32,
        "int64" => VariantType::Int64,
        "uint64" => VariantType::Uint64,
        "handle" => VariantType::Handle,
        "double" => VariantType::Double,
        "string" => VariantType::String,
        "objectpath" => VariantType::ObjectPath,
        "signature" => VariantType::Signature,
        _ => return None,
    };
    Some(ty)
}

// ==============================================================================
// Type inference
// ==============================================================================

/// Partially known type of a syntax tree node.
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Unknown,
    /// Untyped integer literal
    Int,
    /// Untyped floating point literal
    Float,
    /// Any non-container type
    Basic(VariantType),
    Maybe(Box<Shape>),
    Array(Box<Shape>),
    Tuple(Vec<Shape>),
    Entry(Box<Shape>, Box<Shape>),
}

impl Shape {
    fn from_type(ty: &VariantType) -> Shape {
        match ty {
            VariantType::Maybe(inner) => Shape::Maybe(Box::new(Shape::from_type(inner))),
            VariantType::Array(inner) => Shape::Array(Box::new(Shape::from_type(inner))),
            VariantType::Tuple(members) => Shape::Tuple(members.iter().map(Shape::from_type).collect()),
            VariantType::DictEntry(k, v) => {
                Shape::Entry(Box::new(Shape::from_type(k)), Box::new(Shape::from_type(v)))
            }
            basic => Shape::Basic(basic.clone()),
        }
    }

    fn finalize(self) -> Option<VariantType> {
        Some(match self {
            Shape::Unknown => return None,
            Shape::Int => VariantType::Int32,
            Shape::Float => VariantType::Double,
            Shape::Basic(ty) => ty,
            Shape::Maybe(inner) => VariantType::maybe_of(inner.finalize()?),
            Shape::Array(inner) => VariantType::array_of(inner.finalize()?),
            Shape::Tuple(members) => {
                VariantType::Tuple(members.into_iter().map(Shape::finalize).collect::<Option<_>>()?)
            }
            Shape::Entry(k, v) => VariantType::DictEntry(Box::new(k.finalize()?), Box::new(v.finalize()?)),
        })
    }
}

fn unify(a: Shape, b: Shape, offset: usize) -> Result<Shape, ParseError> {
    let mismatch = |a: &Shape, b: &Shape| {
        ParseError::new(offset, format!("array elements have incompatible types ({a:?} and {b:?})"))
    };
    match (a, b) {
        (Shape::Unknown, other) | (other, Shape::Unknown) => Ok(other),
        (Shape::Int, Shape::Int) => Ok(Shape::Int),
        (Shape::Int | Shape::Float, Shape::Int | Shape::Float) => Ok(Shape::Float),
        (Shape::Int, Shape::Basic(ty)) | (Shape::Basic(ty), Shape::Int) if ty.is_numeric() => Ok(Shape::Basic(ty)),
        (Shape::Float, Shape::Basic(VariantType::Double)) | (Shape::Basic(VariantType::Double), Shape::Float) => {
            Ok(Shape::Basic(VariantType::Double))
        }
        (Shape::Basic(x), Shape::Basic(y)) if x == y => Ok(Shape::Basic(x)),
        (Shape::Maybe(x), Shape::Maybe(y)) => Ok(Shape::Maybe(Box::new(unify(*x, *y, offset)?))),
        (Shape::Array(x), Shape::Array(y)) => Ok(Shape::Array(Box::new(unify(*x, *y, offset)?))),
        (Shape::Tuple(xs), Shape::Tuple(ys)) if xs.len() == ys.len() => Ok(Shape::Tuple(
            xs.into_iter()
                .zip(ys)
                .map(|(x, y)| unify(x, y, offset))
                .collect::<Result<_, _>>()?,
        )),
        (Shape::Entry(xk, xv), Shape::Entry(yk, yv)) => Ok(Shape::Entry(
            Box::new(unify(*xk, *yk, offset)?),
            Box::new(unify(*xv, *yv, offset)?),
        )),
        (a, b) => Err(mismatch(&a, &b)),
    }
}

fn infer(node: &Node) -> Result<Shape, ParseError> {
    Ok(match &node.kind {
        NodeKind::Bool(_) => Shape::Basic(VariantType::Bool),
        NodeKind::Number(Number::Int(_)) => Shape::Int,
        NodeKind::Number(Number::Float(_)) => Shape::Float,
        NodeKind::Str(_) => Shape::Basic(VariantType::String),
        NodeKind::ByteStr(_) => Shape::Array(Box::new(Shape::Basic(VariantType::Byte))),
        NodeKind::Boxed(_) => Shape::Basic(VariantType::Variant),
        NodeKind::Typed(ty, _) => Shape::from_type(ty),
        NodeKind::Nothing => Shape::Maybe(Box::new(Shape::Unknown)),
        NodeKind::Just(inner) => Shape::Maybe(Box::new(infer(inner)?)),
        NodeKind::Tuple(items) => Shape::Tuple(items.iter().map(infer).collect::<Result<_, _>>()?),
        NodeKind::DictEntry(k, v) => Shape::Entry(Box::new(infer(k)?), Box::new(infer(v)?)),
        NodeKind::Array(items) => {
            let mut element = Shape::Unknown;
            for item in items {
                element = unify(element, infer(item)?, item.offset)?;
            }
            Shape::Array(Box::new(element))
        }
        NodeKind::Dict(entries) => {
            let mut key = Shape::Unknown;
            let mut value = Shape::Unknown;
            for (k, v) in entries {
                key = unify(key, infer(k)?, k.offset)?;
                value = unify(value, infer(v)?, v.offset)?;
            }
            Shape::Array(Box::new(Shape::Entry(Box::new(key), Box::new(value))))
        }
    })
}

// ==============================================================================
// Resolution against a concrete type
// ==============================================================================

fn mismatch(node: &Node, ty: &VariantType) -> ParseError {
    let found = match &node.kind {
        NodeKind::Bool(_) => "boolean",
        NodeKind::Number(Number::Int(_)) => "integer",
        NodeKind::Number(Number::Float(_)) => "floating point number",
        NodeKind::Str(_) => "string",
        NodeKind::ByteStr(_) => "bytestring",
        NodeKind::Array(_) => "array",
        NodeKind::Tuple(_) => "tuple",
        NodeKind::Dict(_) => "dictionary",
        NodeKind::DictEntry(..) => "dictionary entry",
        NodeKind::Boxed(_) => "variant",
        NodeKind::Just(_) | NodeKind::Nothing => "maybe value",
        NodeKind::Typed(..) => "annotated value",
    };
    ParseError::new(node.offset, format!("expected {}, found {found}", ty.describe()))
}

fn resolve(node: &Node, ty: &VariantType) -> Result<Variant, ParseError> {
    match (&node.kind, ty) {
        (NodeKind::Typed(annotated, inner), _) => {
            if annotated != ty {
                return Err(ParseError::new(
                    node.offset,
                    format!("type annotation '{annotated}' does not match expected type '{ty}'"),
                ));
            }
            resolve(inner, ty)
        }

        (NodeKind::Nothing, VariantType::Maybe(inner)) => Ok(Variant::Maybe {
            inner: (**inner).clone(),
            value: None,
        }),
        (NodeKind::Just(value), VariantType::Maybe(inner)) => Ok(Variant::Maybe {
            inner: (**inner).clone(),
            value: Some(Box::new(resolve(value, inner)?)),
        }),
        (NodeKind::Just(_) | NodeKind::Nothing, _) => Err(mismatch(node, ty)),
        // Plain values are wrapped when a maybe type is expected
        (_, VariantType::Maybe(inner)) => Ok(Variant::Maybe {
            inner: (**inner).clone(),
            value: Some(Box::new(resolve(node, inner)?)),
        }),

        (NodeKind::Bool(b), VariantType::Bool) => Ok(Variant::Bool(*b)),
        (NodeKind::Number(number), _) if ty.is_numeric() => resolve_number(node, number, ty),
        (NodeKind::Str(s), VariantType::String) => Ok(Variant::String(s.clone())),
        (NodeKind::Str(s), VariantType::ObjectPath) => {
            if is_object_path(s) {
                Ok(Variant::ObjectPath(s.clone()))
            } else {
                Err(ParseError::new(node.offset, format!("'{s}' is not a valid object path")))
            }
        }
        (NodeKind::Str(s), VariantType::Signature) => {
            if is_signature(s) {
                Ok(Variant::Signature(s.clone()))
            } else {
                Err(ParseError::new(node.offset, format!("'{s}' is not a valid signature")))
            }
        }

        (NodeKind::ByteStr(bytes), VariantType::Array(element)) if **element == VariantType::Byte => {
            // The store keeps the terminating NUL as part of the value
            Ok(Variant::Array {
                element: VariantType::Byte,
                items: bytes.iter().chain(std::iter::once(&0)).map(|b| Variant::Byte(*b)).collect(),
            })
        }
        (NodeKind::Array(items), VariantType::Array(element)) => Ok(Variant::Array {
            element: (**element).clone(),
            items: items
                .iter()
                .map(|item| resolve(item, element))
                .collect::<Result<_, _>>()?,
        }),
        (NodeKind::Dict(entries), VariantType::Array(element)) => {
            let VariantType::DictEntry(key_ty, value_ty) = &**element else {
                return Err(mismatch(node, ty));
            };
            let items = entries
                .iter()
                .map(|(k, v)| {
                    Ok(Variant::DictEntry(
                        Box::new(resolve(k, key_ty)?),
                        Box::new(resolve(v, value_ty)?),
                    ))
                })
                .collect::<Result<_, ParseError>>()?;
            Ok(Variant::Array {
                element: (**element).clone(),
                items,
            })
        }
        (NodeKind::DictEntry(k, v), VariantType::DictEntry(key_ty, value_ty)) => Ok(Variant::DictEntry(
            Box::new(resolve(k, key_ty)?),
            Box::new(resolve(v, value_ty)?),
        )),
        (NodeKind::Tuple(items), VariantType::Tuple(members)) => {
            if items.len() != members.len() {
                return Err(ParseError::new(
                    node.offset,
                    format!("expected tuple of {} items, found {}", members.len(), items.len()),
                ));
            }
            Ok(Variant::Tuple(
                items
                    .iter()
                    .zip(members)
                    .map(|(item, member)| resolve(item, member))
                    .collect::<Result<_, _>>()?,
            ))
        }
        (NodeKind::Boxed(inner), VariantType::Variant) => {
            let inner_ty = infer(inner)?
                .finalize()
                .ok_or_else(|| ParseError::new(inner.offset, "unable to infer type of variant contents"))?;
            Ok(Variant::Variant(Box::new(resolve(inner, &inner_ty)?)))
        }

        _ => Err(mismatch(node, ty)),
    }
}

fn resolve_number(node: &Node, number: &Number, ty: &VariantType) -> Result<Variant, ParseError> {
    let value = match number {
        Number::Float(f) if *ty == VariantType::Double => return Ok(Variant::Double(*f)),
        Number::Float(_) => return Err(mismatch(node, ty)),
        Number::Int(i) => *i,
    };
    let out_of_range = || ParseError::new(node.offset, format!("number {value} out of range for type '{ty}'"));

    Ok(match ty {
        VariantType::Byte => Variant::Byte(u8::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Int16 => Variant::Int16(i16::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Uint16 => Variant::Uint16(u16::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Int32 => Variant::Int32(i32::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Uint32 => Variant::Uint32(u32::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Int64 => Variant::Int64(i64::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Uint64 => Variant::Uint64(u64::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Handle => Variant::Handle(i32::try_from(value).map_err(|_| out_of_range())?),
        VariantType::Double => Variant::Double(value as f64),
        _ => return Err(mismatch(node, ty)),
    })
}

pub(crate) fn is_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/')
        .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
}

pub(crate) fn is_signature(signature: &str) -> bool {
    let mut bytes = signature.as_bytes();
    while !bytes.is_empty() {
        match VariantType::parse_prefix(bytes) {
            Ok((_, used)) => bytes = &bytes[used..],
            Err(_) => return false,
        }
    }
    true
}
