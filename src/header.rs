//! Typed key-value header block.
//!
//! The header block is the first block of a V2 file.  Its payload is a
//! `Uint`-typed entry count followed by key/value pairs; keys are
//! `String`-typed values.  Two keys are reserved: `trailer` announces a
//! trailer block at the file end, `transformer` names the transformation
//! applied to subsequent data blocks.

use crate::binary::{append_uvarint, append_varint, BinaryParser, ErrorReporter};
use crate::error::{Error, Result};

/// Header key announcing a trailer block; value type is `Bool`.
pub const KEY_TRAILER: &str = "trailer";
/// Header key naming a transformer config; value type is `String`.
pub const KEY_TRANSFORMER: &str = "transformer";

const TAG_INVALID: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_STRING: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Invalid,
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

impl HeaderValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeaderValue::Invalid => "invalid",
            HeaderValue::Bool(_) => "bool",
            HeaderValue::Int(_) => "int",
            HeaderValue::Uint(_) => "uint",
            HeaderValue::String(_) => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub key: String,
    pub value: HeaderValue,
}

/// Decode one typed value: `type_tag(1) || body`.  A string length is
/// itself a complete `Uint`-typed value.
fn read_value(p: &mut BinaryParser<'_, '_>) -> HeaderValue {
    let Some(tag) = p.read_bytes(1) else {
        return HeaderValue::Invalid;
    };
    match tag[0] {
        TAG_BOOL => match p.read_bytes(1) {
            Some(b) => HeaderValue::Bool(b[0] != 0),
            None => HeaderValue::Invalid,
        },
        TAG_INT => HeaderValue::Int(p.read_varint()),
        TAG_UINT => HeaderValue::Uint(p.read_uvarint()),
        TAG_STRING => {
            let HeaderValue::Uint(len) = read_value(p) else {
                p.fail(Error::MalformedHeader("string length is not a uint"));
                return HeaderValue::Invalid;
            };
            HeaderValue::String(p.read_string(len as usize))
        }
        t => {
            p.fail(Error::InvalidValueType { tag: t });
            HeaderValue::Invalid
        }
    }
}

fn append_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(TAG_STRING);
    append_value(buf, &HeaderValue::Uint(s.len() as u64));
    buf.extend_from_slice(s.as_bytes());
}

pub fn append_value(buf: &mut Vec<u8>, v: &HeaderValue) {
    match v {
        HeaderValue::Invalid => buf.push(TAG_INVALID),
        HeaderValue::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        HeaderValue::Int(i) => {
            buf.push(TAG_INT);
            append_varint(buf, *i);
        }
        HeaderValue::Uint(u) => {
            buf.push(TAG_UINT);
            append_uvarint(buf, *u);
        }
        HeaderValue::String(s) => append_string(buf, s),
    }
}

/// Decode a header block payload into its entry list.
pub fn decode_header(data: &[u8]) -> Result<Vec<HeaderEntry>> {
    let mut rep = ErrorReporter::new();
    let mut entries = Vec::new();
    {
        let mut p = BinaryParser::new(data, &mut rep);
        let count = read_value(&mut p);
        if p.ok() {
            let HeaderValue::Uint(n) = count else {
                return Err(Error::MalformedHeader("entry count is not a uint"));
            };
            for _ in 0..n {
                let key = read_value(&mut p);
                if !p.ok() {
                    break;
                }
                let HeaderValue::String(key) = key else {
                    return Err(Error::MalformedHeader("entry key is not a string"));
                };
                let value = read_value(&mut p);
                if !p.ok() {
                    break;
                }
                entries.push(HeaderEntry { key, value });
            }
        }
    }
    rep.into_result()?;
    Ok(entries)
}

/// Encode entries into a header block payload.
pub fn encode_header(entries: &[HeaderEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    append_value(&mut buf, &HeaderValue::Uint(entries.len() as u64));
    for e in entries {
        append_string(&mut buf, &e.key);
        append_value(&mut buf, &e.value);
    }
    buf
}

/// Whether the header announces a trailer block.
pub fn has_trailer(entries: &[HeaderEntry]) -> Result<bool> {
    for e in entries {
        if e.key == KEY_TRAILER {
            return match e.value {
                HeaderValue::Bool(b) => Ok(b),
                ref v => Err(Error::HeaderValueType {
                    key: KEY_TRAILER.to_string(),
                    want: "bool",
                    got: v.type_name(),
                }),
            };
        }
    }
    Ok(false)
}

/// Collect the transformer config strings named by the header, in order.
pub fn transformer_specs(entries: &[HeaderEntry]) -> Result<Vec<String>> {
    let mut specs = Vec::new();
    for e in entries {
        if e.key == KEY_TRANSFORMER {
            match e.value {
                HeaderValue::String(ref s) => specs.push(s.clone()),
                ref v => {
                    return Err(Error::HeaderValueType {
                        key: KEY_TRANSFORMER.to_string(),
                        want: "string",
                        got: v.type_name(),
                    })
                }
            }
        }
    }
    Ok(specs)
}
