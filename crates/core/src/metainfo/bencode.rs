//! Bencode decoding and canonical encoding.
//!
//! Dictionaries keep their decoded entry order; the encoder always emits
//! keys sorted by raw byte value, which is what the info-hash computation
//! relies on.

use thiserror::Error;

/// A decoded bencode value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(Vec<(Vec<u8>, Value)>),
}

/// Errors produced while decoding a bencode buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid prefix byte: 0x{0:02x}")]
    InvalidPrefix(u8),

    #[error("invalid integer")]
    InvalidInt,

    #[error("invalid byte string length")]
    InvalidLength,

    #[error("dictionary key is not a byte string")]
    InvalidDictKey,

    #[error("trailing data after value")]
    TrailingData,
}

impl Value {
    /// Returns the dict entries if this value is a dictionary.
    pub fn as_dict(&self) -> Option<&[(Vec<u8>, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a dictionary entry by key. Returns `None` for non-dicts.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Decodes a byte-string value as lossy UTF-8.
    pub fn as_str_lossy(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// Decodes a complete buffer. Trailing bytes after the value are an error.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, end) = decode_at(data, 0)?;
    if end != data.len() {
        return Err(BencodeError::TrailingData);
    }
    Ok(value)
}

/// Encodes a value canonically: dict keys sorted by raw byte value.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(bytes) => {
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(bytes);
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(entries) => {
            out.push(b'd');
            let mut sorted: Vec<_> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, val) in sorted {
                out.extend_from_slice(key.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(key);
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}

fn decode_at(data: &[u8], pos: usize) -> Result<(Value, usize), BencodeError> {
    match data.get(pos) {
        None => Err(BencodeError::UnexpectedEof),
        Some(b'i') => {
            let (n, next) = decode_int(data, pos)?;
            Ok((Value::Int(n), next))
        }
        Some(b'l') => {
            let mut items = Vec::new();
            let mut i = pos + 1;
            while i < data.len() && data[i] != b'e' {
                let (item, next) = decode_at(data, i)?;
                items.push(item);
                i = next;
            }
            if i >= data.len() {
                return Err(BencodeError::UnexpectedEof);
            }
            Ok((Value::List(items), i + 1))
        }
        Some(b'd') => {
            let mut entries = Vec::new();
            let mut i = pos + 1;
            while i < data.len() && data[i] != b'e' {
                let (key, next) = decode_at(data, i)?;
                let key = match key {
                    Value::Bytes(bytes) => bytes,
                    _ => return Err(BencodeError::InvalidDictKey),
                };
                let (val, next) = decode_at(data, next)?;
                entries.push((key, val));
                i = next;
            }
            if i >= data.len() {
                return Err(BencodeError::UnexpectedEof);
            }
            Ok((Value::Dict(entries), i + 1))
        }
        Some(b'0'..=b'9') => {
            let (bytes, next) = decode_bytes(data, pos)?;
            Ok((Value::Bytes(bytes), next))
        }
        Some(&other) => Err(BencodeError::InvalidPrefix(other)),
    }
}

fn decode_int(data: &[u8], pos: usize) -> Result<(i64, usize), BencodeError> {
    let mut i = pos + 1;
    while i < data.len() && data[i] != b'e' {
        i += 1;
    }
    if i >= data.len() {
        return Err(BencodeError::UnexpectedEof);
    }
    let body = &data[pos + 1..i];
    if body.is_empty() {
        return Err(BencodeError::InvalidInt);
    }
    // Leading zeros and negative zero are not valid bencode.
    if (body.len() > 1 && body[0] == b'0') || (body.len() > 1 && body[0] == b'-' && body[1] == b'0')
    {
        return Err(BencodeError::InvalidInt);
    }
    let text = std::str::from_utf8(body).map_err(|_| BencodeError::InvalidInt)?;
    let n = text.parse::<i64>().map_err(|_| BencodeError::InvalidInt)?;
    Ok((n, i + 1))
}

fn decode_bytes(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize), BencodeError> {
    let mut i = pos;
    while i < data.len() && data[i].is_ascii_digit() {
        i += 1;
    }
    if i == pos || i >= data.len() || data[i] != b':' {
        return Err(BencodeError::InvalidLength);
    }
    let prefix = &data[pos..i];
    if prefix.len() > 1 && prefix[0] == b'0' {
        return Err(BencodeError::InvalidLength);
    }
    let text = std::str::from_utf8(prefix).map_err(|_| BencodeError::InvalidLength)?;
    let len = text.parse::<usize>().map_err(|_| BencodeError::InvalidLength)?;
    let start = i + 1;
    let end = start.checked_add(len).ok_or(BencodeError::InvalidLength)?;
    if end > data.len() {
        return Err(BencodeError::UnexpectedEof);
    }
    Ok((data[start..end].to_vec(), end))
}
