//! Universal Binary JSON (draft 12) carried through `serde_json::Value`
//!
//! Values are serialized to a JSON tree first, then written with big-endian
//! typed markers. Integers take the narrowest marker that holds them, floats
//! are written as float64, and integers beyond `i64` travel as
//! high-precision strings. The reader also accepts no-op markers, single
//! characters, float32 and the optimized `$`/`#` container headers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum UbjsonError {
    #[error("unexpected end of input")]
    Eof,
    #[error("unknown marker 0x{0:02x}")]
    Marker(u8),
    #[error("invalid length {0}")]
    Length(i64),
    #[error("containers nested deeper than {}", MAX_DEPTH)]
    Depth,
    #[error("string is not utf-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid high-precision number {0:?}")]
    Number(String),
    #[error("{0} trailing bytes")]
    Trailing(usize),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, UbjsonError> {
    let tree = serde_json::to_value(value)?;
    let mut out = Vec::new();
    write_value(&mut out, &tree);
    Ok(out)
}

pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, UbjsonError> {
    let mut reader = Reader { input: bytes, pos: 0 };
    let tree = reader.value(0)?;
    let rest = reader.input.len() - reader.pos;
    if rest > 0 {
        return Err(UbjsonError::Trailing(rest));
    }
    Ok(serde_json::from_value(tree)?)
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(b'Z'),
        Value::Bool(true) => out.push(b'T'),
        Value::Bool(false) => out.push(b'F'),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => {
            out.push(b'S');
            write_str(out, s);
        }
        Value::Array(items) => {
            out.push(b'[');
            for item in items {
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(fields) => {
            out.push(b'{');
            for (key, item) in fields {
                write_str(out, key);
                write_value(out, item);
            }
            out.push(b'}');
        }
    }
}

fn write_number(out: &mut Vec<u8>, n: &Number) {
    if let Some(i) = n.as_i64() {
        write_int(out, i);
    } else if n.is_u64() {
        out.push(b'H');
        write_str(out, &n.to_string());
    } else if let Some(f) = n.as_f64() {
        out.push(b'D');
        out.extend_from_slice(&f.to_be_bytes());
    }
}

fn write_int(out: &mut Vec<u8>, i: i64) {
    if let Ok(v) = i8::try_from(i) {
        out.push(b'i');
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = u8::try_from(i) {
        out.push(b'U');
        out.push(v);
    } else if let Ok(v) = i16::try_from(i) {
        out.push(b'I');
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = i32::try_from(i) {
        out.push(b'l');
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.push(b'L');
        out.extend_from_slice(&i.to_be_bytes());
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_int(out, s.len() as i64);
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], UbjsonError> {
        let end = self.pos.checked_add(n).ok_or(UbjsonError::Eof)?;
        let bytes = self.input.get(self.pos..end).ok_or(UbjsonError::Eof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8, UbjsonError> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], UbjsonError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    /// Skips `N` no-op markers and returns the next real one.
    fn marker(&mut self) -> Result<u8, UbjsonError> {
        loop {
            let marker = self.byte()?;
            if marker != b'N' {
                return Ok(marker);
            }
        }
    }

    fn int(&mut self, marker: u8) -> Result<i64, UbjsonError> {
        let value = match marker {
            b'i' => i8::from_be_bytes(self.array()?) as i64,
            b'U' => self.byte()? as i64,
            b'I' => i16::from_be_bytes(self.array()?) as i64,
            b'l' => i32::from_be_bytes(self.array()?) as i64,
            b'L' => i64::from_be_bytes(self.array()?),
            other => return Err(UbjsonError::Marker(other)),
        };
        Ok(value)
    }

    /// A length or count, bounded by what is left of the input.
    fn length(&mut self) -> Result<usize, UbjsonError> {
        let marker = self.marker()?;
        let n = self.int(marker)?;
        let remaining = self.input.len() - self.pos;
        match usize::try_from(n) {
            Ok(len) if len <= remaining => Ok(len),
            _ => Err(UbjsonError::Length(n)),
        }
    }

    fn string(&mut self) -> Result<String, UbjsonError> {
        let len = self.length()?;
        Ok(std::str::from_utf8(self.take(len)?)?.to_string())
    }

    fn value(&mut self, depth: usize) -> Result<Value, UbjsonError> {
        let marker = self.marker()?;
        self.typed(marker, depth)
    }

    fn typed(&mut self, marker: u8, depth: usize) -> Result<Value, UbjsonError> {
        let value = match marker {
            b'Z' => Value::Null,
            b'T' => Value::Bool(true),
            b'F' => Value::Bool(false),
            b'i' | b'U' | b'I' | b'l' | b'L' => Value::from(self.int(marker)?),
            b'd' => float(f32::from_be_bytes(self.array()?) as f64),
            b'D' => float(f64::from_be_bytes(self.array()?)),
            b'H' => {
                let digits = self.string()?;
                let number = digits
                    .parse::<Number>()
                    .map_err(|_| UbjsonError::Number(digits.clone()))?;
                Value::Number(number)
            }
            b'C' => Value::String(char::from(self.byte()?).to_string()),
            b'S' => Value::String(self.string()?),
            b'[' => self.seq(depth + 1)?,
            b'{' => self.object(depth + 1)?,
            other => return Err(UbjsonError::Marker(other)),
        };
        Ok(value)
    }

    /// Reads an optional `$type` and `#count` container header.
    fn header(&mut self) -> Result<(Option<u8>, Option<usize>), UbjsonError> {
        let mut kind = None;
        if self.peek() == Some(b'$') {
            self.pos += 1;
            kind = Some(self.byte()?);
            if self.peek() != Some(b'#') {
                return Err(UbjsonError::Marker(b'$'));
            }
        }
        let mut count = None;
        if self.peek() == Some(b'#') {
            self.pos += 1;
            count = Some(self.length()?);
        }
        Ok((kind, count))
    }

    fn element(&mut self, kind: Option<u8>, depth: usize) -> Result<Value, UbjsonError> {
        match kind {
            Some(marker) => self.typed(marker, depth),
            None => self.value(depth),
        }
    }

    fn seq(&mut self, depth: usize) -> Result<Value, UbjsonError> {
        if depth > MAX_DEPTH {
            return Err(UbjsonError::Depth);
        }
        let (kind, count) = self.header()?;
        let mut items = Vec::new();
        match count {
            Some(count) => {
                for _ in 0..count {
                    items.push(self.element(kind, depth)?);
                }
            }
            None => loop {
                match self.peek() {
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'N') => self.pos += 1,
                    Some(_) => items.push(self.value(depth)?),
                    None => return Err(UbjsonError::Eof),
                }
            },
        }
        Ok(Value::Array(items))
    }

    fn object(&mut self, depth: usize) -> Result<Value, UbjsonError> {
        if depth > MAX_DEPTH {
            return Err(UbjsonError::Depth);
        }
        let (kind, count) = self.header()?;
        let mut fields = Map::new();
        match count {
            Some(count) => {
                for _ in 0..count {
                    let key = self.string()?;
                    fields.insert(key, self.element(kind, depth)?);
                }
            }
            None => loop {
                match self.peek() {
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'N') => self.pos += 1,
                    Some(_) => {
                        let key = self.string()?;
                        fields.insert(key, self.value(depth)?);
                    }
                    None => return Err(UbjsonError::Eof),
                }
            },
        }
        Ok(Value::Object(fields))
    }
}

/// Non-finite floats have no JSON form and read as null.
fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_object_layout() {
        let bytes = to_vec(&json!({"a": 1})).unwrap();
        assert_eq!(bytes, b"{i\x01ai\x01}");
    }

    #[test]
    fn test_integers_take_the_narrowest_marker() {
        assert_eq!(to_vec(&json!([-3])).unwrap(), b"[i\xfd]");
        assert_eq!(to_vec(&json!([200])).unwrap(), b"[U\xc8]");
        assert_eq!(to_vec(&json!([-1000])).unwrap(), b"[I\xfc\x18]");
        assert_eq!(to_vec(&json!([70000])).unwrap(), b"[l\x00\x01\x11\x70]");
    }

    #[test]
    fn test_nested_value_reads_back() {
        let value = json!({
            "state": 102,
            "players": [{"number": 1, "position": {"x": 32, "y": -300}}],
            "id": "deadbeef",
            "ratio": 0.5,
            "ready": true,
            "foe": null,
            "big": u64::MAX
        });
        let bytes = to_vec(&value).unwrap();
        let back: Value = from_slice(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_optimized_containers_are_read() {
        // [$i#i\x03 1 2 3]
        let back: Vec<i64> = from_slice(b"[$i#i\x03\x01\x02\x03").unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        // {#i\x01 i\x01 k S i\x02 ok}
        let back: Value = from_slice(b"{#i\x01i\x01kSi\x02ok").unwrap();
        assert_eq!(back, json!({"k": "ok"}));
    }

    #[test]
    fn test_noop_char_and_float32_markers() {
        let mut bytes = b"[NCx".to_vec();
        bytes.push(b'd');
        bytes.extend_from_slice(&1.5f32.to_be_bytes());
        bytes.push(b']');
        let back: Value = from_slice(&bytes).unwrap();
        assert_eq!(back, json!(["x", 1.5]));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(
            from_slice::<Value>(b"[i\x01"),
            Err(UbjsonError::Eof)
        ));
        assert!(matches!(
            from_slice::<Value>(b"Q"),
            Err(UbjsonError::Marker(b'Q'))
        ));
        assert!(matches!(
            from_slice::<Value>(b"Si\x7fab"),
            Err(UbjsonError::Length(127))
        ));
        assert!(matches!(
            from_slice::<Value>(b"[$i#i\x7f"),
            Err(UbjsonError::Length(127))
        ));
        assert!(matches!(
            from_slice::<Value>(b"Zi\x01"),
            Err(UbjsonError::Trailing(2))
        ));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let bytes = vec![b'['; MAX_DEPTH + 2];
        assert!(matches!(
            from_slice::<Value>(&bytes),
            Err(UbjsonError::Depth)
        ));
    }
}
