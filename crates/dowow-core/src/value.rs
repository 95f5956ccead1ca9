use std::fmt;

use crate::Error;

/// A tagged sum of scalar/string/array payload atoms, encoded as
/// `tag | length | payload`. `decode` is the one dispatcher keyed on
/// the tag byte; there is no per-variant table to keep in sync.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined(Vec<u8>),
    I64(i64),
    U64(u64),
    I32(i32),
    U32(u32),
    I16(i16),
    U16(u16),
    U8(u8),
    I8(i8),
    Str(Vec<u8>),
    Arr(Vec<Value>),
}

impl Value {
    pub const TAG_UNDEFINED: u8 = 0;
    pub const TAG_I64: u8 = 1;
    pub const TAG_U64: u8 = 2;
    pub const TAG_I32: u8 = 3;
    pub const TAG_U32: u8 = 4;
    pub const TAG_I16: u8 = 5;
    pub const TAG_U16: u8 = 6;
    pub const TAG_U8: u8 = 7;
    pub const TAG_I8: u8 = 8;
    pub const TAG_STR: u8 = 9;
    pub const TAG_ARR: u8 = 10;

    pub fn tag(&self) -> u8 {
        match self {
            Value::Undefined(_) => Self::TAG_UNDEFINED,
            Value::I64(_) => Self::TAG_I64,
            Value::U64(_) => Self::TAG_U64,
            Value::I32(_) => Self::TAG_I32,
            Value::U32(_) => Self::TAG_U32,
            Value::I16(_) => Self::TAG_I16,
            Value::U16(_) => Self::TAG_U16,
            Value::U8(_) => Self::TAG_U8,
            Value::I8(_) => Self::TAG_I8,
            Value::Str(_) => Self::TAG_STR,
            Value::Arr(_) => Self::TAG_ARR,
        }
    }

    /// Appends the encoded `tag | length | payload` record to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        let len_at = out.len();
        out.extend_from_slice(&0u32.to_le_bytes());
        let payload_start = out.len();

        match self {
            Value::Undefined(bytes) => out.extend_from_slice(bytes),
            Value::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U8(v) => out.push(*v),
            Value::I8(v) => out.push(*v as u8),
            Value::Str(bytes) => {
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Arr(items) => {
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }

        let len = (out.len() - payload_start) as u32;
        out[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
    }

    pub fn encoded_size(&self) -> usize {
        5 + match self {
            Value::Undefined(b) => b.len(),
            Value::I64(_) | Value::U64(_) => 8,
            Value::I32(_) | Value::U32(_) => 4,
            Value::I16(_) | Value::U16(_) => 2,
            Value::U8(_) | Value::I8(_) => 1,
            Value::Str(b) => 4 + b.len(),
            Value::Arr(items) => 4 + items.iter().map(Value::encoded_size).sum::<usize>(),
        }
    }

    /// Decodes a single `tag | length | payload` record from the front of
    /// `data`. On success returns the value and the number of bytes
    /// consumed (always `5 + length`). Never consumes a partial record:
    /// any truncation or malformed payload is reported as an error and
    /// `data` is left untouched from the caller's point of view.
    pub fn decode(data: &[u8]) -> Result<(Value, usize), Error> {
        if data.len() < 5 {
            return Err(Error::MalformedFrame);
        }
        let tag = data[0];
        let length = u32::from_le_bytes(data[1..5].try_into().unwrap()) as usize;
        let Some(payload) = data.get(5..5 + length) else {
            return Err(Error::MalformedFrame);
        };

        let value = match tag {
            Self::TAG_UNDEFINED => Value::Undefined(payload.to_vec()),
            Self::TAG_I64 => Value::I64(i64::from_le_bytes(fixed(payload)?)),
            Self::TAG_U64 => Value::U64(u64::from_le_bytes(fixed(payload)?)),
            Self::TAG_I32 => Value::I32(i32::from_le_bytes(fixed(payload)?)),
            Self::TAG_U32 => Value::U32(u32::from_le_bytes(fixed(payload)?)),
            Self::TAG_I16 => Value::I16(i16::from_le_bytes(fixed(payload)?)),
            Self::TAG_U16 => Value::U16(u16::from_le_bytes(fixed(payload)?)),
            Self::TAG_U8 => Value::U8(*payload.first().ok_or(Error::MalformedFrame)?),
            Self::TAG_I8 => Value::I8(*payload.first().ok_or(Error::MalformedFrame)? as i8),
            Self::TAG_STR => {
                if payload.len() < 4 {
                    return Err(Error::MalformedFrame);
                }
                let str_len = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
                let bytes = payload.get(4..4 + str_len).ok_or(Error::MalformedFrame)?;
                if 4 + str_len != payload.len() {
                    return Err(Error::MalformedFrame);
                }
                Value::Str(bytes.to_vec())
            }
            Self::TAG_ARR => {
                if payload.len() < 4 {
                    return Err(Error::MalformedFrame);
                }
                let count = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let mut items = Vec::with_capacity(count as usize);
                let mut offset = 4usize;
                for _ in 0..count {
                    let (item, used) = Value::decode(&payload[offset..])?;
                    items.push(item);
                    offset += used;
                }
                if offset != payload.len() {
                    return Err(Error::MalformedFrame);
                }
                Value::Arr(items)
            }
            _ => return Err(Error::MalformedFrame),
        };

        Ok((value, 5 + length))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::I16(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::U8(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Value::I8(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_str_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Arr(v) => Some(v),
            _ => None,
        }
    }
}

fn fixed<const N: usize>(payload: &[u8]) -> Result<[u8; N], Error> {
    payload.try_into().map_err(|_| Error::MalformedFrame)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_indented(self, f, 0)
    }
}

fn write_indented(value: &Value, f: &mut fmt::Formatter<'_>, indent: u16) -> fmt::Result {
    let pad = " ".repeat(indent as usize);
    match value {
        Value::Undefined(bytes) => write!(f, "{pad}Undefined({} bytes)", bytes.len()),
        Value::I64(v) => write!(f, "{pad}I64({v})"),
        Value::U64(v) => write!(f, "{pad}U64({v})"),
        Value::I32(v) => write!(f, "{pad}I32({v})"),
        Value::U32(v) => write!(f, "{pad}U32({v})"),
        Value::I16(v) => write!(f, "{pad}I16({v})"),
        Value::U16(v) => write!(f, "{pad}U16({v})"),
        Value::U8(v) => write!(f, "{pad}U8({v})"),
        Value::I8(v) => write!(f, "{pad}I8({v})"),
        Value::Str(bytes) => {
            write!(f, "{pad}Str({:?})", String::from_utf8_lossy(bytes))
        }
        Value::Arr(items) => {
            writeln!(f, "{pad}Arr[")?;
            for item in items {
                write_indented(item, f, indent + 2)?;
                writeln!(f)?;
            }
            write!(f, "{pad}]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        for v in [
            Value::Undefined(vec![1, 2, 3]),
            Value::I64(-12),
            Value::U64(12),
            Value::I32(-12),
            Value::U32(12),
            Value::I16(-12),
            Value::U16(12),
            Value::U8(12),
            Value::I8(-12),
            Value::Str(b"hello".to_vec()),
        ] {
            let mut buf = Vec::new();
            v.encode(&mut buf);
            assert_eq!(buf.len(), v.encoded_size());
            let (decoded, used) = Value::decode(&buf).unwrap();
            assert_eq!(used, buf.len());
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn nested_array_round_trip() {
        let v = Value::Arr(vec![
            Value::I32(1),
            Value::Arr(vec![Value::Str(b"a".to_vec()), Value::U8(2)]),
            Value::Arr(vec![]),
        ]);
        let mut buf = Vec::new();
        v.encode(&mut buf);
        let (decoded, used) = Value::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, v);
    }

    #[test]
    fn truncated_value_is_malformed() {
        let mut buf = Vec::new();
        Value::I32(5).encode(&mut buf);
        buf.truncate(buf.len() - 1);
        assert!(Value::decode(&buf).is_err());
    }

    #[test]
    fn bad_tag_is_malformed() {
        let buf = vec![255, 0, 0, 0, 0];
        assert!(Value::decode(&buf).is_err());
    }

    #[test]
    fn one_bad_element_discards_whole_array() {
        let mut inner = Vec::new();
        Value::I32(1).encode(&mut inner);
        let mut bad_tag_elem = Vec::new();
        bad_tag_elem.extend_from_slice(&1u32.to_le_bytes());
        bad_tag_elem.extend_from_slice(&inner);
        // Corrupt the element's own tag byte.
        let elem_start = 4;
        bad_tag_elem[elem_start] = 250;
        assert!(Value::decode(&bad_tag_elem).is_err());
    }
}
