use crate::{Error, Value};

/// A named `Value`; the composition unit inside a `Request`.
///
/// Wire layout: `total_len:u32 | name_len:u16 | name[name_len] | value`.
/// `total_len` covers the whole Datum, including its own four bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Datum {
    pub name: String,
    pub value: Value,
}

impl Datum {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }

    /// A Datum is valid iff its name is non-empty and it carries a value;
    /// the latter is always true for a constructed `Datum`; the former
    /// is a convention higher layers enforce, not the codec.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn encoded_size(&self) -> usize {
        4 + 2 + self.name.len() + self.value.encoded_size()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let total_len_at = out.len();
        out.extend_from_slice(&0u32.to_le_bytes());
        let body_start = out.len();

        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        self.value.encode(out);

        let total_len = (out.len() - body_start + 4) as u32;
        out[total_len_at..total_len_at + 4].copy_from_slice(&total_len.to_le_bytes());
    }

    /// Decodes a Datum from the front of `data`, returning it and the
    /// number of bytes consumed. Fails if `total_len` doesn't match the
    /// bytes actually used by the name and value.
    pub fn decode(data: &[u8]) -> Result<(Datum, usize), Error> {
        if data.len() < 6 {
            return Err(Error::MalformedFrame);
        }
        let total_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if total_len < 6 {
            return Err(Error::MalformedFrame);
        }
        let body = data.get(4..total_len).ok_or(Error::MalformedFrame)?;

        let name_len = u16::from_le_bytes(body[0..2].try_into().unwrap()) as usize;
        let name_bytes = body.get(2..2 + name_len).ok_or(Error::MalformedFrame)?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        let (value, value_used) = Value::decode(&body[2 + name_len..])?;
        if 2 + name_len + value_used != body.len() {
            return Err(Error::MalformedFrame);
        }

        Ok((Datum { name, value }, total_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let d = Datum::new("number", Value::I32(42));
        let mut buf = Vec::new();
        d.encode(&mut buf);
        assert_eq!(buf.len(), d.encoded_size());
        let (decoded, used) = Datum::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, d);
    }

    #[test]
    fn empty_name_is_legal_on_wire_but_not_valid() {
        let d = Datum::new("", Value::U8(1));
        let mut buf = Vec::new();
        d.encode(&mut buf);
        let (decoded, _) = Datum::decode(&buf).unwrap();
        assert!(!decoded.is_valid());
    }

    #[test]
    fn truncated_datum_is_malformed() {
        let d = Datum::new("x", Value::I32(1));
        let mut buf = Vec::new();
        d.encode(&mut buf);
        buf.truncate(buf.len() - 1);
        assert!(Datum::decode(&buf).is_err());
    }
}
