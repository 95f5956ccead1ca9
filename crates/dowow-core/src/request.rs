use crate::{Datum, Error, Value};

/// The basic unit of wire transfer: an ordered argument list plus an
/// `(id, name)` envelope.
///
/// Wire layout: `total_len:u32 | id:u32 | name_len:u16 | name[name_len] |
/// datum*`. `total_len` covers the whole Request, including its own four
/// bytes — so the encoded buffer is self-describing and *is* the frame
/// (see `dowow_core::frame`).
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub id: u32,
    pub name: String,
    arguments: Vec<Datum>,
}

impl Request {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: 0, name: name.into(), arguments: Vec::new() }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Sets an argument, appending it; does not deduplicate by name (the
    /// wire format tolerates duplicate argument names, first-match wins
    /// on lookup).
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.push(Datum::new(name, value));
        self
    }

    pub fn push(&mut self, datum: Datum) {
        self.arguments.push(datum);
    }

    /// Returns the first argument with a matching name, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.arguments.iter().find(|d| d.name == name).map(|d| &d.value)
    }

    pub fn arguments(&self) -> &[Datum] {
        &self.arguments
    }

    /// `true` iff this Request is the reserved liveness filler: an empty
    /// argument list named `"_"`. Consumed silently by the receive path
    /// never surfaces as a user-visible Request.
    pub fn is_liveness_filler(&self) -> bool {
        self.name == "_"
    }

    pub fn encoded_size(&self) -> usize {
        4 + 4
            + 2
            + self.name.len()
            + self.arguments.iter().map(Datum::encoded_size).sum::<usize>()
    }

    /// Serialises this Request into a freshly allocated, self-describing
    /// buffer: the first four bytes equal `total_len` little-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        for datum in &self.arguments {
            datum.encode(&mut out);
        }
        let total_len = out.len() as u32;
        out[0..4].copy_from_slice(&total_len.to_le_bytes());
        out
    }

    /// Decodes a Request from a complete, self-describing buffer (as
    /// produced by `encode` and handed over by the frame assembler).
    /// Tolerant of trailing bytes (reports the count actually consumed),
    /// though the frame codec never hands this function any.
    pub fn decode(data: &[u8]) -> Result<(Request, usize), Error> {
        if data.len() < 10 {
            return Err(Error::MalformedFrame);
        }
        let total_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if total_len < 10 {
            return Err(Error::MalformedFrame);
        }
        let body = data.get(4..total_len).ok_or(Error::MalformedFrame)?;

        let id = u32::from_le_bytes(body[0..4].try_into().unwrap());
        let name_len = u16::from_le_bytes(body[4..6].try_into().unwrap()) as usize;
        let name_bytes = body.get(6..6 + name_len).ok_or(Error::MalformedFrame)?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        let mut arguments = Vec::new();
        let mut offset = 6 + name_len;
        while offset < body.len() {
            let (datum, used) = Datum::decode(&body[offset..])?;
            arguments.push(datum);
            offset += used;
        }
        if offset != body.len() {
            return Err(Error::MalformedFrame);
        }

        Ok((Request { id, name, arguments }, total_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_order_and_id() {
        let req = Request::new("ping")
            .with_id(7)
            .set("a", Value::I32(1))
            .set("b", Value::I32(2))
            .set("a", Value::I32(3));
        let buf = req.encode();
        assert_eq!(&buf[0..4], &(buf.len() as u32).to_le_bytes());
        let (decoded, used) = Request::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, req);
        assert_eq!(decoded.get("a"), Some(&Value::I32(1)));
        assert_eq!(
            decoded.arguments().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "a"]
        );
    }

    #[test]
    fn liveness_filler_detection() {
        let req = Request::new("_");
        assert!(req.is_liveness_filler());
        assert!(!Request::new("ping").is_liveness_filler());
    }

    #[test]
    fn tolerates_trailing_bytes_by_reporting_consumed_count() {
        let req = Request::new("x").with_id(1);
        let mut buf = req.encode();
        buf.extend_from_slice(&[0xAA, 0xBB]);
        let (decoded, used) = Request::decode(&buf).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(used, buf.len() - 2);
    }

    #[test]
    fn malformed_argument_fails_whole_decode() {
        let req = Request::new("x").with_id(1).set("a", Value::U8(1));
        let mut buf = req.encode();
        // Corrupt the Datum's own total_len field (first 4 bytes after the
        // Request header) so it claims to be shorter than it really is.
        let datum_at = 4 + 4 + 2 + 1; // id + name_len + "x"
        buf[datum_at..datum_at + 4].copy_from_slice(&2u32.to_le_bytes());
        assert!(Request::decode(&buf).is_err());
    }
}
