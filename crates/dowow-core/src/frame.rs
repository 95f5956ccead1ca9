use std::io::{self, Read};

use crate::Error;

/// Frame length prefix, in bytes.
pub const HEADER_SIZE: usize = 4;
/// Minimum legal frame size: `total_len(4) + id(4) + name_len(2)`, the
/// smallest possible Request (empty name, no arguments).
pub const MIN_FRAME_SIZE: u32 = 10;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024;

enum State {
    Header { buf: [u8; HEADER_SIZE], have: usize },
    Body { buf: Vec<u8>, have: usize },
}

/// Incrementally reassembles length-prefixed Request frames off a byte
/// stream, one non-blocking read at a time.
///
/// Reads the 4-byte length header, validates the declared length
/// against the configured maximum and floor, then accumulates exactly
/// that many body bytes. A short read is not an error, it just means
/// try again later. Each individual `read` call is capped at
/// `max_chunk` bytes, the receive-side analog of the send path's
/// block size.
pub struct FrameReader {
    max_frame: u32,
    max_chunk: usize,
    state: State,
}

impl FrameReader {
    pub fn new(max_frame: u32, max_chunk: usize) -> Self {
        Self { max_frame, max_chunk: max_chunk.max(1), state: State::Header { buf: [0; HEADER_SIZE], have: 0 } }
    }

    /// Attempts to read one complete frame from `r`, making as many
    /// non-blocking `read` calls as are ready.
    ///
    /// Returns:
    /// - `Ok(Some(buf))` — a complete, self-describing frame buffer (the
    ///   first four bytes are the total length, exactly as they arrived
    ///   on the wire).
    /// - `Ok(None)` — the next read would block; call again once the
    ///   transport is readable.
    /// - `Err(Error::TransportClosed)` — EOF mid-frame.
    /// - `Err(Error::FrameTooLarge | Error::FrameTooSmall)` — the peer
    ///   violated the declared size bounds; fatal, the caller must close
    ///   the connection without surfacing a Request.
    pub fn read_from<R: Read>(&mut self, r: &mut R) -> Result<Option<Vec<u8>>, Error> {
        loop {
            match &mut self.state {
                State::Header { buf, have } => {
                    while *have < HEADER_SIZE {
                        let end = (*have + self.max_chunk).min(HEADER_SIZE);
                        match r.read(&mut buf[*have..end]) {
                            Ok(0) => return Err(Error::TransportClosed),
                            Ok(n) => *have += n,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                            Err(e) => return Err(Error::Io(e)),
                        }
                    }

                    let total_len = u32::from_le_bytes(*buf);
                    if total_len < MIN_FRAME_SIZE {
                        return Err(Error::FrameTooSmall { declared: total_len, floor: MIN_FRAME_SIZE });
                    }
                    if total_len > self.max_frame {
                        return Err(Error::FrameTooLarge { declared: total_len, max: self.max_frame });
                    }

                    let mut body = vec![0u8; total_len as usize];
                    body[0..HEADER_SIZE].copy_from_slice(buf);
                    self.state = State::Body { buf: body, have: HEADER_SIZE };
                }

                State::Body { buf, have } => {
                    while *have < buf.len() {
                        let end = (*have + self.max_chunk).min(buf.len());
                        match r.read(&mut buf[*have..end]) {
                            Ok(0) => return Err(Error::TransportClosed),
                            Ok(n) => *have += n,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                            Err(e) => return Err(Error::Io(e)),
                        }
                    }

                    let State::Body { buf, .. } =
                        std::mem::replace(&mut self.state, State::Header { buf: [0; HEADER_SIZE], have: 0 })
                    else {
                        unreachable!()
                    };
                    return Ok(Some(buf));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Value};
    use std::io::Cursor;

    #[test]
    fn assembles_single_frame() {
        let req = Request::new("ping").with_id(2).set("n", Value::I32(1));
        let encoded = req.encode();
        let mut cursor = Cursor::new(encoded.clone());
        let mut reader = FrameReader::new(DEFAULT_MAX_FRAME_SIZE, 4096);
        let frame = reader.read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(frame, encoded);
    }

    #[test]
    fn assembles_two_back_to_back_frames() {
        let a = Request::new("a").with_id(2).encode();
        let b = Request::new("b").with_id(4).encode();
        let mut combined = a.clone();
        combined.extend_from_slice(&b);
        let mut cursor = Cursor::new(combined);

        let mut reader = FrameReader::new(DEFAULT_MAX_FRAME_SIZE, 4096);
        let f1 = reader.read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(f1, a);
        let f2 = reader.read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(f2, b);
    }

    #[test]
    fn oversized_frame_is_rejected_before_reading_body() {
        let mut header = Vec::new();
        header.extend_from_slice(&1_000_000u32.to_le_bytes());
        let mut cursor = Cursor::new(header);
        let mut reader = FrameReader::new(16 * 1024, 4096);
        let err = reader.read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }

    #[test]
    fn undersized_frame_is_rejected() {
        let mut header = Vec::new();
        header.extend_from_slice(&4u32.to_le_bytes());
        let mut cursor = Cursor::new(header);
        let mut reader = FrameReader::new(DEFAULT_MAX_FRAME_SIZE, 4096);
        let err = reader.read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::FrameTooSmall { .. }));
    }

    #[test]
    fn eof_mid_frame_is_transport_closed() {
        let req = Request::new("ping").with_id(2).encode();
        let mut cursor = Cursor::new(req[..req.len() - 2].to_vec());
        let mut reader = FrameReader::new(DEFAULT_MAX_FRAME_SIZE, 4096);
        let err = reader.read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    struct CountingReader<R> {
        inner: R,
        calls: usize,
    }

    impl<R: std::io::Read> std::io::Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            self.inner.read(buf)
        }
    }

    #[test]
    fn small_max_chunk_forces_multiple_reads() {
        let req = Request::new("ping").with_id(2).set("n", Value::I32(1));
        let encoded = req.encode();
        let mut reader = FrameReader::new(DEFAULT_MAX_FRAME_SIZE, 4);
        let mut counting = CountingReader { inner: Cursor::new(encoded.clone()), calls: 0 };
        let frame = reader.read_from(&mut counting).unwrap().unwrap();
        assert_eq!(frame, encoded);
        assert!(counting.calls > 1, "a 4-byte chunk cap should split a {}-byte frame across reads", encoded.len());
    }
}
