//! Byte codec: big-endian fixed-width primitives and length-prefixed strings.
//!
//! Parsing rules:
//! - Never index (`buf[0]`); read through `Buf` after a `remaining()` check.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.
//!
//! Every multi-byte value is fixed width and most-significant byte first, which
//! keeps frames byte-exact across implementations.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RpcError};

/// Append-only writer over a growable buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_byte(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    /// IEEE-754 bit pattern, written through `write_i64`.
    pub fn write_f64(&mut self, v: f64) {
        self.write_i64(v.to_bits() as i64);
    }

    /// 32-bit length prefix followed by the raw UTF-8 bytes (no terminator).
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        let len = i32::try_from(v.len())
            .map_err(|_| RpcError::Framing(format!("string of {} bytes is too long", v.len())))?;
        self.write_i32(len);
        self.buf.put_slice(v.as_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor-based reader over a fixed byte sequence.
#[derive(Debug, Clone)]
pub struct ByteReader {
    buf: Bytes,
}

impl ByteReader {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into() }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(RpcError::Framing(format!(
                "truncated frame: {what} needs {n} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.need(1, "byte")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4, "i32")?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.need(8, "i64")?;
        Ok(self.buf.get_i64())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .map_err(|_| RpcError::Framing(format!("negative string length {len}")))?;
        self.need(len, "string body")?;
        let raw = self.buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec())
            .map_err(|e| RpcError::Framing(format!("string is not utf-8: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut w = ByteWriter::new();
        w.write_i32(0x0102_0304);
        w.write_i64(0x0506_0708_090a_0b0c);
        assert_eq!(
            w.as_slice(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn string_has_length_prefix_and_no_terminator() {
        let mut w = ByteWriter::new();
        w.write_string("abc").unwrap();
        assert_eq!(w.as_slice(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn reader_mirrors_writer() {
        let mut w = ByteWriter::new();
        w.write_byte(0xfe);
        w.write_i32(-7);
        w.write_i64(i64::MIN);
        w.write_f64(-2.5);
        w.write_string("héllo").unwrap();
        w.write_string("").unwrap();

        let mut r = ByteReader::new(w.into_bytes());
        assert_eq!(r.read_byte().unwrap(), 0xfe);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        assert_eq!(r.read_f64().unwrap(), -2.5);
        assert_eq!(r.read_string().unwrap(), "héllo");
        assert_eq!(r.read_string().unwrap(), "");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reading_past_end_is_framing_error() {
        let mut r = ByteReader::new(vec![0u8, 0, 1]);
        let err = r.read_i32().unwrap_err();
        assert!(matches!(err, RpcError::Framing(_)));

        let mut r = ByteReader::new(Vec::new());
        assert!(matches!(r.read_byte(), Err(RpcError::Framing(_))));
    }

    #[test]
    fn string_length_beyond_buffer_is_rejected() {
        // claims 10 bytes, carries 2
        let mut r = ByteReader::new(vec![0u8, 0, 0, 10, b'h', b'i']);
        assert!(matches!(r.read_string(), Err(RpcError::Framing(_))));

        let mut r = ByteReader::new(vec![0xffu8, 0xff, 0xff, 0xff]);
        assert!(matches!(r.read_string(), Err(RpcError::Framing(_))));
    }
}
