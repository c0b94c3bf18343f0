//! Fixed-width field codec for both pipes.
//!
//! Wire format: little-endian scalars, text as `[u32 length][UTF-8 bytes]`.
//! There is no message envelope; each tag's field order is known statically.

use std::io::{self, Read, Write};

/// Reject strings longer than this when decoding.
const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Buffers one encoded message so it reaches the pipe in a single write.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Booleans travel as `u32` 0/1.
    pub fn flag(&mut self, v: bool) -> &mut Self {
        self.u32(v as u32)
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Count-prefixed list of strings.
    pub fn strs<S: AsRef<str>>(&mut self, items: &[S]) -> &mut Self {
        self.u32(items.len() as u32);
        for s in items {
            self.str(s.as_ref());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write the buffered message and flush.
    pub fn send_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.buf)?;
        writer.flush()
    }
}

/// Reads fields off a byte stream.
///
/// Every read is exact: a stream that closes mid-field yields
/// `io::ErrorKind::UnexpectedEof`.
pub struct WireReader<R> {
    inner: R,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn u8(&mut self) -> io::Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> io::Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> io::Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> io::Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> io::Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    pub fn flag(&mut self) -> io::Result<bool> {
        Ok(self.u32()? != 0)
    }

    /// Length-prefixed text. Invalid UTF-8 is replaced, not rejected.
    pub fn str(&mut self) -> io::Result<String> {
        let len = self.u32()? as usize;
        if len > MAX_STRING_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("string too large: {} bytes", len),
            ));
        }
        let mut bytes = vec![0u8; len];
        self.inner.read_exact(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn strs(&mut self, count: usize) -> io::Result<Vec<String>> {
        (0..count).map(|_| self.str()).collect()
    }

    /// Count-prefixed list of strings.
    pub fn str_list(&mut self) -> io::Result<Vec<String>> {
        let count = self.u32()? as usize;
        self.strs(count)
    }
}
