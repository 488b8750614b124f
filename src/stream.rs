use crate::error::{CodecError, CodecResult, ErrorKind};
use std::io::{self, Read, Seek, SeekFrom, Write};

#[doc = r#"
A position-tracked byte stream with one-byte pushback.

Wraps any seekable source or sink and keeps the logical byte offset current
across reads, writes, seeks and pushback, so every [`CodecError`] can report
where in the file it happened. The single pushback slot exists for the
running-status protocol: the event decoder peeks one byte and, when the high
bit is clear, returns it unconsumed.
"#]
pub struct ByteStream<S> {
    inner: S,
    pushback: Option<u8>,
    position: u64,
    len: u64,
}

impl<S> ByteStream<S> {
    /// The logical byte offset of the next read or write.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left between the current position and the end of the stream.
    ///
    /// Only meaningful in read mode, where the total length is measured once
    /// at open time.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    /// Consume the stream, returning the underlying source or sink.
    pub fn into_inner(self) -> S {
        self.inner
    }

    pub(crate) fn err(&self, kind: ErrorKind) -> CodecError {
        CodecError::new(self.position, kind)
    }

    fn io_err(&self, e: io::Error) -> CodecError {
        CodecError::new(self.position, ErrorKind::Io(e))
    }
}

impl<S: Seek> ByteStream<S> {
    /// Reposition the stream at an absolute byte offset.
    ///
    /// Discards any pushed-back byte.
    pub fn seek(&mut self, offset: u64) -> CodecResult<()> {
        self.pushback = None;
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.io_err(e))?;
        self.position = offset;
        Ok(())
    }
}

impl<S: Read + Seek> ByteStream<S> {
    /// Open a stream for reading, measuring its total length up front.
    pub fn reading(mut inner: S) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            pushback: None,
            position: 0,
            len,
        })
    }

    /// Read a single byte, draining the pushback slot first.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Return the most recently read byte to the stream.
    ///
    /// Only one byte may be pending at a time.
    pub fn unget(&mut self, byte: u8) {
        debug_assert!(self.pushback.is_none(), "pushback slot already occupied");
        self.position -= 1;
        self.pushback = Some(byte);
    }

    /// Fill `buf` exactly, failing with an unexpected-eof [`ErrorKind::Io`]
    /// if the stream ends first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(byte) = self.pushback.take() {
            buf[0] = byte;
            self.position += 1;
            start = 1;
        }
        self.inner
            .read_exact(&mut buf[start..])
            .map_err(|e| self.io_err(e))?;
        self.position += (buf.len() - start) as u64;
        Ok(())
    }

    /// Read a big-endian 16-bit field.
    pub fn read_u16_be(&mut self) -> CodecResult<u16> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a big-endian 32-bit field.
    pub fn read_u32_be(&mut self) -> CodecResult<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read `len` raw bytes into an owned buffer.
    pub fn read_bytes(&mut self, len: u32) -> CodecResult<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<S: Write + Seek> ByteStream<S> {
    /// Open a stream for writing.
    pub fn writing(inner: S) -> Self {
        Self {
            inner,
            pushback: None,
            position: 0,
            len: 0,
        }
    }

    /// Write all of `buf` at the current position.
    pub fn write_all(&mut self, buf: &[u8]) -> CodecResult<()> {
        self.inner.write_all(buf).map_err(|e| self.io_err(e))?;
        self.position += buf.len() as u64;
        self.len = self.len.max(self.position);
        Ok(())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, byte: u8) -> CodecResult<()> {
        self.write_all(&[byte])
    }

    /// Write a big-endian 16-bit field.
    pub fn write_u16_be(&mut self, value: u16) -> CodecResult<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Write a big-endian 32-bit field.
    pub fn write_u32_be(&mut self, value: u32) -> CodecResult<()> {
        self.write_all(&value.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn read_tracks_position_and_remaining() {
        let mut stream = ByteStream::reading(Cursor::new(vec![1, 2, 3, 4])).unwrap();
        assert_eq!(stream.remaining(), 4);
        assert_eq!(stream.read_u8().unwrap(), 1);
        assert_eq!(stream.read_u16_be().unwrap(), 0x0203);
        assert_eq!(stream.position(), 3);
        assert_eq!(stream.remaining(), 1);
    }

    #[test]
    fn unget_rewinds_one_byte() {
        let mut stream = ByteStream::reading(Cursor::new(vec![0x45, 0x60])).unwrap();
        let byte = stream.read_u8().unwrap();
        stream.unget(byte);
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_u8().unwrap(), 0x45);
        assert_eq!(stream.read_u8().unwrap(), 0x60);
    }

    #[test]
    fn pushback_feeds_multi_byte_reads() {
        let mut stream = ByteStream::reading(Cursor::new(vec![0x12, 0x34, 0x56])).unwrap();
        let byte = stream.read_u8().unwrap();
        stream.unget(byte);
        assert_eq!(stream.read_u16_be().unwrap(), 0x1234);
    }

    #[test]
    fn reading_past_end_is_eof() {
        let mut stream = ByteStream::reading(Cursor::new(vec![0xAB])).unwrap();
        stream.read_u8().unwrap();
        let err = stream.read_u8().unwrap_err();
        assert!(err.is_eof());
        assert_eq!(err.position(), 1);
    }

    #[test]
    fn seek_then_overwrite_patches_in_place() {
        let mut stream = ByteStream::writing(Cursor::new(Vec::new()));
        stream.write_u32_be(0).unwrap();
        stream.write_all(b"abcd").unwrap();
        stream.seek(0).unwrap();
        stream.write_u32_be(4).unwrap();
        let bytes = stream.into_inner().into_inner();
        assert_eq!(bytes, vec![0, 0, 0, 4, b'a', b'b', b'c', b'd']);
    }
}
