#![doc = r#"
The file header chunk and track-chunk framing.

A Standard MIDI File opens with an `MThd` chunk whose fixed 6-byte body holds
the format, track count and division as big-endian 16-bit fields, followed by
one `MTrk` chunk per track. Track chunks are framed by a 4-byte tag and a
big-endian 32-bit byte length, so any track can be reached by skipping whole
chunks without decoding events.
"#]

use crate::error::{CodecResult, ErrorKind};
use crate::stream::ByteStream;
use std::io::{Read, Seek};

pub(crate) const HEADER_TAG: [u8; 4] = *b"MThd";
pub(crate) const TRACK_TAG: [u8; 4] = *b"MTrk";

/// The one format this codec handles: format 1, simultaneous tracks.
pub const SUPPORTED_FORMAT: u16 = 1;

#[doc = r#"
The parsed header chunk: format, track count and division.

Invariants enforced at read time: the format is [`SUPPORTED_FORMAT`] and the
division is a nonzero ticks-per-quarter-note value (SMPTE divisions are
rejected).
"#]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    format: u16,
    tracks: u16,
    division: u16,
}

impl Header {
    /// Total size of the header chunk on disk: tag, length field and the
    /// 6-byte body.
    pub(crate) const BYTE_LEN: u64 = 14;

    /// Read and validate the header chunk from the start of the stream.
    pub fn read<S: Read + Seek>(stream: &mut ByteStream<S>) -> CodecResult<Self> {
        stream.seek(0)?;

        let mut tag = [0u8; 4];
        stream.read_exact(&mut tag)?;
        if tag != HEADER_TAG {
            return Err(stream.err(ErrorKind::BadHeaderId { found: tag }));
        }

        let length = stream.read_u32_be()?;
        if length != 6 {
            return Err(stream.err(ErrorKind::BadHeaderLength(length)));
        }

        let format = stream.read_u16_be()?;
        let tracks = stream.read_u16_be()?;
        let division = stream.read_u16_be()?;

        if format != SUPPORTED_FORMAT {
            return Err(stream.err(ErrorKind::UnsupportedFormat(format)));
        }
        // High bit set would mean SMPTE timing, which this codec does not
        // interpret.
        if division == 0 || division & 0x8000 != 0 {
            return Err(stream.err(ErrorKind::BadDivision(division)));
        }

        Ok(Self {
            format,
            tracks,
            division,
        })
    }

    /// The file format, always [`SUPPORTED_FORMAT`] after a successful read.
    pub const fn format(&self) -> u16 {
        self.format
    }

    /// Number of track chunks the header declares.
    pub const fn tracks(&self) -> u16 {
        self.tracks
    }

    /// Ticks per quarter note.
    pub const fn division(&self) -> u16 {
        self.division
    }
}

/// A track chunk's framing, with its tag already validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrackChunk {
    /// Byte length of the chunk body.
    pub length: u32,
}

/// Read one track chunk tag and length at the current position.
pub(crate) fn read_track_chunk<S: Read + Seek>(
    stream: &mut ByteStream<S>,
) -> CodecResult<TrackChunk> {
    let mut tag = [0u8; 4];
    stream.read_exact(&mut tag)?;
    if tag != TRACK_TAG {
        return Err(stream.err(ErrorKind::BadTrackId { found: tag }));
    }
    let length = stream.read_u32_be()?;
    Ok(TrackChunk { length })
}

/// Position the stream at the first event byte of track `n`.
///
/// Starting just past the header, each preceding chunk is skipped whole by
/// its declared length; no events are decoded along the way.
pub(crate) fn seek_to_track<S: Read + Seek>(
    stream: &mut ByteStream<S>,
    n: u16,
) -> CodecResult<TrackChunk> {
    stream.seek(Header::BYTE_LEN)?;
    let mut chunk = read_track_chunk(stream)?;
    for _ in 0..n {
        let next = stream.position() + chunk.length as u64;
        stream.seek(next)?;
        chunk = read_track_chunk(stream)?;
    }
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn header_bytes(format: u16, tracks: u16, division: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(&tracks.to_be_bytes());
        bytes.extend_from_slice(&division.to_be_bytes());
        bytes
    }

    fn read(bytes: Vec<u8>) -> CodecResult<Header> {
        let mut stream = ByteStream::reading(Cursor::new(bytes)).unwrap();
        Header::read(&mut stream)
    }

    #[test]
    fn parses_a_valid_header() {
        let header = read(header_bytes(1, 2, 480)).unwrap();
        assert_eq!(header.format(), 1);
        assert_eq!(header.tracks(), 2);
        assert_eq!(header.division(), 480);
    }

    #[test]
    fn rejects_a_foreign_tag() {
        let mut bytes = header_bytes(1, 2, 480);
        bytes[..4].copy_from_slice(b"RIFF");
        let err = read(bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadHeaderId { found } if found == b"RIFF"));
    }

    #[test]
    fn rejects_a_wrong_body_length() {
        let mut bytes = header_bytes(1, 2, 480);
        bytes[4..8].copy_from_slice(&7u32.to_be_bytes());
        let err = read(bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadHeaderLength(7)));
    }

    #[test]
    fn rejects_other_formats() {
        let err = read(header_bytes(0, 1, 480)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedFormat(0)));
    }

    #[test]
    fn rejects_zero_and_smpte_divisions() {
        let err = read(header_bytes(1, 2, 0)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadDivision(0)));

        let err = read(header_bytes(1, 2, 0xE250)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadDivision(0xE250)));
    }

    #[test]
    fn seeks_across_chunk_frames() {
        let mut bytes = header_bytes(1, 3, 480);
        for body in [&[0u8, 1, 2][..], &[3, 4][..], &[5][..]] {
            bytes.extend_from_slice(b"MTrk");
            bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
            bytes.extend_from_slice(body);
        }
        let mut stream = ByteStream::reading(Cursor::new(bytes)).unwrap();

        let chunk = seek_to_track(&mut stream, 2).unwrap();
        assert_eq!(chunk.length, 1);
        assert_eq!(stream.read_u8().unwrap(), 5);

        let chunk = seek_to_track(&mut stream, 0).unwrap();
        assert_eq!(chunk.length, 3);
        assert_eq!(stream.read_u8().unwrap(), 0);
    }

    #[test]
    fn seeking_into_a_non_track_chunk_fails() {
        let mut bytes = header_bytes(1, 2, 480);
        bytes.extend_from_slice(b"XTrk");
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let mut stream = ByteStream::reading(Cursor::new(bytes)).unwrap();
        let err = seek_to_track(&mut stream, 0).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadTrackId { .. }));
    }
}
