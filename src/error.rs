use std::io;
use thiserror::Error;

#[doc = r#"
An error produced while decoding or encoding a Standard MIDI File.

Carries both the error [`kind`](CodecError::kind) and the byte offset in the
underlying stream at which the problem was detected.
"#]
#[derive(Debug, Error)]
#[error("at byte {position}: {kind}")]
pub struct CodecError {
    position: u64,
    pub(crate) kind: ErrorKind,
}

/// A kind of error that the codec can produce.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The first chunk tag of the file is not `MThd`.
    #[error("chunk tag {found:?} is not a midi header id")]
    BadHeaderId {
        /// The four bytes found where `MThd` was expected.
        found: [u8; 4],
    },
    /// The header chunk declares a body length other than 6.
    #[error("header chunk declares a {0}-byte body, expected 6")]
    BadHeaderLength(u32),
    /// A chunk tag where a track was expected is not `MTrk`.
    #[error("chunk tag {found:?} is not a midi track id")]
    BadTrackId {
        /// The four bytes found where `MTrk` was expected.
        found: [u8; 4],
    },
    /// The header declares a format other than the supported format 1.
    #[error("unsupported midi format {0}, only format 1 is handled")]
    UnsupportedFormat(u16),
    /// The header division is zero or uses SMPTE timing.
    #[error("header division must be a nonzero ticks-per-quarter-note value")]
    BadDivision(u16),
    /// A variable-length integer still had its continuation bit set after
    /// four bytes.
    #[error("variable-length integer continues past 4 bytes")]
    TruncatedVarLen,
    /// A meta event type byte that the decoder does not recognize.
    #[error("unknown meta event type {0:#04x}")]
    UnknownMetaType(u8),
    /// A fixed-size meta event declared an impossible payload length.
    #[error("meta event {meta:#04x} declares length {length}, expected {expected}")]
    BadMetaLength {
        /// The meta type byte.
        meta: u8,
        /// The length the event declared.
        length: u32,
        /// The length the meta type requires.
        expected: u32,
    },
    /// An end-of-track meta event declared a nonzero payload.
    #[error("end-of-track meta declares a {0}-byte payload")]
    UnexpectedEndOfTrackPayload(u32),
    /// A data byte arrived with no running status in effect.
    #[error("data byte with no running status in effect")]
    MissingRunningStatus,
    /// A system status byte other than sysex (0xF0) or meta (0xFF).
    #[error("unsupported status byte {0:#04x}")]
    UnsupportedStatus(u8),
    /// A length-prefixed payload claims more bytes than remain in the stream.
    #[error("payload of {declared} bytes exceeds the {remaining} bytes left in the stream")]
    PayloadOutOfBounds {
        /// The payload length as declared in the file.
        declared: u32,
        /// Bytes actually remaining in the stream.
        remaining: u64,
    },
    /// An encode timestamp went backwards. Callers must supply
    /// non-decreasing timestamps.
    #[error("timestamp goes backwards: tick {tick} precedes tick {last}")]
    CallerOrdering {
        /// The tick derived from the offending timestamp.
        tick: u32,
        /// The tick of the previously written event.
        last: u32,
    },
    /// An event or footer write was attempted with no open track.
    #[error("no track is open for events")]
    TrackNotOpen,
    /// Track 0 ended without a set-tempo meta event.
    #[error("track 0 has no set-tempo meta event")]
    MissingTempo,
    /// An underlying read, write or seek failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Create an error from a stream position and kind.
    pub fn new(position: u64, kind: ErrorKind) -> Self {
        Self { position, kind }
    }

    /// The kind of failure.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The byte offset at which the failure was detected.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True if this error is an unexpected end of the underlying stream.
    pub fn is_eof(&self) -> bool {
        matches!(&self.kind, ErrorKind::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// The codec result type (see [`CodecError`]).
pub type CodecResult<T> = Result<T, CodecError>;
