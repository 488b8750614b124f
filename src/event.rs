#![doc = r#"
Track event decoding.

One track event on the wire is a variable-length delta time followed by an
optional status byte and a status-specific payload. The status byte may be
omitted under the running-status convention, in which case the previous
status byte on the same track is reused and the first payload byte arrives
where the status byte would have been.
"#]

use crate::error::{CodecResult, ErrorKind};
use crate::stream::ByteStream;
use crate::timing::Tempo;
use crate::varlen::read_varlen;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::io::{Read, Seek};

/// High bit that distinguishes status bytes from data bytes.
pub(crate) const STATUS_FLAG: u8 = 0x80;
/// High nibble of a status byte selects the event category.
pub(crate) const STATUS_MASK: u8 = 0xF0;
/// Low nibble of a channel status byte selects the channel.
pub(crate) const CHANNEL_MASK: u8 = 0x0F;
/// The largest data byte, and the velocity ceiling.
pub const VELOCITY_MAX: u8 = 127;

#[doc = r#"
A MIDI channel, 0 through 15.
"#]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel(u8);

impl Channel {
    /// Channel 9, conventionally reserved for percussion. This is the
    /// default channel filter of the codec.
    pub const PERCUSSION: Self = Self(9);

    /// Create a channel, masking to the low 4 bits.
    pub const fn new(channel: u8) -> Self {
        Self(channel & CHANNEL_MASK)
    }

    /// The channel number, 0..=15.
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Status byte categories, keyed by the high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub(crate) enum Status {
    NoteOff = 0x80,
    NoteOn = 0x90,
    Aftertouch = 0xA0,
    Controller = 0xB0,
    ProgramChange = 0xC0,
    ChannelAftertouch = 0xD0,
    PitchBend = 0xE0,
    System = 0xF0,
}

/// Meta event type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetaType {
    /// Sequence number, 2-byte payload.
    SequenceNumber = 0x00,
    /// Free text.
    Text = 0x01,
    /// Copyright notice.
    Copyright = 0x02,
    /// Sequence or track name.
    TrackName = 0x03,
    /// Instrument name.
    InstrumentName = 0x04,
    /// Lyric text.
    Lyrics = 0x05,
    /// Marker text.
    Marker = 0x06,
    /// Cue point text.
    CuePoint = 0x07,
    /// MIDI channel prefix, 1-byte payload.
    ChannelPrefix = 0x20,
    /// End of track, zero-length payload.
    EndOfTrack = 0x2F,
    /// Set tempo, 3-byte payload in microseconds per quarter note.
    SetTempo = 0x51,
    /// SMPTE offset, 5-byte payload.
    SmpteOffset = 0x54,
    /// Time signature, 4-byte payload.
    TimeSignature = 0x58,
    /// Key signature, 2-byte payload.
    KeySignature = 0x59,
    /// Sequencer-specific blob.
    SequencerSpecific = 0x7F,
}

#[doc = r#"
One decoded track event: a delta time in ticks plus the event body.
"#]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackEvent {
    /// Ticks since the previous event on the same track.
    pub delta: u32,
    /// The event body.
    pub kind: EventKind,
}

/// The set of event categories a track can carry.
///
/// Each variant holds only the fields valid for its category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// A key was released.
    NoteOff {
        /// The channel the note sounds on.
        channel: Channel,
        /// The key number, 0..=127.
        key: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// A key was struck.
    NoteOn {
        /// The channel the note sounds on.
        channel: Channel,
        /// The key number, 0..=127.
        key: u8,
        /// Strike velocity. Zero conventionally means note-off, which is
        /// surfaced as-is.
        velocity: u8,
    },
    /// Per-key pressure change.
    Aftertouch {
        /// The channel.
        channel: Channel,
        /// The key number.
        key: u8,
        /// The new pressure.
        pressure: u8,
    },
    /// Control change.
    Controller {
        /// The channel.
        channel: Channel,
        /// The controller number.
        controller: u8,
        /// The controller value.
        value: u8,
    },
    /// Program (patch) change.
    ProgramChange {
        /// The channel.
        channel: Channel,
        /// The program number.
        program: u8,
    },
    /// Channel-wide pressure change.
    ChannelAftertouch {
        /// The channel.
        channel: Channel,
        /// The new pressure.
        pressure: u8,
    },
    /// Pitch bend change.
    PitchBend {
        /// The channel.
        channel: Channel,
        /// 14-bit bend value, lsb | msb << 7.
        value: u16,
    },
    /// System-exclusive payload, copied verbatim.
    SysEx(Vec<u8>),
    /// A meta event.
    Meta(MetaEvent),
}

/// Meta event bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetaEvent {
    /// Sequence number.
    SequenceNumber(u16),
    /// Free text, raw bytes.
    Text(Vec<u8>),
    /// Copyright notice, raw bytes.
    Copyright(Vec<u8>),
    /// Sequence or track name, raw bytes.
    TrackName(Vec<u8>),
    /// Instrument name, raw bytes.
    InstrumentName(Vec<u8>),
    /// Lyric text, raw bytes.
    Lyrics(Vec<u8>),
    /// Marker text, raw bytes.
    Marker(Vec<u8>),
    /// Cue point text, raw bytes.
    CuePoint(Vec<u8>),
    /// MIDI channel prefix.
    ChannelPrefix(u8),
    /// End of the current track.
    EndOfTrack,
    /// Tempo change.
    SetTempo(Tempo),
    /// SMPTE offset of the track start.
    SmpteOffset {
        /// Hour, with the frame-rate bits left in place.
        hour: u8,
        /// Minute.
        minute: u8,
        /// Second.
        second: u8,
        /// Frame.
        frame: u8,
        /// Hundredths of a frame.
        subframe: u8,
    },
    /// Time signature.
    TimeSignature {
        /// Numerator.
        numerator: u8,
        /// Denominator as a power of two.
        denominator: u8,
        /// MIDI clocks per metronome click.
        metronome: u8,
        /// Notated 32nd notes per quarter note.
        thirty_seconds: u8,
    },
    /// Key signature.
    KeySignature {
        /// Sharps (positive) or flats (negative).
        key: i8,
        /// 0 for major, 1 for minor.
        scale: u8,
    },
    /// Sequencer-specific blob, copied verbatim.
    SequencerSpecific(Vec<u8>),
}

impl TrackEvent {
    /// Decode one track event.
    ///
    /// `running` holds the status byte in effect on this track; it is
    /// updated whenever an explicit status byte is read, and reused when the
    /// byte after the delta time has its high bit clear.
    pub fn read<S: Read + Seek>(
        stream: &mut ByteStream<S>,
        running: &mut Option<u8>,
    ) -> CodecResult<Self> {
        let (delta, _) = read_varlen(stream)?;

        let first = stream.read_u8()?;
        if first & STATUS_FLAG != 0 {
            *running = Some(first);
        } else {
            stream.unget(first);
        }
        let status = running.ok_or_else(|| stream.err(ErrorKind::MissingRunningStatus))?;

        let category = Status::try_from(status & STATUS_MASK)
            .map_err(|_| stream.err(ErrorKind::UnsupportedStatus(status)))?;
        let channel = Channel::new(status & CHANNEL_MASK);

        let kind = match category {
            Status::NoteOff => EventKind::NoteOff {
                channel,
                key: stream.read_u8()?,
                velocity: stream.read_u8()?,
            },
            Status::NoteOn => EventKind::NoteOn {
                channel,
                key: stream.read_u8()?,
                velocity: stream.read_u8()?,
            },
            Status::Aftertouch => EventKind::Aftertouch {
                channel,
                key: stream.read_u8()?,
                pressure: stream.read_u8()?,
            },
            Status::Controller => EventKind::Controller {
                channel,
                controller: stream.read_u8()?,
                value: stream.read_u8()?,
            },
            Status::ProgramChange => EventKind::ProgramChange {
                channel,
                program: stream.read_u8()?,
            },
            Status::ChannelAftertouch => EventKind::ChannelAftertouch {
                channel,
                pressure: stream.read_u8()?,
            },
            Status::PitchBend => {
                let lsb = stream.read_u8()?;
                let msb = stream.read_u8()?;
                EventKind::PitchBend {
                    channel,
                    value: (lsb & 0x7F) as u16 | (((msb & 0x7F) as u16) << 7),
                }
            }
            Status::System => match status {
                0xF0 => {
                    let (length, _) = read_varlen(stream)?;
                    check_payload(stream, length)?;
                    EventKind::SysEx(stream.read_bytes(length)?)
                }
                0xFF => EventKind::Meta(read_meta(stream)?),
                other => return Err(stream.err(ErrorKind::UnsupportedStatus(other))),
            },
        };

        Ok(Self { delta, kind })
    }

    /// True for an end-of-track meta event.
    pub fn is_end_of_track(&self) -> bool {
        matches!(self.kind, EventKind::Meta(MetaEvent::EndOfTrack))
    }
}

fn read_meta<S: Read + Seek>(stream: &mut ByteStream<S>) -> CodecResult<MetaEvent> {
    let type_byte = stream.read_u8()?;
    let meta = MetaType::try_from(type_byte)
        .map_err(|_| stream.err(ErrorKind::UnknownMetaType(type_byte)))?;
    let (length, _) = read_varlen(stream)?;

    let event = match meta {
        MetaType::SequenceNumber => {
            expect_len(stream, meta, length, 2)?;
            MetaEvent::SequenceNumber(stream.read_u16_be()?)
        }
        MetaType::Text
        | MetaType::Copyright
        | MetaType::TrackName
        | MetaType::InstrumentName
        | MetaType::Lyrics
        | MetaType::Marker
        | MetaType::CuePoint => {
            check_payload(stream, length)?;
            let text = stream.read_bytes(length)?;
            match meta {
                MetaType::Text => MetaEvent::Text(text),
                MetaType::Copyright => MetaEvent::Copyright(text),
                MetaType::TrackName => MetaEvent::TrackName(text),
                MetaType::InstrumentName => MetaEvent::InstrumentName(text),
                MetaType::Lyrics => MetaEvent::Lyrics(text),
                MetaType::Marker => MetaEvent::Marker(text),
                MetaType::CuePoint => MetaEvent::CuePoint(text),
                _ => unreachable!(),
            }
        }
        MetaType::ChannelPrefix => {
            expect_len(stream, meta, length, 1)?;
            MetaEvent::ChannelPrefix(stream.read_u8()?)
        }
        MetaType::EndOfTrack => {
            if length != 0 {
                return Err(stream.err(ErrorKind::UnexpectedEndOfTrackPayload(length)));
            }
            MetaEvent::EndOfTrack
        }
        MetaType::SetTempo => {
            expect_len(stream, meta, length, 3)?;
            let mut bytes = [0u8; 3];
            stream.read_exact(&mut bytes)?;
            MetaEvent::SetTempo(Tempo::from_bytes(bytes))
        }
        MetaType::SmpteOffset => {
            expect_len(stream, meta, length, 5)?;
            let mut bytes = [0u8; 5];
            stream.read_exact(&mut bytes)?;
            MetaEvent::SmpteOffset {
                hour: bytes[0],
                minute: bytes[1],
                second: bytes[2],
                frame: bytes[3],
                subframe: bytes[4],
            }
        }
        MetaType::TimeSignature => {
            expect_len(stream, meta, length, 4)?;
            let mut bytes = [0u8; 4];
            stream.read_exact(&mut bytes)?;
            MetaEvent::TimeSignature {
                numerator: bytes[0],
                denominator: bytes[1],
                metronome: bytes[2],
                thirty_seconds: bytes[3],
            }
        }
        MetaType::KeySignature => {
            expect_len(stream, meta, length, 2)?;
            MetaEvent::KeySignature {
                key: stream.read_u8()? as i8,
                scale: stream.read_u8()?,
            }
        }
        MetaType::SequencerSpecific => {
            check_payload(stream, length)?;
            MetaEvent::SequencerSpecific(stream.read_bytes(length)?)
        }
    };

    Ok(event)
}

fn expect_len<S>(
    stream: &ByteStream<S>,
    meta: MetaType,
    length: u32,
    expected: u32,
) -> CodecResult<()> {
    if length != expected {
        return Err(stream.err(ErrorKind::BadMetaLength {
            meta: meta.into(),
            length,
            expected,
        }));
    }
    Ok(())
}

/// Bound a declared payload length by the bytes actually left in the stream,
/// so a corrupt length field cannot trigger an oversized allocation.
fn check_payload<S>(stream: &ByteStream<S>, declared: u32) -> CodecResult<()> {
    let remaining = stream.remaining();
    if declared as u64 > remaining {
        return Err(stream.err(ErrorKind::PayloadOutOfBounds {
            declared,
            remaining,
        }));
    }
    Ok(())
}
