#![doc = r#"
The encoding side of the codec.

A written file is always format 1 with two tracks: track 0 carries the
set-tempo meta event, track 1 carries the note-on stream. Track 1 is opened
with a placeholder length field whose offset is remembered; the real byte
count is patched back in when the footer is written.
"#]

use crate::error::{CodecResult, ErrorKind};
use crate::event::{Channel, MetaType, Status, VELOCITY_MAX};
use crate::header::{HEADER_TAG, SUPPORTED_FORMAT, TRACK_TAG};
use crate::stream::ByteStream;
use crate::timing::Tempo;
use crate::varlen::encode_varlen;
use std::io::{Seek, Write};

/// Encode state for the open note track.
#[derive(Debug)]
struct OpenTrack {
    division: u16,
    tempo: Tempo,
    seconds_per_tick: f64,
    last_tick: u32,
    /// Bytes written to the note track so far, for the length patch-back.
    track_bytes: u32,
    /// File offset of the note track's 4-byte length field.
    length_field_at: u64,
    /// Whether the note-on status byte has been emitted. All subsequent
    /// events ride on running status.
    status_written: bool,
    closed: bool,
}

#[doc = r#"
Writes a two-track Standard MIDI File from timed note events.

Usage is strictly [`header_write`](SmfWriter::header_write), any number of
[`write_note`](SmfWriter::write_note) calls with non-decreasing timestamps,
then [`finish`](SmfWriter::finish).
"#]
pub struct SmfWriter<S> {
    stream: ByteStream<S>,
    track: Option<OpenTrack>,
}

impl<S: Write + Seek> SmfWriter<S> {
    /// Wrap a sink. Nothing is written until
    /// [`header_write`](Self::header_write).
    pub fn new(sink: S) -> Self {
        Self {
            stream: ByteStream::writing(sink),
            track: None,
        }
    }

    /// The division the file was opened with, once the header is written.
    pub fn division(&self) -> Option<u16> {
        self.track.as_ref().map(|t| t.division)
    }

    /// The tempo the file was opened with, once the header is written.
    pub fn tempo(&self) -> Option<Tempo> {
        self.track.as_ref().map(|t| t.tempo)
    }

    /// Consume the writer, returning the underlying sink.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Write the header chunk, the tempo track, and open the note track.
    ///
    /// The tempo track holds a set-tempo meta with `tempo_micros`
    /// (microseconds per quarter note) and an end-of-track meta. The note
    /// track's length field is left as a placeholder for
    /// [`finish`](Self::finish) to patch.
    pub fn header_write(&mut self, division: u16, tempo_micros: u32) -> CodecResult<()> {
        let tempo = Tempo::new(tempo_micros);

        self.stream.write_all(&HEADER_TAG)?;
        self.stream.write_u32_be(6)?;
        self.stream.write_u16_be(SUPPORTED_FORMAT)?;
        self.stream.write_u16_be(2)?;
        self.stream.write_u16_be(division)?;

        // Track 0: delta 0 set-tempo, delta 0 end-of-track. 11 bytes.
        self.stream.write_all(&TRACK_TAG)?;
        self.stream.write_u32_be(11)?;
        self.stream
            .write_all(&[0x00, 0xFF, MetaType::SetTempo.into(), 3])?;
        self.stream.write_all(&tempo.to_bytes())?;
        self.stream
            .write_all(&[0x00, 0xFF, MetaType::EndOfTrack.into(), 0])?;

        // Track 1, length patched back by finish().
        self.stream.write_all(&TRACK_TAG)?;
        let length_field_at = self.stream.position();
        self.stream.write_u32_be(0)?;

        self.track = Some(OpenTrack {
            division,
            tempo,
            seconds_per_tick: tempo.seconds_per_tick(division),
            last_tick: 0,
            track_bytes: 0,
            length_field_at,
            status_written: false,
            closed: false,
        });
        Ok(())
    }

    /// Append one note-on to the open track.
    ///
    /// `seconds` is converted to an absolute tick; timestamps must be
    /// non-decreasing or the call fails with [`ErrorKind::CallerOrdering`].
    /// `velocity` is a fraction in `[0, 1]`, scaled to the 7-bit velocity
    /// range. The status byte is written once, for the first event; later
    /// events rely on running status.
    pub fn write_note(&mut self, seconds: f64, key: u8, velocity: f32) -> CodecResult<()> {
        let track = match &mut self.track {
            Some(track) if !track.closed => track,
            _ => return Err(self.stream.err(ErrorKind::TrackNotOpen)),
        };

        let tick = (seconds / track.seconds_per_tick).round() as u32;
        if tick < track.last_tick {
            return Err(self.stream.err(ErrorKind::CallerOrdering {
                tick,
                last: track.last_tick,
            }));
        }
        let delta = tick - track.last_tick;
        track.last_tick = tick;

        let (buf, len) = encode_varlen(delta);
        self.stream.write_all(&buf[..len])?;
        track.track_bytes += len as u32;

        if !track.status_written {
            track.status_written = true;
            self.stream
                .write_u8(u8::from(Status::NoteOn) | Channel::PERCUSSION.value())?;
            track.track_bytes += 1;
        }

        let scaled = (VELOCITY_MAX as f32 * velocity.clamp(0.0, 1.0)).round() as u8;
        self.stream.write_u8(key & 0x7F)?;
        self.stream.write_u8(scaled.min(VELOCITY_MAX))?;
        track.track_bytes += 2;
        Ok(())
    }

    /// Close the note track: final delta, end-of-track meta, and the length
    /// patch-back.
    ///
    /// After this the writer is logically closed; further note writes fail
    /// with [`ErrorKind::TrackNotOpen`].
    pub fn finish(&mut self, last_seconds: f64) -> CodecResult<()> {
        let track = match &mut self.track {
            Some(track) if !track.closed => track,
            _ => return Err(self.stream.err(ErrorKind::TrackNotOpen)),
        };

        let tick = (last_seconds / track.seconds_per_tick).round() as u32;
        if tick < track.last_tick {
            return Err(self.stream.err(ErrorKind::CallerOrdering {
                tick,
                last: track.last_tick,
            }));
        }
        let delta = tick - track.last_tick;
        track.last_tick = tick;

        let (buf, len) = encode_varlen(delta);
        self.stream.write_all(&buf[..len])?;
        self.stream
            .write_all(&[0xFF, MetaType::EndOfTrack.into(), 0])?;
        track.track_bytes += len as u32 + 3;

        self.stream.seek(track.length_field_at)?;
        self.stream.write_u32_be(track.track_bytes)?;
        track.closed = true;
        Ok(())
    }
}
