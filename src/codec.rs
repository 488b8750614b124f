#![doc = r#"
The consumer-facing codec surface.

[`SmfReader`] and [`SmfWriter`](crate::write::SmfWriter) are the generic
implementations over any seekable source or sink; [`SmfCodec`] binds them to
a file path behind the `open`-then-[`valid`](SmfCodec::valid) contract, so a
caller probing several candidate input formats can try a path and fall back
without handling errors. [`EventSource`] is the capability seam shared with
readers of other timed-event formats.
"#]

use crate::error::{CodecError, CodecResult, ErrorKind};
use crate::event::{Channel, VELOCITY_MAX};
use crate::header::Header;
use crate::scan::TrackScanner;
use crate::stream::ByteStream;
use crate::timing::Tempo;
use crate::write::SmfWriter;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// Whether a codec decodes an existing file or produces a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Decode note-on events from an existing file.
    Read,
    /// Create a file and encode note-on events into it.
    Write,
}

/// One note-on event in wall-clock terms.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedNote {
    /// Seconds from the start of the track.
    pub seconds: f64,
    /// The key number, 0..=127.
    pub key: u8,
    /// Velocity as a fraction of the 7-bit range, in `[0, 1]`.
    pub velocity: f32,
}

/// Anything that produces an ordered sequence of timed note events.
///
/// Implemented by the MIDI codec here and by text-format event readers
/// elsewhere; an orchestrating tool picks whichever implementation reports
/// itself [`valid`](EventSource::valid) for a given input.
pub trait EventSource {
    /// False when the underlying input could not be opened or is not a
    /// well-formed instance of this source's format.
    fn valid(&self) -> bool;

    /// The next event in ascending timestamp order, or `None` when the
    /// source is exhausted (including after a malformed event).
    fn next_event(&mut self) -> Option<TimedNote>;
}

struct ReaderState<S> {
    scanner: TrackScanner<S>,
    tempo: Tempo,
    seconds_per_tick: f64,
    exhausted: bool,
}

#[doc = r#"
Decodes note-on events from a Standard MIDI File source.

Opening performs the initial scan: header validation and the tempo lookup in
track 0. A source that fails that scan leaves the reader constructed but
invalid; [`valid`](SmfReader::valid) must be checked before use, and
[`last_error`](SmfReader::last_error) tells why a scan stopped.
"#]
pub struct SmfReader<S> {
    state: Option<ReaderState<S>>,
    last_error: Option<CodecError>,
    channel: Channel,
}

impl<S: Read + Seek> SmfReader<S> {
    /// Open a source and perform the initial header and tempo scan.
    pub fn new(source: S) -> Self {
        match Self::open_scan(source) {
            Ok(state) => Self {
                state: Some(state),
                last_error: None,
                channel: Channel::PERCUSSION,
            },
            Err(e) => {
                tracing::warn!(error = %e, "source is not a readable midi file");
                Self {
                    state: None,
                    last_error: Some(e),
                    channel: Channel::PERCUSSION,
                }
            }
        }
    }

    fn open_scan(source: S) -> CodecResult<ReaderState<S>> {
        let mut stream =
            ByteStream::reading(source).map_err(|e| CodecError::new(0, ErrorKind::Io(e)))?;
        let header = Header::read(&mut stream)?;
        let mut scanner = TrackScanner::new(stream, header);
        let tempo = scanner
            .first_tempo()?
            .ok_or_else(|| scanner.err(ErrorKind::MissingTempo))?;
        let seconds_per_tick = tempo.seconds_per_tick(header.division());
        Ok(ReaderState {
            scanner,
            tempo,
            seconds_per_tick,
            exhausted: false,
        })
    }

    /// True if the initial scan succeeded.
    pub fn valid(&self) -> bool {
        self.state.is_some()
    }

    /// The error that invalidated the reader or stopped the last scan.
    pub fn last_error(&self) -> Option<&CodecError> {
        self.last_error.as_ref()
    }

    /// Select which channel's note-on events [`next_event`](Self::next_event)
    /// surfaces. Defaults to [`Channel::PERCUSSION`].
    pub fn channel(&mut self, channel: u8) {
        self.channel = Channel::new(channel);
    }

    /// The validated header, if the reader is valid.
    pub fn header(&self) -> Option<&Header> {
        self.state.as_ref().map(|s| s.scanner.header())
    }

    /// The first tempo of track 0, in microseconds per quarter note.
    pub fn tempo_micros(&self) -> Option<u32> {
        self.state.as_ref().map(|s| s.tempo.micros_per_quarter())
    }

    /// Ticks per quarter note from the header.
    pub fn division(&self) -> Option<u16> {
        self.header().map(|h| h.division())
    }

    /// Wall-clock seconds per tick, derived from tempo and division.
    pub fn seconds_per_tick(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.seconds_per_tick)
    }

    /// The next note-on on the selected channel, in ascending timestamp
    /// order, or `None` when the file is exhausted.
    ///
    /// A malformed event aborts scanning for good: the error is recorded in
    /// [`last_error`](Self::last_error) and the reader reports exhaustion,
    /// so callers can fall back to another input format.
    pub fn next_event(&mut self) -> Option<TimedNote> {
        let state = self.state.as_mut()?;
        if state.exhausted {
            return None;
        }
        match state.scanner.next_note_on(self.channel) {
            Ok(Some(note)) => Some(TimedNote {
                seconds: note.tick as f64 * state.seconds_per_tick,
                key: note.key,
                velocity: note.velocity as f32 / VELOCITY_MAX as f32,
            }),
            Ok(None) => {
                state.exhausted = true;
                None
            }
            Err(e) => {
                state.exhausted = true;
                tracing::warn!(error = %e, "scan aborted, treating file as exhausted");
                self.last_error = Some(e);
                None
            }
        }
    }

    /// Iterate the remaining events.
    pub fn events(&mut self) -> Events<'_, S> {
        Events(self)
    }
}

impl<S: Read + Seek> EventSource for SmfReader<S> {
    fn valid(&self) -> bool {
        SmfReader::valid(self)
    }
    fn next_event(&mut self) -> Option<TimedNote> {
        SmfReader::next_event(self)
    }
}

/// Iterator over the remaining events of an [`SmfReader`].
pub struct Events<'a, S>(&'a mut SmfReader<S>);

impl<S: Read + Seek> Iterator for Events<'_, S> {
    type Item = TimedNote;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_event()
    }
}

enum Inner {
    Read(SmfReader<File>),
    Write(SmfWriter<File>),
    /// The file itself could not be opened or created.
    Unopened,
}

#[doc = r#"
A file-backed MIDI codec in either read or write mode.

```no_run
use smfio::prelude::*;

let mut codec = SmfCodec::open("take.mid", Mode::Read);
if codec.valid() {
    while let Some(note) = codec.next_event() {
        println!("{:.3}s key {} velocity {:.2}", note.seconds, note.key, note.velocity);
    }
}
```
"#]
pub struct SmfCodec {
    inner: Inner,
}

impl SmfCodec {
    /// Open `path` for decoding, or create it for encoding.
    ///
    /// Never fails outright: open errors and malformed files are reported
    /// through [`valid`](Self::valid).
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Self {
        let path = path.as_ref();
        let inner = match mode {
            Mode::Read => match File::open(path) {
                Ok(file) => Inner::Read(SmfReader::new(file)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "open failed");
                    Inner::Unopened
                }
            },
            Mode::Write => match File::create(path) {
                Ok(file) => Inner::Write(SmfWriter::new(file)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "create failed");
                    Inner::Unopened
                }
            },
        };
        Self { inner }
    }

    /// True if the file opened and, in read mode, passed the initial scan.
    pub fn valid(&self) -> bool {
        match &self.inner {
            Inner::Read(reader) => reader.valid(),
            Inner::Write(_) => true,
            Inner::Unopened => false,
        }
    }

    /// Select the channel filter. Read mode only; ignored otherwise.
    pub fn channel(&mut self, channel: u8) {
        if let Inner::Read(reader) = &mut self.inner {
            reader.channel(channel);
        }
    }

    /// The next note-on event. Read mode only.
    pub fn next_event(&mut self) -> Option<TimedNote> {
        match &mut self.inner {
            Inner::Read(reader) => reader.next_event(),
            _ => None,
        }
    }

    /// Write the header and tempo track and open the note track. Write mode
    /// only; returns false on any failure.
    pub fn header_write(&mut self, division: u16, tempo_micros: u32) -> bool {
        match &mut self.inner {
            Inner::Write(writer) => log_write(writer.header_write(division, tempo_micros)),
            _ => false,
        }
    }

    /// Append one note-on event. Write mode only; returns false on any
    /// failure, including out-of-order timestamps.
    pub fn write_event(&mut self, seconds: f64, key: u8, velocity: f32) -> bool {
        match &mut self.inner {
            Inner::Write(writer) => log_write(writer.write_note(seconds, key, velocity)),
            _ => false,
        }
    }

    /// Close the note track and patch its length field. Write mode only.
    pub fn footer_write(&mut self, last_seconds: f64) -> bool {
        match &mut self.inner {
            Inner::Write(writer) => log_write(writer.finish(last_seconds)),
            _ => false,
        }
    }

    /// Tempo in microseconds per quarter note: the decoded tempo in read
    /// mode, the written tempo in write mode.
    pub fn tempo_micros(&self) -> Option<u32> {
        match &self.inner {
            Inner::Read(reader) => reader.tempo_micros(),
            Inner::Write(writer) => writer.tempo().map(|t| t.micros_per_quarter()),
            Inner::Unopened => None,
        }
    }

    /// Ticks per quarter note.
    pub fn division(&self) -> Option<u16> {
        match &self.inner {
            Inner::Read(reader) => reader.division(),
            Inner::Write(writer) => writer.division(),
            Inner::Unopened => None,
        }
    }
}

impl EventSource for SmfCodec {
    fn valid(&self) -> bool {
        SmfCodec::valid(self)
    }
    fn next_event(&mut self) -> Option<TimedNote> {
        SmfCodec::next_event(self)
    }
}

fn log_write(result: CodecResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "midi write failed");
            false
        }
    }
}
