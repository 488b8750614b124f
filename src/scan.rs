#![doc = r#"
Sequential note-on scanning across the tracks of an open file.

The scanner owns the byte stream for the codec's read side. It walks events
one at a time, maintaining the per-track cursor (cumulative ticks and the
running status byte) and crossing track boundaries by chunk framing. Note
scanning starts at track 1; in a format 1 file, track 0 is the tempo track
and is consulted separately through [`TrackScanner::first_tempo`].
"#]

use crate::error::{CodecResult, ErrorKind};
use crate::event::{Channel, EventKind, MetaEvent, TrackEvent};
use crate::header::{self, Header};
use crate::stream::ByteStream;
use crate::timing::Tempo;
use std::io::{Read, Seek};

/// Where the scanner is in its walk over the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    /// About to position the stream at the start of the given track.
    Seeking(u16),
    /// Decoding events inside the current track.
    Scanning,
    /// An end-of-track meta was just consumed.
    EndOfTrack,
    /// All tracks exhausted. Terminal.
    EndOfFile,
}

/// A note-on event located by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOn {
    /// Absolute time within the track, in ticks. Wider than a single delta:
    /// deltas legally sum past 32 bits on a long track.
    pub tick: u64,
    /// The key number.
    pub key: u8,
    /// The strike velocity.
    pub velocity: u8,
}

#[doc = r#"
Iterates decoded events of one track at a time, surfacing note-ons.
"#]
pub struct TrackScanner<S> {
    stream: ByteStream<S>,
    header: Header,
    phase: ScanPhase,
    track: u16,
    ticks: u64,
    running_status: Option<u8>,
}

impl<S: Read + Seek> TrackScanner<S> {
    /// Create a scanner positioned before the first note track.
    pub fn new(stream: ByteStream<S>, header: Header) -> Self {
        Self {
            stream,
            header,
            phase: ScanPhase::Seeking(1),
            track: 0,
            ticks: 0,
            running_status: None,
        }
    }

    /// The header the scanner was opened with.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Scan track 0 for its first set-tempo meta event.
    ///
    /// This is an independent pass over the tempo track; it does not touch
    /// the note-scanning cursor. Returns `Ok(None)` when track 0 ends
    /// without a tempo.
    pub fn first_tempo(&mut self) -> CodecResult<Option<Tempo>> {
        header::seek_to_track(&mut self.stream, 0)?;
        let mut running = None;
        loop {
            let event = TrackEvent::read(&mut self.stream, &mut running)?;
            match event.kind {
                EventKind::Meta(MetaEvent::SetTempo(tempo)) => return Ok(Some(tempo)),
                EventKind::Meta(MetaEvent::EndOfTrack) => return Ok(None),
                _ => {}
            }
        }
    }

    /// Advance to the next note-on on `channel`.
    ///
    /// Every decoded event's delta is added to the cumulative tick count,
    /// whether or not it matches. Crossing into the next track resets the
    /// tick count and the running status. Returns `Ok(None)` once every
    /// track is exhausted; decode errors propagate to the caller.
    pub fn next_note_on(&mut self, channel: Channel) -> CodecResult<Option<NoteOn>> {
        loop {
            match self.phase {
                ScanPhase::EndOfFile => return Ok(None),
                ScanPhase::Seeking(n) => {
                    if n >= self.header.tracks() {
                        self.phase = ScanPhase::EndOfFile;
                        return Ok(None);
                    }
                    header::seek_to_track(&mut self.stream, n)?;
                    self.track = n;
                    self.ticks = 0;
                    self.running_status = None;
                    self.phase = ScanPhase::Scanning;
                    tracing::debug!(track = n, "scanning track");
                }
                ScanPhase::EndOfTrack => {
                    self.phase = ScanPhase::Seeking(self.track + 1);
                }
                ScanPhase::Scanning => {
                    let event = TrackEvent::read(&mut self.stream, &mut self.running_status)?;
                    self.ticks += event.delta as u64;
                    if event.is_end_of_track() {
                        self.phase = ScanPhase::EndOfTrack;
                    } else if let EventKind::NoteOn {
                        channel: ch,
                        key,
                        velocity,
                    } = event.kind
                    {
                        if ch == channel {
                            return Ok(Some(NoteOn {
                                tick: self.ticks,
                                key,
                                velocity,
                            }));
                        }
                    }
                }
            }
        }
    }
}

impl<S> TrackScanner<S> {
    pub(crate) fn err(&self, kind: ErrorKind) -> crate::error::CodecError {
        self.stream.err(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn track(events: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(events.len() as u32).to_be_bytes());
        bytes.extend_from_slice(events);
        bytes
    }

    fn file(tracks: &[Vec<u8>], division: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&division.to_be_bytes());
        for track in tracks {
            bytes.extend_from_slice(track);
        }
        bytes
    }

    fn scanner_over(bytes: Vec<u8>) -> TrackScanner<Cursor<Vec<u8>>> {
        let mut stream = ByteStream::reading(Cursor::new(bytes)).unwrap();
        let header = Header::read(&mut stream).unwrap();
        TrackScanner::new(stream, header)
    }

    const END: [u8; 4] = [0x00, 0xFF, 0x2F, 0x00];
    const TEMPO_120: [u8; 7] = [0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20];

    #[test]
    fn finds_first_tempo_in_track_zero() {
        let tempo_track = track(&[&TEMPO_120[..], &END[..]].concat());
        let note_track = track(&END);
        let mut scanner = scanner_over(file(&[tempo_track, note_track], 480));
        let tempo = scanner.first_tempo().unwrap().unwrap();
        assert_eq!(tempo, Tempo::new(500_000));
    }

    #[test]
    fn tempo_track_without_tempo_yields_none() {
        let mut scanner = scanner_over(file(&[track(&END), track(&END)], 480));
        assert_eq!(scanner.first_tempo().unwrap(), None);
    }

    #[test]
    fn accumulates_deltas_across_all_events() {
        // A controller event's delta must still advance the clock.
        let events: Vec<u8> = [
            &[0x10, 0xB9, 0x07, 0x64][..],    // +0x10 controller, channel 9
            &[0x20, 0x99, 0x24, 0x40][..],    // +0x20 note on
            &END[..],
        ]
        .concat();
        let bytes = file(&[track(&END), track(&events)], 480);
        let mut scanner = scanner_over(bytes);
        let note = scanner.next_note_on(Channel::PERCUSSION).unwrap().unwrap();
        assert_eq!(note.tick, 0x30);
        assert_eq!(note.key, 0x24);
        assert_eq!(note.velocity, 0x40);
    }

    #[test]
    fn tick_accumulation_survives_past_32_bits() {
        // 17 maximal deltas sum beyond u32; the clock must keep counting.
        const MAX_DELTA: [u8; 4] = [0xFF, 0xFF, 0xFF, 0x7F];
        let mut events = Vec::new();
        for _ in 0..17 {
            events.extend_from_slice(&MAX_DELTA);
            events.extend_from_slice(&[0xB9, 0x07, 0x64]);
        }
        events.extend_from_slice(&[0x00, 0x99, 0x24, 0x40]);
        events.extend_from_slice(&END);
        let bytes = file(&[track(&END), track(&events)], 480);
        let mut scanner = scanner_over(bytes);
        let note = scanner.next_note_on(Channel::PERCUSSION).unwrap().unwrap();
        assert_eq!(note.tick, 17 * ((1u64 << 28) - 1));
        assert!(note.tick > u32::MAX as u64);
    }

    #[test]
    fn filters_by_channel() {
        let events: Vec<u8> = [
            &[0x00, 0x90, 0x30, 0x40][..], // channel 0
            &[0x00, 0x99, 0x31, 0x41][..], // channel 9
            &[0x00, 0x90, 0x32, 0x42][..], // channel 0
            &END[..],
        ]
        .concat();
        let bytes = file(&[track(&END), track(&events)], 480);

        let mut scanner = scanner_over(bytes.clone());
        let note = scanner.next_note_on(Channel::PERCUSSION).unwrap().unwrap();
        assert_eq!(note.key, 0x31);
        assert_eq!(scanner.next_note_on(Channel::PERCUSSION).unwrap(), None);

        let mut scanner = scanner_over(bytes);
        let first = scanner.next_note_on(Channel::new(0)).unwrap().unwrap();
        let second = scanner.next_note_on(Channel::new(0)).unwrap().unwrap();
        assert_eq!((first.key, second.key), (0x30, 0x32));
    }

    #[test]
    fn crossing_tracks_resets_ticks_and_running_status() {
        let first: Vec<u8> = [&[0x60, 0x99, 0x24, 0x40][..], &END[..]].concat();
        let second: Vec<u8> = [&[0x30, 0x99, 0x26, 0x50][..], &END[..]].concat();
        let bytes = file(&[track(&END), track(&first), track(&second)], 480);
        let mut scanner = scanner_over(bytes);

        let a = scanner.next_note_on(Channel::PERCUSSION).unwrap().unwrap();
        let b = scanner.next_note_on(Channel::PERCUSSION).unwrap().unwrap();
        assert_eq!(a.tick, 0x60);
        // Tick count restarted at the track boundary.
        assert_eq!(b.tick, 0x30);
        assert_eq!(scanner.next_note_on(Channel::PERCUSSION).unwrap(), None);
    }

    #[test]
    fn exhaustion_is_terminal() {
        let mut scanner = scanner_over(file(&[track(&END), track(&END)], 480));
        assert_eq!(scanner.next_note_on(Channel::PERCUSSION).unwrap(), None);
        assert_eq!(scanner.next_note_on(Channel::PERCUSSION).unwrap(), None);
    }

    #[test]
    fn malformed_event_aborts_the_scan() {
        let events: Vec<u8> = [&[0x00, 0xFF, 0x42, 0x00][..], &END[..]].concat();
        let bytes = file(&[track(&END), track(&events)], 480);
        let mut scanner = scanner_over(bytes);
        let err = scanner.next_note_on(Channel::PERCUSSION).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownMetaType(0x42)));
    }
}
