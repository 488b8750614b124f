#![doc = r#"
Streaming Standard MIDI File codec.

`smfio` decodes note-on events out of multi-track MIDI files as
`(seconds, key, velocity)` tuples and encodes such tuples back into a
playable two-track file, handling the binary plumbing in between:
variable-length integers, running-status compression, meta-event dispatch,
chunk framing and the tick-to-seconds conversion derived from the tempo
track.

# Example

Encode a pair of notes and read them back:

```rust
use smfio::prelude::*;
use std::io::Cursor;

let mut writer = SmfWriter::new(Cursor::new(Vec::new()));
writer.header_write(480, 500_000)?; // division 480, 120 BPM
writer.write_note(0.0, 36, 1.0)?;
writer.write_note(0.5, 38, 0.5)?;
writer.finish(1.0)?;
let bytes = writer.into_inner().into_inner();

let mut reader = SmfReader::new(Cursor::new(bytes));
assert!(reader.valid());
let first = reader.next_event().unwrap();
assert_eq!(first.key, 36);
let second = reader.next_event().unwrap();
assert_eq!(second.key, 38);
assert!((second.seconds - 0.5).abs() < 1e-9);
assert_eq!(reader.next_event(), None);
# Ok::<(), smfio::error::CodecError>(())
```

File-backed use goes through [`SmfCodec`](codec::SmfCodec), whose
`open`-then-`valid` contract lets callers probe a path and fall back to
other formats without error plumbing.
"#]

pub mod codec;
pub mod error;
pub mod event;
pub mod header;
pub mod scan;
pub mod stream;
pub mod timing;
pub mod varlen;
pub mod write;

/// Commonly used types, re-exported.
pub mod prelude {
    pub use crate::codec::{EventSource, Mode, SmfCodec, SmfReader, TimedNote};
    pub use crate::error::{CodecError, CodecResult, ErrorKind};
    pub use crate::event::{Channel, EventKind, MetaEvent, MetaType, TrackEvent, VELOCITY_MAX};
    pub use crate::header::{Header, SUPPORTED_FORMAT};
    pub use crate::timing::Tempo;
    pub use crate::write::SmfWriter;
}
