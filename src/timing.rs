use core::fmt;

#[doc = r#"
Tempo, stored as microseconds per quarter note.

Together with the header division (ticks per quarter note), a tempo fixes the
wall-clock duration of one tick:

```rust
use smfio::timing::Tempo;

let tempo = Tempo::new(500_000); // 120 BPM
assert!((tempo.seconds_per_tick(480) - 0.0010417).abs() < 1e-6);
```
"#]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tempo(u32);

impl Tempo {
    /// Create a tempo from microseconds per quarter note.
    pub const fn new(micros_per_quarter: u32) -> Self {
        Self(micros_per_quarter)
    }

    /// Assemble a tempo from the 3 raw payload bytes of a set-tempo meta
    /// event, big-endian.
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32)
    }

    /// The 3-byte big-endian wire form.
    pub const fn to_bytes(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        ]
    }

    /// Microseconds per quarter note.
    pub const fn micros_per_quarter(self) -> u32 {
        self.0
    }

    /// Beats (quarter notes) per minute.
    pub fn beats_per_minute(self) -> f64 {
        60_000_000.0 / self.0 as f64
    }

    /// Seconds of wall-clock time per tick, for a given header division.
    pub fn seconds_per_tick(self, division: u16) -> f64 {
        self.0 as f64 / 1_000_000.0 / division as f64
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us/qn ({:.1} BPM)", self.0, self.beats_per_minute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn byte_assembly_is_big_endian() {
        let tempo = Tempo::from_bytes([0x07, 0xA1, 0x20]);
        assert_eq!(tempo.micros_per_quarter(), 500_000);
        assert_eq!(tempo.to_bytes(), [0x07, 0xA1, 0x20]);
    }

    #[test]
    fn bpm_from_micros_per_quarter() {
        assert_eq!(Tempo::new(500_000).beats_per_minute(), 120.0);
        assert_eq!(Tempo::new(1_000_000).beats_per_minute(), 60.0);
    }

    #[test]
    fn tick_period_at_division_480() {
        let spt = Tempo::new(500_000).seconds_per_tick(480);
        assert!((spt - 0.00104166).abs() < 1e-7);
        // A note at tick 480 lands half a second in.
        assert!((480.0 * spt - 0.5).abs() < 1e-9);
    }
}
