//! Adaptive bit-depth encoding of one LED.
//!
//! Each APA102 LED frame is `0b111xxxxx` (5-bit global brightness) followed
//! by blue, green and red. The global brightness runs on a much slower PWM
//! than the color channels, so it is only used when the channels alone
//! cannot represent the requested lightness: the smallest multiplier that
//! fits wins, which keeps the finest per-channel resolution.

use crate::remap::MAX_LIGHTNESS;

/// Global brightness multipliers tried in order. 31 is full brightness.
pub const MULTIPLIERS: [u32; 4] = [1, 2, 4, 31];

/// High marker bits of the brightness byte.
pub const BRIGHTNESS_MARKER: u8 = 0xE0;

/// The 4 bytes sent for one LED.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodedRecord {
    pub brightness: u8,
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl EncodedRecord {
    pub fn to_bytes(self) -> [u8; 4] {
        [self.brightness, self.b, self.g, self.r]
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            brightness: bytes[0],
            b: bytes[1],
            g: bytes[2],
            r: bytes[3],
        }
    }

    /// The global brightness multiplier in the low 5 bits.
    #[cfg(test)]
    pub fn multiplier(self) -> u32 {
        u32::from(self.brightness & 0x1F)
    }

    /// Lightness each channel decodes back to, as `(r, g, b)`.
    #[cfg(test)]
    pub fn lightness(self) -> (u32, u32, u32) {
        let m = self.multiplier();
        (
            u32::from(self.r) * m,
            u32::from(self.g) * m,
            u32::from(self.b) * m,
        )
    }
}

/// Encode three lightness values (each in `[0, MAX_LIGHTNESS]`) into the
/// APA102 record using the smallest multiplier that keeps every channel in
/// 8 bits.
///
/// Division rounds half up with integer math (`(l + m/2) / m`) so the
/// result is identical on every platform.
pub fn encode(r: u32, g: u32, b: u32) -> EncodedRecord {
    debug_assert!(r <= MAX_LIGHTNESS && g <= MAX_LIGHTNESS && b <= MAX_LIGHTNESS);
    for m in MULTIPLIERS {
        let half = m / 2;
        let (sr, sg, sb) = ((r + half) / m, (g + half) / m, (b + half) / m);
        if sr <= 255 && sg <= 255 && sb <= 255 {
            return record(m, sr, sg, sb);
        }
    }
    // Unreachable for in-range input; saturate rather than wrap otherwise.
    let m = 31;
    let scale = |l: u32| ((l + m / 2) / m).min(255);
    record(m, scale(r), scale(g), scale(b))
}

fn record(m: u32, r: u32, g: u32, b: u32) -> EncodedRecord {
    EncodedRecord {
        brightness: BRIGHTNESS_MARKER | m as u8,
        b: b as u8,
        g: g as u8,
        r: r as u8,
    }
}
