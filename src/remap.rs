//! Perceptual intensity remapping.
//!
//! The eye's response to light is far from linear: one step out of 255 is
//! plainly visible near black and invisible near white. The APA102 offers a
//! 5-bit global brightness on top of the 8-bit channels, which together give
//! a usable range of 31*255 = 7905 (0x1EE1) steps. This module maps a linear
//! 16-bit intensity onto that 13-bit lightness scale.
//!
//! ## Rust concepts
//! - `const` items evaluated at compile time, floats included
//! - Lookup tables built once (`[u16; 256]`) so the hot path is indexing only
//! - `serde` derives on plain config structs

use crate::Color;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Below this linear intensity (30/255 of full scale) the curve is linear.
pub const LOW_CUT: u32 = 30 * 255;

/// Largest lightness value the remapper produces: 31 * 255.
pub const MAX_LIGHTNESS: u32 = 0x1EE1;

const MAX_IN: f32 = 65535.0;
const MAX_OUT: f32 = MAX_LIGHTNESS as f32;
const LOW_CUT_F: f32 = LOW_CUT as f32 / MAX_IN;
// Lightness of the linear segment at the cut, normalized to [0, 1].
const LOW_CUT_OUT: f32 = (LOW_CUT / 255) as f32 / MAX_OUT;
// Offset that makes the cubic segment pass through LOW_CUT_OUT at LOW_CUT_F.
const KLOW: f32 = (LOW_CUT_OUT - LOW_CUT_F * LOW_CUT_F * LOW_CUT_F) / (1.0 - LOW_CUT_OUT);

/// Convert a linear intensity in `[0, 0xFFFF]` to lightness in
/// `[0, MAX_LIGHTNESS]`.
///
/// Linear near black, cubic above [`LOW_CUT`]. Both segments meet at 30, so
/// the curve is continuous and monotonic. Inputs above 0xFFFF are clamped.
pub fn remap(linear: u32) -> u32 {
    let linear = linear.min(0xFFFF);
    if linear < LOW_CUT {
        return (linear as f32 / 255.0 + 0.4) as u32;
    }
    let y = linear as f32 / MAX_IN;
    let y = y * y * y;
    ((y + KLOW) / (1.0 + KLOW) * MAX_OUT + 0.4) as u32
}

// ── Color correction ───────────────────────────────────────────────

/// Gamma and ceiling for one color channel.
///
/// `max` is what should be treated as full intensity, useful when a channel
/// is much brighter than the others or when the strip does not need to run
/// at full power. The default is the identity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelCorrection {
    pub gamma: f32,
    pub max: f32,
}

impl Default for ChannelCorrection {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            max: 1.0,
        }
    }
}

impl ChannelCorrection {
    pub fn new(gamma: f32, max: f32) -> Self {
        Self { gamma, max }
    }

    pub fn is_identity(&self) -> bool {
        self.gamma == 1.0 && self.max == 1.0
    }

    /// Expand an 8-bit channel value to linear 16-bit intensity.
    pub fn linearize(&self, value: u8) -> u32 {
        if self.is_identity() {
            return u32::from(value) * 0x101;
        }
        let x = (f32::from(value) / 255.0 * self.max).powf(1.0 / self.gamma);
        (x * MAX_IN + 0.5).clamp(0.0, MAX_IN) as u32
    }

    fn validate(&self, channel: &str) -> Result<()> {
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{channel} gamma must be a positive number, got {}",
                self.gamma
            )));
        }
        if !self.max.is_finite() || !(0.0..=1.0).contains(&self.max) {
            return Err(Error::InvalidConfig(format!(
                "{channel} max must be within [0, 1], got {}",
                self.max
            )));
        }
        Ok(())
    }
}

/// Per-channel correction handed to the strip driver at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorCorrection {
    #[serde(default)]
    pub red: ChannelCorrection,
    #[serde(default)]
    pub green: ChannelCorrection,
    #[serde(default)]
    pub blue: ChannelCorrection,
}

impl ColorCorrection {
    pub fn validate(&self) -> Result<()> {
        self.red.validate("red")?;
        self.green.validate("green")?;
        self.blue.validate("blue")
    }
}

// ── Lightness table ────────────────────────────────────────────────

/// Precomputed correction + remap for every 8-bit value of each channel.
///
/// Built once per driver; a frame then costs three table lookups per LED.
#[derive(Clone)]
pub struct LightnessTable {
    red: [u16; 256],
    green: [u16; 256],
    blue: [u16; 256],
}

impl LightnessTable {
    pub fn new(correction: &ColorCorrection) -> Self {
        Self {
            red: build_channel(&correction.red),
            green: build_channel(&correction.green),
            blue: build_channel(&correction.blue),
        }
    }

    /// Lightness of each channel of `c`, as `(r, g, b)`.
    #[inline]
    pub fn lookup(&self, c: Color) -> (u32, u32, u32) {
        (
            u32::from(self.red[usize::from(c.r)]),
            u32::from(self.green[usize::from(c.g)]),
            u32::from(self.blue[usize::from(c.b)]),
        )
    }
}

fn build_channel(correction: &ChannelCorrection) -> [u16; 256] {
    let mut table = [0u16; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        // remap() never exceeds MAX_LIGHTNESS, which fits a u16.
        *slot = remap(correction.linearize(value as u8)) as u16;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(257, 1)]
    #[case(LOW_CUT - 1, 30)]
    #[case(LOW_CUT, 30)]
    #[case(64 * 0x101, 142)]
    #[case(128 * 0x101, 1015)]
    #[case(0xFFFF, MAX_LIGHTNESS)]
    fn remap_golden_values(#[case] linear: u32, #[case] expected: u32) {
        assert_eq!(remap(linear), expected);
    }

    #[test]
    fn remap_is_monotonic() {
        let mut prev = remap(0);
        for linear in 1..=0xFFFF {
            let v = remap(linear);
            assert!(v >= prev, "remap({linear}) = {v} < {prev}");
            prev = v;
        }
    }

    #[test]
    fn remap_is_continuous_at_cut() {
        let below = remap(LOW_CUT - 1);
        let at = remap(LOW_CUT);
        assert!(below.abs_diff(at) <= 1, "jump {below} -> {at}");
    }

    #[test]
    fn remap_stays_in_range() {
        for linear in (0..=0xFFFF).step_by(97) {
            assert!(remap(linear) <= MAX_LIGHTNESS);
        }
        assert_eq!(remap(0x1_0000), MAX_LIGHTNESS);
    }

    #[test]
    fn identity_correction_expands_to_16_bits() {
        let c = ChannelCorrection::default();
        assert!(c.is_identity());
        assert_eq!(c.linearize(0), 0);
        assert_eq!(c.linearize(1), 0x101);
        assert_eq!(c.linearize(255), 0xFFFF);
    }

    #[test]
    fn max_scales_full_intensity() {
        let c = ChannelCorrection::new(1.0, 0.5);
        assert_eq!(c.linearize(255), 32768);
        assert_eq!(c.linearize(0), 0);
    }

    #[test]
    fn gamma_darkens_midtones() {
        let c = ChannelCorrection::new(0.5, 1.0);
        assert!(c.linearize(128) < 128 * 0x101);
        assert_eq!(c.linearize(255), 0xFFFF);
    }

    #[rstest]
    #[case(ChannelCorrection::new(0.0, 1.0))]
    #[case(ChannelCorrection::new(-1.0, 1.0))]
    #[case(ChannelCorrection::new(f32::NAN, 1.0))]
    #[case(ChannelCorrection::new(1.0, 1.5))]
    #[case(ChannelCorrection::new(1.0, -0.1))]
    fn invalid_corrections_are_rejected(#[case] channel: ChannelCorrection) {
        let correction = ColorCorrection {
            green: channel,
            ..ColorCorrection::default()
        };
        let err = correction.validate().unwrap_err();
        assert!(err.to_string().contains("green"));
    }

    #[test]
    fn table_matches_direct_remap() {
        let table = LightnessTable::new(&ColorCorrection::default());
        for v in [0u8, 1, 29, 30, 31, 100, 254, 255] {
            let expected = remap(u32::from(v) * 0x101);
            assert_eq!(table.lookup(Color::new(v, v, v)), (expected, expected, expected));
        }
    }

    #[test]
    fn table_uses_per_channel_correction() {
        let correction = ColorCorrection {
            red: ChannelCorrection::new(1.0, 0.5),
            ..ColorCorrection::default()
        };
        let table = LightnessTable::new(&correction);
        let (r, g, b) = table.lookup(Color::new(255, 255, 255));
        assert!(r < g);
        assert_eq!(g, MAX_LIGHTNESS);
        assert_eq!(b, MAX_LIGHTNESS);
    }
}
