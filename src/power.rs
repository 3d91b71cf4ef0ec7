//! Power budget limiting.
//!
//! Long strips can draw more current than the supply provides. The limiter
//! estimates the draw of an already-encoded frame and, when it exceeds the
//! budget, scales every color byte down by the same ratio so the hue of each
//! LED is preserved.
//!
//! It must run after encoding: the bytes it scales are already reduced to
//! the chosen bit depth, scaling earlier would apply the multiplier twice.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Current draw configuration, in amperes.
///
/// `amp_per_led` is the draw of one channel at full duty (byte 255).
/// An `amp_budget` of zero disables limiting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerBudget {
    pub amp_per_led: f32,
    pub amp_budget: f32,
}

impl Default for PowerBudget {
    fn default() -> Self {
        Self {
            amp_per_led: 0.02,
            amp_budget: 9.0,
        }
    }
}

impl PowerBudget {
    pub fn new(amp_per_led: f32, amp_budget: f32) -> Self {
        Self {
            amp_per_led,
            amp_budget,
        }
    }

    /// A budget that never limits.
    pub fn disabled() -> Self {
        Self {
            amp_per_led: 0.0,
            amp_budget: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.amp_budget > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("amp_per_led", self.amp_per_led),
            ("amp_budget", self.amp_budget),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Estimated current of encoded LED records (4 bytes each, brightness
    /// byte first).
    pub fn estimate(&self, records: &[u8]) -> f32 {
        let duty: u64 = records
            .chunks_exact(4)
            .map(|rec| u64::from(rec[1]) + u64::from(rec[2]) + u64::from(rec[3]))
            .sum();
        duty as f32 * self.amp_per_led / 255.0
    }

    /// Scale the color bytes of `records` so the estimate fits the budget.
    ///
    /// Returns the applied ratio, or `None` when nothing was changed.
    pub fn limit(&self, records: &mut [u8]) -> Option<f32> {
        if !self.is_enabled() {
            return None;
        }
        let total = self.estimate(records);
        if total <= self.amp_budget {
            return None;
        }
        let ratio = self.amp_budget / total;
        for rec in records.chunks_exact_mut(4) {
            for channel in &mut rec[1..] {
                *channel = float_to_u8(f32::from(*channel) * ratio);
            }
        }
        Some(ratio)
    }
}

/// Round a float to the nearest byte, clamped to `[0, 255]`.
pub fn float_to_u8(x: f32) -> u8 {
    if x.is_nan() || x <= 0.0 {
        0
    } else if x >= 255.0 {
        255
    } else {
        (x + 0.5) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn white_records(n: usize) -> Vec<u8> {
        [0xFF, 255, 255, 255].repeat(n)
    }

    #[rstest]
    #[case(-3.0, 0)]
    #[case(0.0, 0)]
    #[case(0.49, 0)]
    #[case(0.5, 1)]
    #[case(127.5, 128)]
    #[case(254.6, 255)]
    #[case(300.0, 255)]
    #[case(f32::NAN, 0)]
    fn float_to_u8_rounds_and_clamps(#[case] x: f32, #[case] expected: u8) {
        assert_eq!(float_to_u8(x), expected);
    }

    #[test]
    fn estimate_ignores_brightness_byte() {
        let budget = PowerBudget::new(0.02, 1.0);
        let records = [0xFF, 0, 0, 0, 0xE1, 255, 0, 0];
        assert!((budget.estimate(&records) - 0.02).abs() < 1e-6);
    }

    #[test]
    fn zero_budget_is_a_no_op() {
        let budget = PowerBudget::new(0.02, 0.0);
        let mut records = white_records(300);
        let before = records.clone();
        assert_eq!(budget.limit(&mut records), None);
        assert_eq!(records, before);
    }

    #[test]
    fn frame_under_budget_is_untouched() {
        let budget = PowerBudget::new(0.02, 9.0);
        let mut records = white_records(100);
        let before = records.clone();
        assert_eq!(budget.limit(&mut records), None);
        assert_eq!(records, before);
    }

    #[test]
    fn over_budget_frame_is_scaled_down() {
        let budget = PowerBudget::new(0.02, 3.0);
        let mut records = white_records(150);
        let ratio = budget.limit(&mut records).unwrap();
        assert!((ratio - 3.0 / 9.0).abs() < 1e-4);
        for rec in records.chunks_exact(4) {
            assert_eq!(rec, [0xFF, 85, 85, 85]);
        }
        assert!(budget.estimate(&records) <= 3.0 + 1e-4);
    }

    #[test]
    fn limited_frame_respects_budget_within_rounding() {
        let budget = PowerBudget::new(0.05, 2.5);
        let mut records = Vec::new();
        for i in 0..120u32 {
            records.extend_from_slice(&[0xE4, (i * 7 % 256) as u8, (i * 13 % 256) as u8, 200]);
        }
        assert!(budget.estimate(&records) > budget.amp_budget);
        budget.limit(&mut records);

        // Each channel may round up by half a step.
        let leds = records.len() / 4;
        let tolerance = leds as f32 * 3.0 * 0.5 * budget.amp_per_led / 255.0;
        assert!(budget.estimate(&records) <= budget.amp_budget + tolerance);
        assert!(records.chunks_exact(4).all(|rec| rec[0] == 0xE4));
    }

    #[rstest]
    #[case(PowerBudget::new(-0.1, 1.0))]
    #[case(PowerBudget::new(0.02, f32::INFINITY))]
    #[case(PowerBudget::new(f32::NAN, 1.0))]
    fn invalid_budgets_are_rejected(#[case] budget: PowerBudget) {
        assert!(budget.validate().is_err());
    }

    #[test]
    fn disabled_budget_is_valid() {
        assert!(PowerBudget::disabled().validate().is_ok());
        assert!(!PowerBudget::disabled().is_enabled());
    }
}
