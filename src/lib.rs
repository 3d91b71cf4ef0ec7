//! Driver for APA102 ("DotStar") LED strips on an SPI bus.
//!
//! A frame of colors goes through a fixed pipeline before it reaches the
//! wire:
//! - `remap`: 8-bit channel to perceptual 13-bit lightness, with optional
//!   per-channel color correction
//! - `encode`: lightness to an LED record with an adaptive brightness
//!   multiplier
//! - `power`: scale the whole frame down when it would draw too much current
//! - `frame`: the start frame, LED records and end filler in one buffer
//! - `transport`: a thread-safe, closable handle on the bus
//!
//! `driver` ties these together behind the `Strip` trait. The `render` and
//! `server` modules are used by the main binary (HTTP API server).

pub mod config;
pub mod driver;
pub mod encode;
pub mod error;
pub mod frame;
pub mod power;
pub mod remap;
pub mod render;
pub mod screen;
pub mod server;
#[cfg(test)]
mod testing;
pub mod transport;

pub use config::AppConfig;
pub use driver::{DriverConfig, DriverState, Strip, StripDriver};
pub use error::{Error, ErrorKind, Result};
pub use power::PowerBudget;
pub use remap::{ChannelCorrection, ColorCorrection};
pub use screen::Screen;
pub use transport::{Transport, open_spi};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// One LED's color in 8-bit sRGB-ish channels.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just three u8s).
/// `Default` is black, which is what a cleared strip shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    /// Useful for rainbow effects.
    ///
    /// # Rust concept: match expressions
    /// Rust's `match` is exhaustive, so the compiler makes us handle every sector.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),  // Red → Yellow
            1 => Self::new(falling, 255, 0), // Yellow → Green
            2 => Self::new(0, 255, rising),  // Green → Cyan
            3 => Self::new(0, falling, 255), // Cyan → Blue
            4 => Self::new(rising, 0, 255),  // Blue → Magenta
            5 => Self::new(255, 0, falling), // Magenta → Red
            _ => Self::new(255, 0, 0),
        }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Color> for [u8; 3] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b]
    }
}

// ── Signal handling ────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// We need to share the `running` flag between the main loop and the
/// signal handler. `Arc` (Atomic Reference Counting) lets multiple owners
/// share data. `AtomicBool` is a thread-safe boolean, so no mutex is needed
/// for a single flag.
pub fn setup_signal_handler() -> std::result::Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone(); // Clone the Arc, not the bool

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn color_new() {
        let c = Color::new(10, 20, 30);
        assert_eq!(c.r, 10);
        assert_eq!(c.g, 20);
        assert_eq!(c.b, 30);
    }

    #[test]
    fn default_color_is_black() {
        assert_eq!(Color::default(), Color::BLACK);
    }

    #[test]
    fn color_array_conversions() {
        let c = Color::from([1, 2, 3]);
        assert_eq!(c, Color::new(1, 2, 3));
        assert_eq!(<[u8; 3]>::from(c), [1, 2, 3]);
    }

    #[rstest]
    #[case(0, 255, 0, 0)] // Red
    #[case(60, 255, 255, 0)] // Yellow
    #[case(120, 0, 255, 0)] // Green
    #[case(180, 0, 255, 255)] // Cyan
    #[case(240, 0, 0, 255)] // Blue
    #[case(300, 255, 0, 255)] // Magenta
    fn test_color_from_hue_primary(#[case] hue: u16, #[case] r: u8, #[case] g: u8, #[case] b: u8) {
        let c = Color::from_hue(hue);
        assert_eq!(c, Color::new(r, g, b));
    }

    #[test]
    fn color_from_hue_wraps_at_360() {
        assert_eq!(Color::from_hue(0), Color::from_hue(360));
        assert_eq!(Color::from_hue(90), Color::from_hue(450));
    }

    #[rstest]
    #[case(100)]
    #[case(255)]
    fn apply_brightness_full_is_identity(#[case] brightness: u8) {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(brightness), c);
    }

    #[test]
    fn apply_brightness_0_is_black() {
        assert_eq!(Color::WHITE.apply_brightness(0), Color::BLACK);
    }

    #[test]
    fn apply_brightness_50_halves() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.apply_brightness(50), Color::new(100, 50, 25));
    }

    #[test]
    fn running_flag_reads_through() {
        let flag = AtomicBool::new(true);
        assert!(is_running(&flag));
        flag.store(false, Ordering::SeqCst);
        assert!(!is_running(&flag));
    }
}
