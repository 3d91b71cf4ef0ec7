//! Strip driver: from a frame of colors to bytes on the bus.
//!
//! Per frame, for every LED: lightness table lookup (color correction +
//! perceptual remap), then adaptive encoding into the wire buffer. The power
//! limiter then runs over the whole buffer and the result goes to the
//! transport in one write.
//!
//! The driver is synchronous and does not throttle itself; callers tick it
//! no faster than [`Strip::min_delay`].
//!
//! ## Rust concepts
//! - A trait (`Strip`) so the render thread can drive real hardware or a
//!   terminal preview through the same interface
//! - A two-state enum instead of a bare `bool` for the lifecycle
//! - Reusing one `Vec<u8>` across frames instead of allocating per frame

use crate::Color;
use crate::encode::encode;
use crate::error::{Error, Result};
use crate::frame::WireBuffer;
use crate::power::PowerBudget;
use crate::remap::{ColorCorrection, LightnessTable};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// The APA102 datasheet caps the refresh rate at 400 Hz.
pub const MAX_REFRESH_HZ: u32 = 400;

pub const DEFAULT_LED_COUNT: usize = 150;

// ── Strip trait ────────────────────────────────────────────────────

/// Something a frame of colors can be pushed to.
pub trait Strip {
    /// Display one frame. `pixels.len()` must equal [`Strip::led_count`].
    fn write(&mut self, pixels: &[Color]) -> Result<()>;

    /// Minimum interval between two writes.
    fn min_delay(&self) -> Duration;

    fn close(&mut self) -> Result<()>;

    fn led_count(&self) -> usize;

    /// Replace the power budget for subsequent frames. Strips without a
    /// power model ignore it.
    fn set_power_budget(&mut self, _budget: PowerBudget) {}
}

// ── Configuration ──────────────────────────────────────────────────

/// Everything the driver needs besides the bus.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Number of LEDs. Frames must have exactly this many colors.
    #[serde(default = "default_led_count")]
    pub led_count: usize,
    #[serde(default)]
    pub power: PowerBudget,
    #[serde(default)]
    pub correction: ColorCorrection,
}

fn default_led_count() -> usize {
    DEFAULT_LED_COUNT
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            led_count: DEFAULT_LED_COUNT,
            power: PowerBudget::default(),
            correction: ColorCorrection::default(),
        }
    }
}

impl DriverConfig {
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.power.validate()?;
        self.correction.validate()
    }
}

// ── Driver ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Open,
    Closed,
}

pub struct StripDriver<H> {
    transport: Transport<H>,
    power: PowerBudget,
    table: LightnessTable,
    buf: WireBuffer,
    state: DriverState,
}

impl<H: Write> StripDriver<H> {
    pub fn new(transport: Transport<H>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "APA102 strip: {} LEDs at {} Hz, power budget {}",
            config.led_count,
            transport.speed_hz(),
            describe_budget(&config.power)
        );
        Ok(Self {
            transport,
            power: config.power,
            table: LightnessTable::new(&config.correction),
            buf: WireBuffer::new(config.led_count),
            state: DriverState::Open,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn power_budget(&self) -> PowerBudget {
        self.power
    }

    /// The bytes of the last frame, exactly as they were sent.
    pub fn wire_buffer(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Change the number of LEDs. The wire buffer is only rebuilt when the
    /// count actually changes.
    pub fn set_led_count(&mut self, led_count: usize) {
        if self.buf.resize(led_count) {
            tracing::debug!("Wire buffer resized for {} LEDs", led_count);
        }
    }

    /// Encode `frame` and send it.
    ///
    /// Transport errors are returned unchanged; nothing is retried; the next
    /// frame is simply a fresh full write.
    pub fn write(&mut self, frame: &[Color]) -> Result<()> {
        if self.state == DriverState::Closed {
            return Err(Error::Closed);
        }
        let expected = self.buf.led_count();
        if frame.len() != expected {
            return Err(Error::FrameLength {
                expected,
                actual: frame.len(),
            });
        }

        for (i, &c) in frame.iter().enumerate() {
            let (r, g, b) = self.table.lookup(c);
            self.buf.set_record(i, encode(r, g, b));
        }

        if let Some(ratio) = self.power.limit(self.buf.records_mut()) {
            tracing::debug!("Frame over power budget, scaled by {:.3}", ratio);
        }

        self.transport.write(self.buf.as_bytes())?;
        tracing::trace!("Wrote {} bytes for {} LEDs", self.buf.as_bytes().len(), expected);
        Ok(())
    }

    /// 1/400 s: the fastest refresh the LEDs accept.
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(1) / MAX_REFRESH_HZ
    }

    /// Close the bus. Any later `write` or `close` fails with
    /// [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.state == DriverState::Closed {
            return Err(Error::Closed);
        }
        self.state = DriverState::Closed;
        tracing::info!("Closing APA102 strip");
        self.transport.close()
    }
}

impl<H: Write> Strip for StripDriver<H> {
    fn write(&mut self, pixels: &[Color]) -> Result<()> {
        StripDriver::write(self, pixels)
    }

    fn min_delay(&self) -> Duration {
        StripDriver::min_delay(self)
    }

    fn close(&mut self) -> Result<()> {
        StripDriver::close(self)
    }

    fn led_count(&self) -> usize {
        self.buf.led_count()
    }

    fn set_power_budget(&mut self, budget: PowerBudget) {
        tracing::info!("Power budget set to {}", describe_budget(&budget));
        self.power = budget;
    }
}

fn describe_budget(budget: &PowerBudget) -> String {
    if budget.is_enabled() {
        format!("{:.2} A ({:.3} A per channel)", budget.amp_budget, budget.amp_per_led)
    } else {
        "disabled".to_string()
    }
}
