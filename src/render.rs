//! Render thread: owns the strip and processes commands via a channel.
//!
//! The strip is single-owner (its wire buffer and bus handle belong to one
//! driver), so every write happens on one dedicated thread. The async HTTP
//! server talks to it by sending `RenderCommand` values through an `mpsc`
//! channel and reads back a shared `DisplayStatus`.
//!
//! ## Rust concepts
//! - `std::sync::mpsc` channels for thread communication
//! - `Box<dyn Strip + Send>`: a trait object moved into the thread
//! - `Arc<Mutex<T>>` for shared mutable state
//! - `Instant` arithmetic to respect the strip's minimum refresh interval

use crate::Color;
use crate::driver::Strip;
use crate::power::PowerBudget;
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent from the HTTP server to the render thread.
#[derive(Debug)]
pub enum RenderCommand {
    /// Light every LED with one color
    ShowColor(Color),
    /// Display a raw RGB frame (led_count*3 bytes)
    ShowFrame(Vec<u8>),
    /// Turn every LED off
    Clear,
    /// Replace the power budget and redraw the current frame with it
    SetPowerBudget(PowerBudget),
    /// Blank and close the strip, then stop. Other senders may still be alive.
    Shutdown,
}

// ── Status ───────────────────────────────────────────────────────────

/// What the strip is currently showing.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Idle,
    SolidColor,
    Frame,
    Closed,
}

/// Shared status that the HTTP server reads to report current state.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DisplayStatus {
    /// Current display state
    pub state: DisplayState,
    /// Number of LEDs on the strip
    pub led_count: usize,
    /// Color shown when the state is `solid_color`
    #[schema(value_type = Option<Vec<u8>>, example = "[255, 0, 0]")]
    pub color: Option<[u8; 3]>,
    /// Frames successfully written to the strip
    pub frames_written: u64,
    /// Frames the strip failed to write
    pub write_errors: u64,
    /// Most recent write error, if any
    pub last_error: Option<String>,
    /// Current draw of one channel at full duty, in amperes
    pub amp_per_led: f32,
    /// Strip-wide current ceiling in amperes (0 = unlimited)
    pub amp_budget: f32,
    /// Server version
    pub version: String,
}

impl DisplayStatus {
    pub fn new(led_count: usize, power: PowerBudget) -> Self {
        Self {
            state: DisplayState::Idle,
            led_count,
            color: None,
            frames_written: 0,
            write_errors: 0,
            last_error: None,
            amp_per_led: power.amp_per_led,
            amp_budget: power.amp_budget,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn set_idle(&mut self) {
        self.state = DisplayState::Idle;
        self.color = None;
    }

    pub fn power_budget(&self) -> PowerBudget {
        PowerBudget::new(self.amp_per_led, self.amp_budget)
    }
}

/// Lock the status, recovering it if a holder panicked mid-update.
pub fn lock_status(status: &Mutex<DisplayStatus>) -> MutexGuard<'_, DisplayStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Unpack RGB24 bytes into `pixels`. `data` must hold exactly 3 bytes per
/// pixel.
pub fn fill_from_rgb(pixels: &mut [Color], data: &[u8]) -> bool {
    if data.len() != pixels.len() * 3 {
        return false;
    }
    for (p, rgb) in pixels.iter_mut().zip(data.chunks_exact(3)) {
        *p = Color::new(rgb[0], rgb[1], rgb[2]);
    }
    true
}

// ── Render loop ──────────────────────────────────────────────────────

/// Main render loop: runs on a dedicated thread and owns the strip.
///
/// Returns on `Shutdown` or once the channel is closed (every sender
/// dropped), after blanking and closing the strip. Each command updates the
/// frame and triggers one write; writes are spaced by at least
/// `strip.min_delay()`. A failed write is logged and
/// counted, and the loop keeps serving commands.
pub fn render_loop(
    rx: Receiver<RenderCommand>,
    status: Arc<Mutex<DisplayStatus>>,
    mut strip: Box<dyn Strip + Send>,
) {
    let led_count = strip.led_count();
    let min_delay = strip.min_delay();
    let mut pixels = vec![Color::default(); led_count];
    let mut last_write: Option<Instant> = None;

    tracing::info!("Render thread started ({} LEDs), waiting for commands...", led_count);

    while let Ok(cmd) = rx.recv() {
        match cmd {
            RenderCommand::ShowColor(c) => {
                pixels.fill(c);
                let mut s = lock_status(&status);
                s.state = DisplayState::SolidColor;
                s.color = Some([c.r, c.g, c.b]);
            }

            RenderCommand::ShowFrame(data) => {
                if !fill_from_rgb(&mut pixels, &data) {
                    tracing::error!(
                        "Invalid frame size: expected {} bytes, got {}",
                        led_count * 3,
                        data.len()
                    );
                    continue;
                }
                let mut s = lock_status(&status);
                s.state = DisplayState::Frame;
                s.color = None;
            }

            RenderCommand::Clear => {
                pixels.fill(Color::default());
                lock_status(&status).set_idle();
            }

            RenderCommand::SetPowerBudget(budget) => {
                strip.set_power_budget(budget);
                let mut s = lock_status(&status);
                s.amp_per_led = budget.amp_per_led;
                s.amp_budget = budget.amp_budget;
            }

            RenderCommand::Shutdown => {
                tracing::info!("Render thread: shutdown requested.");
                break;
            }
        }

        // The strip does not throttle itself.
        wait_min_delay(last_write, min_delay);

        let result = strip.write(&pixels);
        last_write = Some(Instant::now());
        let mut s = lock_status(&status);
        match result {
            Ok(()) => s.frames_written += 1,
            Err(e) => {
                tracing::error!("Failed to write frame: {}", e);
                s.write_errors += 1;
                s.last_error = Some(e.to_string());
            }
        }
    }

    tracing::info!("Render thread: blanking and closing the strip.");
    wait_min_delay(last_write, min_delay);
    pixels.fill(Color::default());
    if let Err(e) = strip.write(&pixels) {
        tracing::warn!("Failed to blank strip: {}", e);
    }
    if let Err(e) = strip.close() {
        tracing::warn!("Failed to close strip: {}", e);
    }
    let mut s = lock_status(&status);
    s.state = DisplayState::Closed;
    s.color = None;
}

fn wait_min_delay(last_write: Option<Instant>, min_delay: Duration) {
    if let Some(at) = last_write {
        let elapsed = at.elapsed();
        if elapsed < min_delay {
            thread::sleep(min_delay - elapsed);
        }
    }
}
