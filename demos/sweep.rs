//! # Rainbow Sweep
//!
//! Drives an APA102 strip directly, without the HTTP server. It demonstrates:
//! - Opening the SPI bus and wrapping it in a `StripDriver`
//! - Filling a frame of `Color`s and pushing it every tick
//! - Pacing the loop with `min_delay()`
//! - Clean shutdown with Ctrl+C (the strip is blanked before exit)
//!
//! ## Run it
//! ```sh
//! cargo build --release --example sweep
//! ./target/release/examples/sweep 150
//! ```

use dotstar_rs::transport::{DEFAULT_DEVICE, DEFAULT_SPEED_HZ};
use dotstar_rs::{
    Color, DriverConfig, StripDriver, is_running, open_spi, setup_signal_handler,
};
use std::error::Error;
use std::thread;
use std::time::Duration;

/// Never tick faster than ~60 fps; the eye can't tell and the bus stays idle.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn main() -> Result<(), Box<dyn Error>> {
    let led_count = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => dotstar_rs::driver::DEFAULT_LED_COUNT,
    };

    // ── Setup ──────────────────────────────────────────────────────
    let transport = open_spi(DEFAULT_DEVICE, DEFAULT_SPEED_HZ)?;
    let mut strip = StripDriver::new(transport, DriverConfig::new(led_count))?;
    let running = setup_signal_handler()?;
    let delay = strip.min_delay().max(FRAME_INTERVAL);

    let mut pixels = vec![Color::BLACK; led_count];
    let mut frame: u16 = 0;

    // ── Main loop ──────────────────────────────────────────────────
    while is_running(&running) {
        // Spread one full turn of the color wheel over the strip and rotate it.
        for (i, px) in pixels.iter_mut().enumerate() {
            let hue = (i * 360 / led_count.max(1)) as u16;
            *px = Color::from_hue(hue.wrapping_add(frame)).apply_brightness(40);
        }
        strip.write(&pixels)?;

        frame = (frame + 2) % 360;
        thread::sleep(delay);
    }

    // ── Cleanup ────────────────────────────────────────────────────
    pixels.fill(Color::BLACK);
    strip.write(&pixels)?;
    strip.close()?;
    println!("\nStrip blanked, bye.");
    Ok(())
}
