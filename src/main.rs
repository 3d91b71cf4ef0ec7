//! DotStar HTTP API Server
//!
//! Runs a web server on the Pi that accepts commands to control an APA102
//! strip. Any device on the LAN can set a color, push raw frames, stream
//! frames over a WebSocket or change the power budget.
//!
//! ## Architecture
//! - **Render thread** (std::thread): owns the strip, processes commands
//! - **HTTP server** (tokio/axum): accepts API requests, sends commands via channel
//!
//! ## Usage
//! ```sh
//! ./target/release/dotstar-rs --leds 150 --amp-budget 4 --port 8010
//! ./target/release/dotstar-rs --fake --leds 40   # preview in the terminal
//! ```

use clap::Parser;
use dotstar_rs::render::{DisplayStatus, RenderCommand, render_loop};
use dotstar_rs::server::{self, AppState};
use dotstar_rs::{AppConfig, PowerBudget, Screen, Strip, StripDriver, open_spi};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// DotStar HTTP API Server
#[derive(Parser)]
#[command(name = "dotstar-rs")]
#[command(about = "HTTP API server for controlling an APA102 LED strip")]
#[command(version)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long, default_value = "dotstar.json")]
    config: PathBuf,

    /// SPI device to open
    #[arg(long)]
    device: Option<PathBuf>,

    /// SPI clock in Hz
    #[arg(long)]
    speed: Option<u32>,

    /// Number of LEDs on the strip
    #[arg(short = 'n', long)]
    leds: Option<usize>,

    /// Current of one channel at full duty, in amperes
    #[arg(long)]
    amp_per_led: Option<f32>,

    /// Strip-wide current ceiling in amperes (0 disables limiting)
    #[arg(long)]
    amp_budget: Option<f32>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Paint frames in this terminal instead of driving the SPI bus
    #[arg(long)]
    fake: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Write the merged config back to --config and exit
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(device) = &self.device {
            config.bus.device = device.clone();
        }
        if let Some(speed) = self.speed {
            config.bus.speed_hz = speed;
        }
        if let Some(leds) = self.leds {
            config.driver.led_count = leds;
        }
        if self.amp_per_led.is_some() || self.amp_budget.is_some() {
            let current = config.driver.power;
            config.driver.power = PowerBudget::new(
                self.amp_per_led.unwrap_or(current.amp_per_led),
                self.amp_budget.unwrap_or(current.amp_budget),
            );
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Logs go to stderr so the --fake preview owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    if args.save_config {
        config.save(&args.config)?;
        tracing::info!("Wrote config to {}", args.config.display());
        return Ok(());
    }

    tracing::info!("DotStar HTTP Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("LEDs: {}", config.driver.led_count);
    tracing::info!("Port: {}", config.port);

    let strip: Box<dyn Strip + Send> = if args.fake {
        tracing::info!("Fake strip: painting to the terminal");
        Box::new(Screen::new(std::io::stdout(), config.driver.led_count))
    } else {
        let transport = open_spi(config.bus.device.clone(), config.bus.speed_hz)?;
        Box::new(StripDriver::new(transport, config.driver)?)
    };

    // Create the channel for sending commands to the render thread.
    let (tx, rx) = mpsc::channel();

    // Shared display status: render thread writes, HTTP handlers read.
    let status = Arc::new(Mutex::new(DisplayStatus::new(
        config.driver.led_count,
        config.driver.power,
    )));

    let render_status = status.clone();
    let render_handle = std::thread::Builder::new()
        .name("render".into())
        .spawn(move || render_loop(rx, render_status, strip))?;

    let app_state = AppState {
        command_tx: tx.clone(),
        status,
        led_count: config.driver.led_count,
    };
    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", config.port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/status", config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stream sockets run in their own tasks and may still hold a sender, so
    // stop the render thread explicitly. It blanks and closes the strip.
    if tx.send(RenderCommand::Shutdown).is_err() {
        tracing::warn!("Render thread already gone");
    }
    drop(tx);
    match tokio::task::spawn_blocking(move || render_handle.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::error!("Render thread panicked"),
        Err(e) => tracing::error!("Failed to join render thread: {}", e),
    }
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    tracing::info!("Ctrl+C received, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "dotstar-rs",
            "-n",
            "60",
            "--amp-budget",
            "2.5",
            "--speed",
            "4000000",
            "--port",
            "9000",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.driver.led_count, 60);
        assert_eq!(config.driver.power, PowerBudget::new(0.02, 2.5));
        assert_eq!(config.bus.speed_hz, 4_000_000);
        assert_eq!(config.port, 9000);
        assert_eq!(config.bus.device, PathBuf::from("/dev/spidev0.0"));
    }

    #[test]
    fn no_flags_keep_config() {
        let args = Args::parse_from(["dotstar-rs"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }
}
