//! Thread-safe, exclusive bus transport.
//!
//! A `Transport` wraps a byte-stream handle (an SPI device node on real
//! hardware) and guarantees that writes reach the wire whole and in order:
//! interleaved partial frames would corrupt the shift register of every LED
//! downstream.
//!
//! ## Rust concepts
//! - `Mutex<Option<H>>`: the lock serializes access, the `Option` lets
//!   `close()` take the handle out so it is dropped exactly once
//! - `AtomicBool::compare_exchange` as a one-shot "closed" latch
//! - Separate `impl` blocks with different trait bounds: a write-only
//!   handle still gets `write`/`close`, `read` needs `H: Read`

use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The SPI clock must be at least this fast.
pub const MIN_SPEED_HZ: u32 = 1000;

/// 10 MHz. 32 bits go out per LED, a slow clock shows as a visible
/// staggering along the strip.
pub const DEFAULT_SPEED_HZ: u32 = 10_000_000;

pub const DEFAULT_DEVICE: &str = "/dev/spidev0.0";

pub struct Transport<H> {
    closed: AtomicBool,
    speed_hz: u32,
    handle: Mutex<Option<H>>,
}

impl<H> Transport<H> {
    /// Wrap an already-configured handle running at `speed_hz`.
    pub fn new(handle: H, speed_hz: u32) -> Result<Self> {
        if speed_hz < MIN_SPEED_HZ {
            return Err(Error::InvalidSpeed(speed_hz));
        }
        Ok(Self {
            closed: AtomicBool::new(false),
            speed_hz,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Lock the handle after checking the closed latch.
    ///
    /// A panic in another writer leaves the handle itself intact, so a
    /// poisoned lock is recovered rather than propagated.
    fn lock(&self) -> Result<MutexGuard<'_, Option<H>>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.handle.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<H: Write> Transport<H> {
    /// Push `buf` as-is. Concurrent callers block until the previous write
    /// completes.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut guard = self.lock()?;
        let handle = guard.as_mut().ok_or(Error::Closed)?;
        handle.write_all(buf)?;
        Ok(buf.len())
    }

    /// Close the handle. Only the first call does anything; every later
    /// call, and every read or write after it, fails with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Closed);
        }
        let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(mut handle) => {
                handle.flush()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<H: Read> Transport<H> {
    /// Fill `buf` from the bus. Anything short of a full buffer is an error.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.lock()?;
        let handle = guard.as_mut().ok_or(Error::Closed)?;
        let n = handle.read(buf)?;
        if n != buf.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(n)
    }
}

impl<H> std::fmt::Debug for Transport<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("speed_hz", &self.speed_hz)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Hardware ────────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use spidev::Spidev;

/// Transport over a Linux spidev node.
#[cfg(feature = "hardware")]
pub type SpiTransport = Transport<Spidev>;

/// Open and configure a spidev node: SPI mode 3, 8 bits per word,
/// `speed_hz` clock.
///
/// # Rust concept: mapping errors at the boundary
/// The raw `io::Error` from `open` says little on its own. We translate it
/// into a configuration error carrying the path and a hint for the operator.
#[cfg(feature = "hardware")]
pub fn open_spi(device: impl Into<PathBuf>, speed_hz: u32) -> Result<SpiTransport> {
    use spidev::{SpiModeFlags, SpidevOptions};

    if speed_hz < MIN_SPEED_HZ {
        return Err(Error::InvalidSpeed(speed_hz));
    }
    let path = device.into();
    let mut spi = Spidev::open(&path).map_err(|e| Error::from_open(path.clone(), e))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(speed_hz)
        .mode(SpiModeFlags::SPI_MODE_3)
        .build();
    spi.configure(&options)
        .map_err(|source| Error::DeviceSetup {
            path: path.clone(),
            source,
        })?;
    tracing::info!("Opened SPI device {} at {} Hz", path.display(), speed_hz);
    Transport::new(spi, speed_hz)
}

#[cfg(not(feature = "hardware"))]
pub fn open_spi(device: impl Into<PathBuf>, _speed_hz: u32) -> Result<Transport<std::fs::File>> {
    Err(Error::InvalidConfig(format!(
        "cannot open {}: built without the 'hardware' feature",
        device.into().display()
    )))
}
