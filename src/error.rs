//! Error type shared by the whole pipeline.
//!
//! Every fallible operation returns `Result<T, Error>`. Nothing here is
//! retried: errors travel up to whoever drives the animation loop, which
//! decides whether to keep ticking, drop the frame, or stop.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad settings or an unusable bus device; needs operator action.
    Configuration,
    /// The open bus handle failed a read or a write.
    Transport,
    /// The caller broke the API contract (write after close, wrong frame size).
    ContractViolation,
}

#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ─────────────────────────────────────────────
    /// SPI clock below the 1 kHz floor.
    #[error("invalid bus speed: {0} Hz (minimum 1000 Hz)")]
    InvalidSpeed(u32),

    #[error(
        "SPI device {} not found; enable the SPI interface (raspi-config) and reboot",
        path.display()
    )]
    DeviceNotFound { path: PathBuf },

    #[error(
        "cannot open SPI device {}: {source}; is the user in the 'spi' or 'plugdev' group?",
        path.display()
    )]
    DevicePermission { path: PathBuf, source: io::Error },

    /// Opening worked but the clock/mode/word-size setup did not.
    #[error("failed to configure SPI device {}: {source}", path.display())]
    DeviceSetup { path: PathBuf, source: io::Error },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot access config file {}: {source}", path.display())]
    ConfigIo { path: PathBuf, source: io::Error },

    #[error("config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    // ── Transport ─────────────────────────────────────────────────
    #[error("bus I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    // ── Contract violations ───────────────────────────────────────
    #[error("bus is closed")]
    Closed,

    #[error("frame length mismatch: strip has {expected} LEDs, frame has {actual}")]
    FrameLength { expected: usize, actual: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSpeed(_)
            | Error::DeviceNotFound { .. }
            | Error::DevicePermission { .. }
            | Error::DeviceSetup { .. }
            | Error::InvalidConfig(_)
            | Error::ConfigIo { .. }
            | Error::ConfigFile { .. } => ErrorKind::Configuration,
            Error::Io(_) | Error::ShortRead { .. } => ErrorKind::Transport,
            Error::Closed | Error::FrameLength { .. } => ErrorKind::ContractViolation,
        }
    }

    /// Map an `open(2)` failure on the device node to the matching
    /// configuration error.
    #[cfg(any(feature = "hardware", test))]
    pub(crate) fn from_open(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::DeviceNotFound { path },
            _ => Error::DevicePermission { path, source: err },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn display_mentions_values() {
        let e = Error::FrameLength {
            expected: 150,
            actual: 149,
        };
        assert!(e.to_string().contains("150"));
        assert!(e.to_string().contains("149"));

        let e = Error::InvalidSpeed(999);
        assert!(e.to_string().contains("999"));
    }

    #[rstest]
    #[case(Error::InvalidSpeed(10), ErrorKind::Configuration)]
    #[case(Error::InvalidConfig("x".into()), ErrorKind::Configuration)]
    #[case(Error::ShortRead { expected: 4, actual: 2 }, ErrorKind::Transport)]
    #[case(Error::Closed, ErrorKind::ContractViolation)]
    #[case(Error::FrameLength { expected: 1, actual: 2 }, ErrorKind::ContractViolation)]
    fn kind_classification(#[case] err: Error, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn io_errors_are_transport() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.kind(), ErrorKind::Transport);
    }

    #[test]
    fn open_not_found_maps_to_device_not_found() {
        let e = Error::from_open(
            PathBuf::from("/dev/spidev9.9"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(e, Error::DeviceNotFound { .. }));
        assert!(e.to_string().contains("raspi-config"));
    }

    #[test]
    fn open_permission_denied_hints_at_groups() {
        let e = Error::from_open(
            PathBuf::from("/dev/spidev0.0"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(e, Error::DevicePermission { .. }));
        assert!(e.to_string().contains("plugdev"));
    }
}
