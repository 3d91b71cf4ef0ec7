//! In-memory bus handle for tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorded {
    writes: Vec<Vec<u8>>,
    flushes: usize,
}

/// A bus handle that records every write. Clones share the same log, so a
/// test can keep one clone while the transport owns the other.
#[derive(Clone, Default)]
pub(crate) struct RecordingBus {
    log: Arc<Mutex<Recorded>>,
    fail: bool,
}

impl RecordingBus {
    /// A handle whose writes all fail with `BrokenPipe`.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().writes.clone()
    }

    pub(crate) fn last_write(&self) -> Option<Vec<u8>> {
        self.log.lock().unwrap().writes.last().cloned()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.log.lock().unwrap().flushes
    }
}

impl Write for RecordingBus {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus unplugged"));
        }
        self.log.lock().unwrap().writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().flushes += 1;
        Ok(())
    }
}
