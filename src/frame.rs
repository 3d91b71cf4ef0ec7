//! The reusable wire buffer for one strip.
//!
//! Layout: `[4 zero bytes][N × 4-byte LED record][end-frame filler]`.
//!
//! Each LED delays the data line by half a clock, so after the last record
//! the controller needs N/2 more clock edges before the data reaches the end
//! of the chain. The filler bytes exist only to supply them; their value
//! does not matter and they stay zero.

use crate::encode::EncodedRecord;

const START_FRAME_LEN: usize = 4;

/// Total bytes sent for a strip of `led_count` LEDs.
pub fn wire_len(led_count: usize) -> usize {
    START_FRAME_LEN + 4 * led_count + end_frame_len(led_count)
}

/// Filler bytes after the last record: N/2 bits of clock, plus one byte.
pub fn end_frame_len(led_count: usize) -> usize {
    led_count / 2 / 8 + 1
}

#[derive(Clone, Debug)]
pub struct WireBuffer {
    bytes: Vec<u8>,
    led_count: usize,
}

impl WireBuffer {
    pub fn new(led_count: usize) -> Self {
        Self {
            bytes: vec![0; wire_len(led_count)],
            led_count,
        }
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Resize for a new LED count. Reallocates only when the count changes.
    ///
    /// Returns `true` if the buffer was rebuilt.
    pub fn resize(&mut self, led_count: usize) -> bool {
        if led_count == self.led_count {
            return false;
        }
        *self = Self::new(led_count);
        true
    }

    /// The LED records, 4 bytes each, in strip order.
    #[cfg(test)]
    pub fn records(&self) -> &[u8] {
        &self.bytes[START_FRAME_LEN..START_FRAME_LEN + 4 * self.led_count]
    }

    pub fn records_mut(&mut self) -> &mut [u8] {
        let end = START_FRAME_LEN + 4 * self.led_count;
        &mut self.bytes[START_FRAME_LEN..end]
    }

    /// Overwrite the record of LED `index`.
    pub fn set_record(&mut self, index: usize, record: EncodedRecord) {
        let start = START_FRAME_LEN + 4 * index;
        self.bytes[start..start + 4].copy_from_slice(&record.to_bytes());
    }

    #[cfg(test)]
    pub fn record(&self, index: usize) -> EncodedRecord {
        let start = START_FRAME_LEN + 4 * index;
        let mut rec = [0u8; 4];
        rec.copy_from_slice(&self.bytes[start..start + 4]);
        EncodedRecord::from_bytes(rec)
    }

    /// The complete buffer as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
