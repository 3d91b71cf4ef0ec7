//! A fake strip that paints frames into a terminal.
//!
//! Each LED becomes one space with a 24-bit ANSI background color, redrawn
//! in place with `\r`. Handy for working on the render loop or the HTTP API
//! without a Pi at hand.

use crate::Color;
use crate::driver::Strip;
use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

/// Terminals don't benefit from more than this.
const SCREEN_REFRESH_HZ: u32 = 60;

pub struct Screen<W> {
    out: W,
    led_count: usize,
    line: String,
    closed: bool,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W, led_count: usize) -> Self {
        Self {
            out,
            led_count,
            // "\x1b[48;2;255;255;255m " is at most 20 bytes per LED.
            line: String::with_capacity(led_count * 20 + 8),
            closed: false,
        }
    }

    /// The writer the frames are painted to.
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Strip for Screen<W> {
    fn write(&mut self, pixels: &[Color]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if pixels.len() != self.led_count {
            return Err(Error::FrameLength {
                expected: self.led_count,
                actual: pixels.len(),
            });
        }
        self.line.clear();
        self.line.push('\r');
        for c in pixels {
            // Writing to a String cannot fail.
            let _ = write!(self.line, "\x1b[48;2;{};{};{}m ", c.r, c.g, c.b);
        }
        self.line.push_str("\x1b[0m");
        self.out.write_all(self.line.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn min_delay(&self) -> Duration {
        Duration::from_secs(1) / SCREEN_REFRESH_HZ
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }

    fn led_count(&self) -> usize {
        self.led_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paints_one_block_per_led() {
        let mut screen = Screen::new(Vec::new(), 2);
        screen
            .write(&[Color::new(255, 0, 0), Color::new(0, 10, 200)])
            .unwrap();
        let out = String::from_utf8(screen.get_ref().clone()).unwrap();
        assert_eq!(
            out,
            "\r\x1b[48;2;255;0;0m \x1b[48;2;0;10;200m \x1b[0m"
        );
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let mut screen = Screen::new(Vec::new(), 3);
        assert!(matches!(
            screen.write(&[Color::default(); 2]),
            Err(Error::FrameLength { .. })
        ));
    }

    #[test]
    fn write_after_close_fails() {
        let mut screen = Screen::new(Vec::new(), 1);
        screen.close().unwrap();
        assert!(matches!(
            screen.write(&[Color::default()]),
            Err(Error::Closed)
        ));
        assert!(matches!(screen.close(), Err(Error::Closed)));
        assert_eq!(screen.get_ref().as_slice(), b"\n");
    }

    #[test]
    fn refreshes_at_terminal_rate() {
        let screen = Screen::new(Vec::new(), 1);
        assert_eq!(screen.min_delay(), Duration::from_secs(1) / 60);
    }
}
