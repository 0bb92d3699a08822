//! WS2812 output over a plain SPI bus.
//!
//! At 2.4 MHz one SPI bit lasts ~417 ns, so every WS2812 bit is sent as three
//! SPI bits: `110` for a one and `100` for a zero. Each colour byte therefore
//! expands to three SPI bytes. Colours go out in GRB order and every frame ends
//! with a run of zero bytes that holds the line low long enough to latch.

use smart_leds::{SmartLedsWrite, RGB8};
use std::io::Write;

pub const SPI_SPEED_HZ: u32 = 2_400_000;

/// Low time after a frame. 90 bytes at 2.4 MHz is ~300 us, enough for WS2812B.
pub const RESET_BYTES: usize = 90;

const ONE: u32 = 0b110;
const ZERO: u32 = 0b100;

pub fn encode_byte(byte: u8) -> [u8; 3] {
    let mut bits: u32 = 0;
    for i in (0..8).rev() {
        bits = (bits << 3) | if (byte >> i) & 1 == 1 { ONE } else { ZERO };
    }
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}

pub fn encode_frame(pixels: impl IntoIterator<Item = RGB8>, out: &mut Vec<u8>) {
    out.clear();
    for pixel in pixels {
        for byte in [pixel.g, pixel.r, pixel.b] {
            out.extend_from_slice(&encode_byte(byte));
        }
    }
    out.resize(out.len() + RESET_BYTES, 0);
}

pub struct Ws2812Spi<W: Write> {
    bus: W,
    buffer: Vec<u8>,
}

impl<W: Write> Ws2812Spi<W> {
    pub fn new(bus: W) -> Self {
        Self {
            bus,
            buffer: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.bus
    }
}

#[cfg(target_os = "linux")]
impl Ws2812Spi<spidev::Spidev> {
    pub fn open(device: &str, speed_hz: u32) -> std::io::Result<Self> {
        use spidev::{SpiModeFlags, Spidev, SpidevOptions};

        let mut spi = Spidev::open(device)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;
        Ok(Self::new(spi))
    }
}

impl<W: Write> SmartLedsWrite for Ws2812Spi<W> {
    type Error = std::io::Error;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        encode_frame(iterator.into_iter().map(Into::into), &mut self.buffer);
        self.bus.write_all(&self.buffer)?;
        self.bus.flush()
    }
}
