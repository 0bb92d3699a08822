use smart_leds::{SmartLedsWrite, RGB8};

use crate::error::{Error, Result};
use crate::interface::color::RgbColor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StripSpec {
    pub pin: u8,
    pub led_count: usize,
    pub device: String,
    pub speed_hz: u32,
}

/// Object-safe view of an addressable strip.
pub trait PixelStrip: Send {
    fn write_pixels(&mut self, pixels: &[RgbColor], brightness: u8) -> Result<()>;
}

impl<T> PixelStrip for T
where
    T: SmartLedsWrite<Color = RGB8> + Send,
    T::Error: std::fmt::Debug,
{
    fn write_pixels(&mut self, pixels: &[RgbColor], brightness: u8) -> Result<()> {
        let frame = pixels.iter().map(|c| RGB8::new(c.r, c.g, c.b));
        self.write(smart_leds::brightness(frame, brightness))
            .map_err(|e| Error::Hardware(format!("Strip write failed: {e:?}")))
    }
}

pub trait StripOpener: Send + Sync {
    fn open(&self, spec: &StripSpec) -> Result<Box<dyn PixelStrip>>;
}

/// Opens a WS2812 strip on the SPI bus named by `StripSpec::device`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiStripOpener;

impl StripOpener for SpiStripOpener {
    #[cfg(target_os = "linux")]
    fn open(&self, spec: &StripSpec) -> Result<Box<dyn PixelStrip>> {
        use crate::resource::driver::ws2812_spi::Ws2812Spi;

        let strip = Ws2812Spi::open(&spec.device, spec.speed_hz).map_err(|e| {
            Error::Hardware(format!("Failed to open SPI device '{}': {e}", spec.device))
        })?;
        log::info!(
            device = spec.device.as_str(),
            pin = spec.pin,
            leds = spec.led_count;
            "[ws2812] SPI strip opened"
        );
        Ok(Box::new(strip))
    }

    #[cfg(not(target_os = "linux"))]
    fn open(&self, spec: &StripSpec) -> Result<Box<dyn PixelStrip>> {
        Err(Error::Hardware(format!(
            "SPI device '{}' is only available on Linux",
            spec.device
        )))
    }
}
