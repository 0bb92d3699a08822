use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::dto::Ws2812Settings;
use crate::error::{Error, Result};
use crate::interface::color::{map_range, RgbColor};
use crate::interface::controller::{
    clamp_brightness, Capabilities, Controller, ControllerContext, ControllerMetadata,
    ControllerState, LightConfig,
};
use crate::interface::palette::{Animation, ColorPalette, MAX_PALETTE_COLORS};
use crate::resource::driver::clock::Clock;
use crate::resource::driver::strip::{PixelStrip, StripOpener, StripSpec};

pub mod animation;
use animation::{AnimationEngine, AnimationTiming};

pub const SYSTEM_TYPE: &str = "ws2812";

pub const DEFAULT_PIN: u8 = 2;
pub const MAX_PIN: i64 = 48;
pub const DEFAULT_LED_COUNT: usize = 30;
pub const MAX_LED_COUNT: usize = 300;
pub const DEFAULT_BRIGHTNESS: u8 = 255;

const TEST_FLASH: Duration = Duration::from_millis(200);

pub fn parse_pin(value: Option<i64>) -> u8 {
    match value {
        Some(pin) if (0..=MAX_PIN).contains(&pin) => pin as u8,
        _ => DEFAULT_PIN,
    }
}

pub fn parse_led_count(value: Option<i64>) -> usize {
    match value {
        Some(count) if count > 0 => (count as usize).min(MAX_LED_COUNT),
        _ => DEFAULT_LED_COUNT,
    }
}

pub fn parse_brightness(value: Option<i64>) -> u8 {
    match value {
        Some(b) => b.clamp(0, 255) as u8,
        None => DEFAULT_BRIGHTNESS,
    }
}

/// Addressable strip wired to this device.
///
/// `initialize` always succeeds so the strip can be configured before it is
/// powered; `is_ready` reports whether the hardware was actually opened.
pub struct Ws2812Controller {
    strips: Arc<dyn StripOpener>,
    clock: Arc<dyn Clock>,
    settings: Ws2812Settings,
    config: LightConfig,
    state: ControllerState,
    pin: u8,
    led_count: usize,
    brightness: u8,
    strip: Option<Box<dyn PixelStrip>>,
    pixels: Vec<RgbColor>,
    engine: AnimationEngine,
}

impl Ws2812Controller {
    pub fn new(ctx: &ControllerContext) -> Self {
        Self {
            strips: ctx.strips.clone(),
            clock: ctx.clock.clone(),
            settings: ctx.settings.ws2812.clone(),
            config: LightConfig::default(),
            state: ControllerState::default(),
            pin: DEFAULT_PIN,
            led_count: DEFAULT_LED_COUNT,
            brightness: DEFAULT_BRIGHTNESS,
            strip: None,
            pixels: Vec::new(),
            engine: AnimationEngine::new(AnimationTiming::from(&ctx.settings.ws2812)),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn pixels(&self) -> &[RgbColor] {
        &self.pixels
    }

    pub fn animation_progress(&self) -> Option<(u32, u32)> {
        self.engine.progress()
    }

    fn show(&mut self) -> Result<()> {
        match self.strip.as_mut() {
            Some(strip) => strip.write_pixels(&self.pixels, self.brightness),
            None => Err(Error::Hardware("LED strip not available".to_string())),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.pixels.fill(RgbColor::BLACK);
        self.show()
    }
}

impl Controller for Ws2812Controller {
    fn system_type(&self) -> &'static str {
        SYSTEM_TYPE
    }

    fn initialize(&mut self, config: &LightConfig) -> Result<()> {
        self.engine.stop();
        self.config = config.clone();
        self.pin = parse_pin(config.custom_i64("ledPin"));
        self.led_count = parse_led_count(config.custom_i64("ledCount"));
        self.brightness = parse_brightness(config.custom_i64("brightness"));
        self.pixels = vec![RgbColor::BLACK; self.led_count];

        let spec = StripSpec {
            pin: self.pin,
            led_count: self.led_count,
            device: config
                .custom_str("spiDevice")
                .unwrap_or(self.settings.spi_device.as_str())
                .to_string(),
            speed_hz: self.settings.spi_speed_hz,
        };

        self.strip = match self.strips.open(&spec) {
            Ok(strip) => Some(strip),
            Err(err) => {
                log::warn!(
                    pin = self.pin,
                    device = spec.device.as_str(),
                    err:display = err;
                    "[ws2812] Strip hardware not available, will report not ready"
                );
                None
            }
        };

        if self.strip.is_some() {
            if let Err(err) = self.clear() {
                log::warn!(err:display = err; "[ws2812] Failed to clear strip");
            }
        }

        self.state = ControllerState {
            initialized: true,
            authenticated: true,
            connected: self.strip.is_some(),
        };
        log::info!(
            pin = self.pin,
            leds = self.led_count,
            brightness = self.brightness;
            "[ws2812] Initialized"
        );
        Ok(())
    }

    fn test_connection(&mut self) -> Result<()> {
        if self.strip.is_none() {
            return Err(Error::Hardware("LED strip not available".to_string()));
        }

        self.engine.stop();
        for color in [RgbColor::RED, RgbColor::GREEN, RgbColor::BLUE] {
            self.pixels.fill(RgbColor::BLACK);
            if let Some(first) = self.pixels.first_mut() {
                *first = color;
            }
            self.show()?;
            self.clock.sleep(TEST_FLASH);
        }
        self.clear()?;

        self.state.connected = true;
        Ok(())
    }

    fn display_palette(&mut self, palette: &ColorPalette) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        let now = self.clock.now();
        if self.engine.start(palette, now, &mut self.pixels) {
            self.show()?;
        }
        log::info!(
            colors = palette.len(),
            animation = palette.animation().as_str(),
            leds = self.led_count;
            "[ws2812] Palette displayed"
        );
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.engine.stop();
        self.clear()
    }

    fn set_brightness(&mut self, brightness: i32) -> Result<()> {
        let percent = clamp_brightness(brightness);
        self.brightness = map_range(percent as i64, 0, 100, 0, 255) as u8;
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.show()
    }

    fn status(&self) -> String {
        if self.strip.is_none() {
            return format!("Hardware not available | Pin: {}", self.pin);
        }
        let percent = map_range(self.brightness as i64, 0, 255, 0, 100);
        let mut status = format!(
            "Ready | LEDs: {} | Pin: {} | Brightness: {}%",
            self.led_count, self.pin, percent
        );
        if let Some(animation) = self.engine.animation() {
            status.push_str(&format!(" | Animating: {animation}"));
        }
        status
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            system_type: SYSTEM_TYPE.to_string(),
            animations: Animation::ALL.to_vec(),
            max_colors: MAX_PALETTE_COLORS,
            led_count: Some(self.led_count),
            panel_count: None,
            requires_auth: false,
            direct_drive: true,
            supports_brightness: true,
        }
    }

    fn state(&self) -> ControllerState {
        self.state
    }

    fn is_ready(&self) -> bool {
        self.state.initialized && self.strip.is_some()
    }

    fn updated_config(&self) -> LightConfig {
        self.config.clone()
    }

    fn tick(&mut self, now: Instant) {
        if !self.engine.is_animating() {
            return;
        }
        if self.engine.tick(now, &mut self.pixels) {
            if let Err(err) = self.show() {
                log::warn!(err:display = err; "[ws2812] Failed to push animation frame");
            }
        }
    }

    fn is_animating(&self) -> bool {
        self.engine.is_animating()
    }

    fn disconnect(&mut self) -> Result<()> {
        self.engine.stop();
        if self.strip.is_some() {
            self.clear()?;
        }
        self.strip = None;
        self.state = ControllerState::default();
        Ok(())
    }
}

fn factory(ctx: &ControllerContext) -> Box<dyn Controller> {
    Box::new(Ws2812Controller::new(ctx))
}

inventory::submit!(ControllerMetadata {
    system_type: SYSTEM_TYPE,
    description: "WS2812 strip driven over SPI",
    factory,
});
