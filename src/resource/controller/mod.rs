pub mod nanoleaf;
pub mod wled;
pub mod ws2812;
