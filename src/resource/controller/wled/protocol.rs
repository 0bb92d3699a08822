//! WLED JSON API payloads.

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::interface::color::map_range;
use crate::interface::palette::{Animation, ColorPalette};

pub const INFO_PATH: &str = "/json/info";
pub const STATE_PATH: &str = "/json/state";

/// WLED shows at most three colours per segment (primary, secondary, tertiary).
pub const MAX_SEGMENT_COLORS: usize = 3;

pub const FX_SOLID: u8 = 0;
pub const FX_BLINK: u8 = 1;
pub const FX_WIPE: u8 = 3;
pub const FX_RAINBOW: u8 = 9;

pub const DEFAULT_SPEED: u8 = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WledInfo {
    pub version: String,
    pub name: String,
    pub led_count: usize,
}

pub fn base_url(host: &str, port: u16) -> String {
    if port == 0 || port == 80 {
        format!("http://{host}")
    } else {
        format!("http://{host}:{port}")
    }
}

pub fn effect_code(animation: Animation) -> u8 {
    match animation {
        Animation::Static => FX_SOLID,
        Animation::Fade => FX_BLINK,
        Animation::Wipe => FX_WIPE,
        Animation::Rainbow => FX_RAINBOW,
    }
}

/// Longer durations map to slower effects: 1 s -> 255, 10 s -> 50.
pub fn effect_speed(duration_ms: u32) -> u8 {
    if duration_ms == 0 {
        return DEFAULT_SPEED;
    }
    map_range(duration_ms as i64, 1000, 10_000, 255, 50).clamp(0, 255) as u8
}

pub fn brightness_value(percent: u8) -> u8 {
    map_range(percent.min(100) as i64, 0, 100, 0, 255) as u8
}

pub fn state_command(palette: &ColorPalette, transition: u32) -> Value {
    let colors: Vec<Value> = palette
        .colors()
        .iter()
        .take(MAX_SEGMENT_COLORS)
        .map(|c| json!([c.r, c.g, c.b]))
        .collect();

    json!({
        "on": true,
        "transition": transition,
        "seg": [{
            "id": 0,
            "on": true,
            "fx": effect_code(palette.animation()),
            "col": colors,
            "sx": effect_speed(palette.duration_ms()),
        }]
    })
}

pub fn off_command() -> Value {
    json!({ "on": false })
}

pub fn brightness_command(percent: u8) -> Value {
    json!({ "bri": brightness_value(percent) })
}

pub fn parse_info(info: &Value) -> Result<WledInfo> {
    let version = info
        .get("ver")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol("WLED info is missing 'ver'".to_string()))?;

    Ok(WledInfo {
        version: version.to_string(),
        name: info
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("WLED")
            .to_string(),
        led_count: info
            .pointer("/leds/count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
    })
}

pub fn format_status(state: &Value, led_count: usize) -> String {
    let on = state.get("on").and_then(Value::as_bool).unwrap_or(false);
    let bri = state.get("bri").and_then(Value::as_i64).unwrap_or(0);
    format!(
        "{} | Brightness: {}% | LEDs: {}",
        if on { "On" } else { "Off" },
        map_range(bri, 0, 255, 0, 100),
        led_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_omits_default_port() {
        assert_eq!(base_url("10.0.0.2", 80), "http://10.0.0.2");
        assert_eq!(base_url("10.0.0.2", 0), "http://10.0.0.2");
        assert_eq!(base_url("wled.local", 8080), "http://wled.local:8080");
    }

    #[test]
    fn speed_maps_inverse_and_clamps() {
        assert_eq!(effect_speed(0), DEFAULT_SPEED);
        assert_eq!(effect_speed(1000), 255);
        assert_eq!(effect_speed(10_000), 50);
        assert_eq!(effect_speed(100), 255);
        assert_eq!(effect_speed(60_000), 0);
    }

    #[test]
    fn command_keeps_three_colors() {
        let palette = ColorPalette::from_hex(&["#FF0000", "#00FF00", "#0000FF", "#FFFFFF"])
            .with_animation(Animation::Rainbow);
        let cmd = state_command(&palette, 7);
        let seg = &cmd["seg"][0];
        assert_eq!(seg["fx"], 9);
        assert_eq!(seg["col"].as_array().unwrap().len(), 3);
        assert_eq!(seg["col"][2], json!([0, 0, 255]));
        assert_eq!(cmd["transition"], 7);
    }

    #[test]
    fn brightness_scales_to_byte() {
        assert_eq!(brightness_command(100)["bri"], 255);
        assert_eq!(brightness_command(0)["bri"], 0);
        assert_eq!(brightness_command(50)["bri"], 127);
    }

    #[test]
    fn info_requires_version() {
        let info = parse_info(&json!({"ver": "0.14.0", "leds": {"count": 60}})).unwrap();
        assert_eq!(info.led_count, 60);
        assert!(parse_info(&json!({"leds": {"count": 60}})).is_err());
    }

    #[test]
    fn status_line() {
        let state = json!({"on": true, "bri": 255});
        assert_eq!(format_status(&state, 30), "On | Brightness: 100% | LEDs: 30");
    }
}
