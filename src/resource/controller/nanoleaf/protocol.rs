//! Nanoleaf OpenAPI payloads and layout parsing.

use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::interface::palette::ColorPalette;

pub const DEFAULT_PORT: u16 = 16021;
pub const SERVICE_TYPE: &str = "_nanoleafapi._tcp.local.";
pub const RESPONDER_NAME: &str = "palpalette";

pub const API_PREFIX: &str = "/api/v1";
pub const PAIRING_PATH: &str = "/api/v1/new";
pub const LAYOUT_PATH: &str = "/panelLayout/layout";
pub const EFFECTS_PATH: &str = "/effects";
pub const STATE_PATH: &str = "/state";

pub const MAX_PANELS: usize = 50;

/// Frames per panel in a static display and the transition time in 100 ms ticks.
const FRAME_COUNT: u8 = 1;
const TRANSITION_TICKS: u8 = 20;

/// Rhythm module, Shapes controller, Lines connector, controller cap and power
/// connector. None of these can show a colour.
pub const NON_DISPLAY_SHAPES: [u64; 5] = [1, 12, 16, 19, 20];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelInfo {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub orientation: i32,
    pub shape_type: u32,
}

pub fn base_url(host: &str, port: u16) -> String {
    let port = if port == 0 { DEFAULT_PORT } else { port };
    format!("http://{host}:{port}")
}

pub fn api_url(base_url: &str, token: &str, endpoint: &str) -> String {
    format!("{base_url}{API_PREFIX}/{token}{endpoint}")
}

pub fn is_display_shape(shape_type: u64) -> bool {
    !NON_DISPLAY_SHAPES.contains(&shape_type)
}

pub fn parse_layout(layout: &Value) -> Result<Vec<PanelInfo>> {
    let positions = layout
        .get("positionData")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Protocol("layout is missing 'positionData'".to_string()))?;

    let as_i32 = |panel: &Value, key: &str| panel.get(key).and_then(Value::as_i64).unwrap_or(0) as i32;

    Ok(positions
        .iter()
        .filter_map(|panel| {
            let id = panel.get("panelId").and_then(Value::as_u64)?;
            let shape_type = panel.get("shapeType").and_then(Value::as_u64).unwrap_or(0);
            if !is_display_shape(shape_type) {
                return None;
            }
            Some(PanelInfo {
                id: id as u32,
                x: as_i32(panel, "x"),
                y: as_i32(panel, "y"),
                orientation: as_i32(panel, "o"),
                shape_type: shape_type as u32,
            })
        })
        .take(MAX_PANELS)
        .collect())
}

pub fn hsb_palette(palette: &ColorPalette) -> Value {
    Value::Array(
        palette
            .colors()
            .iter()
            .map(|color| {
                let (hue, saturation, brightness) = color.to_hsb().rounded();
                json!({ "hue": hue, "saturation": saturation, "brightness": brightness })
            })
            .collect(),
    )
}

/// `<panels> <id> 1 R G B 0 20 <id> 1 R G B 0 20 ...`, panel `i` taking
/// `palette[i mod len]`.
pub fn anim_data(panels: &[PanelInfo], palette: &ColorPalette) -> String {
    let mut data = panels.len().to_string();
    for (i, panel) in panels.iter().enumerate() {
        let color = palette.color_at(i);
        data.push_str(&format!(
            " {} {} {} {} {} 0 {}",
            panel.id, FRAME_COUNT, color.r, color.g, color.b, TRANSITION_TICKS
        ));
    }
    data
}

pub fn static_display_command(panels: &[PanelInfo], palette: &ColorPalette) -> Value {
    json!({
        "write": {
            "command": "display",
            "animType": "static",
            "animData": anim_data(panels, palette),
            "loop": false,
            "palette": hsb_palette(palette),
            "colorType": "HSB",
        }
    })
}

pub fn solid_display_command(palette: &ColorPalette) -> Value {
    json!({
        "write": {
            "command": "display",
            "animType": "solid",
            "colorType": "HSB",
            "palette": hsb_palette(palette),
        }
    })
}

pub fn external_control_command() -> Value {
    json!({
        "write": {
            "command": "display",
            "animType": "extControl",
            "extControlVersion": "v2",
        }
    })
}

pub fn select_effect_command(name: &str) -> Value {
    json!({ "select": name })
}

pub fn off_command() -> Value {
    json!({ "on": { "value": false } })
}

pub fn brightness_command(percent: u8) -> Value {
    json!({ "brightness": { "value": percent.min(100) } })
}

pub fn parse_token(body: &Value) -> Option<String> {
    body.get("auth_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Multiplies `current` by `factor`, capped at `max`.
///
/// The factor is held to `[1, 10]`; non-finite factors count as 1.
pub fn next_backoff(current: Duration, factor: f64, max: Duration) -> Duration {
    let factor = if factor.is_finite() { factor.clamp(1.0, 10.0) } else { 1.0 };
    Duration::try_from_secs_f64(current.as_secs_f64() * factor)
        .unwrap_or(max)
        .min(max)
}

pub fn format_status(name: &str, panel_count: usize, authenticated: bool) -> String {
    format!(
        "Connected to {} | Panels: {} | Auth: {}",
        name,
        panel_count,
        if authenticated { "Yes" } else { "No" }
    )
}
