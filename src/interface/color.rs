use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees `[0, 360)`, saturation and brightness in `[0, 100]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hsb {
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);
    pub const RED: RgbColor = RgbColor::new(255, 0, 0);
    pub const GREEN: RgbColor = RgbColor::new(0, 255, 0);
    pub const BLUE: RgbColor = RgbColor::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`, any case. Anything else decodes to black.
    pub fn from_hex(input: &str) -> Self {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 {
            return Self::BLACK;
        }

        let mut bytes = [0u8; 3];
        match hex::decode_to_slice(digits, &mut bytes) {
            Ok(()) => Self::new(bytes[0], bytes[1], bytes[2]),
            Err(_) => Self::BLACK,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{}", hex::encode_upper([self.r, self.g, self.b]))
    }

    pub const fn from_packed(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub const fn to_packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub fn to_hsb(self) -> Hsb {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let mut hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / delta) % 6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        if hue < 0.0 {
            hue += 360.0;
        }
        if hue >= 360.0 {
            hue -= 360.0;
        }

        let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

        Hsb {
            hue,
            saturation,
            brightness: max * 100.0,
        }
    }

    /// Linear blend from `self` towards `other`; `t` is clamped to `[0, 1]`.
    pub fn interpolate(self, other: RgbColor, t: f32) -> RgbColor {
        let t = clamp_unit(t);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        RgbColor::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Scales every channel by `factor`, clamped to `[0, 1]`.
    pub fn scale(self, factor: f32) -> RgbColor {
        let factor = clamp_unit(factor);
        let mul = |c: u8| (c as f32 * factor).round() as u8;
        RgbColor::new(mul(self.r), mul(self.g), mul(self.b))
    }
}

impl Hsb {
    pub fn to_rgb(self) -> RgbColor {
        hsv_to_rgb(
            self.hue,
            self.saturation.clamp(0.0, 100.0) / 100.0,
            self.brightness.clamp(0.0, 100.0) / 100.0,
        )
    }

    /// Integer triple used on wire formats that take whole numbers.
    pub fn rounded(self) -> (u16, u8, u8) {
        let hue = self.hue.round() as u16 % 360;
        (
            hue,
            self.saturation.round().clamp(0.0, 100.0) as u8,
            self.brightness.round().clamp(0.0, 100.0) as u8,
        )
    }
}

impl From<RgbColor> for Hsb {
    fn from(color: RgbColor) -> Self {
        color.to_hsb()
    }
}

/// `h` in degrees, `s` and `v` in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> RgbColor {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let channel = |value: f32| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    RgbColor::new(channel(r), channel(g), channel(b))
}

/// Integer re-mapping with the same arithmetic as the Arduino `map` helper.
pub fn map_range(value: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    if in_max == in_min {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
