use serde::{Deserialize, Serialize};

use crate::interface::color::RgbColor;

pub const MAX_PALETTE_COLORS: usize = 10;
pub const DEFAULT_DURATION_MS: u32 = 5000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    Static,
    Fade,
    Wipe,
    Rainbow,
}

impl Animation {
    pub const ALL: [Animation; 4] = [
        Animation::Static,
        Animation::Fade,
        Animation::Wipe,
        Animation::Rainbow,
    ];

    /// Unrecognised tags fall back to `Static`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "fade" => Animation::Fade,
            "wipe" => Animation::Wipe,
            "rainbow" => Animation::Rainbow,
            _ => Animation::Static,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Animation::Static => "static",
            Animation::Fade => "fade",
            Animation::Wipe => "wipe",
            Animation::Rainbow => "rainbow",
        }
    }
}

impl std::fmt::Display for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of up to ten colours plus how they should be shown.
///
/// Order matters: backends assign colours to panels or pixels by index.
/// Once built the palette is read-only; the `with_*` builders consume it.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorPalette {
    colors: Vec<RgbColor>,
    duration_ms: u32,
    animation: Animation,
    name: String,
    message_id: String,
    sender_name: String,
}

impl ColorPalette {
    pub fn new(colors: impl IntoIterator<Item = RgbColor>) -> Self {
        Self {
            colors: colors.into_iter().take(MAX_PALETTE_COLORS).collect(),
            duration_ms: DEFAULT_DURATION_MS,
            animation: Animation::Static,
            name: String::new(),
            message_id: String::new(),
            sender_name: String::new(),
        }
    }

    pub fn from_hex<S: AsRef<str>>(colors: &[S]) -> Self {
        Self::new(colors.iter().map(|c| RgbColor::from_hex(c.as_ref())))
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_sender_name(mut self, sender_name: impl Into<String>) -> Self {
        self.sender_name = sender_name.into();
        self
    }

    pub fn colors(&self) -> &[RgbColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Wrap-around lookup; an empty palette yields black.
    pub fn color_at(&self, index: usize) -> RgbColor {
        if self.colors.is_empty() {
            return RgbColor::BLACK;
        }
        self.colors[index % self.colors.len()]
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn animation(&self) -> Animation {
        self.animation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }
}
