use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::interface::controller::{Capabilities, UserNotification};
use crate::interface::palette::{Animation, ColorPalette, DEFAULT_DURATION_MS};

// ============================================================================
// Driver settings (persisted as JSON next to the device state)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NanoleafSettings {
    pub pairing_timeout_ms: u64,
    pub pairing_poll_ms: u64,
    /// Progress notifications are emitted on attempts 1, 1+n, 1+2n, ...
    pub progress_every: u32,
    pub responder_attempts: u32,
    pub responder_backoff_ms: u64,
    pub discovery_attempts: u32,
    pub discovery_initial_backoff_ms: u64,
    pub discovery_max_backoff_ms: u64,
    pub discovery_backoff_factor: f64,
    pub discovery_window_ms: u64,
    pub max_discovered: usize,
}

impl Default for NanoleafSettings {
    fn default() -> Self {
        Self {
            pairing_timeout_ms: 30_000,
            pairing_poll_ms: 2_000,
            progress_every: 5,
            responder_attempts: 3,
            responder_backoff_ms: 2_000,
            discovery_attempts: 5,
            discovery_initial_backoff_ms: 2_000,
            discovery_max_backoff_ms: 10_000,
            discovery_backoff_factor: 1.5,
            discovery_window_ms: 3_000,
            max_discovered: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WledSettings {
    /// Transition time in tenths of a second.
    pub transition: u32,
}

impl Default for WledSettings {
    fn default() -> Self {
        Self { transition: 7 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ws2812Settings {
    pub fade_step_ms: u64,
    pub min_step_interval_ms: u64,
    pub rainbow_steps: u32,
    pub spi_device: String,
    pub spi_speed_hz: u32,
}

impl Default for Ws2812Settings {
    fn default() -> Self {
        Self {
            fade_step_ms: 50,
            min_step_interval_ms: 50,
            rainbow_steps: 360,
            spi_device: "/dev/spidev0.0".to_string(),
            spi_speed_hz: 2_400_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverSettings {
    pub schema_version: u32,
    pub http_timeout_ms: u64,
    pub nanoleaf: NanoleafSettings,
    pub wled: WledSettings,
    pub ws2812: Ws2812Settings,
}

impl DriverSettings {
    pub fn default_for_device() -> Self {
        DriverSettings {
            schema_version: 1,
            http_timeout_ms: 5_000,
            nanoleaf: NanoleafSettings::default(),
            wled: WledSettings::default(),
            ws2812: Ws2812Settings::default(),
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::default_for_device()
    }
}

// ============================================================================
// Requests delivered by the message transport
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    pub system_type: String,
    #[serde(default)]
    pub host_address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub custom_config: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteRequest {
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

impl PaletteRequest {
    pub fn into_palette(self) -> ColorPalette {
        let animation = self
            .animation
            .as_deref()
            .map(Animation::parse)
            .unwrap_or_default();

        ColorPalette::from_hex(&self.colors)
            .with_animation(animation)
            .with_duration(self.duration.unwrap_or(DEFAULT_DURATION_MS))
            .with_name(self.name.unwrap_or_default())
            .with_message_id(self.message_id.unwrap_or_default())
            .with_sender_name(self.sender_name.unwrap_or_default())
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub has_lighting_system: bool,
    pub system_type: String,
    pub is_ready: bool,
    pub requires_authentication: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: String,
    pub instructions: String,
    pub timeout: u32,
}

impl From<UserNotification> for NotificationEvent {
    fn from(notification: UserNotification) -> Self {
        NotificationEvent {
            kind: "userActionRequired",
            action: notification.action,
            instructions: notification.instructions,
            timeout: notification.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandAck {
    pub fn from_result<T>(result: &crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => CommandAck { ok: true, error: None },
            Err(err) => CommandAck {
                ok: false,
                error: Some(err.to_string()),
            },
        }
    }
}
