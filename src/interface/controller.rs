use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::api::dto::DriverSettings;
use crate::error::Result;
use crate::interface::palette::{Animation, ColorPalette};
use crate::resource::driver::clock::{Clock, SystemClock};
use crate::resource::driver::http::{HttpTransport, ReqwestTransport};
use crate::resource::driver::mdns::{MdnsBrowser, ServiceBrowser};
use crate::resource::driver::strip::{SpiStripOpener, StripOpener};

/// Connection settings for the active lighting system.
///
/// `custom` is the backend-specific extension block (pin numbers, LED counts
/// and so on). It is stored as a JSON string and handed to the controller
/// untouched.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightConfig {
    pub system_type: String,
    pub host: String,
    pub port: u16,
    pub auth_token: String,
    pub custom: Map<String, Value>,
}

impl LightConfig {
    pub fn new(system_type: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            system_type: system_type.into(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.system_type.is_empty()
    }

    pub fn has_host(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn has_auth_token(&self) -> bool {
        !self.auth_token.is_empty()
    }

    /// Merges a patch returned by authentication.
    ///
    /// Only populated fields are copied: empty strings and a zero port never
    /// replace an existing value. Returns `true` when anything changed.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> bool {
        let mut changed = false;

        if let Some(host) = patch.host.as_deref().filter(|h| !h.is_empty()) {
            if self.host != host {
                self.host = host.to_string();
                changed = true;
            }
        }
        if let Some(port) = patch.port.filter(|p| *p != 0) {
            if self.port != port {
                self.port = port;
                changed = true;
            }
        }
        if let Some(token) = patch.auth_token.as_deref().filter(|t| !t.is_empty()) {
            if self.auth_token != token {
                self.auth_token = token.to_string();
                changed = true;
            }
        }

        changed
    }

    pub fn custom_i64(&self, key: &str) -> Option<i64> {
        self.custom.get(key).and_then(Value::as_i64)
    }

    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom.get(key).and_then(Value::as_str)
    }
}

impl std::fmt::Debug for LightConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightConfig")
            .field("system_type", &self.system_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_token", &mask_token(&self.auth_token))
            .field("custom", &self.custom)
            .finish()
    }
}

/// Never log a token in full.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}***")
}

/// Fields learned during authentication or discovery.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_token: Option<String>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none() && self.auth_token.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub system_type: String,
    pub animations: Vec<Animation>,
    pub max_colors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_count: Option<usize>,
    pub requires_auth: bool,
    pub direct_drive: bool,
    pub supports_brightness: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub action: String,
    pub instructions: String,
    #[serde(rename = "timeout")]
    pub timeout_secs: u32,
}

impl UserNotification {
    pub fn new(action: &str, instructions: impl Into<String>, timeout_secs: u32) -> Self {
        Self {
            action: action.to_string(),
            instructions: instructions.into(),
            timeout_secs,
        }
    }
}

/// Receives human-actionable instructions, e.g. "hold the power button".
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: UserNotification);
}

impl NotificationSink for flume::Sender<UserNotification> {
    fn notify(&self, notification: UserNotification) {
        if let Err(err) = self.send(notification) {
            log::warn!(err:display = err; "[notify] Notification receiver dropped");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardNotifications;

impl NotificationSink for DiscardNotifications {
    fn notify(&self, notification: UserNotification) {
        log::debug!(action = notification.action.as_str(); "[notify] No sink attached");
    }
}

/// Lifecycle flags every controller tracks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub initialized: bool,
    pub authenticated: bool,
    pub connected: bool,
}

impl ControllerState {
    pub fn is_ready(&self) -> bool {
        self.initialized && self.authenticated
    }
}

pub fn clamp_brightness(brightness: i32) -> u8 {
    brightness.clamp(0, 100) as u8
}

/// Capability contract shared by every lighting backend.
pub trait Controller: Send {
    fn system_type(&self) -> &'static str;

    /// Must not fail just because the device is powered off or unpaired;
    /// such controllers report `is_ready() == false` instead.
    fn initialize(&mut self, config: &LightConfig) -> Result<()>;

    /// One live round trip. Only success touches the connected flag.
    fn test_connection(&mut self) -> Result<()>;

    fn display_palette(&mut self, palette: &ColorPalette) -> Result<()>;

    fn turn_off(&mut self) -> Result<()>;

    /// `brightness` is a percentage and is clamped to `[0, 100]`.
    fn set_brightness(&mut self, brightness: i32) -> Result<()>;

    fn status(&self) -> String;

    fn capabilities(&self) -> Capabilities;

    fn requires_authentication(&self) -> bool {
        false
    }

    fn authenticate(&mut self) -> Result<ConfigPatch> {
        Ok(ConfigPatch::default())
    }

    fn state(&self) -> ControllerState;

    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn updated_config(&self) -> LightConfig;

    /// Called from the host loop; must not block.
    fn tick(&mut self, _now: Instant) {}

    fn is_animating(&self) -> bool {
        false
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Everything a controller needs from the outside world.
#[derive(Clone)]
pub struct ControllerContext {
    pub http: Arc<dyn HttpTransport>,
    pub browser: Arc<dyn ServiceBrowser>,
    pub clock: Arc<dyn Clock>,
    pub strips: Arc<dyn StripOpener>,
    pub notifier: Arc<dyn NotificationSink>,
    pub settings: DriverSettings,
}

impl ControllerContext {
    /// Real network, mDNS, SPI and wall clock.
    pub fn system(settings: DriverSettings, notifier: Arc<dyn NotificationSink>) -> Result<Self> {
        let timeout = std::time::Duration::from_millis(settings.http_timeout_ms);
        Ok(Self {
            http: Arc::new(ReqwestTransport::new(timeout)?),
            browser: Arc::new(MdnsBrowser::new()),
            clock: Arc::new(SystemClock),
            strips: Arc::new(SpiStripOpener),
            notifier,
            settings,
        })
    }

    pub fn notify(&self, action: &str, instructions: impl Into<String>, timeout_secs: u32) {
        self.notifier
            .notify(UserNotification::new(action, instructions, timeout_secs));
    }
}

pub struct ControllerMetadata {
    pub system_type: &'static str,
    pub description: &'static str,
    pub factory: fn(&ControllerContext) -> Box<dyn Controller>,
}

inventory::collect!(ControllerMetadata);
