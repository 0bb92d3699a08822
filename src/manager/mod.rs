pub mod inventory;

use serde_json::{Map, Value};
use std::sync::Arc;

use self::inventory::{create_controller, is_system_supported, supported_systems};
use crate::api::config_store::KeyValueStore;
use crate::api::dto::{DriverSettings, StatusReport};
use crate::error::{Error, Result};
use crate::interface::controller::{
    mask_token, Capabilities, ConfigPatch, Controller, ControllerContext, LightConfig,
    NotificationSink, UserNotification,
};
use crate::interface::palette::ColorPalette;
use crate::resource::controller::{nanoleaf, wled, ws2812};

pub const PREF_NAMESPACE: &str = "light_config";
pub const PREF_SYSTEM_TYPE: &str = "system_type";
pub const PREF_HOST_ADDRESS: &str = "host_addr";
pub const PREF_PORT: &str = "port";
pub const PREF_AUTH_TOKEN: &str = "auth_token";
pub const PREF_CUSTOM_CONFIG: &str = "custom_config";

/// Written by the provisioning flow when the user picks a lighting system
/// during Wi-Fi setup. Takes precedence over `PREF_NAMESPACE`.
pub const PROVISIONING_NAMESPACE: &str = "palpalette";
pub const PROVISIONING_SYSTEM: &str = "lighting_system";
pub const PROVISIONING_HOST: &str = "lighting_host";
pub const PROVISIONING_PORT: &str = "lighting_port";

/// Logs user-facing instructions before handing them to the host's sink.
struct ForwardingSink {
    inner: Arc<dyn NotificationSink>,
}

impl NotificationSink for ForwardingSink {
    fn notify(&self, notification: UserNotification) {
        log::info!(
            action = notification.action.as_str(),
            timeout = notification.timeout_secs;
            "[manager] User action: {}",
            notification.instructions
        );
        self.inner.notify(notification);
    }
}

/// Owns the one active lighting controller and its persisted configuration.
///
/// Everything runs on the caller's thread. Network calls block for their
/// bounded timeouts and the animation engine is driven through [`tick`].
///
/// [`tick`]: LightManager::tick
pub struct LightManager {
    store: Arc<dyn KeyValueStore>,
    ctx: ControllerContext,
    config: LightConfig,
    controller: Option<Box<dyn Controller>>,
    initialized: bool,
}

impl LightManager {
    pub fn new(store: Arc<dyn KeyValueStore>, mut ctx: ControllerContext) -> Self {
        ctx.notifier = Arc::new(ForwardingSink {
            inner: ctx.notifier.clone(),
        });
        Self {
            store,
            ctx,
            config: LightConfig::default(),
            controller: None,
            initialized: false,
        }
    }

    /// Manager wired to real HTTP, mDNS, SPI and wall-clock drivers.
    pub fn with_system_drivers(
        store: Arc<dyn KeyValueStore>,
        settings: DriverSettings,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        Ok(Self::new(store, ControllerContext::system(settings, notifier)?))
    }

    pub fn begin(&mut self) -> Result<()> {
        if !self.load_configuration()? {
            log::info!("[manager] No lighting configuration found, waiting for configure");
            self.initialized = true;
            return Ok(());
        }

        let system_type = self.config.system_type.clone();
        log::info!(system = system_type.as_str(); "[manager] Loaded lighting configuration");

        let mut controller = create_controller(&system_type, &self.ctx)
            .ok_or_else(|| Error::UnsupportedSystem(system_type.clone()))?;

        match controller.initialize(&self.config) {
            Ok(()) => {
                if !controller.requires_authentication() {
                    log::info!(system = system_type.as_str(); "[manager] Lighting system needs no authentication");
                } else if !self.config.has_auth_token() {
                    log::info!(system = system_type.as_str(); "[manager] Authentication required after pairing");
                } else if controller.is_ready() {
                    log::info!(system = system_type.as_str(); "[manager] Stored credentials accepted");
                } else {
                    log::warn!(system = system_type.as_str(); "[manager] Stored credentials not yet validated");
                }
            }
            Err(err) => {
                log::warn!(
                    system = system_type.as_str(),
                    err:display = err;
                    "[manager] Controller failed to initialize, hardware may be offline"
                );
            }
        }

        self.controller = Some(controller);
        self.initialized = true;
        Ok(())
    }

    pub fn begin_without_config(&mut self) {
        log::info!("[manager] Started without configuration");
        self.initialized = true;
    }

    /// Replaces the active lighting system.
    ///
    /// The previous controller is always torn down first, even when
    /// `system_type` turns out to be unknown. A controller that fails to
    /// initialize is dropped and nothing is saved.
    pub fn configure(
        &mut self,
        system_type: &str,
        host: &str,
        port: u16,
        auth_token: Option<&str>,
        custom: Option<Map<String, Value>>,
    ) -> Result<()> {
        let system_type = system_type.trim().to_ascii_lowercase();
        self.cleanup_controller();

        if !is_system_supported(&system_type) {
            log::warn!(system = system_type.as_str(); "[manager] Unknown lighting system");
            return Err(Error::UnsupportedSystem(system_type));
        }

        self.config = LightConfig {
            custom: custom.unwrap_or_else(|| Self::default_custom_config(&system_type)),
            auth_token: auth_token.unwrap_or_default().to_string(),
            ..LightConfig::new(system_type.as_str(), host.trim(), port)
        };

        let mut controller = create_controller(&system_type, &self.ctx)
            .ok_or_else(|| Error::UnsupportedSystem(system_type.clone()))?;

        if let Err(err) = controller.initialize(&self.config) {
            log::warn!(system = system_type.as_str(), err:display = err; "[manager] Failed to initialize controller");
            return Err(err);
        }

        self.controller = Some(controller);
        self.initialized = true;
        if let Err(err) = self.save_configuration() {
            log::warn!(err:display = err; "[manager] Configuration not persisted");
        }

        log::info!(
            system = system_type.as_str(),
            host = self.config.host.as_str(),
            port = self.config.port;
            "[manager] Lighting system configured"
        );
        Ok(())
    }

    fn cleanup_controller(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            if let Err(err) = controller.disconnect() {
                log::warn!(system = controller.system_type(), err:display = err; "[manager] Disconnect failed");
            }
        }
        self.initialized = false;
    }

    fn ready_controller(&mut self) -> Result<&mut Box<dyn Controller>> {
        if !self.initialized {
            return Err(Error::NotConfigured);
        }
        let controller = self.controller.as_mut().ok_or(Error::NotConfigured)?;
        if !controller.is_ready() {
            return Err(Error::NotReady);
        }
        Ok(controller)
    }

    pub fn display_palette(&mut self, palette: &ColorPalette) -> Result<()> {
        let controller = self.ready_controller().map_err(|err| {
            log::warn!(err:display = err; "[manager] Cannot display palette");
            err
        })?;
        log::info!(
            name = palette.name(),
            sender = palette.sender_name(),
            message = palette.message_id();
            "[manager] Displaying palette"
        );
        controller.display_palette(palette)
    }

    pub fn turn_off(&mut self) -> Result<()> {
        self.ready_controller()?.turn_off()
    }

    pub fn set_brightness(&mut self, brightness: i32) -> Result<()> {
        self.ready_controller()?.set_brightness(brightness)
    }

    pub fn test_connection(&mut self) -> Result<()> {
        self.ready_controller()?.test_connection()
    }

    pub fn status(&self) -> String {
        match self.controller.as_ref() {
            Some(controller) if self.is_ready() => controller.status(),
            _ => "Not Initialized".to_string(),
        }
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        match self.controller.as_ref() {
            Some(controller) if self.is_ready() => Some(controller.capabilities()),
            _ => None,
        }
    }

    pub fn requires_authentication(&self) -> bool {
        match self.controller.as_ref() {
            Some(controller) if self.is_ready() => controller.requires_authentication(),
            _ => false,
        }
    }

    /// Authenticates an initialized controller and persists what it learned.
    pub fn authenticate(&mut self) -> Result<()> {
        let initialized = self.initialized
            && self
                .controller
                .as_ref()
                .is_some_and(|c| c.state().initialized);
        if !initialized {
            return Err(Error::NotConfigured);
        }
        self.run_authentication()
    }

    /// Like [`authenticate`](Self::authenticate) but succeeds immediately for
    /// backends without authentication.
    pub fn authenticate_lighting_system(&mut self) -> Result<()> {
        let controller = self.controller.as_ref().ok_or(Error::NotConfigured)?;
        if !controller.requires_authentication() {
            log::info!(system = controller.system_type(); "[manager] No authentication required");
            return Ok(());
        }
        self.run_authentication()
    }

    fn run_authentication(&mut self) -> Result<()> {
        let controller = self.controller.as_mut().ok_or(Error::NotConfigured)?;
        log::info!(system = controller.system_type(); "[manager] Starting authentication");

        let patch = match controller.authenticate() {
            Ok(patch) => patch,
            Err(err) => {
                log::warn!(err:display = err; "[manager] Authentication failed");
                return Err(err);
            }
        };
        self.merge_patch(&patch);

        if let Err(err) = self.save_configuration() {
            log::warn!(err:display = err; "[manager] Authenticated configuration not persisted");
        }
        log::info!(system = self.config.system_type.as_str(); "[manager] Authentication successful");
        Ok(())
    }

    fn merge_patch(&mut self, patch: &ConfigPatch) {
        if self.config.apply_patch(patch) {
            log::info!(
                host = self.config.host.as_str(),
                port = self.config.port,
                token = mask_token(&self.config.auth_token).as_str();
                "[manager] Configuration updated by authentication"
            );
        }
    }

    pub fn requires_user_authentication(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(|c| c.requires_authentication() && !c.is_ready())
    }

    pub fn current_system_type(&self) -> &str {
        &self.config.system_type
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    pub fn controller(&self) -> Option<&dyn Controller> {
        self.controller.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_ready(&self) -> bool {
        self.initialized && self.controller.as_ref().is_some_and(|c| c.is_ready())
    }

    pub fn save_configuration(&self) -> Result<()> {
        if !self.config.is_configured() {
            return Err(Error::InvalidConfig("system type is empty".to_string()));
        }

        let custom = if self.config.custom.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.config.custom)?
        };

        let store = &self.store;
        store.put_str(PREF_NAMESPACE, PREF_SYSTEM_TYPE, &self.config.system_type)?;
        store.put_str(PREF_NAMESPACE, PREF_HOST_ADDRESS, &self.config.host)?;
        store.put_int(PREF_NAMESPACE, PREF_PORT, self.config.port as i64)?;
        store.put_str(PREF_NAMESPACE, PREF_AUTH_TOKEN, &self.config.auth_token)?;
        store.put_str(PREF_NAMESPACE, PREF_CUSTOM_CONFIG, &custom)?;

        let saved_type = store.get_str_or(PREF_NAMESPACE, PREF_SYSTEM_TYPE, "");
        let saved_token = store.get_str_or(PREF_NAMESPACE, PREF_AUTH_TOKEN, "");
        if saved_type != self.config.system_type || saved_token != self.config.auth_token {
            return Err(Error::Storage("saved configuration did not read back".to_string()));
        }

        log::info!(
            system = self.config.system_type.as_str(),
            host = self.config.host.as_str(),
            port = self.config.port,
            token = mask_token(&self.config.auth_token).as_str();
            "[manager] Configuration saved"
        );
        Ok(())
    }

    /// Loads provisioning settings first, then the last saved configuration.
    /// Returns `false` when neither exists.
    pub fn load_configuration(&mut self) -> Result<bool> {
        let store = self.store.clone();

        let provisioned = store.get_str_or(PROVISIONING_NAMESPACE, PROVISIONING_SYSTEM, "");
        if !provisioned.is_empty() {
            let system_type = provisioned.trim().to_ascii_lowercase();
            let defaults = Self::default_config(&system_type);
            let port = match store.get_int(PROVISIONING_NAMESPACE, PROVISIONING_PORT)? {
                Some(port) if port > 0 => to_port(port),
                _ => defaults.port,
            };

            log::info!(system = system_type.as_str(); "[manager] Using provisioned lighting configuration");
            self.config = LightConfig {
                host: store.get_str_or(PROVISIONING_NAMESPACE, PROVISIONING_HOST, ""),
                port,
                ..defaults
            };
            return Ok(true);
        }

        let system_type = store.get_str_or(PREF_NAMESPACE, PREF_SYSTEM_TYPE, "");
        if system_type.is_empty() {
            self.config = LightConfig::default();
            return Ok(false);
        }

        let custom_raw = store.get_str_or(PREF_NAMESPACE, PREF_CUSTOM_CONFIG, "");
        self.config = LightConfig {
            system_type,
            host: store.get_str_or(PREF_NAMESPACE, PREF_HOST_ADDRESS, ""),
            port: to_port(store.get_int_or(PREF_NAMESPACE, PREF_PORT, 80)),
            auth_token: store.get_str_or(PREF_NAMESPACE, PREF_AUTH_TOKEN, ""),
            custom: parse_custom_config(&custom_raw),
        };
        Ok(true)
    }

    pub fn reset_configuration(&mut self) -> Result<()> {
        log::info!("[manager] Resetting lighting configuration");
        self.store.clear(PREF_NAMESPACE)?;
        for key in [PROVISIONING_SYSTEM, PROVISIONING_HOST, PROVISIONING_PORT] {
            self.store.remove(PROVISIONING_NAMESPACE, key)?;
        }
        self.cleanup_controller();
        self.config = LightConfig::default();
        Ok(())
    }

    /// Re-runs `initialize` on the existing controller, e.g. once hardware that
    /// was offline at boot comes up.
    pub fn retry_initialization(&mut self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        let controller = self.controller.as_mut().ok_or(Error::NotConfigured)?;
        if !self.config.is_configured() {
            return Err(Error::NotConfigured);
        }

        log::info!(system = self.config.system_type.as_str(); "[manager] Retrying controller initialization");
        controller.initialize(&self.config)?;
        self.initialized = true;
        Ok(())
    }

    /// Advances any running animation. Call from the host loop.
    pub fn tick(&mut self) {
        let now = self.ctx.clock.now();
        if let Some(controller) = self.controller.as_mut() {
            controller.tick(now);
        }
    }

    pub fn is_animating(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_animating())
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            has_lighting_system: self.controller.is_some(),
            system_type: self.config.system_type.clone(),
            is_ready: self.is_ready(),
            requires_authentication: self.requires_user_authentication(),
            status: self.status(),
            capabilities: self.capabilities(),
        }
    }

    pub fn supported_systems() -> Vec<&'static str> {
        supported_systems()
    }

    pub fn default_config(system_type: &str) -> LightConfig {
        let port = match system_type {
            nanoleaf::SYSTEM_TYPE => nanoleaf::protocol::DEFAULT_PORT,
            wled::SYSTEM_TYPE => 80,
            _ => 0,
        };
        LightConfig {
            custom: Self::default_custom_config(system_type),
            ..LightConfig::new(system_type, "", port)
        }
    }

    pub fn default_custom_config(system_type: &str) -> Map<String, Value> {
        let mut custom = Map::new();
        if system_type == ws2812::SYSTEM_TYPE {
            custom.insert("ledPin".into(), Value::from(ws2812::DEFAULT_PIN));
            custom.insert("ledCount".into(), Value::from(ws2812::DEFAULT_LED_COUNT));
            custom.insert("brightness".into(), Value::from(ws2812::DEFAULT_BRIGHTNESS));
        }
        custom
    }
}

impl Drop for LightManager {
    fn drop(&mut self) {
        self.cleanup_controller();
    }
}

fn to_port(value: i64) -> u16 {
    u16::try_from(value).unwrap_or(0)
}

/// Malformed or empty stored JSON becomes an empty object.
fn parse_custom_config(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            log::warn!("[manager] Stored custom config is not a JSON object, using defaults");
            Map::new()
        }
    }
}
