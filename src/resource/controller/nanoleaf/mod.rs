use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::api::dto::NanoleafSettings;
use crate::error::{Error, Result};
use crate::interface::controller::{
    clamp_brightness, mask_token, Capabilities, ConfigPatch, Controller, ControllerContext,
    ControllerMetadata, ControllerState, LightConfig,
};
use crate::interface::palette::{Animation, ColorPalette, MAX_PALETTE_COLORS};
use crate::resource::driver::clock::Clock;
use crate::resource::driver::http::{HttpResponse, HttpTransport, Method};
use crate::resource::driver::mdns::ServiceBrowser;

pub mod protocol;
use protocol::{PanelInfo, DEFAULT_PORT, EFFECTS_PATH, LAYOUT_PATH, STATE_PATH};

pub const SYSTEM_TYPE: &str = "nanoleaf";

pub const ACTION_PAIRING: &str = "pairing";
pub const ACTION_PAIRING_PROGRESS: &str = "pairing_progress";
pub const ACTION_PAIRING_SUCCESS: &str = "pairing_success";
pub const ACTION_PAIRING_FAILED: &str = "pairing_failed";

const PAIRING_INSTRUCTIONS: &str =
    "Hold the power button on your Nanoleaf for 5-7 seconds until the LED flashes to enter pairing mode";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub hostname: String,
    pub address: String,
    pub port: u16,
    pub responding: bool,
}

/// Nanoleaf panels over the OpenAPI.
///
/// Pairing is a three stage affair: find the controller over mDNS when no host
/// is known, try the stored token, and otherwise poll the pairing endpoint
/// while the user holds the power button.
pub struct NanoleafController {
    ctx: ControllerContext,
    config: LightConfig,
    state: ControllerState,
    base_url: String,
    panels: Vec<PanelInfo>,
    discovered: Vec<DiscoveredDevice>,
    device_name: String,
}

impl NanoleafController {
    pub fn new(ctx: &ControllerContext) -> Self {
        Self {
            ctx: ctx.clone(),
            config: LightConfig::default(),
            state: ControllerState::default(),
            base_url: String::new(),
            panels: Vec::new(),
            discovered: Vec::new(),
            device_name: String::new(),
        }
    }

    fn http(&self) -> &Arc<dyn HttpTransport> {
        &self.ctx.http
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        &self.ctx.clock
    }

    fn browser(&self) -> &Arc<dyn ServiceBrowser> {
        &self.ctx.browser
    }

    fn settings(&self) -> &NanoleafSettings {
        &self.ctx.settings.nanoleaf
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn panels(&self) -> &[PanelInfo] {
        &self.panels
    }

    pub fn discovered_devices(&self) -> &[DiscoveredDevice] {
        &self.discovered
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Adopts the address of a device found during the last discovery pass.
    pub fn select_discovered(&mut self, index: usize) -> Result<()> {
        let device = self
            .discovered
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InvalidConfig(format!("No discovered device at index {index}")))?;

        self.config.host = device.address.clone();
        self.config.port = device.port;
        self.base_url = protocol::base_url(&self.config.host, self.config.port);
        log::info!(
            host = device.hostname.as_str(),
            ip = device.address.as_str(),
            port = device.port;
            "[nanoleaf] Selected device"
        );
        Ok(())
    }

    fn api_request(&self, endpoint: &str, method: Method, body: Option<&Value>) -> Result<HttpResponse> {
        if self.base_url.is_empty() || !self.config.has_auth_token() {
            return Err(Error::NotAuthenticated);
        }
        let url = protocol::api_url(&self.base_url, &self.config.auth_token, endpoint);
        let response = self.http().request(method, &url, body)?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status,
                url: protocol::api_url(&self.base_url, &mask_token(&self.config.auth_token), endpoint),
            });
        }
        Ok(response)
    }

    fn fetch_device_info(&self) -> Result<Value> {
        let info = self.api_request("/", Method::Get, None)?.json()?;
        if info.get("name").is_none() {
            return Err(Error::Protocol("device info is missing 'name'".to_string()));
        }
        Ok(info)
    }

    pub fn fetch_layout(&mut self) -> Result<usize> {
        let layout = self.api_request(LAYOUT_PATH, Method::Get, None)?.json()?;
        self.panels = protocol::parse_layout(&layout)?;
        log::info!(panels = self.panels.len(); "[nanoleaf] Panel layout loaded");
        Ok(self.panels.len())
    }

    pub fn enable_external_control(&self) -> Result<()> {
        self.api_request(EFFECTS_PATH, Method::Put, Some(&protocol::external_control_command()))?;
        Ok(())
    }

    pub fn disable_external_control(&self) -> Result<()> {
        self.api_request(EFFECTS_PATH, Method::Put, Some(&protocol::select_effect_command("Solid")))?;
        Ok(())
    }

    fn start_responder(&self) -> Result<()> {
        let attempts = self.settings().responder_attempts.max(1);
        let backoff = Duration::from_millis(self.settings().responder_backoff_ms);

        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.browser().start(protocol::RESPONDER_NAME) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log::warn!(attempt = attempt, err:display = err; "[nanoleaf] mDNS responder failed to start");
                    last_err = Some(err);
                    if attempt < attempts {
                        self.clock().sleep(backoff);
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::DiscoveryFailed("mDNS responder failed".to_string())))
    }

    /// Browses for controllers and selects the first usable one.
    pub fn discover(&mut self) -> Result<()> {
        self.start_responder()?;

        let settings = self.settings().clone();
        let window = Duration::from_millis(settings.discovery_window_ms);
        let max_backoff = Duration::from_millis(settings.discovery_max_backoff_ms);
        let mut delay = Duration::from_millis(settings.discovery_initial_backoff_ms);

        let mut services = Vec::new();
        let attempts = settings.discovery_attempts.max(1);
        for attempt in 1..=attempts {
            match self.browser().query(protocol::SERVICE_TYPE, window) {
                Ok(found) if !found.is_empty() => {
                    services = found;
                    break;
                }
                Ok(_) => log::debug!(attempt = attempt; "[nanoleaf] No services found"),
                Err(err) => log::warn!(attempt = attempt, err:display = err; "[nanoleaf] Discovery query failed"),
            }
            if attempt < attempts {
                self.clock().sleep(delay);
                delay = protocol::next_backoff(delay, settings.discovery_backoff_factor, max_backoff);
            }
        }

        if services.is_empty() {
            log::warn!(attempts = attempts; "[nanoleaf] No devices found via mDNS");
            return Err(Error::DiscoveryFailed("no Nanoleaf devices found".to_string()));
        }

        // Being resolved over mDNS is taken as proof the device answers.
        self.discovered = services
            .into_iter()
            .filter(|s| !s.address.is_empty())
            .take(settings.max_discovered)
            .map(|s| DiscoveredDevice {
                hostname: s.hostname,
                address: s.address,
                port: s.port,
                responding: true,
            })
            .collect();
        log::info!(devices = self.discovered.len(); "[nanoleaf] Discovery complete");

        match self.discovered.iter().position(|d| d.responding) {
            Some(index) => self.select_discovered(index),
            None => Err(Error::DiscoveryFailed("no usable Nanoleaf devices found".to_string())),
        }
    }

    /// Polls the pairing endpoint until a token is issued or the budget runs out.
    pub fn request_token(&mut self) -> Result<String> {
        let settings = self.settings().clone();
        let timeout = Duration::from_millis(settings.pairing_timeout_ms);
        let poll = Duration::from_millis(settings.pairing_poll_ms);
        let every = settings.progress_every.max(1);
        let url = format!(
            "{}{}",
            protocol::base_url(&self.config.host, self.config.port),
            protocol::PAIRING_PATH
        );
        let empty = serde_json::json!({});

        self.ctx.notify(ACTION_PAIRING, PAIRING_INSTRUCTIONS, timeout.as_secs() as u32);

        let start = self.clock().now();
        let mut attempts: u32 = 0;
        while self.clock().now().saturating_duration_since(start) < timeout {
            attempts += 1;

            match self.http().post(&url, &empty) {
                Ok(response) if response.status == 200 => {
                    match response.json().ok().as_ref().and_then(protocol::parse_token) {
                        Some(token) => {
                            log::info!(
                                attempts = attempts,
                                token = mask_token(&token).as_str();
                                "[nanoleaf] Auth token obtained"
                            );
                            self.ctx
                                .notify(ACTION_PAIRING_SUCCESS, "Nanoleaf pairing completed successfully", 0);
                            return Ok(token);
                        }
                        None => log::warn!(attempt = attempts; "[nanoleaf] Pairing response had no token"),
                    }
                }
                Ok(response) if response.status == 403 => {
                    if (attempts - 1) % every == 0 {
                        let elapsed = self.clock().now().saturating_duration_since(start);
                        let remaining = timeout.saturating_sub(elapsed).as_secs() as u32;
                        log::info!(remaining = remaining; "[nanoleaf] Waiting for pairing mode");
                        self.ctx.notify(
                            ACTION_PAIRING_PROGRESS,
                            format!("Waiting for pairing mode... {remaining} seconds remaining"),
                            remaining,
                        );
                    }
                }
                Ok(response) => {
                    log::warn!(status = response.status; "[nanoleaf] Unexpected pairing status");
                }
                Err(err) => {
                    log::warn!(err:display = err; "[nanoleaf] Pairing request failed");
                }
            }

            self.clock().sleep(poll);
        }

        log::warn!(attempts = attempts; "[nanoleaf] Pairing timed out");
        self.ctx
            .notify(ACTION_PAIRING_FAILED, "Nanoleaf pairing failed or timed out", 0);
        Err(Error::PairingTimeout(timeout.as_secs()))
    }

    fn load_layout_best_effort(&mut self) {
        if let Err(err) = self.fetch_layout() {
            log::warn!(err:display = err; "[nanoleaf] Failed to load panel layout");
        }
    }
}

impl Controller for NanoleafController {
    fn system_type(&self) -> &'static str {
        SYSTEM_TYPE
    }

    fn initialize(&mut self, config: &LightConfig) -> Result<()> {
        self.state = ControllerState::default();
        self.panels.clear();
        self.config = config.clone();
        if self.config.port == 0 {
            self.config.port = DEFAULT_PORT;
        }

        if !self.config.has_host() {
            log::info!("[nanoleaf] No host configured, discovery deferred to authentication");
            self.state.initialized = true;
            return Ok(());
        }

        self.base_url = protocol::base_url(&self.config.host, self.config.port);
        if self.config.has_auth_token() {
            match self.fetch_device_info() {
                Ok(info) => {
                    self.device_name = info["name"].as_str().unwrap_or_default().to_string();
                    self.state.connected = true;
                    self.load_layout_best_effort();
                }
                Err(err) => {
                    log::warn!(err:display = err; "[nanoleaf] Stored token not validated, will retry on first use");
                }
            }
            self.state.authenticated = true;
        }

        self.state.initialized = true;
        Ok(())
    }

    fn test_connection(&mut self) -> Result<()> {
        let info = self.fetch_device_info()?;
        self.device_name = info["name"].as_str().unwrap_or_default().to_string();
        self.state.connected = true;
        Ok(())
    }

    fn display_palette(&mut self, palette: &ColorPalette) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotAuthenticated);
        }

        if !self.state.connected {
            if let Err(err) = self.test_connection() {
                log::warn!(err:display = err; "[nanoleaf] Device still unreachable, sending anyway");
            }
        }

        if self.panels.is_empty() {
            self.load_layout_best_effort();
        }

        let command = if self.panels.is_empty() {
            protocol::solid_display_command(palette)
        } else {
            protocol::static_display_command(&self.panels, palette)
        };
        self.api_request(EFFECTS_PATH, Method::Put, Some(&command))?;

        log::info!(
            colors = palette.len(),
            panels = self.panels.len(),
            name = palette.name();
            "[nanoleaf] Palette displayed"
        );
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotAuthenticated);
        }
        self.api_request(STATE_PATH, Method::Put, Some(&protocol::off_command()))?;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: i32) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotAuthenticated);
        }
        let command = protocol::brightness_command(clamp_brightness(brightness));
        self.api_request(STATE_PATH, Method::Put, Some(&command))?;
        Ok(())
    }

    fn status(&self) -> String {
        if !self.config.has_host() {
            return "No device selected".to_string();
        }
        if !self.is_ready() {
            return "Not authenticated".to_string();
        }
        match self.fetch_device_info() {
            Ok(info) => protocol::format_status(
                info["name"].as_str().unwrap_or("Nanoleaf"),
                self.panels.len(),
                self.state.authenticated,
            ),
            Err(err) => {
                log::debug!(err:display = err; "[nanoleaf] Status query failed");
                "Connection failed".to_string()
            }
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            system_type: SYSTEM_TYPE.to_string(),
            animations: vec![Animation::Static],
            max_colors: MAX_PALETTE_COLORS,
            led_count: None,
            panel_count: Some(self.panels.len()),
            requires_auth: true,
            direct_drive: false,
            supports_brightness: true,
        }
    }

    fn requires_authentication(&self) -> bool {
        true
    }

    fn authenticate(&mut self) -> Result<ConfigPatch> {
        let mut patch = ConfigPatch::default();

        if !self.config.has_host() {
            self.discover()?;
            patch.host = Some(self.config.host.clone());
            patch.port = Some(self.config.port);
        }
        self.base_url = protocol::base_url(&self.config.host, self.config.port);

        if self.config.has_auth_token() {
            match self.test_connection() {
                Ok(()) => {
                    log::info!("[nanoleaf] Stored token accepted");
                    self.state.authenticated = true;
                    self.load_layout_best_effort();
                    return Ok(patch);
                }
                Err(err) => {
                    log::warn!(err:display = err; "[nanoleaf] Stored token rejected, pairing again");
                }
            }
        }

        self.state.authenticated = false;
        let token = self.request_token()?;
        self.config.auth_token = token.clone();
        self.state.authenticated = true;
        self.state.connected = true;
        self.load_layout_best_effort();

        patch.auth_token = Some(token);
        Ok(patch)
    }

    fn state(&self) -> ControllerState {
        self.state
    }

    fn is_ready(&self) -> bool {
        self.state.is_ready() && self.config.has_host() && self.config.has_auth_token()
    }

    fn updated_config(&self) -> LightConfig {
        self.config.clone()
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.state.connected && self.is_ready() {
            if let Err(err) = self.disable_external_control() {
                log::warn!(err:display = err; "[nanoleaf] Failed to release external control");
            }
        }
        self.state = ControllerState::default();
        self.panels.clear();
        Ok(())
    }
}

fn factory(ctx: &ControllerContext) -> Box<dyn Controller> {
    Box::new(NanoleafController::new(ctx))
}

inventory::submit!(ControllerMetadata {
    system_type: SYSTEM_TYPE,
    description: "Nanoleaf panels via the OpenAPI with mDNS discovery and button pairing",
    factory,
});
