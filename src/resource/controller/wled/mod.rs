use std::sync::Arc;

use crate::error::{Error, Result};
use crate::interface::controller::{
    clamp_brightness, Capabilities, Controller, ControllerContext, ControllerMetadata,
    ControllerState, LightConfig,
};
use crate::interface::palette::{Animation, ColorPalette};
use crate::resource::driver::http::HttpTransport;

pub mod protocol;
use protocol::{WledInfo, INFO_PATH, MAX_SEGMENT_COLORS, STATE_PATH};

pub const SYSTEM_TYPE: &str = "wled";

/// WLED strip controller. No pairing; the device must answer at configure time.
pub struct WledController {
    http: Arc<dyn HttpTransport>,
    transition: u32,
    config: LightConfig,
    state: ControllerState,
    base_url: String,
    info: Option<WledInfo>,
}

impl WledController {
    pub fn new(ctx: &ControllerContext) -> Self {
        Self {
            http: ctx.http.clone(),
            transition: ctx.settings.wled.transition,
            config: LightConfig::default(),
            state: ControllerState::default(),
            base_url: String::new(),
            info: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn led_count(&self) -> usize {
        self.info.as_ref().map_or(0, |i| i.led_count)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn fetch_info(&self) -> Result<WledInfo> {
        let url = self.url(INFO_PATH);
        let body = self.http.get(&url)?.success_json(&url)?;
        protocol::parse_info(&body)
    }

    fn send_state(&self, command: &serde_json::Value) -> Result<()> {
        let url = self.url(STATE_PATH);
        let response = self.http.post(&url, command)?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status,
                url,
            });
        }
        Ok(())
    }
}

impl Controller for WledController {
    fn system_type(&self) -> &'static str {
        SYSTEM_TYPE
    }

    fn initialize(&mut self, config: &LightConfig) -> Result<()> {
        self.state = ControllerState::default();
        self.config = config.clone();
        if !config.has_host() {
            return Err(Error::InvalidConfig("WLED requires a host address".to_string()));
        }

        self.base_url = protocol::base_url(&config.host, config.port);
        let info = self.fetch_info().map_err(|err| {
            log::warn!(url = self.base_url.as_str(), err:display = err; "[wled] Device did not answer info query");
            err
        })?;

        log::info!(
            name = info.name.as_str(),
            version = info.version.as_str(),
            leds = info.led_count;
            "[wled] Connected"
        );
        self.info = Some(info);
        self.state = ControllerState {
            initialized: true,
            authenticated: true,
            connected: true,
        };
        Ok(())
    }

    fn test_connection(&mut self) -> Result<()> {
        let info = self.fetch_info()?;
        self.info = Some(info);
        self.state.connected = true;
        Ok(())
    }

    fn display_palette(&mut self, palette: &ColorPalette) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        let command = protocol::state_command(palette, self.transition);
        self.send_state(&command)?;
        log::info!(
            colors = palette.len().min(MAX_SEGMENT_COLORS),
            animation = palette.animation().as_str();
            "[wled] Palette displayed"
        );
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.send_state(&protocol::off_command())
    }

    fn set_brightness(&mut self, brightness: i32) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.send_state(&protocol::brightness_command(clamp_brightness(brightness)))
    }

    fn status(&self) -> String {
        if !self.state.initialized {
            return "Not initialized".to_string();
        }

        let url = self.url(STATE_PATH);
        match self.http.get(&url).and_then(|r| r.success_json(&url)) {
            Ok(state) => protocol::format_status(&state, self.led_count()),
            Err(err) => {
                log::debug!(err:display = err; "[wled] Status query failed");
                "Connection failed".to_string()
            }
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            system_type: SYSTEM_TYPE.to_string(),
            animations: Animation::ALL.to_vec(),
            max_colors: MAX_SEGMENT_COLORS,
            led_count: Some(self.led_count()),
            panel_count: None,
            requires_auth: false,
            direct_drive: false,
            supports_brightness: true,
        }
    }

    fn state(&self) -> ControllerState {
        self.state
    }

    fn is_ready(&self) -> bool {
        self.state.is_ready() && self.config.has_host()
    }

    fn updated_config(&self) -> LightConfig {
        self.config.clone()
    }
}

fn factory(ctx: &ControllerContext) -> Box<dyn Controller> {
    Box::new(WledController::new(ctx))
}

inventory::submit!(ControllerMetadata {
    system_type: SYSTEM_TYPE,
    description: "WLED JSON API over HTTP",
    factory,
});
