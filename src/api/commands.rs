use crate::api::dto::{CommandAck, ConfigureRequest, PaletteRequest, StatusReport};
use crate::error::Result;
use crate::interface::color::RgbColor;
use crate::interface::palette::{Animation, ColorPalette};
use crate::manager::LightManager;

const DEMO_DURATION_MS: u32 = 3000;

/// Applies a configuration request, then pairs if the backend needs it.
pub fn configure(manager: &mut LightManager, request: ConfigureRequest) -> Result<()> {
    log::info!(
        system = request.system_type.as_str(),
        host = request.host_address.as_str(),
        port = request.port;
        "[commands] Configure lighting"
    );

    manager.configure(
        &request.system_type,
        &request.host_address,
        request.port,
        request.auth_token.as_deref().filter(|t| !t.is_empty()),
        request.custom_config,
    )?;

    if manager.requires_user_authentication() {
        manager.authenticate_lighting_system()?;
    }
    Ok(())
}

pub fn display_palette(manager: &mut LightManager, request: PaletteRequest) -> Result<()> {
    let palette = request.into_palette();
    log::debug!(colors = palette.len(), animation = palette.animation().as_str(); "[commands] Palette received");
    manager.display_palette(&palette)
}

/// Round trip to the device followed by a short red, green, blue fade.
pub fn test(manager: &mut LightManager) -> Result<()> {
    manager.test_connection()?;
    manager.display_palette(&demo_palette())
}

pub fn status(manager: &LightManager) -> StatusReport {
    manager.status_report()
}

pub fn ack<T>(result: Result<T>) -> CommandAck {
    let ack = CommandAck::from_result(&result);
    if let Some(error) = ack.error.as_deref() {
        log::warn!(error = error; "[commands] Command failed");
    }
    ack
}

pub fn demo_palette() -> ColorPalette {
    ColorPalette::new([RgbColor::RED, RgbColor::GREEN, RgbColor::BLUE])
        .with_animation(Animation::Fade)
        .with_duration(DEMO_DURATION_MS)
        .with_name("Connection Test")
}
