use crate::interface::controller::{Controller, ControllerContext, ControllerMetadata};

pub fn list_controller_drivers() -> Vec<&'static ControllerMetadata> {
    let mut drivers: Vec<_> = inventory::iter::<ControllerMetadata>.into_iter().collect();
    drivers.sort_by_key(|d| d.system_type);
    drivers
}

pub fn get_controller_metadata(system_type: &str) -> Option<&'static ControllerMetadata> {
    let wanted = system_type.trim();
    inventory::iter::<ControllerMetadata>
        .into_iter()
        .find(|driver| driver.system_type.eq_ignore_ascii_case(wanted))
}

/// Builds the controller registered for `system_type`, ignoring case.
pub fn create_controller(system_type: &str, ctx: &ControllerContext) -> Option<Box<dyn Controller>> {
    let driver = get_controller_metadata(system_type)?;
    log::debug!(system = driver.system_type; "[inventory] Creating controller");
    Some((driver.factory)(ctx))
}

pub fn supported_systems() -> Vec<&'static str> {
    list_controller_drivers()
        .into_iter()
        .map(|d| d.system_type)
        .collect()
}

pub fn is_system_supported(system_type: &str) -> bool {
    get_controller_metadata(system_type).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_backends_are_registered() {
        assert_eq!(supported_systems(), vec!["nanoleaf", "wled", "ws2812"]);
    }

    #[test]
    fn lookup_ignores_case() {
        assert!(is_system_supported("WLED"));
        assert!(is_system_supported(" Nanoleaf "));
        assert!(!is_system_supported("hue"));
        assert!(!is_system_supported(""));
    }
}
