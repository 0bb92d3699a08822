//! Renders colour palettes on networked and directly driven LED hardware.
//!
//! A [`LightManager`] owns one active [`Controller`] chosen by system type
//! (`nanoleaf`, `wled` or `ws2812`), persists its configuration through a
//! [`KeyValueStore`] and surfaces pairing instructions through a
//! [`NotificationSink`].

pub mod api;
pub mod error;
pub mod interface;
pub mod manager;
pub mod resource;

pub use api::config_store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use api::dto::DriverSettings;
pub use error::{Error, Result};
pub use interface::color::RgbColor;
pub use interface::controller::{
    Capabilities, ConfigPatch, Controller, ControllerContext, LightConfig, NotificationSink,
    UserNotification,
};
pub use interface::palette::{Animation, ColorPalette};
pub use manager::LightManager;
