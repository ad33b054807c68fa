//! Session bus binding for the theme settings provider.
//!
//! The provider publishes `isDarkMode`, `accentColor`, `systemFontPointSize`
//! and `systemFont` as properties and announces changes with one signal per
//! property.

use zbus::proxy;

mod source;

pub use source::DBusSettingsSource;

pub const SERVICE: &str = "com.pisces.Settings";
pub const OBJECT_PATH: &str = "/Theme";
pub const INTERFACE: &str = "com.pisces.Theme";

/// Where the provider lives on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub service: String,
    pub path: String,
    pub interface: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            service: SERVICE.to_string(),
            path: OBJECT_PATH.to_string(),
            interface: INTERFACE.to_string(),
        }
    }
}

/// D-Bus proxy for the provider's change signals.
///
/// Properties are read through the untyped proxy so the property and
/// signal accessors don't collide.
#[proxy(
    interface = "com.pisces.Theme",
    default_service = "com.pisces.Settings",
    default_path = "/Theme"
)]
pub trait ThemeSettings {
    #[zbus(signal, name = "darkModeChanged")]
    fn dark_mode_changed(&self, dark_mode: bool) -> zbus::Result<()>;

    #[zbus(signal, name = "accentColorChanged")]
    fn accent_color_changed(&self, accent_color: i32) -> zbus::Result<()>;

    #[zbus(signal, name = "systemFontPointSizeChanged")]
    fn system_font_point_size_changed(&self) -> zbus::Result<()>;

    #[zbus(signal, name = "systemFontChanged")]
    fn system_font_changed(&self) -> zbus::Result<()>;
}
