//! Mirrors the desktop theme settings published on the session bus.
//!
//! [`ThemeSync`] keeps a local copy of dark mode, accent color and system
//! font, reloads it whenever the settings provider (re)appears, and tells
//! registered observers about every change.

pub mod config;
pub mod dbus;
pub mod settings_source;
pub mod theme;
pub mod theme_sync;

pub use settings_source::{
    event_channel, EventReceiver, EventSender, InMemorySource, ProviderEvent, SettingKey,
    SettingValue, SettingsSource, SourceError, WeakEventSender,
};
pub use theme::{AccentColor, Color, ThemeProperty, ThemeState};
pub use theme_sync::{ConnectionState, ThemeSync};
