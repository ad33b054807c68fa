//! Abstraction over the session settings provider.
//!
//! [`ThemeSync`](crate::ThemeSync) only talks to the provider through
//! [`SettingsSource`]. The D-Bus implementation lives in [`crate::dbus`];
//! [`InMemorySource`] backs tests and embedders without a bus.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

mod memory;

pub use memory::InMemorySource;

/// Properties read from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    DarkMode,
    AccentColor,
    FontPointSize,
    FontFamily,
}

impl SettingKey {
    pub const ALL: &'static [SettingKey] = &[
        SettingKey::DarkMode,
        SettingKey::AccentColor,
        SettingKey::FontPointSize,
        SettingKey::FontFamily,
    ];

    /// Property name as published on the bus.
    pub fn property_name(self) -> &'static str {
        match self {
            SettingKey::DarkMode => "isDarkMode",
            SettingKey::AccentColor => "accentColor",
            SettingKey::FontPointSize => "systemFontPointSize",
            SettingKey::FontFamily => "systemFont",
        }
    }

    /// Name of the signal announcing a change of this property.
    pub fn signal_name(self) -> &'static str {
        match self {
            SettingKey::DarkMode => "darkModeChanged",
            SettingKey::AccentColor => "accentColorChanged",
            SettingKey::FontPointSize => "systemFontPointSizeChanged",
            SettingKey::FontFamily => "systemFontChanged",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_name())
    }
}

/// A loosely typed property value.
///
/// Conversions never fail: a value of the wrong shape coerces to the
/// zero value of the requested type.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl SettingValue {
    pub fn to_bool(&self) -> bool {
        match self {
            SettingValue::Bool(value) => *value,
            SettingValue::Int(value) => *value != 0,
            SettingValue::Double(value) => *value != 0.0,
            SettingValue::Str(value) => {
                let value = value.trim();
                !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
            }
        }
    }

    pub fn to_int(&self) -> i32 {
        match self {
            SettingValue::Bool(value) => i32::from(*value),
            SettingValue::Int(value) => i32::try_from(*value).unwrap_or(0),
            SettingValue::Double(value) => {
                let rounded = value.round();
                if rounded.is_finite() && rounded >= i32::MIN as f64 && rounded <= i32::MAX as f64 {
                    rounded as i32
                } else {
                    0
                }
            }
            SettingValue::Str(value) => value.trim().parse().unwrap_or(0),
        }
    }

    pub fn to_real(&self) -> f64 {
        match self {
            SettingValue::Bool(value) => f64::from(u8::from(*value)),
            SettingValue::Int(value) => *value as f64,
            SettingValue::Double(value) => *value,
            SettingValue::Str(value) => value.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            SettingValue::Bool(value) => value.to_string(),
            SettingValue::Int(value) => value.to_string(),
            SettingValue::Double(value) => value.to_string(),
            SettingValue::Str(value) => value.clone(),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(value.into())
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Double(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("settings provider '{service}' is unavailable: {reason}")]
    ProviderUnavailable { service: String, reason: String },
}

impl SourceError {
    pub fn unavailable(service: impl Into<String>, reason: impl fmt::Display) -> Self {
        SourceError::ProviderUnavailable {
            service: service.into(),
            reason: reason.to_string(),
        }
    }
}

/// Something that happened on the provider side.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// The provider service gained an owner on the bus.
    Registered,
    /// The provider service lost its owner.
    Unregistered,
    DarkModeChanged(bool),
    AccentColorChanged(i32),
    /// Carries no payload; the new size has to be read back.
    FontSizeChanged,
    /// Carries no payload; the new family has to be read back.
    FontFamilyChanged,
}

impl ProviderEvent {
    /// The change event a subscription to `key` delivers.
    pub fn change_key(&self) -> Option<SettingKey> {
        match self {
            ProviderEvent::DarkModeChanged(_) => Some(SettingKey::DarkMode),
            ProviderEvent::AccentColorChanged(_) => Some(SettingKey::AccentColor),
            ProviderEvent::FontSizeChanged => Some(SettingKey::FontPointSize),
            ProviderEvent::FontFamilyChanged => Some(SettingKey::FontFamily),
            ProviderEvent::Registered | ProviderEvent::Unregistered => None,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;
/// Held by sources and [`ThemeSync`](crate::ThemeSync); does not keep the
/// channel open.
pub type WeakEventSender = mpsc::WeakUnboundedSender<ProviderEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Creates the channel provider events are delivered on.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Access to the authoritative theme settings.
///
/// Reads are blocking round trips. Subscriptions push [`ProviderEvent`]s
/// into the given sender for as long as a strong sender of that channel is
/// alive; subscribing the same key again replaces the previous subscription.
pub trait SettingsSource {
    /// Whether the provider currently answers on its endpoint.
    fn is_available(&self) -> bool;

    fn read(&self, key: SettingKey) -> Result<SettingValue, SourceError>;

    fn subscribe(&self, key: SettingKey, events: WeakEventSender) -> Result<(), SourceError>;

    /// Reports [`ProviderEvent::Registered`] and [`ProviderEvent::Unregistered`].
    fn watch_availability(&self, events: WeakEventSender) -> Result<(), SourceError>;
}

impl<T: SettingsSource + ?Sized> SettingsSource for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn read(&self, key: SettingKey) -> Result<SettingValue, SourceError> {
        (**self).read(key)
    }

    fn subscribe(&self, key: SettingKey, events: WeakEventSender) -> Result<(), SourceError> {
        (**self).subscribe(key, events)
    }

    fn watch_availability(&self, events: WeakEventSender) -> Result<(), SourceError> {
        (**self).watch_availability(events)
    }
}
