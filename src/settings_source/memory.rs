use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::{
    ProviderEvent, SettingKey, SettingValue, SettingsSource, SourceError, WeakEventSender,
};

const SERVICE: &str = "in-memory";

#[derive(Default)]
struct Inner {
    available: bool,
    values: HashMap<SettingKey, SettingValue>,
    subscribers: HashMap<SettingKey, WeakEventSender>,
    watchers: Vec<WeakEventSender>,
    reads: usize,
    subscribe_calls: usize,
}

/// A settings provider held in memory.
///
/// Changing a value through one of the `change_*` helpers behaves like the
/// real provider: the value is stored first, then the change event is
/// delivered to the current subscriber of that key.
pub struct InMemorySource {
    inner: Mutex<Inner>,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySource {
    /// An available provider publishing the same values as a fresh session.
    pub fn new() -> Self {
        let source = Self::unavailable();
        {
            let mut inner = source.lock();
            inner.available = true;
            inner.values.insert(SettingKey::DarkMode, false.into());
            inner.values.insert(SettingKey::AccentColor, 0_i32.into());
            inner.values.insert(SettingKey::FontPointSize, 9.0_f64.into());
            inner.values.insert(SettingKey::FontFamily, "Noto Sans".into());
        }
        source
    }

    /// A provider that is not on the bus and holds no values.
    pub fn unavailable() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a value without announcing it.
    pub fn set(&self, key: SettingKey, value: impl Into<SettingValue>) {
        self.lock().values.insert(key, value.into());
    }

    /// Brings the provider up or down, notifying availability watchers on
    /// every transition.
    pub fn set_available(&self, available: bool) {
        let mut inner = self.lock();
        if inner.available == available {
            return;
        }
        inner.available = available;
        let event = if available {
            ProviderEvent::Registered
        } else {
            ProviderEvent::Unregistered
        };
        inner
            .watchers
            .retain(|watcher| deliver(watcher, event.clone()));
    }

    pub fn change_dark_mode(&self, dark_mode: bool) {
        self.set(SettingKey::DarkMode, dark_mode);
        self.emit(ProviderEvent::DarkModeChanged(dark_mode));
    }

    pub fn change_accent_color(&self, code: i32) {
        self.set(SettingKey::AccentColor, code);
        self.emit(ProviderEvent::AccentColorChanged(code));
    }

    pub fn change_font_size(&self, size: f64) {
        self.set(SettingKey::FontPointSize, size);
        self.emit(ProviderEvent::FontSizeChanged);
    }

    pub fn change_font_family(&self, family: &str) {
        self.set(SettingKey::FontFamily, family);
        self.emit(ProviderEvent::FontFamilyChanged);
    }

    /// Delivers a change event to the subscriber of its key, if any.
    ///
    /// Nothing is delivered while the provider is unavailable.
    pub fn emit(&self, event: ProviderEvent) {
        let Some(key) = event.change_key() else {
            return;
        };
        let mut inner = self.lock();
        if !inner.available {
            return;
        }
        let delivered = inner
            .subscribers
            .get(&key)
            .is_some_and(|subscriber| deliver(subscriber, event.clone()));
        if !delivered {
            inner.subscribers.remove(&key);
        }
        trace!(?event, delivered, "in-memory provider event");
    }

    pub fn is_subscribed(&self, key: SettingKey) -> bool {
        self.lock().subscribers.contains_key(&key)
    }

    /// Number of successful property reads served so far.
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Number of successful subscription requests so far.
    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_calls
    }
}

impl SettingsSource for InMemorySource {
    fn is_available(&self) -> bool {
        self.lock().available
    }

    fn read(&self, key: SettingKey) -> Result<SettingValue, SourceError> {
        let mut inner = self.lock();
        if !inner.available {
            return Err(SourceError::unavailable(SERVICE, "not registered"));
        }
        let value = inner
            .values
            .get(&key)
            .cloned()
            .ok_or_else(|| SourceError::unavailable(SERVICE, format!("no value for {key}")))?;
        inner.reads += 1;
        Ok(value)
    }

    fn subscribe(&self, key: SettingKey, events: WeakEventSender) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if !inner.available {
            return Err(SourceError::unavailable(SERVICE, "not registered"));
        }
        inner.subscribers.insert(key, events);
        inner.subscribe_calls += 1;
        Ok(())
    }

    fn watch_availability(&self, events: WeakEventSender) -> Result<(), SourceError> {
        self.lock().watchers.push(events);
        Ok(())
    }
}

/// Sends `event` if the channel still has a live sender.
fn deliver(events: &WeakEventSender, event: ProviderEvent) -> bool {
    events
        .upgrade()
        .is_some_and(|events| events.send(event).is_ok())
}
