//! The cache that mirrors the provider's theme settings.
//!
//! [`ThemeSync`] is owned by a single event thread. Every provider event
//! goes through [`ThemeSync::handle`]; reads issued from there block until
//! the provider answers.

use tracing::{debug, info};

use crate::settings_source::{
    EventReceiver, EventSender, ProviderEvent, SettingKey, SettingsSource, SourceError,
    WeakEventSender,
};
use crate::theme::{Color, ThemeProperty, ThemeState};

mod observers;

pub use observers::{Observer, Observers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Provider not reachable; the cache keeps its last values.
    Disconnected,
    /// Subscribed to the provider's change signals.
    Connected,
}

/// Values read in one pass by [`ThemeSync::initialize`].
struct Snapshot {
    dark_mode: bool,
    accent_color: i32,
    font_size: f64,
    font_family: String,
}

type PixelRatio = Box<dyn Fn() -> f64 + Send>;

pub struct ThemeSync<S: SettingsSource> {
    source: S,
    events: WeakEventSender,
    state: ThemeState,
    connection: ConnectionState,
    observers: Observers,
    pixel_ratio: PixelRatio,
}

impl<S: SettingsSource> ThemeSync<S> {
    /// Starts from the default theme, then watches for the provider, subscribes
    /// to its changes and makes one attempt to read the current values.
    ///
    /// Provider events are pushed into the channel of `events`; feed them
    /// back through [`ThemeSync::handle`]. Neither the sync nor the source
    /// keeps that channel open: once the caller drops its senders,
    /// [`ThemeSync::run`] returns.
    pub fn new(source: S, events: &EventSender) -> Self {
        let mut sync = Self {
            source,
            events: events.downgrade(),
            state: ThemeState::default(),
            connection: ConnectionState::Disconnected,
            observers: Observers::default(),
            pixel_ratio: Box::new(|| 1.0),
        };

        if let Err(err) = sync.source.watch_availability(sync.events.clone()) {
            debug!(%err, "Unable to watch the settings provider");
        }
        sync.subscribe_to_changes();
        sync.initialize();
        sync
    }

    /// Uses `pixel_ratio` to answer [`ThemeSync::device_pixel_ratio`].
    pub fn with_pixel_ratio(mut self, pixel_ratio: impl Fn() -> f64 + Send + 'static) -> Self {
        self.pixel_ratio = Box::new(pixel_ratio);
        self
    }

    /// Reads every value from the provider and overwrites the cache.
    ///
    /// All properties are announced, changed or not. Returns `false` and
    /// leaves the cache untouched when the provider can't be read.
    pub fn initialize(&mut self) -> bool {
        if !self.source.is_available() {
            debug!("Settings provider unavailable, keeping cached theme");
            return false;
        }

        let snapshot = match self.read_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(%err, "Failed to read theme settings, keeping cached theme");
                return false;
            }
        };

        self.state.dark_mode = snapshot.dark_mode;
        self.state.assign_accent(snapshot.accent_color);
        self.state.font_size = snapshot.font_size;
        self.state.font_family = snapshot.font_family;

        debug!(
            dark_mode = self.state.dark_mode,
            accent_color = self.state.accent_color_index,
            font_size = self.state.font_size,
            font_family = %self.state.font_family,
            "Theme settings loaded"
        );

        for property in ThemeProperty::ALL {
            self.observers.emit(*property, &self.state);
        }
        true
    }

    fn read_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(Snapshot {
            dark_mode: self.source.read(SettingKey::DarkMode)?.to_bool(),
            accent_color: self.source.read(SettingKey::AccentColor)?.to_int(),
            font_size: self.source.read(SettingKey::FontPointSize)?.to_real(),
            font_family: self.source.read(SettingKey::FontFamily)?.to_text(),
        })
    }

    /// Subscribes to the four change signals of the provider.
    ///
    /// A no-op returning `false` when the provider is unavailable. A failed
    /// subscription leaves the sync [`ConnectionState::Disconnected`].
    pub fn subscribe_to_changes(&mut self) -> bool {
        if !self.source.is_available() {
            debug!("Settings provider unavailable, not subscribing");
            return false;
        }

        for key in SettingKey::ALL {
            if let Err(err) = self.source.subscribe(*key, self.events.clone()) {
                debug!(%err, signal = key.signal_name(), "Failed to subscribe");
                self.connection = ConnectionState::Disconnected;
                return false;
            }
        }

        self.connection = ConnectionState::Connected;
        true
    }

    /// Applies one provider event to the cache.
    pub fn handle(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::Registered => {
                info!("Settings provider registered, reloading theme");
                self.initialize();
                self.subscribe_to_changes();
            }
            ProviderEvent::Unregistered => {
                if self.connection == ConnectionState::Connected {
                    info!("Settings provider went away, keeping cached theme");
                }
                self.connection = ConnectionState::Disconnected;
            }
            ProviderEvent::DarkModeChanged(dark_mode) => self.on_dark_mode_changed(dark_mode),
            ProviderEvent::AccentColorChanged(code) => self.on_accent_color_changed(code),
            ProviderEvent::FontSizeChanged => self.on_font_size_changed(),
            ProviderEvent::FontFamilyChanged => self.on_font_family_changed(),
        }
    }

    /// Handles every event already queued on `events` without waiting.
    /// Returns the number of events handled.
    pub fn process_pending(&mut self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Handles events until the caller's senders are all dropped.
    ///
    /// Blocks the calling thread; must not be called from within an async
    /// runtime.
    pub fn run(&mut self, events: &mut EventReceiver) {
        while let Some(event) = events.blocking_recv() {
            self.handle(event);
        }
    }

    pub fn on_dark_mode_changed(&mut self, dark_mode: bool) {
        if self.state.dark_mode != dark_mode {
            self.state.dark_mode = dark_mode;
            self.observers.emit(ThemeProperty::DarkMode, &self.state);
        }
    }

    pub fn on_accent_color_changed(&mut self, code: i32) {
        self.set_accent_color(code);
    }

    pub fn on_font_size_changed(&mut self) {
        let size = match self.source.read(SettingKey::FontPointSize) {
            Ok(value) => value.to_real(),
            Err(err) => {
                debug!(%err, "Failed to read font size");
                return;
            }
        };

        if size != self.state.font_size {
            self.state.font_size = size;
            self.observers.emit(ThemeProperty::FontSize, &self.state);
        }
    }

    pub fn on_font_family_changed(&mut self) {
        let family = match self.source.read(SettingKey::FontFamily) {
            Ok(value) => value.to_text(),
            Err(err) => {
                debug!(%err, "Failed to read font family");
                return;
            }
        };

        if family != self.state.font_family {
            self.state.font_family = family;
            self.observers.emit(ThemeProperty::FontFamily, &self.state);
        }
    }

    /// Switches to accent `code`. Compares indices, not colors: two codes that
    /// resolve to the same color still count as a change.
    pub fn set_accent_color(&mut self, code: i32) {
        if self.state.accent_color_index == code {
            return;
        }

        self.state.assign_accent(code);
        self.observers.emit(ThemeProperty::AccentColorIndex, &self.state);
        self.observers.emit(ThemeProperty::AccentColor, &self.state);
    }

    /// Registers `observer` to run after `property` changes.
    pub fn connect<F>(&mut self, property: ThemeProperty, observer: F)
    where
        F: FnMut(&ThemeState) + Send + 'static,
    {
        self.observers.connect(property, observer);
    }

    pub fn state(&self) -> &ThemeState {
        &self.state
    }

    pub fn dark_mode(&self) -> bool {
        self.state.dark_mode
    }

    pub fn accent_color_index(&self) -> i32 {
        self.state.accent_color_index
    }

    pub fn accent_color(&self) -> Color {
        self.state.accent_color
    }

    pub fn font_size(&self) -> f64 {
        self.state.font_size
    }

    pub fn font_family(&self) -> &str {
        &self.state.font_family
    }

    /// Scale factor of the display, asked fresh on every call.
    pub fn device_pixel_ratio(&self) -> f64 {
        (self.pixel_ratio)()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}
