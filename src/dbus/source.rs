use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::sync::{mpsc as std_mpsc, Mutex, MutexGuard};

use futures::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::names::{BusName, UniqueName};
use zbus::proxy::CacheProperties;
use zbus::Connection;

use super::{Endpoint, ThemeSettingsProxy, ThemeSettingsProxyBlocking};
use crate::settings_source::{
    ProviderEvent, SettingKey, SettingValue, SettingsSource, SourceError, WeakEventSender,
};

type Ready = std_mpsc::Sender<zbus::Result<()>>;

/// [`SettingsSource`] backed by the session bus.
///
/// Property reads are blocking calls with property caching disabled, so each
/// one is a round trip to the provider. Signal listeners run as tasks on the
/// given tokio runtime and forward into the subscriber's channel.
///
/// The blocking methods must be called from a thread that is not driving an
/// async runtime.
pub struct DBusSettingsSource {
    endpoint: Endpoint,
    connection: Connection,
    blocking: zbus::blocking::Connection,
    runtime: Handle,
    subscriptions: Mutex<HashMap<SettingKey, JoinHandle<()>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl DBusSettingsSource {
    pub fn new(connection: Connection, endpoint: Endpoint, runtime: Handle) -> Self {
        Self {
            endpoint,
            blocking: zbus::blocking::Connection::from(connection.clone()),
            connection,
            runtime,
            subscriptions: Mutex::new(HashMap::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Connects to the session bus.
    pub async fn session(endpoint: Endpoint) -> zbus::Result<Self> {
        let connection = Connection::session().await?;
        Ok(Self::new(connection, endpoint, Handle::current()))
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::unavailable(self.endpoint.service.as_str(), reason)
    }

    fn blocking_proxy(&self) -> zbus::Result<ThemeSettingsProxyBlocking<'static>> {
        ThemeSettingsProxyBlocking::builder(&self.blocking)
            .destination(self.endpoint.service.clone())?
            .path(self.endpoint.path.clone())?
            .interface(self.endpoint.interface.clone())?
            .cache_properties(CacheProperties::No)
            .build()
    }

    fn name_has_owner(&self) -> zbus::Result<bool> {
        let dbus = zbus::blocking::fdo::DBusProxy::new(&self.blocking)?;
        let name = BusName::try_from(self.endpoint.service.as_str())?;
        Ok(dbus.name_has_owner(name)?)
    }

    fn ensure_available(&self) -> Result<(), SourceError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(self.unavailable("service has no owner"))
        }
    }

    /// Spawns `listener` and waits until it reports whether its signal stream
    /// is established.
    fn spawn_listener<F, Fut>(&self, listener: F) -> Result<JoinHandle<()>, SourceError>
    where
        F: FnOnce(Ready) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let task = self.runtime.spawn(listener(ready_tx));
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(task),
            Ok(Err(err)) => {
                task.abort();
                Err(self.unavailable(err))
            }
            Err(_) => Err(self.unavailable("listener stopped before subscribing")),
        }
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<SettingKey, JoinHandle<()>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn watcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.watcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsSource for DBusSettingsSource {
    fn is_available(&self) -> bool {
        match self.name_has_owner() {
            Ok(has_owner) => has_owner,
            Err(err) => {
                debug!(%err, service = %self.endpoint.service, "Unable to query name owner");
                false
            }
        }
    }

    fn read(&self, key: SettingKey) -> Result<SettingValue, SourceError> {
        self.ensure_available()?;
        let proxy = self.blocking_proxy().map_err(|err| self.unavailable(err))?;
        let proxy = proxy.inner();
        let name = key.property_name();

        let value = match key {
            SettingKey::DarkMode => proxy.get_property::<bool>(name).map(SettingValue::from),
            SettingKey::AccentColor => proxy.get_property::<i32>(name).map(SettingValue::from),
            SettingKey::FontPointSize => proxy.get_property::<f64>(name).map(SettingValue::from),
            SettingKey::FontFamily => proxy.get_property::<String>(name).map(SettingValue::from),
        };
        value.map_err(|err| self.unavailable(format!("reading {name}: {err}")))
    }

    fn subscribe(&self, key: SettingKey, events: WeakEventSender) -> Result<(), SourceError> {
        self.ensure_available()?;

        let connection = self.connection.clone();
        let endpoint = self.endpoint.clone();
        let task = self.spawn_listener(move |ready| async move {
            let proxy = match theme_proxy(&connection, &endpoint).await {
                Ok(proxy) => proxy,
                Err(err) => {
                    let _ = ready.send(Err(err));
                    return;
                }
            };
            listen(proxy, key, events, ready).await;
            debug!(signal = key.signal_name(), "Signal stream closed");
        })?;

        if let Some(previous) = self.subscriptions().insert(key, task) {
            previous.abort();
        }
        debug!(signal = key.signal_name(), "Subscribed");
        Ok(())
    }

    fn watch_availability(&self, events: WeakEventSender) -> Result<(), SourceError> {
        let connection = self.connection.clone();
        let service = self.endpoint.service.clone();
        let task = self.spawn_listener(move |ready| async move {
            watch_name_owner(connection, service, events, ready).await;
        })?;

        if let Some(previous) = self.watcher().replace(task) {
            previous.abort();
        }
        Ok(())
    }
}

impl Drop for DBusSettingsSource {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions().drain() {
            task.abort();
        }
        if let Some(task) = self.watcher().take() {
            task.abort();
        }
    }
}

async fn theme_proxy(
    connection: &Connection,
    endpoint: &Endpoint,
) -> zbus::Result<ThemeSettingsProxy<'static>> {
    ThemeSettingsProxy::builder(connection)
        .destination(endpoint.service.clone())?
        .path(endpoint.path.clone())?
        .interface(endpoint.interface.clone())?
        .cache_properties(CacheProperties::No)
        .build()
        .await
}

/// Reports the outcome of establishing a stream to the waiting subscriber.
fn established<T>(ready: &Ready, stream: zbus::Result<T>) -> Option<T> {
    match stream {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            Some(stream)
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            None
        }
    }
}

/// Payload carried by a change signal.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SignalPayload {
    Empty,
    Bool(bool),
    Int(i32),
}

/// The event a change signal of `key` turns into. A payload of the wrong
/// shape yields nothing.
fn change_event(key: SettingKey, payload: SignalPayload) -> Option<ProviderEvent> {
    match (key, payload) {
        (SettingKey::DarkMode, SignalPayload::Bool(dark_mode)) => {
            Some(ProviderEvent::DarkModeChanged(dark_mode))
        }
        (SettingKey::AccentColor, SignalPayload::Int(code)) => {
            Some(ProviderEvent::AccentColorChanged(code))
        }
        (SettingKey::FontPointSize, _) => Some(ProviderEvent::FontSizeChanged),
        (SettingKey::FontFamily, _) => Some(ProviderEvent::FontFamilyChanged),
        _ => None,
    }
}

/// Maps a `NameOwnerChanged` transition of the provider's name. A new owner
/// wins, so a direct handover between two owners reads as a registration.
fn availability_event(
    old_owner: Option<&str>,
    new_owner: Option<&str>,
) -> Option<ProviderEvent> {
    match (old_owner, new_owner) {
        (_, Some(_)) => Some(ProviderEvent::Registered),
        (Some(_), None) => Some(ProviderEvent::Unregistered),
        (None, None) => None,
    }
}

fn owner_name<'a>(owner: &'a Option<UniqueName<'_>>) -> Option<&'a str> {
    owner.as_ref().map(|name| name.as_str())
}

/// Forwards mapped items until the stream ends or the last strong sender of
/// the channel is gone.
async fn forward<St, F>(stream: St, events: &WeakEventSender, to_event: F)
where
    St: Stream,
    F: Fn(St::Item) -> Option<ProviderEvent>,
{
    let mut stream = pin!(stream);
    while let Some(item) = stream.next().await {
        let Some(event) = to_event(item) else {
            continue;
        };
        let Some(sender) = events.upgrade() else {
            break;
        };
        if sender.send(event).is_err() {
            break;
        }
    }
}

async fn listen(
    proxy: ThemeSettingsProxy<'static>,
    key: SettingKey,
    events: WeakEventSender,
    ready: Ready,
) {
    match key {
        SettingKey::DarkMode => {
            let stream = established(&ready, proxy.receive_dark_mode_changed().await);
            if let Some(stream) = stream {
                forward(stream, &events, |signal| match signal.args() {
                    Ok(args) => change_event(key, SignalPayload::Bool(*args.dark_mode())),
                    Err(err) => {
                        warn!(%err, "Malformed darkModeChanged signal");
                        None
                    }
                })
                .await;
            }
        }
        SettingKey::AccentColor => {
            let stream = established(&ready, proxy.receive_accent_color_changed().await);
            if let Some(stream) = stream {
                forward(stream, &events, |signal| match signal.args() {
                    Ok(args) => change_event(key, SignalPayload::Int(*args.accent_color())),
                    Err(err) => {
                        warn!(%err, "Malformed accentColorChanged signal");
                        None
                    }
                })
                .await;
            }
        }
        SettingKey::FontPointSize => {
            let stream = established(&ready, proxy.receive_system_font_point_size_changed().await);
            if let Some(stream) = stream {
                forward(stream, &events, |_| change_event(key, SignalPayload::Empty)).await;
            }
        }
        SettingKey::FontFamily => {
            let stream = established(&ready, proxy.receive_system_font_changed().await);
            if let Some(stream) = stream {
                forward(stream, &events, |_| change_event(key, SignalPayload::Empty)).await;
            }
        }
    }
}

async fn watch_name_owner(
    connection: Connection,
    service: String,
    events: WeakEventSender,
    ready: Ready,
) {
    let changes = async {
        let dbus = zbus::fdo::DBusProxy::new(&connection).await?;
        dbus.receive_name_owner_changed_with_args(&[(0, service.as_str())])
            .await
    };
    let Some(stream) = established(&ready, changes.await) else {
        return;
    };

    forward(stream, &events, |signal| {
        let args = match signal.args() {
            Ok(args) => args,
            Err(err) => {
                warn!(%err, "Malformed NameOwnerChanged signal");
                return None;
            }
        };
        let old_owner = owner_name(args.old_owner());
        let new_owner = owner_name(args.new_owner());
        let event = availability_event(old_owner, new_owner);
        match event {
            Some(ProviderEvent::Registered) => {
                debug!(%service, ?new_owner, "Settings provider acquired an owner")
            }
            Some(_) => debug!(%service, "Settings provider lost its owner"),
            None => {}
        }
        event
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings_source::event_channel;

    #[test]
    fn owner_transitions_map_to_availability() {
        assert_eq!(availability_event(None, Some(":1.42")), Some(ProviderEvent::Registered));
        assert_eq!(availability_event(Some(":1.42"), None), Some(ProviderEvent::Unregistered));
        assert_eq!(
            availability_event(Some(":1.42"), Some(":1.57")),
            Some(ProviderEvent::Registered)
        );
        assert_eq!(availability_event(None, None), None);
    }

    #[test]
    fn change_signals_map_to_events() {
        assert_eq!(
            change_event(SettingKey::DarkMode, SignalPayload::Bool(true)),
            Some(ProviderEvent::DarkModeChanged(true))
        );
        assert_eq!(
            change_event(SettingKey::AccentColor, SignalPayload::Int(-1)),
            Some(ProviderEvent::AccentColorChanged(-1))
        );
        assert_eq!(
            change_event(SettingKey::FontPointSize, SignalPayload::Empty),
            Some(ProviderEvent::FontSizeChanged)
        );
        assert_eq!(
            change_event(SettingKey::FontFamily, SignalPayload::Empty),
            Some(ProviderEvent::FontFamilyChanged)
        );
    }

    #[test]
    fn mismatched_payloads_are_dropped() {
        assert_eq!(change_event(SettingKey::DarkMode, SignalPayload::Int(1)), None);
        assert_eq!(change_event(SettingKey::AccentColor, SignalPayload::Empty), None);
    }

    #[tokio::test]
    async fn forwarding_skips_unmapped_items_and_stops_without_senders() {
        let (tx, mut rx) = event_channel();
        let weak = tx.downgrade();
        let items = futures::stream::iter([None, Some(":1.7"), None]);
        forward(items, &weak, |owner| availability_event(None, owner)).await;

        assert_eq!(rx.try_recv().unwrap(), ProviderEvent::Registered);
        assert!(rx.try_recv().is_err());

        drop(tx);
        forward(futures::stream::iter([Some(":1.8")]), &weak, |owner| {
            availability_event(None, owner)
        })
        .await;
        assert_eq!(rx.recv().await, None);
    }
}
