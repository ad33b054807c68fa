use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use theme_sync::theme::UNSET_ACCENT_INDEX;
use theme_sync::{
    event_channel, AccentColor, EventReceiver, EventSender, InMemorySource, ProviderEvent, SettingKey,
    ThemeProperty, ThemeState, ThemeSync,
};

type Counts = Arc<Mutex<HashMap<ThemeProperty, usize>>>;

fn count_notifications(sync: &mut ThemeSync<Arc<InMemorySource>>) -> Counts {
    let counts: Counts = Arc::default();
    for property in ThemeProperty::ALL {
        let counts = counts.clone();
        let property = *property;
        sync.connect(property, move |_| {
            *counts.lock().unwrap().entry(property).or_default() += 1;
        });
    }
    counts
}

fn count(counts: &Counts, property: ThemeProperty) -> usize {
    counts.lock().unwrap().get(&property).copied().unwrap_or(0)
}

fn total(counts: &Counts) -> usize {
    counts.lock().unwrap().values().sum()
}

/// The sender has to stay alive for provider events to arrive.
fn sync_with(
    source: &Arc<InMemorySource>,
) -> (ThemeSync<Arc<InMemorySource>>, EventSender, EventReceiver) {
    let (tx, rx) = event_channel();
    (ThemeSync::new(source.clone(), &tx), tx, rx)
}

#[test]
fn initialize_then_accent_events_follow_provider() {
    let source = Arc::new(InMemorySource::unavailable());
    let (mut sync, _tx, mut events) = sync_with(&source);
    let counts = count_notifications(&mut sync);

    source.set(SettingKey::DarkMode, true);
    source.set(SettingKey::AccentColor, 2);
    source.set(SettingKey::FontPointSize, 11.5);
    source.set(SettingKey::FontFamily, "DejaVu Sans");
    source.set_available(true);
    assert_eq!(sync.process_pending(&mut events), 1);

    assert!(sync.dark_mode());
    assert_eq!(sync.accent_color_index(), 2);
    assert_eq!(sync.accent_color(), AccentColor::Green.color());
    assert_eq!(sync.font_size(), 11.5);
    assert_eq!(sync.font_family(), "DejaVu Sans");
    for property in ThemeProperty::ALL {
        assert_eq!(count(&counts, *property), 1, "{property:?}");
    }

    source.change_accent_color(2);
    sync.process_pending(&mut events);
    assert_eq!(count(&counts, ThemeProperty::AccentColor), 1);

    source.change_accent_color(5);
    sync.process_pending(&mut events);
    assert_eq!(sync.accent_color_index(), 5);
    assert_eq!(sync.accent_color(), AccentColor::Orange.color());
    assert_eq!(count(&counts, ThemeProperty::AccentColor), 2);
}

#[test]
fn repeated_accent_code_notifies_at_most_once() {
    for code in [UNSET_ACCENT_INDEX, 0, 3, 6, 7, -20, i32::MAX] {
        let source = Arc::new(InMemorySource::unavailable());
        let (mut sync, _tx, _events) = sync_with(&source);
        let counts = count_notifications(&mut sync);

        sync.set_accent_color(code);
        sync.set_accent_color(code);

        let expected = usize::from(code != UNSET_ACCENT_INDEX);
        assert_eq!(count(&counts, ThemeProperty::AccentColor), expected, "code {code}");
        assert_eq!(sync.accent_color_index(), code);
    }
}

#[test]
fn scalar_events_only_notify_on_change() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, mut events) = sync_with(&source);
    let counts = count_notifications(&mut sync);

    source.change_dark_mode(false);
    source.change_font_size(9.0);
    source.change_font_family("Noto Sans");
    assert_eq!(sync.process_pending(&mut events), 3);
    assert_eq!(total(&counts), 0);

    source.change_dark_mode(true);
    source.change_font_size(10.5);
    source.change_font_family("Inter");
    sync.process_pending(&mut events);

    assert!(sync.dark_mode());
    assert_eq!(sync.font_size(), 10.5);
    assert_eq!(sync.font_family(), "Inter");
    assert_eq!(count(&counts, ThemeProperty::DarkMode), 1);
    assert_eq!(count(&counts, ThemeProperty::FontSize), 1);
    assert_eq!(count(&counts, ThemeProperty::FontFamily), 1);
    assert_eq!(total(&counts), 3);
}

#[test]
fn font_events_reread_the_provider() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, _events) = sync_with(&source);

    source.set(SettingKey::FontPointSize, 14.0);
    assert_eq!(sync.font_size(), 9.0);

    let reads = source.read_count();
    sync.handle(ProviderEvent::FontSizeChanged);
    assert_eq!(source.read_count(), reads + 1);
    assert_eq!(sync.font_size(), 14.0);
}

#[test]
fn initialize_announces_everything_even_when_unchanged() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, _events) = sync_with(&source);
    let counts = count_notifications(&mut sync);
    let before = sync.state().clone();

    assert!(sync.initialize());

    assert_eq!(sync.state(), &before);
    for property in ThemeProperty::ALL {
        assert_eq!(count(&counts, *property), 1, "{property:?}");
    }
}

#[test]
fn initialize_overwrites_local_changes() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, _events) = sync_with(&source);

    sync.on_dark_mode_changed(true);
    sync.set_accent_color(4);
    assert!(sync.initialize());

    assert!(!sync.dark_mode());
    assert_eq!(sync.accent_color_index(), 0);
    assert_eq!(sync.accent_color(), AccentColor::Blue.color());
}

#[test]
fn unreachable_provider_changes_nothing() {
    let source = Arc::new(InMemorySource::unavailable());
    let (mut sync, _tx, _events) = sync_with(&source);
    let counts = count_notifications(&mut sync);

    assert!(!sync.initialize());
    assert!(!sync.subscribe_to_changes());

    assert_eq!(sync.state(), &ThemeState::default());
    assert_eq!(total(&counts), 0);
    assert_eq!(source.subscribe_count(), 0);
    assert!(!sync.is_connected());
    for key in SettingKey::ALL {
        assert!(!source.is_subscribed(*key));
    }
}

#[test]
fn provider_restart_reloads_and_resubscribes() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, mut events) = sync_with(&source);
    assert!(sync.is_connected());

    source.set_available(false);
    sync.process_pending(&mut events);
    assert!(!sync.is_connected());

    source.set(SettingKey::FontFamily, "Cantarell");
    source.set(SettingKey::AccentColor, 1);
    let subscriptions = source.subscribe_count();
    source.set_available(true);
    sync.process_pending(&mut events);

    assert!(sync.is_connected());
    assert_eq!(sync.font_family(), "Cantarell");
    assert_eq!(sync.accent_color(), AccentColor::Red.color());
    assert_eq!(source.subscribe_count(), subscriptions + SettingKey::ALL.len());

    source.change_dark_mode(true);
    sync.process_pending(&mut events);
    assert!(sync.dark_mode());
}

#[test]
fn events_after_provider_loss_are_not_delivered() {
    let source = Arc::new(InMemorySource::new());
    let (mut sync, _tx, mut events) = sync_with(&source);

    source.set_available(false);
    source.change_dark_mode(true);
    sync.process_pending(&mut events);

    assert!(!sync.dark_mode());
}

#[test]
fn run_returns_once_the_sender_is_dropped() {
    let source = Arc::new(InMemorySource::new());
    let (tx, mut rx) = event_channel();
    let (done_tx, done_rx) = mpsc::channel();

    let mut sync = ThemeSync::new(source.clone(), &tx);
    let worker = thread::spawn(move || {
        sync.run(&mut rx);
        let _ = done_tx.send(sync.dark_mode());
    });

    source.change_dark_mode(true);
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());

    drop(tx);
    let dark_mode = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("run should return after the sender is dropped");
    worker.join().unwrap();
    assert!(dark_mode);
}
