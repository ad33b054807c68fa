//! Follows the desktop theme settings and logs every change.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use theme_sync::config::Config;
use theme_sync::dbus::DBusSettingsSource;
use theme_sync::{event_channel, SettingsSource, ThemeProperty, ThemeState, ThemeSync};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, problems) = Config::load();
    init_tracing(&config.log_filter);
    for (path, err) in &problems {
        warn!(path = %path.display(), %err, "Ignoring config file");
    }
    let endpoint = config.endpoint();
    if config.install().is_err() {
        warn!("Config already initialized, keeping the existing one");
    }

    let source = DBusSettingsSource::session(endpoint.clone())
        .await
        .context("Failed to connect to the D-Bus session bus")?;
    info!(
        service = %endpoint.service,
        path = %endpoint.path,
        interface = %endpoint.interface,
        "Connected to D-Bus session bus"
    );

    let (events_tx, mut events_rx) = event_channel();

    // Provider reads block, so the cache lives on its own thread. It only
    // runs while `events_tx` is alive.
    let events = events_tx.clone();
    let worker = std::thread::Builder::new()
        .name("theme-sync".into())
        .spawn(move || {
            let mut sync = ThemeSync::new(source, &events)
                .with_pixel_ratio(|| Config::with(|config| config.screen_scale));
            drop(events);
            log_state(&sync);
            log_changes(&mut sync);
            sync.run(&mut events_rx);
        })
        .context("Failed to start the theme event thread")?;

    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    drop(events_tx);
    tokio::task::spawn_blocking(move || worker.join())
        .await
        .context("Failed to wait for the theme event thread")?
        .map_err(|_| anyhow::anyhow!("Theme event thread panicked"))?;
    info!("Theme event thread stopped");

    Ok(())
}

fn init_tracing(fallback: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();
}

fn log_state<S: SettingsSource>(sync: &ThemeSync<S>) {
    let state = sync.state();
    info!(
        connected = sync.is_connected(),
        dark_mode = state.dark_mode(),
        accent_color_index = state.accent_color_index(),
        accent_color = %state.accent_color(),
        font_size = state.font_size(),
        font_family = state.font_family(),
        device_pixel_ratio = sync.device_pixel_ratio(),
        "Current theme"
    );
}

fn log_changes<S: SettingsSource>(sync: &mut ThemeSync<S>) {
    for property in ThemeProperty::ALL {
        let property = *property;
        sync.connect(property, move |state: &ThemeState| match property {
            ThemeProperty::DarkMode => info!(dark_mode = state.dark_mode(), "Dark mode changed"),
            ThemeProperty::AccentColorIndex => {
                info!(index = state.accent_color_index(), "Accent color index changed")
            }
            ThemeProperty::AccentColor => {
                info!(color = %state.accent_color(), "Accent color changed")
            }
            ThemeProperty::FontSize => info!(size = state.font_size(), "Font size changed"),
            ThemeProperty::FontFamily => {
                info!(family = state.font_family(), "Font family changed")
            }
        });
    }
}
