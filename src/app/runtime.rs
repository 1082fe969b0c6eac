use crate::app::Multiplexer;
use crate::config::{Settings, AUDIO_KEYCODES};
use crate::display::XlibEvents;
use crate::error::Result;
use crate::field::Field;
use crate::provider::{
    AudioProvider, BatteryProvider, BrightnessProvider, ClockProvider, MailProvider, MpdSession,
    NetworkProvider, WeatherProvider,
};
use crate::relay::spawn_relay_thread;
use log::{info, warn};
use std::io::Write;
use tokio::sync::mpsc;

/// Initialise every provider in a fixed order and start the display relay.
///
/// A provider that fails to initialise only leaves its field empty. Errors
/// returned from here are fatal.
pub async fn bootstrap<W: Write>(settings: &Settings, out: W) -> Result<Multiplexer<W>> {
    let mut mux = Multiplexer::new(out)?;

    mux.install(Field::Mail, || MailProvider::init(&settings.mail_spool_dir));
    mux.install_player(MpdSession::connect(&settings.mpd_host, settings.mpd_port))
        .await;
    mux.install(Field::Weather, || {
        WeatherProvider::init(&settings.weather_current, &settings.weather_timestamp)
    });
    mux.install(Field::Brightness, || {
        BrightnessProvider::init(&settings.backlight_output)
    });
    start_relay(&mut mux)?;
    mux.install(Field::Audio, || AudioProvider::init(&settings.mixer_control));
    mux.install(Field::Clock, ClockProvider::init);
    mux.install(Field::Battery, || {
        BatteryProvider::init(&settings.power_supply_root)
    });
    mux.install(Field::Network, || {
        NetworkProvider::init(&settings.net_sysfs_root, &settings.net_interface)
    });

    Ok(mux)
}

/// Spawn the relay thread on its own display connection.
///
/// Without a display there is nothing to relay; only a failed spawn is fatal.
fn start_relay<W: Write>(mux: &mut Multiplexer<W>) -> Result<()> {
    let events = match XlibEvents::open(&AUDIO_KEYCODES) {
        Ok(events) => events,
        Err(err) => {
            warn!("display relay: {err}");
            return Ok(());
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    spawn_relay_thread(events, tx)?;
    mux.attach_relay(rx);
    info!("display relay started");
    Ok(())
}
