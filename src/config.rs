//! Fixed constants and the settings bundle built from them.
//!
//! lemonline takes no arguments and reads no configuration file. Every path,
//! device name, and interval lives here. `Settings` only exists so tests can
//! point providers at temporary files; the binary always uses the default.

use std::path::PathBuf;
use std::time::Duration;

/// Foreground color used for regular text.
pub const NORMAL_COLOR: &str = "%{F#DDDDDD}";
/// Foreground color of the field separator.
pub const SEPARATOR_COLOR: &str = "%{F#777777}";
/// Foreground color of the mail indicator.
pub const MAIL_COLOR: &str = "%{F#FFFF00}";

/// Directory holding one mailbox file per user.
pub const MAIL_SPOOL_DIR: &str = "/var/mail";
pub const MAIL_TEXT: &str = "MAIL";

/// Bonding interface whose active port is reported.
pub const NET_INTERFACE: &str = "bond0";
pub const NET_SYSFS_ROOT: &str = "/sys/class/net";
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// RandR output carrying the backlight property.
pub const BACKLIGHT_OUTPUT: &str = "eDP1";
pub const BACKLIGHT_ATOM: &str = "Backlight";

/// Mixer control queried through `amixer`.
pub const MIXER_COMMAND: &str = "amixer";
pub const MIXER_CONTROL: &str = "Master";

/// Hardware keycodes grabbed on the root window (mute, volume down, volume up).
pub const AUDIO_KEYCODES: [u8; 3] = [160, 174, 176];

pub const MPD_HOST: &str = "localhost";
pub const MPD_PORT: u16 = 6600;

pub const WEATHER_CACHE_DIR: &str = "weather";
pub const WEATHER_CURRENT_FILE: &str = "current";
pub const WEATHER_TIMESTAMP_FILE: &str = "timestamp";

pub const CLOCK_FORMAT: &str = "%a %b %d, %R";

pub const BATTERY_INTERVAL: Duration = Duration::from_secs(10);
/// Re-check of the mailbox; reading mail moves atime without a watch event.
pub const MAIL_INTERVAL: Duration = Duration::from_secs(10);
pub const NET_INTERVAL: Duration = Duration::from_secs(10);
pub const BRIGHTNESS_INTERVAL: Duration = Duration::from_secs(10);
pub const AUDIO_INTERVAL: Duration = Duration::from_secs(10);
/// Clock retry delay when no minute boundary could be computed.
pub const CLOCK_FALLBACK_INTERVAL: Duration = Duration::from_secs(10);

/// Paths and names handed to the providers during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mail_spool_dir: PathBuf,
    pub net_sysfs_root: PathBuf,
    pub net_interface: String,
    pub power_supply_root: PathBuf,
    pub backlight_output: String,
    pub mixer_control: String,
    pub mpd_host: String,
    pub mpd_port: u16,
    pub weather_current: PathBuf,
    pub weather_timestamp: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let weather_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join(WEATHER_CACHE_DIR);

        Self {
            mail_spool_dir: PathBuf::from(MAIL_SPOOL_DIR),
            net_sysfs_root: PathBuf::from(NET_SYSFS_ROOT),
            net_interface: NET_INTERFACE.to_string(),
            power_supply_root: PathBuf::from(POWER_SUPPLY_ROOT),
            backlight_output: BACKLIGHT_OUTPUT.to_string(),
            mixer_control: MIXER_CONTROL.to_string(),
            mpd_host: MPD_HOST.to_string(),
            mpd_port: MPD_PORT,
            weather_current: weather_dir.join(WEATHER_CURRENT_FILE),
            weather_timestamp: weather_dir.join(WEATHER_TIMESTAMP_FILE),
        }
    }
}
