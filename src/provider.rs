//! Information providers.
//!
//! Each provider owns the handles it opened during `init` and turns them into
//! a formatted value on request. Providers never see the field table: the
//! multiplexer asks, the provider answers, the multiplexer stores.
//!
//! ## Contract
//!
//! - `init` (a constructor on each provider type) either returns a ready
//!   context plus the watches that should trigger it, or an error. An error
//!   only means this field stays empty for the whole run.
//! - [`Provider::query`] returns `Ok(None)` when there is nothing to show and
//!   `Err` when the source misbehaved this time. Either way the field is blank
//!   until the next successful query.

pub mod audio;
pub mod battery;
pub mod brightness;
pub mod clock;
pub mod mail;
pub mod mpd;
pub mod network;
pub mod weather;

use crate::error::Result;
use crate::relay::RelayMessage;
use std::path::PathBuf;
use std::time::Duration;

pub use audio::AudioProvider;
pub use battery::BatteryProvider;
pub use brightness::BrightnessProvider;
pub use clock::ClockProvider;
pub use mail::MailProvider;
pub use mpd::MpdSession;
pub use network::NetworkProvider;
pub use weather::WeatherProvider;

/// A synchronous source of one field's value.
pub trait Provider {
    /// Produce the current formatted value.
    fn query(&mut self) -> Result<Option<String>>;

    /// Delay until this provider wants to be queried again.
    ///
    /// Only consulted for [`WatchSpec::NextDeadline`] timers, right after a query.
    fn next_delay(&self) -> Option<Duration> {
        None
    }
}

/// A readiness source that refreshes a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSpec {
    /// Fire repeatedly with a fixed period.
    Every(Duration),
    /// Fire once after the provider's [`Provider::next_delay`], then re-arm.
    NextDeadline,
    /// Fire whenever the file's content or attributes change.
    FileChange(PathBuf),
    /// Like `FileChange`, and also when another process opens or closes the file.
    FileAccess(PathBuf),
    /// Fire when the display relay forwards this message.
    Relay(RelayMessage),
}

/// A successfully initialised provider and its watches.
pub struct Registration {
    pub provider: Box<dyn Provider>,
    pub watches: Vec<WatchSpec>,
}

impl Registration {
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            watches: Vec::new(),
        }
    }

    pub fn watch(mut self, watch: WatchSpec) -> Self {
        self.watches.push(watch);
        self
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("watches", &self.watches)
            .finish_non_exhaustive()
    }
}

/// Read a small text file and trim surrounding whitespace.
pub(crate) fn read_trimmed(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|err| crate::error::StatusError::io(format!("cannot read {}", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Provider for Fixed {
        fn query(&mut self) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[test]
    fn registration_collects_watches_in_order() {
        let registration = Registration::new(Fixed("x"))
            .watch(WatchSpec::Every(Duration::from_secs(10)))
            .watch(WatchSpec::Relay(RelayMessage::AudioKeyPressed));

        assert_eq!(
            registration.watches,
            vec![
                WatchSpec::Every(Duration::from_secs(10)),
                WatchSpec::Relay(RelayMessage::AudioKeyPressed),
            ]
        );
    }

    #[test]
    fn default_next_delay_is_none() {
        let mut provider = Fixed("x");
        assert_eq!(provider.query().unwrap().as_deref(), Some("x"));
        assert!(provider.next_delay().is_none());
    }

    #[test]
    fn read_trimmed_strips_newline() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "active-backup 1\n").unwrap();
        assert_eq!(read_trimmed(file.path()).unwrap(), "active-backup 1");
    }
}
