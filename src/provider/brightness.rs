//! Screen brightness from the RandR backlight property.

use crate::config::{BACKLIGHT_ATOM, BRIGHTNESS_INTERVAL};
use crate::display::{backlight_percent, Backlight};
use crate::error::{Result, StatusError};
use crate::provider::{Provider, Registration, WatchSpec};
use crate::relay::RelayMessage;

pub struct BrightnessProvider {
    backlight: Backlight,
}

impl BrightnessProvider {
    /// Connect to the display and locate the backlight of `output_name`.
    pub fn init(output_name: &str) -> Result<Registration> {
        let backlight = Backlight::open(output_name, BACKLIGHT_ATOM)?;
        Ok(Registration::new(Self { backlight })
            .watch(WatchSpec::Every(BRIGHTNESS_INTERVAL))
            .watch(WatchSpec::Relay(RelayMessage::BrightnessChanged)))
    }
}

impl Provider for BrightnessProvider {
    fn query(&mut self) -> Result<Option<String>> {
        let level = self.backlight.level()?;
        let percent = backlight_percent(level, self.backlight.range())
            .ok_or_else(|| StatusError::format("backlight range is empty"))?;
        Ok(Some(format!("{percent}%")))
    }
}
