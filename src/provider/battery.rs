//! Battery charge and remaining time from `/sys/class/power_supply`.

use crate::config::BATTERY_INTERVAL;
use crate::error::{Result, StatusError};
use crate::provider::{read_trimmed, Provider, Registration, WatchSpec};
use log::debug;
use std::path::{Path, PathBuf};

/// Whether the machine is running on external power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcState {
    Online,
    Offline,
    Unknown,
}

/// One power reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStatus {
    pub ac: AcState,
    /// Charge in percent.
    pub battery_life: u8,
    /// Estimated minutes until empty, when the discharge rate is known.
    pub minutes_left: Option<u32>,
}

/// `A/C (NN%)` on external power, `H:MM (NN%)` or `--:-- (NN%)` on battery.
pub fn format_power(status: &PowerStatus) -> Option<String> {
    let prefix = match status.ac {
        AcState::Online => "A/C".to_string(),
        AcState::Offline => match status.minutes_left {
            Some(minutes) => format!("{}:{:02}", minutes / 60, minutes % 60),
            None => "--:--".to_string(),
        },
        AcState::Unknown => return None,
    };
    Some(format!("{} ({}%)", prefix, status.battery_life))
}

pub struct BatteryProvider {
    battery: PathBuf,
    mains: PathBuf,
}

impl BatteryProvider {
    pub fn init(supply_root: &Path) -> Result<Registration> {
        let provider = Self::discover(supply_root)?;
        Ok(Registration::new(provider).watch(WatchSpec::Every(BATTERY_INTERVAL)))
    }

    /// Find the first battery and the first mains adapter under `supply_root`.
    pub fn discover(supply_root: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(supply_root)
            .map_err(|err| StatusError::unavailable(supply_root.display().to_string(), err))?;

        let mut supplies: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        supplies.sort();

        let find = |kind: &str| {
            supplies
                .iter()
                .find(|path| read_trimmed(&path.join("type")).is_ok_and(|t| t == kind))
                .cloned()
        };
        let battery = find("Battery").ok_or_else(|| StatusError::unavailable("battery", "no battery found"))?;
        let mains = find("Mains").ok_or_else(|| StatusError::unavailable("battery", "no mains adapter found"))?;

        debug!("battery {} / mains {}", battery.display(), mains.display());
        Ok(Self { battery, mains })
    }

    fn read_number(&self, name: &str) -> Option<u64> {
        read_trimmed(&self.battery.join(name)).ok()?.parse().ok()
    }

    fn read_status(&self) -> Result<PowerStatus> {
        let ac = match read_trimmed(&self.mains.join("online"))?.as_str() {
            "1" => AcState::Online,
            "0" => AcState::Offline,
            _ => AcState::Unknown,
        };
        let capacity: u8 = read_trimmed(&self.battery.join("capacity"))?
            .parse()
            .map_err(|_| StatusError::format("battery capacity is not a number"))?;

        // Energy/power in µWh/µW, or charge/current in µAh/µA.
        let rate = self
            .read_number("energy_now")
            .zip(self.read_number("power_now"))
            .or_else(|| self.read_number("charge_now").zip(self.read_number("current_now")));
        let minutes_left = match rate {
            Some((remaining, drain)) if drain > 0 => remaining
                .checked_mul(60)
                .and_then(|scaled| u32::try_from(scaled / drain).ok()),
            _ => None,
        };

        Ok(PowerStatus {
            ac,
            battery_life: capacity.min(100),
            minutes_left,
        })
    }
}

impl Provider for BatteryProvider {
    fn query(&mut self) -> Result<Option<String>> {
        Ok(format_power(&self.read_status()?))
    }
}
