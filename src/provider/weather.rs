//! Current weather from a cache file maintained by an external fetcher.
//!
//! The fetcher writes the OpenWeatherMap-style JSON document to `current` and
//! then touches `timestamp`. Only the timestamp file is watched; its content is
//! never parsed.

use crate::error::{Result, StatusError};
use crate::provider::{Provider, Registration, WatchSpec};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct WeatherReport {
    main: MainReadings,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

/// Render a cached report as `"<temp> °C, <description>, ..."`.
pub fn format_report(json: &str) -> Result<String> {
    let report: WeatherReport = serde_json::from_str(json)?;
    let mut text = format!("{:.0} °C", report.main.temp);
    for condition in &report.weather {
        text.push_str(", ");
        text.push_str(&condition.description);
    }
    Ok(text)
}

pub struct WeatherProvider {
    current: PathBuf,
    // Held open for the lifetime of the watch.
    _timestamp: File,
}

impl WeatherProvider {
    pub fn init(current: &Path, timestamp: &Path) -> Result<Registration> {
        let provider = Self::open(current, timestamp)?;
        Ok(Registration::new(provider).watch(WatchSpec::FileChange(timestamp.to_path_buf())))
    }

    pub fn open(current: &Path, timestamp: &Path) -> Result<Self> {
        let timestamp_file = File::open(timestamp)
            .map_err(|err| StatusError::unavailable(timestamp.display().to_string(), err))?;
        Ok(Self {
            current: current.to_path_buf(),
            _timestamp: timestamp_file,
        })
    }
}

impl Provider for WeatherProvider {
    fn query(&mut self) -> Result<Option<String>> {
        let json = std::fs::read_to_string(&self.current).map_err(|err| {
            StatusError::io(format!("cannot load {}", self.current.display()), err)
        })?;
        format_report(&json).map(Some)
    }
}
