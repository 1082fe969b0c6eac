//! Master volume through `amixer`.
//!
//! The control reports an integer gain range (`Limits: Playback 0 - 87`), one
//! level per channel, and a playback switch that mutes all channels at once.

use crate::config::{AUDIO_INTERVAL, MIXER_COMMAND};
use crate::error::{Result, StatusError};
use crate::provider::{Provider, Registration, WatchSpec};
use crate::relay::RelayMessage;
use std::process::Command;

/// Glyph for a muted or below-floor channel.
pub const MUTE_GLYPH: &str = "_";
/// Glyph for a channel at or above the ceiling.
pub const MAX_GLYPH: &str = "M";

/// Gain floor and ceiling of a mixer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainRange {
    pub floor: i64,
    pub ceiling: i64,
}

/// Format one channel: mute glyph, max glyph, or a 0–100 value.
///
/// `None` stands for a muted channel.
pub fn format_volume(level: Option<i64>, range: GainRange) -> String {
    match level {
        None => MUTE_GLYPH.to_string(),
        Some(level) if level < range.floor => MUTE_GLYPH.to_string(),
        Some(level) if level >= range.ceiling => MAX_GLYPH.to_string(),
        Some(level) => {
            let span = (range.ceiling - range.floor) as f64;
            let percent = ((level - range.floor) as f64 * 100.0 / span).round();
            format!("{}", percent as i64)
        }
    }
}

/// One reading of the mixer control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerState {
    pub range: GainRange,
    pub levels: Vec<i64>,
    pub muted: bool,
}

impl MixerState {
    /// Channels joined by `:`, e.g. `62:62` or `_:_`.
    pub fn format(&self) -> String {
        self.levels
            .iter()
            .map(|level| format_volume((!self.muted).then_some(*level), self.range))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Parse `amixer sget <control>` output.
pub fn parse_mixer_output(output: &str) -> Result<MixerState> {
    let mut range = None;
    let mut levels = Vec::new();
    let mut muted = false;

    for line in output.lines().map(str::trim) {
        if let Some(limits) = line.strip_prefix("Limits:") {
            let limits = limits.trim().trim_start_matches("Playback").trim();
            let (floor, ceiling) = limits
                .split_once(" - ")
                .ok_or_else(|| StatusError::format(format!("malformed limits '{line}'")))?;
            let parse = |s: &str| {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| StatusError::format(format!("malformed limits '{line}'")))
            };
            range = Some(GainRange {
                floor: parse(floor)?,
                ceiling: parse(ceiling)?,
            });
            continue;
        }

        // "Front Left: Playback 52 [60%] [-21.75dB] [on]"
        let Some((_, rest)) = line.split_once(": Playback ") else {
            continue;
        };
        let Some(level) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) else {
            continue;
        };
        levels.push(level);
        if rest.contains("[off]") {
            muted = true;
        }
    }

    let range = range.ok_or_else(|| StatusError::format("mixer control reports no playback limits"))?;
    if levels.is_empty() {
        return Err(StatusError::format("mixer control reports no playback channels"));
    }
    Ok(MixerState {
        range,
        levels,
        muted,
    })
}

pub struct AudioProvider {
    control: String,
}

impl AudioProvider {
    /// Check that the control exists and exposes playback volume.
    pub fn init(control: &str) -> Result<Registration> {
        let provider = Self {
            control: control.to_string(),
        };
        provider
            .read_state()
            .map_err(|err| StatusError::unavailable(format!("mixer control {control}"), err))?;

        Ok(Registration::new(provider)
            .watch(WatchSpec::Every(AUDIO_INTERVAL))
            .watch(WatchSpec::Relay(RelayMessage::AudioKeyPressed)))
    }

    fn read_state(&self) -> Result<MixerState> {
        let output = Command::new(MIXER_COMMAND)
            .args(["sget", &self.control])
            .output()
            .map_err(|err| StatusError::io(format!("cannot run {MIXER_COMMAND}"), err))?;
        if !output.status.success() {
            return Err(StatusError::protocol(format!(
                "{MIXER_COMMAND} sget {} failed: {}",
                self.control,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_mixer_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Provider for AudioProvider {
    fn query(&mut self) -> Result<Option<String>> {
        Ok(Some(self.read_state()?.format()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RANGE: GainRange = GainRange {
        floor: 0,
        ceiling: 254,
    };

    const STEREO: &str = "Simple mixer control 'Master',0
  Capabilities: pvolume pswitch pswitch-joined
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 87
  Mono:
  Front Left: Playback 87 [100%] [0.00dB] [on]
  Front Right: Playback 44 [51%] [-32.25dB] [on]
";

    #[test]
    fn volume_glyphs_at_the_edges() {
        assert_eq!(format_volume(Some(-1), RANGE), MUTE_GLYPH);
        assert_eq!(format_volume(None, RANGE), MUTE_GLYPH);
        assert_eq!(format_volume(Some(254), RANGE), MAX_GLYPH);
        assert_eq!(format_volume(Some(300), RANGE), MAX_GLYPH);
        assert_eq!(format_volume(Some(0), RANGE), "0");
    }

    #[test]
    fn midpoint_formats_as_fifty() {
        assert_eq!(format_volume(Some(127), RANGE), "50");
        let odd = GainRange { floor: 0, ceiling: 255 };
        assert_eq!(format_volume(Some(127), odd), "50");
        let offset = GainRange { floor: 20, ceiling: 120 };
        assert_eq!(format_volume(Some(70), offset), "50");
    }

    #[test]
    fn parses_stereo_control() {
        let state = parse_mixer_output(STEREO).unwrap();
        assert_eq!(state.range, GainRange { floor: 0, ceiling: 87 });
        assert_eq!(state.levels, vec![87, 44]);
        assert!(!state.muted);
        assert_eq!(state.format(), "M:51");
    }

    #[test]
    fn switch_off_mutes_every_channel() {
        let muted = STEREO.replace("[on]", "[off]");
        let state = parse_mixer_output(&muted).unwrap();
        assert!(state.muted);
        assert_eq!(state.format(), "_:_");
    }

    #[test]
    fn parses_mono_control() {
        let mono = "Simple mixer control 'Master',0
  Limits: Playback 0 - 31
  Mono: Playback 16 [52%] [-22.50dB] [on]
";
        let state = parse_mixer_output(mono).unwrap();
        assert_eq!(state.levels, vec![16]);
        assert_eq!(state.format(), "52");
    }

    #[test]
    fn output_without_limits_is_rejected() {
        let broken = "Simple mixer control 'Master',0\n  Mono: Playback 16 [52%] [on]\n";
        assert!(matches!(
            parse_mixer_output(broken),
            Err(StatusError::Format { .. })
        ));
    }

    proptest! {
        #[test]
        fn in_range_levels_stay_within_percent(level in 0i64..254) {
            let text = format_volume(Some(level), RANGE);
            let value: i64 = text.parse().unwrap();
            prop_assert!((0..=100).contains(&value));
        }

        #[test]
        fn volume_is_monotonic(a in 0i64..254, b in 0i64..254) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low: i64 = format_volume(Some(low), RANGE).parse().unwrap();
            let high: i64 = format_volume(Some(high), RANGE).parse().unwrap();
            prop_assert!(low <= high);
        }
    }
}
