//! Message types exchanged between the relay thread and the multiplexer.

use crate::config::AUDIO_KEYCODES;

/// Raw display-server happenings, already decoded from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    /// RandR output change or output property change (e.g. backlight).
    OutputNotify,
    /// A grabbed key was released.
    KeyRelease { keycode: u8 },
    /// Anything else the connection delivered.
    Other { kind: i32 },
}

/// What the multiplexer should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayMessage {
    BrightnessChanged,
    AudioKeyPressed,
}

impl RelayMessage {
    /// Classify a display event; events nobody cares about yield `None`.
    pub fn from_event(event: DisplayEvent) -> Option<Self> {
        match event {
            DisplayEvent::OutputNotify => Some(Self::BrightnessChanged),
            DisplayEvent::KeyRelease { keycode } if AUDIO_KEYCODES.contains(&keycode) => {
                Some(Self::AudioKeyPressed)
            }
            DisplayEvent::KeyRelease { .. } | DisplayEvent::Other { .. } => None,
        }
    }
}

/// A blocking stream of display events.
///
/// `next_event` returns `None` once the connection is gone; the relay then
/// stops for good.
pub trait DisplayEventSource {
    fn next_event(&mut self) -> Option<DisplayEvent>;
}
