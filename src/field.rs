//! The ordered table of status line fields.
//!
//! A field's identity is its position in [`Field::ALL`]. Only the multiplexer
//! writes to a [`FieldTable`]; providers hand back fresh values instead.

use std::fmt;

/// One slot of the status line, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Player,
    Mail,
    Network,
    Battery,
    Brightness,
    Audio,
    Weather,
    Clock,
}

impl Field {
    /// Every field in render order.
    pub const ALL: [Field; 8] = [
        Field::Player,
        Field::Mail,
        Field::Network,
        Field::Battery,
        Field::Brightness,
        Field::Audio,
        Field::Weather,
        Field::Clock,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Last field rendered in the left-aligned section.
    pub const LEFT_ALIGNED: Field = Field::Player;

    /// Position of this field in the table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Player => "player",
            Field::Mail => "mail",
            Field::Network => "network",
            Field::Battery => "battery",
            Field::Brightness => "brightness",
            Field::Audio => "audio",
            Field::Weather => "weather",
            Field::Clock => "clock",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Current value of every field; `None` means "omit from the line".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTable {
    slots: Vec<Option<String>>,
}

impl FieldTable {
    /// A table sized for [`Field::ALL`] with every slot empty.
    pub fn new() -> Self {
        Self::with_len(Field::COUNT)
    }

    /// A table of arbitrary length, used by layouts that are not the status line's.
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.get_index(field.index())
    }

    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|slot| slot.as_deref())
    }

    /// Store a new value, returning whether the slot changed.
    pub fn set(&mut self, field: Field, value: Option<String>) -> bool {
        self.set_index(field.index(), value)
    }

    pub fn set_index(&mut self, index: usize, value: Option<String>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Present values with their indices, in order.
    pub fn present(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_deref().map(|value| (index, value)))
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::new()
    }
}
