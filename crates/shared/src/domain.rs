use std::fmt;

use serde::{Deserialize, Serialize};

/// Device-assigned alarm identifier. Zero is the firmware's "empty slot"
/// sentinel and never names a real alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmId(pub u32);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceType {
    #[default]
    Local,
    Url,
}

/// Weekday labels indexed by the bitmask convention: bit 0 = Monday,
/// bit 6 = Sunday.
pub const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Recurrence mask, bit *i* = weekday *i* (Mon=0..Sun=6). Only the low
/// seven bits are meaningful; the device ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaysMask(pub u8);

impl DaysMask {
    pub const WEEKDAYS: DaysMask = DaysMask(0x1f);
    pub const EVERY_DAY: DaysMask = DaysMask(0x7f);

    pub fn from_bits(bits: u8) -> Self {
        DaysMask(bits & 0x7f)
    }

    pub fn contains(self, day: usize) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }

    pub fn with(self, day: usize) -> Self {
        if day < 7 {
            DaysMask(self.0 | (1 << day))
        } else {
            self
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 & 0x7f == 0
    }

    /// Set weekday indices, ascending.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..7).filter(move |&d| self.contains(d))
    }
}
