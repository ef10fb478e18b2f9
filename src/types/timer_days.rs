//! Weekday bit flags for repeating timers.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// The days a timer repeats on, as stored in its repeat byte.
///
/// [`TimerDays::NONE`] marks a one-shot timer that fires once at an absolute
/// date instead.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use magichome_rs::TimerDays;
///
/// let weekend = TimerDays::SATURDAY | TimerDays::SUNDAY;
/// assert_eq!(weekend.bits(), 0xC0);
/// assert!(weekend.contains_day(Weekday::Sun));
/// assert!(!weekend.contains_day(Weekday::Mon));
/// assert_eq!(TimerDays::EVERYDAY.bits(), 0xFE);
/// assert!(TimerDays::NONE.is_none());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerDays(u8);

impl TimerDays {
    pub const NONE: TimerDays = TimerDays(0x00);
    pub const MONDAY: TimerDays = TimerDays(0x02);
    pub const TUESDAY: TimerDays = TimerDays(0x04);
    pub const WEDNESDAY: TimerDays = TimerDays(0x08);
    pub const THURSDAY: TimerDays = TimerDays(0x10);
    pub const FRIDAY: TimerDays = TimerDays(0x20);
    pub const SATURDAY: TimerDays = TimerDays(0x40);
    pub const SUNDAY: TimerDays = TimerDays(0x80);
    pub const WEEKDAYS: TimerDays = TimerDays(0x3E);
    pub const EVERYDAY: TimerDays = TimerDays(0xFE);

    const NAMED: [(TimerDays, &'static str); 7] = [
        (TimerDays::SUNDAY, "Sunday"),
        (TimerDays::MONDAY, "Monday"),
        (TimerDays::TUESDAY, "Tuesday"),
        (TimerDays::WEDNESDAY, "Wednesday"),
        (TimerDays::THURSDAY, "Thursday"),
        (TimerDays::FRIDAY, "Friday"),
        (TimerDays::SATURDAY, "Saturday"),
    ];

    /// Wrap a raw repeat byte. Unknown bits are kept so they survive a re-encode.
    pub fn from_bits(bits: u8) -> Self {
        TimerDays(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: TimerDays) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn contains_day(&self, day: Weekday) -> bool {
        self.contains(TimerDays::from(day))
    }
}

impl From<Weekday> for TimerDays {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => TimerDays::MONDAY,
            Weekday::Tue => TimerDays::TUESDAY,
            Weekday::Wed => TimerDays::WEDNESDAY,
            Weekday::Thu => TimerDays::THURSDAY,
            Weekday::Fri => TimerDays::FRIDAY,
            Weekday::Sat => TimerDays::SATURDAY,
            Weekday::Sun => TimerDays::SUNDAY,
        }
    }
}

impl BitOr for TimerDays {
    type Output = TimerDays;

    fn bitor(self, rhs: TimerDays) -> TimerDays {
        TimerDays(self.0 | rhs.0)
    }
}

impl BitOrAssign for TimerDays {
    fn bitor_assign(&mut self, rhs: TimerDays) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TimerDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "None");
        }
        if self.contains(TimerDays::EVERYDAY) {
            return write!(f, "Everyday");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(day, _)| self.contains(*day))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(", "))
    }
}
