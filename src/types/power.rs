//! Power state for controller commands.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Power state byte, as sent in power commands and reported in status.
///
/// Timers only accept [`PowerState::PowerOn`] and [`PowerState::PowerOff`].
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, EnumIter, PartialEq, Eq, Hash)]
pub enum PowerState {
    Pause = 0x20,
    Play = 0x21,
    Toggle = 0x22,
    PowerOn = 0x23,
    #[default]
    PowerOff = 0x24,
}

impl PowerState {
    /// Look up a state by its wire byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_rs::PowerState;
    ///
    /// assert_eq!(PowerState::create(0x23), Some(PowerState::PowerOn));
    /// assert!(PowerState::create(0x00).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        PowerState::iter().find(|state| state.byte() == value)
    }

    pub fn byte(&self) -> u8 {
        *self as u8
    }

    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::PowerOn)
    }
}
