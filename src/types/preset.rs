//! Built-in preset modes and their delay parameter.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};

/// Controller operating mode.
///
/// `NormalRgb` outputs the channel values directly; the others are the
/// built-in animations. `None` only shows up in decoded timers whose action
/// carries no mode. Mode bytes this library has no name for, such as custom
/// programs or music modes, are kept as `Custom`.
#[derive(
    Debug, Default, Serialize, Deserialize, Clone, Copy, EnumIter, EnumString, PartialEq, Eq, Hash,
)]
#[strum(ascii_case_insensitive)]
pub enum PresetMode {
    #[default]
    None,
    RgbFade,
    RedPulse,
    GreenPulse,
    BluePulse,
    YellowPulse,
    CyanPulse,
    VioletPulse,
    WhitePulse,
    RedGreenAlternatePulse,
    RedBlueAlternatePulse,
    GreenBlueAlternatePulse,
    DiscoFlash,
    RedFlash,
    GreenFlash,
    BlueFlash,
    YellowFlash,
    CyanFlash,
    VioletFlash,
    WhiteFlash,
    ColorChange,
    NormalRgb,
    #[strum(disabled)]
    Custom(u8),
}

impl PresetMode {
    /// Look up a named mode by its wire byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_rs::PresetMode;
    ///
    /// assert_eq!(PresetMode::create(44), Some(PresetMode::WhitePulse));
    /// assert_eq!(PresetMode::create(0x61), Some(PresetMode::NormalRgb));
    /// assert!(PresetMode::create(36).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        PresetMode::iter()
            .filter(|mode| !matches!(mode, PresetMode::Custom(_)))
            .find(|mode| mode.byte() == value)
    }

    /// Map any wire byte to a mode, keeping unnamed bytes as `Custom`.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_rs::PresetMode;
    ///
    /// assert_eq!(PresetMode::from_byte(56), PresetMode::ColorChange);
    /// assert_eq!(PresetMode::from_byte(0x60), PresetMode::Custom(0x60));
    /// assert_eq!(PresetMode::from_byte(0x60).byte(), 0x60);
    /// ```
    pub fn from_byte(value: u8) -> Self {
        Self::create(value).unwrap_or(PresetMode::Custom(value))
    }

    pub fn byte(&self) -> u8 {
        match self {
            PresetMode::None => 0,
            PresetMode::RgbFade => 37,
            PresetMode::RedPulse => 38,
            PresetMode::GreenPulse => 39,
            PresetMode::BluePulse => 40,
            PresetMode::YellowPulse => 41,
            PresetMode::CyanPulse => 42,
            PresetMode::VioletPulse => 43,
            PresetMode::WhitePulse => 44,
            PresetMode::RedGreenAlternatePulse => 45,
            PresetMode::RedBlueAlternatePulse => 46,
            PresetMode::GreenBlueAlternatePulse => 47,
            PresetMode::DiscoFlash => 48,
            PresetMode::RedFlash => 49,
            PresetMode::GreenFlash => 50,
            PresetMode::BlueFlash => 51,
            PresetMode::YellowFlash => 52,
            PresetMode::CyanFlash => 53,
            PresetMode::VioletFlash => 54,
            PresetMode::WhiteFlash => 55,
            PresetMode::ColorChange => 56,
            PresetMode::NormalRgb => 97,
            PresetMode::Custom(value) => *value,
        }
    }

    /// Whether this is one of the built-in animations.
    pub fn is_animation(&self) -> bool {
        !matches!(
            self,
            PresetMode::None | PresetMode::NormalRgb | PresetMode::Custom(_)
        )
    }
}

impl fmt::Display for PresetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetMode::Custom(value) => write!(f, "Custom(0x{value:02x})"),
            named => fmt::Debug::fmt(named, f),
        }
    }
}

/// Animation delay for presets, 1 (fastest) to 24 (slowest).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PresetDelay {
    pub(crate) value: u8,
}

impl PresetDelay {
    const MIN: u8 = 1;
    const MAX: u8 = 24;

    /// Create a delay, returning `None` outside 1-24.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_rs::PresetDelay;
    ///
    /// assert!(PresetDelay::create(0).is_none());
    /// assert!(PresetDelay::create(1).is_some());
    /// assert!(PresetDelay::create(24).is_some());
    /// assert!(PresetDelay::create(25).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(PresetDelay { value })
        } else {
            None
        }
    }

    /// Create a delay, pulling out-of-range values to the nearest bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use magichome_rs::PresetDelay;
    ///
    /// assert_eq!(PresetDelay::clamped(0).value(), 1);
    /// assert_eq!(PresetDelay::clamped(12).value(), 12);
    /// assert_eq!(PresetDelay::clamped(30).value(), 24);
    /// ```
    pub fn clamped(value: u8) -> Self {
        PresetDelay {
            value: value.clamp(Self::MIN, Self::MAX),
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}
