//! Controller hardware families.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The hardware variant of a controller.
///
/// The family decides command byte layouts, response lengths and which
/// channels are legal. It cannot be detected from the wire, so callers pick it.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use magichome_rs::DeviceFamily;
///
/// let family = DeviceFamily::from_str("RgbWarmWhiteColdWhite").unwrap();
/// assert!(family.has_white2());
/// assert!(!DeviceFamily::Rgb.has_white1());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum DeviceFamily {
    /// RGB strip controller.
    Rgb,
    /// RGB + warm white strip controller.
    RgbWarmWhite,
    /// RGB + warm white + cold white strip controller.
    RgbWarmWhiteColdWhite,
    /// Dimmable RGB/warm-white bulb.
    DimmableBulb,
    /// Older bulb speaking the `0x56`/`0xCC`/`0xEF` command set.
    LegacyBulb,
}

impl DeviceFamily {
    /// Whether the family has a warm white channel.
    pub fn has_white1(&self) -> bool {
        !matches!(self, DeviceFamily::Rgb)
    }

    /// Whether the family has a cold white channel.
    pub fn has_white2(&self) -> bool {
        matches!(self, DeviceFamily::RgbWarmWhiteColdWhite)
    }

    /// Whether RGB and warm white must be sent in separate color commands.
    pub fn exclusive_white(&self) -> bool {
        matches!(
            self,
            DeviceFamily::DimmableBulb
                | DeviceFamily::LegacyBulb
                | DeviceFamily::RgbWarmWhiteColdWhite
        )
    }
}
