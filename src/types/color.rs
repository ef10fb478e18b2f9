//! RGB colors and the channel sets sent in color commands.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;

use crate::errors::Error;

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parse from comma-separated string (e.g., "255,128,0").
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use magichome_rs::Color;
    ///
    /// assert_eq!(Color::from_str("255,128,0").unwrap(), Color::rgb(255, 128, 0));
    /// assert!(Color::from_str("255,128").is_err());
    /// assert!(Color::from_str("256,0,0").is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}

/// A single output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Channel {
    #[strum(serialize = "rgb")]
    Rgb,
    #[strum(serialize = "warm white")]
    White1,
    #[strum(serialize = "cold white")]
    White2,
}

/// The channels to set in one color command.
///
/// Absent channels are distinct from channels set to zero: the
/// `RgbWarmWhiteColdWhite` family uses the presence of RGB to decide which
/// output group is active.
///
/// # Examples
///
/// ```
/// use magichome_rs::ChannelSet;
///
/// let warm = ChannelSet::white(200);
/// assert!(warm.color().is_none());
/// assert_eq!(warm.white1(), Some(200));
///
/// let both = ChannelSet::rgb(255, 0, 0).with_white1(0);
/// assert_eq!(both.white1(), Some(0));
/// ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    pub(crate) color: Option<Color>,
    pub(crate) white1: Option<u8>,
    pub(crate) white2: Option<u8>,
}

impl ChannelSet {
    /// An empty channel set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the RGB channels.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::from(Color::rgb(red, green, blue))
    }

    /// Only the warm white channel.
    pub fn white(white1: u8) -> Self {
        ChannelSet {
            white1: Some(white1),
            ..Self::default()
        }
    }

    pub fn with_white1(mut self, white1: u8) -> Self {
        self.white1 = Some(white1);
        self
    }

    pub fn with_white2(mut self, white2: u8) -> Self {
        self.white2 = Some(white2);
        self
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn white1(&self) -> Option<u8> {
        self.white1
    }

    pub fn white2(&self) -> Option<u8> {
        self.white2
    }
}

impl From<Color> for ChannelSet {
    fn from(color: Color) -> Self {
        ChannelSet {
            color: Some(color),
            ..Self::default()
        }
    }
}
