//! Controller state, as reported by a status query or applied by a timer.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelSet, Color, PowerState, PresetMode};

/// A snapshot of controller state.
///
/// Returned by [`crate::Device::get_status`]. Callers also build one to
/// describe what a [`crate::TimerSlot`] should apply when it fires.
///
/// # Examples
///
/// ```
/// use magichome_rs::{DeviceStatus, PowerState, PresetMode};
///
/// let purple = DeviceStatus::rgb(255, 0, 255);
/// assert_eq!(purple.power_state(), PowerState::PowerOn);
/// assert_eq!(purple.mode(), PresetMode::NormalRgb);
/// assert!(purple.white1().is_none());
///
/// let pulse = DeviceStatus::preset(PresetMode::WhitePulse, 16);
/// assert_eq!(pulse.preset_delay(), 16);
///
/// assert_eq!(DeviceStatus::off().power_state(), PowerState::PowerOff);
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub(crate) power_state: PowerState,
    pub(crate) mode: PresetMode,
    pub(crate) preset_paused: bool,
    pub(crate) preset_delay: u8,
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
    pub(crate) white1: Option<u8>,
    pub(crate) white2: Option<u8>,
    pub(crate) version: Option<u8>,
}

impl DeviceStatus {
    /// Powered off; nothing else is meaningful.
    pub fn off() -> Self {
        DeviceStatus::default()
    }

    /// Powered on in a mode, with no channel values.
    pub fn on(mode: PresetMode) -> Self {
        DeviceStatus {
            power_state: PowerState::PowerOn,
            mode,
            ..DeviceStatus::default()
        }
    }

    /// Powered on, outputting the RGB channels directly.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        DeviceStatus {
            red,
            green,
            blue,
            ..DeviceStatus::on(PresetMode::NormalRgb)
        }
    }

    /// Powered on, outputting the given channel set directly.
    pub fn channels(channels: &ChannelSet) -> Self {
        let color = channels.color().unwrap_or_default();
        DeviceStatus {
            white1: channels.white1(),
            white2: channels.white2(),
            ..DeviceStatus::rgb(color.red(), color.green(), color.blue())
        }
    }

    /// Powered on, running a built-in animation.
    pub fn preset(mode: PresetMode, delay: u8) -> Self {
        DeviceStatus {
            preset_delay: delay,
            ..DeviceStatus::on(mode)
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

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    /// Whether the controller output is on.
    pub fn is_on(&self) -> bool {
        self.power_state.is_on()
    }

    pub fn mode(&self) -> PresetMode {
        self.mode
    }

    /// Whether a running preset is paused. Only legacy bulbs report this.
    pub fn preset_paused(&self) -> bool {
        self.preset_paused
    }

    pub fn preset_delay(&self) -> u8 {
        self.preset_delay
    }

    pub fn color(&self) -> Color {
        Color::rgb(self.red, self.green, self.blue)
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

    pub fn white1(&self) -> Option<u8> {
        self.white1
    }

    pub fn white2(&self) -> Option<u8> {
        self.white2
    }

    /// Firmware version, when the controller reports one.
    pub fn version(&self) -> Option<u8> {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_keep_absent_whites_absent() {
        let status = DeviceStatus::channels(&ChannelSet::white(0));
        assert_eq!(status.white1(), Some(0));
        assert_eq!(status.white2(), None);
        assert_eq!(status.color(), Color::rgb(0, 0, 0));
        assert_eq!(status.mode(), PresetMode::NormalRgb);
    }

    #[test]
    fn test_serialize_skips_absent_channels() {
        let json = serde_json::to_value(DeviceStatus::rgb(1, 2, 3)).unwrap();
        assert!(json.get("white1").is_none());
        assert_eq!(json["red"], 1);
        assert_eq!(json["mode"], "NormalRgb");
    }
}
