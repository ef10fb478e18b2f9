//! Binary command encoding and response decoding.
//!
//! Every family speaks a slightly different dialect of the same protocol.
//! Each one has a [`FamilyCodec`] implementation, obtained through
//! [`codec_for`]; the free functions in this module dispatch through it.
//!
//! ```text
//! power   71 ss 0F ck        | legacy: CC ss 33
//! color   31 R G B W1 0F 0F ck | legacy: 56 R G B W1 mask AA
//! preset  61 mm dd 0F ck     | legacy: BB mm dd 44
//! status  81 8A 8B 96        | legacy: EF 01 77
//! ```

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::command::Command;
use crate::errors::Error;
use crate::status::DeviceStatus;
use crate::timer::RecordLayout;
use crate::types::{ChannelSet, DeviceFamily, PowerState, PresetDelay, PresetMode};

type Result<T> = std::result::Result<T, Error>;

/// Length of a status response from the modern families.
pub const STATUS_RESPONSE_LEN: usize = 14;
/// Length of a status response from [`DeviceFamily::LegacyBulb`].
pub const LEGACY_STATUS_RESPONSE_LEN: usize = 12;
/// Length of a clock response.
pub const CLOCK_RESPONSE_LEN: usize = 12;

const MASK_RGB: u8 = 0xF0;
const MASK_WHITE: u8 = 0x0F;
const LEGACY_NORMAL_RGB: u8 = 0x41;
const LEGACY_PAUSED: u8 = 0x20;

/// The family-specific half of the protocol.
pub trait FamilyCodec: Send + Sync {
    fn family(&self) -> DeviceFamily;

    /// Timer record layout used by this family.
    fn record_layout(&self) -> RecordLayout;

    fn encode_power(&self, state: PowerState) -> Command;

    /// Encode a color command. Call [`FamilyCodec::check_channels`] first.
    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8>;

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command;

    fn status_query(&self) -> Command;

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus>;

    /// Reject channel sets the family cannot express in one color command.
    fn check_channels(&self, channels: &ChannelSet) -> Result<()> {
        let family = self.family();
        if channels.white1().is_some() && !family.has_white1() {
            return Err(Error::invalid_combination(
                family,
                "no warm white channel",
            ));
        }
        if channels.white2().is_some() && !family.has_white2() {
            return Err(Error::invalid_combination(
                family,
                "no cold white channel",
            ));
        }
        if family.exclusive_white() && channels.color().is_some() && channels.white1().is_some() {
            return Err(Error::invalid_combination(
                family,
                "rgb and warm white cannot be set at once",
            ));
        }
        Ok(())
    }

    fn encode_color(
        &self,
        channels: &ChannelSet,
        persist: bool,
        requires_ack: bool,
    ) -> Result<Command> {
        self.check_channels(channels)?;
        Ok(Command::new(
            self.encode_color_unchecked(channels, persist),
            self.family() != DeviceFamily::LegacyBulb,
            requires_ack,
        ))
    }
}

/// [`DeviceFamily::Rgb`].
pub struct RgbCodec;
/// [`DeviceFamily::RgbWarmWhite`].
pub struct RgbWarmWhiteCodec;
/// [`DeviceFamily::RgbWarmWhiteColdWhite`].
pub struct RgbWarmWhiteColdWhiteCodec;
/// [`DeviceFamily::DimmableBulb`].
pub struct DimmableBulbCodec;
/// [`DeviceFamily::LegacyBulb`].
pub struct LegacyBulbCodec;

/// The codec for a family.
pub fn codec_for(family: DeviceFamily) -> &'static dyn FamilyCodec {
    match family {
        DeviceFamily::Rgb => &RgbCodec,
        DeviceFamily::RgbWarmWhite => &RgbWarmWhiteCodec,
        DeviceFamily::RgbWarmWhiteColdWhite => &RgbWarmWhiteColdWhiteCodec,
        DeviceFamily::DimmableBulb => &DimmableBulbCodec,
        DeviceFamily::LegacyBulb => &LegacyBulbCodec,
    }
}

fn modern_power(state: PowerState) -> Command {
    Command::new(vec![0x71, state.byte(), 0x0F], true, true)
}

fn modern_preset(mode: PresetMode, delay: PresetDelay) -> Command {
    Command::new(vec![0x61, mode.byte(), delay.value(), 0x0F], true, true)
}

/// The query is already self-checksummed (`0x96` is the sum of the rest).
fn modern_status_query() -> Command {
    Command::new(vec![0x81, 0x8A, 0x8B, 0x96], false, true)
}

fn color_opcode(persist: bool) -> u8 {
    if persist { 0x31 } else { 0x41 }
}

fn rgb_bytes(channels: &ChannelSet) -> [u8; 3] {
    channels
        .color()
        .map(|c| [c.red(), c.green(), c.blue()])
        .unwrap_or_default()
}

fn single_white_color(channels: &ChannelSet, persist: bool) -> Vec<u8> {
    let [r, g, b] = rgb_bytes(channels);
    vec![
        color_opcode(persist),
        r,
        g,
        b,
        channels.white1().unwrap_or(0),
        0x0F,
        0x0F,
    ]
}

fn power_byte(value: u8) -> Result<PowerState> {
    PowerState::create(value).ok_or(Error::UnknownValue {
        what: "power state",
        value,
    })
}


fn decode_modern_status(family: DeviceFamily, bytes: &[u8]) -> Result<DeviceStatus> {
    if bytes.len() != STATUS_RESPONSE_LEN {
        return Err(Error::malformed("status", STATUS_RESPONSE_LEN, bytes.len()));
    }

    Ok(DeviceStatus {
        power_state: power_byte(bytes[2])?,
        mode: PresetMode::from_byte(bytes[3]),
        preset_paused: false,
        preset_delay: bytes[5],
        red: bytes[6],
        green: bytes[7],
        blue: bytes[8],
        white1: family.has_white1().then_some(bytes[9]),
        white2: family.has_white2().then_some(bytes[11]),
        version: Some(bytes[10]),
    })
}

impl FamilyCodec for RgbCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Rgb
    }

    fn record_layout(&self) -> RecordLayout {
        RecordLayout::Compact
    }

    fn encode_power(&self, state: PowerState) -> Command {
        modern_power(state)
    }

    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8> {
        single_white_color(channels, persist)
    }

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command {
        modern_preset(mode, delay)
    }

    fn status_query(&self) -> Command {
        modern_status_query()
    }

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus> {
        decode_modern_status(self.family(), bytes)
    }
}

impl FamilyCodec for RgbWarmWhiteCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::RgbWarmWhite
    }

    fn record_layout(&self) -> RecordLayout {
        RecordLayout::Compact
    }

    fn encode_power(&self, state: PowerState) -> Command {
        modern_power(state)
    }

    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8> {
        single_white_color(channels, persist)
    }

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command {
        modern_preset(mode, delay)
    }

    fn status_query(&self) -> Command {
        modern_status_query()
    }

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus> {
        decode_modern_status(self.family(), bytes)
    }
}

impl FamilyCodec for RgbWarmWhiteColdWhiteCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::RgbWarmWhiteColdWhite
    }

    fn record_layout(&self) -> RecordLayout {
        RecordLayout::Extended
    }

    fn encode_power(&self, state: PowerState) -> Command {
        modern_power(state)
    }

    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8> {
        let [r, g, b] = rgb_bytes(channels);
        let mask = if channels.color().is_some() {
            MASK_RGB
        } else {
            MASK_WHITE
        };
        vec![
            color_opcode(persist),
            r,
            g,
            b,
            channels.white1().unwrap_or(0),
            channels.white2().unwrap_or(0),
            mask,
            0x0F,
        ]
    }

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command {
        modern_preset(mode, delay)
    }

    fn status_query(&self) -> Command {
        modern_status_query()
    }

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus> {
        decode_modern_status(self.family(), bytes)
    }
}

impl FamilyCodec for DimmableBulbCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::DimmableBulb
    }

    fn record_layout(&self) -> RecordLayout {
        RecordLayout::Compact
    }

    fn encode_power(&self, state: PowerState) -> Command {
        modern_power(state)
    }

    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8> {
        single_white_color(channels, persist)
    }

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command {
        modern_preset(mode, delay)
    }

    fn status_query(&self) -> Command {
        modern_status_query()
    }

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus> {
        decode_modern_status(self.family(), bytes)
    }
}

impl FamilyCodec for LegacyBulbCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::LegacyBulb
    }

    fn record_layout(&self) -> RecordLayout {
        RecordLayout::Compact
    }

    fn encode_power(&self, state: PowerState) -> Command {
        Command::new(vec![0xCC, state.byte(), 0x33], false, true)
    }

    fn encode_color_unchecked(&self, channels: &ChannelSet, persist: bool) -> Vec<u8> {
        let [r, g, b] = rgb_bytes(channels);
        let mask = if channels.color().is_some() {
            MASK_RGB
        } else {
            MASK_WHITE
        };
        vec![
            if persist { 0x56 } else { 0x77 },
            r,
            g,
            b,
            channels.white1().unwrap_or(0),
            mask,
            0xAA,
        ]
    }

    fn encode_preset(&self, mode: PresetMode, delay: PresetDelay) -> Command {
        Command::new(vec![0xBB, mode.byte(), delay.value(), 0x44], false, true)
    }

    fn status_query(&self) -> Command {
        Command::new(vec![0xEF, 0x01, 0x77], false, true)
    }

    fn decode_status(&self, bytes: &[u8]) -> Result<DeviceStatus> {
        if bytes.len() != LEGACY_STATUS_RESPONSE_LEN {
            return Err(Error::malformed(
                "status",
                LEGACY_STATUS_RESPONSE_LEN,
                bytes.len(),
            ));
        }

        let mode = if bytes[3] == LEGACY_NORMAL_RGB {
            PresetMode::NormalRgb
        } else {
            PresetMode::from_byte(bytes[3])
        };

        Ok(DeviceStatus {
            power_state: power_byte(bytes[2])?,
            mode,
            preset_paused: bytes[4] == LEGACY_PAUSED,
            preset_delay: bytes[5],
            red: bytes[6],
            green: bytes[7],
            blue: bytes[8],
            white1: Some(bytes[9]),
            white2: None,
            version: Some(bytes[10]),
        })
    }
}

/// Encode a power command.
///
/// # Examples
///
/// ```
/// use magichome_rs::{DeviceFamily, PowerState};
/// use magichome_rs::codec::encode_power;
///
/// let on = encode_power(DeviceFamily::RgbWarmWhite, PowerState::PowerOn);
/// assert_eq!(on.frame(), vec![0x71, 0x23, 0x0F, 0xA3]);
///
/// let off = encode_power(DeviceFamily::LegacyBulb, PowerState::PowerOff);
/// assert_eq!(off.frame(), vec![0xCC, 0x24, 0x33]);
/// ```
pub fn encode_power(family: DeviceFamily, state: PowerState) -> Command {
    codec_for(family).encode_power(state)
}

/// Encode a color command, validating the channel set for the family.
///
/// `persist` selects whether the controller remembers the color across power
/// cycles; `requires_ack` whether the caller waits for the controller's reply.
pub fn encode_color(
    family: DeviceFamily,
    channels: &ChannelSet,
    persist: bool,
    requires_ack: bool,
) -> Result<Command> {
    codec_for(family).encode_color(channels, persist, requires_ack)
}

/// Encode a preset command. `delay` is clamped to 1-24.
pub fn encode_preset(family: DeviceFamily, mode: PresetMode, delay: u8) -> Command {
    codec_for(family).encode_preset(mode, PresetDelay::clamped(delay))
}

pub fn encode_status_query(family: DeviceFamily) -> Command {
    codec_for(family).status_query()
}

pub fn decode_status(family: DeviceFamily, bytes: &[u8]) -> Result<DeviceStatus> {
    codec_for(family).decode_status(bytes)
}

pub fn encode_clock_query() -> Command {
    Command::new(vec![0x11, 0x1A, 0x1B, 0x0F], true, true)
}

/// Encode a clock set command. The weekday byte counts Monday=1 .. Sunday=7.
pub fn encode_clock_set(time: NaiveDateTime) -> Result<Command> {
    let year = year_byte(time.date())?;
    let weekday = time.weekday().number_from_monday() as u8;
    Ok(Command::new(
        vec![
            0x10,
            0x14,
            year,
            time.month() as u8,
            time.day() as u8,
            time.hour() as u8,
            time.minute() as u8,
            time.second() as u8,
            weekday,
            0x00,
            0x0F,
        ],
        true,
        false,
    ))
}

pub fn decode_clock(bytes: &[u8]) -> Result<NaiveDateTime> {
    if bytes.len() != CLOCK_RESPONSE_LEN {
        return Err(Error::malformed("clock", CLOCK_RESPONSE_LEN, bytes.len()));
    }
    date_time_from_bytes(&bytes[3..9]).ok_or_else(|| Error::InvalidField {
        what: "clock",
        detail: format!("{:02x?}", &bytes[3..9]),
    })
}

pub fn encode_timer_query() -> Command {
    Command::new(vec![0x22, 0x2A, 0x2B, 0x0F], true, true)
}

/// The protocol stores years as an offset from 2000 in one byte.
pub(crate) fn year_byte(date: NaiveDate) -> Result<u8> {
    date.year()
        .checked_sub(2000)
        .and_then(|offset| u8::try_from(offset).ok())
        .ok_or(Error::DateOutOfRange(date))
}

/// `[year-2000, month, day, hour, minute, second]`
pub(crate) fn date_time_from_bytes(bytes: &[u8]) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        2000 + i32::from(bytes[0]),
        u32::from(bytes[1]),
        u32::from(bytes[2]),
    )?
    .and_hms_opt(
        u32::from(bytes[3]),
        u32::from(bytes[4]),
        u32::from(bytes[5]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::checksum;

    #[test]
    fn test_preset_delay_is_clamped() {
        let slow = encode_preset(DeviceFamily::Rgb, PresetMode::RgbFade, 30);
        assert_eq!(slow.payload(), &[0x61, 37, 24, 0x0F]);

        let fast = encode_preset(DeviceFamily::LegacyBulb, PresetMode::RgbFade, 0);
        assert_eq!(fast.frame(), vec![0xBB, 37, 1, 0x44]);
    }

    #[test]
    fn test_color_rgb_modern() {
        let command = encode_color(
            DeviceFamily::RgbWarmWhite,
            &ChannelSet::rgb(255, 0, 0),
            true,
            true,
        )
        .unwrap();
        assert_eq!(
            command.frame(),
            vec![0x31, 0xFF, 0x00, 0x00, 0x00, 0x0F, 0x0F, 0x4E]
        );
        assert!(command.expects_reply());
    }

    #[test]
    fn test_color_non_persistent_without_ack() {
        let command = encode_color(
            DeviceFamily::RgbWarmWhite,
            &ChannelSet::rgb(1, 2, 3).with_white1(4),
            false,
            false,
        )
        .unwrap();
        assert_eq!(command.payload(), &[0x41, 1, 2, 3, 4, 0x0F, 0x0F]);
        assert!(!command.expects_reply());
    }

    #[test]
    fn test_color_dual_white_mask() {
        let family = DeviceFamily::RgbWarmWhiteColdWhite;

        let rgb = encode_color(family, &ChannelSet::rgb(10, 20, 30), true, true).unwrap();
        assert_eq!(rgb.payload(), &[0x31, 10, 20, 30, 0, 0, 0xF0, 0x0F]);

        let whites = ChannelSet::white(40).with_white2(50);
        let white = encode_color(family, &whites, true, true).unwrap();
        assert_eq!(white.payload(), &[0x31, 0, 0, 0, 40, 50, 0x0F, 0x0F]);
        assert_eq!(white.frame().last(), Some(&checksum(white.payload())));
    }

    #[test]
    fn test_color_legacy_has_no_checksum() {
        let command =
            encode_color(DeviceFamily::LegacyBulb, &ChannelSet::white(0x80), true, true).unwrap();
        assert_eq!(command.frame(), vec![0x56, 0, 0, 0, 0x80, 0x0F, 0xAA]);

        let rgb =
            encode_color(DeviceFamily::LegacyBulb, &ChannelSet::rgb(1, 2, 3), false, true).unwrap();
        assert_eq!(rgb.frame(), vec![0x77, 1, 2, 3, 0, 0xF0, 0xAA]);
    }

    #[test]
    fn test_color_validation() {
        let err = encode_color(DeviceFamily::Rgb, &ChannelSet::white(5), true, true).unwrap_err();
        assert!(matches!(err, Error::InvalidCombination { .. }));

        let cold = ChannelSet::new().with_white2(1);
        let err = encode_color(DeviceFamily::RgbWarmWhite, &cold, true, true).unwrap_err();
        assert!(matches!(err, Error::InvalidCombination { .. }));

        let both = ChannelSet::rgb(1, 1, 1).with_white1(1);
        for family in [
            DeviceFamily::DimmableBulb,
            DeviceFamily::LegacyBulb,
            DeviceFamily::RgbWarmWhiteColdWhite,
        ] {
            assert!(encode_color(family, &both, true, true).is_err());
        }
        assert!(encode_color(DeviceFamily::RgbWarmWhite, &both, true, true).is_ok());
    }

    #[test]
    fn test_status_queries() {
        let modern = encode_status_query(DeviceFamily::DimmableBulb);
        assert_eq!(modern.frame(), vec![0x81, 0x8A, 0x8B, 0x96]);
        assert_eq!(checksum(&[0x81, 0x8A, 0x8B]), 0x96);

        let legacy = encode_status_query(DeviceFamily::LegacyBulb);
        assert_eq!(legacy.frame(), vec![0xEF, 0x01, 0x77]);
    }

    #[test]
    fn test_decode_modern_status() {
        let bytes = [
            0x81, 0x44, 0x23, 0x61, 0x21, 0x10, 0xFF, 0x80, 0x00, 0x20, 0x06, 0x30, 0x0F, 0x00,
        ];

        let status = decode_status(DeviceFamily::RgbWarmWhiteColdWhite, &bytes).unwrap();
        assert_eq!(status.power_state(), PowerState::PowerOn);
        assert_eq!(status.mode(), PresetMode::NormalRgb);
        assert_eq!(status.preset_delay(), 0x10);
        assert_eq!((status.red(), status.green(), status.blue()), (0xFF, 0x80, 0x00));
        assert_eq!(status.white1(), Some(0x20));
        assert_eq!(status.white2(), Some(0x30));
        assert_eq!(status.version(), Some(0x06));
        assert!(!status.preset_paused());

        let rgb = decode_status(DeviceFamily::Rgb, &bytes).unwrap();
        assert_eq!(rgb.white1(), None);
        assert_eq!(rgb.white2(), None);
    }

    #[test]
    fn test_decode_legacy_status() {
        let bytes = [
            0x66, 0x01, 0x24, 0x41, 0x20, 0x05, 0x01, 0x02, 0x03, 0x04, 0x02, 0x99,
        ];
        let status = decode_status(DeviceFamily::LegacyBulb, &bytes).unwrap();
        assert_eq!(status.power_state(), PowerState::PowerOff);
        assert_eq!(status.mode(), PresetMode::NormalRgb);
        assert!(status.preset_paused());
        assert_eq!(status.preset_delay(), 5);
        assert_eq!(status.white1(), Some(4));
        assert_eq!(status.version(), Some(2));
    }

    #[test]
    fn test_decode_status_wrong_length() {
        let err = decode_status(DeviceFamily::Rgb, &[0u8; 12]).unwrap_err();
        assert_eq!(err, Error::malformed("status", 14, 12));

        let err = decode_status(DeviceFamily::LegacyBulb, &[0u8; 14]).unwrap_err();
        assert_eq!(err, Error::malformed("status", 12, 14));
    }

    #[test]
    fn test_decode_status_keeps_unnamed_mode() {
        let bytes = [
            0x81, 0x25, 0x23, 0x60, 0x21, 0x10, 0xFF, 0x00, 0x00, 0x00, 0x06, 0x00, 0x0F, 0x00,
        ];
        let status = decode_status(DeviceFamily::RgbWarmWhite, &bytes).unwrap();
        assert!(status.is_on());
        assert_eq!(status.mode(), PresetMode::Custom(0x60));
        assert_eq!(status.preset_delay(), 0x10);
        assert_eq!(status.color().red(), 0xFF);

        let mut bytes = [0u8; 14];
        bytes[2] = 0x23;
        bytes[3] = 0x62;
        let status = decode_status(DeviceFamily::Rgb, &bytes).unwrap();
        assert_eq!(status.mode(), PresetMode::Custom(0x62));
    }

    #[test]
    fn test_decode_status_unknown_power() {
        let mut bytes = [0u8; 14];
        bytes[2] = 0x42;
        bytes[3] = 0x61;
        let err = decode_status(DeviceFamily::Rgb, &bytes).unwrap_err();
        assert!(matches!(err, Error::UnknownValue { value: 0x42, .. }));
    }

    #[test]
    fn test_clock_set_maps_sunday_to_seven() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        let command = encode_clock_set(sunday).unwrap();
        assert_eq!(
            command.payload(),
            &[0x10, 0x14, 24, 3, 10, 14, 5, 9, 7, 0x00, 0x0F]
        );
        assert!(!command.expects_reply());

        let monday = sunday + chrono::Duration::days(1);
        assert_eq!(encode_clock_set(monday).unwrap().payload()[8], 1);
    }

    #[test]
    fn test_clock_set_rejects_years_before_2000() {
        let old = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            encode_clock_set(old),
            Err(Error::DateOutOfRange(_))
        ));
    }

    #[test]
    fn test_decode_clock() {
        let bytes = [0x2B, 0x14, 0x00, 24, 3, 10, 14, 5, 9, 7, 0x00, 0x00];
        let time = decode_clock(&bytes).unwrap();
        assert_eq!(time.to_string(), "2024-03-10 14:05:09");

        assert!(matches!(
            decode_clock(&bytes[..11]),
            Err(Error::MalformedResponse { .. })
        ));

        let mut bad = bytes;
        bad[4] = 13;
        assert!(matches!(decode_clock(&bad), Err(Error::InvalidField { .. })));
    }

    #[test]
    fn test_timer_query_frame() {
        assert_eq!(
            encode_timer_query().frame(),
            vec![0x22, 0x2A, 0x2B, 0x0F, 0x86]
        );
    }
}
