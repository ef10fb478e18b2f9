//! Timer schedules and their binary record format.
//!
//! A controller stores exactly [`MAX_TIMERS`] timer slots. Each slot is a
//! fixed-size record:
//!
//! ```text
//! 0      active (F0) / inactive (0F)
//! 1..=3  year-2000, month, day   (one-shot timers only)
//! 4..=6  hour, minute, second
//! 7      repeat days             (00 = one-shot)
//! 8      mode
//! 9..    R G B W1 [W2] or preset delay at 9
//! last   action: F0 = power on, 0F = power off
//! ```
//!
//! Families with a cold white channel use 15-byte records, all others 14.

use std::fmt;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::{codec_for, date_time_from_bytes, year_byte};
use crate::errors::Error;
use crate::status::DeviceStatus;
use crate::types::{Channel, DeviceFamily, PowerState, PresetMode, TimerDays};

type Result<T> = std::result::Result<T, Error>;

/// Number of timer slots a controller stores.
pub const MAX_TIMERS: usize = 6;

const SLOT_ACTIVE: u8 = 0xF0;
const SLOT_INACTIVE: u8 = 0x0F;
const ACTION_ON: u8 = 0xF0;
const ACTION_OFF: u8 = 0x0F;
const SET_TIMERS: u8 = 0x21;
const MESSAGE_TRAILER: [u8; 2] = [0x00, 0xF0];
const RESPONSE_HEADER_LEN: usize = 2;

/// Size of one timer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// 14-byte records, no cold white byte.
    Compact,
    /// 15-byte records with a cold white byte.
    Extended,
}

impl RecordLayout {
    pub fn record_len(&self) -> usize {
        match self {
            RecordLayout::Compact => 14,
            RecordLayout::Extended => 15,
        }
    }

    /// Length of an encoded schedule, before the checksum.
    pub fn message_len(&self) -> usize {
        1 + MAX_TIMERS * self.record_len() + MESSAGE_TRAILER.len()
    }

    /// Length of the controller's reply to a timer query.
    pub fn response_len(&self) -> usize {
        RESPONSE_HEADER_LEN + MAX_TIMERS * self.record_len() + 2
    }

    fn from_response_len(len: usize) -> Option<Self> {
        [RecordLayout::Compact, RecordLayout::Extended]
            .into_iter()
            .find(|layout| layout.response_len() == len)
    }

    fn action_offset(&self) -> usize {
        self.record_len() - 1
    }
}

/// What to do with one-shot timers whose date has already passed.
///
/// Controllers keep expired one-shot timers around. Dropping them makes a
/// decoded schedule depend on the current time, so the reference time is
/// always passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryFilter {
    /// Keep every timer the controller reports.
    Disabled,
    /// Drop one-shot timers dated before this instant.
    DropBefore(NaiveDateTime),
}

impl ExpiryFilter {
    /// Drop one-shot timers that expired before the local wall-clock time.
    pub fn now_local() -> Self {
        ExpiryFilter::DropBefore(Local::now().naive_local())
    }

    fn is_expired(&self, date: NaiveDateTime) -> bool {
        match self {
            ExpiryFilter::Disabled => false,
            ExpiryFilter::DropBefore(now) => date < *now,
        }
    }
}

/// One timer slot.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use magichome_rs::{DeviceStatus, TimerDays, TimerSlot};
///
/// let wake = TimerSlot::repeating(
///     TimerDays::WEEKDAYS,
///     NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
///     DeviceStatus::rgb(255, 128, 0),
/// );
/// assert!(wake.is_active());
/// assert!(wake.date().is_none());
/// assert_eq!(
///     wake.to_string(),
///     "active: every Monday, Tuesday, Wednesday, Thursday, Friday at 06:30 set mode NormalRgb, R=255, G=128, B=0, WW=-, CW=-"
/// );
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSlot {
    active: bool,
    repeat_days: TimerDays,
    time: NaiveTime,
    date: Option<NaiveDate>,
    status: DeviceStatus,
}

impl TimerSlot {
    /// An unused slot.
    pub fn inactive() -> Self {
        TimerSlot::default()
    }

    /// An active timer that fires once.
    pub fn once(at: NaiveDateTime, status: DeviceStatus) -> Self {
        TimerSlot {
            active: true,
            repeat_days: TimerDays::NONE,
            time: at.time(),
            date: Some(at.date()),
            status,
        }
    }

    /// An active timer that fires at `time` on each of `days`.
    pub fn repeating(days: TimerDays, time: NaiveTime, status: DeviceStatus) -> Self {
        TimerSlot {
            active: true,
            repeat_days: days,
            time,
            date: None,
            status,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set the date of a one-shot timer.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn repeat_days(&self) -> TimerDays {
        self.repeat_days
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// The date a one-shot timer fires on. Repeating timers have none.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn date_time(&self) -> Option<NaiveDateTime> {
        self.date.map(|date| date.and_time(self.time))
    }

    /// The state applied when the timer fires.
    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }
}

fn channel_text(value: Option<u8>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.active { "active: " } else { "inactive: " })?;

        match self.date_time() {
            Some(at) if self.repeat_days.is_none() => {
                write!(f, "on {} ", at.format("%Y-%m-%dT%H:%M:%S"))?
            }
            _ => write!(
                f,
                "every {} at {} ",
                self.repeat_days,
                self.time.format("%H:%M")
            )?,
        }

        let status = &self.status;
        if !status.is_on() {
            return write!(f, "turn off");
        }

        write!(f, "set mode {}", status.mode())?;
        if status.mode() == PresetMode::NormalRgb {
            write!(
                f,
                ", R={}, G={}, B={}, WW={}, CW={}",
                status.red(),
                status.green(),
                status.blue(),
                channel_text(status.white1()),
                channel_text(status.white2())
            )
        } else {
            write!(f, " delay {}", status.preset_delay())
        }
    }
}

/// Encode a schedule for a set-timers command.
///
/// Fewer than [`MAX_TIMERS`] slots are padded with inactive ones. The
/// result has no checksum yet; [`crate::Device::set_timers`] sends it with
/// one.
///
/// # Examples
///
/// ```
/// use magichome_rs::{DeviceFamily, encode_schedule};
///
/// let empty = encode_schedule(&[], DeviceFamily::RgbWarmWhite).unwrap();
/// assert_eq!(empty.len(), 87);
/// assert_eq!(empty[0], 0x21);
/// assert_eq!(empty[1], 0x0F);
/// assert_eq!(&empty[85..], &[0x00, 0xF0]);
///
/// let empty = encode_schedule(&[], DeviceFamily::RgbWarmWhiteColdWhite).unwrap();
/// assert_eq!(empty.len(), 93);
/// ```
pub fn encode_schedule(slots: &[TimerSlot], family: DeviceFamily) -> Result<Vec<u8>> {
    if slots.len() > MAX_TIMERS {
        return Err(Error::TooManySlots {
            max: MAX_TIMERS,
            count: slots.len(),
        });
    }

    let layout = codec_for(family).record_layout();
    let record_len = layout.record_len();
    let padding = TimerSlot::inactive();

    let mut message = vec![0u8; layout.message_len()];
    message[0] = SET_TIMERS;

    for index in 0..MAX_TIMERS {
        let slot = slots.get(index).unwrap_or(&padding);
        let start = 1 + index * record_len;
        encode_record(
            slot,
            index,
            family,
            layout,
            &mut message[start..start + record_len],
        )?;
    }

    let trailer_start = message.len() - MESSAGE_TRAILER.len();
    message[trailer_start..].copy_from_slice(&MESSAGE_TRAILER);
    Ok(message)
}

fn encode_record(
    slot: &TimerSlot,
    index: usize,
    family: DeviceFamily,
    layout: RecordLayout,
    record: &mut [u8],
) -> Result<()> {
    if !slot.active {
        record[0] = SLOT_INACTIVE;
        return Ok(());
    }
    record[0] = SLOT_ACTIVE;

    if slot.repeat_days.is_none() {
        let date = slot.date.ok_or(Error::MissingTimerDate { slot: index })?;
        record[1] = year_byte(date)?;
        record[2] = date.month() as u8;
        record[3] = date.day() as u8;
    }
    record[4] = slot.time.hour() as u8;
    record[5] = slot.time.minute() as u8;
    record[6] = slot.time.second() as u8;
    record[7] = slot.repeat_days.bits();

    let status = &slot.status;
    match status.power_state() {
        PowerState::PowerOff => {
            record[layout.action_offset()] = ACTION_OFF;
            return Ok(());
        }
        PowerState::PowerOn => record[layout.action_offset()] = ACTION_ON,
        other => return Err(Error::UnsupportedTimerState(other)),
    }

    record[8] = status.mode().byte();
    if status.mode() == PresetMode::NormalRgb {
        record[9] = status.red();
        record[10] = status.green();
        record[11] = status.blue();
        record[12] = status.white1().unwrap_or(0);
        match (layout, status.white2()) {
            (RecordLayout::Extended, white2) => record[13] = white2.unwrap_or(0),
            (RecordLayout::Compact, Some(_)) => {
                return Err(Error::UnsupportedChannelForFamily {
                    family,
                    channel: Channel::White2,
                });
            }
            (RecordLayout::Compact, None) => {}
        }
    } else {
        record[9] = status.preset_delay();
    }

    Ok(())
}

/// Decode the reply to a timer query.
///
/// The record layout follows the reply length (88 or 94 bytes). Unused
/// slots are left out, and so are one-shot timers the `expiry` filter
/// considers past, so the result can hold fewer than [`MAX_TIMERS`] slots.
/// Timer white channel bytes of zero decode as absent.
pub fn decode_schedule(
    bytes: &[u8],
    family: DeviceFamily,
    expiry: ExpiryFilter,
) -> Result<Vec<TimerSlot>> {
    let layout = RecordLayout::from_response_len(bytes.len()).ok_or_else(|| {
        Error::malformed(
            "timers",
            codec_for(family).record_layout().response_len(),
            bytes.len(),
        )
    })?;

    let record_len = layout.record_len();
    let mut slots = Vec::with_capacity(MAX_TIMERS);
    for index in 0..MAX_TIMERS {
        let start = RESPONSE_HEADER_LEN + index * record_len;
        if let Some(slot) = decode_record(&bytes[start..start + record_len], index, layout, expiry)? {
            slots.push(slot);
        }
    }
    Ok(slots)
}

fn decode_record(
    record: &[u8],
    index: usize,
    layout: RecordLayout,
    expiry: ExpiryFilter,
) -> Result<Option<TimerSlot>> {
    let active = record[0] == SLOT_ACTIVE;
    if !active && record[1..7].iter().all(|b| *b == 0) {
        return Ok(None);
    }

    let repeat_days = TimerDays::from_bits(record[7]);
    let (date, time) = if repeat_days.is_none() {
        let Some(at) = date_time_from_bytes(&record[1..7]) else {
            if !active {
                debug!("dropping inactive timer {index} with invalid date {:02x?}", &record[1..7]);
                return Ok(None);
            }
            return Err(Error::InvalidField {
                what: "timer date",
                detail: format!("slot {index}: {:02x?}", &record[1..7]),
            });
        };
        if expiry.is_expired(at) {
            debug!("dropping expired one-shot timer {index} at {at}");
            return Ok(None);
        }
        (Some(at.date()), at.time())
    } else {
        let time = NaiveTime::from_hms_opt(
            u32::from(record[4]),
            u32::from(record[5]),
            u32::from(record[6]),
        )
        .ok_or_else(|| Error::InvalidField {
            what: "timer time",
            detail: format!("slot {index}: {:02x?}", &record[4..7]),
        })?;
        (None, time)
    };

    let status = if record[layout.action_offset()] == ACTION_ON {
        decode_action(record, layout)
    } else {
        DeviceStatus::off()
    };

    Ok(Some(TimerSlot {
        active,
        repeat_days,
        time,
        date,
        status,
    }))
}

fn decode_action(record: &[u8], layout: RecordLayout) -> DeviceStatus {
    let mode = PresetMode::from_byte(record[8]);
    let nonzero = |byte: u8| (byte != 0).then_some(byte);
    let mut status = DeviceStatus::on(mode);
    match mode {
        PresetMode::NormalRgb => {
            status.red = record[9];
            status.green = record[10];
            status.blue = record[11];
            status.white1 = nonzero(record[12]);
            if layout == RecordLayout::Extended {
                status.white2 = nonzero(record[13]);
            }
        }
        PresetMode::None => {}
        _ => status.preset_delay = record[9],
    }
    status
}
