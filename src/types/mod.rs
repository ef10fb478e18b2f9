//! Value types for controller commands and responses.

mod color;
mod family;
mod mac;
mod power;
mod preset;
mod timer_days;

pub use color::{Channel, ChannelSet, Color};
pub use family::DeviceFamily;
pub use mac::MacAddress;
pub use power::PowerState;
pub use preset::{PresetDelay, PresetMode};
pub use timer_days::TimerDays;
