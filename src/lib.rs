//! # magichome_rs
//!
//! An async Rust library for controlling Magic Home (Flux) LED controllers
//! over the local network.
//!
//! This crate provides a **runtime-agnostic** async API for the controllers'
//! binary TCP protocol: power, color, built-in animations, the clock and the
//! six on-board timers. Controllers are found with a UDP broadcast.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use magichome_rs::{ChannelSet, Device, DeviceFamily};
//!
//! // Works with any async runtime!
//! async fn control_strip() -> Result<(), magichome_rs::Error> {
//!     let mut device = Device::new(Ipv4Addr::new(192, 168, 1, 100), DeviceFamily::RgbWarmWhite);
//!
//!     device.turn_on().await?;
//!     device.set_color(&ChannelSet::rgb(0, 0, 255), true, true).await?;
//!     println!("{:?}", device.get_status().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Device Families**: RGB, RGB+WW, RGB+WW+CW strips, dimmable and legacy bulbs via [`DeviceFamily`]
//! - **Colors**: Set RGB and white channels with [`ChannelSet`]
//! - **Presets**: Run built-in animations with [`PresetMode`]
//! - **Timers**: Read and write the controller's schedule as [`TimerSlot`]s
//! - **Discovery**: Find controllers on your network with [`discover`] or [`discover_devices`]
//! - **Raw Protocol**: Encode commands and decode responses without I/O through [`codec`]
//!
//! ## Communication
//!
//! Controllers accept commands over TCP on port 5577 and answer discovery
//! probes over UDP on port 48899. A [`Session`] owns one connection and sends
//! one command at a time.
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! magichome-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! magichome-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! magichome-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

pub mod codec;
mod command;
mod device;
mod discovery;
mod errors;
pub mod runtime;
mod session;
mod status;
mod timer;
mod types;

// Re-export public API
pub use command::{Command, checksum};
pub use device::Device;
pub use discovery::{
    DISCOVERY_PORT, DiscoveredDevice, DiscoveryConfig, PROBE, discover, discover_devices,
};
pub use errors::Error;
pub use session::{DEFAULT_PORT, Session, SessionConfig, SessionState};
pub use status::DeviceStatus;
pub use timer::{
    ExpiryFilter, MAX_TIMERS, RecordLayout, TimerSlot, decode_schedule, encode_schedule,
};
pub use types::{
    Channel, ChannelSet, Color, DeviceFamily, MacAddress, PowerState, PresetDelay, PresetMode,
    TimerDays,
};
