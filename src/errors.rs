use std::net::SocketAddr;

use crate::types::{Channel, DeviceFamily, MacAddress, PowerState};

/// All error types that can occur when talking to a Magic Home controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A network socket operation failed while communicating with a controller.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// Connecting to the controller did not complete in time.
    #[error("connecting to {addr} timed out")]
    ConnectTimeout { addr: SocketAddr },

    /// The controller never answered, even after re-sending the command.
    #[error("no response after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The controller closed the connection. Call [`crate::Session::reconnect`].
    #[error("connection closed by controller")]
    ConnectionClosed,

    /// The controller replied with the wrong number of bytes.
    #[error("malformed {what} response: expected {expected} bytes, got {actual}")]
    MalformedResponse {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A response field held a value that makes no sense for its position.
    #[error("invalid {what} in response: {detail}")]
    InvalidField { what: &'static str, detail: String },

    /// A response carried a power byte this library does not know.
    #[error("unknown {what} byte 0x{value:02x}")]
    UnknownValue { what: &'static str, value: u8 },

    /// The requested channels cannot be combined in one command for this family.
    #[error("invalid channel combination for {family}: {reason}")]
    InvalidCombination {
        family: DeviceFamily,
        reason: &'static str,
    },

    /// A timer uses a channel the record layout for this family cannot hold.
    #[error("{channel} channel is not supported in {family} timer records")]
    UnsupportedChannelForFamily {
        family: DeviceFamily,
        channel: Channel,
    },

    /// Timers can only turn a device on or off.
    #[error("power state {0:?} cannot be used with timers")]
    UnsupportedTimerState(PowerState),

    /// A one-shot timer (no repeat days) was given no date.
    #[error("non-repeating timer in slot {slot} has no date")]
    MissingTimerDate { slot: usize },

    /// More timers were supplied than a controller can store.
    #[error("only {max} timers can be set, got {count}")]
    TooManySlots { max: usize, count: usize },

    /// A date cannot be expressed in the protocol's 2000-based year byte.
    #[error("date {0} is outside the supported range 2000-2255")]
    DateOutOfRange(chrono::NaiveDate),

    /// No controller with this MAC address answered discovery.
    #[error("no controller with mac {0} found")]
    DeviceNotFound(MacAddress),

    /// Failed to parse a [`MacAddress`] from a string.
    #[error("invalid mac address: {0}")]
    InvalidMacAddress(String),

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new malformed response error
    pub fn malformed(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::MalformedResponse {
            what,
            expected,
            actual,
        }
    }

    /// Create a new invalid channel combination error
    pub fn invalid_combination(family: DeviceFamily, reason: &'static str) -> Self {
        Error::InvalidCombination { family, reason }
    }

    /// Whether the session must be reconnected before it can be used again.
    ///
    /// ```
    /// use magichome_rs::Error;
    ///
    /// assert!(Error::ConnectionClosed.is_transport());
    /// assert!(!Error::malformed("status", 14, 3).is_transport());
    /// ```
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Socket { .. }
                | Error::ConnectTimeout { .. }
                | Error::RetriesExhausted { .. }
                | Error::ConnectionClosed
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
