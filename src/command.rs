//! Outbound command frames.

/// 8-bit modular sum of `bytes`, the trailer most commands carry.
///
/// # Examples
///
/// ```
/// use magichome_rs::checksum;
///
/// assert_eq!(checksum(&[0x71, 0x23, 0x0F]), 0xA3);
/// assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
/// assert_eq!(checksum(&[]), 0x00);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// An encoded command, ready for a [`crate::Session`].
///
/// Holds the payload without its checksum; the session appends it when
/// [`Command::appends_checksum`] is set, so the frame on the wire is
/// [`Command::frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    payload: Vec<u8>,
    checksum: bool,
    expects_reply: bool,
}

impl Command {
    pub(crate) fn new(payload: Vec<u8>, checksum: bool, expects_reply: bool) -> Self {
        Command {
            payload,
            checksum,
            expects_reply,
        }
    }

    /// The command bytes, without the checksum trailer.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn appends_checksum(&self) -> bool {
        self.checksum
    }

    /// Whether the controller answers this command.
    pub fn expects_reply(&self) -> bool {
        self.expects_reply
    }

    /// The bytes as written to the wire.
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = self.payload.clone();
        if self.checksum {
            frame.push(checksum(&self.payload));
        }
        frame
    }
}
