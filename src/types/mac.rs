//! Hardware addresses reported by discovery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// A 48-bit MAC address, the identity of a controller.
///
/// Parses the bare form controllers send (`ACCF23A1B2C3`) as well as the
/// colon- and dash-separated forms. Displays colon-separated, upper case.
///
/// # Examples
///
/// ```
/// use magichome_rs::MacAddress;
///
/// let bare: MacAddress = "ACCF23A1B2C3".parse().unwrap();
/// let colons: MacAddress = "ac:cf:23:a1:b2:c3".parse().unwrap();
/// assert_eq!(bare, colons);
/// assert_eq!(bare.to_string(), "AC:CF:23:A1:B2:C3");
/// assert!("ACCF23".parse::<MacAddress>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidMacAddress(s.to_string());

        let hex: String = s.trim().chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dash_separated() {
        let mac: MacAddress = "ac-cf-23-00-00-7f".parse().unwrap();
        assert_eq!(mac.octets(), [0xAC, 0xCF, 0x23, 0x00, 0x00, 0x7F]);
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert_eq!(
            "ACCF23A1B2ZZ".parse::<MacAddress>().unwrap_err(),
            Error::InvalidMacAddress("ACCF23A1B2ZZ".to_string())
        );
        assert!("+ACCF23A1B2C".parse::<MacAddress>().is_err());
        assert!("+a:cf:23:a1:b2:c3".parse::<MacAddress>().is_err());
        assert!("ÄCCF23A1B2C".parse::<MacAddress>().is_err());
    }
}
