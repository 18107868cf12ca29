//! The OATH application: credentials stored on the card and the session to manage them.

mod credential;
mod session;

use std::fmt::{Display, Formatter};

pub use self::credential::{Credential, CredentialData};
pub use self::session::OathSession;

/// Identifier of the OATH application.
pub const AID: [u8; 8] = [0xA0, 0x00, 0x00, 0x05, 0x27, 0x21, 0x01, 0x01];

/// Instructions of the OATH application.
pub mod ins {
    pub const PUT: u8 = 0x01;
    pub const DELETE: u8 = 0x02;
    pub const SET_CODE: u8 = 0x03;
    pub const RESET: u8 = 0x04;
    pub const LIST: u8 = 0xA1;
    pub const CALCULATE: u8 = 0xA2;
    pub const VALIDATE: u8 = 0xA3;
    pub const CALCULATE_ALL: u8 = 0xA4;
    pub const SEND_REMAINING: u8 = 0xA5;
}

/// Tags of the TLV records exchanged with the OATH application.
pub mod tag {
    pub const NAME: u8 = 0x71;
    pub const NAME_LIST: u8 = 0x72;
    pub const KEY: u8 = 0x73;
    pub const CHALLENGE: u8 = 0x74;
    pub const RESPONSE: u8 = 0x75;
    pub const TRUNCATED_RESPONSE: u8 = 0x76;
    pub const PROPERTY: u8 = 0x78;
    pub const VERSION: u8 = 0x79;
    pub const IMF: u8 = 0x7A;
}

/// Type of the OATH credential
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OathType {
    /// Counter-based (RFC 4226)
    Hotp,

    /// Time-based (RFC 6238)
    Totp,
}

impl OathType {
    const MASK: u8 = 0xF0;

    /// Converts the variant into the high nibble of the key metadata octet.
    pub fn into_byte(self) -> u8 {
        match self {
            Self::Hotp => 0x10,
            Self::Totp => 0x20,
        }
    }

    /// Parses the high nibble of the key metadata octet.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & Self::MASK {
            0x10 => Some(Self::Hotp),
            0x20 => Some(Self::Totp),
            _ => None,
        }
    }
}

impl Display for OathType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hotp => "HOTP",
            Self::Totp => "TOTP",
        })
    }
}

/// Hash algorithm of the HMAC behind a credential
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
}

impl Algorithm {
    /// Converts the variant into the low nibble of the key metadata octet.
    pub fn into_byte(self) -> u8 {
        match self {
            Self::Sha1 => 0x01,
            Self::Sha256 => 0x02,
        }
    }
}

/// Firmware version reported by the application
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Version(pub u8, pub u8, pub u8);

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oath_type_byte() {
        assert_eq!(Some(OathType::Hotp), OathType::from_byte(0x11));
        assert_eq!(Some(OathType::Totp), OathType::from_byte(0x22));
        assert_eq!(None, OathType::from_byte(0x31));
        assert_eq!(0x21, OathType::Totp.into_byte() | Algorithm::Sha1.into_byte());
    }

    #[test]
    fn test_version_display() {
        assert_eq!("4.3.1", Version(4, 3, 1).to_string());
    }
}
