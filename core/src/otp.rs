//! One-time password values as defined in RFC 4226 (HOTP) and RFC 6238 (TOTP).

use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::der;

/// Time step of TOTP credentials, in seconds.
pub const TIME_STEP: u64 = 30;

pub const MIN_DIGITS: u8 = 6;
pub const MAX_DIGITS: u8 = 10;

const TRUNCATION_MASK: u32 = 0x7FFF_FFFF;

/// A calculated one-time password
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Code {
    digits: u8,
    value: String,
}

impl Code {
    /// Formats a truncated value into a code of the digits.
    pub fn new(truncated: u32, digits: u8) -> Self {
        Self {
            digits,
            value: format_code(truncated, digits),
        }
    }

    /// Parses a truncated response: the digits followed by the 4-octet truncated value.
    pub fn from_truncated(response: &[u8], tag: u8) -> der::Result<Self> {
        match response {
            [digits, value @ ..] if value.len() == 4 => {
                let digits = parse_digits(*digits, tag)?;
                let value = [value[0], value[1], value[2], value[3]];

                Ok(Self::new(parse_truncated(value), digits))
            }
            _ => Err(der::Error::InvalidValue(tag)),
        }
    }

    /// Parses a full response: the digits followed by the whole HMAC.
    pub fn from_full(response: &[u8], tag: u8) -> der::Result<Self> {
        match response {
            [digits, hmac @ ..] => {
                let digits = parse_digits(*digits, tag)?;
                let truncated = truncate(hmac).ok_or(der::Error::InvalidValue(tag))?;

                Ok(Self::new(truncated, digits))
            }
            _ => Err(der::Error::InvalidValue(tag)),
        }
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

fn parse_digits(digits: u8, tag: u8) -> der::Result<u8> {
    match digits {
        MIN_DIGITS..=MAX_DIGITS => Ok(digits),
        _ => Err(der::Error::InvalidValue(tag)),
    }
}

/// Builds the TOTP challenge: the number of time steps since the epoch, as 8 octets.
pub fn time_challenge(timestamp: u64) -> [u8; 8] {
    (timestamp / TIME_STEP).to_be_bytes()
}

/// Seconds since the epoch.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Masks a dynamically truncated value down to 31 bits.
pub fn parse_truncated(value: [u8; 4]) -> u32 {
    u32::from_be_bytes(value) & TRUNCATION_MASK
}

/// Applies dynamic truncation to a full HMAC.
/// Returns `None` when the HMAC is too short for the offset it carries.
pub fn truncate(hmac: &[u8]) -> Option<u32> {
    let offset = (hmac.last()? & 0x0F) as usize;
    let value = hmac.get(offset..offset + 4)?;

    Some(parse_truncated([value[0], value[1], value[2], value[3]]))
}

/// Formats the value as a decimal of the digits, padding zeros on the left.
pub fn format_code(value: u32, digits: u8) -> String {
    let modulo = 10u64.pow(digits as u32);

    format!("{:0width$}", value as u64 % modulo, width = digits as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_code() {
        assert_eq!("001234", format_code(1234, 6));
        assert_eq!("00001234", format_code(1234, 8));
        assert_eq!("872921", format_code(1357872921, 6));
        assert_eq!("1357872921", format_code(1357872921, 10));
    }

    #[test]
    fn test_time_challenge() {
        assert_eq!([0, 0, 0, 0, 0, 0, 0, 2], time_challenge(65));
        assert_eq!([0, 0, 0, 0, 0, 0, 0, 1], time_challenge(59));
        assert_eq!([0, 0, 0, 0, 0, 0, 0, 0], time_challenge(29));
    }

    #[test]
    fn test_parse_truncated_masks_sign_bit() {
        assert_eq!(0x7FFF_FFFF, parse_truncated([0xFF, 0xFF, 0xFF, 0xFF]));
        assert_eq!(1234, parse_truncated([0x80, 0x00, 0x04, 0xD2]));
    }

    #[test]
    fn test_truncate() {
        // RFC 4226, section 5.4
        let hmac = hex::decode("1f8698690e02ca16618550ef7f19da8e945b555a").unwrap();

        assert_eq!(Some(0x50EF7F19), truncate(&hmac));
        assert_eq!(None, truncate(&[]));
        assert_eq!(None, truncate(&[0x00, 0x0F]));
    }

    #[test]
    fn test_code_from_truncated() {
        let code = Code::from_truncated(&[6, 0x00, 0x00, 0x04, 0xD2], 0x76).unwrap();

        assert_eq!(6, code.digits());
        assert_eq!("001234", code.to_string());
        assert_eq!(
            Err(der::Error::InvalidValue(0x76)),
            Code::from_truncated(&[6, 0x00, 0x04, 0xD2], 0x76),
        );
        assert_eq!(
            Err(der::Error::InvalidValue(0x76)),
            Code::from_truncated(&[11, 0x00, 0x00, 0x04, 0xD2], 0x76),
        );
    }

    #[test]
    fn test_code_from_full() {
        let mut response = vec![6];
        response.append(&mut hex::decode("1f8698690e02ca16618550ef7f19da8e945b555a").unwrap());

        assert_eq!("872921", Code::from_full(&response, 0x75).unwrap().value());
    }
}
