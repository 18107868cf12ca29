//! Parsing `otpauth://` URIs, as encoded in QR codes of OATH credentials.

use url::Url;

use crate::error::{Error, Result};
use crate::oath::{Algorithm, CredentialData, OathType};

const SCHEME: &str = "otpauth";

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

impl CredentialData {
    /// Parses an `otpauth://` URI into credential parameters.
    ///
    /// Anything that is not an `otpauth` URI is taken as a base32-encoded TOTP secret,
    /// leaving the name empty for the caller to fill in.
    pub fn parse_uri(uri: &str) -> Result<Self> {
        let url = match Url::parse(uri.trim()) {
            Ok(url) if url.scheme() == SCHEME => url,
            _ => return Ok(Self::new(String::new(), decode_base32(uri)?)),
        };

        let oath_type = match url.host_str().map(str::to_ascii_lowercase).as_deref() {
            Some("totp") => OathType::Totp,
            Some("hotp") => OathType::Hotp,
            other => {
                return Err(Error::InvalidUri(format!(
                    "unknown type {}",
                    other.unwrap_or_default()
                )))
            }
        };

        let mut name = percent_decode(url.path().trim_start_matches('/'))?;
        let mut data = Self::new(String::new(), Vec::new());
        data.oath_type = oath_type;

        let mut secret = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                "secret" => secret = Some(decode_base32(&value)?),
                "issuer" if !name.starts_with(&*value) => {
                    name = format!("{}:{}", value, name);
                }
                "algorithm" => {
                    data.algorithm = match value.to_ascii_uppercase().as_str() {
                        "SHA1" => Algorithm::Sha1,
                        "SHA256" => Algorithm::Sha256,
                        other => {
                            return Err(Error::InvalidUri(format!(
                                "unsupported algorithm {}",
                                other
                            )))
                        }
                    }
                }
                "digits" => data.digits = parse_number(&value, "digits")?,
                "counter" => data.counter = parse_number(&value, "counter")?,
                _ => {}
            }
        }

        data.name = name;
        data.secret = secret.ok_or_else(|| Error::InvalidUri("missing secret".to_string()))?;

        Ok(data)
    }
}

fn parse_number<N: std::str::FromStr>(value: &str, field: &str) -> Result<N> {
    value
        .parse()
        .map_err(|_| Error::InvalidUri(format!("invalid {} {}", field, value)))
}

/// Decodes the percent-encoded label in the path.
fn percent_decode(path: &str) -> Result<String> {
    let bytes = path.as_bytes();
    let mut buf = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let octet = path
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.bytes().all(|c| c.is_ascii_hexdigit()))
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or_else(|| Error::InvalidUri(format!("invalid escape in {}", path)))?;

                buf.push(octet);
                i += 3;
            }
            octet => {
                buf.push(octet);
                i += 1;
            }
        }
    }

    String::from_utf8(buf).map_err(|_| Error::InvalidUri("label is not UTF-8".to_string()))
}

/// Decodes an RFC 4648 base32 secret.
/// Cases, whitespaces and paddings are ignored; incomplete trailing bits are dropped.
pub fn decode_base32(encoded: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut bits = 0u32;
    let mut count = 0u32;

    for c in encoded.bytes() {
        if c == b'=' || c.is_ascii_whitespace() {
            continue;
        }

        let index = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())
            .ok_or_else(|| Error::InvalidUri(format!("invalid base32 character {:?}", c as char)))?;

        bits = (bits << 5) | index as u32;
        count += 5;

        if count >= 8 {
            count -= 8;
            buf.push((bits >> count) as u8);
            bits &= (1 << count) - 1;
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base32() {
        assert_eq!(
            b"Hello!\xDE\xAD\xBE\xEF".to_vec(),
            decode_base32("JBSWY3DPEHPK3PXP").unwrap()
        );
        assert_eq!(b"foobar".to_vec(), decode_base32("mzxw 6ytb oi======").unwrap());
        assert!(decode_base32("JBSW1").is_err());
    }

    #[test]
    fn test_parse_uri() {
        let data = CredentialData::parse_uri(
            "otpauth://totp/Example:alice@google.com?secret=JBSWY3DPEHPK3PXP&issuer=Example",
        )
        .unwrap();

        assert_eq!("Example:alice@google.com", data.name);
        assert_eq!(b"Hello!\xDE\xAD\xBE\xEF".to_vec(), data.secret);
        assert_eq!(OathType::Totp, data.oath_type);
        assert_eq!(Algorithm::Sha1, data.algorithm);
        assert_eq!(6, data.digits);
    }

    #[test]
    fn test_parse_uri_prefixes_issuer() {
        let data = CredentialData::parse_uri(
            "otpauth://hotp/alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=ACME&counter=5&digits=8&algorithm=SHA256",
        )
        .unwrap();

        assert_eq!("ACME:alice@example.com", data.name);
        assert_eq!(OathType::Hotp, data.oath_type);
        assert_eq!(Algorithm::Sha256, data.algorithm);
        assert_eq!(8, data.digits);
        assert_eq!(5, data.counter);
    }

    #[test]
    fn test_parse_bare_secret() {
        let data = CredentialData::parse_uri("JBSWY3DPEHPK3PXP").unwrap();

        assert_eq!("", data.name);
        assert_eq!(OathType::Totp, data.oath_type);
        assert_eq!(b"Hello!\xDE\xAD\xBE\xEF".to_vec(), data.secret);
    }

    #[test]
    fn test_parse_uri_errors() {
        assert!(CredentialData::parse_uri("otpauth://totp/alice").is_err());
        assert!(CredentialData::parse_uri("otpauth://motp/alice?secret=JBSWY3DPEHPK3PXP").is_err());
        assert!(
            CredentialData::parse_uri("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=x")
                .is_err()
        );
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!("alice@example.com", percent_decode("alice%40example.com").unwrap());
        assert!(percent_decode("%+1").is_err());
        assert!(percent_decode("%4").is_err());
        assert!(percent_decode("%zz").is_err());
    }
}
