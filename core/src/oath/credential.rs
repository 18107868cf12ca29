use std::fmt::{Debug, Formatter};

use crate::error::Result;
use crate::nfc::Handler;
use crate::oath::{Algorithm, OathSession, OathType};
use crate::otp::{Code, MIN_DIGITS};

/// Reference to a credential stored on the card.
///
/// A credential does not hold the session; operations on it borrow the session that listed
/// or created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Credential {
    name: String,
    oath_type: OathType,
}

impl Credential {
    pub fn new(name: impl Into<String>, oath_type: OathType) -> Self {
        Self {
            name: name.into(),
            oath_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oath_type(&self) -> OathType {
        self.oath_type
    }

    /// Calculates a code of the credential, at the timestamp or now if it is a TOTP one.
    pub fn calculate<T>(&self, session: &OathSession<T>, timestamp: Option<u64>) -> Result<Code>
    where
        T: Handler,
    {
        session.calculate(&self.name, self.oath_type, timestamp)
    }

    /// Deletes the credential from the card.
    pub fn delete<T>(&self, session: &OathSession<T>) -> Result<()>
    where
        T: Handler,
    {
        session.delete(&self.name)
    }
}

/// Key material and parameters to create a credential with.
/// The secret is handed to the card and never kept by the session.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialData {
    pub name: String,
    pub secret: Vec<u8>,
    pub oath_type: OathType,
    pub algorithm: Algorithm,
    pub digits: u8,

    /// Initial moving factor (counter) of a HOTP credential.
    pub counter: u32,

    /// Requires the card to reject calculations with a time step or counter not greater than
    /// the last one.
    pub always_increasing: bool,
}

impl CredentialData {
    /// Creates TOTP parameters with SHA-1 and 6 digits.
    pub fn new(name: impl Into<String>, secret: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            secret,
            oath_type: OathType::Totp,
            algorithm: Algorithm::Sha1,
            digits: MIN_DIGITS,
            counter: 0,
            always_increasing: false,
        }
    }
}

impl Debug for CredentialData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialData")
            .field("name", &self.name)
            .field("secret", &"[redacted]")
            .field("oath_type", &self.oath_type)
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("counter", &self.counter)
            .field("always_increasing", &self.always_increasing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let data = CredentialData::new("alice", b"12345678901234567890".to_vec());
        let debug = format!("{:?}", data);

        assert!(debug.contains("alice"));
        assert!(!debug.contains("12345678901234567890"));
        assert!(!debug.contains("49, 50"));
    }
}
