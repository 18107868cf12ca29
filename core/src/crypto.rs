//! Cryptographic primitives used by the OATH application, backed by ring.

use std::borrow::Cow;
use std::num::NonZeroU32;

use ring::rand::SecureRandom;
use ring::{digest, hmac, pbkdf2};

use crate::error::{Error, Result};

/// Keys longer than the HMAC block size are hashed before use.
pub const HMAC_BLOCK_SIZE: usize = 64;

pub const DERIVED_KEY_LENGTH: usize = 16;

const PBKDF2_ITERATIONS: u32 = 1000;

/// Computes HMAC-SHA1 of the message.
pub fn hmac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);

    hmac::sign(&key, message).as_ref().to_vec()
}

/// Verifies HMAC-SHA1 of the message in constant time.
pub fn verify_hmac_sha1(key: &[u8], message: &[u8], tag: &[u8]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);

    hmac::verify(&key, message, tag).is_ok()
}

/// Replaces a key longer than [`HMAC_BLOCK_SIZE`] with its SHA-1 digest, as HMAC does.
pub fn normalize_key(key: &[u8]) -> Cow<'_, [u8]> {
    if key.len() > HMAC_BLOCK_SIZE {
        let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, key);

        Cow::Owned(digest.as_ref().to_vec())
    } else {
        Cow::Borrowed(key)
    }
}

/// Derives the access key from a passphrase, salted with the device identifier.
/// An empty passphrase derives no key.
pub fn derive_key(salt: &[u8], passphrase: &str) -> Option<[u8; DERIVED_KEY_LENGTH]> {
    if passphrase.is_empty() {
        return None;
    }

    let mut key = [0u8; DERIVED_KEY_LENGTH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA1,
        NonZeroU32::new(PBKDF2_ITERATIONS)?,
        salt,
        passphrase.as_bytes(),
        &mut key,
    );

    Some(key)
}

/// Fills a fresh challenge from the random source.
pub fn random_bytes<const N: usize>(rng: &dyn SecureRandom) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    rng.fill(&mut buf).map_err(|_| Error::Random)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha1() {
        // RFC 2202, test case 2
        assert_eq!(
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79",
            hex::encode(hmac_sha1(b"Jefe", b"what do ya want for nothing?")),
        );
    }

    #[test]
    fn test_verify_hmac_sha1() {
        let tag = hmac_sha1(b"key", b"challenge");

        assert!(verify_hmac_sha1(b"key", b"challenge", &tag));
        assert!(!verify_hmac_sha1(b"other", b"challenge", &tag));
        assert!(!verify_hmac_sha1(b"key", b"challenge", &tag[..19]));
    }

    #[test]
    fn test_normalize_key() {
        let short = [0x42u8; 64];
        assert_eq!(&short[..], &*normalize_key(&short));

        let long = [0x42u8; 65];
        let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &long);
        assert_eq!(20, normalize_key(&long).len());
        assert_eq!(digest.as_ref(), &*normalize_key(&long));
    }

    #[test]
    fn test_derive_key() {
        let key = derive_key(b"device-id", "password").unwrap();

        assert_eq!(Some(key), derive_key(b"device-id", "password"));
        assert_ne!(Some(key), derive_key(b"other-id", "password"));
        assert_eq!(None, derive_key(b"device-id", ""));
    }

    #[test]
    fn test_random_bytes() {
        let rng = ring::rand::SystemRandom::new();
        let a = random_bytes::<8>(&rng).unwrap();
        let b = random_bytes::<8>(&rng).unwrap();

        assert_ne!(a, b);
    }
}
