use ring::rand::SystemRandom;

use crate::card::Card;
use crate::der::{self, Reader};
use crate::error::{Error, Result};
use crate::nfc::Handler;
use crate::oath::{ins, tag, Algorithm, Credential, CredentialData, OathType, Version, AID};
use crate::otp::{self, Code};
use crate::{crypto, debug, info};

const CHALLENGE_LENGTH: usize = 8;

const CALCULATE_P2_TRUNCATE: u8 = 0x01;

const RESET_P1: u8 = 0xDE;
const RESET_P2: u8 = 0xAD;

const PROPERTY_ALWAYS_INCREASING: u8 = 0x01;

/// A session with the OATH application on a card.
///
/// The session is locked while the card holds an access key and the handshake has not been
/// completed yet. Commands reading or changing the stored credentials are refused locally while
/// locked, without reaching the card.
pub struct OathSession<T>
where
    T: Handler,
{
    card: Card<T>,
    id: Vec<u8>,
    version: Version,
    challenge: Option<Vec<u8>>,
    rng: SystemRandom,
}

impl<T> OathSession<T>
where
    T: Handler,
{
    /// Opens the session by selecting the application.
    pub fn open(card: Card<T>) -> Result<Self> {
        let resp = card.select(&AID)?;
        let mut reader = Reader::new(&resp);

        let version = match reader.read_tag(tag::VERSION)? {
            [major, minor, patch] => Version(*major, *minor, *patch),
            _ => return Err(der::Error::InvalidValue(tag::VERSION).into()),
        };
        let id = reader.read_tag(tag::NAME)?.to_vec();
        let challenge = match reader.is_empty() {
            true => None,
            _ => Some(reader.read_tag(tag::CHALLENGE)?.to_vec()),
        };

        debug!(
            "Selected OATH application {} on device {} (locked: {})",
            version,
            hex::encode(&id),
            challenge.is_some(),
        );

        Ok(Self {
            card,
            id,
            version,
            challenge,
            rng: SystemRandom::new(),
        })
    }

    /// The identifier of the device, unique for each card.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Determines whether the session needs to be unlocked before managing credentials.
    pub fn is_locked(&self) -> bool {
        self.challenge.is_some()
    }

    /// Derives the access key from the passphrase for this device.
    pub fn derive_key(&self, passphrase: &str) -> Option<[u8; crypto::DERIVED_KEY_LENGTH]> {
        crypto::derive_key(&self.id, passphrase)
    }

    /// Unlocks the session, proving the knowledge of the key to the card and making the card
    /// prove it back. Does nothing if the session is not locked.
    pub fn unlock(&mut self, key: &[u8]) -> Result<()> {
        let Some(challenge) = &self.challenge else {
            return Ok(());
        };

        let response = crypto::hmac_sha1(key, challenge);
        let own_challenge = crypto::random_bytes::<CHALLENGE_LENGTH>(&self.rng)?;

        let data = der::pack(&[
            (tag::RESPONSE, response.as_slice()),
            (tag::CHALLENGE, &own_challenge[..]),
        ]);
        let resp = self.card.send(ins::VALIDATE, &data, 0x00, 0x00)?;
        let (verification, _) = der::decode_tag(&resp, tag::RESPONSE)?;

        if !crypto::verify_hmac_sha1(key, &own_challenge, verification) {
            debug!("Response from the device did not match the verification");

            return Err(Error::AuthenticationMismatch);
        }

        info!("Unlocked the OATH application");
        self.challenge = None;

        Ok(())
    }

    /// Sets the access key of the card, or removes it with `None` or an empty key.
    pub fn set_key(&self, key: Option<&[u8]>) -> Result<()> {
        self.ensure_unlocked()?;

        let data = match key {
            Some(key) if !key.is_empty() => {
                let mut keydata = vec![OathType::Totp.into_byte() | Algorithm::Sha1.into_byte()];
                keydata.extend_from_slice(key);

                let challenge = crypto::random_bytes::<CHALLENGE_LENGTH>(&self.rng)?;
                let response = crypto::hmac_sha1(key, &challenge);

                der::pack(&[
                    (tag::KEY, keydata.as_slice()),
                    (tag::CHALLENGE, &challenge[..]),
                    (tag::RESPONSE, response.as_slice()),
                ])
            }
            _ => der::encode(tag::KEY, &[]),
        };

        self.card.send(ins::SET_CODE, &data, 0x00, 0x00).map(|_| ())
    }

    /// Resets the application to the factory state, removing every credential and the access
    /// key. The session is unlocked afterwards.
    pub fn reset(&mut self) -> Result<()> {
        self.card.send(ins::RESET, &[], RESET_P1, RESET_P2)?;

        info!("Reset the OATH application");
        self.challenge = None;

        Ok(())
    }

    /// Lists the credentials stored on the card.
    pub fn list(&self) -> Result<Vec<Credential>> {
        self.ensure_unlocked()?;

        let resp = self.card.send(ins::LIST, &[], 0x00, 0x00)?;
        let mut reader = Reader::new(&resp);
        let mut items = Vec::new();

        while !reader.is_empty() {
            let (oath_type, name) = match reader.read_tag(tag::NAME_LIST)? {
                [meta, name @ ..] => (OathType::from_byte(*meta), name),
                _ => (None, &[][..]),
            };
            let oath_type = oath_type.ok_or(der::Error::InvalidValue(tag::NAME_LIST))?;

            items.push(Credential::new(parse_name(name, tag::NAME_LIST)?, oath_type));
        }

        Ok(items)
    }

    /// Creates a credential on the card, overwriting the one with the same name.
    pub fn create(&self, data: &CredentialData) -> Result<Credential> {
        self.ensure_unlocked()?;

        if !(otp::MIN_DIGITS..=otp::MAX_DIGITS).contains(&data.digits) {
            return Err(Error::InvalidDigits(data.digits));
        }

        let secret = crypto::normalize_key(&data.secret);
        let mut keydata = vec![
            data.oath_type.into_byte() | data.algorithm.into_byte(),
            data.digits,
        ];
        keydata.extend_from_slice(&secret);

        let mut buf = der::pack(&[
            (tag::NAME, data.name.as_bytes()),
            (tag::KEY, keydata.as_slice()),
        ]);
        if data.always_increasing {
            buf.append(&mut der::encode(tag::PROPERTY, &[PROPERTY_ALWAYS_INCREASING]));
        }
        if data.counter > 0 {
            buf.append(&mut der::encode(tag::IMF, &data.counter.to_be_bytes()));
        }

        self.card.send(ins::PUT, &buf, 0x00, 0x00)?;

        Ok(Credential::new(data.name.clone(), data.oath_type))
    }

    /// Deletes the credential of the name.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.ensure_unlocked()?;

        let data = der::encode(tag::NAME, name.as_bytes());

        self.card.send(ins::DELETE, &data, 0x00, 0x00).map(|_| ())
    }

    /// Calculates a code of the credential.
    ///
    /// Unlike the other credential operations, this is not refused locally while locked;
    /// the card decides whether to answer.
    pub fn calculate(
        &self,
        name: &str,
        oath_type: OathType,
        timestamp: Option<u64>,
    ) -> Result<Code> {
        let challenge = match oath_type {
            OathType::Totp => otp::time_challenge(timestamp.unwrap_or_else(otp::now)).to_vec(),
            OathType::Hotp => Vec::new(),
        };

        let data = der::pack(&[
            (tag::NAME, name.as_bytes()),
            (tag::CHALLENGE, challenge.as_slice()),
        ]);
        let resp = self
            .card
            .send(ins::CALCULATE, &data, 0x00, CALCULATE_P2_TRUNCATE)?;

        let code = match der::decode(&resp)? {
            (tag::TRUNCATED_RESPONSE, value, _) => {
                Code::from_truncated(value, tag::TRUNCATED_RESPONSE)?
            }
            (tag::RESPONSE, value, _) => Code::from_full(value, tag::RESPONSE)?,
            (found, _, _) => {
                return Err(der::Error::TagMismatch {
                    expected: tag::TRUNCATED_RESPONSE,
                    found,
                }
                .into())
            }
        };

        Ok(code)
    }

    /// Calculates codes of every TOTP credential at the timestamp, or now.
    ///
    /// HOTP credentials are returned without a code, since calculating them moves their counter.
    /// The result is sorted by the names, ignoring cases.
    pub fn calculate_all(
        &self,
        timestamp: Option<u64>,
    ) -> Result<Vec<(Credential, Option<Code>)>> {
        self.ensure_unlocked()?;

        let challenge = otp::time_challenge(timestamp.unwrap_or_else(otp::now));
        let data = der::encode(tag::CHALLENGE, &challenge);
        let resp = self
            .card
            .send(ins::CALCULATE_ALL, &data, 0x00, CALCULATE_P2_TRUNCATE)?;

        let mut reader = Reader::new(&resp);
        let mut results = Vec::new();

        while !reader.is_empty() {
            let name = parse_name(reader.read_tag(tag::NAME)?, tag::NAME)?;

            results.push(match reader.read_any()? {
                (tag::TRUNCATED_RESPONSE, value) => (
                    Credential::new(name, OathType::Totp),
                    Some(Code::from_truncated(value, tag::TRUNCATED_RESPONSE)?),
                ),
                _ => (Credential::new(name, OathType::Hotp), None),
            });
        }

        results.sort_by_cached_key(|(credential, _)| credential.name().to_lowercase());

        Ok(results)
    }

    fn ensure_unlocked(&self) -> Result<()> {
        match self.is_locked() {
            true => Err(Error::Locked),
            _ => Ok(()),
        }
    }
}

fn parse_name(name: &[u8], tag: u8) -> der::Result<String> {
    String::from_utf8(name.to_vec()).map_err(|_| der::Error::InvalidValue(tag))
}
