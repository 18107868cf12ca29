//! A crate to manage OATH (HOTP/TOTP) credentials on a smart card through an APDU delegate.
//!
//! ```rust,no_run
//! use ykoath::nfc::Handler;
//! use ykoath::{Card, OathSession};
//!
//! fn print_codes<T: Handler>(delegate: T, password: &str) -> ykoath::Result<()> {
//!     let mut session = OathSession::open(Card::new(Box::new(delegate)))?;
//!     if session.is_locked() {
//!         if let Some(key) = session.derive_key(password) {
//!             session.unlock(&key)?;
//!         }
//!     }
//!
//!     for (credential, code) in session.calculate_all(None)? {
//!         match code {
//!             Some(code) => println!("{}: {}", credential.name(), code),
//!             None => println!("{}: [requires calculation]", credential.name()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod card;
pub mod crypto;
pub mod der;
pub mod error;
pub mod nfc;
pub mod oath;
pub mod otp;
pub mod uri;

pub use card::Card;
pub use error::{Error, Result};
pub use oath::{Algorithm, Credential, CredentialData, OathSession, OathType, Version};
pub use otp::Code;

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {debug, info, trace};
