use crate::der;
use crate::nfc::StatusWord;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The card answered with a status word other than the expected one.
    #[error("The card returned an error ({0}).")]
    Status(StatusWord),

    #[error("The card returned a malformed response: {0}")]
    Malformed(#[from] der::Error),

    /// The operation needs the session to be unlocked first.
    #[error("The device is locked. Unlock it with the password first.")]
    Locked,

    /// The device did not prove the knowledge of the key.
    /// Either the key is wrong or the device is not genuine.
    #[error("The response from the device did not match the verification.")]
    AuthenticationMismatch,

    #[error("Error occurred while communicating with the card: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to generate random bytes for the challenge")]
    Random,

    #[error("Digits must be between 6 and 10, got {0}")]
    InvalidDigits(u8),

    #[error("Invalid credential URI: {0}")]
    InvalidUri(String),
}

pub type Result<T> = std::result::Result<T, Error>;
