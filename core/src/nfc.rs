//! Communicating with the card through a delegate that exchanges raw APDUs.

use std::fmt::{Display, Formatter};

/// The class byte used for every command in the OATH application.
pub const CLA_DEFAULT: u8 = 0x00;

/// The status word (SW1, SW2) trailing every response from the card.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u16);

impl StatusWord {
    /// Normal processing.
    pub const OK: Self = Self(0x9000);

    const SW1_MORE_DATA: u8 = 0x61;

    pub const fn sw1(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn sw2(self) -> u8 {
        self.0 as u8
    }

    /// Determines whether the card has more response data to be fetched.
    /// The remaining length in SW2 is ignored; everything gets drained.
    pub const fn has_more_data(self) -> bool {
        self.sw1() == Self::SW1_MORE_DATA
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self(u16::from_be_bytes([sw1, sw2]))
    }
}

impl Display for StatusWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

/// An APDU command to be transmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    payload: Vec<u8>,
}

impl Command {
    /// Constructs a command with INS, P1, and P2.
    /// No payloads will be transmitted.
    pub fn new(ins: u8, p1: u8, p2: u8) -> Self {
        Self::new_with_payload(ins, p1, p2, Vec::new())
    }

    /// Constructs a command with INS, P1, P2, and a payload.
    pub fn new_with_payload(ins: u8, p1: u8, p2: u8, payload: Vec<u8>) -> Self {
        Self {
            cla: CLA_DEFAULT,
            ins,
            p1,
            p2,
            payload,
        }
    }

    pub fn cla(&self) -> u8 {
        self.cla
    }

    pub fn ins(&self) -> u8 {
        self.ins
    }

    pub fn p1(&self) -> u8 {
        self.p1
    }

    pub fn p2(&self) -> u8 {
        self.p2
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Converts the command into octets.
    /// Payloads longer than 255 octets are sent with an extended Lc.
    pub fn into_bytes(self) -> Vec<u8> {
        let Self {
            cla,
            ins,
            p1,
            p2,
            mut payload,
        } = self;

        let mut buffer: Vec<u8> = vec![cla, ins, p1, p2];
        match payload.len() {
            0 => {}
            len @ 1..=0xFF => buffer.push(len as u8),
            len => {
                buffer.push(0x00);
                buffer.extend_from_slice(&(len as u16).to_be_bytes());
            }
        }
        buffer.append(&mut payload);

        buffer
    }
}

impl From<Command> for Vec<u8> {
    fn from(command: Command) -> Self {
        command.into_bytes()
    }
}

/// A response that was received from the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Vec<u8>,
    status: StatusWord,
}

impl Response {
    /// Creates a response from a body and its trailing status word.
    pub fn new(payload: Vec<u8>, status: StatusWord) -> Self {
        Self { payload, status }
    }

    /// Parses a response from the octets.
    /// A response too short to carry a status word is reported as `0x0000`.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let sw2 = bytes.pop();
        let sw1 = bytes.pop();

        Self {
            payload: bytes,
            status: match (sw1, sw2) {
                (Some(a), Some(b)) => (a, b).into(),
                _ => StatusWord(0x0000),
            },
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn status(&self) -> StatusWord {
        self.status
    }

    pub fn into_parts(self) -> (Vec<u8>, StatusWord) {
        (self.payload, self.status)
    }
}

/// A delegate to communicate with the card outside.
pub trait Handler {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles the APDU command.
    /// Implementations must transmit the command to the card through a reader,
    /// then receive the response from them.
    fn handle(&self, command: Command) -> Result<Response, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_into_bytes() {
        assert_eq!(vec![0x00, 0xA5, 0x00, 0x00], Command::new(0xA5, 0, 0).into_bytes());
        assert_eq!(
            vec![0x00, 0xA4, 0x04, 0x00, 0x02, 0xA0, 0x00],
            Command::new_with_payload(0xA4, 0x04, 0x00, vec![0xA0, 0x00]).into_bytes(),
        );
    }

    #[test]
    fn test_command_into_bytes_extended() {
        let bytes = Command::new_with_payload(0x01, 0, 0, vec![0xAB; 300]).into_bytes();

        assert_eq!(&[0x00u8, 0x01, 0x00, 0x00, 0x00, 0x01, 0x2C][..], &bytes[..7]);
        assert_eq!(307, bytes.len());
    }

    #[test]
    fn test_response_from_bytes() {
        let response = Response::from_bytes(vec![0x01, 0x02, 0x61, 0x10]);

        assert_eq!(&[0x01u8, 0x02][..], response.payload());
        assert_eq!(StatusWord(0x6110), response.status());
        assert!(response.status().has_more_data());
        assert_eq!(StatusWord(0x0000), Response::from_bytes(vec![0x90]).status());
    }

    #[test]
    fn test_status_word_display() {
        assert_eq!("0x6A80", StatusWord::from((0x6A, 0x80)).to_string());
        assert!(!StatusWord::OK.has_more_data());
    }
}
