use crate::error::{Error, Result};
use crate::nfc::{Command, Handler, Response, StatusWord};
use crate::oath::ins::SEND_REMAINING;
use crate::{debug, trace};

const SELECT_INS: u8 = 0xA4;
const SELECT_P1_DF: u8 = 0x04;

/// An adapter to communicate with the card through the delegate
pub struct Card<T>
where
    T: Handler,
{
    delegate: Box<T>,
}

impl<T> Card<T>
where
    T: Handler,
{
    /// Initiates an adapter with the delegate.
    pub fn new(delegate: Box<T>) -> Self {
        Self { delegate }
    }

    /// Selects an application with its identifier, returning the response body.
    pub fn select(&self, aid: &[u8]) -> Result<Vec<u8>> {
        self.send(SELECT_INS, aid, SELECT_P1_DF, 0x00)
    }

    /// Sends a command expecting the card to succeed.
    pub fn send(&self, ins: u8, data: &[u8], p1: u8, p2: u8) -> Result<Vec<u8>> {
        self.send_expecting(ins, data, p1, p2, StatusWord::OK)
    }

    /// Sends a command and collects the whole response, following the card while it reports
    /// more data to be available.
    ///
    /// The command is never re-issued: a status word other than `expected` is returned as
    /// [`Error::Status`] since the card may have already changed its state.
    pub fn send_expecting(
        &self,
        ins: u8,
        data: &[u8],
        p1: u8,
        p2: u8,
        expected: StatusWord,
    ) -> Result<Vec<u8>> {
        let command = Command::new_with_payload(ins, p1, p2, data.to_vec());
        let (mut buf, mut status) = self.handle(command)?.into_parts();

        while status.has_more_data() {
            trace!("Fetching remaining response ({})", status);

            let (mut fragment, next) = self
                .handle(Command::new(SEND_REMAINING, 0x00, 0x00))?
                .into_parts();

            buf.append(&mut fragment);
            status = next;
        }

        if status != expected {
            debug!("INS {:#04X} failed with {}", ins, status);

            return Err(Error::Status(status));
        }

        Ok(buf)
    }

    fn handle(&self, command: Command) -> Result<Response> {
        debug!(
            "TX: {:02X} {:02X} {:02X} {:02X} {}",
            command.cla(),
            command.ins(),
            command.p1(),
            command.p2(),
            hex::encode(command.payload()),
        );

        let response = self
            .delegate
            .handle(command)
            .map_err(|e| Error::Transport(Box::new(e)))?;

        debug!(
            "RX: {} {}",
            hex::encode(response.payload()),
            response.status(),
        );

        Ok(response)
    }
}
