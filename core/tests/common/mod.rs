//! A scripted card standing in for a reader in tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ykoath::crypto;
use ykoath::der;
use ykoath::nfc::{Command, Handler, Response, StatusWord};
use ykoath::oath::tag;
use ykoath::{Card, OathSession};

pub const DEVICE_ID: &[u8] = b"\x01\x02\x03\x04\x05\x06\x07\x08";
pub const DEVICE_CHALLENGE: &[u8] = b"\xA1\xA2\xA3\xA4\xA5\xA6\xA7\xA8";

type Reply = Box<dyn FnOnce(&Command) -> Response>;

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("No reply was scripted for {0:?}")]
    Exhausted(Command),
}

/// Replays scripted replies in order and records every command it received.
#[derive(Default)]
pub struct MockCard {
    replies: RefCell<VecDeque<Reply>>,
    sent: Rc<RefCell<Vec<Command>>>,
}

impl MockCard {
    pub fn new() -> Self {
        Default::default()
    }

    /// Shared log of the commands, readable after the card has been moved into a session.
    pub fn log(&self) -> Rc<RefCell<Vec<Command>>> {
        Rc::clone(&self.sent)
    }

    /// Queues a fixed reply.
    pub fn reply(self, body: &[u8], status: u16) -> Self {
        let response = Response::new(body.to_vec(), StatusWord(status));

        self.respond(move |_| response)
    }

    /// Queues a reply computed from the command.
    pub fn respond(self, f: impl FnOnce(&Command) -> Response + 'static) -> Self {
        self.replies.borrow_mut().push_back(Box::new(f));
        self
    }

    /// Queues the answer to SELECT, locked with [`DEVICE_CHALLENGE`] if asked.
    pub fn selected(self, locked: bool) -> Self {
        let mut body = der::pack(&[(tag::VERSION, &[4u8, 3, 1][..]), (tag::NAME, DEVICE_ID)]);
        if locked {
            body.append(&mut der::encode(tag::CHALLENGE, DEVICE_CHALLENGE));
        }

        self.reply(&body, 0x9000)
    }

    /// Queues the answer to VALIDATE of a genuine device knowing the key.
    pub fn validates(self, key: &'static [u8]) -> Self {
        self.respond(move |command| {
            let mut reader = der::Reader::new(command.payload());
            let response = reader.read_tag(tag::RESPONSE).unwrap();
            let challenge = reader.read_tag(tag::CHALLENGE).unwrap();

            if !crypto::verify_hmac_sha1(key, DEVICE_CHALLENGE, response) {
                return Response::new(Vec::new(), StatusWord(0x6984));
            }

            let verification = crypto::hmac_sha1(key, challenge);
            Response::new(der::encode(tag::RESPONSE, &verification), StatusWord::OK)
        })
    }
}

impl Handler for MockCard {
    type Error = MockError;

    fn handle(&self, command: Command) -> Result<Response, MockError> {
        self.sent.borrow_mut().push(command.clone());

        match self.replies.borrow_mut().pop_front() {
            Some(reply) => Ok(reply(&command)),
            None => Err(MockError::Exhausted(command)),
        }
    }
}

/// Opens a session over the mock, returning the log of the commands sent after SELECT.
pub fn open(card: MockCard) -> (OathSession<MockCard>, Rc<RefCell<Vec<Command>>>) {
    let log = card.log();
    let session = OathSession::open(Card::new(Box::new(card))).unwrap();
    log.borrow_mut().clear();

    (session, log)
}
