//! PC/SC support for ykoath library.
//! Can be enabled by turning `pcsc` feature on.
//!
//! ## What is PC/SC?
//! PC/SC (Personal Computer/Smart Card) is an abstraction layer for communicating with Smart Cards
//! from Windows. Using this layer, applications can connect to any devices that supports PC/SC,
//! without depending on their driver implementation. Windows and macOS supports PC/SC by themselves,
//! Linux also supports by installing pcsc-lite shared library.
//!
//! ## Supported platform
//! Linux, Windows and macOS are supported by pcsc-rust, backend of this implementation.
//! Refer the documentation of pcsc-rust for details:
//! <https://github.com/bluetech/pcsc-rust>
//!
//! ## Usage
//! ```rust,no_run
//! use ykoath::pcsc::Context;
//! use ykoath::{Card, OathSession};
//!
//! let ctx = Context::try_new().unwrap();
//! let device = ctx.open(Some("yubikey")).unwrap();
//! let pcsc_card = device.connect(&ctx).unwrap();
//!
//! let session = OathSession::open(Card::new(Box::new(pcsc_card))).unwrap();
//! println!("OATH version {}", session.version());
//! ```

use std::ffi::{CStr, CString};

use pcsc::{Card, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::debug;
use crate::nfc::{Command, Handler, Response};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// PC/SC context.
pub struct Context {
    ctx: pcsc::Context,
}

impl Context {
    /// Creates a PC/SC context in user scope.
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            ctx: pcsc::Context::establish(Scope::User)?,
        })
    }

    /// Finds a PC/SC device whose name contains the filter, ignoring cases,
    /// or the first one if no filter is given.
    pub fn open(&self, filter: Option<&str>) -> Result<Device> {
        let mut buf = [0u8; 2048];
        let filter = filter.map(str::to_lowercase);

        let reader = self
            .ctx
            .list_readers(&mut buf)?
            .find(|reader| match &filter {
                Some(filter) => reader
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(filter.as_str()),
                None => true,
            })
            .ok_or(Error::ReaderNotFound)?;

        Ok(Device::new(reader))
    }
}

/// PC/SC device handle.
pub struct Device {
    reader: CString,
}

impl Device {
    fn new(reader: &CStr) -> Self {
        debug!("Using device: {}", reader.to_str().unwrap_or_default());

        Self {
            reader: reader.to_owned(),
        }
    }

    /// The name of the reader.
    pub fn name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    /// Connects to the card inserted to the device.
    pub fn connect(&self, ctx: &Context) -> Result<PcscCard> {
        let card = ctx
            .ctx
            .connect(&self.reader, ShareMode::Shared, Protocols::ANY)?;

        debug!("Connected to your card");

        Ok(PcscCard::new(card))
    }
}

/// A card to be communicated through PC/SC.
pub struct PcscCard {
    card: Card,
}

impl PcscCard {
    fn new(card: Card) -> Self {
        Self { card }
    }

    /// Transmits an APDU command to the card, then receives a response from them.
    pub fn transmit(&self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = self.card.transmit(tx, &mut rx)?;

        Ok(Vec::from(rx))
    }
}

impl Handler for PcscCard {
    type Error = Error;

    fn handle(&self, command: Command) -> Result<Response> {
        let tx = command.into_bytes();
        let rx = self.transmit(&tx)?;

        Ok(Response::from_bytes(rx))
    }
}
