mod commands;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ykoath::pcsc::{Context, PcscCard};
use ykoath::{Algorithm, Card, OathSession};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred on communicating with PC/SC device: {0}")]
    Pcsc(#[from] ykoath::pcsc::Error),

    #[error("{0}")]
    Oath(#[from] ykoath::Error),

    #[error("Failed to read your input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode the output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The device is protected. Give a password to unlock it.")]
    PasswordRequired,

    #[error("No credential matches {0:?}")]
    NotFound(String),

    #[error("Multiple credentials match {query:?}: {names}")]
    Ambiguous { query: String, names: String },

    #[error("The credential needs a name. Give one with --name.")]
    MissingName,

    #[error("Aborted.")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Use the reader whose name contains this, ignoring cases
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Password to unlock the device with, prompted if needed and not given
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Print the result in JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase logging verbosity, can be repeated
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the version and the state of the OATH application
    Info,

    /// List the credentials stored on the device
    List,

    /// Calculate codes, of every credential or the one matching the query
    Code {
        /// Part of the credential name, ignoring cases
        query: Option<String>,
    },

    /// Add a credential from an otpauth:// URI or a base32 secret
    Put {
        /// otpauth:// URI or base32-encoded secret
        uri: String,

        /// Name of the credential, overriding the one in the URI
        #[arg(short, long)]
        name: Option<String>,

        /// Create a counter-based (HOTP) credential
        #[arg(long)]
        hotp: bool,

        /// Number of digits in the code
        #[arg(short, long)]
        digits: Option<u8>,

        /// Hash algorithm of the HMAC
        #[arg(short, long, value_enum)]
        algorithm: Option<AlgorithmArg>,

        /// Initial counter of a HOTP credential
        #[arg(short, long)]
        counter: Option<u32>,

        /// Require codes to be calculated for increasing time steps or counters only
        #[arg(long)]
        always_increasing: bool,
    },

    /// Delete the credential matching the name
    Delete {
        /// Name of the credential, or a part of it
        name: String,
    },

    /// Protect the device with a password, or change it
    SetPassword {
        /// Remove the password instead
        #[arg(long)]
        clear: bool,
    },

    /// Delete every credential and the password, restoring the factory state
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AlgorithmArg {
    Sha1,
    Sha256,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Sha1 => Algorithm::Sha1,
            AlgorithmArg::Sha256 => Algorithm::Sha256,
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(reader: Option<&str>) -> Result<OathSession<PcscCard>> {
    let ctx = Context::try_new()?;
    let device = ctx.open(reader)?;
    tracing::info!("Using reader: {}", device.name());

    let pcsc_card = device.connect(&ctx)?;

    Ok(OathSession::open(Card::new(Box::new(pcsc_card)))?)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut session = open(cli.reader.as_deref())?;

    commands::run(&mut session, cli)
}
