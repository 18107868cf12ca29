use dialoguer::{Confirm, Password};
use serde::Serialize;
use tracing::debug;

use ykoath::nfc::Handler;
use ykoath::{Code, Credential, CredentialData, OathSession, OathType};

use crate::{Cli, Commands, Error, Result};

#[derive(Serialize)]
struct Info {
    id: String,
    version: String,
    locked: bool,
}

#[derive(Serialize)]
struct Entry<'a> {
    name: &'a str,
    oath_type: OathType,
    code: Option<&'a Code>,
}

pub fn run<T: Handler>(session: &mut OathSession<T>, cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Info => info(session, cli.json),
        Commands::List => {
            unlock(session, cli.password.as_deref())?;
            list(session, cli.json)
        }
        Commands::Code { query } => {
            unlock(session, cli.password.as_deref())?;
            code(session, query.as_deref(), cli.json)
        }
        Commands::Put {
            uri,
            name,
            hotp,
            digits,
            algorithm,
            counter,
            always_increasing,
        } => {
            let mut data = CredentialData::parse_uri(uri)?;
            if let Some(name) = name {
                data.name = name.clone();
            }
            if *hotp {
                data.oath_type = OathType::Hotp;
            }
            if let Some(digits) = *digits {
                data.digits = digits;
            }
            if let Some(algorithm) = *algorithm {
                data.algorithm = algorithm.into();
            }
            if let Some(counter) = *counter {
                data.counter = counter;
            }
            data.always_increasing |= *always_increasing;

            unlock(session, cli.password.as_deref())?;
            put(session, &data)
        }
        Commands::Delete { name } => {
            unlock(session, cli.password.as_deref())?;
            delete(session, name)
        }
        Commands::SetPassword { clear } => {
            unlock(session, cli.password.as_deref())?;
            set_password(session, *clear)
        }
        Commands::Reset { force } => reset(session, *force),
    }
}

/// Unlocks the session if it is locked, prompting the password when not given.
fn unlock<T: Handler>(session: &mut OathSession<T>, password: Option<&str>) -> Result<()> {
    if !session.is_locked() {
        return Ok(());
    }

    let password = match password {
        Some(password) => password.to_string(),
        None => Password::new().with_prompt("Password").interact()?,
    };
    let key = session
        .derive_key(&password)
        .ok_or(Error::PasswordRequired)?;

    session.unlock(&key)?;

    Ok(())
}

fn info<T: Handler>(session: &OathSession<T>, json: bool) -> Result<()> {
    let info = Info {
        id: hex::encode(session.id()),
        version: session.version().to_string(),
        locked: session.is_locked(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Device ID: {}", info.id);
        println!("OATH version: {}", info.version);
        println!("Password protected: {}", if info.locked { "yes" } else { "no" });
    }

    Ok(())
}

fn list<T: Handler>(session: &OathSession<T>, json: bool) -> Result<()> {
    let credentials = session.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&credentials)?);
        return Ok(());
    }

    for credential in &credentials {
        println!("{}\t{}", credential.oath_type(), credential.name());
    }

    Ok(())
}

fn code<T: Handler>(session: &OathSession<T>, query: Option<&str>, json: bool) -> Result<()> {
    let mut results = session.calculate_all(None)?;

    if let Some(query) = query {
        let query = query.to_lowercase();
        results.retain(|(credential, _)| credential.name().to_lowercase().contains(&query));

        if results.is_empty() {
            return Err(Error::NotFound(query));
        }

        // A single HOTP match is calculated on demand, moving its counter.
        if let [(credential, code @ None)] = results.as_mut_slice() {
            debug!("Calculating {} on demand", credential.name());
            *code = Some(credential.calculate(session, None)?);
        }
    }

    if json {
        let entries: Vec<Entry> = results
            .iter()
            .map(|(credential, code)| Entry {
                name: credential.name(),
                oath_type: credential.oath_type(),
                code: code.as_ref(),
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let width = results
        .iter()
        .map(|(credential, _)| credential.name().chars().count())
        .max()
        .unwrap_or_default();

    for (credential, code) in &results {
        match code {
            Some(code) => println!("{:width$}  {}", credential.name(), code, width = width),
            None => println!("{:width$}  [HOTP]", credential.name(), width = width),
        }
    }

    Ok(())
}

fn put<T: Handler>(session: &OathSession<T>, data: &CredentialData) -> Result<()> {
    if data.name.is_empty() {
        return Err(Error::MissingName);
    }

    let credential = session.create(data)?;
    println!("Credential {} was added.", credential.name());

    Ok(())
}

/// Finds the credential by its exact name, or the only one containing the query.
fn find(credentials: Vec<Credential>, query: &str) -> Result<Credential> {
    let lowercase = query.to_lowercase();
    let (exact, mut partial): (Vec<_>, Vec<_>) = credentials
        .into_iter()
        .filter(|credential| credential.name().to_lowercase().contains(&lowercase))
        .partition(|credential| credential.name() == query);

    if let Some(credential) = exact.into_iter().next() {
        return Ok(credential);
    }

    match partial.len() {
        0 => Err(Error::NotFound(query.to_string())),
        1 => Ok(partial.remove(0)),
        _ => Err(Error::Ambiguous {
            query: query.to_string(),
            names: partial
                .iter()
                .map(Credential::name)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn delete<T: Handler>(session: &OathSession<T>, name: &str) -> Result<()> {
    let credential = find(session.list()?, name)?;

    credential.delete(session)?;
    println!("Credential {} was deleted.", credential.name());

    Ok(())
}

fn set_password<T: Handler>(session: &OathSession<T>, clear: bool) -> Result<()> {
    let password = match clear {
        true => String::new(),
        _ => Password::new()
            .with_prompt("New password")
            .with_confirmation("Repeat the password", "Passwords do not match.")
            .allow_empty_password(true)
            .interact()?,
    };

    match session.derive_key(&password) {
        Some(key) => {
            session.set_key(Some(&key[..]))?;
            println!("Password was set.");
        }
        None => {
            session.set_key(None)?;
            println!("Password was removed.");
        }
    }

    Ok(())
}

fn reset<T: Handler>(session: &mut OathSession<T>, force: bool) -> Result<()> {
    let confirmed = force
        || Confirm::new()
            .with_prompt("Every credential and the password will be deleted. Continue?")
            .default(false)
            .interact()?;

    if !confirmed {
        return Err(Error::Aborted);
    }

    session.reset()?;
    println!("The OATH application was reset.");

    Ok(())
}
