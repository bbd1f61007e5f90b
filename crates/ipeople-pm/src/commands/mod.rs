//! Subcommand handlers.
//!
//! Each handler takes a [`Session`] carrying the settings, the backend and
//! the operator's terminal streams, so nothing reads global state.

use std::io::{BufRead, Write};

use ipeople_compose::Backend;
use ipeople_core::{PmResult, Settings};
use tracing::debug;

use crate::Commands;

pub mod backup;
pub mod config;
pub mod destructive;
pub mod install;
pub mod lifecycle;

#[cfg(test)]
pub(crate) mod testing;

/// What a handler did, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// A destructive action was declined; nothing changed.
    Cancelled,
}

pub struct Session<'a> {
    pub settings: &'a Settings,
    pub backend: &'a dyn Backend,
    pub input: &'a mut dyn BufRead,
    pub out: &'a mut dyn Write,
}

/// Run one subcommand.
///
/// Everything except `install` requires an existing deployment and
/// fails before touching the backend otherwise.
pub fn dispatch(command: &Commands, session: &mut Session<'_>) -> PmResult<Outcome> {
    debug!(?command, "dispatching");

    if *command != Commands::Install {
        session.settings.ensure_deployment()?;
    }

    match command {
        Commands::Install => install::install(session),
        Commands::Start => lifecycle::start(session),
        Commands::Stop => lifecycle::stop(session),
        Commands::Restart => lifecycle::restart(session),
        Commands::Status => lifecycle::status(session),
        Commands::Logs { services } => lifecycle::logs(session, services),
        Commands::Update => lifecycle::update(session),
        Commands::CleanUpdate => destructive::clean_update(session),
        Commands::Backup => backup::backup(session),
        Commands::Config => config::show(session),
        Commands::Uninstall => destructive::uninstall(session),
    }
}

/// Ask `question` and read one line of input.
///
/// Only the exact answer `yes` confirms; anything else, including an empty
/// line, end of input or bytes that are not UTF-8, declines.
pub(crate) fn confirm(session: &mut Session<'_>, question: &str) -> PmResult<bool> {
    write!(session.out, "{question}\nType 'yes' to continue: ")?;
    session.out.flush()?;

    let mut answer = Vec::new();
    session.input.read_until(b'\n', &mut answer)?;
    while matches!(answer.last(), Some(b'\n' | b'\r')) {
        answer.pop();
    }
    let confirmed = answer == b"yes";
    debug!(confirmed, "confirmation answered");
    Ok(confirmed)
}

pub(crate) fn cancelled(session: &mut Session<'_>) -> PmResult<Outcome> {
    writeln!(session.out, "Cancelled. Nothing was changed.")?;
    Ok(Outcome::Cancelled)
}
