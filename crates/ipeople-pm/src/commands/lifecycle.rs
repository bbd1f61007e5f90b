//! start / stop / restart / status / logs / update.

use std::io::Write;
use std::thread;

use ipeople_core::{Configuration, PmResult, config::APP_URL, summarize};
use tracing::{debug, info};

use super::{Outcome, Session};

pub fn start(session: &mut Session<'_>) -> PmResult<Outcome> {
    writeln!(session.out, "Starting iPeople...")?;
    session.backend.up(true)?;

    // The URL is informational; an unreadable config does not fail start.
    match Configuration::load(&session.settings.env_file()) {
        Ok(config) => match config.get(APP_URL).filter(|u| !u.is_empty()) {
            Some(url) => writeln!(session.out, "iPeople is running at {url}")?,
            None => writeln!(session.out, "iPeople is running.")?,
        },
        Err(e) => {
            debug!(error = %e, "could not read configuration for URL");
            writeln!(session.out, "iPeople is running.")?;
        }
    }
    Ok(Outcome::Completed)
}

pub fn stop(session: &mut Session<'_>) -> PmResult<Outcome> {
    writeln!(session.out, "Stopping iPeople...")?;
    session.backend.down(false)?;
    writeln!(session.out, "iPeople stopped. Data volumes were kept.")?;
    Ok(Outcome::Completed)
}

pub fn restart(session: &mut Session<'_>) -> PmResult<Outcome> {
    stop(session)?;
    let delay = session.settings.settle_delay;
    if !delay.is_zero() {
        info!(?delay, "waiting before start");
        thread::sleep(delay);
    }
    start(session)
}

pub fn status(session: &mut Session<'_>) -> PmResult<Outcome> {
    let statuses = session.backend.ps()?;
    writeln!(session.out, "{:<10} STATE", "SERVICE")?;
    for (service, state) in summarize(&statuses) {
        writeln!(session.out, "{service:<10} {}", state.label())?;
    }
    Ok(Outcome::Completed)
}

/// Follow logs until the operator interrupts. An empty `services` list
/// means every service.
pub fn logs(session: &mut Session<'_>, services: &[String]) -> PmResult<Outcome> {
    session.backend.logs(services, true)?;
    Ok(Outcome::Completed)
}

pub fn update(session: &mut Session<'_>) -> PmResult<Outcome> {
    writeln!(session.out, "Pulling latest images...")?;
    session.backend.pull()?;
    restart(session)?;
    writeln!(session.out, "iPeople updated.")?;
    Ok(Outcome::Completed)
}
