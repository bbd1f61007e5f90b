//! clean-update and uninstall.
//!
//! Both ask for confirmation before issuing any mutating call; a declined
//! prompt leaves the deployment, volume and configuration untouched.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use ipeople_compose::remove_escalated;
use ipeople_core::{PmResult, Settings};
use tracing::{info, warn};

use super::{Outcome, Session, cancelled, confirm, lifecycle};

pub fn clean_update(session: &mut Session<'_>) -> PmResult<Outcome> {
    let question = "WARNING: clean-update deletes ALL iPeople data (vaults, users, database) \
                    and starts from fresh images.";
    if !confirm(session, question)? {
        return cancelled(session);
    }

    lifecycle::stop(session)?;
    writeln!(session.out, "Removing containers and data volume...")?;
    session.backend.down(true)?;
    writeln!(session.out, "Pulling latest images...")?;
    session.backend.pull()?;
    lifecycle::start(session)?;
    writeln!(session.out, "Clean update finished.")?;
    Ok(Outcome::Completed)
}

pub fn uninstall(session: &mut Session<'_>) -> PmResult<Outcome> {
    let question = format!(
        "WARNING: uninstall removes all containers, ALL data, {} and {}.",
        session.settings.install_dir.display(),
        session.settings.binary_path.display(),
    );
    if !confirm(session, &question)? {
        return cancelled(session);
    }

    lifecycle::stop(session)?;
    session.backend.down(true)?;

    remove_path(session.settings, &session.settings.install_dir, true)?;
    remove_path(session.settings, &session.settings.binary_path, false)?;

    writeln!(
        session.out,
        "iPeople has been uninstalled. Backups in {} were kept.",
        session.settings.backup_dir.display()
    )?;
    Ok(Outcome::Completed)
}

/// Remove a file or directory tree, retrying through the escalation
/// wrapper when the invoking user lacks permission. Already missing is fine.
fn remove_path(settings: &Settings, path: &Path, is_dir: bool) -> PmResult<()> {
    let removed = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "already gone");
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            info!(path = %path.display(), escalation = %settings.escalation, "removing with escalation");
            remove_escalated(&settings.escalation, path)?;
        }
        Err(e) => return Err(e.into()),
    }
    info!(path = %path.display(), "removed");
    Ok(())
}
