//! Provision the installation directory and start the deployment.
//!
//! Docker itself is assumed to be present. Existing files are never
//! rewritten, so running `install` again keeps the generated secrets.

use std::fs;
use std::io::Write;

use ipeople_core::{Configuration, PmResult, compose_file};
use tracing::info;

use super::{Outcome, Session, lifecycle};

pub fn install(session: &mut Session<'_>) -> PmResult<Outcome> {
    let settings = session.settings;
    fs::create_dir_all(&settings.install_dir)?;
    info!(path = %settings.install_dir.display(), "installation directory ready");

    if compose_file::write_if_absent(&settings.compose_file())? {
        writeln!(session.out, "Wrote {}", settings.compose_file().display())?;
    }

    let (_, created) = Configuration::load_or_create(&settings.env_file())?;
    if created {
        writeln!(
            session.out,
            "Generated {} with new secrets (owner read/write only).",
            settings.env_file().display()
        )?;
    } else {
        writeln!(
            session.out,
            "Keeping existing configuration {}.",
            settings.env_file().display()
        )?;
    }

    lifecycle::start(session)
}
