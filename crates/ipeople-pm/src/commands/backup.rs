use std::io::Write;

use chrono::Local;
use ipeople_core::backup::BackupWriter;
use ipeople_core::config::{POSTGRES_DB, POSTGRES_USER};
use ipeople_core::{Configuration, PmError, PmResult, Service, ServiceState};
use tracing::info;

use super::{Outcome, Session};

/// Dump the database through `pg_dump` inside the `db` container and
/// stream it gzipped into a new file under the backup directory.
pub fn backup(session: &mut Session<'_>) -> PmResult<Outcome> {
    let db_running = session
        .backend
        .ps()?
        .iter()
        .any(|s| s.is_service(Service::Db) && s.coarse_state() == ServiceState::Running);
    if !db_running {
        return Err(PmError::BackupFailed(
            "the db service is not running; start iPeople first".to_string(),
        ));
    }

    let config = Configuration::load(&session.settings.env_file())?;
    let user = config.require(POSTGRES_USER)?;
    let database = config.require(POSTGRES_DB)?;

    writeln!(session.out, "Dumping database {database}...")?;
    let mut writer = BackupWriter::create(&session.settings.backup_dir, Local::now().naive_local())?;
    let bytes = match session
        .backend
        .exec(Service::Db, &["pg_dump", "-U", user, database], &mut writer)
    {
        Ok(0) => {
            writer.discard();
            return Err(PmError::BackupFailed("pg_dump produced no output".to_string()));
        }
        Ok(bytes) => bytes,
        Err(e) => {
            writer.discard();
            return Err(PmError::BackupFailed(format!("pg_dump failed: {e}")));
        }
    };

    let path = writer.finish()?;
    info!(path = %path.display(), bytes, "backup written");
    writeln!(session.out, "Backup saved to {}", path.display())?;
    Ok(Outcome::Completed)
}
