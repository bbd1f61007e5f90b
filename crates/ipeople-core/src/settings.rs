//! Operator settings.
//!
//! Every handler receives a [`Settings`] value instead of reading the
//! working directory or environment on its own. The defaults match a
//! standard install and can be overridden through `IPEOPLE_*` variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{PmError, PmResult};

pub const DEFAULT_INSTALL_DIR: &str = "/opt/ipeople";
pub const DEFAULT_BINARY_PATH: &str = "/usr/local/bin/ipeople-pm";
pub const DEFAULT_BACKEND_PROGRAM: &str = "docker";
pub const DEFAULT_ESCALATION: &str = "sudo";
pub const DEFAULT_PRIVILEGED_GROUP: &str = "docker";
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";
pub const ENV_FILE_NAME: &str = ".env";
pub const BACKUP_DIR_NAME: &str = "ipeople-backups";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Installation directory; its existence is the deployment's existence.
    pub install_dir: PathBuf,
    pub backup_dir: PathBuf,
    /// The dispatcher binary removed by `uninstall`.
    pub binary_path: PathBuf,
    /// Program that provides the `compose` subcommand.
    pub backend_program: String,
    /// Wrapper used when the caller may not reach the backend directly.
    pub escalation: String,
    /// Group whose members may use the backend without escalation.
    pub privileged_group: String,
    /// Pause between the stop and start halves of a restart.
    pub settle_delay: Duration,
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> PmResult<Self> {
        let mut settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Ok(exe) = std::env::current_exe() {
            settings.binary_path = exe;
        }
        Ok(settings)
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> PmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let install_dir = lookup("IPEOPLE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTALL_DIR));

        let backup_dir = match lookup("IPEOPLE_BACKUP_DIR").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => match lookup("HOME").filter(|v| !v.is_empty()) {
                Some(home) => Path::new(&home).join(BACKUP_DIR_NAME),
                None => install_dir.join("backups"),
            },
        };

        let backend_program = lookup("IPEOPLE_DOCKER")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_PROGRAM.to_string());

        let settle_delay = match lookup("IPEOPLE_SETTLE_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    PmError::Config(format!("IPEOPLE_SETTLE_SECS must be a whole number of seconds, got {raw:?}"))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_SETTLE_DELAY,
        };

        let settings = Settings {
            install_dir,
            backup_dir,
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            backend_program,
            escalation: DEFAULT_ESCALATION.to_string(),
            privileged_group: DEFAULT_PRIVILEGED_GROUP.to_string(),
            settle_delay,
        };
        debug!(?settings, "settings resolved");
        Ok(settings)
    }

    pub fn compose_file(&self) -> PathBuf {
        self.install_dir.join(COMPOSE_FILE_NAME)
    }

    pub fn env_file(&self) -> PathBuf {
        self.install_dir.join(ENV_FILE_NAME)
    }

    /// Fail with [`PmError::DeploymentNotFound`] unless the installation
    /// directory exists.
    pub fn ensure_deployment(&self) -> PmResult<()> {
        if self.install_dir.is_dir() {
            Ok(())
        } else {
            Err(PmError::DeploymentNotFound(self.install_dir.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[("HOME", "/home/op")])).unwrap();
        assert_eq!(settings.install_dir, PathBuf::from("/opt/ipeople"));
        assert_eq!(settings.backup_dir, PathBuf::from("/home/op/ipeople-backups"));
        assert_eq!(settings.backend_program, "docker");
        assert_eq!(settings.privileged_group, "docker");
        assert_eq!(settings.settle_delay, Duration::from_secs(3));
        assert_eq!(settings.env_file(), PathBuf::from("/opt/ipeople/.env"));
        assert_eq!(settings.compose_file(), PathBuf::from("/opt/ipeople/docker-compose.yml"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("IPEOPLE_HOME", "/srv/ipeople"),
            ("IPEOPLE_BACKUP_DIR", "/backups"),
            ("IPEOPLE_DOCKER", "/usr/bin/podman"),
            ("IPEOPLE_SETTLE_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.install_dir, PathBuf::from("/srv/ipeople"));
        assert_eq!(settings.backup_dir, PathBuf::from("/backups"));
        assert_eq!(settings.backend_program, "/usr/bin/podman");
        assert_eq!(settings.settle_delay, Duration::ZERO);
    }

    #[test]
    fn test_no_home_falls_back_to_install_dir() {
        let settings = Settings::from_lookup(lookup_from(&[("IPEOPLE_HOME", "/srv/ip")])).unwrap();
        assert_eq!(settings.backup_dir, PathBuf::from("/srv/ip/backups"));
    }

    #[test]
    fn test_bad_settle_delay() {
        let err = Settings::from_lookup(lookup_from(&[("IPEOPLE_SETTLE_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("IPEOPLE_SETTLE_SECS"));
    }

    #[test]
    fn test_ensure_deployment() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        settings.install_dir = dir.path().to_path_buf();
        assert!(settings.ensure_deployment().is_ok());

        settings.install_dir = dir.path().join("missing");
        let err = settings.ensure_deployment().unwrap_err();
        assert!(matches!(err, PmError::DeploymentNotFound(_)));
    }
}
