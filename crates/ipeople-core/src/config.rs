//! The deployment's `.env` configuration file.
//!
//! Generated once at install time and never rewritten by lifecycle
//! commands, so secrets stay stable across restarts and updates.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::info;

use crate::error::{PmError, PmResult};

pub const SECRET_KEY: &str = "SECRET_KEY";
pub const POSTGRES_USER: &str = "POSTGRES_USER";
pub const POSTGRES_DB: &str = "POSTGRES_DB";
pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const APP_PORT: &str = "APP_PORT";
pub const APP_URL: &str = "APP_URL";

pub const DEFAULT_APP_PORT: u16 = 8080;
pub const DEFAULT_DB_NAME: &str = "ipeople";
pub const DEFAULT_DB_USER: &str = "ipeople";

/// Owner read/write only.
pub const ENV_FILE_MODE: u32 = 0o600;

const SECRET_KEY_BYTES: usize = 32;
const DB_PASSWORD_BYTES: usize = 24;

const HEADER: &str = "\
# iPeople runtime configuration.
# Generated at install time. Secrets must stay stable: changing SECRET_KEY
# invalidates sessions and POSTGRES_PASSWORD must match the database volume.
";

/// Ordered `KEY=value` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    entries: Vec<(String, String)>,
}

impl Configuration {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Generate a fresh configuration with random secrets.
    pub fn generate() -> PmResult<Self> {
        let port = DEFAULT_APP_PORT.to_string();
        Ok(Self::from_entries([
            (APP_PORT, port.clone()),
            (APP_URL, format!("http://localhost:{port}")),
            (SECRET_KEY, random_secret(SECRET_KEY_BYTES)?),
            (POSTGRES_USER, DEFAULT_DB_USER.to_string()),
            (POSTGRES_DB, DEFAULT_DB_NAME.to_string()),
            (POSTGRES_PASSWORD, random_secret(DB_PASSWORD_BYTES)?),
            // Mail and federation settings are consumed by the application as-is.
            ("SMTP_HOST", String::new()),
            ("SMTP_PORT", "587".to_string()),
            ("SMTP_USER", String::new()),
            ("SMTP_PASSWORD", String::new()),
            ("SMTP_FROM", String::new()),
            ("SAML_ENABLED", "false".to_string()),
            ("SAML_IDP_METADATA_URL", String::new()),
        ]))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get), but a missing or empty value is an error.
    pub fn require(&self, key: &str) -> PmResult<&str> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(PmError::Config(format!("{key} is not set"))),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Read a configuration file without touching the process environment.
    pub fn load(path: &Path) -> PmResult<Self> {
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| PmError::Config(format!("cannot read {}: {e}", path.display())))?;

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| PmError::Config(format!("malformed {}: {e}", path.display())))?;
            entries.push((key, value));
        }
        Ok(Self { entries })
    }

    /// Write to `path` with owner-only permissions, refusing to replace an
    /// existing file.
    pub fn write_new(&self, path: &Path) -> PmResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(ENV_FILE_MODE)
            .open(path)?;
        file.write_all(self.render().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Load the configuration at `path`, generating and persisting one
    /// first if none exists. Returns whether a new file was written.
    pub fn load_or_create(path: &Path) -> PmResult<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }
        let config = Self::generate()?;
        config.write_new(path)?;
        info!(path = %path.display(), "generated configuration");
        Ok((config, true))
    }
}

/// Hex-encoded bytes from the operating system's random source.
pub fn random_secret(bytes: usize) -> PmResult<String> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf)
        .map_err(|e| PmError::Config(format!("no secure random source available: {e}")))?;
    Ok(hex::encode(buf))
}
