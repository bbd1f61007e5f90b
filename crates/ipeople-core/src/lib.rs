//! ipeople-core — shared building blocks for the iPeople operations tool.
//!
//! Holds everything that does not talk to the container backend:
//! the service model, the error taxonomy, operator settings, the
//! persisted `.env` configuration, the compose template and backup
//! artifacts.

pub mod backup;
pub mod compose_file;
pub mod config;
pub mod error;
pub mod settings;
pub mod types;

pub use config::Configuration;
pub use error::{PmError, PmResult};
pub use settings::Settings;
pub use types::*;
