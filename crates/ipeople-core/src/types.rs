//! Service model shared by the backend and the dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PmError, PmResult};

/// Compose project name; prefixes the volume and network names.
pub const PROJECT_NAME: &str = "ipeople";

/// Named volume holding the PostgreSQL data directory.
pub const DB_VOLUME: &str = "db_data";

/// Network shared by both services.
pub const NETWORK: &str = "ipeople";

/// One of the two services in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Db,
    App,
}

impl Service {
    /// Every declared service, in start order.
    pub const ALL: [Service; 2] = [Service::Db, Service::App];

    pub fn name(&self) -> &'static str {
        match self {
            Service::Db => "db",
            Service::App => "app",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "db" => Some(Service::Db),
            "app" => Some(Service::App),
            _ => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse service state as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
}

impl ServiceState {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        }
    }
}

/// One row of `compose ps` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "Service")]
    pub service: String,
    /// Raw container state: running, exited, created, restarting, ...
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: Option<String>,
}

impl ServiceStatus {
    pub fn new(service: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            state: state.into(),
            health: None,
        }
    }

    pub fn coarse_state(&self) -> ServiceState {
        if self.state.eq_ignore_ascii_case("running") {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }

    pub fn is_service(&self, service: Service) -> bool {
        self.service == service.name()
    }
}

/// Parse the JSON emitted by `compose ps --format json`.
///
/// Newer Compose releases print one object per line, older ones a single
/// array. Empty output means no containers exist.
pub fn parse_ps_output(raw: &str) -> PmResult<Vec<ServiceStatus>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| PmError::BackendUnavailable(format!("unreadable ps output: {e}")));
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| PmError::BackendUnavailable(format!("unreadable ps output: {e}")))
        })
        .collect()
}

/// Fold `ps` rows into one state per declared service, followed by any
/// extra services the backend knows about.
///
/// A declared service with no container is reported as stopped.
pub fn summarize(statuses: &[ServiceStatus]) -> Vec<(String, ServiceState)> {
    let mut summary: Vec<(String, ServiceState)> = Service::ALL
        .iter()
        .map(|svc| {
            let state = statuses
                .iter()
                .filter(|s| s.is_service(*svc))
                .map(ServiceStatus::coarse_state)
                .find(|st| *st == ServiceState::Running)
                .unwrap_or(ServiceState::Stopped);
            (svc.name().to_string(), state)
        })
        .collect();

    for status in statuses {
        if Service::parse(&status.service).is_none()
            && !summary.iter().any(|(name, _)| *name == status.service)
        {
            summary.push((status.service.clone(), status.coarse_state()));
        }
    }

    summary
}
