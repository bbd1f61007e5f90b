//! The orchestration backend contract.

use std::io::Write;

use ipeople_core::{PmResult, Service, ServiceStatus};

/// Lifecycle primitives over the declared two-service deployment.
///
/// Every failure, whether the program is missing, permission is denied
/// or the call exits non-zero, surfaces as
/// [`PmError::BackendUnavailable`](ipeople_core::PmError::BackendUnavailable).
pub trait Backend {
    /// Create and start all services.
    fn up(&self, detached: bool) -> PmResult<()>;

    /// Stop and remove containers; the named volume goes too when
    /// `remove_volumes` is set.
    fn down(&self, remove_volumes: bool) -> PmResult<()>;

    /// Fetch the latest images.
    fn pull(&self) -> PmResult<()>;

    /// Current container state per service.
    fn ps(&self) -> PmResult<Vec<ServiceStatus>>;

    /// Print logs for `services`, or for every service when empty.
    fn logs(&self, services: &[String], follow: bool) -> PmResult<()>;

    /// Run `command` inside `service`, streaming its stdout into `sink`.
    ///
    /// Returns the number of bytes copied. Output is never buffered in
    /// full, so a large dump costs constant memory.
    fn exec(&self, service: Service, command: &[&str], sink: &mut dyn Write) -> PmResult<u64>;
}
