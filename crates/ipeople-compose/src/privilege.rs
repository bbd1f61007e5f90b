//! Privilege context resolution and the "run with appropriate privilege"
//! runner.
//!
//! Resolution order:
//! 1. Effective uid 0 → `Direct`
//! 2. Member of the privileged group (primary group, listed member in the
//!    group database, or among the process's current groups) → `Direct`
//! 3. Otherwise → `Escalated` (the backend runs under the wrapper, `sudo`)

use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use ipeople_core::{PmError, PmResult};

/// How a single backend call reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeContext {
    /// Invoke the backend program itself.
    Direct,
    /// Invoke it as an argument of the escalation wrapper.
    Escalated,
}

/// The invoking principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub name: String,
    pub primary_gid: u32,
    /// Supplementary groups of the running process.
    pub groups: Vec<u32>,
}

/// A group database entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub gid: u32,
    pub members: Vec<String>,
}

/// Decide the privilege context from an identity and the privileged
/// group's entry (`None` when the group does not exist).
pub fn resolve(identity: &Identity, group: Option<&GroupEntry>) -> PrivilegeContext {
    if identity.uid == 0 {
        return PrivilegeContext::Direct;
    }

    let Some(group) = group else {
        return PrivilegeContext::Escalated;
    };

    let is_member = identity.primary_gid == group.gid
        || identity.groups.contains(&group.gid)
        || (!identity.name.is_empty() && group.members.iter().any(|m| *m == identity.name));

    if is_member {
        PrivilegeContext::Direct
    } else {
        PrivilegeContext::Escalated
    }
}

/// Source of the privilege context for one backend call.
pub trait PrivilegeProbe {
    fn probe(&self) -> PrivilegeContext;
}

/// Probes the host's user and group databases on every call.
#[derive(Debug, Clone)]
pub struct HostProbe {
    group: String,
}

impl HostProbe {
    pub fn new(group: impl Into<String>) -> Self {
        Self { group: group.into() }
    }
}

impl PrivilegeProbe for HostProbe {
    fn probe(&self) -> PrivilegeContext {
        let identity = current_identity();
        let group = lookup_group(&self.group);
        if group.is_none() {
            debug!(group = %self.group, "privileged group not found");
        }
        let context = resolve(&identity, group.as_ref());
        debug!(user = %identity.name, uid = identity.uid, ?context, "privilege context");
        context
    }
}

fn current_identity() -> Identity {
    // SAFETY: geteuid has no failure mode.
    let uid = unsafe { libc::geteuid() };

    // SAFETY: getpwuid returns null or a pointer into static storage that
    // stays valid until the next passwd lookup; fields are copied out
    // before returning.
    let (name, primary_gid) = unsafe {
        let pw = libc::getpwuid(uid);
        if pw.is_null() || (*pw).pw_name.is_null() {
            warn!(uid, "no passwd entry for current user");
            (String::new(), u32::MAX)
        } else {
            (
                CStr::from_ptr((*pw).pw_name).to_string_lossy().into_owned(),
                (*pw).pw_gid,
            )
        }
    };

    Identity {
        uid,
        name,
        primary_gid,
        groups: process_groups(),
    }
}

fn process_groups() -> Vec<u32> {
    // SAFETY: a zero-length call only returns the group count.
    let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
    if count <= 0 {
        return Vec::new();
    }

    let mut groups = vec![0 as libc::gid_t; count as usize];
    // SAFETY: the buffer holds exactly `count` entries.
    let filled = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
    if filled < 0 {
        return Vec::new();
    }
    groups.truncate(filled as usize);
    groups
}

fn lookup_group(name: &str) -> Option<GroupEntry> {
    let c_name = CString::new(name).ok()?;

    // SAFETY: getgrnam returns null or a pointer into static storage; the
    // null-terminated member list is copied before returning.
    unsafe {
        let gr = libc::getgrnam(c_name.as_ptr());
        if gr.is_null() {
            return None;
        }

        let mut members = Vec::new();
        let mut cursor = (*gr).gr_mem;
        if !cursor.is_null() {
            while !(*cursor).is_null() {
                members.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
                cursor = cursor.add(1);
            }
        }

        Some(GroupEntry {
            gid: (*gr).gr_gid,
            members,
        })
    }
}

/// Builds backend commands under the privilege context probed for that
/// very call.
#[derive(Debug, Clone)]
pub struct PrivilegedRunner<P> {
    probe: P,
    escalation: String,
}

impl<P: PrivilegeProbe> PrivilegedRunner<P> {
    pub fn new(probe: P, escalation: impl Into<String>) -> Self {
        Self {
            probe,
            escalation: escalation.into(),
        }
    }

    /// `program args...`, or `<escalation> program args...` when the
    /// probe says the caller cannot reach the backend directly.
    pub fn command<I, S>(&self, program: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = match self.probe.probe() {
            PrivilegeContext::Direct => Command::new(program),
            PrivilegeContext::Escalated => {
                let mut cmd = Command::new(&self.escalation);
                cmd.arg(program);
                cmd
            }
        };
        cmd.args(args);
        cmd
    }

    /// Run `invoke` against a freshly built privileged command.
    ///
    /// Spawn errors (missing binary, no permission to execute) map to
    /// [`PmError::BackendUnavailable`].
    pub fn run_with<I, S, T, F>(&self, program: &str, args: I, invoke: F) -> PmResult<T>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        F: FnOnce(Command) -> std::io::Result<T>,
    {
        let cmd = self.command(program, args);
        debug!(command = ?cmd, "running backend command");
        invoke(cmd).map_err(|e| {
            PmError::BackendUnavailable(format!("failed to execute '{program}': {e}"))
        })
    }
}

/// Recursively remove `path` as `<escalation> rm -rf -- <path>`.
///
/// For host files the invoking user cannot delete, such as an
/// installation directory owned by root.
pub fn remove_escalated(escalation: &str, path: &Path) -> PmResult<()> {
    let mut cmd = Command::new(escalation);
    cmd.args(["rm", "-rf", "--"]).arg(path);
    debug!(command = ?cmd, "removing with escalation");

    let status = cmd.status()?;
    if status.success() {
        return Ok(());
    }
    Err(PmError::Io(io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("'{escalation} rm -rf {}' failed: {status}", path.display()),
    )))
}
