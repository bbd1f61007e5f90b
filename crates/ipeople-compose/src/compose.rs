//! Docker Compose implementation of [`Backend`].
//!
//! Every call has the shape
//! `docker compose -p ipeople --project-directory <dir> -f <dir>/docker-compose.yml --env-file <dir>/.env <sub...>`
//! and goes through the [`PrivilegedRunner`].

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

use ipeople_core::{PROJECT_NAME, PmError, PmResult, Service, ServiceStatus, Settings, parse_ps_output};

use crate::backend::Backend;
use crate::privilege::{HostProbe, PrivilegeProbe, PrivilegedRunner};

pub struct ComposeBackend<P = HostProbe> {
    runner: PrivilegedRunner<P>,
    program: String,
    project_dir: PathBuf,
    compose_file: PathBuf,
    env_file: PathBuf,
}

impl ComposeBackend<HostProbe> {
    /// Backend for the deployment described by `settings`, probing the
    /// host for the privilege context.
    pub fn from_settings(settings: &Settings) -> Self {
        let runner = PrivilegedRunner::new(
            HostProbe::new(settings.privileged_group.clone()),
            settings.escalation.clone(),
        );
        Self::with_runner(settings, runner)
    }
}

impl<P: PrivilegeProbe> ComposeBackend<P> {
    pub fn with_runner(settings: &Settings, runner: PrivilegedRunner<P>) -> Self {
        Self {
            runner,
            program: settings.backend_program.clone(),
            project_dir: settings.install_dir.clone(),
            compose_file: settings.compose_file(),
            env_file: settings.env_file(),
        }
    }

    /// Full argument list for `compose <sub...>`.
    pub fn compose_args<S: Into<OsString>>(&self, sub: impl IntoIterator<Item = S>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "compose".into(),
            "-p".into(),
            PROJECT_NAME.into(),
            "--project-directory".into(),
            self.project_dir.clone().into(),
            "-f".into(),
            self.compose_file.clone().into(),
            "--env-file".into(),
            self.env_file.clone().into(),
        ];
        args.extend(sub.into_iter().map(Into::into));
        args
    }

    /// Build the privileged command for `compose <sub...>`.
    pub fn command<S: Into<OsString>>(&self, sub: impl IntoIterator<Item = S>) -> Command {
        self.runner.command(&self.program, self.compose_args(sub))
    }

    /// Run with the terminal attached so output and prompts reach the
    /// operator.
    fn stream(&self, sub: Vec<OsString>) -> PmResult<()> {
        let label = describe(&sub);
        let status = self
            .runner
            .run_with(&self.program, self.compose_args(sub), |mut cmd| {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
            })?;
        check_status(&label, status, None)
    }

    /// Run and collect stdout; stderr is kept for the error message.
    fn capture(&self, sub: Vec<OsString>) -> PmResult<Vec<u8>> {
        let label = describe(&sub);
        let output = self
            .runner
            .run_with(&self.program, self.compose_args(sub), |mut cmd| {
                cmd.stdin(Stdio::null()).output()
            })?;
        check_status(&label, output.status, Some(&output.stderr))?;
        Ok(output.stdout)
    }

    /// Run and copy stdout into `sink` as it arrives. Stderr stays on the
    /// terminal.
    fn pipe(&self, sub: Vec<OsString>, sink: &mut dyn Write) -> PmResult<u64> {
        let label = describe(&sub);
        let mut child = self
            .runner
            .run_with(&self.program, self.compose_args(sub), |mut cmd| {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .spawn()
            })?;

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, sink),
            None => Err(io::Error::other("stdout was not captured")),
        };
        let copied = match copied {
            Ok(n) => n,
            Err(e) => {
                if let Err(kill) = child.kill() {
                    warn!(error = %kill, "could not stop backend command");
                }
                let _ = child.wait();
                return Err(PmError::BackendUnavailable(format!(
                    "compose {label} output could not be written: {e}"
                )));
            }
        };

        let status = child
            .wait()
            .map_err(|e| PmError::BackendUnavailable(format!("compose {label}: {e}")))?;
        check_status(&label, status, None)?;
        debug!(bytes = copied, "backend output copied");
        Ok(copied)
    }
}

fn describe(sub: &[OsString]) -> String {
    sub.first()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check_status(label: &str, status: ExitStatus, stderr: Option<&[u8]>) -> PmResult<()> {
    if status.success() {
        return Ok(());
    }

    let code = status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let detail = stderr
        .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
        .filter(|s| !s.is_empty());

    Err(PmError::BackendUnavailable(match detail {
        Some(detail) => format!("compose {label} exited with {code}: {detail}"),
        None => format!("compose {label} exited with {code}"),
    }))
}

/// Arguments for each primitive, kept separate from process spawning.
pub(crate) fn up_args(detached: bool) -> Vec<OsString> {
    let mut args = vec![OsString::from("up")];
    if detached {
        args.push("-d".into());
    }
    args
}

pub(crate) fn down_args(remove_volumes: bool) -> Vec<OsString> {
    let mut args = vec![OsString::from("down")];
    if remove_volumes {
        args.push("-v".into());
    }
    args
}

pub(crate) fn logs_args(services: &[String], follow: bool) -> Vec<OsString> {
    let mut args = vec![OsString::from("logs")];
    if follow {
        args.push("-f".into());
    }
    args.extend(services.iter().map(OsString::from));
    args
}

pub(crate) fn exec_args(service: Service, command: &[&str]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["exec".into(), "-T".into(), service.name().into()];
    args.extend(command.iter().map(OsString::from));
    args
}

impl<P: PrivilegeProbe> Backend for ComposeBackend<P> {
    fn up(&self, detached: bool) -> PmResult<()> {
        info!("starting services");
        self.stream(up_args(detached))
    }

    fn down(&self, remove_volumes: bool) -> PmResult<()> {
        info!(remove_volumes, "stopping services");
        self.stream(down_args(remove_volumes))
    }

    fn pull(&self) -> PmResult<()> {
        info!("pulling images");
        self.stream(vec!["pull".into()])
    }

    fn ps(&self) -> PmResult<Vec<ServiceStatus>> {
        let raw = self.capture(vec!["ps".into(), "--all".into(), "--format".into(), "json".into()])?;
        parse_ps_output(&String::from_utf8_lossy(&raw))
    }

    fn logs(&self, services: &[String], follow: bool) -> PmResult<()> {
        self.stream(logs_args(services, follow))
    }

    fn exec(&self, service: Service, command: &[&str], sink: &mut dyn Write) -> PmResult<u64> {
        info!(%service, "exec in service");
        self.pipe(exec_args(service, command), sink)
    }
}
