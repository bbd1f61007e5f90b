//! Test doubles: a recording in-memory backend and a scratch deployment.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Write;

use ipeople_compose::Backend;
use ipeople_core::{
    Configuration, PmError, PmResult, Service, ServiceStatus, Settings, compose_file,
};
use tempfile::TempDir;

use super::{Outcome, Session, dispatch};
use crate::Commands;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Up(bool),
    Down(bool),
    Pull,
    Ps,
    Logs(Vec<String>, bool),
    Exec(Service, Vec<String>),
}

/// Records every call and simulates container and volume state.
pub(crate) struct MockBackend {
    calls: RefCell<Vec<Call>>,
    fail_on: RefCell<Option<Call>>,
    running: Cell<bool>,
    volume: Cell<bool>,
    dump: RefCell<Vec<u8>>,
    chunk_size: Cell<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: RefCell::new(None),
            running: Cell::new(false),
            volume: Cell::new(true),
            dump: RefCell::new(b"-- PostgreSQL database dump\n".to_vec()),
            chunk_size: Cell::new(4096),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn fail_on(&self, call: Call) {
        *self.fail_on.borrow_mut() = Some(call);
    }

    pub fn set_running(&self, running: bool) {
        self.running.set(running);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn has_volume(&self) -> bool {
        self.volume.get()
    }

    pub fn set_dump(&self, dump: &[u8]) {
        *self.dump.borrow_mut() = dump.to_vec();
    }

    /// Deliver the dump to `exec` sinks in writes of at most `size` bytes.
    pub fn set_chunk_size(&self, size: usize) {
        self.chunk_size.set(size.max(1));
    }

    fn record(&self, call: Call) -> PmResult<()> {
        self.calls.borrow_mut().push(call.clone());
        if self.fail_on.borrow().as_ref() == Some(&call) {
            return Err(PmError::BackendUnavailable(format!("mock failure on {call:?}")));
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    fn up(&self, detached: bool) -> PmResult<()> {
        self.record(Call::Up(detached))?;
        self.running.set(true);
        self.volume.set(true);
        Ok(())
    }

    fn down(&self, remove_volumes: bool) -> PmResult<()> {
        self.record(Call::Down(remove_volumes))?;
        self.running.set(false);
        if remove_volumes {
            self.volume.set(false);
        }
        Ok(())
    }

    fn pull(&self) -> PmResult<()> {
        self.record(Call::Pull)
    }

    fn ps(&self) -> PmResult<Vec<ServiceStatus>> {
        self.record(Call::Ps)?;
        if !self.running.get() {
            return Ok(Vec::new());
        }
        Ok(Service::ALL
            .iter()
            .map(|svc| ServiceStatus::new(svc.name(), "running"))
            .collect())
    }

    fn logs(&self, services: &[String], follow: bool) -> PmResult<()> {
        self.record(Call::Logs(services.to_vec(), follow))
    }

    fn exec(&self, service: Service, command: &[&str], sink: &mut dyn Write) -> PmResult<u64> {
        let call = Call::Exec(service, command.iter().map(|s| s.to_string()).collect());
        self.calls.borrow_mut().push(call.clone());
        let failing = self.fail_on.borrow().as_ref() == Some(&call);

        let dump = self.dump.borrow();
        let mut written = 0u64;
        for chunk in dump.chunks(self.chunk_size.get()) {
            sink.write_all(chunk)?;
            written += chunk.len() as u64;
            // A failing dump dies after its first chunk.
            if failing {
                return Err(PmError::BackendUnavailable(format!("mock failure on {call:?}")));
            }
        }
        if failing {
            return Err(PmError::BackendUnavailable(format!("mock failure on {call:?}")));
        }
        Ok(written)
    }
}

/// A provisioned deployment in a temporary directory.
pub(crate) struct Harness {
    _dir: TempDir,
    pub settings: Settings,
    pub backend: MockBackend,
    out: Vec<u8>,
}

impl Harness {
    pub fn new() -> Self {
        let h = Self::bare();
        fs::create_dir_all(&h.settings.install_dir).unwrap();
        compose_file::write_if_absent(&h.settings.compose_file()).unwrap();
        Configuration::load_or_create(&h.settings.env_file()).unwrap();
        h
    }

    /// Settings pointing into a fresh directory, with nothing installed.
    pub fn bare() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.install_dir = dir.path().join("ipeople");
        settings.backup_dir = dir.path().join("backups");
        settings.binary_path = dir.path().join("bin").join("ipeople-pm");
        settings.settle_delay = std::time::Duration::ZERO;

        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(&settings.binary_path, b"#!/bin/sh\n").unwrap();

        Self {
            _dir: dir,
            settings,
            backend: MockBackend::new(),
            out: Vec::new(),
        }
    }

    pub fn remove_install_dir(&mut self) {
        fs::remove_dir_all(&self.settings.install_dir).unwrap();
    }

    pub fn with_session<I, T>(&mut self, input: &I, f: impl FnOnce(&mut Session<'_>) -> T) -> T
    where
        I: AsRef<[u8]> + ?Sized,
    {
        let mut reader = input.as_ref();
        let mut session = Session {
            settings: &self.settings,
            backend: &self.backend,
            input: &mut reader,
            out: &mut self.out,
        };
        f(&mut session)
    }

    pub fn run<I>(&mut self, command: &Commands, input: &I) -> PmResult<Outcome>
    where
        I: AsRef<[u8]> + ?Sized,
    {
        self.with_session(input, |s| dispatch(command, s))
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }

    pub fn env_bytes(&self) -> Vec<u8> {
        fs::read(self.settings.env_file()).unwrap()
    }

    pub fn backups(&self) -> Vec<std::path::PathBuf> {
        let mut files: Vec<_> = match fs::read_dir(&self.settings.backup_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}
