//! ipeople-compose — the container backend for iPeople.
//!
//! # Architecture
//!
//! ```text
//! Backend (trait)
//!   └── ComposeBackend
//!         └── PrivilegedRunner
//!               ├── PrivilegeProbe::probe()   (re-run on every call)
//!               └── docker compose ...  |  sudo docker compose ...
//! ```
//!
//! The privilege context is never cached: a group membership granted
//! while the tool is in use applies to the very next backend call.

pub mod backend;
pub mod compose;
pub mod privilege;

pub use backend::Backend;
pub use compose::ComposeBackend;
pub use privilege::{
    HostProbe, PrivilegeContext, PrivilegeProbe, PrivilegedRunner, remove_escalated,
};
