// SPDX-License-Identifier: GPL-3.0-only

//! BitLocker protection status
//!
//! [`BitlockerWorker`] owns the thread-affine probe and serializes every
//! status query through it. [`ProbeFactory`] is the seam between the worker
//! and the OS; [`ShellProbeFactory`] is the Windows implementation.

pub mod probe;
#[cfg(windows)]
mod shell;
pub mod worker;

pub use probe::{EncryptionProbe, ProbeFactory};
#[cfg(windows)]
pub use shell::{ShellProbeFactory, ShellPropertyProbe};
pub use worker::{BitlockerWorker, StatusRequest};
