// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for logical disk telemetry
//!
//! This crate talks to the Windows volume management and shell property
//! APIs:
//! - Volume enumeration and mount point mapping
//! - Physical disk, drive type and filesystem resolution per volume
//! - BitLocker protection status through a dedicated worker thread
//!
//! OS access sits behind the [`volume::VolumeApi`] and
//! [`bitlocker::ProbeFactory`] traits. Only their Windows implementations are
//! platform specific.

pub mod bitlocker;
pub mod error;
pub mod volume;

pub use bitlocker::{BitlockerWorker, EncryptionProbe, ProbeFactory};
#[cfg(windows)]
pub use bitlocker::ShellProbeFactory;
pub use error::{OsError, Result, SysError};
pub use volume::{VolumeApi, VolumeResolver};
#[cfg(windows)]
pub use volume::WindowsVolumeApi;
