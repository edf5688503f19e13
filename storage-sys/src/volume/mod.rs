// SPDX-License-Identifier: GPL-3.0-only

//! Logical volume resolution
//!
//! Maps mounted volumes to their GUID paths and resolves, for one volume, the
//! physical disks backing it plus the metadata of its filesystem root.
//!
//! Every OS call goes through [`VolumeApi`]. The algorithms in this module
//! (buffer retry, extent parsing, root canonicalization, missing-media
//! handling) only see that trait; [`WindowsVolumeApi`] is the production
//! binding.

pub mod extents;
pub mod mounts;
pub mod resolve;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
#[cfg(windows)]
mod windows;

use std::collections::HashMap;

use storage_types::VolumeInfo;

use crate::error::{OsError, Result};

pub use extents::{ExtentParseError, IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, parse_disk_numbers};
pub use mounts::enumerate_mounted_volumes;
pub use resolve::{canonical_root, device_path, resolve_volume, working_path};
#[cfg(windows)]
pub use windows::WindowsVolumeApi;

/// `MAX_PATH` in UTF-16 code units.
pub const MAX_PATH: usize = 260;

/// Cursor over the volumes known to the OS.
pub trait VolumeEnumerator {
    /// Next volume GUID path as reported by the OS (with trailing separator).
    ///
    /// Exhaustion is reported as an `ERROR_NO_MORE_FILES` error.
    fn next_volume(&mut self) -> std::result::Result<String, OsError>;
}

/// An open volume. Dropping it closes the underlying handle.
pub trait VolumeHandle {
    /// Run the disk extent query into `buffer`, returning the bytes written.
    fn disk_extents(&self, buffer: &mut [u8]) -> std::result::Result<usize, OsError>;
}

/// Metadata reported for a volume root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVolumeInformation {
    pub label: String,
    pub filesystem: String,
    pub serial_number: u32,
    pub flags: u32,
}

/// OS calls needed to enumerate and resolve volumes.
pub trait VolumeApi {
    type Enumerator: VolumeEnumerator;
    type Handle: VolumeHandle;

    /// Start a volume enumeration (`FindFirstVolume`).
    fn find_volumes(&self) -> std::result::Result<Self::Enumerator, OsError>;

    /// Mount points of `volume_guid` as a NUL-separated multi-string.
    ///
    /// On `ERROR_MORE_DATA`, `required_len` holds the needed buffer length.
    fn volume_path_names(
        &self,
        volume_guid: &str,
        buffer: &mut [u16],
        required_len: &mut u32,
    ) -> std::result::Result<(), OsError>;

    /// Open a device namespace path without requesting any access rights.
    fn open_volume(&self, device_path: &str) -> std::result::Result<Self::Handle, OsError>;

    /// Raw `GetDriveType` code of a root path.
    fn drive_type(&self, root: &str) -> u32;

    fn volume_information(&self, root: &str)
    -> std::result::Result<RawVolumeInformation, OsError>;
}

/// Stateless volume resolver. Nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct VolumeResolver<A> {
    api: A,
}

impl<A: VolumeApi> VolumeResolver<A> {
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    pub fn enumerate_mounted_volumes(&self) -> Result<HashMap<String, String>> {
        mounts::enumerate_mounted_volumes(&self.api)
    }

    pub fn resolve_volume(
        &self,
        volumes: &HashMap<String, String>,
        root_drive: &str,
    ) -> Result<VolumeInfo> {
        resolve::resolve_volume(&self.api, volumes, root_drive)
    }

    /// Enumerate the mounted volumes and resolve `root_drive` against them.
    pub fn resolve(&self, root_drive: &str) -> Result<VolumeInfo> {
        let volumes = self.enumerate_mounted_volumes()?;
        self.resolve_volume(&volumes, root_drive)
    }
}

#[cfg(windows)]
impl VolumeResolver<WindowsVolumeApi> {
    pub fn new() -> Self {
        Self::with_api(WindowsVolumeApi)
    }
}

pub(crate) fn trim_separator(path: &str) -> &str {
    path.trim_end_matches('\\')
}
