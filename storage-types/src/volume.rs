// SPDX-License-Identifier: GPL-3.0-only

//! Logical volume metadata
//!
//! These types describe one logical volume as resolved from the OS: which
//! physical disks back it and the static filesystem metadata reported for its
//! root. They are recomputed on every resolve call and never cached.

use serde::{Deserialize, Serialize};

/// Volume flag bit reported by the OS for read-only volumes (`FILE_READ_ONLY_VOLUME`).
pub const FILE_READ_ONLY_VOLUME: u32 = 0x0008_0000;

/// Separator used when joining physical disk numbers.
pub const DISK_ID_SEPARATOR: &str = ";";

/// OS classification of the media behind a volume root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    Unknown,
    NoRootDir,
    Removable,
    Fixed,
    Remote,
    Cdrom,
    Ramdisk,
}

impl DriveType {
    /// Map a raw `GetDriveType` code. Codes the OS does not define map to `Unknown`.
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => Self::NoRootDir,
            2 => Self::Removable,
            3 => Self::Fixed,
            4 => Self::Remote,
            5 => Self::Cdrom,
            6 => Self::Ramdisk,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NoRootDir => "norootdir",
            Self::Removable => "removable",
            Self::Fixed => "fixed",
            Self::Remote => "remote",
            Self::Cdrom => "cdrom",
            Self::Ramdisk => "ramdisk",
        }
    }

    /// Removable and optical media may legitimately have no volume mounted.
    pub fn may_lack_media(&self) -> bool {
        matches!(self, Self::Removable | Self::Cdrom)
    }
}

/// Resolved metadata for one logical volume.
///
/// `VolumeInfo::default()` is the "empty" result returned for removable or
/// optical drives whose media is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Requested volume name (mount path without trailing separator, e.g. "C:")
    pub volume: String,

    /// Volume GUID path (e.g. `\\?\Volume{...}`), when the volume is mounted
    pub guid_path: Option<String>,

    /// Distinct physical disk numbers, ascending, joined with `;`
    pub disk_ids: String,

    /// Filesystem name (e.g. "NTFS", "ReFS")
    pub filesystem: String,

    /// Volume label
    pub label: String,

    /// Volume serial number as upper-case hex
    pub serial_number: String,

    /// Drive classification, absent for the empty result
    pub drive_type: Option<DriveType>,

    /// Whether the volume flags carry the read-only bit
    pub read_only: bool,
}

impl VolumeInfo {
    /// Drive type label, empty when the type is unknown to this result.
    pub fn type_label(&self) -> &'static str {
        self.drive_type.map(|t| t.as_str()).unwrap_or("")
    }
}

/// Join disk numbers into the canonical `;`-separated form.
///
/// Numbers are sorted ascending and deduplicated first, so the same set of
/// disks always yields the same string.
pub fn join_disk_ids(mut disk_numbers: Vec<u32>) -> String {
    disk_numbers.sort_unstable();
    disk_numbers.dedup();

    disk_numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(DISK_ID_SEPARATOR)
}

/// Format a volume serial number the way the OS tools display it.
pub fn format_serial_number(serial: u32) -> String {
    format!("{serial:X}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_ids_are_sorted_and_deduplicated() {
        assert_eq!(join_disk_ids(vec![5, 3, 3, 9]), "3;5;9");
        assert_eq!(join_disk_ids(vec![0]), "0");
        assert_eq!(join_disk_ids(vec![]), "");
    }

    #[test]
    fn disk_ids_sort_numerically() {
        assert_eq!(join_disk_ids(vec![10, 2, 1]), "1;2;10");
    }

    #[test]
    fn drive_type_maps_raw_codes() {
        let labels: Vec<&str> = (0..=7).map(|code| DriveType::from_raw(code).as_str()).collect();

        assert_eq!(
            labels,
            vec![
                "unknown",
                "norootdir",
                "removable",
                "fixed",
                "remote",
                "cdrom",
                "ramdisk",
                "unknown"
            ]
        );
    }

    #[test]
    fn only_removable_and_optical_may_lack_media() {
        assert!(DriveType::Removable.may_lack_media());
        assert!(DriveType::Cdrom.may_lack_media());
        assert!(!DriveType::Fixed.may_lack_media());
        assert!(!DriveType::Remote.may_lack_media());
    }

    #[test]
    fn empty_info_has_no_type_label() {
        let info = VolumeInfo::default();

        assert_eq!(info.type_label(), "");
    }

    #[test]
    fn serial_number_is_upper_hex() {
        assert_eq!(format_serial_number(0x1a2b_3c4d), "1A2B3C4D");
        assert_eq!(format_serial_number(0), "0");
    }

    #[test]
    fn serde_roundtrip_volume_info() {
        let info = VolumeInfo {
            volume: "C:".to_string(),
            guid_path: Some(r"\\?\Volume{abc}".to_string()),
            disk_ids: "0;1".to_string(),
            filesystem: "NTFS".to_string(),
            label: "System".to_string(),
            serial_number: "BEEF".to_string(),
            drive_type: Some(DriveType::Fixed),
            read_only: false,
        };

        let json = serde_json::to_string(&info).expect("serialize volume info");
        let parsed: VolumeInfo = serde_json::from_str(&json).expect("deserialize volume info");

        assert_eq!(parsed, info);
    }
}
