// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;

use storage_types::{
    DriveType, FILE_READ_ONLY_VOLUME, VolumeInfo, format_serial_number, join_disk_ids,
};
use tracing::debug;

use super::extents::{DISK_EXTENTS_BUFFER_SIZE, parse_disk_numbers};
use super::{VolumeApi, VolumeHandle, trim_separator};
use crate::error::{Result, SysError};

/// Win32 file namespace prefix, as found on volume GUID paths.
pub const WIN32_FILE_NAMESPACE: &str = r"\\?\";

/// Win32 device namespace prefix, required to open a volume for device control.
pub const WIN32_DEVICE_NAMESPACE: &str = r"\\.\";

const VOLUME_MARKER: &str = "Volume";

/// Path used to address the volume: the GUID form (without namespace prefix)
/// when `root_drive` is a known mount point, `root_drive` itself otherwise.
pub fn working_path(volumes: &HashMap<String, String>, root_drive: &str) -> String {
    match volumes.get(root_drive) {
        Some(guid_path) => {
            let guid_path = guid_path
                .strip_prefix(WIN32_FILE_NAMESPACE)
                .unwrap_or(guid_path);
            trim_separator(guid_path).to_string()
        }
        None => root_drive.to_string(),
    }
}

/// Device namespace path handed to `CreateFile`.
pub fn device_path(working_path: &str) -> String {
    format!("{WIN32_DEVICE_NAMESPACE}{working_path}")
}

/// Root directory used for drive type and volume information queries.
///
/// Volume object names (`Volume{...}`, `HarddiskVolume4`) get the file
/// namespace prefix; drive letters stay as they are. Both forms end with a
/// separator.
pub fn canonical_root(working_path: &str) -> String {
    if working_path.contains(VOLUME_MARKER) {
        format!(r"{WIN32_FILE_NAMESPACE}{working_path}\")
    } else {
        format!(r"{working_path}\")
    }
}

/// Resolve physical disks and filesystem metadata of one volume.
///
/// `volumes` is the mount map from [`super::enumerate_mounted_volumes`]. The
/// volume is opened without any access rights and with full sharing, so the
/// query never blocks other users of the volume.
pub fn resolve_volume<A: VolumeApi>(
    api: &A,
    volumes: &HashMap<String, String>,
    root_drive: &str,
) -> Result<VolumeInfo> {
    let working_path = working_path(volumes, root_drive);

    let disk_numbers = {
        let handle = api
            .open_volume(&device_path(&working_path))
            .map_err(|source| SysError::OpenVolume {
                volume: root_drive.to_string(),
                source,
            })?;

        let mut buffer = vec![0u8; DISK_EXTENTS_BUFFER_SIZE];
        let returned = handle
            .disk_extents(&mut buffer)
            .map_err(|source| SysError::upstream("DeviceIoControl", root_drive, source))?;

        parse_disk_numbers(&buffer[..returned.min(buffer.len())]).map_err(|error| {
            SysError::Protocol {
                volume: root_drive.to_string(),
                reason: error.to_string(),
            }
        })?
    };

    let root = canonical_root(&working_path);
    let drive_type = DriveType::from_raw(api.drive_type(&root));

    let information = match api.volume_information(&root) {
        Ok(information) => information,
        Err(error) if drive_type.may_lack_media() => {
            debug!(
                volume = root_drive,
                drive_type = drive_type.as_str(),
                "No media in drive: {error}"
            );
            return Ok(VolumeInfo::default());
        }
        Err(error) => return Err(SysError::upstream("GetVolumeInformation", root, error)),
    };

    Ok(VolumeInfo {
        volume: root_drive.to_string(),
        guid_path: volumes.get(root_drive).cloned(),
        disk_ids: join_disk_ids(disk_numbers),
        filesystem: information.filesystem,
        label: information.label,
        serial_number: format_serial_number(information.serial_number),
        drive_type: Some(drive_type),
        read_only: information.flags & FILE_READ_ONLY_VOLUME != 0,
    })
}
