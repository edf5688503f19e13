// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;

use tracing::debug;

use super::{MAX_PATH, VolumeApi, VolumeEnumerator, trim_separator};
use crate::error::{Result, SysError};

/// Map every mount path on the host to its volume GUID path.
///
/// Both sides are stored without trailing separators. Volumes that are not
/// mounted anywhere contribute no entry.
pub fn enumerate_mounted_volumes<A: VolumeApi>(api: &A) -> Result<HashMap<String, String>> {
    let mut volumes = HashMap::new();

    let mut enumerator = match api.find_volumes() {
        Ok(enumerator) => enumerator,
        Err(error) if error.is_no_more_items() => return Ok(volumes),
        Err(error) => {
            return Err(SysError::upstream(
                "FindFirstVolume",
                "volume enumeration",
                error,
            ));
        }
    };

    loop {
        let guid = match enumerator.next_volume() {
            Ok(guid) => guid,
            Err(error) if error.is_no_more_items() => break,
            Err(error) => {
                return Err(SysError::upstream(
                    "FindNextVolume",
                    "volume enumeration",
                    error,
                ));
            }
        };

        let guid_path = trim_separator(&guid);
        for mount_point in volume_mount_points(api, &guid)? {
            let mount_point = trim_separator(&mount_point);
            if mount_point.is_empty() {
                continue;
            }

            volumes.insert(mount_point.to_string(), guid_path.to_string());
        }
    }

    debug!("Enumerated {} mount points", volumes.len());
    Ok(volumes)
}

/// Resolve the mount points of one volume, retrying once with a larger buffer.
fn volume_mount_points<A: VolumeApi>(api: &A, guid: &str) -> Result<Vec<String>> {
    let mut buffer = vec![0u16; MAX_PATH + 1];
    let mut required_len = 0u32;
    let mut resized = false;

    loop {
        match api.volume_path_names(guid, &mut buffer, &mut required_len) {
            Ok(()) => return Ok(split_multi_string(&buffer)),
            Err(error) if error.is_not_found() => {
                debug!(volume = guid, "Volume is not mounted");
                return Ok(Vec::new());
            }
            Err(error) if error.is_buffer_too_small() && !resized => {
                debug!(
                    volume = guid,
                    required_len, "Mount point buffer too small, retrying"
                );
                buffer = vec![0u16; (required_len as usize).max(1)];
                resized = true;
            }
            Err(error) => {
                return Err(SysError::upstream(
                    "GetVolumePathNamesForVolumeName",
                    guid,
                    error,
                ));
            }
        }
    }
}

/// Split a `REG_MULTI_SZ`-style buffer (NUL-separated, double-NUL terminated).
pub(crate) fn split_multi_string(buffer: &[u16]) -> Vec<String> {
    buffer
        .split(|unit| *unit == 0)
        .take_while(|entry| !entry.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OsError;
    use crate::volume::testing::FakeVolumeApi;

    #[test]
    fn maps_mount_points_to_guid_paths() {
        let api = FakeVolumeApi::new()
            .with_volume(r"\\?\Volume{aaa}\", &[r"C:\"])
            .with_volume(r"\\?\Volume{bbb}\", &[r"D:\", r"C:\mnt\data\"]);

        let volumes = enumerate_mounted_volumes(&api).expect("enumeration should succeed");

        assert_eq!(volumes.len(), 3);
        assert_eq!(volumes["C:"], r"\\?\Volume{aaa}");
        assert_eq!(volumes["D:"], r"\\?\Volume{bbb}");
        assert_eq!(volumes[r"C:\mnt\data"], r"\\?\Volume{bbb}");
    }

    #[test]
    fn unmounted_volume_is_skipped() {
        let api = FakeVolumeApi::new()
            .with_unmounted_volume(r"\\?\Volume{gone}\")
            .with_volume(r"\\?\Volume{aaa}\", &[r"E:\"]);

        let volumes = enumerate_mounted_volumes(&api).expect("enumeration should succeed");

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes["E:"], r"\\?\Volume{aaa}");
    }

    #[test]
    fn volume_without_mount_points_is_skipped() {
        let api = FakeVolumeApi::new().with_volume(r"\\?\Volume{recovery}\", &[]);

        let volumes = enumerate_mounted_volumes(&api).expect("enumeration should succeed");

        assert!(volumes.is_empty());
    }

    #[test]
    fn undersized_buffer_is_retried_once() {
        let long_mount = format!(r"C:\{}\", "m".repeat(400));
        let api = FakeVolumeApi::new().with_volume(r"\\?\Volume{aaa}\", &[long_mount.as_str()]);

        let volumes = enumerate_mounted_volumes(&api).expect("enumeration should succeed");

        assert_eq!(api.path_name_calls(), 2);
        assert_eq!(
            volumes[long_mount.trim_end_matches('\\')],
            r"\\?\Volume{aaa}"
        );
    }

    #[test]
    fn enumeration_errors_propagate() {
        let api = FakeVolumeApi::new()
            .with_volume(r"\\?\Volume{aaa}\", &[r"C:\"])
            .with_enumeration_error(OsError::new(5, "Access is denied."));

        let error = enumerate_mounted_volumes(&api).expect_err("enumeration should fail");

        assert!(matches!(
            error,
            SysError::Upstream {
                call: "FindNextVolume",
                ..
            }
        ));
    }

    #[test]
    fn empty_enumeration_is_not_an_error() {
        let api = FakeVolumeApi::new();

        let volumes = enumerate_mounted_volumes(&api).expect("enumeration should succeed");

        assert!(volumes.is_empty());
    }

    #[test]
    fn splits_multi_strings() {
        let buffer: Vec<u16> = "C:\\\0D:\\\0\0garbage".encode_utf16().collect();

        assert_eq!(split_multi_string(&buffer), vec!["C:\\", "D:\\"]);
        assert!(split_multi_string(&[0, 0]).is_empty());
    }
}
