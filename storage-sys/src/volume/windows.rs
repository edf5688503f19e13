// SPDX-License-Identifier: GPL-3.0-only

//! [`VolumeApi`] backed by the Win32 volume management functions.

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_READONLY, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    FindFirstVolumeW, FindNextVolumeW, FindVolumeClose, GetDriveTypeW, GetVolumeInformationW,
    GetVolumePathNamesForVolumeNameW, OPEN_EXISTING,
};
use windows::Win32::System::IO::DeviceIoControl;
use windows::core::HSTRING;

use super::extents::IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS;
use super::{MAX_PATH, RawVolumeInformation, VolumeApi, VolumeEnumerator, VolumeHandle};
use crate::error::OsError;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsVolumeApi;

pub struct FindVolumes {
    handle: HANDLE,
    first: Option<String>,
}

impl VolumeEnumerator for FindVolumes {
    fn next_volume(&mut self) -> Result<String, OsError> {
        if let Some(first) = self.first.take() {
            return Ok(first);
        }

        let mut buffer = [0u16; MAX_PATH + 1];
        unsafe { FindNextVolumeW(self.handle, &mut buffer) }?;
        Ok(from_wide(&buffer))
    }
}

impl Drop for FindVolumes {
    fn drop(&mut self) {
        let _ = unsafe { FindVolumeClose(self.handle) };
    }
}

pub struct Volume(HANDLE);

impl VolumeHandle for Volume {
    fn disk_extents(&self, buffer: &mut [u8]) -> Result<usize, OsError> {
        let mut bytes_returned = 0u32;
        unsafe {
            DeviceIoControl(
                self.0,
                IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS,
                None,
                0,
                Some(buffer.as_mut_ptr().cast()),
                buffer.len() as u32,
                Some(&mut bytes_returned),
                None,
            )
        }?;
        Ok(bytes_returned as usize)
    }
}

impl Drop for Volume {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

impl VolumeApi for WindowsVolumeApi {
    type Enumerator = FindVolumes;
    type Handle = Volume;

    fn find_volumes(&self) -> Result<FindVolumes, OsError> {
        let mut buffer = [0u16; MAX_PATH + 1];
        let handle = unsafe { FindFirstVolumeW(&mut buffer) }?;
        Ok(FindVolumes {
            handle,
            first: Some(from_wide(&buffer)),
        })
    }

    fn volume_path_names(
        &self,
        volume_guid: &str,
        buffer: &mut [u16],
        required_len: &mut u32,
    ) -> Result<(), OsError> {
        unsafe {
            GetVolumePathNamesForVolumeNameW(
                &HSTRING::from(volume_guid),
                Some(buffer),
                required_len,
            )
        }?;
        Ok(())
    }

    fn open_volume(&self, device_path: &str) -> Result<Volume, OsError> {
        // Access mask 0: device control on volumes does not need read or write
        // rights, and asking for none avoids requiring administrator privileges.
        let handle = unsafe {
            CreateFileW(
                &HSTRING::from(device_path),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                FILE_ATTRIBUTE_READONLY,
                HANDLE::default(),
            )
        }?;
        Ok(Volume(handle))
    }

    fn drive_type(&self, root: &str) -> u32 {
        unsafe { GetDriveTypeW(&HSTRING::from(root)) }
    }

    fn volume_information(&self, root: &str) -> Result<RawVolumeInformation, OsError> {
        let mut label = [0u16; MAX_PATH + 1];
        let mut filesystem = [0u16; MAX_PATH + 1];
        let mut serial_number = 0u32;
        let mut flags = 0u32;

        unsafe {
            GetVolumeInformationW(
                &HSTRING::from(root),
                Some(&mut label),
                Some(&mut serial_number),
                None,
                Some(&mut flags),
                Some(&mut filesystem),
            )
        }?;

        Ok(RawVolumeInformation {
            label: from_wide(&label),
            filesystem: from_wide(&filesystem),
            serial_number,
            flags,
        })
    }
}

fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|unit| *unit == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}
