// SPDX-License-Identifier: GPL-3.0-only

//! In-memory [`VolumeApi`] for tests of the resolver and its consumers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::extents::encode_extents;
use super::{RawVolumeInformation, VolumeApi, VolumeEnumerator, VolumeHandle};
use crate::error::{ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_FILES, OsError};

#[derive(Default)]
pub struct FakeVolumeApi {
    volumes: Vec<(String, Option<Vec<String>>)>,
    enumeration_error: Option<OsError>,
    devices: HashMap<String, Vec<u8>>,
    drive_types: HashMap<String, u32>,
    information: HashMap<String, Result<RawVolumeInformation, OsError>>,
    enumerations: Rc<Cell<usize>>,
    path_name_calls: Cell<usize>,
    queried_roots: RefCell<Vec<String>>,
    open_handles: Rc<Cell<usize>>,
}

impl FakeVolumeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, guid: &str, mount_points: &[&str]) -> Self {
        let mount_points = mount_points.iter().map(|m| m.to_string()).collect();
        self.volumes.push((guid.to_string(), Some(mount_points)));
        self
    }

    pub fn with_unmounted_volume(mut self, guid: &str) -> Self {
        self.volumes.push((guid.to_string(), None));
        self
    }

    /// Error reported after the configured volumes have been enumerated.
    pub fn with_enumeration_error(mut self, error: OsError) -> Self {
        self.enumeration_error = Some(error);
        self
    }

    pub fn with_device(mut self, device_path: &str, disk_numbers: &[u32]) -> Self {
        let buffer = if disk_numbers.is_empty() {
            vec![0u8; 8]
        } else {
            encode_extents(disk_numbers)
        };
        self.devices.insert(device_path.to_string(), buffer);
        self
    }

    pub fn with_drive_type(mut self, root: &str, drive_type: u32) -> Self {
        self.drive_types.insert(root.to_string(), drive_type);
        self
    }

    pub fn with_information(
        mut self,
        root: &str,
        information: Result<RawVolumeInformation, OsError>,
    ) -> Self {
        self.information.insert(root.to_string(), information);
        self
    }

    /// Shared count of `find_volumes` calls, readable after the fake is moved.
    pub fn enumeration_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.enumerations)
    }

    pub fn path_name_calls(&self) -> usize {
        self.path_name_calls.get()
    }

    /// Roots passed to the drive type and volume information queries, in call order.
    pub fn queried_roots(&self) -> Vec<String> {
        self.queried_roots.borrow().clone()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.get()
    }
}

pub struct FakeEnumerator {
    guids: std::vec::IntoIter<String>,
    error: Option<OsError>,
}

impl VolumeEnumerator for FakeEnumerator {
    fn next_volume(&mut self) -> Result<String, OsError> {
        if let Some(guid) = self.guids.next() {
            return Ok(guid);
        }

        Err(self
            .error
            .take()
            .unwrap_or_else(|| OsError::new(ERROR_NO_MORE_FILES, "There are no more files.")))
    }
}

pub struct FakeHandle {
    extents: Vec<u8>,
    open_handles: Rc<Cell<usize>>,
}

impl VolumeHandle for FakeHandle {
    fn disk_extents(&self, buffer: &mut [u8]) -> Result<usize, OsError> {
        let len = self.extents.len().min(buffer.len());
        buffer[..len].copy_from_slice(&self.extents[..len]);
        Ok(len)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.open_handles.set(self.open_handles.get() - 1);
    }
}

impl VolumeApi for FakeVolumeApi {
    type Enumerator = FakeEnumerator;
    type Handle = FakeHandle;

    fn find_volumes(&self) -> Result<FakeEnumerator, OsError> {
        self.enumerations.set(self.enumerations.get() + 1);
        if self.volumes.is_empty() && self.enumeration_error.is_none() {
            return Err(OsError::new(ERROR_NO_MORE_FILES, "There are no more files."));
        }

        let guids: Vec<String> = self.volumes.iter().map(|(guid, _)| guid.clone()).collect();
        Ok(FakeEnumerator {
            guids: guids.into_iter(),
            error: self.enumeration_error.clone(),
        })
    }

    fn volume_path_names(
        &self,
        volume_guid: &str,
        buffer: &mut [u16],
        required_len: &mut u32,
    ) -> Result<(), OsError> {
        self.path_name_calls.set(self.path_name_calls.get() + 1);

        let Some((_, mount_points)) = self.volumes.iter().find(|(guid, _)| guid == volume_guid)
        else {
            return Err(OsError::new(ERROR_FILE_NOT_FOUND, "volume not found"));
        };
        let Some(mount_points) = mount_points else {
            return Err(OsError::new(
                ERROR_FILE_NOT_FOUND,
                "The system cannot find the file specified.",
            ));
        };

        let mut units: Vec<u16> = Vec::new();
        for mount_point in mount_points {
            units.extend(mount_point.encode_utf16());
            units.push(0);
        }
        units.push(0);

        *required_len = units.len() as u32;
        if buffer.len() < units.len() {
            return Err(OsError::new(ERROR_MORE_DATA, "More data is available."));
        }

        buffer[..units.len()].copy_from_slice(&units);
        Ok(())
    }

    fn open_volume(&self, device_path: &str) -> Result<FakeHandle, OsError> {
        let extents = self
            .devices
            .get(device_path)
            .cloned()
            .ok_or_else(|| OsError::new(ERROR_FILE_NOT_FOUND, "no such device"))?;

        self.open_handles.set(self.open_handles.get() + 1);
        Ok(FakeHandle {
            extents,
            open_handles: Rc::clone(&self.open_handles),
        })
    }

    fn drive_type(&self, root: &str) -> u32 {
        self.queried_roots.borrow_mut().push(root.to_string());
        self.drive_types.get(root).copied().unwrap_or(0)
    }

    fn volume_information(&self, root: &str) -> Result<RawVolumeInformation, OsError> {
        self.queried_roots.borrow_mut().push(root.to_string());
        self.information
            .get(root)
            .cloned()
            .unwrap_or_else(|| Err(OsError::new(ERROR_FILE_NOT_FOUND, "no such root")))
    }
}
