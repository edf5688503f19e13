// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for logical disk telemetry
//!
//! This crate defines the types shared by the resolver, the encryption status
//! worker and the collector:
//!
//! - **storage-sys**: returns these types from volume resolution and status queries
//! - **storage-collector**: turns them into metric samples

pub mod bitlocker;
pub mod volume;

pub use bitlocker::{BITLOCKER_STATUS_LABELS, BitlockerStatus};
pub use volume::{
    DISK_ID_SEPARATOR, DriveType, FILE_READ_ONLY_VOLUME, VolumeInfo, format_serial_number,
    join_disk_ids,
};
