// SPDX-License-Identifier: GPL-3.0-only

//! `VOLUME_DISK_EXTENTS` parsing
//!
//! Layout returned by `IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS`:
//!
//! ```text
//! offset 0   u32  NumberOfDiskExtents
//! offset 4   u32  (padding)
//! offset 8   DISK_EXTENT[n], 24 bytes each:
//!            +0  u32  DiskNumber
//!            +4  u32  (padding)
//!            +8  i64  StartingOffset
//!            +16 i64  ExtentLength
//! ```

use thiserror::Error;

/// Device control code for `IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS`.
pub const IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS: u32 = 0x0056_0000;

/// Output buffer size handed to the extent query.
pub const DISK_EXTENTS_BUFFER_SIZE: usize = 16 * 1024;

/// Size of one `DISK_EXTENT` record in bytes.
pub const DISK_EXTENT_SIZE: usize = 24;

const EXTENTS_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtentParseError {
    #[error("extent buffer holds {0} bytes, too short for the extent count")]
    MissingCount(usize),

    #[error("no disk IDs returned")]
    NoExtents,

    #[error("{count} extents announced but only {available} bytes returned")]
    Truncated { count: usize, available: usize },
}

/// Extract the physical disk number of every extent, in buffer order.
pub fn parse_disk_numbers(buffer: &[u8]) -> Result<Vec<u32>, ExtentParseError> {
    let count =
        read_u32_le(buffer, 0).ok_or(ExtentParseError::MissingCount(buffer.len()))? as usize;

    if count == 0 {
        return Err(ExtentParseError::NoExtents);
    }

    let required = count
        .checked_mul(DISK_EXTENT_SIZE)
        .and_then(|records| records.checked_add(EXTENTS_HEADER_SIZE));
    if required.is_none_or(|required| required > buffer.len()) {
        return Err(ExtentParseError::Truncated {
            count,
            available: buffer.len(),
        });
    }

    (0..count)
        .map(|index| {
            read_u32_le(buffer, EXTENTS_HEADER_SIZE + index * DISK_EXTENT_SIZE).ok_or(
                ExtentParseError::Truncated {
                    count,
                    available: buffer.len(),
                },
            )
        })
        .collect()
}

fn read_u32_le(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

#[cfg(any(test, feature = "testing"))]
pub fn encode_extents(disk_numbers: &[u32]) -> Vec<u8> {
    let mut buffer = vec![0u8; EXTENTS_HEADER_SIZE + disk_numbers.len() * DISK_EXTENT_SIZE];
    buffer[..4].copy_from_slice(&(disk_numbers.len() as u32).to_le_bytes());

    for (index, disk) in disk_numbers.iter().enumerate() {
        let record = EXTENTS_HEADER_SIZE + index * DISK_EXTENT_SIZE;
        buffer[record..record + 4].copy_from_slice(&disk.to_le_bytes());
        // Offset and length are ignored by the parser; fill them with noise.
        buffer[record + 8..record + 16].copy_from_slice(&(1_048_576_i64).to_le_bytes());
        buffer[record + 16..record + 24].copy_from_slice(&(i64::MAX).to_le_bytes());
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_disk_number_of_each_record() {
        let buffer = encode_extents(&[5, 3, 3, 9]);

        assert_eq!(parse_disk_numbers(&buffer), Ok(vec![5, 3, 3, 9]));
    }

    #[test]
    fn ignores_trailing_buffer_space() {
        let mut buffer = encode_extents(&[1]);
        buffer.resize(DISK_EXTENTS_BUFFER_SIZE, 0xAA);

        assert_eq!(parse_disk_numbers(&buffer), Ok(vec![1]));
    }

    #[test]
    fn zero_extents_is_an_error() {
        let buffer = vec![0u8; DISK_EXTENTS_BUFFER_SIZE];

        assert_eq!(parse_disk_numbers(&buffer), Err(ExtentParseError::NoExtents));
    }

    #[test]
    fn rejects_truncated_buffers() {
        let buffer = encode_extents(&[0, 1]);

        assert_eq!(
            parse_disk_numbers(&buffer[..buffer.len() - 1]),
            Err(ExtentParseError::Truncated {
                count: 2,
                available: buffer.len() - 1
            })
        );
        assert_eq!(
            parse_disk_numbers(&buffer[..3]),
            Err(ExtentParseError::MissingCount(3))
        );
    }

    #[test]
    fn rejects_absurd_extent_counts() {
        let mut buffer = vec![0u8; 64];
        buffer[..4].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            parse_disk_numbers(&buffer),
            Err(ExtentParseError::Truncated { .. })
        ));
    }
}
