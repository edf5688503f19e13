// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Win32 `ERROR_FILE_NOT_FOUND`
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
/// Win32 `ERROR_NO_MORE_FILES`
pub const ERROR_NO_MORE_FILES: u32 = 18;
/// Win32 `ERROR_MORE_DATA`
pub const ERROR_MORE_DATA: u32 = 234;

const FACILITY_WIN32_MASK: u32 = 0xFFFF_0000;
const FACILITY_WIN32_PREFIX: u32 = 0x8007_0000;

/// An error reported by an OS call, reduced to its Win32 code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (os error {code})")]
pub struct OsError {
    pub code: u32,
    pub message: String,
}

impl OsError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Build from an HRESULT, unwrapping `HRESULT_FROM_WIN32` values to their Win32 code.
    pub fn from_hresult(hresult: i32, message: impl Into<String>) -> Self {
        let raw = hresult as u32;
        let code = if raw & FACILITY_WIN32_MASK == FACILITY_WIN32_PREFIX {
            raw & 0xFFFF
        } else {
            raw
        };
        Self::new(code, message)
    }

    pub fn is_no_more_items(&self) -> bool {
        self.code == ERROR_NO_MORE_FILES
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ERROR_FILE_NOT_FOUND
    }

    pub fn is_buffer_too_small(&self) -> bool {
        self.code == ERROR_MORE_DATA
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for OsError {
    fn from(error: windows::core::Error) -> Self {
        Self::from_hresult(error.code().0, error.message())
    }
}

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not open volume for {volume}: {source}")]
    OpenVolume {
        volume: String,
        #[source]
        source: OsError,
    },

    #[error("could not identify physical drive for {volume}: {reason}")]
    Protocol { volume: String, reason: String },

    #[error("{call} failed for {subject}: {source}")]
    Upstream {
        call: &'static str,
        subject: String,
        #[source]
        source: OsError,
    },

    #[error("BitLocker worker fault: {0}")]
    WorkerFault(String),

    #[error("BitLocker worker is not running")]
    WorkerUnavailable,

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl SysError {
    pub fn upstream(call: &'static str, subject: impl Into<String>, source: OsError) -> Self {
        Self::Upstream {
            call,
            subject: subject.into(),
            source,
        }
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_win32_hresults() {
        let error = OsError::from_hresult(0x8007_0012_u32 as i32, "no more files");
        assert!(error.is_no_more_items());

        let error = OsError::from_hresult(0x8007_00EA_u32 as i32, "more data");
        assert!(error.is_buffer_too_small());
    }

    #[test]
    fn keeps_non_win32_hresults() {
        let error = OsError::from_hresult(0x8001_0106_u32 as i32, "changed mode");
        assert_eq!(error.code, 0x8001_0106);
        assert!(!error.is_not_found());
    }

    #[test]
    fn errors_name_their_subject() {
        let error = SysError::OpenVolume {
            volume: "D:".to_string(),
            source: OsError::new(5, "Access is denied."),
        };
        assert_eq!(
            error.to_string(),
            "could not open volume for D:: Access is denied. (os error 5)"
        );

        let error = SysError::upstream(
            "GetVolumeInformation",
            r"\\?\Volume{abc}\",
            OsError::new(21, "The device is not ready."),
        );
        assert!(error.to_string().contains(r"\\?\Volume{abc}\"));
    }
}
