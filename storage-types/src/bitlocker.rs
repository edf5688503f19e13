// SPDX-License-Identifier: GPL-3.0-only

//! BitLocker protection status
//!
//! Values of the shell property `System.Volume.BitLockerProtection`, which is
//! readable without elevation (unlike `Win32_EncryptableVolume`).
//!
//! | code | Control Panel                    | Get-BitLockerVolume ProtectionStatus |
//! |------|----------------------------------|--------------------------------------|
//! | 1    | BitLocker on                     | On                                   |
//! | 2    | BitLocker off                    | Off                                  |
//! | 3    | Encrypting / encryption paused   | Off                                  |
//! | 4    | Decrypting / decryption paused   | Off                                  |
//! | 5    | BitLocker suspended              | Off                                  |
//! | 6    | BitLocker on (locked)            | Unknown                              |
//! | 7    |                                  |                                      |
//! | 8    | Waiting for activation           | Off                                  |

use serde::{Deserialize, Serialize};

/// Status labels in code order (0..=8), as exposed on the `status` metric label.
pub const BITLOCKER_STATUS_LABELS: [&str; 9] = [
    "disabled",
    "on",
    "off",
    "encrypting",
    "decrypting",
    "suspended",
    "locked",
    "unknown",
    "waiting_for_activation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum BitlockerStatus {
    /// The path has no drive reference; not an OS value.
    NotApplicable,
    Disabled,
    On,
    Off,
    Encrypting,
    Decrypting,
    Suspended,
    Locked,
    Unknown,
    WaitingForActivation,
    /// A code the property is not known to return.
    Other(i32),
}

impl BitlockerStatus {
    pub const NOT_APPLICABLE_CODE: i32 = -1;

    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::NotApplicable,
            0 => Self::Disabled,
            1 => Self::On,
            2 => Self::Off,
            3 => Self::Encrypting,
            4 => Self::Decrypting,
            5 => Self::Suspended,
            6 => Self::Locked,
            7 => Self::Unknown,
            8 => Self::WaitingForActivation,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::NotApplicable => Self::NOT_APPLICABLE_CODE,
            Self::Disabled => 0,
            Self::On => 1,
            Self::Off => 2,
            Self::Encrypting => 3,
            Self::Decrypting => 4,
            Self::Suspended => 5,
            Self::Locked => 6,
            Self::Unknown => 7,
            Self::WaitingForActivation => 8,
            Self::Other(code) => *code,
        }
    }

    /// Label of a defined status, `None` for `NotApplicable` and `Other`.
    pub fn label(&self) -> Option<&'static str> {
        usize::try_from(self.code())
            .ok()
            .and_then(|index| BITLOCKER_STATUS_LABELS.get(index))
            .filter(|_| !matches!(self, Self::Other(_)))
            .copied()
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }

    /// One-hot indicator values over [`BITLOCKER_STATUS_LABELS`].
    ///
    /// Statuses without a label produce all zeros.
    pub fn indicators(&self) -> [(&'static str, f64); 9] {
        let current = self.label();
        BITLOCKER_STATUS_LABELS.map(|label| {
            let value = if current == Some(label) { 1.0 } else { 0.0 };
            (label, value)
        })
    }
}

impl From<i32> for BitlockerStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<BitlockerStatus> for i32 {
    fn from(status: BitlockerStatus) -> Self {
        status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_defined_status_sets_exactly_one_indicator() {
        for code in 0..=8 {
            let indicators = BitlockerStatus::from_code(code).indicators();

            let ones = indicators.iter().filter(|(_, value)| *value == 1.0).count();
            let zeros = indicators.iter().filter(|(_, value)| *value == 0.0).count();
            assert_eq!((ones, zeros), (1, 8), "status code {code}");
            assert_eq!(indicators[code as usize].1, 1.0);
        }
    }

    #[test]
    fn undefined_statuses_set_no_indicator() {
        for status in [
            BitlockerStatus::NotApplicable,
            BitlockerStatus::from_code(9),
            BitlockerStatus::from_code(-7),
        ] {
            assert!(status.indicators().iter().all(|(_, value)| *value == 0.0));
            assert_eq!(status.label(), None);
        }
    }

    #[test]
    fn codes_roundtrip() {
        for code in -1..=12 {
            assert_eq!(BitlockerStatus::from_code(code).code(), code);
        }
        assert_eq!(BitlockerStatus::from_code(9), BitlockerStatus::Other(9));
    }

    #[test]
    fn labels_follow_code_order() {
        assert_eq!(BitlockerStatus::Disabled.label(), Some("disabled"));
        assert_eq!(
            BitlockerStatus::WaitingForActivation.label(),
            Some("waiting_for_activation")
        );
    }

    #[test]
    fn serializes_as_status_code() {
        let json = serde_json::to_string(&BitlockerStatus::Suspended).expect("serialize status");
        assert_eq!(json, "5");

        let parsed: BitlockerStatus = serde_json::from_str("-1").expect("deserialize status");
        assert_eq!(parsed, BitlockerStatus::NotApplicable);
    }
}
