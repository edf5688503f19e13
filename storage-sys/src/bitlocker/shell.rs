// SPDX-License-Identifier: GPL-3.0-only

//! Shell property probe for `System.Volume.BitLockerProtection`.
//!
//! Reading the shell property does not need administrator rights, unlike the
//! WMI encryptable volume class.

use std::marker::PhantomData;

use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::System::Com::{
    COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE, CoInitializeEx, CoUninitialize,
};
use windows::Win32::UI::Shell::PropertiesSystem::PSGetPropertyKeyFromName;
use windows::Win32::UI::Shell::{IShellItem2, SHCreateItemFromParsingName};
use windows::core::{HSTRING, w};

use super::probe::{EncryptionProbe, ProbeFactory};
use crate::error::{Result, SysError};

const WORKER_SUBJECT: &str = "BitLocker worker";

/// Single-threaded COM apartment for the current thread.
struct Apartment {
    _thread_bound: PhantomData<*const ()>,
}

impl Apartment {
    fn enter() -> Result<Self> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE) }
            .ok()
            .map_err(|error| SysError::upstream("CoInitializeEx", WORKER_SUBJECT, error.into()))?;

        Ok(Self {
            _thread_bound: PhantomData,
        })
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// Binds [`ShellPropertyProbe`]s on the worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellProbeFactory;

impl ProbeFactory for ShellProbeFactory {
    type Probe = ShellPropertyProbe;

    fn bind(&self) -> Result<ShellPropertyProbe> {
        let apartment = Apartment::enter()?;

        let mut key = PROPERTYKEY::default();
        unsafe { PSGetPropertyKeyFromName(w!("System.Volume.BitLockerProtection"), &mut key) }
            .map_err(|error| {
                SysError::upstream("PSGetPropertyKeyFromName", WORKER_SUBJECT, error.into())
            })?;

        Ok(ShellPropertyProbe {
            key,
            _apartment: apartment,
        })
    }
}

pub struct ShellPropertyProbe {
    key: PROPERTYKEY,
    // Last field: the apartment is left after everything else is released.
    _apartment: Apartment,
}

impl EncryptionProbe for ShellPropertyProbe {
    fn protection_status(&mut self, volume_path: &str) -> Result<i32> {
        let item: IShellItem2 =
            unsafe { SHCreateItemFromParsingName(&HSTRING::from(volume_path), None) }.map_err(
                |error| SysError::upstream("SHCreateItemFromParsingName", volume_path, error.into()),
            )?;

        let value = unsafe { item.GetProperty(&self.key) }.map_err(|error| {
            SysError::upstream("IShellItem2::GetProperty", volume_path, error.into())
        })?;

        i32::try_from(&value)
            .map_err(|error| SysError::upstream("PropVariantToInt32", volume_path, error.into()))
    }
}
