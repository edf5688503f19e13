// SPDX-License-Identifier: GPL-3.0-only

use crate::error::Result;

/// Reads the raw BitLocker protection code of a volume.
///
/// A probe is created on the worker thread and never leaves it, so
/// implementations may hold thread-affine state (a COM apartment).
pub trait EncryptionProbe {
    fn protection_status(&mut self, volume_path: &str) -> Result<i32>;
}

/// Creates the probe for a freshly started worker thread.
///
/// `bind` runs on the thread that will serve every subsequent request, once
/// per worker instance (again after a restart).
pub trait ProbeFactory: Send + Sync + 'static {
    type Probe: EncryptionProbe;

    fn bind(&self) -> Result<Self::Probe>;
}
