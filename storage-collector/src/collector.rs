// SPDX-License-Identifier: GPL-3.0-only

//! Logical disk collector
//!
//! One collection enumerates the mounted volumes once, then resolves and
//! reports every selected volume name against that snapshot.

use std::collections::HashMap;

use storage_sys::{BitlockerWorker, ProbeFactory, VolumeApi, VolumeResolver};
use storage_types::VolumeInfo;
use tracing::{debug, info, warn};

use crate::config::{CollectorConfig, SubCollector};
use crate::error::{CollectorError, Result};
use crate::exposition::LogicalDiskMetrics;
use crate::filter::VolumeFilter;

pub struct LogicalDiskCollector<A> {
    resolver: VolumeResolver<A>,
    filter: VolumeFilter,
    sub_collectors: Vec<SubCollector>,
    bitlocker: Option<BitlockerWorker>,
}

impl<A: VolumeApi> LogicalDiskCollector<A> {
    /// Validate `config` and start the BitLocker worker when it is enabled.
    pub fn build<F: ProbeFactory>(
        config: &CollectorConfig,
        resolver: VolumeResolver<A>,
        factory: F,
    ) -> Result<Self> {
        let sub_collectors = config.sub_collectors()?;
        let filter = VolumeFilter::new(&config.volume_include, &config.volume_exclude)?;

        let bitlocker = if sub_collectors.contains(&SubCollector::BitlockerStatus) {
            Some(BitlockerWorker::start(factory).map_err(CollectorError::BitlockerInit)?)
        } else {
            None
        };

        info!(
            sub_collectors = ?sub_collectors.iter().map(SubCollector::as_str).collect::<Vec<_>>(),
            "Logical disk collector built"
        );

        Ok(Self {
            resolver,
            filter,
            sub_collectors,
            bitlocker,
        })
    }

    fn enabled(&self, sub: SubCollector) -> bool {
        self.sub_collectors.contains(&sub)
    }

    /// Report `volume_names`, or every mounted volume (sorted) when the list is
    /// empty. Both come from a single enumeration.
    pub fn collect(&self, volume_names: &[String]) -> Result<LogicalDiskMetrics> {
        let volumes = self
            .resolver
            .enumerate_mounted_volumes()
            .map_err(CollectorError::Volumes)?;

        let names = if volume_names.is_empty() {
            let mut mounted: Vec<String> = volumes.keys().cloned().collect();
            mounted.sort();
            mounted
        } else {
            volume_names.to_vec()
        };

        let metrics = LogicalDiskMetrics::new()?;

        for name in &names {
            if !self.filter.matches(name) {
                debug!(volume = %name, "Volume filtered out");
                continue;
            }

            let info = self.volume_info(&volumes, name);
            metrics.record_information(name, &info)?;

            if self.enabled(SubCollector::Metrics) {
                metrics.record_read_only(name, info.read_only)?;
            }

            if let Some(worker) = &self.bitlocker {
                collect_bitlocker(worker, name, &metrics)?;
            }
        }

        Ok(metrics)
    }

    fn volume_info(&self, volumes: &HashMap<String, String>, name: &str) -> VolumeInfo {
        self.resolver
            .resolve_volume(volumes, name)
            .unwrap_or_else(|error| {
                warn!(volume = %name, %error, "Failed to get volume information");
                VolumeInfo::default()
            })
    }

    /// Stop the BitLocker worker, if any.
    pub fn close(self) {
        if let Some(worker) = self.bitlocker {
            worker.stop();
        }
    }
}

fn collect_bitlocker(
    worker: &BitlockerWorker,
    name: &str,
    metrics: &LogicalDiskMetrics,
) -> Result<()> {
    let status = match worker.query_status(name) {
        Ok(status) => status,
        Err(error) => {
            warn!(volume = %name, %error, "Failed to get BitLocker status");
            return Ok(());
        }
    };

    if !status.is_applicable() {
        debug!(volume = %name, status = status.code(), "BitLocker status is unknown");
        return Ok(());
    }

    metrics.record_bitlocker(name, status)
}
