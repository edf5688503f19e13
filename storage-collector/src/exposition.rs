// SPDX-License-Identifier: GPL-3.0-only

//! Logical disk gauges and their Prometheus text exposition.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use storage_types::{BitlockerStatus, VolumeInfo};

use crate::error::{CollectorError, Result};

pub const INFO_METRIC: &str = "windows_logical_disk_info";
pub const READONLY_METRIC: &str = "windows_logical_disk_readonly";
pub const BITLOCKER_METRIC: &str = "windows_logical_disk_bitlocker_status";

const INFO_LABELS: [&str; 6] = [
    "disk",
    "type",
    "volume",
    "volume_name",
    "filesystem",
    "serial_number",
];

/// Gauges for one collection, registered on a private registry.
///
/// Families without samples are left out of the rendered output.
pub struct LogicalDiskMetrics {
    registry: Registry,
    information: GaugeVec,
    read_only: GaugeVec,
    bitlocker: GaugeVec,
}

impl LogicalDiskMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let information = GaugeVec::new(
            Opts::new(
                INFO_METRIC,
                "A metric with a constant '1' value labeled with logical disk information",
            ),
            &INFO_LABELS,
        )?;
        registry.register(Box::new(information.clone()))?;

        let read_only = GaugeVec::new(
            Opts::new(READONLY_METRIC, "Whether the logical disk is read-only"),
            &["volume"],
        )?;
        registry.register(Box::new(read_only.clone()))?;

        let bitlocker = GaugeVec::new(
            Opts::new(BITLOCKER_METRIC, "BitLocker status for the logical disk"),
            &["volume", "status"],
        )?;
        registry.register(Box::new(bitlocker.clone()))?;

        Ok(Self {
            registry,
            information,
            read_only,
            bitlocker,
        })
    }

    pub fn record_information(&self, volume: &str, info: &VolumeInfo) -> Result<()> {
        self.information
            .get_metric_with_label_values(&[
                info.disk_ids.as_str(),
                info.type_label(),
                volume,
                info.label.as_str(),
                info.filesystem.as_str(),
                info.serial_number.as_str(),
            ])?
            .set(1.0);
        Ok(())
    }

    pub fn record_read_only(&self, volume: &str, read_only: bool) -> Result<()> {
        self.read_only
            .get_metric_with_label_values(&[volume])?
            .set(if read_only { 1.0 } else { 0.0 });
        Ok(())
    }

    /// One sample per status label; only the current status is `1`.
    pub fn record_bitlocker(&self, volume: &str, status: BitlockerStatus) -> Result<()> {
        for (label, value) in status.indicators() {
            self.bitlocker
                .get_metric_with_label_values(&[volume, label])?
                .set(value);
        }
        Ok(())
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| CollectorError::Encoding(e.to_string()))
    }

    /// Value of the first `name` sample whose labels include every given pair.
    #[cfg(test)]
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                labels.iter().all(|(label, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *label && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    #[cfg(test)]
    pub fn sample_count(&self, name: &str) -> usize {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .map(|family| family.get_metric().len())
            .sum()
    }
}
