// SPDX-License-Identifier: GPL-3.0-only

//! Logical disk collector
//!
//! Resolves the selected volumes to their physical disks, filesystem details
//! and BitLocker status, and prints them in the Prometheus text format.

// The collection pipeline only runs on Windows. Elsewhere it is reached from tests alone.
#![cfg_attr(not(windows), allow(dead_code))]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use storage_sys::VolumeApi;
use tracing::info;

mod collector;
mod config;
mod error;
mod exposition;
mod filter;
mod logging;

use collector::LogicalDiskCollector;
use config::{CollectorConfig, ConfigOverrides, LoggingLevel};

#[derive(Parser, Debug)]
#[command(
    name = "logical-disk-collector",
    version,
    about = "Report logical disk information and BitLocker status"
)]
struct Args {
    /// TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated sub collectors: metrics, bitlocker_status
    #[arg(long, value_delimiter = ',')]
    enabled: Option<Vec<String>>,

    /// Regular expression of volumes to collect
    #[arg(long)]
    volume_include: Option<String>,

    /// Regular expression of volumes to skip
    #[arg(long)]
    volume_exclude: Option<String>,

    /// Volume to report (repeatable). Defaults to every mounted volume.
    #[arg(long = "volume")]
    volumes: Vec<String>,

    #[arg(long, value_enum)]
    log_level: Option<LoggingLevel>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            enabled: self.enabled.clone(),
            volume_include: self.volume_include.clone(),
            volume_exclude: self.volume_exclude.clone(),
            log_level: self.log_level,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = CollectorConfig::load(args.config.as_deref())?.with_overrides(args.overrides());

    logging::init(config.log_level);
    info!(
        "Starting logical disk collector v{}",
        env!("CARGO_PKG_VERSION")
    );

    run(&config, &args.volumes)
}

#[cfg(windows)]
fn run(config: &CollectorConfig, volumes: &[String]) -> Result<()> {
    use storage_sys::{ShellProbeFactory, VolumeResolver};

    let collector = LogicalDiskCollector::build(config, VolumeResolver::new(), ShellProbeFactory)?;
    let output = scrape(&collector, volumes);
    collector.close();

    print!("{}", output?);
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: &CollectorConfig, _volumes: &[String]) -> Result<()> {
    anyhow::bail!(storage_sys::SysError::NotSupported(
        "logical disk collection requires Windows".to_string()
    ))
}

/// Collect `volumes`, or every mounted volume when none are given.
fn scrape<A: VolumeApi>(collector: &LogicalDiskCollector<A>, volumes: &[String]) -> Result<String> {
    Ok(collector.collect(volumes)?.render()?)
}

#[cfg(test)]
mod tests {
    use storage_sys::VolumeResolver;
    use storage_sys::volume::RawVolumeInformation;
    use storage_sys::volume::testing::FakeVolumeApi;
    use storage_sys::{EncryptionProbe, ProbeFactory};

    use super::*;

    struct NoProbe;

    impl ProbeFactory for NoProbe {
        type Probe = NoProbe;

        fn bind(&self) -> storage_sys::Result<NoProbe> {
            Ok(NoProbe)
        }
    }

    impl EncryptionProbe for NoProbe {
        fn protection_status(&mut self, _volume_path: &str) -> storage_sys::Result<i32> {
            Ok(0)
        }
    }

    #[test]
    fn parses_repeated_volumes_and_sub_collector_list() {
        let args = Args::try_parse_from([
            "logical-disk-collector",
            "--enabled",
            "metrics,bitlocker_status",
            "--volume",
            "C:",
            "--volume",
            "D:",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.volumes, vec!["C:".to_string(), "D:".to_string()]);

        let config = CollectorConfig::default().with_overrides(args.overrides());
        assert_eq!(
            config.enabled,
            vec!["metrics".to_string(), "bitlocker_status".to_string()]
        );
        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert_eq!(config.volume_include, ".+");
    }

    #[test]
    fn scrape_defaults_to_every_mounted_volume() {
        let api = FakeVolumeApi::new()
            .with_volume(r"\\?\Volume{aaaa}\", &[r"C:\", r"C:\mnt\data\"])
            .with_device(r"\\.\Volume{aaaa}", &[0])
            .with_drive_type(r"\\?\Volume{aaaa}\", 3)
            .with_information(
                r"\\?\Volume{aaaa}\",
                Ok(RawVolumeInformation {
                    label: "Windows".to_string(),
                    filesystem: "NTFS".to_string(),
                    serial_number: 0xC0FFEE,
                    flags: 0,
                }),
            );
        let collector = LogicalDiskCollector::build(
            &CollectorConfig::default(),
            VolumeResolver::with_api(api),
            NoProbe,
        )
        .unwrap();

        let output = scrape(&collector, &[]).unwrap();

        assert!(output.contains("# TYPE windows_logical_disk_info gauge\n"));
        assert!(output.contains(
            "windows_logical_disk_info{disk=\"0\",filesystem=\"NTFS\",serial_number=\"C0FFEE\",type=\"fixed\",volume=\"C:\",volume_name=\"Windows\"} 1\n"
        ));
        assert!(output.contains("volume=\"C:\\\\mnt\\\\data\""));
        assert!(output.contains("windows_logical_disk_readonly{volume=\"C:\"} 0\n"));
        assert!(!output.contains("bitlocker"));
        collector.close();
    }
}
