// SPDX-License-Identifier: GPL-3.0-only

use regex::Regex;

use crate::error::{CollectorError, Result};

/// Include/exclude selection of volume names.
///
/// Both patterns must match the whole name. A volume is kept when it matches
/// the include pattern and does not match the exclude pattern.
#[derive(Debug, Clone)]
pub struct VolumeFilter {
    include: Regex,
    exclude: Regex,
}

impl VolumeFilter {
    pub fn new(include: &str, exclude: &str) -> Result<Self> {
        Ok(Self {
            include: anchored("include", include)?,
            exclude: anchored("exclude", exclude)?,
        })
    }

    pub fn matches(&self, volume: &str) -> bool {
        !self.exclude.is_match(volume) && self.include.is_match(volume)
    }
}

fn anchored(kind: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| CollectorError::InvalidPattern {
        kind,
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_keep_every_named_volume() {
        let filter = VolumeFilter::new(".+", "").unwrap();

        assert!(filter.matches("C:"));
        assert!(filter.matches("HarddiskVolume4"));
        assert!(!filter.matches(""));
    }

    #[test]
    fn patterns_match_whole_names() {
        let filter = VolumeFilter::new("C:|D:", "").unwrap();

        assert!(filter.matches("C:"));
        assert!(filter.matches("D:"));
        assert!(!filter.matches("DC:"));
        assert!(!filter.matches("C:\\mnt"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = VolumeFilter::new(".+", "HarddiskVolume.*").unwrap();

        assert!(filter.matches("E:"));
        assert!(!filter.matches("HarddiskVolume1"));
    }

    #[test]
    fn invalid_pattern_names_its_kind() {
        let error = VolumeFilter::new(".+", "(").unwrap_err();

        assert!(matches!(
            error,
            CollectorError::InvalidPattern {
                kind: "exclude",
                ..
            }
        ));
        assert!(error.to_string().contains("'('"));
    }
}
