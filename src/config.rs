//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::tracker::{AssociationThresholds, FailurePolicy, LabelPalette};

/// Settings for a [`Controller`](crate::Controller).
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// detection_stride = 2
/// failure_policy = "any_lost"
///
/// [thresholds]
/// duplicate_iou = 0.6
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Run the detector on frames whose index is a multiple of this.
    pub detection_stride: u64,
    pub thresholds: AssociationThresholds,
    pub failure_policy: FailurePolicy,
    pub palette: LabelPalette,
    /// Pending recognition older than this is reported as overdue. It is
    /// never aborted.
    #[serde(with = "millis")]
    pub recognition_deadline: Duration,
    /// Recognition threads; superseded tasks keep a thread busy until
    /// they finish.
    pub recognition_workers: usize,
    /// Per-frame processing budget used for pacing the display.
    #[serde(with = "millis")]
    pub frame_budget: Duration,
    /// Seed for display colors; entropy when absent.
    pub color_seed: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            detection_stride: 4,
            thresholds: AssociationThresholds::default(),
            failure_policy: FailurePolicy::default(),
            palette: LabelPalette::default(),
            recognition_deadline: Duration::from_secs(1),
            recognition_workers: 8,
            frame_budget: Duration::from_millis(28),
            color_seed: None,
        }
    }
}

impl ControllerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detection_stride == 0 {
            return Err(Error::Config(
                "detection_stride must be at least 1".to_string(),
            ));
        }

        let AssociationThresholds {
            duplicate_iou,
            new_iou,
        } = self.thresholds;
        if !(0.0..=1.0).contains(&duplicate_iou) || !(0.0..=1.0).contains(&new_iou) {
            return Err(Error::Config(format!(
                "IoU thresholds must lie in [0, 1], got duplicate={duplicate_iou} new={new_iou}"
            )));
        }
        if new_iou > duplicate_iou {
            return Err(Error::Config(format!(
                "new_iou ({new_iou}) must not exceed duplicate_iou ({duplicate_iou})"
            )));
        }

        if self.recognition_workers == 0 {
            return Err(Error::Config(
                "recognition_workers must be at least 1".to_string(),
            ));
        }

        if self.frame_budget.is_zero() {
            return Err(Error::Config("frame_budget must be non-zero".to_string()));
        }

        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection_stride, 4);
        assert_eq!(config.failure_policy, FailurePolicy::AllLost);
        assert_eq!(config.recognition_workers, 8);
    }

    #[test]
    fn test_partial_toml() {
        let config = ControllerConfig::from_toml_str(
            r#"
            detection_stride = 2
            failure_policy = "any_lost"
            recognition_deadline = 500
            recognition_workers = 2
            color_seed = 42

            [thresholds]
            duplicate_iou = 0.6

            [palette.known]
            r = 0
            g = 0
            b = 255
            "#,
        )
        .unwrap();

        assert_eq!(config.detection_stride, 2);
        assert_eq!(config.failure_policy, FailurePolicy::AnyLost);
        assert_eq!(config.recognition_deadline, Duration::from_millis(500));
        assert_eq!(config.recognition_workers, 2);
        assert_eq!(config.color_seed, Some(42));
        assert_eq!(config.thresholds.duplicate_iou, 0.6);
        assert_eq!(config.thresholds.new_iou, 0.2);
        assert_eq!(config.palette.known.b, 255);
        assert_eq!(config.frame_budget, Duration::from_millis(28));
    }

    #[test]
    fn test_zero_stride_rejected() {
        let err = ControllerConfig::from_toml_str("detection_stride = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ControllerConfig::from_toml_str("recognition_workers = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = ControllerConfig {
            thresholds: AssociationThresholds {
                duplicate_iou: 0.2,
                new_iou: 0.5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = ControllerConfig::from_toml_str("detection_stride = \"often\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ControllerConfig::from_file("/nonexistent/facetrack.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigIo { .. }));
    }
}
