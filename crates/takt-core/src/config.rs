use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level core configuration, loaded from `takt.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
    #[serde(default)]
    pub batch: BatchFormat,
}

/// Policy for when a production entry needs explicit operator confirmation.
///
/// The thresholds are deliberately configuration, not business law: plants
/// differ on what counts as a suspiciously large entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// Entries consuming strictly more than this share of the remaining
    /// quantity require confirmation. `0.5` means "more than half".
    #[serde(default = "default_confirmation_ratio")]
    pub ratio: f64,
    /// Optional absolute trigger: entries totalling at least this many
    /// units require confirmation regardless of the ratio.
    #[serde(default)]
    pub min_qty: Option<i64>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            ratio: default_confirmation_ratio(),
            min_qty: None,
        }
    }
}

/// Shape of issued batch numbers: `{prefix}-{YYYYMMDD}-{zero-padded seq}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFormat {
    #[serde(default = "default_batch_prefix")]
    pub prefix: String,
    /// Zero-pad width of the sequence part; also bounds the per-day
    /// sequence space at `10^pad_width - 1`.
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
}

impl Default for BatchFormat {
    fn default() -> Self {
        Self {
            prefix: default_batch_prefix(),
            pad_width: default_pad_width(),
        }
    }
}

impl BatchFormat {
    /// Highest sequence value this format can render without widening.
    #[must_use]
    pub fn max_sequence(&self) -> u32 {
        10_u32
            .checked_pow(u32::try_from(self.pad_width).unwrap_or(9))
            .map_or(u32::MAX, |bound| bound - 1)
    }
}

fn default_confirmation_ratio() -> f64 {
    0.5
}

fn default_batch_prefix() -> String {
    "LOT".to_string()
}

fn default_pad_width() -> usize {
    4
}

impl CoreConfig {
    /// Check configured values are usable before wiring them into the core.
    ///
    /// # Errors
    ///
    /// Returns an error when the confirmation ratio is outside `(0, 1]`,
    /// the batch prefix is empty, or the pad width is outside `1..=9`.
    pub fn validate(&self) -> Result<()> {
        if !(self.confirmation.ratio > 0.0 && self.confirmation.ratio <= 1.0) {
            bail!(
                "confirmation.ratio must be in (0, 1], got {}",
                self.confirmation.ratio
            );
        }
        if let Some(min_qty) = self.confirmation.min_qty {
            if min_qty < 0 {
                bail!("confirmation.min_qty must be non-negative, got {min_qty}");
            }
        }
        if self.batch.prefix.trim().is_empty() {
            bail!("batch.prefix must not be empty");
        }
        if !(1..=9).contains(&self.batch.pad_width) {
            bail!("batch.pad_width must be in 1..=9, got {}", self.batch.pad_width);
        }
        Ok(())
    }
}

/// Load the core config from `<root>/takt.toml`.
///
/// A missing file yields defaults; a present-but-broken file is an error
/// (silent fallback would hide typos in policy values).
pub fn load_config(root: &Path) -> Result<CoreConfig> {
    let path = root.join("takt.toml");
    if !path.exists() {
        return Ok(CoreConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<CoreConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().expect("default config validates");
        assert!((config.confirmation.ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.batch.prefix, "LOT");
        assert_eq!(config.batch.pad_width, 4);
        assert_eq!(config.batch.max_sequence(), 9_999);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = load_config(dir.path()).expect("load defaults");
        assert_eq!(config.batch.prefix, "LOT");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            dir.path().join("takt.toml"),
            "[confirmation]\nratio = 0.75\n",
        )
        .expect("write config");

        let config = load_config(dir.path()).expect("load config");
        assert!((config.confirmation.ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.confirmation.min_qty, None);
        assert_eq!(config.batch.pad_width, 4);
    }

    #[test]
    fn broken_toml_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("takt.toml"), "confirmation = [[[").expect("write config");

        let err = load_config(dir.path()).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn out_of_range_ratio_is_rejected() {
        let mut config = CoreConfig::default();
        config.confirmation.ratio = 1.5;
        assert!(config.validate().is_err());

        config.confirmation.ratio = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn pad_width_bounds_are_enforced() {
        let mut config = CoreConfig::default();
        config.batch.pad_width = 0;
        assert!(config.validate().is_err());

        config.batch.pad_width = 10;
        assert!(config.validate().is_err());

        config.batch.pad_width = 9;
        config.validate().expect("width 9 validates");
        assert_eq!(config.batch.max_sequence(), 999_999_999);
    }
}
