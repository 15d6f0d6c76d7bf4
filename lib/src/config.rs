use std::path::Path;

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Largest `max` bound that fits in the bitmap representation of a
/// bounded repeat. The bitmap is a `u64` that must hold `max + 1` bits.
pub const MAX_BITMAP_LIMIT: u32 = 63;

/// Largest `max` bound that fits in the ring representation of a bounded
/// repeat. Ring positions are stored as `u16`.
pub const MAX_RING_LIMIT: u32 = u16::MAX as u32 - 1;

/// Tunable parameters used while building a [`crate::Program`].
///
/// None of these parameters change the matches reported by a scan, they
/// only affect the memory used by streams and the speed of the scan.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded repeat configuration.
    pub repeat: RepeatConfig,
}

/// Controls how bounded repeats are represented.
///
/// Repeats with a finite upper bound `max <= bitmap_limit` are tracked with
/// a bitmap, repeats with `bitmap_limit < max <= ring_limit` with a ring of
/// offsets, and the remaining ones (including unbounded repeats) with a
/// saturating counter.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RepeatConfig {
    /// Largest upper bound represented as a bitmap. At most
    /// [`MAX_BITMAP_LIMIT`].
    pub bitmap_limit: u32,
    /// Largest upper bound represented as a ring. At most
    /// [`MAX_RING_LIMIT`].
    pub ring_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { repeat: RepeatConfig::default() }
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self { bitmap_limit: MAX_BITMAP_LIMIT, ring_limit: 255 }
    }
}

impl EngineConfig {
    /// Returns a description of the first invalid setting, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.repeat.bitmap_limit > MAX_BITMAP_LIMIT {
            return Err(format!(
                "repeat.bitmap_limit is {}, but the maximum is {}",
                self.repeat.bitmap_limit, MAX_BITMAP_LIMIT
            ));
        }
        if self.repeat.ring_limit > MAX_RING_LIMIT {
            return Err(format!(
                "repeat.ring_limit is {}, but the maximum is {}",
                self.repeat.ring_limit, MAX_RING_LIMIT
            ));
        }
        Ok(())
    }
}

/// Load config file from a given path. Path must contain a valid TOML file or
/// this function will propagate the error. Settings missing in the file keep
/// their default values.
pub fn load_config_from_file(
    config_file: &Path,
) -> Result<EngineConfig, figment::Error> {
    let config: EngineConfig =
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file_exact(config_file))
            .extract()?;
    Ok(config)
}

/// Like [`load_config_from_file`], but the TOML document is passed as a
/// string.
pub fn load_config_from_str(
    config: &str,
) -> Result<EngineConfig, figment::Error> {
    let config: EngineConfig =
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::string(config))
            .extract()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_config() {
        let config = load_config_from_str(
            r#"
            [repeat]
            ring_limit = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.repeat.bitmap_limit, MAX_BITMAP_LIMIT);
        assert_eq!(config.repeat.ring_limit, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_config() {
        let config = load_config_from_str(
            r#"
            [repeat]
            bitmap_limit = 64
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
        assert!(load_config_from_str("[repeat]\nring_limit = -1").is_err());
    }
}
