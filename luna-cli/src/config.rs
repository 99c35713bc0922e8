//! Layered configuration for `luna-cli`: a bundled TOML default, an
//! optional user file, then environment overrides, matching the
//! `config::ConfigBuilder` pattern `libsurfer::config` uses for its own
//! settings (builder + `Environment` + `File`, minus the theme/keybinding/
//! GUI-specific parts that don't apply to a non-GUI frontend).
//!
//! `luna-core` itself never reads this: commands deserialize a
//! `LunaCliConfig` here and pass plain value structs (`CutParams`,
//! `CycleParams`, ...) into the library, matching section 9's "global
//! mutable state ... modeled as an explicit context passed through command
//! execution".

use color_eyre::eyre::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use luna_core::hypnogram::cycles::CycleParams;
use luna_core::hypnogram::edits::CutParams;

const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypnogramN2Defaults {
    pub window_epochs: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypnogramDefaults {
    pub epoch_sec: f64,
    pub persistent_sleep_min: f64,
    pub cut: CutParams,
    pub cycles: CycleParams,
    pub n2: HypnogramN2Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LunaCliConfig {
    pub hypnogram: HypnogramDefaults,
}

impl LunaCliConfig {
    /// Load the bundled default, then `./luna.toml` if present, then
    /// `LUNA_*` environment overrides (e.g. `LUNA_HYPNOGRAM_EPOCH_SEC=30`).
    pub fn load(user_config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        } else {
            builder = builder.add_source(File::with_name("luna.toml").required(false));
        }

        builder = builder.add_source(Environment::with_prefix("luna").separator("_"));

        builder.build().context("failed to build configuration")?.try_deserialize().context("failed to parse configuration")
    }
}

impl Default for LunaCliConfig {
    fn default() -> Self {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .expect("bundled default_config.toml must parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_parses() {
        let cfg = LunaCliConfig::default();
        assert_eq!(cfg.hypnogram.epoch_sec, 30.0);
        assert_eq!(cfg.hypnogram.cut.gap_epochs, 10);
    }

    #[test]
    fn missing_user_file_is_an_error() {
        let err = LunaCliConfig::load(Some("/nonexistent/luna.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("configuration"));
    }
}
