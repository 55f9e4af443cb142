//! Engine configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `SKIRMISH_*` environment variables.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::SessionSetup;
use crate::grid::DistanceMetric;

/// Prefix for environment overrides, e.g. `SKIRMISH_GRID_WIDTH=30`
pub const ENV_PREFIX: &str = "SKIRMISH_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grid size for sessions that don't ask for one
    pub grid_width: i32,
    pub grid_height: i32,
    pub distance_metric: DistanceMetric,
    /// Sessions untouched this long are evicted
    pub idle_timeout_secs: u64,
    /// How often the idle sweeper runs
    pub sweep_interval_secs: u64,
    /// Fixed dice seed; sessions use OS entropy when unset
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 15,
            distance_metric: DistanceMetric::Chebyshev,
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
            seed: None,
        }
    }
}

impl Config {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path, ENV_PREFIX).extract()
    }

    pub fn figment(path: Option<&Path>, env_prefix: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(env_prefix))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Session defaults derived from this config
    pub fn session_setup(&self) -> SessionSetup {
        SessionSetup {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            distance_metric: self.distance_metric,
            terrain: Vec::new(),
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = Config::figment(None, "SKIRMISH_TEST_UNSET_").extract().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "grid_width = 30").unwrap();
        writeln!(file, "distance_metric = \"manhattan\"").unwrap();
        writeln!(file, "seed = 7").unwrap();

        let config: Config = Config::figment(Some(file.path()), "SKIRMISH_TEST_UNSET_")
            .extract()
            .unwrap();
        assert_eq!(config.grid_width, 30);
        assert_eq!(config.grid_height, 15);
        assert_eq!(config.distance_metric, DistanceMetric::Manhattan);
        assert_eq!(config.seed, Some(7));

        let setup = config.session_setup();
        assert_eq!(setup.grid_width, 30);
        assert_eq!(setup.seed, Some(7));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "grid_height = 40").unwrap();
        std::env::set_var("SKIRMISH_TEST_ENV_GRID_HEIGHT", "12");

        let config: Config = Config::figment(Some(file.path()), "SKIRMISH_TEST_ENV_")
            .extract()
            .unwrap();
        assert_eq!(config.grid_height, 12);
        std::env::remove_var("SKIRMISH_TEST_ENV_GRID_HEIGHT");
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config: Config = Config::figment(Some(&path), "SKIRMISH_TEST_UNSET_")
            .extract()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let config = Config {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
