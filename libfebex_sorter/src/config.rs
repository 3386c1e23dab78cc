use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::ebis::EbisParameters;
use super::error::ConfigError;
use super::ordering::SortStrategy;
use super::timestamp::{Thresholds, TimestampLayout};

/// Structure representing the application configuration. Contains pathing, run
/// information, and the engine parameters (timestamp layout, anomaly
/// thresholds, EBIS gate, sort strategy).
/// Configs are serializable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_path: PathBuf,
    pub hdf_path: PathBuf,
    pub calibration_path: Option<PathBuf>,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_workers: i32,
    pub sort_strategy: SortStrategy,
    pub ebis_only: bool,
    pub write_traces: bool,
    pub ebis: EbisParameters,
    pub timestamp_layout: TimestampLayout,
    pub thresholds: Thresholds,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid; engine
    /// parameters take their hardware defaults
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            hdf_path: PathBuf::from("None"),
            calibration_path: None,
            first_run_number: 0,
            last_run_number: 0,
            n_workers: 1,
            sort_strategy: SortStrategy::default(),
            ebis_only: false,
            write_traces: true,
            ebis: EbisParameters::default(),
            timestamp_layout: TimestampLayout::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check every fatal configuration class before any data is read.
    ///
    /// Per-event anomalies never abort a run, so this is the only place a
    /// bad parameter can stop processing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timestamp_layout.validate()?;
        self.thresholds.validate()?;
        self.ebis.validate()?;
        if self.n_workers < 1 {
            return Err(ConfigError::InvalidWorkerCount(self.n_workers));
        }
        if self.first_run_number > self.last_run_number {
            return Err(ConfigError::InvalidRunRange(
                self.first_run_number,
                self.last_run_number,
            ));
        }
        Ok(())
    }

    /// Check if a specific run exists by evaluating the existence of its
    /// run directory
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.data_path.join(self.get_run_str(run_number)).exists()
    }

    /// Get the path to the segment files of a run
    pub fn get_run_directory(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let run_dir: PathBuf = self.data_path.join(self.get_run_str(run_number));
        if run_dir.exists() {
            Ok(run_dir)
        } else {
            Err(ConfigError::BadFilePath(run_dir))
        }
    }

    /// Get the path to the output hdf5 file
    pub fn get_hdf_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let hdf_file_path: PathBuf = self
            .hdf_path
            .join(format!("{}.h5", self.get_run_str(run_number)));
        if self.hdf_path.exists() {
            Ok(hdf_file_path)
        } else {
            Err(ConfigError::BadFilePath(self.hdf_path.clone()))
        }
    }

    /// Construct the run string using the FEBEX DAQ format
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("sort_strategy: map"));
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.n_workers, 1);
        assert_eq!(config.sort_strategy, SortStrategy::Map);
        assert_eq!(config.timestamp_layout.lsb_bits, 28);
        assert_eq!(config.ebis.window, 4_000_000);
    }

    #[test]
    fn test_worker_count_must_be_positive() {
        let config = Config {
            n_workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_run_range_must_be_ordered() {
        let config = Config {
            first_run_number: 10,
            last_run_number: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRunRange(10, 2))
        ));
    }

    #[test]
    fn test_engine_parameters_are_checked() {
        let mut config = Config::default();
        config.timestamp_layout.lsb_bits = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LayoutZeroLsb)
        ));

        let mut config = Config::default();
        config.thresholds.warp_tolerance = config.thresholds.jump_threshold;
        assert!(config.validate().is_err());
    }
}
