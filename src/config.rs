//! Configuration of a conversion run, loadable from and savable to JSON.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WranglingError;
use crate::session::{self, SessionLayout};
use crate::split::SplitRatios;

/// The default glob pattern of session files.
pub const DEFAULT_SESSION_PATTERN: &str = "E*.mat";
/// The default index of the session among the sorted session files.
pub const DEFAULT_SESSION_INDEX: usize = 14;
/// The default name of the output file.
pub const DEFAULT_OUTPUT_FILE: &str = "cut_full_setup_lfads_testProject2_wrang.h5";

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the session files.
    pub data_dir: PathBuf,
    /// Glob pattern of the session files within `data_dir`.
    pub session_pattern: String,
    /// Index of the session among the matching files, sorted by name.
    pub session_index: usize,
    /// Explicit session file; takes precedence over pattern and index.
    pub session_file: Option<PathBuf>,
    /// Cell-analysis annotation file, relative to `data_dir` unless absolute.
    pub cell_analysis_file: Option<PathBuf>,
    pub layout: SessionLayout,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub ratios: SplitRatios,
    /// Seed of the split; a random one is drawn (and recorded) when unset.
    pub seed: Option<u64>,
    /// Whether to also write the test subset.
    pub persist_test: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            session_pattern: DEFAULT_SESSION_PATTERN.to_string(),
            session_index: DEFAULT_SESSION_INDEX,
            session_file: None,
            cell_analysis_file: None,
            layout: SessionLayout::default(),
            output_dir: PathBuf::from("."),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            ratios: SplitRatios::default(),
            seed: None,
            persist_test: false,
        }
    }
}

impl Config {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Config, WranglingError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| WranglingError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| WranglingError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), WranglingError> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| WranglingError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| WranglingError::ConfigError(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Check the parameters that do not depend on the file system.
    pub fn validate(&self) -> Result<(), WranglingError> {
        self.ratios.validate()?;
        if self.output_file.is_empty() {
            return Err(WranglingError::InvalidParameter(
                "output file name is empty".to_string(),
            ));
        }
        if self.session_file.is_none() && self.session_pattern.is_empty() {
            return Err(WranglingError::InvalidParameter(
                "either a session file or a session pattern is required".to_string(),
            ));
        }
        if self.layout.cell_data_variable.is_empty() || self.layout.good_trials_variable.is_empty()
        {
            return Err(WranglingError::InvalidParameter(
                "session variable names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the session file: the explicit one, or the indexed match of the pattern.
    pub fn session_path(&self) -> Result<PathBuf, WranglingError> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }
        let files = session::discover(&self.data_dir, &self.session_pattern)?;
        log::debug!("Found {} session files", files.len());
        session::select(&files, self.session_index)
    }

    pub fn cell_analysis_path(&self) -> Option<PathBuf> {
        self.cell_analysis_file
            .as_ref()
            .map(|file| self.data_dir.join(file))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_index, 14);
        assert_eq!(
            config.output_path(),
            Path::new(".").join("cut_full_setup_lfads_testProject2_wrang.h5")
        );
        assert_eq!(config.cell_analysis_path(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config {
            seed: Some(42),
            cell_analysis_file: Some(PathBuf::from("E221212c_cellana.mat")),
            persist_test: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"session_index": 3, "layout": {"spike_field": "spikes"}}"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session_index, 3);
        assert_eq!(config.layout.spike_field.as_deref(), Some("spikes"));
        assert_eq!(config.layout.cell_data_variable, "cellData");
        assert_eq!(config.ratios, SplitRatios::default());

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(WranglingError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate() {
        let config = Config {
            ratios: SplitRatios {
                train: 0.9,
                valid: 0.2,
                test: 0.0,
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WranglingError::InvalidParameter(_))
        ));

        let config = Config {
            output_file: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cell_analysis_path() {
        let config = Config {
            data_dir: PathBuf::from("/data"),
            cell_analysis_file: Some(PathBuf::from("E221212c_cellana.mat")),
            ..Config::default()
        };
        assert_eq!(
            config.cell_analysis_path(),
            Some(PathBuf::from("/data/E221212c_cellana.mat"))
        );
    }
}
