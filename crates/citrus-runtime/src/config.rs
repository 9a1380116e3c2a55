//! Framework configuration read from `citrus.toml`.

use core::time::Duration;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use citrus_core::settings::{DEFAULT_ASYNC_WAIT_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT, YAML_TEST_FILE_EXTENSIONS};
use citrus_core::{Error, MessageDirection, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "citrus.toml";
/// Overrides the report directory.
pub const REPORT_DIR_ENV: &str = "CITRUS_REPORT_DIR";
/// Overrides the receive timeout in milliseconds.
pub const RECEIVE_TIMEOUT_ENV: &str = "CITRUS_RECEIVE_TIMEOUT";

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitrusConfig {
    /// Runtime settings
    pub citrus: CitrusSettings,
    /// Global variables copied into every test context
    pub variables: IndexMap<String, String>,
    /// JSONPath data dictionaries by name
    pub dictionaries: IndexMap<String, DictionaryConfig>,
}

/// A JSONPath data dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// `inbound`, `outbound` or `unbound`
    pub direction: MessageDirection,
    /// Apply to every message of the direction, not only to actions naming it
    pub global: bool,
    /// JSONPath expression to replacement value
    pub mappings: IndexMap<String, String>,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            direction: MessageDirection::Unbound,
            global: true,
            mappings: IndexMap::new(),
        }
    }
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Configuration struct with one flag per reporter"
)]
pub struct CitrusSettings {
    /// Receive timeout of endpoints without their own timeout
    pub receive_timeout_ms: u64,
    /// Time a test waits for its async actions
    pub test_timeout_ms: u64,
    /// Directory reporters write into
    pub report_dir: PathBuf,
    /// Log a summary through tracing
    pub logging_reporter: bool,
    /// Write `citrus-results.json`
    pub json_reporter: bool,
    /// Write one action flow file per test
    pub flow_reporter: bool,
    /// Strict JSON validation for YAML receive actions
    pub json_strict: bool,
    /// File extensions picked up as YAML tests
    pub test_file_extensions: Vec<String>,
}

impl Default for CitrusSettings {
    fn default() -> Self {
        Self {
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
            test_timeout_ms: DEFAULT_ASYNC_WAIT_TIMEOUT.as_millis() as u64,
            report_dir: PathBuf::from("target/citrus-reports"),
            logging_reporter: true,
            json_reporter: true,
            flow_reporter: false,
            json_strict: true,
            test_file_extensions: YAML_TEST_FILE_EXTENSIONS
                .iter()
                .map(|extension| (*extension).to_owned())
                .collect(),
        }
    }
}

impl CitrusSettings {
    /// Receive timeout as a duration.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Async wait timeout as a duration.
    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }
}

impl CitrusConfig {
    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config {}: {error}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|error| Error::Config(format!("Failed to parse config {}: {error}", path.display())))?;

        debug!(
            "Loaded config from {:?}: report_dir={:?}, {} global variables, {} data dictionaries",
            path,
            config.citrus.report_dir,
            config.variables.len(),
            config.dictionaries.len()
        );
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise the defaults.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Renders the config with a header comment.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized
    pub fn to_toml(&self) -> Result<String> {
        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Citrus Configuration File\n\
                      # Environment variables CITRUS_REPORT_DIR and CITRUS_RECEIVE_TIMEOUT\n\
                      # override the matching settings\n\n";
        Ok(format!("{header}{contents}"))
    }

    /// Applies `CITRUS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Applies overrides looked up through `lookup`. Unparsable timeouts are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(REPORT_DIR_ENV) {
            self.citrus.report_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup(RECEIVE_TIMEOUT_ENV) {
            match timeout.trim().parse() {
                Ok(millis) => self.citrus.receive_timeout_ms = millis,
                Err(error) => warn!("Ignoring {RECEIVE_TIMEOUT_ENV}={timeout}: {error}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = CitrusConfig::default();
        assert_eq!(config.citrus.receive_timeout(), Duration::from_secs(5));
        assert_eq!(config.citrus.test_timeout(), Duration::from_secs(10));
        assert!(config.citrus.json_strict);
        assert!(!config.citrus.flow_reporter);
        assert_eq!(config.citrus.test_file_extensions, ["yaml", "yml"]);
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "[citrus]\nreceive_timeout_ms = 250\nflow_reporter = true\n\n[variables]\nenv = \"staging\"\n",
        )
        .unwrap();

        let config = CitrusConfig::load_from_file(&path).unwrap();
        assert_eq!(config.citrus.receive_timeout_ms, 250);
        assert!(config.citrus.flow_reporter);
        assert!(config.citrus.json_reporter);
        assert_eq!(config.variables["env"], "staging");
    }

    #[test]
    fn test_dictionaries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "[dictionaries.orders]\ndirection = \"outbound\"\n\n[dictionaries.orders.mappings]\n\"$.order.id\" = \"42\"\n\n[dictionaries.ids]\nglobal = false\n",
        )
        .unwrap();

        let config = CitrusConfig::load_from_file(&path).unwrap();
        let orders = &config.dictionaries["orders"];
        assert_eq!(orders.direction, MessageDirection::Outbound);
        assert!(orders.global);
        assert_eq!(orders.mappings["$.order.id"], "42");
        let ids = &config.dictionaries["ids"];
        assert_eq!(ids.direction, MessageDirection::Unbound);
        assert!(!ids.global);

        config.save_to_file(&path).unwrap();
        assert_eq!(CitrusConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = CitrusConfig::default();
        config.variables.insert("user".to_owned(), "citrus".to_owned());
        config.save_to_file(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Citrus Configuration File"));
        assert_eq!(CitrusConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[citrus\n").unwrap();
        let error = CitrusConfig::load_from_file(&path).unwrap_err();
        assert_eq!(error.kind(), "ConfigError");

        let missing = CitrusConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(missing, CitrusConfig::default());
    }

    #[test]
    fn test_overrides() {
        let mut config = CitrusConfig::default();
        config.apply_overrides_from(|key| match key {
            REPORT_DIR_ENV => Some("out".to_owned()),
            RECEIVE_TIMEOUT_ENV => Some("1500".to_owned()),
            _ => None,
        });
        assert_eq!(config.citrus.report_dir, PathBuf::from("out"));
        assert_eq!(config.citrus.receive_timeout_ms, 1500);

        config.apply_overrides_from(|key| (key == RECEIVE_TIMEOUT_ENV).then(|| "soon".to_owned()));
        assert_eq!(config.citrus.receive_timeout_ms, 1500);
    }
}
