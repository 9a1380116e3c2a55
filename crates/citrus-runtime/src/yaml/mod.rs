//! Loading tests from YAML files.

/// Conversion of the model into actions.
mod builder;
/// Serde model of the file format.
pub mod model;

use std::fs;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use serde_yaml::Error as YamlError;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use citrus_core::settings::YAML_TEST_FILE_EXTENSIONS;

use crate::config::CitrusSettings;
use crate::test_case::TestCase;
use crate::yaml::builder::TestBuilder;
use crate::yaml::model::YamlTest;

/// Errors raised while loading YAML tests.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file or directory could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Cause.
        source: IoError,
    },
    /// The text is not a valid test document.
    #[error("Failed to parse YAML test '{origin}': {source}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Cause.
        source: YamlError,
    },
    /// The document parsed but describes an invalid test.
    #[error("Invalid YAML test '{origin}': {message}")]
    Invalid {
        /// File path or `<inline>`.
        origin: String,
        /// What is wrong.
        message: String,
    },
}

/// Loads YAML tests with shared settings.
#[derive(Debug, Clone)]
pub struct YamlLoader {
    json_strict: bool,
    extensions: Vec<String>,
}

impl Default for YamlLoader {
    fn default() -> Self {
        Self {
            json_strict: true,
            extensions: YAML_TEST_FILE_EXTENSIONS
                .iter()
                .map(|extension| (*extension).to_owned())
                .collect(),
        }
    }
}

impl YamlLoader {
    /// Loader with strict JSON validation and the default file extensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader using the strict mode and file extensions of `settings`.
    pub fn from_settings(settings: &CitrusSettings) -> Self {
        Self::new()
            .with_json_strict(settings.json_strict)
            .with_extensions(settings.test_file_extensions.clone())
    }

    /// Sets the JSON strict mode of every receive action.
    #[must_use]
    pub fn with_json_strict(mut self, json_strict: bool) -> Self {
        self.json_strict = json_strict;
        self
    }

    /// Sets the file extensions recognised as tests.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Parses a test from text. `origin` names the source in errors.
    ///
    /// # Errors
    /// Returns an error if the text is not a valid test.
    pub fn load_str(&self, text: &str, origin: &str) -> Result<TestCase, LoadError> {
        let model: YamlTest = serde_yaml::from_str(text).map_err(|source| LoadError::Parse {
            origin: origin.to_owned(),
            source,
        })?;
        TestBuilder::new(origin, self.json_strict).build(model)
    }

    /// Reads and parses a test file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid test.
    pub fn load_file(&self, path: &Path) -> Result<TestCase, LoadError> {
        debug!("Loading YAML test {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self
            .load_str(&text, &path.display().to_string())?
            .with_source(path))
    }

    /// Test files under `path`, recursively and sorted. A file path is
    /// returned as is; a missing path yields nothing.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be read.
    pub fn discover(&self, path: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut tests = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|error| LoadError::Io {
                path: error.path().unwrap_or(path).to_path_buf(),
                source: error.into(),
            })?;
            if entry.file_type().is_file() && self.is_test_file(entry.path()) {
                tests.push(entry.into_path());
            }
        }
        tests.sort();
        Ok(tests)
    }

    /// Loads every test found under `path`.
    ///
    /// # Errors
    /// Returns the first load error.
    pub fn load_all(&self, path: &Path) -> Result<Vec<TestCase>, LoadError> {
        self.discover(path)?
            .iter()
            .map(|file| self.load_file(file))
            .collect()
    }

    fn is_test_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                self.extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(extension))
            })
    }
}

/// Loads a test file with default settings.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid test.
pub fn load_test(path: &Path) -> Result<TestCase, LoadError> {
    YamlLoader::default().load_file(path)
}

/// Parses a test with default settings.
///
/// # Errors
/// Returns an error if the text is not a valid test.
pub fn load_test_str(text: &str) -> Result<TestCase, LoadError> {
    YamlLoader::default().load_str(text, "<inline>")
}

/// YAML test files under `dir`, sorted.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn discover_tests(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    YamlLoader::default().discover(dir)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::test_case::TestStatus;

    use super::*;

    const FULL_TEST: &str = r#"
name: order-test
package: shop
author: Christoph
status: DRAFT
description: Sends and receives an order
groups: [smoke]
variables:
  - name: orderId
    value: 42
endpoints:
  - direct:
      name: orders
templates:
  - name: greet
    parameters:
      - name: user
        value: nobody
    actions:
      - echo:
          message: "Hello ${user}"
actions:
  - send:
      endpoint: orders
      message:
        body:
          data: '{"id": ${orderId}}'
  - receive:
      endpoint: orders
      timeout: 500
      ignore:
        - path: $.created
      validate:
        - jsonPath:
            - expression: $.id
              value: "${orderId}"
      message:
        body:
          data: '{"id": ${orderId}}'
  - applyTemplate:
      name: greet
      parameters:
        - name: user
          value: Citrus
finally:
  - echo:
      message: done
"#;

    #[test]
    fn test_load_full_test() {
        let test = load_test_str(FULL_TEST).unwrap();
        assert_eq!(test.name(), "order-test");
        assert_eq!(test.package(), "shop");
        assert_eq!(test.author(), Some("Christoph"));
        assert_eq!(test.status(), TestStatus::Draft);
        assert_eq!(test.groups(), ["smoke".to_owned()]);
        assert_eq!(test.variables()["orderId"], "42");
        assert_eq!(test.endpoints().len(), 1);
        assert_eq!(test.action_count(), 3);
        assert_eq!(test.actions()[2].name(), "template");
        assert_eq!(test.finally_actions().len(), 1);
    }

    #[test]
    fn test_unknown_template() {
        let error = load_test_str("name: t\nactions:\n  - applyTemplate:\n      name: missing\n")
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid YAML test '<inline>': Unknown template 'missing'"
        );
    }

    #[test]
    fn test_assert_needs_single_action() {
        let error = load_test_str(
            "name: t\nactions:\n  - assert:\n      when:\n        - echo: {}\n        - echo: {}\n",
        )
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(error, LoadError::Invalid { .. }));
    }

    #[test]
    fn test_parse_error_names_origin() {
        let error = YamlLoader::new().load_str("name: [", "broken.yaml").map(|_| ()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse YAML test 'broken.yaml'"));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.yaml"), "name: b\n").unwrap();
        fs::write(dir.path().join("nested/a.yml"), "name: a\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let found = discover_tests(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("b.yaml"), dir.path().join("nested/a.yml")]
        );

        let loaded = YamlLoader::new().load_all(dir.path()).unwrap();
        assert_eq!(loaded[1].name(), "a");
        assert_eq!(loaded[1].source(), Some(dir.path().join("nested/a.yml").as_path()));

        assert!(discover_tests(&dir.path().join("missing")).unwrap().is_empty());
    }
}
