use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result, bail};
use tracing::{info, warn};

use citrus_runtime::{Citrus, CitrusConfig, TestCase, YamlLoader};

/// Loads the config file when present and applies environment overrides.
fn load_config(path: &Path) -> Result<CitrusConfig> {
    let mut config = CitrusConfig::load_or_default(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}

fn load_tests(loader: &YamlLoader, paths: &[PathBuf]) -> Result<Vec<TestCase>> {
    let mut tests = Vec::new();
    for path in paths {
        if !path.exists() {
            warn!("Test path {} does not exist", path.display());
            continue;
        }
        tests.extend(loader.load_all(path)?);
    }
    Ok(tests)
}

/// Runs every test found under `paths`. Exit code 1 when a test fails.
pub async fn handle_run(
    paths: &[PathBuf],
    config_path: &Path,
    report_dir: Option<PathBuf>,
    variables: Vec<(String, String)>,
    groups: Vec<String>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = report_dir {
        config.citrus.report_dir = dir;
    }
    config.variables.extend(variables);

    let citrus = Citrus::new(config).with_groups(groups);
    let tests = load_tests(citrus.loader(), paths)?;
    if tests.is_empty() {
        bail!("No tests found");
    }

    let results = citrus.run_suite(&tests).await;
    info!(
        "{} passed, {} failed, {} skipped",
        results.success_count(),
        results.failed_count(),
        results.skipped_count()
    );

    if results.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        for name in results.failed_names() {
            warn!("Failed: {name}");
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Logs the tests found under `paths` with the loader settings of the config.
pub fn handle_list(paths: &[PathBuf], config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let tests = load_tests(&YamlLoader::from_settings(&config.citrus), paths)?;
    for test in &tests {
        let groups = if test.groups().is_empty() {
            String::new()
        } else {
            format!(" [{}]", test.groups().join(", "))
        };
        info!(
            "{} ({}){groups} {}",
            test.name(),
            test.status(),
            test.source()
                .map_or_else(String::new, |source| source.display().to_string())
        );
    }
    info!("Total tests: {}", tests.len());
    Ok(())
}

/// Logs the effective configuration as TOML.
pub fn handle_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    info!("Configuration:\n{}", config.to_toml()?);
    Ok(())
}
