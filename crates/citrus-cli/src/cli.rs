use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "citrus")]
#[command(about = "Runs Citrus YAML integration tests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run YAML tests from files or directories")]
    Run {
        #[arg(required = true, help = "Test files or directories to search")]
        paths: Vec<PathBuf>,

        #[arg(short, long, default_value = "citrus.toml", help = "Configuration file")]
        config: PathBuf,

        #[arg(long, help = "Directory for generated reports (overrides config)")]
        report_dir: Option<PathBuf>,

        #[arg(long = "var", value_parser = parse_variable, help = "Global variable as name=value")]
        variables: Vec<(String, String)>,

        #[arg(short, long = "group", help = "Only run tests in this group")]
        groups: Vec<String>,
    },

    #[command(about = "List YAML tests without running them")]
    List {
        #[arg(required = true, help = "Test files or directories to search")]
        paths: Vec<PathBuf>,

        #[arg(short, long, default_value = "citrus.toml", help = "Configuration file")]
        config: PathBuf,
    },

    #[command(about = "Show configuration")]
    Config {
        #[arg(short, long, default_value = "citrus.toml", help = "Configuration file")]
        config: PathBuf,
    },
}

/// Splits `name=value` at the first `=`.
pub fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_owned(), value.to_owned()))
}
