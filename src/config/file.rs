//! TOML configuration file

use super::{SyncOptions, WatchMode};
use crate::mapper;
use crate::types::AssetError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One pattern or a list of patterns
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Patterns {
    fn into_vec(self) -> Vec<String> {
        match self {
            Patterns::One(pattern) => vec![pattern],
            Patterns::Many(patterns) => patterns,
        }
    }
}

/// Options read from a `--config` file
///
/// ```toml
/// patterns = ["**/*", "!**/*.tmp"]
/// input = "chat"
/// output = "../dist"
/// name = "chat"
/// version_from = "package.json"
/// watch = "copy-then-watch"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub patterns: Option<Patterns>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub version_from: Option<PathBuf>,
    #[serde(default)]
    pub keep: bool,
    #[serde(default)]
    pub hidden: bool,
    pub jobs: Option<usize>,
    #[serde(default)]
    pub watch: WatchMode,
}

impl FileConfig {
    /// Parse a config file; relative paths in it resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AssetError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content).map_err(|e| {
            AssetError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;

        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        config.input = config.input.map(|p| mapper::absolutize(&p, &base));
        config.output = config.output.map(|p| mapper::absolutize(&p, &base));
        config.version_from = config.version_from.map(|p| mapper::absolutize(&p, &base));
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn into_options(self) -> SyncOptions {
        SyncOptions {
            patterns: self.patterns.map(Patterns::into_vec).unwrap_or_default(),
            input: self.input,
            output: self.output,
            name: self.name,
            version: self.version,
            version_from: self.version_from,
            preserve_existing: self.keep,
            include_hidden: self.hidden,
            mode: self.watch,
            jobs: self.jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_single_pattern() {
        let config = FileConfig::parse("patterns = \"**/*.txt\"\noutput = \"out\"\n")
            .expect("parse config");
        assert_eq!(config.patterns, Some(Patterns::One("**/*.txt".to_string())));
        assert_eq!(config.watch, WatchMode::Off);
        assert!(!config.keep);
    }

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::parse(
            r#"
patterns = ["**/*", "!**/*.tmp"]
input = "chat"
output = "dist"
name = "chat"
version = "1.2.3"
keep = true
hidden = true
jobs = 2
watch = "copy-then-watch"
"#,
        )
        .expect("parse config");

        let options = config.into_options();
        assert_eq!(options.patterns.len(), 2);
        assert_eq!(options.mode, WatchMode::CopyThenWatch);
        assert!(options.preserve_existing);
        assert!(options.include_hidden);
        assert_eq!(options.jobs, Some(2));
        assert_eq!(options.version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(FileConfig::parse("outptu = \"typo\"").is_err());
    }

    #[test]
    fn test_load_resolves_paths_against_file_directory() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("assets.toml");
        fs::write(&path, "patterns = \"*\"\ninput = \"src\"\noutput = \"../dist\"\n")
            .expect("write config");

        let config = FileConfig::load(&path).expect("load config");
        assert_eq!(config.input, Some(dir.path().join("src")));
        assert_eq!(
            config.output,
            dir.path().parent().map(|p| p.join("dist"))
        );
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = FileConfig::load(Path::new("/nonexistent/assets.toml"))
            .expect_err("missing file must fail");
        assert!(matches!(err, AssetError::Config(_)));
    }
}
