//! Configuration management
//!
//! Three layers feed one immutable [`SyncConfig`]:
//! - [`Cli`]: command-line flags (clap)
//! - [`FileConfig`]: optional TOML file passed with `--config`
//! - [`SyncOptions`]: the merged, still-unvalidated option set (also the
//!   entry point for library callers)
//!
//! Validation and derivation of the effective destination root happen once,
//! in `SyncConfig::try_from`.

mod file;
mod manifest;

pub use file::FileConfig;
pub use manifest::read_manifest_version;

use crate::mapper::{self, MappedPath};
use crate::types::AssetError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Whether and how the source tree is watched after startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchMode {
    /// Copy once and exit
    #[default]
    Off,
    /// Watch only, no initial copy
    Watch,
    /// Copy everything, then watch
    CopyThenWatch,
}

impl WatchMode {
    pub fn copies_first(&self) -> bool {
        matches!(self, WatchMode::Off | WatchMode::CopyThenWatch)
    }

    pub fn watches(&self) -> bool {
        matches!(self, WatchMode::Watch | WatchMode::CopyThenWatch)
    }
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(
    name = "build-asset",
    version = crate::VERSION,
    about = "Copy files matching glob patterns into an output directory",
    long_about = "Copy files matching glob patterns into an output directory, optionally \
                  under <version>/<name> segments, and keep the copy in sync while watching."
)]
pub struct Cli {
    /// Glob patterns identifying files to copy (prefix with ! to exclude)
    #[arg(value_name = "PATTERNS")]
    pub patterns: Vec<String>,

    /// Directory to copy files to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Base directory used to build output paths (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Name to include in the output path
    #[arg(short, long)]
    pub name: Option<String>,

    /// Version to include in the output path, before the name
    #[arg(short = 'v', long = "asset-version", value_name = "VERSION")]
    pub asset_version: Option<String>,

    /// Read the version from the "version" field of a JSON manifest
    #[arg(long, value_name = "JSON", conflicts_with = "asset_version")]
    pub version_from: Option<PathBuf>,

    /// Watch the matched files and copy them when they change
    #[arg(short = 'w', long)]
    pub watch: bool,

    /// Like --watch, but copy all matched files before watching
    #[arg(short = 'W', long)]
    pub watch_after_copy: bool,

    /// Keep existing output contents instead of clearing them first
    #[arg(short = 'k', long, overrides_with = "no_keep")]
    pub keep: bool,

    /// Clear the output first even if the config file sets `keep`
    #[arg(long, overrides_with = "keep")]
    pub no_keep: bool,

    /// Include dot-files and dot-directories
    #[arg(long, overrides_with = "no_hidden")]
    pub hidden: bool,

    /// Skip dot-files even if the config file sets `hidden`
    #[arg(long, overrides_with = "hidden")]
    pub no_hidden: bool,

    /// Maximum number of concurrent copies
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Load options from a TOML file; flags override its values
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Unvalidated run options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub patterns: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub version_from: Option<PathBuf>,
    pub preserve_existing: bool,
    pub include_hidden: bool,
    pub mode: WatchMode,
    pub jobs: Option<usize>,
}

impl SyncOptions {
    /// Overlay CLI values on top of these options.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if !cli.patterns.is_empty() {
            self.patterns = cli.patterns.clone();
        }
        if cli.output.is_some() {
            self.output = cli.output.clone();
        }
        if cli.input.is_some() {
            self.input = cli.input.clone();
        }
        if cli.name.is_some() {
            self.name = cli.name.clone();
        }
        if cli.asset_version.is_some() {
            self.version = cli.asset_version.clone();
            self.version_from = None;
        }
        if cli.version_from.is_some() {
            self.version_from = cli.version_from.clone();
            self.version = None;
        }
        if cli.watch_after_copy {
            self.mode = WatchMode::CopyThenWatch;
        } else if cli.watch {
            self.mode = WatchMode::Watch;
        }
        if cli.keep {
            self.preserve_existing = true;
        } else if cli.no_keep {
            self.preserve_existing = false;
        }
        if cli.hidden {
            self.include_hidden = true;
        } else if cli.no_hidden {
            self.include_hidden = false;
        }
        if cli.jobs.is_some() {
            self.jobs = cli.jobs;
        }
        self
    }
}

/// Validated, immutable configuration for one run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    input_root: PathBuf,
    output_root: PathBuf,
    name_segment: Option<String>,
    version_segment: Option<String>,
    destination_root: PathBuf,
    source_patterns: Vec<String>,
    preserve_existing: bool,
    include_hidden: bool,
    mode: WatchMode,
    jobs: usize,
}

impl SyncConfig {
    /// Base directory source paths are relativized against
    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    /// Output directory as given, without name/version segments
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn name_segment(&self) -> Option<&str> {
        self.name_segment.as_deref()
    }

    pub fn version_segment(&self) -> Option<&str> {
        self.version_segment.as_deref()
    }

    /// Effective destination root: `output/[version]/[name]`
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn source_patterns(&self) -> &[String] {
        &self.source_patterns
    }

    pub fn preserve_existing(&self) -> bool {
        self.preserve_existing
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Destination for a source path under the input root
    pub fn map_path(&self, source: &Path) -> Result<PathBuf, AssetError> {
        mapper::map_path(source, &self.input_root, &self.destination_root)
    }

    pub fn map_pair(&self, source: &Path) -> Result<MappedPath, AssetError> {
        mapper::map_pair(source, &self.input_root, &self.destination_root)
    }

    /// True when `path` lies inside the effective destination root
    pub fn is_in_destination(&self, path: &Path) -> bool {
        mapper::absolutize(path, &self.input_root).starts_with(&self.destination_root)
    }
}

/// Join the optional version and name segments onto the output directory.
pub fn destination_root(output: &Path, version: Option<&str>, name: Option<&str>) -> PathBuf {
    let mut root = output.to_path_buf();
    if let Some(version) = version {
        root.push(version);
    }
    if let Some(name) = name {
        root.push(name);
    }
    root
}

impl TryFrom<SyncOptions> for SyncConfig {
    type Error = AssetError;

    fn try_from(options: SyncOptions) -> Result<Self, Self::Error> {
        if options.patterns.is_empty() {
            return Err(AssetError::Config("no source patterns given".to_string()));
        }
        if let Some(blank) = options.patterns.iter().find(|p| p.trim().is_empty()) {
            return Err(AssetError::Config(format!(
                "source pattern {:?} is empty",
                blank
            )));
        }
        let output = options
            .output
            .ok_or_else(|| AssetError::Config("no output directory given".to_string()))?;

        let cwd = std::env::current_dir()?;
        let input_root = real_path(&match &options.input {
            Some(input) => mapper::absolutize(input, &cwd),
            None => mapper::normalize(&cwd),
        });
        let output_root = real_path(&mapper::absolutize(&output, &cwd));

        let version_segment = match (options.version, options.version_from) {
            (Some(_), Some(_)) => {
                return Err(AssetError::Config(
                    "version and version manifest are mutually exclusive".to_string(),
                ))
            }
            (Some(version), None) => Some(version),
            (None, Some(manifest)) => Some(read_manifest_version(&mapper::absolutize(
                &manifest, &cwd,
            ))?),
            (None, None) => None,
        };

        if let Some(version) = &version_segment {
            validate_segment("version", version)?;
        }
        if let Some(name) = &options.name {
            validate_segment("name", name)?;
        }

        let destination_root = destination_root(
            &output_root,
            version_segment.as_deref(),
            options.name.as_deref(),
        );

        if input_root.starts_with(&destination_root) {
            return Err(AssetError::Config(format!(
                "input directory {} is inside output directory {}; clearing the output would delete the sources",
                input_root.display(),
                destination_root.display()
            )));
        }

        let jobs = options
            .jobs
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1);

        Ok(Self {
            input_root,
            output_root,
            name_segment: options.name,
            version_segment,
            destination_root,
            source_patterns: options.patterns,
            preserve_existing: options.preserve_existing,
            include_hidden: options.include_hidden,
            mode: options.mode,
            jobs,
        })
    }
}

impl TryFrom<Cli> for SyncConfig {
    type Error = AssetError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let base = match &cli.config {
            Some(path) => FileConfig::load(path)?.into_options(),
            None => SyncOptions::default(),
        };
        SyncConfig::try_from(base.merge_cli(&cli))
    }
}

/// Resolve symlinks in the longest existing prefix of an absolute path.
///
/// Watch backends may report real paths (`/private/var` for `/var`), so both
/// roots are kept in that form. Components that do not exist yet are appended
/// unchanged.
fn real_path(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = std::fs::canonicalize(&existing) {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<(), AssetError> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal || value.contains(['/', '\\']) {
        return Err(AssetError::Config(format!(
            "{} {:?} must be a single path segment",
            kind, value
        )));
    }
    Ok(())
}
