//! Ordered glob pattern sets with `!` negation

use crate::mapper;
use crate::types::AssetError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Compiled, ordered source patterns rooted at an input directory
///
/// Patterns are evaluated in order and the last one matching a path decides:
/// a positive pattern includes it, a `!` pattern excludes it. So `!x` only
/// removes what earlier patterns matched and a later positive pattern can add
/// it back.
#[derive(Debug, Clone)]
pub struct PatternSet {
    input_root: PathBuf,
    globs: GlobSet,
    negated: Vec<bool>,
    bases: Vec<PathBuf>,
    include_hidden: bool,
}

impl PatternSet {
    /// Compile `patterns` relative to `input_root`.
    ///
    /// Absolute patterns must point inside `input_root`.
    ///
    /// # Errors
    /// * `AssetError::Pattern` - a pattern is empty, escapes the root, or is malformed
    pub fn compile(
        patterns: &[String],
        input_root: &Path,
        include_hidden: bool,
    ) -> Result<Self, AssetError> {
        let input_root = mapper::normalize(input_root);
        let mut builder = GlobSetBuilder::new();
        let mut negated = Vec::with_capacity(patterns.len());
        let mut bases = Vec::new();

        for raw in patterns {
            let (is_negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };
            let relative = relative_pattern(raw, body, &input_root)?;

            let glob = GlobBuilder::new(&relative)
                .literal_separator(true)
                .build()
                .map_err(|e| AssetError::pattern(raw, e.kind()))?;
            builder.add(glob);
            negated.push(is_negated);

            if !is_negated {
                bases.push(literal_base(&relative));
            }
        }

        let globs = builder
            .build()
            .map_err(|e| AssetError::pattern(&patterns.join(" "), e))?;

        Ok(Self {
            input_root,
            globs,
            negated,
            bases,
            include_hidden,
        })
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Match a path relative to the input root.
    pub fn is_match(&self, relative: &Path) -> bool {
        if !self.include_hidden && is_hidden(relative) {
            return false;
        }
        match self.globs.matches(relative).into_iter().max() {
            Some(last) => !self.negated[last],
            None => false,
        }
    }

    /// Match an absolute (or input-relative) source path.
    ///
    /// Paths outside the input root never match.
    pub fn matches_path(&self, path: &Path) -> bool {
        match mapper::relative_to_root(path, &self.input_root) {
            Ok(relative) => self.is_match(&relative),
            Err(_) => false,
        }
    }

    /// Directories that must be walked or watched to see every match.
    ///
    /// Each positive pattern contributes the directory formed by its leading
    /// literal components, clamped to the nearest existing ancestor inside the
    /// input root. Roots nested under another root are dropped.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .bases
            .iter()
            .map(|base| {
                let mut dir = self.input_root.join(base);
                while dir != self.input_root && !dir.is_dir() {
                    if !dir.pop() {
                        break;
                    }
                }
                dir
            })
            .collect();

        roots.sort();
        roots.dedup();
        let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
        for root in roots {
            if !kept.iter().any(|k| root.starts_with(k)) {
                kept.push(root);
            }
        }
        kept
    }
}

/// True when any component of `relative` starts with a dot.
pub fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn relative_pattern(raw: &str, body: &str, input_root: &Path) -> Result<String, AssetError> {
    let body = body.trim_start_matches("./");
    if body.is_empty() {
        return Err(AssetError::pattern(raw, "pattern is empty"));
    }

    let path = Path::new(body);
    let relative = if path.is_absolute() {
        let literal = literal_prefix(path);
        if !literal.starts_with(input_root) {
            return Err(AssetError::pattern(
                raw,
                format!("absolute pattern is outside input root {}", input_root.display()),
            ));
        }
        path.strip_prefix(input_root)
            .map_err(|_| AssetError::pattern(raw, "cannot relativize pattern"))?
            .to_string_lossy()
            .into_owned()
    } else {
        body.to_string()
    };

    if Path::new(&relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(AssetError::pattern(raw, "pattern may not contain '..'"));
    }
    if relative.is_empty() {
        return Err(AssetError::pattern(raw, "pattern matches only the input root"));
    }
    Ok(relative)
}

/// Leading components without glob metacharacters.
fn literal_prefix(path: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in path.components() {
        if component.as_os_str().to_string_lossy().contains(GLOB_META) {
            break;
        }
        prefix.push(component);
    }
    prefix
}

/// Directory part of a relative pattern's literal prefix.
fn literal_base(relative: &str) -> PathBuf {
    let path = Path::new(relative);
    let prefix = literal_prefix(path);
    if prefix.as_os_str().len() == path.as_os_str().len() {
        // fully literal: watch the file's directory
        prefix.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        prefix
    }
}
