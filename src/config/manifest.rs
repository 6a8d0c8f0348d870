//! Version lookup from a JSON manifest such as `package.json`

use crate::types::AssetError;
use std::fs;
use std::path::Path;

/// Read the string `"version"` field of a JSON manifest.
pub fn read_manifest_version(path: &Path) -> Result<String, AssetError> {
    let content = fs::read_to_string(path).map_err(|e| AssetError::manifest(path, e))?;
    let manifest: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| AssetError::manifest(path, e))?;

    match manifest.get("version").and_then(serde_json::Value::as_str) {
        Some(version) if !version.trim().is_empty() => Ok(version.trim().to_string()),
        Some(_) => Err(AssetError::manifest(path, "\"version\" is empty")),
        None => Err(AssetError::manifest(
            path,
            "missing string field \"version\"",
        )),
    }
}
