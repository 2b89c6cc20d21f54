//! Project configuration consumed by the build core.
//!
//! The driver owns argument parsing and environment handling; it hands us a
//! [`ProjectLayout`] and either already-parsed JSON values or the input
//! directory to read `pages.json` / `manifest.json` from.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

pub const PAGES_JSON_FILENAME: &str = "pages.json";
pub const MANIFEST_JSON_FILENAME: &str = "manifest.json";

/// Fixed directory contract of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLayout {
    /// Source root (`UNI_INPUT_DIR`).
    pub input_dir: PathBuf,
    /// The `lib` folder of the built-in component package.
    pub builtin_components_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(input_dir: impl Into<PathBuf>, builtin_components_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            builtin_components_dir: builtin_components_dir.into(),
        }
    }

    pub fn components_dir(&self) -> PathBuf {
        self.input_dir.join("components")
    }

    pub fn uni_modules_dir(&self) -> PathBuf {
        self.input_dir.join("uni_modules")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// pages.json
// ═══════════════════════════════════════════════════════════════════════════════

/// The slice of `pages.json` the core reads. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagesJson {
    #[serde(default)]
    pub easycom: Option<EasycomOptions>,
}

/// `pages.json#easycom`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EasycomOptions {
    /// Only an explicit `false` disables scanning of user directories.
    #[serde(default)]
    pub autoscan: Option<bool>,
    /// Pattern -> path. Key order is significant.
    #[serde(default)]
    pub custom: IndexMap<String, String>,
}

impl EasycomOptions {
    pub fn autoscan_enabled(&self) -> bool {
        self.autoscan != Some(false)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// manifest.json
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestJson {
    #[serde(rename = "app-plus", default)]
    pub app_plus: Option<AppPlusOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppPlusOptions {
    #[serde(default)]
    pub confusion: Option<ConfusionOptions>,
}

/// `manifest.json#app-plus.confusion`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionOptions {
    /// Source-relative path -> per-resource options (opaque to us).
    #[serde(default)]
    pub resources: IndexMap<String, serde_json::Value>,
}

impl ManifestJson {
    pub fn confusion_resources(&self) -> Option<&IndexMap<String, serde_json::Value>> {
        self.app_plus
            .as_ref()
            .and_then(|app| app.confusion.as_ref())
            .map(|confusion| &confusion.resources)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads `<input_dir>/pages.json`. A missing file yields the defaults.
pub fn load_pages_json(input_dir: &Path) -> Result<PagesJson> {
    load_json(&input_dir.join(PAGES_JSON_FILENAME))
}

/// Reads `<input_dir>/manifest.json`. A missing file yields the defaults.
pub fn load_manifest_json(input_dir: &Path) -> Result<ManifestJson> {
    load_json(&input_dir.join(MANIFEST_JSON_FILENAME))
}

fn load_json<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(BuildError::io(path, e)),
    };
    serde_json::from_str(&data).map_err(|source| BuildError::Json {
        path: path.to_path_buf(),
        source,
    })
}
