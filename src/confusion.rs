//! Confusion Module
//!
//! Production app builds can move selected sources into a separate
//! `app-confusion.js` chunk. After bundling, that chunk is wrapped so it
//! executes against its own exports object, and the service chunk reaches it
//! through a tiny local resolver instead of a real `require` edge:
//!
//! ```text
//! function $cjs_require$(name){ 'vue' -> Vue, './app-confusion.js' -> $appConfusion$ }
//! const $appConfusion$ = {};
//! (function(exports){ ...confusion chunk... })($appConfusion$);
//! ```
//!
//! Rewriting is textual. Every `require('vue')` / `require('./app-confusion.js')`
//! is replaced wherever it appears, string literals included.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::{relative_path, remove_ext, resolve_path};
use crate::project::{load_manifest_json, ManifestJson};

pub const APP_CONFUSION_FILENAME: &str = "app-confusion.js";
pub const APP_SERVICE_FILENAME: &str = "app-service.js";

const UI_RUNTIME_SPECIFIER: &str = "vue";
const UI_RUNTIME_GLOBAL: &str = "Vue";
const RESOLVER: &str = "$cjs_require$";
const CONFUSION_EXPORTS: &str = "$appConfusion$";

lazy_static! {
    static ref JS_SOURCE_RE: Regex = Regex::new(r"\.(?:js|jsx|ts|tsx|mjs)$").unwrap();

    static ref SHARED_RULES: Vec<RewriteRule> =
        vec![RewriteRule::require(UI_RUNTIME_SPECIFIER)];

    static ref SERVICE_RULES: Vec<RewriteRule> = vec![
        RewriteRule::require(UI_RUNTIME_SPECIFIER),
        RewriteRule::require(&format!("./{}", APP_CONFUSION_FILENAME)),
    ];
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITE RULES
// ═══════════════════════════════════════════════════════════════════════════════

/// A literal call form and its verbatim replacement.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    /// `require('<specifier>')` with either quote style, case-insensitive,
    /// routed through the local resolver.
    pub fn require(specifier: &str) -> Self {
        let pattern = format!(r#"(?i)require\(['"]{}['"]\)"#, regex::escape(specifier));
        Self {
            pattern: Regex::new(&pattern).unwrap(),
            replacement: format!("{}('{}')", RESOLVER, specifier),
        }
    }

    pub fn apply(&self, code: &str) -> String {
        self.pattern
            .replace_all(code, NoExpand(&self.replacement))
            .into_owned()
    }
}

/// Applies each rule once, in order, over the whole text.
pub fn apply_rules(code: &str, rules: &[RewriteRule]) -> String {
    rules
        .iter()
        .fold(code.to_string(), |code, rule| rule.apply(&code))
}

/// Wraps the confusion chunk and installs the resolver.
pub fn transform_shared_chunk(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 256);
    out.push_str(&format!(
        "function {resolver}(name){{if(name==='{vue}'){{return {vue_global};}}if(name==='./{chunk}'){{return {exports};}}}};",
        resolver = RESOLVER,
        vue = UI_RUNTIME_SPECIFIER,
        vue_global = UI_RUNTIME_GLOBAL,
        chunk = APP_CONFUSION_FILENAME,
        exports = CONFUSION_EXPORTS,
    ));
    out.push_str(&format!("const {} = {{}};", CONFUSION_EXPORTS));
    out.push_str("(function(exports){");
    out.push_str(&apply_rules(code, &SHARED_RULES));
    out.push_str(&format!("}})({});\n", CONFUSION_EXPORTS));
    out
}

/// Routes the service chunk's `vue` and confusion-chunk loads through the
/// resolver installed by [`transform_shared_chunk`].
pub fn transform_service_chunk(code: &str) -> String {
    apply_rules(code, &SERVICE_RULES)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleChunk {
    pub name: String,
    pub code: String,
}

/// The bundler's final artifact map, seen through its code payloads only.
pub trait ChunkMap {
    fn chunk_code_mut(&mut self, name: &str) -> Option<&mut String>;
}

impl ChunkMap for IndexMap<String, BundleChunk> {
    fn chunk_code_mut(&mut self, name: &str) -> Option<&mut String> {
        self.get_mut(name).map(|chunk| &mut chunk.code)
    }
}

impl ChunkMap for HashMap<String, BundleChunk> {
    fn chunk_code_mut(&mut self, name: &str) -> Option<&mut String> {
        self.get_mut(name).map(|chunk| &mut chunk.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

/// Which chunks [`BundleObfuscator::apply`] rewrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObfuscationOutcome {
    pub shared: bool,
    pub service: bool,
}

/// True when the manifest lists at least one script resource to isolate.
pub fn has_confusion_file(manifest: &ManifestJson) -> bool {
    manifest
        .confusion_resources()
        .map(|resources| resources.keys().any(|name| JS_SOURCE_RE.is_match(name)))
        .unwrap_or(false)
}

/// `amd` when code splitting is on, `cjs` otherwise.
pub fn output_format(code_splitting: bool) -> &'static str {
    if code_splitting {
        "amd"
    } else {
        "cjs"
    }
}

#[derive(Debug, Clone, Default)]
pub struct BundleObfuscator {
    enabled: bool,
    resources: Vec<String>,
}

impl BundleObfuscator {
    pub fn new(mode: BuildMode, manifest: &ManifestJson) -> Self {
        let enabled = mode == BuildMode::Production && has_confusion_file(manifest);
        let resources = manifest
            .confusion_resources()
            .map(|resources| resources.keys().cloned().collect())
            .unwrap_or_default();
        Self { enabled, resources }
    }

    /// Reads `manifest.json` from the project root.
    pub fn from_project(input_dir: &Path, mode: BuildMode) -> Result<Self> {
        let manifest = load_manifest_json(input_dir)?;
        Ok(Self::new(mode, &manifest))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a source-relative path is listed as a confusion resource.
    pub fn is_confusion_file(&self, relative: &str) -> bool {
        let relative = relative.trim_start_matches("./");
        JS_SOURCE_RE.is_match(relative) && self.resources.iter().any(|r| r == relative)
    }

    /// Chunk assignment for a module id: confusion sources go to the
    /// confusion chunk, everything else is left to the bundler.
    pub fn manual_chunk(&self, input_dir: &Path, id: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let filename = id.split('?').next().unwrap_or(id);
        let absolute = resolve_path(input_dir, Path::new(filename));
        let relative = relative_path(input_dir, &absolute);
        if self.is_confusion_file(&relative) {
            Some(remove_ext(APP_CONFUSION_FILENAME, None))
        } else {
            None
        }
    }

    /// Rewrites the confusion and service chunks in place. Missing chunks
    /// are skipped; the service chunk is only touched once the confusion
    /// chunk provides the resolver.
    pub fn apply<M: ChunkMap + ?Sized>(&self, bundle: &mut M) -> ObfuscationOutcome {
        let mut outcome = ObfuscationOutcome::default();
        if !self.enabled {
            return outcome;
        }

        let Some(shared) = bundle.chunk_code_mut(APP_CONFUSION_FILENAME) else {
            debug!(target: "uni::confusion", "{} not emitted, skipping", APP_CONFUSION_FILENAME);
            return outcome;
        };
        *shared = transform_shared_chunk(shared);
        outcome.shared = true;

        let Some(service) = bundle.chunk_code_mut(APP_SERVICE_FILENAME) else {
            debug!(target: "uni::confusion", "{} not emitted, skipping", APP_SERVICE_FILENAME);
            return outcome;
        };
        *service = transform_service_chunk(service);
        outcome.service = true;
        outcome
    }
}
