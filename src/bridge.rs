//! Node-API surface for the bundler plugins.
//!
//! Each component is exposed as a JS class owning its own state, so a dev
//! server can keep one instance per project.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::collections::HashMap;
use std::path::Path;

use crate::confusion::{self, BuildMode, BundleChunk, BundleObfuscator};
use crate::easycom::{ConfigureReport, EasycomProject};
use crate::error::BuildError;
use crate::project::{load_pages_json, EasycomOptions, ProjectLayout};
use crate::renderjs;
use crate::template::{render_filter_tag, TemplateFileAssembler, TemplateFilter};

fn to_napi(err: BuildError) -> Error {
    Error::from_reason(err.to_string())
}

fn invalid_arg(what: &str, err: serde_json::Error) -> Error {
    Error::new(Status::InvalidArg, format!("Invalid {}: {}", what, err))
}

// ═══════════════════════════════════════════════════════════════════════════════
// EASYCOM
// ═══════════════════════════════════════════════════════════════════════════════

#[napi(object)]
pub struct EasycomConfigureResult {
    pub matchers: u32,
    pub conflicts: HashMap<String, Vec<String>>,
}

impl From<ConfigureReport> for EasycomConfigureResult {
    fn from(report: ConfigureReport) -> Self {
        Self {
            matchers: report.matchers as u32,
            conflicts: report.conflicts.into_iter().collect(),
        }
    }
}

#[napi(js_name = "EasycomRegistry")]
pub struct EasycomRegistryNapi {
    project: EasycomProject,
}

impl EasycomRegistryNapi {
    /// `easycom_json` is the serialized `pages.json#easycom` object. When
    /// omitted, `pages.json` is read from the input directory.
    fn options(&self, easycom_json: Option<String>) -> Result<EasycomOptions> {
        match easycom_json {
            Some(json) => serde_json::from_str(&json).map_err(|e| invalid_arg("easycom options", e)),
            None => Ok(load_pages_json(&self.project.layout().input_dir)
                .map_err(to_napi)?
                .easycom
                .unwrap_or_default()),
        }
    }
}

#[napi]
impl EasycomRegistryNapi {
    #[napi(constructor)]
    pub fn new(input_dir: String, builtin_components_dir: String) -> Self {
        Self {
            project: EasycomProject::new(ProjectLayout::new(input_dir, builtin_components_dir)),
        }
    }

    #[napi]
    pub fn init(&mut self, easycom_json: Option<String>) -> Result<Option<EasycomConfigureResult>> {
        let options = self.options(easycom_json)?;
        let report = self.project.init(&options).map_err(to_napi)?;
        Ok(report.map(Into::into))
    }

    #[napi]
    pub fn refresh(&mut self, easycom_json: Option<String>) -> Result<EasycomConfigureResult> {
        let options = self.options(easycom_json)?;
        let report = self.project.refresh(&options).map_err(to_napi)?;
        Ok(report.into())
    }

    #[napi]
    pub fn resolve(&mut self, tag: String) -> Option<String> {
        self.project.resolve(&tag)
    }

    #[napi]
    pub fn is_easycom_file(&self, path: String) -> bool {
        self.project.is_easycom_file(Path::new(&path))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE FILES
// ═══════════════════════════════════════════════════════════════════════════════

#[napi(object)]
pub struct TemplateFileOutput {
    pub filename: String,
    pub code: String,
}

#[napi(js_name = "TemplateFiles")]
pub struct TemplateFilesNapi {
    assembler: TemplateFileAssembler,
}

#[napi]
impl TemplateFilesNapi {
    #[napi(constructor)]
    pub fn new() -> Self {
        Self {
            assembler: TemplateFileAssembler::new(),
        }
    }

    #[napi]
    pub fn add_file(&mut self, filename: String, code: String) {
        self.assembler.register_file(filename, code);
    }

    #[napi]
    pub fn add_filter(&mut self, filename: String, filter: serde_json::Value) -> Result<()> {
        let filter: TemplateFilter =
            serde_json::from_value(filter).map_err(|e| invalid_arg("template filter", e))?;
        self.assembler.register_filter(filename, filter);
        Ok(())
    }

    #[napi]
    pub fn remove_filter(&mut self, filename: String) {
        self.assembler.remove_filter(&filename);
    }

    /// Final files in registration order. With `filter_tag` (e.g. `"wxs"`),
    /// filters are declared in front of each template.
    #[napi]
    pub fn find_files(&self, filter_tag: Option<String>) -> Vec<TemplateFileOutput> {
        let files = match filter_tag {
            Some(tag) => self
                .assembler
                .materialize(Some(|filter: &TemplateFilter| Some(render_filter_tag(&tag, filter)))),
            None => self
                .assembler
                .materialize(None::<fn(&TemplateFilter) -> Option<String>>),
        };
        files
            .into_iter()
            .map(|(filename, code)| TemplateFileOutput { filename, code })
            .collect()
    }

    #[napi]
    pub fn clear(&mut self) {
        self.assembler.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SANDBOXED MODULES
// ═══════════════════════════════════════════════════════════════════════════════

#[napi(object)]
pub struct SandboxedModuleInfo {
    pub kind: String,
    pub name: String,
    pub filename: String,
}

#[napi]
pub fn parse_renderjs(id: String) -> Option<SandboxedModuleInfo> {
    renderjs::parse_renderjs(&id).map(|req| SandboxedModuleInfo {
        kind: req.kind.as_str().to_string(),
        name: req.name,
        filename: req.filename,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFUSION
// ═══════════════════════════════════════════════════════════════════════════════

#[napi(object)]
pub struct BundleChunkNapi {
    pub name: String,
    pub code: String,
}

#[napi(js_name = "ConfusionPlugin")]
pub struct ConfusionPluginNapi {
    input_dir: String,
    obfuscator: BundleObfuscator,
}

#[napi]
impl ConfusionPluginNapi {
    #[napi(constructor)]
    pub fn new(input_dir: String, production: bool) -> Result<Self> {
        let mode = if production {
            BuildMode::Production
        } else {
            BuildMode::Development
        };
        let obfuscator = BundleObfuscator::from_project(Path::new(&input_dir), mode).map_err(to_napi)?;
        Ok(Self {
            input_dir,
            obfuscator,
        })
    }

    #[napi(getter)]
    pub fn enabled(&self) -> bool {
        self.obfuscator.is_enabled()
    }

    #[napi]
    pub fn manual_chunk(&self, id: String) -> Option<String> {
        self.obfuscator.manual_chunk(Path::new(&self.input_dir), &id)
    }

    #[napi]
    pub fn output_format(&self, code_splitting: bool) -> String {
        confusion::output_format(code_splitting).to_string()
    }

    /// Returns the chunks that were rewritten. Chunks not returned are
    /// unchanged.
    #[napi]
    pub fn generate_bundle(&self, chunks: Vec<BundleChunkNapi>) -> Vec<BundleChunkNapi> {
        let mut bundle: HashMap<String, BundleChunk> = chunks
            .into_iter()
            .map(|chunk| {
                (
                    chunk.name.clone(),
                    BundleChunk {
                        name: chunk.name,
                        code: chunk.code,
                    },
                )
            })
            .collect();

        let outcome = self.obfuscator.apply(&mut bundle);
        let mut rewritten = Vec::new();
        for (touched, name) in [
            (outcome.shared, confusion::APP_CONFUSION_FILENAME),
            (outcome.service, confusion::APP_SERVICE_FILENAME),
        ] {
            if !touched {
                continue;
            }
            if let Some(chunk) = bundle.remove(name) {
                rewritten.push(BundleChunkNapi {
                    name: chunk.name,
                    code: chunk.code,
                });
            }
        }
        rewritten
    }
}
