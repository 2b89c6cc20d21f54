//! # uni build native core
//!
//! Build-time transforms that let one source tree target the browser, the
//! native app shell and mini-program engines.
//!
//! ## Components
//!
//! 1. **Easycom** ([`easycom`]): bare component tags resolve to source files
//!    by convention. `components/Foo/Foo.vue` makes `<Foo>` available
//!    everywhere without an import. Scanned directories are ordered
//!    (built-in, `components/`, `uni_modules/*/components/`); the first
//!    directory to provide a name wins and later ones are reported as
//!    conflicts. `pages.json#easycom.custom` patterns are applied last and
//!    always override scanned names.
//!
//! 2. **Template files** ([`template`]): mini-program templates are emitted
//!    per file with their `wxs` / `renderjs` modules declared in front. A
//!    recompiled module keeps its position, so output is stable across
//!    incremental rebuilds.
//!
//! 3. **Confusion** ([`confusion`]): in production app builds the
//!    `app-confusion.js` chunk is wrapped and the `app-service.js` chunk is
//!    rewired to it through a local resolver. Missing chunks are skipped,
//!    never fatal.
//!
//! All state lives in explicit instances owned by the driver. Nothing is
//! global and nothing is shared between threads.

pub mod confusion;
pub mod easycom;
pub mod error;
pub mod paths;
pub mod project;
pub mod renderjs;
pub mod template;

#[cfg(feature = "napi")]
mod bridge;


pub use confusion::{
    transform_service_chunk, transform_shared_chunk, BuildMode, BundleChunk, BundleObfuscator,
    ChunkMap, ObfuscationOutcome, APP_CONFUSION_FILENAME, APP_SERVICE_FILENAME,
};
pub use easycom::{
    ComponentMatcher, ComponentRegistry, ConfigureReport, ConflictRecord, EasycomProject,
    ReplacementTemplate, ScanConfig,
};
pub use error::{BuildError, Result};
pub use project::{EasycomOptions, ManifestJson, PagesJson, ProjectLayout};
pub use renderjs::{parse_renderjs, SandboxedModuleRequest};
pub use template::{render_filter_tag, FilterKind, TemplateFileAssembler, TemplateFilter};
