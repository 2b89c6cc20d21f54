//! Template Module
//!
//! Collects compiled mini-program templates per output file together with
//! the sandboxed script modules (`wxs` / `renderjs` blocks) they declare, and
//! assembles the final text once the build is ready to emit.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LINEFEED: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Sandboxed data module, evaluated by the view layer.
    Wxs,
    /// Sandboxed render module.
    Renderjs,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Wxs => "wxs",
            FilterKind::Renderjs => "renderjs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFilter {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub name: String,
    #[serde(default)]
    pub src: Option<String>,
    pub code: String,
}

/// Per-file template output plus the filters that must precede it.
///
/// Filenames keep registration order. Filters are keyed by id so a
/// recompiled filter keeps its original slot.
#[derive(Debug, Default)]
pub struct TemplateFileAssembler {
    files: IndexMap<String, String>,
    filters: HashMap<String, IndexMap<String, TemplateFilter>>,
}

impl TemplateFileAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Filters registered for `filename` are untouched.
    pub fn register_file(&mut self, filename: impl Into<String>, code: impl Into<String>) {
        self.files.insert(filename.into(), code.into());
    }

    /// Replaces a filter with the same id in place, or appends it.
    pub fn register_filter(&mut self, filename: impl Into<String>, filter: TemplateFilter) {
        let filename = filename.into();
        debug!(target: "uni::template", "filter {} ({}) -> {}", filter.id, filter.kind.as_str(), filename);
        self.filters
            .entry(filename)
            .or_default()
            .insert(filter.id.clone(), filter);
    }

    /// Drops every filter of `filename`.
    pub fn remove_filter(&mut self, filename: &str) {
        self.filters.remove(filename);
    }

    pub fn filters(&self, filename: &str) -> Vec<&TemplateFilter> {
        self.filters
            .get(filename)
            .map(|filters| filters.values().collect())
            .unwrap_or_default()
    }

    pub fn code(&self, filename: &str) -> Option<&str> {
        self.files.get(filename).map(|code| code.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Final text of every registered file, in registration order.
    ///
    /// With a renderer, each file's filters are rendered in order, empty
    /// blocks are dropped, and the rest are joined by `\n` and prepended to
    /// the code with one more `\n`. The trailing `\n` is emitted even when
    /// every block renders empty. Files without filters, or any file when no
    /// renderer is given, are emitted as is.
    pub fn materialize<F>(&self, mut render: Option<F>) -> IndexMap<String, String>
    where
        F: FnMut(&TemplateFilter) -> Option<String>,
    {
        let mut out = IndexMap::with_capacity(self.files.len());
        for (filename, code) in &self.files {
            let text = match (render.as_mut(), self.filters.get(filename)) {
                (Some(render), Some(filters)) if !filters.is_empty() => {
                    let preamble = filters
                        .values()
                        .filter_map(|filter| render(filter))
                        .filter(|block| !block.is_empty())
                        .collect::<Vec<_>>()
                        .join(LINEFEED);
                    format!("{}{}{}", preamble, LINEFEED, code)
                }
                _ => code.clone(),
            };
            out.insert(filename.clone(), text);
        }
        out
    }

    /// Drops all files and filters. Called once per full build.
    pub fn clear(&mut self) {
        self.files.clear();
        self.filters.clear();
    }
}

/// Default declaration of a filter in a mini-program template, e.g.
/// `<wxs module="utils" src="./utils.wxs"/>`. `tag` is the platform's
/// module tag (`wxs`, `sjs`, `filter`, ...).
pub fn render_filter_tag(tag: &str, filter: &TemplateFilter) -> String {
    match &filter.src {
        Some(src) => format!(r#"<{} src="{}" module="{}"/>"#, tag, src, filter.name),
        None => format!(
            "<{} module=\"{}\">{}{}{}</{}>",
            tag, filter.name, LINEFEED, filter.code, LINEFEED, tag
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(id: &str, code: &str) -> TemplateFilter {
        TemplateFilter {
            id: id.to_string(),
            kind: FilterKind::Wxs,
            name: id.to_string(),
            src: None,
            code: code.to_string(),
        }
    }

    fn render_code(filter: &TemplateFilter) -> Option<String> {
        Some(filter.code.clone())
    }

    #[test]
    fn test_register_filter_replaces_in_place() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_filter("pages/index.wxml", filter("a", "codeV1"));
        assembler.register_filter("pages/index.wxml", filter("b", "other"));
        assembler.register_filter("pages/index.wxml", filter("a", "codeV2"));

        let filters = assembler.filters("pages/index.wxml");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].id, "a");
        assert_eq!(filters[0].code, "codeV2");
        assert_eq!(filters[1].id, "b");
    }

    #[test]
    fn test_materialize_prepends_filters_in_order() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_file("pages/index.wxml", "<view/>");
        assembler.register_filter("pages/index.wxml", filter("a", "A"));
        assembler.register_filter("pages/index.wxml", filter("b", "B"));

        let files = assembler.materialize(Some(render_code));
        assert_eq!(files["pages/index.wxml"], "A\nB\n<view/>");
    }

    #[test]
    fn test_materialize_without_renderer_keeps_code() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_file("pages/index.wxml", "<view/>");
        assembler.register_filter("pages/index.wxml", filter("a", "A"));

        let files = assembler.materialize(None::<fn(&TemplateFilter) -> Option<String>>);
        assert_eq!(files["pages/index.wxml"], "<view/>");
    }

    #[test]
    fn test_materialize_skips_empty_blocks() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_file("a.wxml", "<a/>");
        assembler.register_filter("a.wxml", filter("a", ""));
        assembler.register_filter("a.wxml", filter("b", "B"));
        assembler.register_file("b.wxml", "<b/>");
        assembler.register_filter("b.wxml", filter("c", ""));

        let files = assembler.materialize(Some(render_code));
        assert_eq!(files["a.wxml"], "B\n<a/>");
        // all blocks empty still leaves the separating line break
        assert_eq!(files["b.wxml"], "\n<b/>");
    }

    #[test]
    fn test_file_order_and_last_write_wins() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_file("b.wxml", "b1");
        assembler.register_file("a.wxml", "a1");
        assembler.register_file("b.wxml", "b2");

        let files = assembler.materialize(Some(render_code));
        let names: Vec<&str> = files.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["b.wxml", "a.wxml"]);
        assert_eq!(files["b.wxml"], "b2");
    }

    #[test]
    fn test_remove_filter_and_clear_are_idempotent() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_file("a.wxml", "<a/>");
        assembler.register_filter("a.wxml", filter("a", "A"));

        assembler.remove_filter("a.wxml");
        assembler.remove_filter("a.wxml");
        assert!(assembler.filters("a.wxml").is_empty());
        assert_eq!(assembler.materialize(Some(render_code))["a.wxml"], "<a/>");

        assembler.clear();
        assembler.clear();
        assert!(assembler.is_empty());
        assert!(assembler.materialize(Some(render_code)).is_empty());
    }

    #[test]
    fn test_filters_without_file_are_not_emitted() {
        let mut assembler = TemplateFileAssembler::new();
        assembler.register_filter("orphan.wxml", filter("a", "A"));
        assert!(assembler.materialize(Some(render_code)).is_empty());
    }

    #[test]
    fn test_render_filter_tag() {
        let inline = filter("utils", "module.exports = {}");
        assert_eq!(
            render_filter_tag("wxs", &inline),
            "<wxs module=\"utils\">\nmodule.exports = {}\n</wxs>"
        );

        let mut external = filter("fmt", "");
        external.src = Some("./fmt.sjs".to_string());
        assert_eq!(
            render_filter_tag("sjs", &external),
            r#"<sjs src="./fmt.sjs" module="fmt"/>"#
        );
    }

    #[test]
    fn test_filter_deserializes_from_js_shape() {
        let filter: TemplateFilter = serde_json::from_str(
            r#"{ "id": "1", "type": "wxs", "name": "m", "code": "x" }"#,
        )
        .unwrap();
        assert_eq!(filter.kind, FilterKind::Wxs);
        assert!(filter.src.is_none());
    }
}
