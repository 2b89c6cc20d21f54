//! Sandboxed module requests.
//!
//! SFC `<script module="name" lang="wxs|renderjs">` blocks are loaded by the
//! bundler as virtual ids such as `/pages/index.vue?vue&type=wxs&name=utils`.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use url::form_urlencoded;

use crate::template::FilterKind;

lazy_static! {
    static ref WXS_RE: Regex = Regex::new(r"vue&type=wxs").unwrap();
    static ref RENDERJS_RE: Regex = Regex::new(r"vue&type=renderjs").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VueRequest {
    pub filename: String,
    pub query: HashMap<String, String>,
}

impl VueRequest {
    /// Flag-style params (`?vue&raw`) are present with an empty value.
    pub fn has(&self, key: &str) -> bool {
        self.query.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedModuleRequest {
    pub kind: FilterKind,
    pub name: String,
    pub filename: String,
}

/// Splits an id into filename and decoded query. Repeated keys keep the
/// first value.
pub fn parse_vue_request(id: &str) -> VueRequest {
    let (filename, raw_query) = id.split_once('?').unwrap_or((id, ""));
    let mut query = HashMap::new();
    for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
        query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    VueRequest {
        filename: filename.to_string(),
        query,
    }
}

pub fn is_wxs(id: &str) -> bool {
    WXS_RE.is_match(id)
}

pub fn is_renderjs(id: &str) -> bool {
    RENDERJS_RE.is_match(id)
}

/// Recognizes wxs / renderjs block requests. Plain modules yield `None`.
pub fn parse_renderjs(id: &str) -> Option<SandboxedModuleRequest> {
    let kind = if is_wxs(id) {
        FilterKind::Wxs
    } else if is_renderjs(id) {
        FilterKind::Renderjs
    } else {
        return None;
    };
    let request = parse_vue_request(id);
    Some(SandboxedModuleRequest {
        kind,
        name: request.get("name").unwrap_or_default().to_string(),
        filename: request.filename,
    })
}

/// Block emitted in place of a sandboxed module declared without `module=`.
pub fn missing_module_name(kind: FilterKind, code: &str) -> String {
    format!(
        "<script module=\"missing module name\" lang=\"{}\">\n{}\n</script>",
        kind.as_str(),
        code
    )
}
