//! Easycom Module
//!
//! Resolves bare component tags (`<uni-badge>`, `<Foo>`) to source files
//! without an explicit import. Components are discovered by scanning a fixed
//! list of directories for `<Name>/<Name><ext>` folders; `pages.json` can add
//! or override entries with custom regex patterns.
//!
//! Matchers are tested in a fixed order: scanned directories in scan order,
//! then custom entries; a custom override of a scanned name keeps its slot.
//! Lookups are cached per tag, both hits and misses,
//! until the next [`ComponentRegistry::invalidate`].

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BuildError, Result};
use crate::paths::{path_to_string, relative_path, resolve_path};
use crate::project::{EasycomOptions, ProjectLayout};

pub const DEFAULT_EXTENSIONS: &[&str] = &[".vue"];

/// Custom paths starting with this marker are relative to the project root.
const ROOT_ALIAS: &str = "@/";

lazy_static! {
    static ref EASYCOM_FILE_RE: Regex =
        Regex::new(r"^(?:components|uni_modules/[^/]+/components)/[^/]+/[^/]+\.vue$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Input of [`ComponentRegistry::configure`].
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directories scanned in order. Relative entries resolve against `root_dir`.
    pub dirs: Vec<PathBuf>,
    pub root_dir: PathBuf,
    /// Extension priority, first match wins.
    pub extensions: Vec<String>,
    /// When false only `dirs[0]`, the built-in components dir, is scanned.
    pub autoscan: bool,
    /// Pattern -> path or `@/`-prefixed root alias.
    pub custom: IndexMap<String, String>,
}

impl ScanConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            dirs: Vec::new(),
            root_dir: root_dir.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            autoscan: true,
            custom: IndexMap::new(),
        }
    }

    /// Builds the scan list for a project: built-in components, then the
    /// user `components/` folder and every `uni_modules/*/components` folder
    /// unless `autoscan` is explicitly disabled.
    pub fn for_project(layout: &ProjectLayout, options: &EasycomOptions) -> Result<Self> {
        let autoscan = options.autoscan_enabled();
        let mut dirs = vec![layout.builtin_components_dir.clone()];
        if autoscan {
            dirs.push(layout.components_dir());
            dirs.extend(uni_modules_component_dirs(&layout.uni_modules_dir())?);
        }

        let mut config = ScanConfig::new(&layout.input_dir);
        config.dirs = dirs;
        config.autoscan = autoscan;
        config.custom = options.custom.clone();
        debug!(target: "uni::easycom", "{:?}", config);
        Ok(config)
    }
}

/// `Ok(false)` only when `path` is missing. Other errors (permissions) are
/// reported instead of being treated as an empty directory.
fn dir_exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| BuildError::io(path, e))
}

fn uni_modules_component_dirs(uni_modules_dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir_exists(uni_modules_dir)? {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(uni_modules_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let components_dir = entry?.path().join("components");
        if dir_exists(&components_dir)? {
            dirs.push(components_dir);
        }
    }
    Ok(dirs)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Group(usize),
    /// `` $` ``: the tag text before the match.
    Before,
    /// `$'`: the tag text after the match.
    After,
}

/// Replacement template with JS `String.prototype.replace` semantics.
///
/// `$1`..`$99` insert capture groups that exist in the pattern; a reference
/// to a group the pattern does not have stays literal. `$&` is the whole
/// match, `` $` `` and `$'` the tag text around it, `$$` a single `$`, and
/// any other `$` is literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementTemplate {
    parts: Vec<TemplatePart>,
}

impl ReplacementTemplate {
    /// Inserts `text` as is, `$` included.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            parts: vec![TemplatePart::Literal(text.into())],
        }
    }

    /// `groups` is the number of capture groups in the pattern, not counting
    /// the whole match.
    pub fn parse(template: &str, groups: usize) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let digit = |i: usize| {
                after
                    .as_bytes()
                    .get(i)
                    .filter(|b| b.is_ascii_digit())
                    .map(|b| (b - b'0') as usize)
            };

            let (part, consumed) = match after.as_bytes().first() {
                Some(b'$') => (None, 1),
                Some(b'&') => (Some(TemplatePart::Group(0)), 1),
                Some(b'`') => (Some(TemplatePart::Before), 1),
                Some(b'\'') => (Some(TemplatePart::After), 1),
                _ => match (digit(0), digit(1)) {
                    (Some(a), Some(b)) if (1..=groups).contains(&(a * 10 + b)) => {
                        (Some(TemplatePart::Group(a * 10 + b)), 2)
                    }
                    (Some(a), _) if (1..=groups).contains(&a) => (Some(TemplatePart::Group(a)), 1),
                    _ => (None, 0),
                },
            };

            match part {
                Some(part) => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part);
                }
                None => literal.push('$'),
            }
            rest = &after[consumed..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Self { parts }
    }

    fn expand(&self, caps: &Captures, haystack: &str) -> String {
        let mut out = String::new();
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                // groups that did not participate insert nothing
                TemplatePart::Group(i) => out.push_str(caps.get(*i).map_or("", |m| m.as_str())),
                TemplatePart::Before => out.push_str(&haystack[..whole.start]),
                TemplatePart::After => out.push_str(&haystack[whole.end..]),
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ComponentMatcher {
    pub pattern: Regex,
    pub replacement: ReplacementTemplate,
}

impl ComponentMatcher {
    /// Unanchored test: custom patterns match anywhere in the tag.
    pub fn test(&self, tag: &str) -> bool {
        self.pattern.is_match(tag)
    }

    /// Replaces the first match in `tag`, leaving the rest of the tag intact.
    pub fn apply(&self, tag: &str) -> String {
        self.pattern
            .replace(tag, |caps: &Captures| self.replacement.expand(caps, tag))
            .into_owned()
    }
}

/// Kept absolute path -> root-relative paths that lost to it.
pub type ConflictRecord = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct ConfigureReport {
    pub matchers: usize,
    pub conflicts: ConflictRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatcherKey {
    Scanned(String),
    Custom(String),
}

enum Replacement {
    /// Scanned component path, inserted verbatim.
    Path(String),
    /// Custom value, a JS style replacement template.
    Template(String),
}

struct MatcherSource {
    pattern: String,
    replacement: Replacement,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Tag -> component path lookup with per-tag memoization.
///
/// Single-threaded: every operation takes `&mut self` and the driver is the
/// only caller. Lifecycle is `new` -> `configure` -> `resolve`* ->
/// `invalidate` -> `configure` ...
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    matchers: Vec<ComponentMatcher>,
    resolved: HashMap<String, String>,
    unresolved: HashSet<String>,
    has_any: bool,
    lookups: usize,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the matcher list from scratch.
    ///
    /// Missing directories contribute nothing. Any other filesystem error
    /// aborts configuration and leaves the registry empty.
    pub fn configure(&mut self, config: &ScanConfig) -> Result<ConfigureReport> {
        self.invalidate();

        let mut sources: IndexMap<MatcherKey, MatcherSource> = IndexMap::new();
        let mut conflicts = ConflictRecord::new();

        // without autoscan only the built-in dir is scanned
        let dirs = if config.autoscan {
            &config.dirs[..]
        } else {
            &config.dirs[..config.dirs.len().min(1)]
        };
        if !dirs.is_empty() {
            let scanned = scan_dirs(dirs, config, &mut conflicts)?;
            for (name, path) in scanned {
                sources.insert(
                    MatcherKey::Scanned(name.clone()),
                    MatcherSource {
                        pattern: format!("^{}$", regex::escape(&name)),
                        replacement: Replacement::Path(path),
                    },
                );
            }
        }

        for (key, value) in &config.custom {
            let name = key
                .strip_prefix('^')
                .and_then(|k| k.strip_suffix('$'))
                .unwrap_or(key);
            let source = MatcherSource {
                pattern: key.clone(),
                replacement: Replacement::Template(resolve_custom_path(value, &config.root_dir)),
            };
            // an override takes the scanned entry's slot
            match sources.get_index_of(&MatcherKey::Scanned(name.to_string())) {
                Some(index) => {
                    sources.shift_remove_index(index);
                    sources.shift_insert(index, MatcherKey::Custom(key.clone()), source);
                }
                None => {
                    sources.insert(MatcherKey::Custom(key.clone()), source);
                }
            }
        }

        let mut matchers = Vec::with_capacity(sources.len());
        for source in sources.into_values() {
            let pattern = Regex::new(&source.pattern).map_err(|e| BuildError::InvalidPattern {
                pattern: source.pattern.clone(),
                source: e,
            })?;
            let replacement = match source.replacement {
                Replacement::Path(path) => ReplacementTemplate::literal(path),
                Replacement::Template(template) => {
                    ReplacementTemplate::parse(&template, pattern.captures_len() - 1)
                }
            };
            matchers.push(ComponentMatcher {
                pattern,
                replacement,
            });
        }

        debug!(target: "uni::easycom", "{} matchers configured", matchers.len());
        self.has_any = !matchers.is_empty();
        self.matchers = matchers;

        Ok(ConfigureReport {
            matchers: self.matchers.len(),
            conflicts,
        })
    }

    /// Component path for `tag`, or `None` when the tag is not an easycom
    /// component (the caller then treats it as a native element).
    pub fn resolve(&mut self, tag: &str) -> Option<String> {
        if !self.has_any {
            return None;
        }
        if let Some(source) = self.resolved.get(tag) {
            return Some(source.clone());
        }
        if self.unresolved.contains(tag) {
            return None;
        }

        self.lookups += 1;
        let Some(matcher) = self.matchers.iter().find(|m| m.test(tag)) else {
            self.unresolved.insert(tag.to_string());
            return None;
        };
        let source = matcher.apply(tag);
        debug!(target: "uni::easycom", "resolved {} -> {}", tag, source);
        self.resolved.insert(tag.to_string(), source.clone());
        Some(source)
    }

    /// Drops matchers and both caches. Safe to call repeatedly.
    pub fn invalidate(&mut self) {
        self.matchers.clear();
        self.resolved.clear();
        self.unresolved.clear();
        self.has_any = false;
    }

    pub fn has_any(&self) -> bool {
        self.has_any
    }

    pub fn matchers(&self) -> &[ComponentMatcher] {
        &self.matchers
    }

    /// Number of uncached lookups that walked the matcher list.
    pub fn lookup_count(&self) -> usize {
        self.lookups
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTORY SCAN
// ═══════════════════════════════════════════════════════════════════════════════

fn scan_dirs(
    dirs: &[PathBuf],
    config: &ScanConfig,
    conflicts: &mut ConflictRecord,
) -> Result<IndexMap<String, String>> {
    let mut easycoms: IndexMap<String, String> = IndexMap::new();

    for dir in dirs {
        for (name, path) in scan_dir(dir, &config.root_dir, &config.extensions)? {
            match easycoms.get(&name) {
                // first registered wins
                Some(kept) => conflicts
                    .entry(kept.clone())
                    .or_default()
                    .push(relative_path(&config.root_dir, Path::new(&path))),
                None => {
                    easycoms.insert(name, path);
                }
            }
        }
    }

    if let Some(message) = conflict_message(&config.root_dir, conflicts) {
        warn!(target: "uni::easycom", "{}", message);
    }

    Ok(easycoms)
}

/// One line per conflict: the kept path relative to `root_dir`, then every
/// losing path, comma separated.
fn conflict_message(root_dir: &Path, conflicts: &ConflictRecord) -> Option<String> {
    if conflicts.is_empty() {
        return None;
    }
    let mut message = String::from("easycom component conflict:");
    for (kept, losers) in conflicts {
        message.push('\n');
        message.push_str(&relative_path(root_dir, Path::new(kept)));
        for loser in losers {
            message.push(',');
            message.push_str(loser);
        }
    }
    Some(message)
}

/// Scans the immediate child folders of `dir`. Folder `X` contributes
/// `X -> <folder>/X<ext>` when an entry named exactly `X<ext>` exists in it.
///
/// Names are compared against the folder listing instead of probing the
/// filesystem, which would give false positives on case-insensitive
/// filesystems.
fn scan_dir(dir: &Path, root_dir: &Path, extensions: &[String]) -> Result<Vec<(String, String)>> {
    let dir = resolve_path(root_dir, dir);
    if !dir_exists(&dir)? {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        // symlinked folders are not followed
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        let files = list_entry_names(entry.path())?;
        if let Some(ext) = extensions
            .iter()
            .find(|ext| files.contains(&format!("{}{}", name, ext)))
        {
            let folder = path_to_string(entry.path());
            found.push((name.to_string(), format!("{}/{}{}", folder, name, ext)));
        }
    }
    Ok(found)
}

fn list_entry_names(folder: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

fn resolve_custom_path(value: &str, root_dir: &Path) -> String {
    match value.strip_prefix(ROOT_ALIAS) {
        Some(rest) => path_to_string(&resolve_path(root_dir, Path::new(rest))),
        None => value.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT DRIVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Easycom state of one project for the lifetime of a build or dev server.
///
/// `init` configures the registry once; subsequent calls are no-ops until
/// `refresh` forces a full invalidate + reconfigure (e.g. a component folder
/// was added while watching).
#[derive(Debug)]
pub struct EasycomProject {
    layout: ProjectLayout,
    registry: ComponentRegistry,
    config: Option<ScanConfig>,
}

impl EasycomProject {
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            registry: ComponentRegistry::new(),
            config: None,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn scan_config(&self, options: &EasycomOptions) -> Result<ScanConfig> {
        ScanConfig::for_project(&self.layout, options)
    }

    /// Configures on the first call only. Returns `None` when already
    /// initialized.
    pub fn init(&mut self, options: &EasycomOptions) -> Result<Option<ConfigureReport>> {
        if self.config.is_some() {
            return Ok(None);
        }
        self.refresh(options).map(Some)
    }

    pub fn refresh(&mut self, options: &EasycomOptions) -> Result<ConfigureReport> {
        // a failed configure leaves the project uninitialized so `init` retries
        self.config = None;
        let config = self.scan_config(options)?;
        self.registry.invalidate();
        let report = self.registry.configure(&config)?;
        self.config = Some(config);
        Ok(report)
    }

    pub fn resolve(&mut self, tag: &str) -> Option<String> {
        self.registry.resolve(tag)
    }

    pub fn config(&self) -> Option<&ScanConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Whether a change to `path` can alter the scan result: a direct
    /// `components/*/*.vue` or `uni_modules/*/components/*/*.vue` file.
    pub fn is_easycom_file(&self, path: &Path) -> bool {
        let absolute = resolve_path(&self.layout.input_dir, path);
        let input_dir = resolve_path(Path::new("."), &self.layout.input_dir);
        if !absolute.starts_with(&input_dir) {
            return false;
        }
        let relative = relative_path(&input_dir, &absolute);
        EASYCOM_FILE_RE.is_match(&relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(pattern: &str, template: &str, tag: &str) -> String {
        let pattern = Regex::new(pattern).unwrap();
        let matcher = ComponentMatcher {
            replacement: ReplacementTemplate::parse(template, pattern.captures_len() - 1),
            pattern,
        };
        matcher.apply(tag)
    }

    #[test]
    fn test_replacement_template_group_references() {
        assert_eq!(expand("^uni-(.*)", "c/uni-$1/uni-$1.vue", "uni-badge"), "c/uni-badge/uni-badge.vue");
        assert_eq!(expand("card", "[$&]", "my-card"), "my-[card]");
        assert_eq!(expand("^(a)(b)?", "$1$2.vue", "ax"), "a.vuex");
        assert_eq!(expand("^(x)", "$01.vue", "x"), "x.vue");
    }

    #[test]
    fn test_replacement_template_literal_dollars() {
        assert_eq!(expand("^a$", "cost$$", "a"), "cost$");
        assert_eq!(expand("^a$", "$name", "a"), "$name");
        assert_eq!(expand("^a$", "x$0y", "a"), "x$0y");
        assert_eq!(expand("^a$", "end$", "a"), "end$");
    }

    #[test]
    fn test_replacement_template_missing_group_stays_literal() {
        assert_eq!(expand("^u-(.*)", "lib/u-$1/$2.vue", "u-btn"), "lib/u-btn/$2.vue");
        // `$12` with one group is `$1` followed by `2`
        assert_eq!(expand("^(a)", "x$12y", "a"), "xa2y");
        assert_eq!(expand("^a$", "x$12y", "a"), "x$12y");
    }

    #[test]
    fn test_replacement_template_surrounding_text() {
        assert_eq!(expand("card", "[$`|$']", "my-card-x"), "my-[my-|-x]-x");
    }

    #[test]
    fn test_literal_template_keeps_dollar() {
        let matcher = ComponentMatcher {
            pattern: Regex::new("^Foo$").unwrap(),
            replacement: ReplacementTemplate::literal("/p/$1/Foo.vue"),
        };
        assert_eq!(matcher.apply("Foo"), "/p/$1/Foo.vue");
    }

    #[test]
    fn test_conflict_message() {
        let mut conflicts = ConflictRecord::new();
        conflicts.insert(
            "/project/components/Foo/Foo.vue".to_string(),
            vec!["b/Foo/Foo.vue".to_string(), "c/Foo/Foo.vue".to_string()],
        );
        conflicts.insert("/project/components/Bar/Bar.vue".to_string(), vec!["b/Bar/Bar.vue".to_string()]);

        assert_eq!(
            conflict_message(Path::new("/project"), &conflicts).as_deref(),
            Some(
                "easycom component conflict:\n\
                 components/Foo/Foo.vue,b/Foo/Foo.vue,c/Foo/Foo.vue\n\
                 components/Bar/Bar.vue,b/Bar/Bar.vue"
            )
        );
        assert_eq!(conflict_message(Path::new("/project"), &ConflictRecord::new()), None);
    }

    #[test]
    fn test_resolve_before_configure_is_noop() {
        let mut registry = ComponentRegistry::new();
        assert_eq!(registry.resolve("Foo"), None);
        assert_eq!(registry.resolve("view"), None);
        assert_eq!(registry.lookup_count(), 0);
        assert!(!registry.has_any());
    }

    #[test]
    fn test_custom_capture_expansion() {
        let mut config = ScanConfig::new("/project");
        config
            .custom
            .insert("^uni-(.*)".to_string(), "@/components/uni-$1/uni-$1.vue".to_string());
        let mut registry = ComponentRegistry::new();
        registry.configure(&config).unwrap();

        assert_eq!(
            registry.resolve("uni-badge").as_deref(),
            Some("/project/components/uni-badge/uni-badge.vue")
        );
    }

    #[test]
    fn test_custom_verbatim_package_path() {
        let mut config = ScanConfig::new("/project");
        config
            .custom
            .insert("^u-(.*)".to_string(), "uview-ui/components/u-$1/u-$1.vue".to_string());
        let mut registry = ComponentRegistry::new();
        registry.configure(&config).unwrap();

        assert_eq!(
            registry.resolve("u-button").as_deref(),
            Some("uview-ui/components/u-button/u-button.vue")
        );
    }

    #[test]
    fn test_unanchored_pattern_matches_substring() {
        let mut config = ScanConfig::new("/project");
        config.custom.insert("card".to_string(), "ui/card.vue".to_string());
        let mut registry = ComponentRegistry::new();
        registry.configure(&config).unwrap();

        // only the matched part of the tag is replaced
        assert_eq!(registry.resolve("my-card").as_deref(), Some("my-ui/card.vue"));
        assert_eq!(registry.resolve("button"), None);
    }

    #[test]
    fn test_custom_reference_to_missing_group_is_literal() {
        let mut config = ScanConfig::new("/project");
        config.custom.insert("^u-(.*)".to_string(), "lib/u-$1/$2.vue".to_string());
        let mut registry = ComponentRegistry::new();
        registry.configure(&config).unwrap();

        assert_eq!(registry.resolve("u-btn").as_deref(), Some("lib/u-btn/$2.vue"));
    }

    #[test]
    fn test_invalid_custom_pattern_is_an_error() {
        let mut config = ScanConfig::new("/project");
        config.custom.insert("^uni-(".to_string(), "x".to_string());
        let mut registry = ComponentRegistry::new();
        let err = registry.configure(&config).unwrap_err();
        assert!(matches!(err, BuildError::InvalidPattern { .. }));
        assert!(!registry.has_any());
    }

    #[test]
    fn test_negative_results_are_cached() {
        let mut config = ScanConfig::new("/project");
        config.custom.insert("^Bar$".to_string(), "bar.vue".to_string());
        let mut registry = ComponentRegistry::new();
        registry.configure(&config).unwrap();

        assert_eq!(registry.resolve("view"), None);
        assert_eq!(registry.resolve("view"), None);
        assert_eq!(registry.lookup_count(), 1);
    }
}
