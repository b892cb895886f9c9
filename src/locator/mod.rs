//! File-name inference.
//!
//! The loader is not authoritative about packaged or minified layout, so
//! the physical file hosting a module has to be guessed: bundle metadata
//! first, then per-plugin path formatters, then a walk over the module's
//! static dependents for plugin families whose compiled output is not
//! derivable from the name alone.
//!
//! # API
//!
//! - [`BundleMap`]: bundle path → member module names, loadable from a
//!   JSON manifest
//! - [`FileLocator::candidates`]: ordered, deduplicated path guesses for
//!   one module name

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::graph::{DependencyGraph, ModuleId};

// ==================
// Errors
// ==================

#[derive(Debug, Error)]
pub enum LocatorError {
    /// The bundle manifest file could not be read
    #[error("cannot read bundle manifest: {0}")]
    ManifestRead(#[from] std::io::Error),

    /// The bundle manifest was not a JSON map of path → name list
    #[error("malformed bundle manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),
}

// ==================
// Bundle Metadata
// ==================

/// Bundle path → member module names. Bundles may overlap; a module can
/// be shipped in several bundles at once.
#[derive(Debug, Clone, Default)]
pub struct BundleMap {
    members: BTreeMap<String, BTreeSet<String>>,
}

impl BundleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a manifest of shape `{"path/bundle.js": ["Mod/A", ...]}`.
    pub fn from_file(path: &Path) -> Result<Self, LocatorError> {
        let text = fs::read_to_string(path)?;
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(&text)?;
        let mut map = Self::new();
        for (bundle, names) in raw {
            map.insert(bundle, names);
        }
        Ok(map)
    }

    pub fn insert(
        &mut self,
        bundle: impl Into<String>,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.members
            .entry(bundle.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
    }

    /// Every bundle path whose member list contains `name`.
    pub fn bundles_for(&self, name: &str) -> Vec<String> {
        self.members
            .iter()
            .filter(|(_, names)| names.contains(name))
            .map(|(bundle, _)| bundle.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ==================
// Locator
// ==================

type PathFormatter = fn(&FileLocator, &str) -> Option<String>;

/// Fixed formatter order. Every formatter that yields a path contributes
/// a candidate; they are not mutually exclusive in principle, though the
/// plugin prefixes make at most one of them match any given name.
const FORMATTERS: &[PathFormatter] = &[
    FileLocator::data_file,
    FileLocator::themed_style,
    FileLocator::style,
    FileLocator::wml_template,
    FileLocator::tmpl_template,
    FileLocator::plain_text,
    FileLocator::localization,
    FileLocator::cdn,
    FileLocator::script_fallback,
];

/// Plugin families whose compiled output cannot be derived from the
/// module name alone, prompting the static-dependent walk.
const DEPENDENT_SCAN_PREFIXES: &[&str] = &["css!", "wml!", "tmpl!", "i18n!"];

/// Guesses the physical file hosting a module.
pub struct FileLocator {
    bundles: BundleMap,
    release: bool,
}

impl FileLocator {
    pub fn new(bundles: BundleMap, release: bool) -> Self {
        Self { bundles, release }
    }

    /// Ordered path guesses for `name`. Bundles win outright; otherwise
    /// the formatter chain runs, and underivable plugin families union in
    /// paths discoverable from static, already-defined dependents.
    pub fn candidates(&self, name: &str, graph: &DependencyGraph) -> Vec<String> {
        let bundled = self.bundles.bundles_for(name);
        if !bundled.is_empty() {
            return bundled;
        }

        let mut out = self.formatted(name);

        if needs_dependent_scan(name) {
            if let Some(id) = graph.modules.lookup(name) {
                let mut visited = HashSet::new();
                visited.insert(id);
                self.scan_dependents(id, graph, &mut visited, &mut out);
            }
        }

        let mut seen = HashSet::new();
        out.retain(|path| seen.insert(path.clone()));
        out
    }

    /// Bundle and formatter candidates only, no graph walk.
    fn direct_candidates(&self, name: &str) -> Vec<String> {
        let bundled = self.bundles.bundles_for(name);
        if !bundled.is_empty() {
            return bundled;
        }
        self.formatted(name)
    }

    fn formatted(&self, name: &str) -> Vec<String> {
        FORMATTERS
            .iter()
            .filter_map(|format| format(self, name))
            .collect()
    }

    fn scan_dependents(
        &self,
        id: ModuleId,
        graph: &DependencyGraph,
        visited: &mut HashSet<ModuleId>,
        out: &mut Vec<String>,
    ) {
        let Some(node) = graph.modules.get(id) else {
            return;
        };
        for &dependent in &node.dependents.static_ {
            let Some(parent) = graph.modules.get(dependent) else {
                continue;
            };
            if !parent.defined || !visited.insert(dependent) {
                continue;
            }
            out.extend(self.direct_candidates(&parent.name));
            self.scan_dependents(dependent, graph, visited, out);
        }
    }

    // ==================
    // Formatters
    // ==================

    fn data_file(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("json!")?;
        Some(format!("{}.{}", rest, self.ext("json")))
    }

    fn themed_style(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("css!theme?")?;
        Some(format!("{}.{}", rest, self.ext("css")))
    }

    fn style(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("css!")?;
        if rest.starts_with("theme?") {
            return None;
        }
        Some(format!("{}.{}", rest, self.ext("css")))
    }

    fn wml_template(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("wml!")?;
        Some(format!("{}.{}", rest, self.ext("wml")))
    }

    fn tmpl_template(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("tmpl!")?;
        Some(format!("{}.{}", rest, self.ext("tmpl")))
    }

    fn plain_text(&self, name: &str) -> Option<String> {
        name.strip_prefix("text!").map(str::to_string)
    }

    fn localization(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("i18n!")?;
        Some(format!("{}/i18n.json", rest))
    }

    fn cdn(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("cdn!")?;
        Some(format!("/cdn/{}", rest))
    }

    fn script_fallback(&self, name: &str) -> Option<String> {
        if name.contains('!') {
            return None;
        }
        Some(format!("{}.{}", name, self.ext("js")))
    }

    /// Release builds ship minified artifacts for script-like content.
    fn ext(&self, base: &str) -> String {
        if self.release {
            format!("min.{}", base)
        } else {
            base.to_string()
        }
    }
}

/// Locale bundles follow `.../lang/<locale>` and ship beside whichever
/// module pulled them in, so they qualify for the dependent walk too.
fn needs_dependent_scan(name: &str) -> bool {
    if DEPENDENT_SCAN_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        return true;
    }
    static LOCALE: OnceLock<Regex> = OnceLock::new();
    let locale = LOCALE.get_or_init(|| {
        Regex::new(r"(^|/)lang/[a-z]{2}(-[A-Z]{2})?$")
            .unwrap_or_else(|e| panic!("locale pattern: {}", e))
    });
    locale.is_match(name)
}
