//! Module-name normalization rules.
//!
//! Loader module identifiers carry plugin prefixes (`css!`, `json!`, ...)
//! and dependency lists mix real modules with loader-helper pseudo-names.
//! Everything that decides which part of a name is identity lives here.

use std::sync::OnceLock;

use regex::Regex;

/// Name of the synthetic root node that owns top-level loader calls.
pub const ROOT_MODULE_NAME: &str = "<root>";

/// Loader-helper names that appear in dependency lists but are not modules.
pub const PSEUDO_DEPENDENCIES: &[&str] = &["require", "exports", "module", "tslib"];

/// Plugin prefixes that do not affect module identity and are stripped
/// before lookup.
pub const NEUTRAL_PREFIXES: &[&str] = &["optional!", "preload!"];

/// Plugins that never surface a separate define callback; nodes created for
/// them under an already-defined parent are marked defined and initialized
/// right away.
pub const CALLBACK_FREE_PREFIXES: &[&str] = &["json!", "css!"];

/// Dependency names the loader resolves to dynamic-import facades instead
/// of module values.
pub const IMPORT_FACADES: &[&str] = &["require", "Loader/Library", "Loader/ModuleStubs"];

/// Strips identity-neutral plugin prefixes from a raw name.
///
/// Prefixes may stack (`optional!preload!Foo/bar`), so stripping repeats
/// until none match.
pub fn canonical_name(raw: &str) -> &str {
    let mut name = raw;
    loop {
        let before = name;
        for prefix in NEUTRAL_PREFIXES {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest;
            }
        }
        if name == before {
            return name;
        }
    }
}

/// True for dependency-list entries that name loader plumbing, not modules.
pub fn is_pseudo_dependency(name: &str) -> bool {
    PSEUDO_DEPENDENCIES.contains(&name)
}

/// True when the name carries a plugin whose module needs no define callback.
pub fn is_callback_free(name: &str) -> bool {
    CALLBACK_FREE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// True for dependency names the loader resolves to an import facade.
pub fn is_import_facade(name: &str) -> bool {
    IMPORT_FACADES.contains(&name)
}

/// Splits a name into its plugin prefix and payload at the first `!`.
pub fn plugin_split(name: &str) -> Option<(&str, &str)> {
    name.split_once('!')
}

/// Whether a module name marks the module as deprecated.
///
/// Matches a `Deprecated/` path segment at the start of the name or right
/// after a plugin prefix.
pub fn is_deprecated_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(^|!)Deprecated/").unwrap_or_else(|e| panic!("deprecated pattern: {}", e))
    });
    pattern.is_match(name)
}
