//! Filter and sort tables for the module and file entities.

use std::cmp::Ordering;

use serde_json::Value;

use crate::graph::{FileNode, ModuleNode};

use super::{EntityTables, Predicate};

fn module_name(value: &Value) -> Option<Predicate<ModuleNode>> {
    let needle = value.as_str()?.to_lowercase();
    Some(Box::new(move |m: &ModuleNode| {
        m.name.to_lowercase().contains(&needle)
    }))
}

fn module_defined(value: &Value) -> Option<Predicate<ModuleNode>> {
    let wanted = value.as_bool()?;
    Some(Box::new(move |m: &ModuleNode| m.defined == wanted))
}

fn module_initialized(value: &Value) -> Option<Predicate<ModuleNode>> {
    let wanted = value.as_bool()?;
    Some(Box::new(move |m: &ModuleNode| m.initialized == wanted))
}

fn module_deprecated(value: &Value) -> Option<Predicate<ModuleNode>> {
    let wanted = value.as_bool()?;
    Some(Box::new(move |m: &ModuleNode| m.deprecated == wanted))
}

fn cmp_module_name(a: &ModuleNode, b: &ModuleNode) -> Ordering {
    a.name.cmp(&b.name)
}

fn cmp_module_id(a: &ModuleNode, b: &ModuleNode) -> Ordering {
    a.id.cmp(&b.id)
}

/// Tables backing `module.query`.
///
/// The `files` and `dependentOnFiles` filter keys are resolved ahead of
/// this table by candidate-set narrowing; they are deliberately absent
/// here so the generic pass skips them.
pub static MODULE_TABLES: EntityTables<ModuleNode> = EntityTables {
    filters: &[
        ("name", module_name),
        ("defined", module_defined),
        ("initialized", module_initialized),
        ("deprecated", module_deprecated),
    ],
    comparators: &[("name", cmp_module_name), ("id", cmp_module_id)],
};

fn file_name(value: &Value) -> Option<Predicate<FileNode>> {
    let needle = value.as_str()?.to_lowercase();
    Some(Box::new(move |f: &FileNode| {
        f.name.to_lowercase().contains(&needle)
    }))
}

fn file_path(value: &Value) -> Option<Predicate<FileNode>> {
    let needle = value.as_str()?.to_lowercase();
    Some(Box::new(move |f: &FileNode| {
        f.path.to_lowercase().contains(&needle)
    }))
}

fn cmp_file_name(a: &FileNode, b: &FileNode) -> Ordering {
    a.name.cmp(&b.name)
}

fn cmp_file_path(a: &FileNode, b: &FileNode) -> Ordering {
    a.path.cmp(&b.path)
}

fn cmp_file_id(a: &FileNode, b: &FileNode) -> Ordering {
    a.id.cmp(&b.id)
}

/// Tables backing `file.query`.
pub static FILE_TABLES: EntityTables<FileNode> = EntityTables {
    filters: &[("name", file_name), ("path", file_path)],
    comparators: &[
        ("name", cmp_file_name),
        ("path", cmp_file_path),
        ("id", cmp_file_id),
    ],
};
