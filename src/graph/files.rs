//! File store.
//!
//! Files are discovered opportunistically from resource telemetry, keyed by
//! normalized path. A file may host many module definitions (bundles).

use std::collections::HashMap;

use super::module::{FileId, FileNode, ModuleId, ResourceEntry};

/// Strips the query string and fragment from a resource URL.
pub fn normalize_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Basename of a normalized path.
pub fn basename(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => path,
    }
}

/// Arena of file nodes with a normalized-path index.
#[derive(Debug, Default)]
pub struct FileStore {
    nodes: Vec<FileNode>,
    by_path: HashMap<String, FileId>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FileId) -> Option<&FileNode> {
        self.nodes.get(id.index())
    }

    pub fn lookup(&self, url: &str) -> Option<FileId> {
        self.by_path.get(normalize_path(url)).copied()
    }

    pub fn all_ids(&self) -> Vec<FileId> {
        (0..self.nodes.len() as u64).map(FileId).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lookup-or-create keyed by normalized path.
    ///
    /// Returns the file id and whether the node is new.
    pub fn note_resource(&mut self, entry: &ResourceEntry) -> (FileId, bool) {
        let path = normalize_path(&entry.url);
        if let Some(id) = self.by_path.get(path) {
            return (*id, false);
        }

        let id = FileId(self.nodes.len() as u64);
        let node = FileNode {
            id,
            path: path.to_string(),
            name: basename(path).to_string(),
            modules: Default::default(),
            discovered_at: entry.observed_at,
        };
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(node);
        (id, true)
    }

    /// Records that a file hosts a module.
    pub fn attach(&mut self, file: FileId, module: ModuleId) -> bool {
        match self.nodes.get_mut(file.index()) {
            Some(node) => node.modules.insert(module),
            None => false,
        }
    }

    /// Finds the first known file matching any of the candidate paths.
    ///
    /// A candidate matches on exact normalized path or as a whole-segment
    /// suffix of one (locator candidates are site-relative, observed URLs
    /// are absolute).
    pub fn find_candidate(&self, candidates: &[String]) -> Option<FileId> {
        for candidate in candidates {
            let wanted = normalize_path(candidate);
            if let Some(id) = self.by_path.get(wanted) {
                return Some(*id);
            }
            for node in &self.nodes {
                if path_matches(&node.path, wanted) {
                    return Some(node.id);
                }
            }
        }
        None
    }
}

/// Whether `candidate` names `path`, either exactly or as a suffix starting
/// on a `/` boundary.
pub fn path_matches(path: &str, candidate: &str) -> bool {
    if path == candidate {
        return true;
    }
    if let Some(head) = path.strip_suffix(candidate) {
        return head.ends_with('/');
    }
    false
}
