//! Module import graph
//!
//! An immutable arena of first-party source files and their import
//! specifiers, built once per analysis run. Answers "who imports this file"
//! by matching specifier text against the target's base name, which trades
//! some precision for not needing a bundler-grade module resolver.

mod bfs;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;
use thiserror::Error;

use crate::language::Language;
use crate::parser::{extract_imports, is_test_file, DEFAULT_TEST_FILE_MARKERS};

/// Directories never indexed or traversed when no config overrides them
pub const DEFAULT_VENDOR_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "bower_components",
    "third_party",
    "dist",
    "build",
    "coverage",
    ".git",
];

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Project root not found: {}", .0.display())]
    RootNotFound(PathBuf),
}

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// One indexed source file
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Normalized absolute path
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated
    pub rel_path: String,
    /// Raw module specifiers this file imports
    pub imports: BTreeSet<String>,
    /// Classified as a test file by name
    pub is_test: bool,
}

/// What to index
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Directory names pruned from indexing and traversal
    pub vendor_dirs: Vec<String>,
    /// Filename markers identifying test files
    pub test_file_markers: Vec<String>,
    /// Also index files excluded by .gitignore
    pub no_ignore: bool,
    /// Larger files are skipped (bytes)
    pub max_file_size: u64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            vendor_dirs: DEFAULT_VENDOR_DIRS.iter().map(|s| s.to_string()).collect(),
            test_file_markers: DEFAULT_TEST_FILE_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            no_ignore: false,
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

/// Frozen import graph for one project
#[derive(Debug)]
pub struct ModuleGraph {
    root: PathBuf,
    nodes: Vec<ModuleNode>,
    by_path: HashMap<PathBuf, ModuleId>,
    /// Specifier key -> ids of files importing something with that key
    importers: HashMap<String, Vec<ModuleId>>,
    vendor_dirs: HashSet<String>,
}

impl ModuleGraph {
    /// Walk `root` and index every supported source file.
    ///
    /// Respects .gitignore unless `no_ignore` is set; vendored directories are
    /// pruned during the walk. Import extraction runs in parallel. A file that
    /// cannot be read is indexed with no imports.
    pub fn build(root: &Path, options: &GraphOptions) -> Result<Self, GraphError> {
        let _span = tracing::info_span!("module_graph_build", root = %root.display()).entered();

        if !root.is_dir() {
            return Err(GraphError::RootNotFound(root.to_path_buf()));
        }
        let root = normalize_path(root);
        let files = enumerate_sources(&root, options);

        let entries: Vec<(String, BTreeSet<String>)> = files
            .par_iter()
            .filter_map(|(rel, language)| {
                let path = root.join(rel);
                let imports = match std::fs::read_to_string(&path) {
                    Ok(source) => match extract_imports(&source, *language) {
                        Ok(imports) => imports,
                        Err(e) => {
                            tracing::warn!(file = %rel, error = %e, "Import extraction failed");
                            BTreeSet::new()
                        }
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                        tracing::debug!(file = %rel, "Skipping non-UTF8 file");
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(file = %rel, error = %e, "Cannot read source file");
                        BTreeSet::new()
                    }
                };
                Some((rel.clone(), imports))
            })
            .collect();

        let graph = Self::freeze(root, entries, options);
        tracing::info!(files = graph.len(), "Module graph built");
        Ok(graph)
    }

    /// Build from in-memory sources keyed by relative path.
    ///
    /// Files with unsupported extensions or under vendored directories are
    /// ignored, as during a walk.
    pub fn from_sources<I, P, S>(root: &Path, sources: I, options: &GraphOptions) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<str>,
        S: AsRef<str>,
    {
        let vendor: HashSet<&str> = options.vendor_dirs.iter().map(String::as_str).collect();
        let entries = sources
            .into_iter()
            .filter_map(|(rel, source)| {
                let rel = rel.as_ref().replace('\\', "/");
                let language = Language::from_path(Path::new(&rel))?;
                if rel.split('/').any(|seg| vendor.contains(seg)) {
                    return None;
                }
                let imports = extract_imports(source.as_ref(), language).unwrap_or_default();
                Some((rel, imports))
            })
            .collect();
        Self::freeze(normalize_path(root), entries, options)
    }

    fn freeze(
        root: PathBuf,
        mut entries: Vec<(String, BTreeSet<String>)>,
        options: &GraphOptions,
    ) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let mut nodes = Vec::with_capacity(entries.len());
        let mut by_path = HashMap::with_capacity(entries.len());
        let mut importers: HashMap<String, Vec<ModuleId>> = HashMap::new();

        for (index, (rel_path, imports)) in entries.into_iter().enumerate() {
            let id = ModuleId(index as u32);
            let path = lexical_normalize(&root.join(&rel_path));
            for spec in &imports {
                for key in specifier_keys(spec) {
                    let ids = importers.entry(key).or_default();
                    if ids.last() != Some(&id) {
                        ids.push(id);
                    }
                }
            }
            by_path.insert(path.clone(), id);
            nodes.push(ModuleNode {
                is_test: is_test_file(Path::new(&rel_path), &options.test_file_markers),
                path,
                rel_path,
                imports,
            });
        }

        Self {
            root,
            nodes,
            by_path,
            importers,
            vendor_dirs: options.vendor_dirs.iter().cloned().collect(),
        }
    }

    /// Normalized project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn nodes(&self) -> &[ModuleNode] {
        &self.nodes
    }

    pub fn node(&self, id: ModuleId) -> &ModuleNode {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a file by absolute or root-relative path
    pub fn id_of(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(&self.absolute(path)).copied()
    }

    /// Files importing `path` directly, sorted, excluding the file itself.
    ///
    /// `path` need not be indexed: a deleted file still has importers.
    pub fn importers_of(&self, path: &Path) -> Vec<ModuleId> {
        let target = self.absolute(path);
        let mut found: Vec<ModuleId> = lookup_keys(&target)
            .iter()
            .filter_map(|key| self.importers.get(key))
            .flatten()
            .copied()
            .filter(|id| self.node(*id).path != target)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Test files importing `path` directly or through non-test files.
    ///
    /// Test files are leaves; cycles terminate. Sorted by relative path.
    pub fn transitive_test_importers(&self, path: &Path) -> Vec<ModuleId> {
        let _span =
            tracing::debug_span!("transitive_test_importers", path = %path.display()).entered();
        bfs::reverse_bfs_tests(self, &self.absolute(path))
    }

    /// Whether any component of `path` below the root is a vendored directory
    pub fn is_vendored(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.vendor_dirs.contains(n)),
            _ => false,
        })
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            lexical_normalize(&self.root.join(path))
        }
    }
}

/// Supported files under `root` as (relative path, language), sorted
fn enumerate_sources(root: &Path, options: &GraphOptions) -> Vec<(String, Language)> {
    let vendor: HashSet<String> = options.vendor_dirs.iter().cloned().collect();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(!options.no_ignore)
        .git_global(!options.no_ignore)
        .git_exclude(!options.no_ignore)
        .ignore(!options.no_ignore)
        .parents(!options.no_ignore)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.depth() > 0 && entry.file_type().is_some_and(|t| t.is_dir());
            let name = entry.file_name().to_string_lossy();
            !(is_dir && vendor.contains(&*name))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let Some(language) = Language::from_path(path) else {
            continue;
        };
        if let Ok(meta) = entry.metadata() {
            if meta.len() > options.max_file_size {
                tracing::debug!(path = %path.display(), bytes = meta.len(), "Skipping large file");
                continue;
            }
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        files.push((rel.to_string_lossy().replace('\\', "/"), language));
    }
    files.sort();
    files
}

/// Index keys for a specifier: its last segment, and that segment with one
/// extension stripped (`./auth.js` -> `auth.js`, `auth`)
fn specifier_keys(spec: &str) -> Vec<String> {
    let spec = spec.split(['?', '#']).next().unwrap_or(spec);
    let last = spec.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if last.is_empty() || last == "." || last == ".." {
        return Vec::new();
    }
    let mut keys = vec![last.to_string()];
    if let Some((stem, _)) = last.rsplit_once('.') {
        if !stem.is_empty() {
            keys.push(stem.to_string());
        }
    }
    keys
}

/// Keys under which importers of `target` are indexed
fn lookup_keys(target: &Path) -> Vec<String> {
    let Some(stem) = target.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let mut keys = vec![stem.to_string()];
    if stem == "index" {
        if let Some(dir) = target
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            keys.push(dir.to_string());
        }
    }
    keys
}

/// Canonicalize when the path exists, otherwise normalize lexically
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
