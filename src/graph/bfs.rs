//! BFS over reverse import edges

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use super::{ModuleGraph, ModuleId};

/// Reverse BFS from `start`, collecting test files that reach it.
///
/// Test importers are recorded and not expanded; non-test importers are
/// enqueued so impact propagates through helper layers. The visited set is
/// keyed by normalized absolute path, which bounds the walk on cycles.
pub(super) fn reverse_bfs_tests(graph: &ModuleGraph, start: &Path) -> Vec<ModuleId> {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    let mut tests = Vec::new();

    visited.insert(start.to_path_buf());
    queue.push_back(start.to_path_buf());

    while let Some(current) = queue.pop_front() {
        for id in graph.importers_of(&current) {
            let node = graph.node(id);
            if !visited.insert(node.path.clone()) {
                continue;
            }
            if graph.is_vendored(&node.path) {
                continue;
            }
            if node.is_test {
                tests.push(id);
            } else {
                queue.push_back(node.path.clone());
            }
        }
    }

    // Ids follow relative-path order
    tests.sort_unstable();
    tests
}
