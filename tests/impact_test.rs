//! Impact resolution integration tests
//!
//! Histories are in memory; the graph is built from the same sources.

mod common;

use common::{phantom_root, MemoryHistory};
use tia::diff_parse::{ChangeStatus, FileChange};
use tia::graph::{GraphOptions, ModuleGraph};
use tia::impact::{
    AnalysisReport, ImpactResolver, ImpactType, SkipReason, TestSelection, ALL_FILES_REF,
};
use tia::parser::TestExtractor;

const AUTH: &str = "\
export function login(user: string, password: string): boolean {
  return password === 'good';
}
";

const LOGIN_SPEC: &str = "\
import { login } from './auth';

test('accepts good password', () => {
  expect(login('a', 'good')).toBe(true);
});

test('shows error on bad password', () => {
  expect(login('a', 'bad')).toBe(false);
});
";

/// Current sources at HEAD plus parent sources at HEAD~1
struct Fixture {
    graph: ModuleGraph,
    history: MemoryHistory,
}

fn fixture(current: &[(&str, &str)], parent: &[(&str, &str)]) -> Fixture {
    let graph = ModuleGraph::from_sources(
        &phantom_root(),
        current.iter().copied(),
        &GraphOptions::default(),
    );
    let mut history = MemoryHistory::new();
    for (path, source) in current {
        history = history.with("HEAD", path, source);
    }
    for (path, source) in parent {
        history = history.with("HEAD~1", path, source);
    }
    Fixture { graph, history }
}

fn markers() -> Vec<String> {
    vec!["test".into(), "spec".into()]
}

fn analyze(fx: &Fixture, changes: &[FileChange]) -> AnalysisReport {
    let extractor = TestExtractor::default();
    let resolver = ImpactResolver::new(&phantom_root(), &extractor, &fx.graph, &markers());
    resolver.analyze(changes, "HEAD", Some("HEAD~1"), Some(&fx.history))
}

fn modified(path: &str, lines: &[u32]) -> FileChange {
    FileChange::new(path, ChangeStatus::Modified).with_lines(lines.iter().copied())
}

fn names(report: &AnalysisReport, impact: ImpactType) -> Vec<String> {
    report
        .tests()
        .filter(|t| t.impact_type == impact)
        .map(|t| t.test_name.clone())
        .collect()
}

// ===== Intersection =====

fn span_source() -> String {
    let mut source = "// pad\n".repeat(19);
    source.push_str("test('span', () => {\n");
    source.push_str(&"  step();\n".repeat(14));
    source.push_str("});\n");
    source
}

#[test]
fn test_intersection_boundaries() {
    let source = span_source();
    let fx = fixture(
        &[("src/span.spec.ts", source.as_str())],
        &[("src/span.spec.ts", source.as_str())],
    );

    for (lines, selected) in [
        (vec![19], false),
        (vec![36], false),
        (vec![19, 36], false),
        (vec![20], true),
        (vec![35], true),
        (vec![27], true),
    ] {
        let report = analyze(&fx, &[modified("src/span.spec.ts", &lines)]);
        assert_eq!(
            names(&report, ImpactType::Direct) == vec!["span"],
            selected,
            "lines {:?}",
            lines
        );
    }
}

#[test]
fn test_end_to_end_auth_and_login() {
    let fx = fixture(
        &[("src/auth.ts", AUTH), ("src/login.spec.ts", LOGIN_SPEC)],
        &[("src/auth.ts", AUTH), ("src/login.spec.ts", LOGIN_SPEC)],
    );
    let changes = [
        modified("src/auth.ts", &[2]),
        modified("src/login.spec.ts", &[8]),
    ];
    let report = analyze(&fx, &changes);

    assert_eq!(report.file_results.len(), 1);
    assert_eq!(report.file_results[0].file, "src/login.spec.ts");
    assert_eq!(
        names(&report, ImpactType::Direct),
        vec!["shows error on bad password"]
    );
    assert!(names(&report, ImpactType::Dependency).is_empty());

    let selection = TestSelection::from_report(&report);
    assert_eq!(selection.files, vec!["src/login.spec.ts"]);
    assert_eq!(selection.tests, vec!["shows error on bad password"]);
    assert_eq!(selection.grep, "shows error on bad password");
    assert!(!selection.has_dynamic_tests);
}

#[test]
fn test_end_to_end_with_other_importer() {
    let session_spec = "\
import { login } from './auth';

describe('session', () => {
  it('keeps user (logged) in', () => {
    expect(login('a', 'good')).toBe(true);
  });
});
";
    let fx = fixture(
        &[
            ("src/auth.ts", AUTH),
            ("src/login.spec.ts", LOGIN_SPEC),
            ("src/session.spec.ts", session_spec),
        ],
        &[("src/login.spec.ts", LOGIN_SPEC)],
    );
    let changes = [
        modified("src/auth.ts", &[2]),
        modified("src/login.spec.ts", &[8]),
    ];
    let report = analyze(&fx, &changes);

    assert_eq!(
        names(&report, ImpactType::Direct),
        vec!["shows error on bad password"]
    );
    assert_eq!(
        names(&report, ImpactType::Dependency),
        vec!["session", "keeps user (logged) in"]
    );
    let dependent = &report.file_results[1];
    assert_eq!(dependent.file, "src/session.spec.ts");
    assert_eq!(dependent.status, None);

    let selection = TestSelection::from_report(&report);
    assert_eq!(
        selection.files,
        vec!["src/login.spec.ts", "src/session.spec.ts"]
    );
    assert_eq!(
        selection.grep,
        r"shows error on bad password|session|keeps user \(logged\) in"
    );
    assert_eq!(report.total_tests_selected, 3);
}

// ===== Dynamic names =====

#[test]
fn test_dynamic_name_never_in_pattern() {
    let source = "\
const cases = [1, 2];
for (const n of cases) {
  test(`handles ${n}`, () => {
    expect(n).toBeGreaterThan(0);
  });
}
";
    let fx = fixture(
        &[("src/rows.test.ts", source)],
        &[("src/rows.test.ts", source)],
    );
    let report = analyze(&fx, &[modified("src/rows.test.ts", &[4])]);

    assert_eq!(report.total_tests_selected, 1);
    assert!(report.file_results[0].has_dynamic_tests);

    let selection = TestSelection::from_report(&report);
    assert!(selection.tests.is_empty());
    assert_eq!(selection.grep, "");
    assert_eq!(selection.files, vec!["src/rows.test.ts"]);
    assert_eq!(
        selection.files_with_dynamic_tests,
        vec!["src/rows.test.ts"]
    );
    assert!(selection.has_dynamic_tests);
}

// ===== Removal =====

#[test]
fn test_removal_is_name_set_difference() {
    let old = "test('A', () => {});\ntest('B', () => {});\ntest('C', () => {});\n";
    let new = "test('A', () => {});\ntest('C', () => {});\n";
    let fx = fixture(&[("src/abc.spec.ts", new)], &[("src/abc.spec.ts", old)]);
    let report = analyze(&fx, &[modified("src/abc.spec.ts", &[])]);

    assert_eq!(names(&report, ImpactType::Removed), vec!["B"]);
    let removed = report
        .tests()
        .find(|t| t.impact_type == ImpactType::Removed)
        .unwrap();
    assert_eq!(removed.line, None);

    let selection = TestSelection::from_report(&report);
    assert_eq!(selection.files, vec!["src/abc.spec.ts"]);
    assert_eq!(selection.tests, vec!["B"]);
    assert_eq!(selection.grep, "B");
    assert_eq!(selection.removed_tests.len(), 1);
    assert_eq!(selection.removed_tests[0].test_name, "B");
}

#[test]
fn test_moved_test_is_not_removed() {
    let old = "test('A', () => {});\n\ntest('B', () => {});\n";
    let new = "test('B', () => {});\n\ntest('A', () => {});\n";
    let fx = fixture(&[("src/m.spec.ts", new)], &[("src/m.spec.ts", old)]);
    let report = analyze(&fx, &[modified("src/m.spec.ts", &[1, 3])]);

    assert!(names(&report, ImpactType::Removed).is_empty());
    assert_eq!(names(&report, ImpactType::Direct), vec!["B", "A"]);
}

#[test]
fn test_renamed_test_reads_as_removal_plus_addition() {
    let old = "test('old name', () => {});\n";
    let new = "test('new name', () => {});\n";
    let fx = fixture(&[("src/r.spec.ts", new)], &[("src/r.spec.ts", old)]);
    let report = analyze(&fx, &[modified("src/r.spec.ts", &[1])]);

    assert_eq!(names(&report, ImpactType::Direct), vec!["new name"]);
    assert_eq!(names(&report, ImpactType::Removed), vec!["old name"]);
}

#[test]
fn test_removed_dynamic_flag_comes_from_old_version() {
    let old = "const n = 1;\ntest(`case ${n}`, () => {});\n";
    let new = "const n = 1;\n";
    let fx = fixture(&[("src/d.spec.ts", new)], &[("src/d.spec.ts", old)]);
    let report = analyze(&fx, &[modified("src/d.spec.ts", &[])]);

    let removed: Vec<_> = report.tests().collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].impact_type, ImpactType::Removed);
    assert!(removed[0].is_dynamic);
}

#[test]
fn test_deleted_test_file_reports_all_removed() {
    let old = "describe('gone', () => {\n  it('x', () => {});\n  it('y', () => {});\n});\n";
    let fx = fixture(&[], &[("src/gone.spec.ts", old)]);
    let change = FileChange::new("src/gone.spec.ts", ChangeStatus::Deleted);
    let report = analyze(&fx, &[change]);

    assert_eq!(report.file_results.len(), 1);
    assert_eq!(report.file_results[0].status, Some(ChangeStatus::Deleted));
    assert_eq!(names(&report, ImpactType::Removed), vec!["gone", "x", "y"]);

    // Names are still reported; the file itself is gone
    let selection = TestSelection::from_report(&report);
    assert!(selection.files.is_empty());
    assert_eq!(selection.tests, vec!["gone", "x", "y"]);
    assert_eq!(selection.removed_tests.len(), 3);
}

#[test]
fn test_deleted_test_file_without_history_still_reported() {
    let fx = fixture(&[], &[]);
    let change = FileChange::new("src/gone.spec.ts", ChangeStatus::Deleted);
    let report = analyze(&fx, &[change]);

    assert_eq!(report.file_results.len(), 1);
    assert!(report.file_results[0].tests.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(
        report.diagnostics[0].reason,
        SkipReason::MissingHistoricalContent
    );
}

#[test]
fn test_renamed_test_file_compares_old_path() {
    let old = "test('A', () => {});\ntest('B', () => {});\n";
    let new = "test('A', () => {});\n";
    let fx = fixture(&[("src/new.spec.ts", new)], &[("src/old.spec.ts", old)]);
    let mut change = FileChange::new("src/new.spec.ts", ChangeStatus::Renamed);
    change.old_path = Some("src/old.spec.ts".into());
    let report = analyze(&fx, &[change]);

    assert_eq!(report.file_results[0].file, "src/new.spec.ts");
    assert_eq!(names(&report, ImpactType::Removed), vec!["B"]);
}

#[test]
fn test_root_commit_skips_removal_quietly() {
    let fx = fixture(&[("src/a.spec.ts", "test('first', () => {});\n")], &[]);
    let extractor = TestExtractor::default();
    let resolver = ImpactResolver::new(&phantom_root(), &extractor, &fx.graph, &markers());
    let change = FileChange::new("src/a.spec.ts", ChangeStatus::Added).with_lines([1]);
    let report = resolver.analyze(&[change], "HEAD", None, Some(&fx.history));

    assert_eq!(names(&report, ImpactType::Direct), vec!["first"]);
    assert!(report.diagnostics.is_empty());
}

// ===== Dependency =====

#[test]
fn test_transitive_chain() {
    let fx = fixture(
        &[
            (
                "src/app.spec.ts",
                "import './helper1';\ntest('app works', () => {});\n",
            ),
            ("src/helper1.ts", "import './helper2';\n"),
            ("src/helper2.ts", "export const x = 1;\n"),
        ],
        &[],
    );
    let report = analyze(&fx, &[modified("src/helper2.ts", &[1])]);
    assert_eq!(names(&report, ImpactType::Dependency), vec!["app works"]);
}

#[test]
fn test_import_cycle_terminates() {
    let fx = fixture(
        &[
            (
                "src/app.spec.ts",
                "import './helper1';\ntest('app works', () => {});\n",
            ),
            ("src/helper1.ts", "import './helper2';\n"),
            ("src/helper2.ts", "import './helper1';\n"),
        ],
        &[],
    );
    let report = analyze(&fx, &[modified("src/helper2.ts", &[1])]);
    assert_eq!(names(&report, ImpactType::Dependency), vec!["app works"]);
}

#[test]
fn test_dependent_processed_once() {
    let fx = fixture(
        &[
            ("src/a.ts", ""),
            ("src/b.ts", ""),
            (
                "src/both.spec.ts",
                "import './a';\nimport './b';\ntest('uses both', () => {});\n",
            ),
        ],
        &[],
    );
    let report = analyze(
        &fx,
        &[modified("src/a.ts", &[1]), modified("src/b.ts", &[1])],
    );
    assert_eq!(report.file_results.len(), 1);
    assert_eq!(report.total_tests_selected, 1);
}

#[test]
fn test_deleted_helper_not_traversed() {
    let spec = "import './gone';\ntest('t', () => {});\n";
    let fx = fixture(
        &[("src/a.spec.ts", spec)],
        &[("src/gone.ts", "export {};\n")],
    );
    let change = FileChange::new("src/gone.ts", ChangeStatus::Deleted);
    let report = analyze(&fx, &[change]);
    assert!(report.file_results.is_empty());
}

#[test]
fn test_vendored_importers_ignored() {
    let fx = fixture(
        &[
            ("src/util.ts", ""),
            (
                "node_modules/pkg/util.spec.js",
                "require('./util');\ntest('vendored', () => {});\n",
            ),
        ],
        &[],
    );
    let report = analyze(&fx, &[modified("src/util.ts", &[1])]);
    assert!(report.file_results.is_empty());
}

// ===== Degradation =====

#[test]
fn test_unparseable_changed_test_falls_back_to_full_file() {
    let broken = "test('x', () => {\n  expect(1).toBe(1);\n";
    let fx = fixture(&[("src/broken.spec.ts", broken)], &[]);
    let report = analyze(&fx, &[modified("src/broken.spec.ts", &[2])]);

    let result = &report.file_results[0];
    assert!(result.requires_full_file);
    assert!(result.has_dynamic_tests);
    assert!(result.tests.is_empty());
    assert!(matches!(report.diagnostics[0].reason, SkipReason::ParseFailure(_)));

    let selection = TestSelection::from_report(&report);
    assert_eq!(selection.files, vec!["src/broken.spec.ts"]);
    assert_eq!(
        selection.files_with_dynamic_tests,
        vec!["src/broken.spec.ts"]
    );
}

#[test]
fn test_unparseable_dependent_falls_back_and_others_continue() {
    let fx = fixture(
        &[
            ("src/core.ts", ""),
            (
                "src/a.spec.ts",
                "import './core';\ntest('fine', () => {});\n",
            ),
            (
                "src/b.spec.ts",
                "import './core';\ntest('broken', () => {\n",
            ),
        ],
        &[],
    );
    let report = analyze(&fx, &[modified("src/core.ts", &[1])]);

    assert_eq!(report.file_results.len(), 2);
    assert_eq!(names(&report, ImpactType::Dependency), vec!["fine"]);
    assert!(report.file_results[1].requires_full_file);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].file, "src/b.spec.ts");
}

#[test]
fn test_unreadable_current_content() {
    // Not in history, and the phantom root has no work tree
    let fx = fixture(&[], &[]);
    let report = analyze(&fx, &[modified("src/ghost.spec.ts", &[1])]);
    assert!(report.file_results[0].requires_full_file);
    assert!(matches!(report.diagnostics[0].reason, SkipReason::Unreadable(_)));
}

// ===== Determinism and modes =====

#[test]
fn test_analysis_is_idempotent() {
    let fx = fixture(
        &[
            ("src/auth.ts", AUTH),
            ("src/login.spec.ts", LOGIN_SPEC),
            ("src/z.spec.ts", "import './auth';\ntest('z', () => {});\n"),
            ("src/y.spec.ts", "import './auth';\ntest('y', () => {});\n"),
        ],
        &[("src/login.spec.ts", LOGIN_SPEC)],
    );
    let changes = [
        modified("src/auth.ts", &[2]),
        modified("src/login.spec.ts", &[4]),
    ];
    let first = serde_json::to_string(&analyze(&fx, &changes)).unwrap();
    let second = serde_json::to_string(&analyze(&fx, &changes)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_analyze_all_covers_every_test_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let write = |rel: &str, content: &str| {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    };
    write("src/auth.ts", AUTH);
    write("src/login.spec.ts", LOGIN_SPEC);
    write(
        "test/other.test.js",
        "describe('other', () => { it('runs', () => {}); });\n",
    );

    let graph = ModuleGraph::build(dir.path(), &GraphOptions::default()).unwrap();
    let extractor = TestExtractor::default();
    let resolver = ImpactResolver::new(graph.root(), &extractor, &graph, &markers());
    let report = resolver.analyze_all();

    assert_eq!(report.commit_ref, ALL_FILES_REF);
    assert!(names(&report, ImpactType::Direct).is_empty());
    assert_eq!(
        names(&report, ImpactType::Dependency),
        vec![
            "accepts good password",
            "shows error on bad password",
            "other",
            "runs"
        ]
    );
    let selection = TestSelection::from_report(&report);
    assert_eq!(
        selection.files,
        vec!["src/login.spec.ts", "test/other.test.js"]
    );
}

#[test]
fn test_work_tree_fallback_without_history() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.spec.ts"), "test('on disk', () => {});\n").unwrap();

    let graph = ModuleGraph::build(dir.path(), &GraphOptions::default()).unwrap();
    let extractor = TestExtractor::default();
    let resolver = ImpactResolver::new(graph.root(), &extractor, &graph, &markers());
    let report = resolver.analyze(&[modified("a.spec.ts", &[1])], "HEAD", None, None);

    assert_eq!(names(&report, ImpactType::Direct), vec!["on disk"]);
}
