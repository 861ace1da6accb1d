//! Two-phase import resolution: cycles, re-export chains, wildcards,
//! relative specifiers, and deterministic ambiguity handling.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use taintrail::ast::{build, AstNode, Language, NormalizedAst};
use taintrail::diagnostics::{Diagnostic, UnresolvedReason};
use taintrail::module::{ModuleSet, SymbolKind};
use taintrail::resolver::{resolve, ModuleGraph};
use taintrail::{EffectiveLimits, TierLimits};

fn python(body: Vec<AstNode>) -> NormalizedAst {
    NormalizedAst {
        language: Language::Python,
        body,
    }
}

fn typescript(body: Vec<AstNode>) -> NormalizedAst {
    NormalizedAst {
        language: Language::Typescript,
        body,
    }
}

fn resolve_project(files: Vec<(&str, NormalizedAst)>) -> (ModuleSet, ModuleGraph) {
    let owned: Vec<(PathBuf, NormalizedAst)> = files
        .into_iter()
        .map(|(path, ast)| (PathBuf::from(path), ast))
        .collect();
    let refs: Vec<(PathBuf, &NormalizedAst)> =
        owned.iter().map(|(path, ast)| (path.clone(), ast)).collect();
    let set = ModuleSet::build(Path::new("/proj"), &refs);
    let limits = EffectiveLimits::apply(&TierLimits::enterprise(), None);
    let graph = resolve(&set, &limits);
    (set, graph)
}

#[test]
fn test_circular_imports_resolve_without_recursion() {
    let a = python(vec![
        build::import_from("b", &["g"], 1),
        build::func("f", &[], vec![], 2),
    ]);
    let b = python(vec![
        build::import_from("a", &["f"], 1),
        build::func("g", &[], vec![], 2),
    ]);
    let (set, graph) = resolve_project(vec![("a.py", a), ("b.py", b)]);

    let a_id = set.by_canon("a").unwrap();
    let b_id = set.by_canon("b").unwrap();
    assert!(graph.binding(a_id, "g").is_some());
    assert!(graph.binding(b_id, "f").is_some());
    assert!(graph.diagnostics.is_empty());
    assert_eq!(graph.imports_of(a_id), &[b_id]);
}

#[test]
fn test_reexport_chain_resolves_to_terminal_origin() {
    let core = python(vec![build::func("f", &[], vec![], 1)]);
    let mid = python(vec![build::reexport("core", &["f"], 1)]);
    let top = python(vec![build::import_from("mid", &["f"], 1)]);
    let (set, graph) = resolve_project(vec![
        ("core.py", core),
        ("mid.py", mid),
        ("top.py", top),
    ]);

    let top_id = set.by_canon("top").unwrap();
    let core_id = set.by_canon("core").unwrap();
    let bound = graph.binding(top_id, "f").unwrap();
    let symbol = set.symbol(bound);
    assert_eq!(symbol.module, core_id);
    assert_eq!(symbol.kind, SymbolKind::Function);
}

#[test]
fn test_reexport_cycle_hits_depth_cap() {
    let a = python(vec![build::reexport("b", &["x"], 1)]);
    let b = python(vec![build::reexport("a", &["x"], 1)]);
    let (_, graph) = resolve_project(vec![("a.py", a), ("b.py", b)]);

    assert!(graph.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnresolvedImport {
            reason: UnresolvedReason::ReexportDepthExceeded,
            ..
        }
    )));
}

#[test]
fn test_reexport_chain_uses_the_import_edge_tie_break() {
    // `.helper` collides case-insensitively with a module in another
    // package; chain following must land in the sibling that the
    // recorded import edge picks, not in the first folded candidate.
    let app = python(vec![build::import_from(".mid", &["f"], 1)]);
    let mid = python(vec![build::reexport(".helper", &["f"], 1)]);
    let near = python(vec![build::func("f", &[], vec![], 1)]);
    let far = python(vec![build::func("g", &[], vec![], 1)]);
    let (set, graph) = resolve_project(vec![
        ("pkg/app.py", app),
        ("pkg/mid.py", mid),
        ("pkg/HELPER.py", near),
        ("PKG/helper.py", far),
    ]);

    let app_id = set.by_canon("pkg.app").unwrap();
    let near_id = set.by_canon("pkg.HELPER").unwrap();
    let symbol = set.symbol(graph.binding(app_id, "f").unwrap());
    assert_eq!(symbol.module, near_id);
    assert_eq!(symbol.kind, SymbolKind::Function);
}

#[test]
fn test_wildcard_import_binds_every_export() {
    let helpers = python(vec![
        build::func("f", &[], vec![], 1),
        build::func("g", &[], vec![], 2),
    ]);
    let app = python(vec![build::import_wildcard("helpers", 1)]);
    let (set, graph) = resolve_project(vec![("app.py", app), ("helpers.py", helpers)]);

    let app_id = set.by_canon("app").unwrap();
    assert!(graph.binding(app_id, "f").is_some());
    assert!(graph.binding(app_id, "g").is_some());
    assert!(graph.binding(app_id, "h").is_none());
}

#[test]
fn test_missing_name_on_resolved_module_is_reported() {
    let helpers = python(vec![build::func("f", &[], vec![], 1)]);
    let app = python(vec![build::import_from("helpers", &["missing"], 1)]);
    let (_, graph) = resolve_project(vec![("app.py", app), ("helpers.py", helpers)]);

    assert!(graph.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnresolvedImport {
            reason: UnresolvedReason::NameNotExported,
            ..
        }
    )));
}

#[test]
fn test_unresolvable_specifier_is_reported() {
    let app = python(vec![build::import_from("no_such_module", &["f"], 1)]);
    let (_, graph) = resolve_project(vec![("app.py", app)]);

    assert_eq!(graph.diagnostics.len(), 1);
    assert!(matches!(
        &graph.diagnostics[0],
        Diagnostic::UnresolvedImport {
            reason: UnresolvedReason::NotFound,
            specifier,
            ..
        } if specifier == "no_such_module"
    ));
}

#[test]
fn test_python_relative_import_in_package() {
    let sibling = python(vec![build::func("f", &[], vec![], 1)]);
    let member = python(vec![build::import_from(".sibling", &["f"], 1)]);
    let (set, graph) = resolve_project(vec![
        ("pkg/member.py", member),
        ("pkg/sibling.py", sibling),
    ]);

    let member_id = set.by_canon("pkg.member").unwrap();
    assert!(graph.binding(member_id, "f").is_some());
}

#[test]
fn test_js_relative_import_with_extension() {
    let util = typescript(vec![build::func("f", &[], vec![], 1)]);
    let app = typescript(vec![build::import_from("./util.ts", &["f"], 1)]);
    let (set, graph) = resolve_project(vec![("src/app.ts", app), ("src/util.ts", util)]);

    let app_id = set.by_canon("src.app").unwrap();
    assert!(graph.binding(app_id, "f").is_some());
}

#[test]
fn test_barrel_collapses_onto_package_name() {
    let barrel = typescript(vec![build::reexport("./util", &["f"], 1)]);
    let util = typescript(vec![build::func("f", &[], vec![], 1)]);
    let app = typescript(vec![build::import_from("lib", &["f"], 1)]);
    let (set, graph) = resolve_project(vec![
        ("app.ts", app),
        ("lib/index.ts", barrel),
        ("lib/util.ts", util),
    ]);

    let app_id = set.by_canon("app").unwrap();
    let util_id = set.by_canon("lib.util").unwrap();
    let bound = graph.binding(app_id, "f").unwrap();
    assert_eq!(set.symbol(bound).module, util_id);
}

#[test]
fn test_whole_module_import_binds_the_module() {
    let backend = python(vec![build::func("run", &[], vec![], 1)]);
    let app = python(vec![
        build::import_module("backend", None, 1),
        build::import_module("backend", Some("be"), 2),
    ]);
    let (set, graph) = resolve_project(vec![("app.py", app), ("backend.py", backend)]);

    let app_id = set.by_canon("app").unwrap();
    let backend_id = set.by_canon("backend").unwrap();
    assert_eq!(graph.module_binding(app_id, "backend"), Some(backend_id));
    assert_eq!(graph.module_binding(app_id, "be"), Some(backend_id));
}

#[test]
fn test_case_collision_is_deterministic_and_reported() {
    let upper = python(vec![build::func("f", &[], vec![], 1)]);
    let mixed = python(vec![build::func("f", &[], vec![], 1)]);
    let app = python(vec![build::import_from("lib.utils", &["f"], 1)]);
    let (set, graph) = resolve_project(vec![
        ("app.py", app),
        ("lib/UTILS.py", upper),
        ("lib/Utils.py", mixed),
    ]);

    let app_id = set.by_canon("app").unwrap();
    let chosen_id = set.by_canon("lib.UTILS").unwrap();
    let bound = graph.binding(app_id, "f").unwrap();
    assert_eq!(set.symbol(bound).module, chosen_id);
    assert!(graph.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::AmbiguousImport { chosen, alternatives, .. }
            if chosen == "lib.UTILS" && alternatives == &["lib.Utils".to_owned()]
    )));
}

#[test]
fn test_resolution_is_stable_across_runs() {
    let build_files = || {
        vec![
            (
                "app.py",
                python(vec![
                    build::import_from("helpers", &["f"], 1),
                    build::import_from("missing", &["g"], 2),
                ]),
            ),
            ("helpers.py", python(vec![build::func("f", &[], vec![], 1)])),
        ]
    };
    let (_, first) = resolve_project(build_files());
    let (_, second) = resolve_project(build_files());

    assert_eq!(first.diagnostics, second.diagnostics);
}
