//! Determinism guarantees: identical inputs yield byte-identical
//! responses regardless of worker scheduling, and deeper analysis only
//! ever adds findings.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use taintrail::ast::{build, AstNode, Language, NormalizedAst};
use taintrail::engine::{
    AnalysisRequest, AnalysisResponse, AstPayload, Engine, GraphCache, ModuleInput,
};
use taintrail::{CancelFlag, TierLimits};

fn python(body: Vec<AstNode>) -> NormalizedAst {
    NormalizedAst {
        language: Language::Python,
        body,
    }
}

fn analyze_with(
    files: &[(&str, NormalizedAst)],
    depth: Option<u32>,
    cache: &mut GraphCache,
    cancel: &CancelFlag,
) -> AnalysisResponse {
    let request = AnalysisRequest {
        project_root: PathBuf::from("/proj"),
        target_modules: None,
        requested_depth: depth,
        include_flows: true,
        tier_limits: TierLimits::enterprise(),
    };
    let inputs = files
        .iter()
        .map(|(path, ast)| ModuleInput {
            path: PathBuf::from(path),
            payload: AstPayload::Ast(ast.clone()),
        })
        .collect();
    Engine::new().analyze(&request, inputs, cache, cancel)
}

/// Several seeds, several sinks, one cross-file hop, one unresolved
/// import: enough surface for scheduling differences to show up if
/// ordering were ever left to chance.
fn busy_project() -> Vec<(&'static str, NormalizedAst)> {
    let app = python(vec![
        build::import_from("backend", &["run"], 1),
        build::import_from("missing", &["ghost"], 2),
        build::assign("a", build::call("input", vec![], 3), 3),
        build::assign("b", build::name("sys.argv", 4), 4),
        build::call_stmt("eval", vec![build::name("a", 5)], 5),
        build::call_stmt("os.system", vec![build::name("b", 6)], 6),
        build::call_stmt("run", vec![build::name("a", 7)], 7),
    ]);
    let backend = python(vec![build::func(
        "run",
        &["cmd"],
        vec![build::call_stmt(
            "cursor.execute",
            vec![build::name("cmd", 2)],
            2,
        )],
        1,
    )]);
    vec![("app.py", app), ("backend.py", backend)]
}

#[test]
fn test_repeated_runs_are_byte_identical() {
    let files = busy_project();
    let cancel = CancelFlag::new();

    let first = analyze_with(&files, None, &mut GraphCache::new(), &cancel);
    let second = analyze_with(&files, None, &mut GraphCache::new(), &cancel);

    assert!(first.vulnerabilities.len() >= 3);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_cached_graphs_do_not_change_results() {
    let files = busy_project();
    let cancel = CancelFlag::new();
    let mut cache = GraphCache::new();

    let cold = analyze_with(&files, None, &mut cache, &cancel);
    assert_eq!(cache.len(), 2);
    let warm = analyze_with(&files, None, &mut cache, &cancel);

    assert_eq!(
        serde_json::to_string(&cold).unwrap(),
        serde_json::to_string(&warm).unwrap()
    );
}

#[test]
fn test_deeper_analysis_only_adds_findings() {
    let files = busy_project();
    let cancel = CancelFlag::new();

    let shallow = analyze_with(&files, Some(0), &mut GraphCache::new(), &cancel);
    let deep = analyze_with(&files, Some(1), &mut GraphCache::new(), &cancel);

    assert!(shallow.vulnerabilities.len() <= deep.vulnerabilities.len());
    // Every shallow finding survives at the deeper setting.
    for finding in &shallow.vulnerabilities {
        assert!(deep
            .vulnerabilities
            .iter()
            .any(|f| f.source == finding.source && f.sink == finding.sink));
    }
}

#[test]
fn test_no_findings_without_matching_sources() {
    let quiet = python(vec![
        build::assign("x", build::lit(1), 1),
        build::call_stmt("os.system", vec![build::name("x", 2)], 2),
    ]);
    let cancel = CancelFlag::new();
    let response = analyze_with(
        &[("quiet.py", quiet)],
        None,
        &mut GraphCache::new(),
        &cancel,
    );

    assert!(response.vulnerabilities.is_empty());
    assert!(response.taint_flows.is_empty());
}

#[test]
fn test_statement_matching_two_sources_keeps_one_attribution() {
    // Both the `input()` call and the `sys.argv` read name a source;
    // the statement seeds once and always credits the same one.
    let app = python(vec![build::call_stmt(
        "os.system",
        vec![build::call("input", vec![], 1), build::name("sys.argv", 1)],
        1,
    )]);
    let cancel = CancelFlag::new();

    let first = analyze_with(
        &[("app.py", app.clone())],
        None,
        &mut GraphCache::new(),
        &cancel,
    );
    let second = analyze_with(&[("app.py", app)], None, &mut GraphCache::new(), &cancel);

    assert_eq!(first.vulnerabilities.len(), 1);
    assert!(first.vulnerabilities[0].message.contains("sys.argv"));
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_cancellation_yields_partial_marked_result() {
    let files = busy_project();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let response = analyze_with(&files, None, &mut GraphCache::new(), &cancel);

    assert!(response.success);
    assert!(response.metadata.truncated_by_timeout);
    assert!(response.metadata.truncated);
    assert!(response.vulnerabilities.is_empty());
}

#[test]
fn test_flows_are_sorted_by_source_then_sink() {
    let files = busy_project();
    let cancel = CancelFlag::new();
    let response = analyze_with(&files, None, &mut GraphCache::new(), &cancel);

    let keys: Vec<_> = response
        .taint_flows
        .iter()
        .map(|flow| (flow.source.clone(), flow.sink.clone()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
