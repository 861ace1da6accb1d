//! End-to-end taint propagation over single-file projects.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use taintrail::ast::{build, AstNode, Language, NodeKind, NormalizedAst, Span};
use taintrail::diagnostics::Diagnostic;
use taintrail::engine::{
    AnalysisRequest, AnalysisResponse, AstPayload, Engine, GraphCache, ModuleInput, ParseError,
};
use taintrail::{CancelFlag, RiskLevel, Severity, TierLimits, VulnCategory};

fn python(body: Vec<AstNode>) -> NormalizedAst {
    NormalizedAst {
        language: Language::Python,
        body,
    }
}

fn analyze(files: Vec<(&str, AstPayload)>) -> AnalysisResponse {
    let request = AnalysisRequest {
        project_root: PathBuf::from("/proj"),
        target_modules: None,
        requested_depth: None,
        include_flows: false,
        tier_limits: TierLimits::pro(),
    };
    let inputs = files
        .into_iter()
        .map(|(path, payload)| ModuleInput {
            path: PathBuf::from(path),
            payload,
        })
        .collect();
    let mut cache = GraphCache::new();
    Engine::new().analyze(&request, inputs, &mut cache, &CancelFlag::new())
}

#[test]
fn test_direct_flow_from_input_to_os_system() {
    let ast = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::call_stmt("os.system", vec![build::name("user", 2)], 2),
    ]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.success);
    assert_eq!(response.vulnerabilities.len(), 1);
    let finding = &response.vulnerabilities[0];
    assert_eq!(finding.category, VulnCategory::CommandInjection);
    assert_eq!(finding.severity, Severity::Critical);
    assert!(!finding.cross_file);
    assert!(finding.confidence > 0.7);
    assert!(finding.sanitizers.is_empty());
    assert_eq!(finding.path.len(), 2);
    assert_eq!(finding.source.line, 1);
    assert_eq!(finding.sink.line, 2);
    assert_eq!(response.risk_level, RiskLevel::Critical);
}

#[test]
fn test_source_and_sink_in_one_statement() {
    let ast = python(vec![build::call_stmt(
        "os.system",
        vec![build::call("input", vec![], 1)],
        1,
    )]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert_eq!(response.vulnerabilities.len(), 1);
    assert_eq!(response.vulnerabilities[0].path.len(), 1);
}

#[test]
fn test_full_sanitizer_match_halts_the_path() {
    let ast = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::assign(
            "safe",
            build::call("shlex.quote", vec![build::name("user", 2)], 2),
            2,
        ),
        build::call_stmt("os.system", vec![build::name("safe", 3)], 3),
    ]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.success);
    assert!(response.vulnerabilities.is_empty());
    assert_eq!(response.risk_level, RiskLevel::None);
}

#[test]
fn test_partial_sanitizer_lowers_confidence_but_reports() {
    let direct = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::call_stmt("os.system", vec![build::name("user", 2)], 2),
    ]);
    let hedged = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::assign(
            "clean",
            build::call("my_sanitize", vec![build::name("user", 2)], 2),
            2,
        ),
        build::call_stmt("os.system", vec![build::name("clean", 3)], 3),
    ]);

    let direct = analyze(vec![("app.py", AstPayload::Ast(direct))]);
    let hedged = analyze(vec![("app.py", AstPayload::Ast(hedged))]);

    assert_eq!(hedged.vulnerabilities.len(), 1);
    let finding = &hedged.vulnerabilities[0];
    assert_eq!(finding.sanitizers.len(), 1);
    assert_eq!(finding.sanitizers[0].line, 2);
    assert!(finding.confidence < direct.vulnerabilities[0].confidence);
}

#[test]
fn test_literal_argument_is_not_a_flow() {
    let ast = python(vec![build::call_stmt(
        "os.system",
        vec![build::lit(1)],
        1,
    )]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.vulnerabilities.is_empty());
    assert_eq!(response.risk_level, RiskLevel::None);
}

#[test]
fn test_untainted_variable_is_not_reported() {
    let ast = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::assign("fixed", build::lit(2), 2),
        build::call_stmt("os.system", vec![build::name("fixed", 3)], 3),
    ]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.vulnerabilities.is_empty());
}

#[test]
fn test_reassignment_kills_taint() {
    let ast = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::assign("user", build::lit(2), 2),
        build::call_stmt("os.system", vec![build::name("user", 3)], 3),
    ]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.vulnerabilities.is_empty());
}

#[test]
fn test_interpolation_carries_taint() {
    let ast = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::assign(
            "query",
            build::interp(vec![build::lit(2), build::name("user", 2)], 2),
            2,
        ),
        build::call_stmt("cursor.execute", vec![build::name("query", 3)], 3),
    ]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert_eq!(response.vulnerabilities.len(), 1);
    assert_eq!(
        response.vulnerabilities[0].category,
        VulnCategory::Injection
    );
}

#[test]
fn test_step_ceiling_halts_pathological_fan_out() {
    // Twenty stacked branch pairs give about a million distinct paths
    // from the seed; the step valve stops the search long before that.
    let mut body = vec![build::assign("x", build::call("input", vec![], 1), 1)];
    for i in 0..20u32 {
        let line = 2 + i * 3;
        body.push(build::if_stmt(
            build::name("cond", line),
            vec![build::assign(
                "x",
                build::call("left", vec![build::name("x", line + 1)], line + 1),
                line + 1,
            )],
            vec![build::assign(
                "x",
                build::call("right", vec![build::name("x", line + 2)], line + 2),
                line + 2,
            )],
            line,
        ));
    }
    let response = analyze(vec![("chains.py", AstPayload::Ast(python(body)))]);

    assert!(response.success);
    assert!(response.vulnerabilities.is_empty());
    assert!(response.metadata.truncated);
    assert!(!response.metadata.truncated_by_timeout);
}

#[test]
fn test_parse_failure_is_skipped_with_diagnostic() {
    let good = python(vec![
        build::assign("user", build::call("input", vec![], 1), 1),
        build::call_stmt("os.system", vec![build::name("user", 2)], 2),
    ]);
    let response = analyze(vec![
        ("app.py", AstPayload::Ast(good)),
        (
            "broken.py",
            AstPayload::Failed(ParseError {
                message: "unexpected token".to_owned(),
            }),
        ),
    ]);

    assert!(response.success);
    assert_eq!(response.vulnerabilities.len(), 1);
    assert!(response.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::SkippedModule { module, .. } if module == "broken.py"
    )));
}

#[test]
fn test_dynamic_call_records_approximation_gap() {
    let ast = python(vec![AstNode {
        kind: NodeKind::Expr {
            value: Box::new(AstNode {
                kind: NodeKind::DynamicCall { args: vec![] },
                span: Span::line(1),
            }),
        },
        span: Span::line(1),
    }]);
    let response = analyze(vec![("app.py", AstPayload::Ast(ast))]);

    assert!(response.success);
    assert!(response
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::ApproximationGap { line: 1, .. })));
}

#[test]
fn test_empty_project_yields_empty_response() {
    let response = analyze(vec![]);

    assert!(response.success);
    assert!(response.vulnerabilities.is_empty());
    assert!(response.diagnostics.is_empty());
    assert_eq!(response.metadata.modules_visited, 0);
    assert_eq!(response.risk_level, RiskLevel::None);
}
