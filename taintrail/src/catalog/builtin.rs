//! Built-in language-core catalogs.

use super::{CatalogSet, Pattern, SanitizerEntry, SinkEntry, SourceEntry};
use crate::ast::Language;
use crate::classify::{Severity, VulnCategory};

fn source(name: &str, pattern: &str, language: Option<Language>) -> SourceEntry {
    SourceEntry {
        name: name.into(),
        pattern: Pattern::parse(pattern),
        language,
        framework: None,
    }
}

fn sink(
    name: &str,
    pattern: &str,
    category: VulnCategory,
    severity: Severity,
    remediation: &str,
    language: Option<Language>,
) -> SinkEntry {
    SinkEntry {
        name: name.into(),
        pattern: Pattern::parse(pattern),
        category,
        severity,
        remediation: remediation.to_owned(),
        language,
        framework: None,
    }
}

fn sanitizer(name: &str, pattern: &str, language: Option<Language>) -> SanitizerEntry {
    SanitizerEntry {
        name: name.into(),
        pattern: Pattern::parse(pattern),
        categories: Vec::new(),
        language,
        framework: None,
    }
}

pub(crate) fn language_core() -> CatalogSet {
    use Language::{Javascript, Python, Typescript};
    let py = Some(Python);
    let js = Some(Javascript);
    let ts = Some(Typescript);

    let sources = vec![
        source("stdin", "input", py),
        source("argv", "sys.argv", py),
        source("environment", "os.environ.*", py),
        source("argv", "process.argv", js),
        source("argv", "process.argv", ts),
        source("environment", "process.env.*", js),
        source("environment", "process.env.*", ts),
    ];

    let sinks = vec![
        sink(
            "eval",
            "eval",
            VulnCategory::CodeExecution,
            Severity::Critical,
            "Never evaluate untrusted input; parse it instead.",
            None,
        ),
        sink(
            "exec",
            "exec",
            VulnCategory::CodeExecution,
            Severity::Critical,
            "Never execute untrusted input.",
            py,
        ),
        sink(
            "os.system",
            "os.system",
            VulnCategory::CommandInjection,
            Severity::Critical,
            "Use subprocess with an argument list and shell=False.",
            py,
        ),
        sink(
            "subprocess",
            "subprocess.*",
            VulnCategory::CommandInjection,
            Severity::High,
            "Pass arguments as a list and keep shell=False.",
            py,
        ),
        sink(
            "sql execute",
            "cursor.execute",
            VulnCategory::Injection,
            Severity::High,
            "Use parameterized queries.",
            py,
        ),
        sink(
            "pickle",
            "pickle.loads",
            VulnCategory::Deserialization,
            Severity::High,
            "Do not unpickle untrusted data; use a safe format.",
            py,
        ),
        sink(
            "yaml load",
            "yaml.load",
            VulnCategory::Deserialization,
            Severity::High,
            "Use yaml.safe_load.",
            py,
        ),
        sink(
            "child_process",
            "child_process.*",
            VulnCategory::CommandInjection,
            Severity::Critical,
            "Use execFile with an argument array.",
            js,
        ),
        sink(
            "child_process",
            "child_process.*",
            VulnCategory::CommandInjection,
            Severity::Critical,
            "Use execFile with an argument array.",
            ts,
        ),
        sink(
            "sql query",
            "db.query",
            VulnCategory::Injection,
            Severity::High,
            "Use placeholders instead of string building.",
            js,
        ),
        sink(
            "sql query",
            "db.query",
            VulnCategory::Injection,
            Severity::High,
            "Use placeholders instead of string building.",
            ts,
        ),
        sink(
            "document.write",
            "document.write",
            VulnCategory::Xss,
            Severity::High,
            "Use textContent or a sanitizing renderer.",
            js,
        ),
        sink(
            "open",
            "open",
            VulnCategory::PathTraversal,
            Severity::Medium,
            "Resolve and validate paths against an allow-list root.",
            py,
        ),
    ];

    let sanitizers = vec![
        sanitizer("shlex.quote", "shlex.quote", py),
        sanitizer("html.escape", "html.escape", py),
        sanitizer("markupsafe", "markupsafe.escape", py),
        sanitizer("encodeURIComponent", "encodeURIComponent", js),
        sanitizer("encodeURIComponent", "encodeURIComponent", ts),
        sanitizer("parseInt", "parseInt", js),
        sanitizer("int", "int", py),
    ];

    CatalogSet {
        sources,
        sinks,
        sanitizers,
    }
}
