//! Framework catalog packs, enabled only when the tier grants
//! framework-aware analysis.

use compact_str::CompactString;

use super::{CatalogSet, Pattern, SinkEntry, SourceEntry};
use crate::ast::Language;
use crate::classify::{Severity, VulnCategory};

fn source(name: &str, pattern: &str, language: Language, framework: &str) -> SourceEntry {
    SourceEntry {
        name: name.into(),
        pattern: Pattern::parse(pattern),
        language: Some(language),
        framework: Some(CompactString::from(framework)),
    }
}

fn sink(
    name: &str,
    pattern: &str,
    category: VulnCategory,
    severity: Severity,
    remediation: &str,
    language: Language,
    framework: &str,
) -> SinkEntry {
    SinkEntry {
        name: name.into(),
        pattern: Pattern::parse(pattern),
        category,
        severity,
        remediation: remediation.to_owned(),
        language: Some(language),
        framework: Some(CompactString::from(framework)),
    }
}

pub(crate) fn framework_packs() -> CatalogSet {
    use Language::{Javascript, Python, Typescript};

    let mut sources = vec![
        source("flask request args", "request.args.*", Python, "flask"),
        source("flask request form", "request.form.*", Python, "flask"),
        source("flask request data", "request.data", Python, "flask"),
        source("flask request json", "request.json.*", Python, "flask"),
        source("flask request cookies", "request.cookies.*", Python, "flask"),
        source("django query params", "request.GET.*", Python, "django"),
        source("django post params", "request.POST.*", Python, "django"),
        source("django request body", "request.body", Python, "django"),
        source("fastapi query", "request.query_params.*", Python, "fastapi"),
        source("fastapi path params", "request.path_params.*", Python, "fastapi"),
    ];
    for lang in [Javascript, Typescript] {
        sources.push(source("express query", "req.query.*", lang, "express"));
        sources.push(source("express body", "req.body.*", lang, "express"));
        sources.push(source("express params", "req.params.*", lang, "express"));
        sources.push(source("express headers", "req.headers.*", lang, "express"));
    }

    // Bare-pattern variants so attribute reads spelled without a trailing
    // segment (e.g. `request.args` passed whole) still seed.
    sources.push(source("flask request args", "request.args", Python, "flask"));
    sources.push(source("flask request form", "request.form", Python, "flask"));
    sources.push(source("django query params", "request.GET", Python, "django"));
    sources.push(source("django post params", "request.POST", Python, "django"));

    let mut sinks = vec![
        sink(
            "django raw sql",
            "*.objects.raw",
            VulnCategory::Injection,
            Severity::High,
            "Use the ORM query API or parameterized raw queries.",
            Python,
            "django",
        ),
        sink(
            "flask render_template_string",
            "render_template_string",
            VulnCategory::Xss,
            Severity::High,
            "Render a template file and pass data through the context.",
            Python,
            "flask",
        ),
        sink(
            "flask redirect",
            "redirect",
            VulnCategory::OpenRedirect,
            Severity::Medium,
            "Validate redirect targets against an allow-list.",
            Python,
            "flask",
        ),
    ];
    for lang in [Javascript, Typescript] {
        sinks.push(sink(
            "express send",
            "res.send",
            VulnCategory::Xss,
            Severity::Medium,
            "Escape user data or set an explicit content type.",
            lang,
            "express",
        ));
        sinks.push(sink(
            "express redirect",
            "res.redirect",
            VulnCategory::OpenRedirect,
            Severity::Medium,
            "Validate redirect targets against an allow-list.",
            lang,
            "express",
        ));
    }

    CatalogSet {
        sources,
        sinks,
        sanitizers: Vec::new(),
    }
}
