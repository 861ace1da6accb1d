//! Normalized AST ingestion types.
//!
//! Per-language front-end parsers are external collaborators: they turn raw
//! source text into the language-neutral node representation defined here,
//! and hand the engine `(path, NormalizedAst)` pairs. Parse failures arrive
//! as `(path, ParseError)` and are recorded as skipped modules, never
//! silently substituted.
//!
//! The whole representation is serde-serializable so that pre-parsed
//! bundles can cross a process boundary (see `taintrail-cli`).

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Language tag attached to every module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Python.
    Python,
    /// JavaScript.
    Javascript,
    /// TypeScript.
    Typescript,
    /// Any language without a dedicated catalog.
    Other,
}

/// Source position (1-indexed line, 0-indexed column).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column offset (0-indexed).
    pub column: u32,
}

impl Span {
    /// Creates a span at the start of a line.
    #[must_use]
    pub fn line(line: u32) -> Self {
        Self { line, column: 0 }
    }
}

/// A parsed, language-neutral syntax tree for one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedAst {
    /// Language the file was parsed as.
    pub language: Language,
    /// Top-level statements.
    pub body: Vec<AstNode>,
}

/// One statement or expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AstNode {
    /// Node payload.
    pub kind: NodeKind,
    /// Source location.
    pub span: Span,
}

/// One name requested by an import statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportedName {
    /// Name as exported by the target module.
    pub name: CompactString,
    /// Local alias, if any.
    #[serde(default)]
    pub alias: Option<CompactString>,
}

/// A raw import statement, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportStmt {
    /// Raw specifier as written (`"./utils"`, `"pkg.mod"`, ...).
    pub specifier: String,
    /// Requested names. Empty means the module itself is bound.
    #[serde(default)]
    pub names: Vec<ImportedName>,
    /// Local alias for a whole-module import.
    #[serde(default)]
    pub alias: Option<CompactString>,
    /// `from m import *` / `export * from "m"`.
    #[serde(default)]
    pub wildcard: bool,
    /// Imported names are re-declared as this module's own exports.
    #[serde(default)]
    pub reexport: bool,
}

/// Statement and expression kinds the engine understands.
///
/// Front-ends lower language-specific constructs onto these: `switch` and
/// `match` both arrive as [`NodeKind::Switch`], template literals and
/// f-strings as [`NodeKind::Interp`], and any call whose callee cannot be
/// named statically (reflection, `getattr(...)()`, dynamic `import()`) as
/// [`NodeKind::DynamicCall`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    /// Function or method definition.
    FunctionDef {
        /// Function name (methods use `Class.method`).
        name: CompactString,
        /// Parameter names in declaration order.
        params: Vec<CompactString>,
        /// Body statements.
        body: Vec<AstNode>,
        /// Async marker.
        #[serde(default)]
        is_async: bool,
    },
    /// Class definition. Only the nested function defs matter to the PDG.
    ClassDef {
        /// Class name.
        name: CompactString,
        /// Body statements.
        body: Vec<AstNode>,
    },
    /// Conditional.
    If {
        /// Condition expression.
        test: Box<AstNode>,
        /// Then-branch statements.
        body: Vec<AstNode>,
        /// Else-branch statements.
        #[serde(default)]
        orelse: Vec<AstNode>,
    },
    /// While loop.
    While {
        /// Condition expression.
        test: Box<AstNode>,
        /// Body statements.
        body: Vec<AstNode>,
    },
    /// For / for-of / for-in loop.
    For {
        /// Loop variable.
        target: CompactString,
        /// Iterated expression.
        iter: Box<AstNode>,
        /// Body statements.
        body: Vec<AstNode>,
    },
    /// Switch / match statement, lowered to parallel case bodies.
    Switch {
        /// Scrutinee expression.
        subject: Box<AstNode>,
        /// One body per case arm.
        cases: Vec<Vec<AstNode>>,
    },
    /// Try statement with handlers and an optional finally block.
    Try {
        /// Guarded statements.
        body: Vec<AstNode>,
        /// One body per handler.
        #[serde(default)]
        handlers: Vec<Vec<AstNode>>,
        /// Finally statements.
        #[serde(default)]
        finalbody: Vec<AstNode>,
    },
    /// Assignment to a simple name.
    Assign {
        /// Target binding.
        target: CompactString,
        /// Assigned expression.
        value: Box<AstNode>,
    },
    /// Return statement.
    Return {
        /// Returned expression, if any.
        #[serde(default)]
        value: Option<Box<AstNode>>,
    },
    /// Raise / throw statement.
    Raise {
        /// Raised expression, if any.
        #[serde(default)]
        value: Option<Box<AstNode>>,
    },
    /// Break out of the innermost loop.
    Break,
    /// Continue the innermost loop.
    Continue,
    /// Expression statement.
    Expr {
        /// Inner expression.
        value: Box<AstNode>,
    },
    /// Call with a statically known dotted callee path.
    Call {
        /// Dotted callee path (`"run_query"`, `"cursor.execute"`).
        callee: CompactString,
        /// Argument expressions.
        #[serde(default)]
        args: Vec<AstNode>,
    },
    /// Call whose callee is computed at runtime. Produces an
    /// approximation-gap diagnostic, never a data edge.
    DynamicCall {
        /// Argument expressions.
        #[serde(default)]
        args: Vec<AstNode>,
    },
    /// Read of a (possibly dotted) name, e.g. `req.id`.
    Name {
        /// Dotted path read.
        path: CompactString,
    },
    /// String interpolation; taint of any part taints the whole.
    Interp {
        /// Interpolated parts.
        parts: Vec<AstNode>,
    },
    /// Binary operation; taint of either side propagates.
    BinOp {
        /// Left operand.
        left: Box<AstNode>,
        /// Right operand.
        right: Box<AstNode>,
    },
    /// Constant literal. Never tainted.
    Literal,
    /// Import statement.
    Import(ImportStmt),
}

/// Content hash of a normalized AST, used as the cache key component and
/// the module invalidation trigger.
#[must_use]
pub fn ast_hash(ast: &NormalizedAst) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    ast.hash(&mut hasher);
    hasher.finish()
}

/// Programmatic construction helpers, used by front-ends and tests.
pub mod build {
    use super::{AstNode, CompactString, ImportStmt, ImportedName, NodeKind, Span};

    /// Wraps a kind with a line-only span.
    #[must_use]
    pub fn node(kind: NodeKind, line: u32) -> AstNode {
        AstNode {
            kind,
            span: Span::line(line),
        }
    }

    /// Name read.
    #[must_use]
    pub fn name(path: &str, line: u32) -> AstNode {
        node(
            NodeKind::Name {
                path: CompactString::from(path),
            },
            line,
        )
    }

    /// Constant literal.
    #[must_use]
    pub fn lit(line: u32) -> AstNode {
        node(NodeKind::Literal, line)
    }

    /// Call expression.
    #[must_use]
    pub fn call(callee: &str, args: Vec<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::Call {
                callee: CompactString::from(callee),
                args,
            },
            line,
        )
    }

    /// Call expression wrapped as a statement.
    #[must_use]
    pub fn call_stmt(callee: &str, args: Vec<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::Expr {
                value: Box::new(call(callee, args, line)),
            },
            line,
        )
    }

    /// String interpolation.
    #[must_use]
    pub fn interp(parts: Vec<AstNode>, line: u32) -> AstNode {
        node(NodeKind::Interp { parts }, line)
    }

    /// Assignment statement.
    #[must_use]
    pub fn assign(target: &str, value: AstNode, line: u32) -> AstNode {
        node(
            NodeKind::Assign {
                target: CompactString::from(target),
                value: Box::new(value),
            },
            line,
        )
    }

    /// Return statement.
    #[must_use]
    pub fn ret(value: Option<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::Return {
                value: value.map(Box::new),
            },
            line,
        )
    }

    /// Function definition.
    #[must_use]
    pub fn func(name: &str, params: &[&str], body: Vec<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::FunctionDef {
                name: CompactString::from(name),
                params: params.iter().map(|p| CompactString::from(*p)).collect(),
                body,
                is_async: false,
            },
            line,
        )
    }

    /// `from <specifier> import <names>` style import.
    #[must_use]
    pub fn import_from(specifier: &str, names: &[&str], line: u32) -> AstNode {
        node(
            NodeKind::Import(ImportStmt {
                specifier: specifier.to_owned(),
                names: names
                    .iter()
                    .map(|n| ImportedName {
                        name: CompactString::from(*n),
                        alias: None,
                    })
                    .collect(),
                alias: None,
                wildcard: false,
                reexport: false,
            }),
            line,
        )
    }

    /// Re-exporting import (`from <specifier> import <names>` in a barrel).
    #[must_use]
    pub fn reexport(specifier: &str, names: &[&str], line: u32) -> AstNode {
        let mut n = import_from(specifier, names, line);
        if let NodeKind::Import(ref mut stmt) = n.kind {
            stmt.reexport = true;
        }
        n
    }

    /// Whole-module import (`import pkg.mod as alias`).
    #[must_use]
    pub fn import_module(specifier: &str, alias: Option<&str>, line: u32) -> AstNode {
        node(
            NodeKind::Import(ImportStmt {
                specifier: specifier.to_owned(),
                names: Vec::new(),
                alias: alias.map(CompactString::from),
                wildcard: false,
                reexport: false,
            }),
            line,
        )
    }

    /// Wildcard import (`from m import *`).
    #[must_use]
    pub fn import_wildcard(specifier: &str, line: u32) -> AstNode {
        node(
            NodeKind::Import(ImportStmt {
                specifier: specifier.to_owned(),
                names: Vec::new(),
                alias: None,
                wildcard: true,
                reexport: false,
            }),
            line,
        )
    }

    /// If statement.
    #[must_use]
    pub fn if_stmt(test: AstNode, body: Vec<AstNode>, orelse: Vec<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::If {
                test: Box::new(test),
                body,
                orelse,
            },
            line,
        )
    }

    /// While loop.
    #[must_use]
    pub fn while_stmt(test: AstNode, body: Vec<AstNode>, line: u32) -> AstNode {
        node(
            NodeKind::While {
                test: Box::new(test),
                body,
            },
            line,
        )
    }
}
