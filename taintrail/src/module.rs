//! Module and symbol arena.
//!
//! Modules and symbols are created once per analysis run and are immutable
//! after construction. Cross-references are by id, resolved through the
//! owning [`ModuleSet`] — the arena-and-index pattern, never pointers.

use crate::ast::{ast_hash, ImportStmt, Language, NodeKind, NormalizedAst, Span};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Identifier of a [`Module`] within its [`ModuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub u32);

/// Identifier of a [`Symbol`] within its [`ModuleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub u32);

/// Kind of a named definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Function or method.
    Function,
    /// Class.
    Class,
    /// Module-level variable.
    Variable,
    /// Imported name re-declared as this module's own export.
    Reexport,
}

/// A named definition owned by a module.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Own id.
    pub id: SymbolId,
    /// Owning module.
    pub module: ModuleId,
    /// Exported name.
    pub name: CompactString,
    /// Definition kind.
    pub kind: SymbolKind,
    /// Definition location.
    pub span: Span,
    /// For re-exports: index into the owning module's import list that
    /// this symbol forwards through.
    pub import_idx: Option<u32>,
}

/// An import statement with its location.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    /// The raw statement.
    pub stmt: ImportStmt,
    /// Statement location.
    pub span: Span,
}

/// One analyzable file.
#[derive(Debug, Clone)]
pub struct Module {
    /// Own id.
    pub id: ModuleId,
    /// Filesystem path as supplied by ingestion.
    pub path: PathBuf,
    /// Canonical dotted name relative to the project root
    /// (`app/pkg/core.py` -> `app.pkg.core`; `__init__` and `index`
    /// leaves collapse onto the package name).
    pub canon: String,
    /// Language tag.
    pub language: Language,
    /// Content hash; a mismatch invalidates any cached graph.
    pub content_hash: u64,
    /// Exported symbols, in declaration order.
    pub exports: Vec<SymbolId>,
    /// Raw import statements, in declaration order.
    pub imports: Vec<ImportRecord>,
}

impl Module {
    /// Whether this file is a package barrel (`__init__.py`, `index.ts`):
    /// relative imports inside it resolve against the package itself.
    #[must_use]
    pub fn is_barrel(&self) -> bool {
        matches!(
            self.path.file_stem().and_then(|s| s.to_str()),
            Some("__init__" | "index")
        )
    }
}

/// Owning container for all modules and symbols of one analysis run.
#[derive(Debug, Default)]
pub struct ModuleSet {
    /// Modules, indexed by [`ModuleId`].
    pub modules: Vec<Module>,
    /// Symbols, indexed by [`SymbolId`].
    pub symbols: Vec<Symbol>,
    canon_index: FxHashMap<String, ModuleId>,
    export_index: FxHashMap<(ModuleId, CompactString), SymbolId>,
}

impl ModuleSet {
    /// Builds the arena from ingested files. Input order determines id
    /// assignment, so callers sort inputs for determinism.
    #[must_use]
    pub fn build(project_root: &Path, files: &[(PathBuf, &NormalizedAst)]) -> Self {
        let mut set = ModuleSet::default();
        for (path, ast) in files {
            set.add_module(project_root, path, ast);
        }
        set
    }

    /// Looks up a module by canonical dotted name.
    #[must_use]
    pub fn by_canon(&self, canon: &str) -> Option<ModuleId> {
        self.canon_index.get(canon).copied()
    }

    /// Looks up an exported symbol by name.
    #[must_use]
    pub fn export(&self, module: ModuleId, name: &str) -> Option<&Symbol> {
        self.export_index
            .get(&(module, CompactString::from(name)))
            .map(|id| &self.symbols[id.0 as usize])
    }

    /// Module accessor.
    #[must_use]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    /// Symbol accessor.
    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// All canonical names, sorted (for deterministic iteration).
    #[must_use]
    pub fn canon_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.iter().map(|m| m.canon.as_str()).collect();
        names.sort_unstable();
        names
    }

    fn add_module(&mut self, project_root: &Path, path: &Path, ast: &NormalizedAst) {
        let id = ModuleId(u32::try_from(self.modules.len()).unwrap_or(u32::MAX));
        let canon = canon_name(project_root, path);

        let mut exports = Vec::new();
        let mut imports = Vec::new();

        for stmt in &ast.body {
            match &stmt.kind {
                NodeKind::FunctionDef { name, .. } => {
                    exports.push(self.add_symbol(id, name, SymbolKind::Function, stmt.span, None));
                }
                NodeKind::ClassDef { name, body } => {
                    exports.push(self.add_symbol(id, name, SymbolKind::Class, stmt.span, None));
                    for method in body {
                        if let NodeKind::FunctionDef { name: m, .. } = &method.kind {
                            let qualified = CompactString::from(format!("{name}.{m}"));
                            exports.push(self.add_symbol(
                                id,
                                &qualified,
                                SymbolKind::Function,
                                method.span,
                                None,
                            ));
                        }
                    }
                }
                NodeKind::Assign { target, .. } => {
                    exports.push(self.add_symbol(id, target, SymbolKind::Variable, stmt.span, None));
                }
                NodeKind::Import(import) => {
                    let import_idx = u32::try_from(imports.len()).unwrap_or(u32::MAX);
                    for imported in &import.names {
                        let local = imported.alias.as_ref().unwrap_or(&imported.name);
                        exports.push(self.add_symbol(
                            id,
                            local,
                            SymbolKind::Reexport,
                            stmt.span,
                            Some(import_idx),
                        ));
                    }
                    imports.push(ImportRecord {
                        stmt: import.clone(),
                        span: stmt.span,
                    });
                }
                _ => {}
            }
        }

        self.canon_index.insert(canon.clone(), id);
        self.modules.push(Module {
            id,
            path: path.to_path_buf(),
            canon,
            language: ast.language,
            content_hash: ast_hash(ast),
            exports,
            imports,
        });
    }

    fn add_symbol(
        &mut self,
        module: ModuleId,
        name: &str,
        kind: SymbolKind,
        span: Span,
        import_idx: Option<u32>,
    ) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
        let name = CompactString::from(name);
        // First declaration wins for the export index; later shadowing
        // definitions still get their own symbol.
        self.export_index.entry((module, name.clone())).or_insert(id);
        self.symbols.push(Symbol {
            id,
            module,
            name,
            kind,
            span,
            import_idx,
        });
        id
    }
}

/// Derives the canonical dotted name of a file relative to the project
/// root. Barrel files (`__init__.py`, `index.ts`) collapse onto their
/// package directory.
#[must_use]
pub fn canon_name(project_root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(project_root).unwrap_or(path);
    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.rsplit_once('.').map(|(s, _)| s.to_owned()) {
            *last = stem;
        }
        if last == "__init__" || last == "index" {
            parts.pop();
        }
    }
    parts.join(".")
}
