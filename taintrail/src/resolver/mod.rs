//! Project-wide symbol and module resolution.
//!
//! Two-phase, cycle-proof by construction: phase 1 (the [`ModuleSet`]
//! export index) is computed for all modules before phase 2 resolves any
//! import against it, so circular imports resolve without recursion on
//! module internals. Re-export chains are followed to their terminal
//! origin under a depth cap; ambiguity is settled deterministically and
//! recorded, never left to iteration order.

use crate::diagnostics::{Diagnostic, UnresolvedReason};
use crate::module::{Module, ModuleId, ModuleSet, Symbol, SymbolId, SymbolKind};
use crate::tier::EffectiveLimits;
use compact_str::CompactString;
use rustc_hash::FxHashMap;

/// Resolved import edges and name bindings for a whole project.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    edges: FxHashMap<ModuleId, Vec<ModuleId>>,
    symbol_bindings: FxHashMap<ModuleId, FxHashMap<CompactString, SymbolId>>,
    module_bindings: FxHashMap<ModuleId, FxHashMap<CompactString, ModuleId>>,
    reexport_origin: FxHashMap<SymbolId, SymbolId>,
    /// Resolution diagnostics, in deterministic module/import order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleGraph {
    /// Modules this module imports (resolved edges only).
    #[must_use]
    pub fn imports_of(&self, module: ModuleId) -> &[ModuleId] {
        self.edges.get(&module).map_or(&[], Vec::as_slice)
    }

    /// Terminal symbol a local name is bound to, if any.
    #[must_use]
    pub fn binding(&self, module: ModuleId, name: &str) -> Option<SymbolId> {
        self.symbol_bindings.get(&module)?.get(name).copied()
    }

    /// Module a local name is bound to by a whole-module import.
    #[must_use]
    pub fn module_binding(&self, module: ModuleId, name: &str) -> Option<ModuleId> {
        self.module_bindings.get(&module)?.get(name).copied()
    }

    /// Terminal origin of a re-export symbol.
    #[must_use]
    pub fn reexport_origin(&self, symbol: SymbolId) -> Option<SymbolId> {
        self.reexport_origin.get(&symbol).copied()
    }

    /// Resolves a dotted callee path in a module to the function it
    /// names in another module, if the call crosses module boundaries.
    #[must_use]
    pub fn resolve_call<'s>(
        &self,
        set: &'s ModuleSet,
        module: ModuleId,
        callee: &str,
    ) -> Option<&'s Symbol> {
        if let Some(sym) = self.binding(module, callee) {
            let sym = set.symbol(sym);
            return (sym.kind == SymbolKind::Function).then_some(sym);
        }
        let (head, rest) = callee.split_once('.')?;
        let target = self.module_binding(module, head)?;
        let sym = set.export(target, rest)?;
        let terminal = match sym.kind {
            SymbolKind::Reexport => set.symbol(self.reexport_origin(sym.id)?),
            _ => sym,
        };
        (terminal.kind == SymbolKind::Function).then_some(terminal)
    }
}

/// Resolves all imports against the project-wide export index.
#[must_use]
pub fn resolve(set: &ModuleSet, limits: &EffectiveLimits) -> ModuleGraph {
    let resolver = Resolver::new(set, limits.reexport_depth);
    resolver.run()
}

struct Resolver<'a> {
    set: &'a ModuleSet,
    reexport_cap: u32,
    /// Lowercased canon -> candidates, for case-collision ambiguity.
    folded_index: FxHashMap<String, Vec<ModuleId>>,
}

impl<'a> Resolver<'a> {
    fn new(set: &'a ModuleSet, reexport_cap: u32) -> Self {
        let mut folded_index: FxHashMap<String, Vec<ModuleId>> = FxHashMap::default();
        for module in &set.modules {
            folded_index
                .entry(module.canon.to_lowercase())
                .or_default()
                .push(module.id);
        }
        Self {
            set,
            reexport_cap,
            folded_index,
        }
    }

    fn run(self) -> ModuleGraph {
        let mut graph = ModuleGraph::default();
        for module in &self.set.modules {
            for (idx, record) in module.imports.iter().enumerate() {
                self.resolve_import(&mut graph, module, idx, record);
            }
        }
        graph
    }

    fn resolve_import(
        &self,
        graph: &mut ModuleGraph,
        importer: &Module,
        import_idx: usize,
        record: &crate::module::ImportRecord,
    ) {
        let stmt = &record.stmt;
        let Some(target) = self.resolve_specifier(graph, importer, &stmt.specifier) else {
            graph.diagnostics.push(Diagnostic::UnresolvedImport {
                module: importer.canon.clone(),
                specifier: stmt.specifier.clone(),
                reason: UnresolvedReason::NotFound,
            });
            return;
        };

        let edges = graph.edges.entry(importer.id).or_default();
        if !edges.contains(&target) {
            edges.push(target);
        }

        if stmt.names.is_empty() && !stmt.wildcard {
            let local = stmt.alias.clone().unwrap_or_else(|| {
                CompactString::from(
                    stmt.specifier
                        .rsplit(['.', '/'])
                        .next()
                        .unwrap_or(stmt.specifier.as_str()),
                )
            });
            graph
                .module_bindings
                .entry(importer.id)
                .or_default()
                .insert(local, target);
            return;
        }

        if stmt.wildcard {
            // Barrel expansion: bind every export of the target.
            for &export in &self.set.module(target).exports.clone() {
                let symbol = self.set.symbol(export);
                match self.follow(target, &symbol.name, 0) {
                    Ok(terminal) => {
                        graph
                            .symbol_bindings
                            .entry(importer.id)
                            .or_default()
                            .insert(symbol.name.clone(), terminal);
                    }
                    Err(reason) => graph.diagnostics.push(Diagnostic::UnresolvedImport {
                        module: importer.canon.clone(),
                        specifier: format!("{}::{}", stmt.specifier, symbol.name),
                        reason,
                    }),
                }
            }
            return;
        }

        for imported in &stmt.names {
            let local = imported.alias.as_ref().unwrap_or(&imported.name);
            match self.follow(target, &imported.name, 0) {
                Ok(terminal) => {
                    graph
                        .symbol_bindings
                        .entry(importer.id)
                        .or_default()
                        .insert(local.clone(), terminal);
                    // The importer's own re-export symbol for this name
                    // forwards to the same terminal origin.
                    if let Some(own) = self.set.export(importer.id, local) {
                        if own.kind == SymbolKind::Reexport
                            && own.import_idx == Some(u32::try_from(import_idx).unwrap_or(u32::MAX))
                        {
                            graph.reexport_origin.insert(own.id, terminal);
                        }
                    }
                }
                Err(reason) => graph.diagnostics.push(Diagnostic::UnresolvedImport {
                    module: importer.canon.clone(),
                    specifier: format!("{}::{}", stmt.specifier, imported.name),
                    reason,
                }),
            }
        }
    }

    /// Follows a name through re-export chains to its terminal origin.
    fn follow(
        &self,
        module: ModuleId,
        name: &str,
        depth: u32,
    ) -> Result<SymbolId, UnresolvedReason> {
        if depth > self.reexport_cap {
            return Err(UnresolvedReason::ReexportDepthExceeded);
        }
        let owner = self.set.module(module);

        if let Some(symbol) = self.set.export(module, name) {
            if symbol.kind != SymbolKind::Reexport {
                return Ok(symbol.id);
            }
            let Some(import_idx) = symbol.import_idx else {
                return Ok(symbol.id);
            };
            let record = &owner.imports[import_idx as usize];
            // The chain continues under the origin-side name, which may
            // differ from the local binding when aliased.
            let origin_name = record
                .stmt
                .names
                .iter()
                .find(|n| n.alias.as_deref().unwrap_or(&n.name) == name)
                .map_or(name, |n| n.name.as_str());
            let next = self
                .resolve_specifier_nodiag(owner, &record.stmt.specifier)
                .ok_or(UnresolvedReason::NotFound)?;
            return self.follow(next, origin_name, depth + 1);
        }

        // Not exported directly; a wildcard re-export may forward it.
        for record in &owner.imports {
            if record.stmt.wildcard {
                if let Some(next) = self.resolve_specifier_nodiag(owner, &record.stmt.specifier) {
                    if let Ok(found) = self.follow(next, name, depth + 1) {
                        return Ok(found);
                    }
                }
            }
        }
        Err(UnresolvedReason::NameNotExported)
    }

    fn resolve_specifier(
        &self,
        graph: &mut ModuleGraph,
        importer: &Module,
        specifier: &str,
    ) -> Option<ModuleId> {
        // Priority 1: exact relative/absolute path match.
        // Priority 2: package-root-relative match.
        let candidate = candidate_canon(importer, specifier);
        if let Some(id) = self.set.by_canon(&candidate) {
            return Some(id);
        }
        // Case-insensitive collision fallback: pick the most specific
        // path match deterministically, record the alternatives.
        let candidates = self.ranked_candidates(importer, &candidate)?;
        let chosen = *candidates.first()?;
        if candidates.len() > 1 {
            graph.diagnostics.push(Diagnostic::AmbiguousImport {
                module: importer.canon.clone(),
                specifier: specifier.to_owned(),
                chosen: self.set.module(chosen).canon.clone(),
                alternatives: candidates[1..]
                    .iter()
                    .map(|id| self.set.module(*id).canon.clone())
                    .collect(),
            });
        }
        Some(chosen)
    }

    /// Specifier resolution without diagnostics, for chain following
    /// (phase 2 is a pure function of the phase 1 index). Uses the same
    /// tie-break as [`Resolver::resolve_specifier`] so a chain lands in
    /// the module the recorded import edge points at.
    fn resolve_specifier_nodiag(&self, importer: &Module, specifier: &str) -> Option<ModuleId> {
        let candidate = candidate_canon(importer, specifier);
        if let Some(id) = self.set.by_canon(&candidate) {
            return Some(id);
        }
        let candidates = self.ranked_candidates(importer, &candidate)?;
        candidates.first().copied()
    }

    /// Case-collision candidates for a canonical name, most specific
    /// first: longest common prefix with the importer, then lexicographic
    /// canon order.
    fn ranked_candidates(&self, importer: &Module, candidate: &str) -> Option<Vec<ModuleId>> {
        let folded = self.folded_index.get(&candidate.to_lowercase())?;
        let mut candidates: Vec<ModuleId> = folded.clone();
        candidates.sort_by(|a, b| {
            let pa = common_prefix(&self.set.module(*a).canon, &importer.canon);
            let pb = common_prefix(&self.set.module(*b).canon, &importer.canon);
            pb.cmp(&pa)
                .then_with(|| self.set.module(*a).canon.cmp(&self.set.module(*b).canon))
        });
        Some(candidates)
    }
}

/// Maps a raw specifier onto a canonical dotted name, interpreting
/// relative forms against the importing module's package.
fn candidate_canon(importer: &Module, specifier: &str) -> String {
    let dir = importer_dir(importer);

    // Python-style relative: leading dots count package levels.
    if let Some(stripped) = specifier.strip_prefix('.') {
        if !specifier.starts_with("./") && !specifier.starts_with("..") {
            return join(&dir, &normalize(stripped));
        }
    }
    if specifier.starts_with("..") && !specifier.starts_with("../") {
        let dots = specifier.chars().take_while(|c| *c == '.').count();
        let rest = &specifier[dots..];
        let mut base = dir;
        for _ in 1..dots {
            base = parent(&base);
        }
        return join(&base, &normalize(rest));
    }

    // JS-style relative paths.
    if let Some(mut rest) = specifier.strip_prefix("./").map(str::to_owned) {
        let mut base = dir;
        loop {
            if let Some(up) = rest.strip_prefix("../") {
                base = parent(&base);
                rest = up.to_owned();
            } else {
                break;
            }
        }
        return join(&base, &normalize(&rest));
    }
    if specifier.starts_with("../") {
        let mut base = dir;
        let mut rest = specifier.to_owned();
        while let Some(up) = rest.strip_prefix("../") {
            base = parent(&base);
            rest = up.to_owned();
        }
        return join(&base, &normalize(&rest));
    }

    // Absolute / package-root-relative.
    normalize(specifier)
}

fn importer_dir(importer: &Module) -> String {
    if importer.is_barrel() {
        importer.canon.clone()
    } else {
        parent(&importer.canon)
    }
}

fn parent(canon: &str) -> String {
    canon.rsplit_once('.').map_or(String::new(), |(p, _)| p.to_owned())
}

fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (_, true) => base.to_owned(),
        (true, false) => rest.to_owned(),
        (false, false) => format!("{base}.{rest}"),
    }
}

/// Normalizes separators and strips source extensions from a specifier.
fn normalize(specifier: &str) -> String {
    let mut s = specifier.replace('/', ".");
    for ext in [".py", ".ts", ".tsx", ".js", ".jsx", ".mjs"] {
        if let Some(stripped) = s.strip_suffix(ext) {
            s = stripped.to_owned();
            break;
        }
    }
    s.trim_matches('.').to_owned()
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_paths_and_extensions() {
        assert_eq!(normalize("pkg/mod.ts"), "pkg.mod");
        assert_eq!(normalize("pkg.mod"), "pkg.mod");
        assert_eq!(normalize("utils.py"), "utils");
    }

    #[test]
    fn parent_and_join() {
        assert_eq!(parent("app.pkg.core"), "app.pkg");
        assert_eq!(parent("app"), "");
        assert_eq!(join("app.pkg", "core"), "app.pkg.core");
        assert_eq!(join("", "core"), "core");
        assert_eq!(join("app.pkg", ""), "app.pkg");
    }
}
