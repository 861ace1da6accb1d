//! Structured-statement lowering into a control-flow graph.
//!
//! Every statement becomes a PDG node appended to the module's flat node
//! arena; blocks hold node ids. If / loop / switch / try all lower to
//! branches and merge points. A virtual exit block joins all returns.

use super::{FuncId, NodeId, PdgNodeKind, PerFileGraph};
use crate::ast::{AstNode, NodeKind, Span};
use compact_str::CompactString;
use smallvec::SmallVec;

/// A basic block of statement nodes.
#[derive(Debug, Default)]
pub(crate) struct Block {
    /// Statement nodes in execution order.
    pub stmts: Vec<NodeId>,
    /// Successor block ids.
    pub succs: Vec<usize>,
    /// Predecessor block ids.
    pub preds: Vec<usize>,
}

/// Control-flow graph of one function.
#[derive(Debug)]
pub(crate) struct Cfg {
    pub blocks: Vec<Block>,
    pub entry: usize,
    pub exit: usize,
}

/// Reads, calls and dynamic-call sites collected from one expression tree.
#[derive(Debug, Default)]
pub(crate) struct ExprFacts {
    pub reads: SmallVec<[CompactString; 2]>,
    pub calls: SmallVec<[CompactString; 1]>,
    pub dynamic: Vec<Span>,
}

/// Collects facts from an expression tree. Taint is value-based: any read
/// or call inside the expression is attributed to the enclosing statement.
pub(crate) fn scan_expr(node: &AstNode, facts: &mut ExprFacts) {
    match &node.kind {
        NodeKind::Name { path } => {
            if !facts.reads.contains(path) {
                facts.reads.push(path.clone());
            }
        }
        NodeKind::Call { callee, args } => {
            if !facts.calls.contains(callee) {
                facts.calls.push(callee.clone());
            }
            for arg in args {
                scan_expr(arg, facts);
            }
        }
        NodeKind::DynamicCall { args } => {
            facts.dynamic.push(node.span);
            for arg in args {
                scan_expr(arg, facts);
            }
        }
        NodeKind::Interp { parts } => {
            for part in parts {
                scan_expr(part, facts);
            }
        }
        NodeKind::BinOp { left, right } => {
            scan_expr(left, facts);
            scan_expr(right, facts);
        }
        // Literals carry no taint; statement kinds do not occur in
        // expression position.
        _ => {}
    }
}

struct LoopCtx {
    header: usize,
    after: usize,
}

/// Lowers one function body into blocks, emitting PDG nodes as it goes.
pub(crate) struct Lowering<'g, 'a> {
    graph: &'g mut PerFileGraph,
    func: FuncId,
    blocks: Vec<Block>,
    current: usize,
    exit: usize,
    loop_stack: Vec<LoopCtx>,
    terminated: bool,
    /// Nested function and class definitions, in source order, for the
    /// builder to construct with capture wiring.
    pub nested: Vec<&'a AstNode>,
}

impl<'g, 'a> Lowering<'g, 'a> {
    pub fn new(graph: &'g mut PerFileGraph, func: FuncId) -> Self {
        let blocks = vec![Block::default(), Block::default()];
        Self {
            graph,
            func,
            blocks,
            current: 0,
            exit: 1,
            loop_stack: Vec::new(),
            terminated: false,
            nested: Vec::new(),
        }
    }

    /// Emits a parameter definition node into the entry block.
    pub fn emit_param(&mut self, name: &CompactString, span: Span) -> NodeId {
        let id = self.graph.push_node(
            PdgNodeKind::Param,
            span,
            self.func,
            SmallVec::new(),
            SmallVec::from_iter([name.clone()]),
            SmallVec::new(),
        );
        self.blocks[self.current].stmts.push(id);
        id
    }

    pub fn lower_stmts(&mut self, stmts: &'a [AstNode]) {
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
    }

    /// Seals the function: falls through to the virtual exit and returns
    /// the finished CFG plus collected nested definitions.
    pub fn finish(mut self) -> (Cfg, Vec<&'a AstNode>) {
        if !self.terminated {
            self.connect(self.current, self.exit);
        }
        (
            Cfg {
                blocks: self.blocks,
                entry: 0,
                exit: self.exit,
            },
            self.nested,
        )
    }

    fn lower_stmt(&mut self, stmt: &'a AstNode) {
        match &stmt.kind {
            NodeKind::FunctionDef { name, .. } | NodeKind::ClassDef { name, .. } => {
                self.emit(
                    PdgNodeKind::Def,
                    stmt.span,
                    ExprFacts::default(),
                    SmallVec::from_iter([name.clone()]),
                );
                self.nested.push(stmt);
            }
            NodeKind::Import(import) => {
                let mut writes: SmallVec<[CompactString; 1]> = SmallVec::new();
                for name in &import.names {
                    writes.push(name.alias.as_ref().unwrap_or(&name.name).clone());
                }
                if import.names.is_empty() && !import.wildcard {
                    let local = import.alias.clone().unwrap_or_else(|| {
                        CompactString::from(
                            import
                                .specifier
                                .rsplit(['.', '/'])
                                .next()
                                .unwrap_or(import.specifier.as_str()),
                        )
                    });
                    writes.push(local);
                }
                self.emit(PdgNodeKind::Import, stmt.span, ExprFacts::default(), writes);
            }
            NodeKind::Assign { target, value } => {
                let mut facts = ExprFacts::default();
                scan_expr(value, &mut facts);
                self.emit(
                    PdgNodeKind::Assign,
                    stmt.span,
                    facts,
                    SmallVec::from_iter([target.clone()]),
                );
            }
            NodeKind::Expr { value } => {
                let mut facts = ExprFacts::default();
                scan_expr(value, &mut facts);
                self.emit(PdgNodeKind::Stmt, stmt.span, facts, SmallVec::new());
            }
            NodeKind::Return { value } => {
                let mut facts = ExprFacts::default();
                if let Some(value) = value {
                    scan_expr(value, &mut facts);
                }
                self.emit(PdgNodeKind::Return, stmt.span, facts, SmallVec::new());
                self.connect(self.current, self.exit);
                self.terminated = true;
            }
            NodeKind::Raise { value } => {
                let mut facts = ExprFacts::default();
                if let Some(value) = value {
                    scan_expr(value, &mut facts);
                }
                self.emit(PdgNodeKind::Raise, stmt.span, facts, SmallVec::new());
                self.connect(self.current, self.exit);
                self.terminated = true;
            }
            NodeKind::Break => {
                self.emit(
                    PdgNodeKind::Stmt,
                    stmt.span,
                    ExprFacts::default(),
                    SmallVec::new(),
                );
                if let Some(ctx) = self.loop_stack.last() {
                    let after = ctx.after;
                    self.connect(self.current, after);
                }
                self.terminated = true;
            }
            NodeKind::Continue => {
                self.emit(
                    PdgNodeKind::Stmt,
                    stmt.span,
                    ExprFacts::default(),
                    SmallVec::new(),
                );
                if let Some(ctx) = self.loop_stack.last() {
                    let header = ctx.header;
                    self.connect(self.current, header);
                }
                self.terminated = true;
            }
            NodeKind::If { test, body, orelse } => self.lower_if(stmt.span, test, body, orelse),
            NodeKind::While { test, body } => {
                self.lower_loop(stmt.span, Some(test.as_ref()), None, body);
            }
            NodeKind::For { target, iter, body } => {
                self.lower_loop(stmt.span, Some(iter.as_ref()), Some(target), body);
            }
            NodeKind::Switch { subject, cases } => self.lower_switch(stmt.span, subject, cases),
            NodeKind::Try {
                body,
                handlers,
                finalbody,
            } => self.lower_try(body, handlers, finalbody),
            // Expression kinds at statement position: treat as expression
            // statements.
            _ => {
                let mut facts = ExprFacts::default();
                scan_expr(stmt, &mut facts);
                self.emit(PdgNodeKind::Stmt, stmt.span, facts, SmallVec::new());
            }
        }
    }

    fn lower_if(&mut self, span: Span, test: &AstNode, body: &'a [AstNode], orelse: &'a [AstNode]) {
        let mut facts = ExprFacts::default();
        scan_expr(test, &mut facts);
        self.emit(PdgNodeKind::Branch, span, facts, SmallVec::new());
        let cond = self.current;

        let then_block = self.new_block();
        self.connect(cond, then_block);
        self.current = then_block;
        self.terminated = false;
        self.lower_stmts(body);
        let then_exit = (!self.terminated).then_some(self.current);

        let else_exit = if orelse.is_empty() {
            Some(cond)
        } else {
            let else_block = self.new_block();
            self.connect(cond, else_block);
            self.current = else_block;
            self.terminated = false;
            self.lower_stmts(orelse);
            (!self.terminated).then_some(self.current)
        };

        let merge = self.new_block();
        if let Some(t) = then_exit {
            self.connect(t, merge);
        }
        if let Some(e) = else_exit {
            self.connect(e, merge);
        }
        self.current = merge;
        self.terminated = false;
    }

    fn lower_loop(
        &mut self,
        span: Span,
        test: Option<&AstNode>,
        target: Option<&CompactString>,
        body: &'a [AstNode],
    ) {
        let header = self.new_block();
        self.connect(self.current, header);
        self.current = header;
        self.terminated = false;

        let mut facts = ExprFacts::default();
        if let Some(test) = test {
            scan_expr(test, &mut facts);
        }
        let (kind, writes) = match target {
            Some(target) => (PdgNodeKind::LoopHeader, SmallVec::from_iter([target.clone()])),
            None => (PdgNodeKind::Branch, SmallVec::new()),
        };
        self.emit(kind, span, facts, writes);

        let after = self.new_block();
        let body_block = self.new_block();
        self.connect(header, body_block);
        self.connect(header, after);

        self.loop_stack.push(LoopCtx { header, after });
        self.current = body_block;
        self.terminated = false;
        self.lower_stmts(body);
        if !self.terminated {
            self.connect(self.current, header);
        }
        self.loop_stack.pop();

        self.current = after;
        self.terminated = false;
    }

    fn lower_switch(&mut self, span: Span, subject: &AstNode, cases: &'a [Vec<AstNode>]) {
        let mut facts = ExprFacts::default();
        scan_expr(subject, &mut facts);
        self.emit(PdgNodeKind::Branch, span, facts, SmallVec::new());
        let cond = self.current;

        let merge = self.new_block();
        // No arm may match.
        self.connect(cond, merge);
        for case in cases {
            let case_block = self.new_block();
            self.connect(cond, case_block);
            self.current = case_block;
            self.terminated = false;
            self.lower_stmts(case);
            if !self.terminated {
                self.connect(self.current, merge);
            }
        }
        self.current = merge;
        self.terminated = false;
    }

    fn lower_try(
        &mut self,
        body: &'a [AstNode],
        handlers: &'a [Vec<AstNode>],
        finalbody: &'a [AstNode],
    ) {
        let entry = self.current;
        let body_block = self.new_block();
        self.connect(entry, body_block);
        self.current = body_block;
        self.terminated = false;
        self.lower_stmts(body);
        let body_exit = (!self.terminated).then_some(self.current);

        let after = self.new_block();
        if let Some(b) = body_exit {
            self.connect(b, after);
        }
        // Any statement in the body may raise, approximated as a branch
        // from the try entry into each handler.
        for handler in handlers {
            let handler_block = self.new_block();
            self.connect(entry, handler_block);
            self.current = handler_block;
            self.terminated = false;
            self.lower_stmts(handler);
            if !self.terminated {
                self.connect(self.current, after);
            }
        }
        self.current = after;
        self.terminated = false;
        self.lower_stmts(finalbody);
    }

    fn emit(
        &mut self,
        kind: PdgNodeKind,
        span: Span,
        facts: ExprFacts,
        writes: SmallVec<[CompactString; 1]>,
    ) -> NodeId {
        self.ensure_current();
        for gap in facts.dynamic {
            self.graph
                .gaps
                .push((gap, "dynamic call target".to_owned()));
        }
        let id = self
            .graph
            .push_node(kind, span, self.func, facts.reads, writes, facts.calls);
        self.blocks[self.current].stmts.push(id);
        id
    }

    /// Statements after a return / break / continue still receive nodes
    /// (reporting completeness) in a fresh block with no predecessors.
    fn ensure_current(&mut self) {
        if self.terminated {
            self.current = self.new_block();
            self.terminated = false;
        }
    }

    fn new_block(&mut self) -> usize {
        self.blocks.push(Block::default());
        self.blocks.len() - 1
    }

    fn connect(&mut self, from: usize, to: usize) {
        if !self.blocks[from].succs.contains(&to) {
            self.blocks[from].succs.push(to);
            self.blocks[to].preds.push(from);
        }
    }
}
