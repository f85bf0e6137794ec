//! A small in-memory IR implementing [`IrQuery`], plus cross-module
//! scenario tests over it.

use std::cell::Cell;

use crate::ir::{ExprId, ExprOp, ExprTree, IrQuery, MemRefId, ProcId, StmtId, SymId};
use crate::loc::{Location, MemRefExpr, NamedLoc};

struct TestSym {
    #[allow(dead_code)]
    name: String,
    global: bool,
    full_overlaps: Vec<SymId>,
    part_overlaps: Vec<SymId>,
}

struct TestProc {
    sym: SymId,
    stmts: Vec<StmtId>,
    formals: Vec<SymId>,
    by_ref: Vec<SymId>,
}

#[derive(Default)]
struct TestStmt {
    mem_refs: Vec<MemRefId>,
    calls: Vec<ExprId>,
}

enum TestExpr {
    Call { callee: SymId, actuals: Vec<ExprId> },
    Sym(SymId),
}

/// An in-memory program built statement by statement in tests.
#[derive(Default)]
pub(crate) struct TestIr {
    syms: Vec<TestSym>,
    procs: Vec<TestProc>,
    stmts: Vec<TestStmt>,
    exprs: Vec<TestExpr>,
    mem_refs: Vec<Vec<MemRefExpr>>,
    current: Cell<Option<ProcId>>,
}

impl TestIr {
    pub fn new() -> TestIr {
        TestIr {
            syms: Vec::new(),
            procs: Vec::new(),
            stmts: Vec::new(),
            exprs: Vec::new(),
            mem_refs: Vec::new(),
            current: Cell::new(None),
        }
    }

    pub fn add_sym(&mut self, name: &str, global: bool) -> SymId {
        let sym = SymId(self.syms.len());
        self.syms.push(TestSym {
            name: name.to_string(),
            global,
            full_overlaps: Vec::new(),
            part_overlaps: Vec::new(),
        });
        sym
    }

    /// Declare that `a` and `b` fully overlap each other.
    pub fn add_full_overlap(&mut self, a: SymId, b: SymId) {
        self.syms[a.0].full_overlaps.push(b);
        self.syms[b.0].full_overlaps.push(a);
    }

    /// Declare that `a` and `b` partially overlap each other.
    #[allow(dead_code)]
    pub fn add_part_overlap(&mut self, a: SymId, b: SymId) {
        self.syms[a.0].part_overlaps.push(b);
        self.syms[b.0].part_overlaps.push(a);
    }

    pub fn add_proc(&mut self, name: &str) -> ProcId {
        let sym = self.add_sym(name, true);
        let proc = ProcId(self.procs.len());
        self.procs.push(TestProc {
            sym,
            stmts: Vec::new(),
            formals: Vec::new(),
            by_ref: Vec::new(),
        });
        proc
    }

    pub fn add_formal(&mut self, proc: ProcId, sym: SymId, by_ref: bool) {
        self.procs[proc.0].formals.push(sym);
        if by_ref {
            self.procs[proc.0].by_ref.push(sym);
        }
    }

    pub fn add_stmt(&mut self, proc: ProcId) -> StmtId {
        let stmt = StmtId(self.stmts.len());
        self.stmts.push(TestStmt::default());
        self.procs[proc.0].stmts.push(stmt);
        stmt
    }

    pub fn add_mem_ref(&mut self, stmt: StmtId, exprs: Vec<MemRefExpr>) -> MemRefId {
        let mem_ref = MemRefId(self.mem_refs.len());
        self.mem_refs.push(exprs);
        self.stmts[stmt.0].mem_refs.push(mem_ref);
        mem_ref
    }

    /// A memory reference naming one symbol directly.
    pub fn add_named_mem_ref(&mut self, stmt: StmtId, sym: SymId) -> MemRefId {
        self.add_mem_ref(stmt, vec![MemRefExpr::named(sym)])
    }

    pub fn add_sym_expr(&mut self, sym: SymId) -> ExprId {
        let expr = ExprId(self.exprs.len());
        self.exprs.push(TestExpr::Sym(sym));
        expr
    }

    pub fn add_call(&mut self, stmt: StmtId, callee: SymId, actuals: Vec<ExprId>) -> ExprId {
        let call = ExprId(self.exprs.len());
        self.exprs.push(TestExpr::Call { callee, actuals });
        self.stmts[stmt.0].calls.push(call);
        call
    }

    /// The procedure most recently passed to `enter_procedure`.
    #[allow(dead_code)]
    pub fn current_procedure(&self) -> Option<ProcId> {
        self.current.get()
    }
}

impl IrQuery for TestIr {
    fn procedures(&self) -> Vec<ProcId> {
        (0..self.procs.len()).map(ProcId).collect()
    }

    fn proc_symbol(&self, proc: ProcId) -> SymId {
        self.procs[proc.0].sym
    }

    fn statements(&self, proc: ProcId) -> Vec<StmtId> {
        self.procs[proc.0].stmts.clone()
    }

    fn accessible_symbols(&self, _proc: ProcId) -> Vec<SymId> {
        (0..self.syms.len()).map(SymId).collect()
    }

    fn formals(&self, proc: ProcId) -> Vec<SymId> {
        self.procs[proc.0].formals.clone()
    }

    fn is_ref_param(&self, proc: ProcId, sym: SymId) -> bool {
        self.procs[proc.0].by_ref.contains(&sym)
    }

    fn location(&self, _proc: ProcId, sym: SymId) -> Location {
        let entry = &self.syms[sym.0];
        let mut named = NamedLoc::new(sym, !entry.global);
        for &overlap in &entry.full_overlaps {
            named.add_full_overlap(overlap);
        }
        for &overlap in &entry.part_overlaps {
            named.add_part_overlap(overlap);
        }
        Location::Named(named)
    }

    fn mem_refs(&self, stmt: StmtId) -> Vec<MemRefId> {
        self.stmts[stmt.0].mem_refs.clone()
    }

    fn mem_ref_exprs(&self, mem_ref: MemRefId) -> Vec<MemRefExpr> {
        self.mem_refs[mem_ref.0].clone()
    }

    fn call_sites(&self, stmt: StmtId) -> Vec<ExprId> {
        self.stmts[stmt.0].calls.clone()
    }

    fn callee(&self, call: ExprId) -> Option<SymId> {
        match self.exprs[call.0] {
            TestExpr::Call { callee, .. } => Some(callee),
            TestExpr::Sym(_) => None,
        }
    }

    fn actuals(&self, call: ExprId) -> Vec<ExprId> {
        match self.exprs[call.0] {
            TestExpr::Call { ref actuals, .. } => actuals.clone(),
            TestExpr::Sym(_) => Vec::new(),
        }
    }

    fn formal_for_actual(
        &self,
        _caller: ProcId,
        call: ExprId,
        callee: ProcId,
        actual: ExprId,
    ) -> Option<SymId> {
        let actuals = self.actuals(call);
        let position = actuals.iter().position(|&candidate| candidate == actual)?;
        self.procs[callee.0].formals.get(position).copied()
    }

    fn expr_tree(&self, expr: ExprId) -> Option<ExprTree> {
        match self.exprs[expr.0] {
            TestExpr::Sym(sym) => Some(ExprTree::leaf(ExprOp::Symbol(sym))),
            TestExpr::Call { ref actuals, .. } => {
                let operands = actuals
                    .iter()
                    .filter_map(|&actual| self.expr_tree(actual))
                    .collect();
                Some(ExprTree::new(ExprOp::Call(expr), operands))
            }
        }
    }

    fn enter_procedure(&self, proc: ProcId) {
        self.current.set(Some(proc));
    }
}

#[cfg(test)]
mod scenarios {
    use super::*;
    use crate::analysis::{
        alias_sets_bottom, solve_call_graph, solve_cfg, solve_icfg, CallGraph,
        CfgDataFlowProblem, Direction, Icfg, InterproceduralProblem, SymSet,
    };
    use crate::cfg::Cfg;
    use crate::ir::ParamBindings;
    use crate::output::{Dump, JsonEmitter};
    use std::collections::BTreeMap;

    /// main defines `a`, calls foo(a), then runs one more statement.
    /// foo has one by-value formal `f` and an empty body statement.
    struct CallFixture {
        ir: TestIr,
        main: ProcId,
        foo: ProcId,
        a: SymId,
        f: SymId,
        def_stmt: StmtId,
        call_stmt: StmtId,
        after_stmt: StmtId,
        foo_stmt: StmtId,
        call: ExprId,
    }

    fn call_fixture() -> CallFixture {
        let mut ir = TestIr::new();
        let a = ir.add_sym("a", false);
        let f = ir.add_sym("f", false);

        let main = ir.add_proc("main");
        let foo = ir.add_proc("foo");
        ir.add_formal(foo, f, false);

        let def_stmt = ir.add_stmt(main);
        ir.add_named_mem_ref(def_stmt, a);
        let call_stmt = ir.add_stmt(main);
        let actual = ir.add_sym_expr(a);
        let call = ir.add_call(call_stmt, ir.proc_symbol(foo), vec![actual]);
        let after_stmt = ir.add_stmt(main);

        let foo_stmt = ir.add_stmt(foo);

        CallFixture {
            ir,
            main,
            foo,
            a,
            f,
            def_stmt,
            call_stmt,
            after_stmt,
            foo_stmt,
            call,
        }
    }

    fn chain_cfg(stmts: &[StmtId]) -> Cfg {
        let mut cfg = Cfg::new();
        let entry = cfg.new_node().unwrap().index();
        let body = {
            let node = cfg.new_node().unwrap();
            for &stmt in stmts {
                node.push_statement(stmt);
            }
            node.index()
        };
        let exit = cfg.new_node().unwrap().index();
        cfg.add_edge(entry, body).unwrap();
        cfg.add_edge(body, exit).unwrap();
        cfg.set_entry(entry).unwrap();
        cfg.set_exit(exit).unwrap();
        cfg
    }

    /// Forward reaching-symbols: a statement's named memory references are
    /// its definitions; call sites map actuals to formals and back.
    struct ReachingSyms<'i> {
        ir: &'i TestIr,
        bindings: &'i ParamBindings,
    }

    impl<'i> CfgDataFlowProblem for ReachingSyms<'i> {
        type Set = SymSet;

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn top(&self) -> SymSet {
            SymSet::new()
        }

        fn transfer(&self, _proc: ProcId, set: SymSet, stmt: StmtId) -> SymSet {
            let mut set = set;
            for mem_ref in self.ir.mem_refs(stmt) {
                for expr in self.ir.mem_ref_exprs(mem_ref) {
                    for sym in expr.base_syms() {
                        set.insert(sym);
                    }
                }
            }
            set
        }
    }

    impl<'i> InterproceduralProblem for ReachingSyms<'i> {
        fn caller_to_callee(
            &self,
            caller: ProcId,
            set: SymSet,
            call: ExprId,
            callee: ProcId,
        ) -> SymSet {
            let mut mapped = SymSet::new();
            for (actual, binding) in self.bindings.bindings_for_call(caller, call, callee) {
                let actual_syms = self
                    .ir
                    .expr_tree(actual)
                    .map(|tree| tree.syms())
                    .unwrap_or_default();
                if actual_syms.into_iter().any(|sym| set.contains(sym)) {
                    mapped.insert(binding.formal);
                }
            }
            mapped
        }

        fn callee_to_caller(
            &self,
            callee: ProcId,
            set: SymSet,
            call: ExprId,
            caller: ProcId,
        ) -> SymSet {
            let mut mapped = SymSet::new();
            for (actual, binding) in self.bindings.bindings_for_call(caller, call, callee) {
                if set.contains(binding.formal) {
                    if let Some(tree) = self.ir.expr_tree(actual) {
                        for sym in tree.syms() {
                            mapped.insert(sym);
                        }
                    }
                }
            }
            mapped
        }
    }

    #[test]
    fn param_bindings_map_actuals_to_formals() {
        let fixture = call_fixture();
        let bindings = ParamBindings::build(&fixture.ir);

        assert_eq!(bindings.len(), 1);
        let actual = fixture.ir.actuals(fixture.call)[0];
        let binding = bindings
            .bind(fixture.main, fixture.call, fixture.foo, actual)
            .unwrap();
        assert_eq!(binding.formal, fixture.f);
        assert!(!binding.by_reference);

        assert!(bindings
            .bind(fixture.main, fixture.call, fixture.foo, ExprId(999))
            .is_none());
    }

    #[test]
    fn icfg_carries_facts_into_the_callee_and_back() {
        let fixture = call_fixture();
        let bindings = ParamBindings::build(&fixture.ir);

        let mut cfgs = BTreeMap::new();
        cfgs.insert(
            fixture.main,
            chain_cfg(&[fixture.def_stmt, fixture.call_stmt, fixture.after_stmt]),
        );
        cfgs.insert(fixture.foo, chain_cfg(&[fixture.foo_stmt]));

        let icfg = Icfg::build(&fixture.ir, &cfgs).unwrap();
        let problem = ReachingSyms {
            ir: &fixture.ir,
            bindings: &bindings,
        };
        let result = solve_icfg(&problem, &icfg, &fixture.ir).unwrap();

        // the definition of a reaches the call and maps to foo's formal
        let foo_entry = icfg.entry_of(fixture.foo).unwrap();
        assert!(result.node_in(foo_entry).unwrap().contains(fixture.f));
        assert!(!result.node_in(foo_entry).unwrap().contains(fixture.a));

        // the callee's exit maps back to the caller's name space
        let call_node = icfg.node_of_stmt(fixture.call_stmt).unwrap();
        assert!(result.node_out(call_node).unwrap().contains(fixture.a));
        assert!(!result.node_out(call_node).unwrap().contains(fixture.f));

        // and flows on to the statement after the call
        let after_node = icfg.node_of_stmt(fixture.after_stmt).unwrap();
        assert!(result.node_in(after_node).unwrap().contains(fixture.a));
    }

    /// Backward side-effect style problem over the call graph: a
    /// procedure's summary is every symbol it or its callees define.
    struct SideEffects<'i> {
        ir: &'i TestIr,
    }

    impl<'i> CfgDataFlowProblem for SideEffects<'i> {
        type Set = SymSet;

        fn direction(&self) -> Direction {
            Direction::Backward
        }

        fn top(&self) -> SymSet {
            SymSet::new()
        }

        fn transfer(&self, _proc: ProcId, set: SymSet, stmt: StmtId) -> SymSet {
            let mut set = set;
            for mem_ref in self.ir.mem_refs(stmt) {
                for expr in self.ir.mem_ref_exprs(mem_ref) {
                    for sym in expr.base_syms() {
                        set.insert(sym);
                    }
                }
            }
            set
        }
    }

    impl<'i> InterproceduralProblem for SideEffects<'i> {
        fn caller_to_callee(
            &self,
            _caller: ProcId,
            set: SymSet,
            _call: ExprId,
            _callee: ProcId,
        ) -> SymSet {
            set
        }

        // globals keep their names across the call boundary
        fn callee_to_caller(
            &self,
            _callee: ProcId,
            set: SymSet,
            _call: ExprId,
            _caller: ProcId,
        ) -> SymSet {
            set
        }
    }

    #[test]
    fn call_graph_summaries_flow_bottom_up() {
        let mut ir = TestIr::new();
        let g = ir.add_sym("g", true);
        let main = ir.add_proc("main");
        let foo = ir.add_proc("foo");

        let call_stmt = ir.add_stmt(main);
        ir.add_call(call_stmt, ir.proc_symbol(foo), vec![]);
        let write_stmt = ir.add_stmt(foo);
        ir.add_named_mem_ref(write_stmt, g);

        let call_graph = CallGraph::build(&ir).unwrap();
        let problem = SideEffects { ir: &ir };
        let result = solve_call_graph(&problem, &call_graph, &ir).unwrap();

        let main_node = call_graph.node_for_sym(ir.proc_symbol(main)).unwrap();
        let foo_node = call_graph.node_for_sym(ir.proc_symbol(foo)).unwrap();

        // foo's own summary, and main's summary including its callee
        assert!(result.node_in(foo_node).unwrap().contains(g));
        assert!(result.node_in(main_node).unwrap().contains(g));
        assert!(result.iterations() >= 1);
    }

    #[test]
    fn data_flow_results_dump_per_node_sets() {
        let mut ir = TestIr::new();
        let g = ir.add_sym("g", true);
        let foo = ir.add_proc("foo");
        let stmt = ir.add_stmt(foo);
        ir.add_named_mem_ref(stmt, g);

        let cfg = chain_cfg(&[stmt]);
        let problem = SideEffects { ir: &ir };
        let result = solve_cfg(&problem, foo, &cfg, &ir).unwrap();

        let mut emitter = JsonEmitter::new();
        result
            .dump_with(&mut emitter, &|set| set.to_string())
            .unwrap();
        let value = emitter.into_value().unwrap();

        let node_in = value["data_flow_result"]["node_in"].as_object().unwrap();
        assert_eq!(node_in.len(), 3);
        assert_eq!(value["data_flow_result"]["iterations"], "1");
    }

    #[test]
    fn call_graph_dump_has_nodes_and_edges() {
        let mut ir = TestIr::new();
        let main = ir.add_proc("main");
        let foo = ir.add_proc("foo");
        let s0 = ir.add_stmt(main);
        let s1 = ir.add_stmt(main);
        ir.add_call(s0, ir.proc_symbol(foo), vec![]);
        ir.add_call(s1, ir.proc_symbol(foo), vec![]);

        let call_graph = CallGraph::build(&ir).unwrap();

        let mut emitter = JsonEmitter::new();
        call_graph.dump(&mut emitter).unwrap();
        let value = emitter.into_value().unwrap();

        assert_eq!(value["call_graph"]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["call_graph"]["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn alias_sets_dump_lists_every_class() {
        let mut ir = TestIr::new();
        let g = ir.add_sym("g", true);
        let local = ir.add_sym("l", false);
        let proc = ir.add_proc("f");
        let stmt = ir.add_stmt(proc);
        ir.add_named_mem_ref(stmt, g);
        ir.add_named_mem_ref(stmt, local);

        let sets = alias_sets_bottom(&ir, proc).unwrap();

        let mut emitter = JsonEmitter::new();
        sets.dump(&mut emitter).unwrap();
        let value = emitter.into_value().unwrap();

        let classes = value["alias_sets"]["classes"].as_array().unwrap();
        assert_eq!(classes.len(), sets.num_classes());
    }

    #[test]
    fn the_adapter_sees_the_context_hint() {
        let mut ir = TestIr::new();
        ir.add_proc("main");
        let last = ir.add_proc("zed");

        let _ = CallGraph::build(&ir).unwrap();
        assert_eq!(ir.current_procedure(), Some(last));
    }
}
