//! The host-IR adapter contract.
//!
//! Kestrel never builds or owns an intermediate representation. The
//! embedding compiler implements [`IrQuery`] over opaque integer handles
//! and kestrel asks it for statements, symbols, memory references and call
//! sites on demand. Everything the adapter hands back ([`Location`]s,
//! [`MemRefExpr`]s, expression trees) is constructed once and treated as
//! immutable for the rest of the analysis session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::loc::{Location, MemRefExpr};
use crate::Error;

/// Handle for a procedure in the host IR.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ProcId(pub usize);

/// Handle for a statement in the host IR.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct StmtId(pub usize);

/// Handle for a symbol in the host IR.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SymId(pub usize);

/// Handle for an expression in the host IR.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ExprId(pub usize);

/// Handle for one memory reference within a statement.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct MemRefId(pub usize);

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "proc({})", self.0)
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stmt({})", self.0)
    }
}

impl fmt::Display for SymId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sym({})", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expr({})", self.0)
    }
}

impl fmt::Display for MemRefId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "memref({})", self.0)
    }
}

/// The operator at one node of an [`ExprTree`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ExprOp {
    Constant(i64),
    Symbol(SymId),
    Call(ExprId),
    Op(String),
}

/// An expression tree obtained from the host IR, used by clients that need
/// to look inside expressions (constant propagation, differentiability).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExprTree {
    op: ExprOp,
    operands: Vec<ExprTree>,
}

impl ExprTree {
    pub fn new(op: ExprOp, operands: Vec<ExprTree>) -> ExprTree {
        ExprTree { op, operands }
    }

    pub fn leaf(op: ExprOp) -> ExprTree {
        ExprTree {
            op,
            operands: Vec::new(),
        }
    }

    pub fn op(&self) -> &ExprOp {
        &self.op
    }

    pub fn operands(&self) -> &[ExprTree] {
        &self.operands
    }

    /// Every symbol mentioned in this tree.
    pub fn syms(&self) -> Vec<SymId> {
        let mut syms = Vec::new();
        self.collect_syms(&mut syms);
        syms
    }

    fn collect_syms(&self, syms: &mut Vec<SymId>) {
        if let ExprOp::Symbol(sym) = self.op {
            syms.push(sym);
        }
        for operand in &self.operands {
            operand.collect_syms(syms);
        }
    }
}

/// The capability set an embedding compiler provides to kestrel.
///
/// All enumeration methods return handles in a deterministic order
/// (program order for procedures and statements). `location` must return
/// the same overlap information every time it is asked for the same
/// `(procedure, symbol)` pair within one analysis session.
pub trait IrQuery {
    /// Every procedure of the program, in program order.
    fn procedures(&self) -> Vec<ProcId>;

    /// The symbol defining the given procedure.
    fn proc_symbol(&self, proc: ProcId) -> SymId;

    /// Every statement of the given procedure, in program order.
    fn statements(&self, proc: ProcId) -> Vec<StmtId>;

    /// Every symbol accessible from the given procedure: locals, formals,
    /// visible globals and their declared overlaps.
    fn accessible_symbols(&self, proc: ProcId) -> Vec<SymId>;

    /// The formal parameters of the given procedure, in declaration order.
    fn formals(&self, proc: ProcId) -> Vec<SymId>;

    /// True if the symbol is a pass-by-reference formal of the procedure.
    fn is_ref_param(&self, proc: ProcId, sym: SymId) -> bool;

    /// The location for a symbol as seen from the given procedure,
    /// including its statically known overlap sets.
    fn location(&self, proc: ProcId, sym: SymId) -> Location;

    /// Every memory reference in the given statement.
    fn mem_refs(&self, stmt: StmtId) -> Vec<MemRefId>;

    /// The memory-reference expressions describing one memory reference.
    fn mem_ref_exprs(&self, mem_ref: MemRefId) -> Vec<MemRefExpr>;

    /// Every call-site expression in the given statement.
    fn call_sites(&self, stmt: StmtId) -> Vec<ExprId>;

    /// The callee symbol of a call site, when it can be resolved
    /// statically.
    fn callee(&self, call: ExprId) -> Option<SymId>;

    /// The actual-parameter expressions of a call site, in call order.
    fn actuals(&self, call: ExprId) -> Vec<ExprId>;

    /// The formal of `callee` that the given actual binds to at the given
    /// call site, when the adapter can determine it.
    fn formal_for_actual(
        &self,
        caller: ProcId,
        call: ExprId,
        callee: ProcId,
        actual: ExprId,
    ) -> Option<SymId>;

    /// The expression tree behind an arbitrary expression handle.
    fn expr_tree(&self, expr: ExprId) -> Option<ExprTree>;

    /// Context hint: some adapters require notification of the current
    /// procedure before their other queries are valid. Kestrel calls this
    /// before walking a procedure; the default does nothing.
    fn enter_procedure(&self, _proc: ProcId) {}
}

/// One actual-to-formal binding at a call site.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Binding {
    pub formal: SymId,
    pub by_reference: bool,
}

/// The parameter-binding table interprocedural propagation consults.
///
/// Keyed by `(caller, call site, callee, actual)`; built once from the
/// adapter and then read-only. A missing entry is an answer ("the adapter
/// could not bind this actual"), not an error.
#[derive(Clone, Debug, Default)]
pub struct ParamBindings {
    bindings: BTreeMap<(ProcId, ExprId, ProcId, ExprId), Binding>,
}

impl ParamBindings {
    pub fn new() -> ParamBindings {
        ParamBindings {
            bindings: BTreeMap::new(),
        }
    }

    /// Build the table for every call site the adapter can resolve to a
    /// procedure defined in the program.
    pub fn build(ir: &dyn IrQuery) -> ParamBindings {
        let procs_by_sym: BTreeMap<SymId, ProcId> = ir
            .procedures()
            .into_iter()
            .map(|proc| (ir.proc_symbol(proc), proc))
            .collect();

        let mut bindings = ParamBindings::new();
        for caller in ir.procedures() {
            ir.enter_procedure(caller);
            for stmt in ir.statements(caller) {
                for call in ir.call_sites(stmt) {
                    let callee = match ir.callee(call).and_then(|sym| procs_by_sym.get(&sym)) {
                        Some(&callee) => callee,
                        None => continue,
                    };
                    for actual in ir.actuals(call) {
                        if let Some(formal) = ir.formal_for_actual(caller, call, callee, actual) {
                            bindings.insert(
                                caller,
                                call,
                                callee,
                                actual,
                                Binding {
                                    formal,
                                    by_reference: ir.is_ref_param(callee, formal),
                                },
                            );
                        }
                    }
                }
            }
        }
        bindings
    }

    pub fn insert(
        &mut self,
        caller: ProcId,
        call: ExprId,
        callee: ProcId,
        actual: ExprId,
        binding: Binding,
    ) {
        self.bindings.insert((caller, call, callee, actual), binding);
    }

    /// The binding for one actual, or `None` if the adapter never bound it.
    pub fn bind(
        &self,
        caller: ProcId,
        call: ExprId,
        callee: ProcId,
        actual: ExprId,
    ) -> Option<Binding> {
        self.bindings.get(&(caller, call, callee, actual)).copied()
    }

    /// The binding for one actual where propagation requires one, e.g. a
    /// pass-by-reference argument. Absence is a typed error here, not a
    /// sentinel.
    pub fn require(
        &self,
        caller: ProcId,
        call: ExprId,
        callee: ProcId,
        actual: ExprId,
    ) -> Result<Binding, Error> {
        self.bind(caller, call, callee, actual)
            .ok_or(Error::UnboundActual {
                caller,
                call,
                callee,
                actual,
            })
    }

    /// Every binding established for one call site, in actual order.
    pub fn bindings_for_call(
        &self,
        caller: ProcId,
        call: ExprId,
        callee: ProcId,
    ) -> Vec<(ExprId, Binding)> {
        self.bindings
            .range((caller, call, callee, ExprId(0))..=(caller, call, callee, ExprId(usize::MAX)))
            .map(|(&(_, _, _, actual), &binding)| (actual, binding))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
