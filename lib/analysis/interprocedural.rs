//! Interprocedural data-flow propagation.
//!
//! Two flavors are supported. [`solve_call_graph`] propagates summaries
//! over the call graph, treating each procedure monolithically: `Forward`
//! problems flow top-down through `caller_to_callee`, `Backward` problems
//! flow bottom-up through `callee_to_caller`. [`solve_icfg`] is the
//! flow-sensitive variant: it solves one merged graph ([`Icfg`]) spanning
//! every procedure body, applying the two mapping callbacks across call
//! and return edges instead of an ordinary meet contribution.
//!
//! Actual/formal correspondence (including pass-by-reference) comes from a
//! [`ParamBindings`](crate::ir::ParamBindings) table the problem captures
//! at construction; the solvers themselves never look inside the sets they
//! carry.

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::analysis::{CallGraph, CfgDataFlowProblem, DataFlowResult, DataFlowSet, Direction};
use crate::cfg::Cfg;
use crate::graph;
use crate::ir::{ExprId, IrQuery, ProcId, StmtId, SymId};
use crate::Error;

/// The two extra callbacks an interprocedural analysis supplies on top of
/// its intraprocedural problem.
pub trait InterproceduralProblem: CfgDataFlowProblem {
    /// Map a set at a call site in the caller into the callee's name
    /// space, producing the callee's entry contribution.
    fn caller_to_callee(
        &self,
        caller: ProcId,
        set: Self::Set,
        call: ExprId,
        callee: ProcId,
    ) -> Self::Set;

    /// Fold a set at the callee's exit back into the caller's name space
    /// at the call site.
    fn callee_to_caller(
        &self,
        callee: ProcId,
        set: Self::Set,
        call: ExprId,
        caller: ProcId,
    ) -> Self::Set;
}

/// Propagate summaries over the call graph, one monolithic set per
/// procedure.
///
/// `node_in` of the result is the set at each procedure's entry boundary
/// and `node_out` the set at its exit boundary, keyed by call-graph node
/// index. A node whose procedure body is outside the compilation unit
/// passes its sets through unchanged. Call edges whose caller or callee
/// has no body contribute their set unmapped, since there is no binding
/// information to map through.
pub fn solve_call_graph<P: InterproceduralProblem>(
    problem: &P,
    call_graph: &CallGraph,
    ir: &dyn IrQuery,
) -> Result<DataFlowResult<P::Set>, Error> {
    let mut node_in: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut node_out: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut visits: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for node in call_graph.nodes() {
        node_in.insert(node.index(), problem.top());
        node_out.insert(node.index(), problem.top());
        visits.insert(node.index(), 0);
    }
    match problem.direction() {
        Direction::Forward => queue.extend(node_in.keys().cloned()),
        Direction::Backward => queue.extend(node_in.keys().rev().cloned()),
    }

    while let Some(index) = queue.pop_front() {
        *visits.get_mut(&index).unwrap() += 1;
        let node = call_graph.node(index)?;

        match problem.direction() {
            Direction::Forward => {
                // top-down: the entry set is the meet over every call site
                // of the caller's exit set, mapped into this procedure
                let mut in_set: Option<P::Set> = None;
                for edge in call_graph.callers_of(index)? {
                    let caller_node = call_graph.node(edge.head())?;
                    let caller_out = node_out[&edge.head()].clone();
                    let contribution = match (caller_node.proc(), node.proc()) {
                        (Some(caller), Some(callee)) => {
                            problem.caller_to_callee(caller, caller_out, edge.call(), callee)
                        }
                        (Some(_), None) | (None, Some(_)) | (None, None) => caller_out,
                    };
                    in_set = Some(match in_set {
                        Some(set) => set.meet(&contribution),
                        None => contribution,
                    });
                }
                let in_set = in_set.unwrap_or_else(|| node_in[&index].clone());

                let out_set = match node.proc() {
                    Some(proc) => {
                        ir.enter_procedure(proc);
                        let mut set = problem.entry_transfer(proc, in_set.clone());
                        for stmt in ir.statements(proc) {
                            set = problem.transfer(proc, set, stmt);
                        }
                        problem.exit_transfer(proc, set)
                    }
                    None => in_set.clone(),
                };

                node_in.insert(index, in_set);
                if out_set != node_out[&index] {
                    trace!("call graph node {} summary changed", index);
                    node_out.insert(index, out_set);
                    for succ in call_graph.graph().successor_indices(index)? {
                        if !queue.contains(&succ) {
                            queue.push_back(succ);
                        }
                    }
                }
            }
            Direction::Backward => {
                // bottom-up: the exit set is the meet over every call this
                // procedure makes of the callee's summary, folded back in
                let mut out_set: Option<P::Set> = None;
                for edge in call_graph.callees_of(index)? {
                    let callee_node = call_graph.node(edge.tail())?;
                    let callee_in = node_in[&edge.tail()].clone();
                    let contribution = match (callee_node.proc(), node.proc()) {
                        (Some(callee), Some(caller)) => {
                            problem.callee_to_caller(callee, callee_in, edge.call(), caller)
                        }
                        (Some(_), None) | (None, Some(_)) | (None, None) => callee_in,
                    };
                    out_set = Some(match out_set {
                        Some(set) => set.meet(&contribution),
                        None => contribution,
                    });
                }
                let out_set = out_set.unwrap_or_else(|| node_out[&index].clone());

                let in_set = match node.proc() {
                    Some(proc) => {
                        ir.enter_procedure(proc);
                        let mut set = problem.exit_transfer(proc, out_set.clone());
                        for &stmt in ir.statements(proc).iter().rev() {
                            set = problem.transfer(proc, set, stmt);
                        }
                        problem.entry_transfer(proc, set)
                    }
                    None => out_set.clone(),
                };

                node_out.insert(index, out_set);
                if in_set != node_in[&index] {
                    trace!("call graph node {} summary changed", index);
                    node_in.insert(index, in_set);
                    for pred in call_graph.graph().predecessor_indices(index)? {
                        if !queue.contains(&pred) {
                            queue.push_back(pred);
                        }
                    }
                }
            }
        }
    }

    let iterations = visits.values().max().copied().unwrap_or(0);
    trace!("call graph fixpoint reached, iterations={}", iterations);

    Ok(DataFlowResult::new(node_in, node_out, iterations))
}

/// The kind of an ICFG edge. Call and return edges carry the call
/// expression they were created for.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IcfgEdgeKind {
    /// Ordinary control flow inside one procedure.
    Flow,
    /// Call-site node to callee entry.
    Call(ExprId),
    /// Callee exit back to the call-site node.
    Return(ExprId),
}

/// One node of the merged interprocedural CFG: a run of statements of one
/// procedure. A call statement always sits alone in its own node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IcfgNode {
    index: usize,
    proc: ProcId,
    statements: Vec<StmtId>,
    calls: Vec<ExprId>,
}

impl IcfgNode {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn proc(&self) -> ProcId {
        self.proc
    }

    pub fn statements(&self) -> &[StmtId] {
        &self.statements
    }

    /// The call sites of this node's single call statement. Empty for a
    /// plain node.
    pub fn calls(&self) -> &[ExprId] {
        &self.calls
    }

    pub fn is_call_node(&self) -> bool {
        !self.calls.is_empty()
    }
}

impl graph::Vertex for IcfgNode {
    fn index(&self) -> usize {
        self.index
    }
    fn dot_label(&self) -> String {
        let statements = self
            .statements
            .iter()
            .map(|stmt| stmt.to_string())
            .collect::<Vec<String>>();
        format!("[{}] {} {}", self.index, self.proc, statements.join("\n"))
    }
}

/// An edge of the merged interprocedural CFG.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IcfgEdge {
    head: usize,
    tail: usize,
    kind: IcfgEdgeKind,
}

impl IcfgEdge {
    pub fn flow(head: usize, tail: usize) -> IcfgEdge {
        IcfgEdge {
            head,
            tail,
            kind: IcfgEdgeKind::Flow,
        }
    }

    pub fn call(head: usize, tail: usize, call: ExprId) -> IcfgEdge {
        IcfgEdge {
            head,
            tail,
            kind: IcfgEdgeKind::Call(call),
        }
    }

    pub fn ret(head: usize, tail: usize, call: ExprId) -> IcfgEdge {
        IcfgEdge {
            head,
            tail,
            kind: IcfgEdgeKind::Return(call),
        }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn kind(&self) -> IcfgEdgeKind {
        self.kind
    }
}

impl graph::Edge for IcfgEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
    fn dot_label(&self) -> String {
        match self.kind {
            IcfgEdgeKind::Flow => String::new(),
            IcfgEdgeKind::Call(call) => format!("call {}", call),
            IcfgEdgeKind::Return(call) => format!("return {}", call),
        }
    }
}

/// The merged interprocedural CFG: every procedure's CFG plus call and
/// return edges linking call-site nodes to callee bodies.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Icfg {
    graph: graph::Graph<IcfgNode, IcfgEdge>,
    entries: BTreeMap<ProcId, usize>,
    exits: BTreeMap<ProcId, usize>,
    stmt_nodes: BTreeMap<StmtId, usize>,
}

impl Icfg {
    /// Merge the given per-procedure CFGs into one graph.
    ///
    /// Statement runs are split so every call statement gets its own node.
    /// A call site resolving to a procedure with a CFG in `cfgs` gets a
    /// call edge to that procedure's entry and a return edge from its exit
    /// back to the call-site node; anything else is left to the problem's
    /// ordinary transfer.
    pub fn build(ir: &dyn IrQuery, cfgs: &BTreeMap<ProcId, Cfg>) -> Result<Icfg, Error> {
        let procs_by_sym: BTreeMap<SymId, ProcId> = ir
            .procedures()
            .into_iter()
            .map(|proc| (ir.proc_symbol(proc), proc))
            .collect();

        let mut icfg = Icfg {
            graph: graph::Graph::new(),
            entries: BTreeMap::new(),
            exits: BTreeMap::new(),
            stmt_nodes: BTreeMap::new(),
        };
        let mut next_index = 0;
        // (proc, cfg node index) -> (first, last) icfg node index
        let mut spans: BTreeMap<(ProcId, usize), (usize, usize)> = BTreeMap::new();

        for (&proc, cfg) in cfgs {
            ir.enter_procedure(proc);

            for cfg_node in cfg.nodes() {
                let mut runs: Vec<(Vec<StmtId>, Vec<ExprId>)> = Vec::new();
                let mut current: Vec<StmtId> = Vec::new();
                for &stmt in cfg_node.statements() {
                    let calls = ir.call_sites(stmt);
                    if calls.is_empty() {
                        current.push(stmt);
                    } else {
                        if !current.is_empty() {
                            runs.push((std::mem::take(&mut current), Vec::new()));
                        }
                        runs.push((vec![stmt], calls));
                    }
                }
                if !current.is_empty() || runs.is_empty() {
                    runs.push((current, Vec::new()));
                }

                let first = next_index;
                let mut previous: Option<usize> = None;
                for (statements, calls) in runs {
                    let index = next_index;
                    next_index += 1;
                    for &stmt in &statements {
                        icfg.stmt_nodes.insert(stmt, index);
                    }
                    icfg.graph.insert_vertex(IcfgNode {
                        index,
                        proc,
                        statements,
                        calls,
                    })?;
                    if let Some(previous) = previous {
                        icfg.graph.insert_edge(IcfgEdge::flow(previous, index))?;
                    }
                    previous = Some(index);
                }
                let last = next_index - 1;
                spans.insert((proc, cfg_node.index()), (first, last));
            }

            for edge in cfg.graph().edges() {
                let (_, head_last) = spans[&(proc, edge.head())];
                let (tail_first, _) = spans[&(proc, edge.tail())];
                icfg.graph
                    .insert_edge(IcfgEdge::flow(head_last, tail_first))?;
            }

            icfg.entries
                .insert(proc, spans[&(proc, cfg.entry_required()?)].0);
            icfg.exits
                .insert(proc, spans[&(proc, cfg.exit_required()?)].1);
        }

        // call/return edges for every call site resolving to a procedure
        // with a body in this graph
        let call_nodes: Vec<(usize, Vec<ExprId>)> = icfg
            .graph
            .vertices()
            .iter()
            .filter(|node| node.is_call_node())
            .map(|node| (node.index(), node.calls().to_vec()))
            .collect();
        for (index, calls) in call_nodes {
            for call in calls {
                let callee = match ir
                    .callee(call)
                    .and_then(|sym| procs_by_sym.get(&sym).copied())
                {
                    Some(callee) => callee,
                    None => continue,
                };
                let (entry, exit) = match (icfg.entries.get(&callee), icfg.exits.get(&callee)) {
                    (Some(&entry), Some(&exit)) => (entry, exit),
                    (Some(_), None) | (None, Some(_)) | (None, None) => continue,
                };
                icfg.graph.insert_edge(IcfgEdge::call(index, entry, call))?;
                icfg.graph.insert_edge(IcfgEdge::ret(exit, index, call))?;
            }
        }

        Ok(icfg)
    }

    /// Returns the underlying graph
    pub fn graph(&self) -> &graph::Graph<IcfgNode, IcfgEdge> {
        &self.graph
    }

    pub fn node(&self, index: usize) -> Result<&IcfgNode, Error> {
        self.graph.vertex(index)
    }

    /// Every node, in index order.
    pub fn nodes(&self) -> Vec<&IcfgNode> {
        self.graph.vertices()
    }

    /// The entry node of a procedure's body in this graph.
    pub fn entry_of(&self, proc: ProcId) -> Option<usize> {
        self.entries.get(&proc).copied()
    }

    /// The exit node of a procedure's body in this graph.
    pub fn exit_of(&self, proc: ProcId) -> Option<usize> {
        self.exits.get(&proc).copied()
    }

    /// The node holding the given statement.
    pub fn node_of_stmt(&self, stmt: StmtId) -> Option<usize> {
        self.stmt_nodes.get(&stmt).copied()
    }
}

/// Solve the flow-sensitive interprocedural problem over a merged graph.
///
/// At a call-site node the ordinary statement transfer is skipped for the
/// call statement itself: the set before the call flows into the callee's
/// entry through `caller_to_callee`, and the callee's exit set flows back
/// into the node's OUT through `callee_to_caller`. A call site with no
/// body in the graph falls back to the ordinary transfer.
pub fn solve_icfg<P: InterproceduralProblem>(
    problem: &P,
    icfg: &Icfg,
    ir: &dyn IrQuery,
) -> Result<DataFlowResult<P::Set>, Error> {
    let mut node_in: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut node_out: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut visits: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for node in icfg.nodes() {
        node_in.insert(node.index(), problem.top());
        node_out.insert(node.index(), problem.top());
        visits.insert(node.index(), 0);
    }
    match problem.direction() {
        Direction::Forward => queue.extend(node_in.keys().cloned()),
        Direction::Backward => queue.extend(node_in.keys().rev().cloned()),
    }

    while let Some(index) = queue.pop_front() {
        *visits.get_mut(&index).unwrap() += 1;
        let node = icfg.node(index)?;
        let proc = node.proc();
        ir.enter_procedure(proc);

        let (new_in, new_out) = match problem.direction() {
            Direction::Forward => {
                let mut in_set: Option<P::Set> = None;
                for edge in icfg.graph().edges_in(index)? {
                    let contribution = match edge.kind() {
                        IcfgEdgeKind::Flow => node_out[&edge.head()].clone(),
                        IcfgEdgeKind::Call(call) => {
                            let caller = icfg.node(edge.head())?.proc();
                            problem.caller_to_callee(
                                caller,
                                node_in[&edge.head()].clone(),
                                call,
                                proc,
                            )
                        }
                        // return edges contribute to OUT below
                        IcfgEdgeKind::Return(_) => continue,
                    };
                    in_set = Some(match in_set {
                        Some(set) => set.meet(&contribution),
                        None => contribution,
                    });
                }
                let mut in_set = in_set.unwrap_or_else(|| node_in[&index].clone());
                if icfg.entry_of(proc) == Some(index) {
                    in_set = problem.entry_transfer(proc, in_set);
                }

                let return_edges: Vec<&IcfgEdge> = icfg
                    .graph()
                    .edges_in(index)?
                    .into_iter()
                    .filter(|edge| matches!(edge.kind(), IcfgEdgeKind::Return(_)))
                    .collect();

                let mut out_set = if return_edges.is_empty() {
                    let mut set = in_set.clone();
                    for &stmt in node.statements() {
                        set = problem.transfer(proc, set, stmt);
                    }
                    set
                } else {
                    let mut set: Option<P::Set> = None;
                    for edge in return_edges {
                        let call = match edge.kind() {
                            IcfgEdgeKind::Return(call) => call,
                            IcfgEdgeKind::Flow | IcfgEdgeKind::Call(_) => continue,
                        };
                        let callee = icfg.node(edge.head())?.proc();
                        let contribution = problem.callee_to_caller(
                            callee,
                            node_out[&edge.head()].clone(),
                            call,
                            proc,
                        );
                        set = Some(match set {
                            Some(set) => set.meet(&contribution),
                            None => contribution,
                        });
                    }
                    // a call node always has at least one return edge here
                    set.unwrap_or_else(|| in_set.clone())
                };
                if icfg.exit_of(proc) == Some(index) {
                    out_set = problem.exit_transfer(proc, out_set);
                }

                (in_set, out_set)
            }
            Direction::Backward => {
                let mut out_set: Option<P::Set> = None;
                for edge in icfg.graph().edges_out(index)? {
                    let contribution = match edge.kind() {
                        IcfgEdgeKind::Flow => node_in[&edge.tail()].clone(),
                        // this node is the callee exit; the edge tail is
                        // the call-site node, whose post-call set flows in
                        IcfgEdgeKind::Return(call) => {
                            let caller = icfg.node(edge.tail())?.proc();
                            problem.caller_to_callee(
                                caller,
                                node_out[&edge.tail()].clone(),
                                call,
                                proc,
                            )
                        }
                        // call edges contribute to IN below
                        IcfgEdgeKind::Call(_) => continue,
                    };
                    out_set = Some(match out_set {
                        Some(set) => set.meet(&contribution),
                        None => contribution,
                    });
                }
                let mut out_set = out_set.unwrap_or_else(|| node_out[&index].clone());
                if icfg.exit_of(proc) == Some(index) {
                    out_set = problem.exit_transfer(proc, out_set);
                }

                let call_edges: Vec<&IcfgEdge> = icfg
                    .graph()
                    .edges_out(index)?
                    .into_iter()
                    .filter(|edge| matches!(edge.kind(), IcfgEdgeKind::Call(_)))
                    .collect();

                let mut in_set = if call_edges.is_empty() {
                    let mut set = out_set.clone();
                    for &stmt in node.statements().iter().rev() {
                        set = problem.transfer(proc, set, stmt);
                    }
                    set
                } else {
                    let mut set: Option<P::Set> = None;
                    for edge in call_edges {
                        let call = match edge.kind() {
                            IcfgEdgeKind::Call(call) => call,
                            IcfgEdgeKind::Flow | IcfgEdgeKind::Return(_) => continue,
                        };
                        let callee = icfg.node(edge.tail())?.proc();
                        let contribution = problem.callee_to_caller(
                            callee,
                            node_in[&edge.tail()].clone(),
                            call,
                            proc,
                        );
                        set = Some(match set {
                            Some(set) => set.meet(&contribution),
                            None => contribution,
                        });
                    }
                    set.unwrap_or_else(|| out_set.clone())
                };
                if icfg.entry_of(proc) == Some(index) {
                    in_set = problem.entry_transfer(proc, in_set);
                }

                (in_set, out_set)
            }
        };

        let changed = new_in != node_in[&index] || new_out != node_out[&index];
        node_in.insert(index, new_in);
        node_out.insert(index, new_out);

        if changed {
            trace!("icfg node {} changed", index);
            let affected: Vec<usize> = match problem.direction() {
                Direction::Forward => icfg
                    .graph()
                    .edges_out(index)?
                    .into_iter()
                    .map(|edge| edge.tail())
                    .collect(),
                Direction::Backward => icfg
                    .graph()
                    .edges_in(index)?
                    .into_iter()
                    .map(|edge| edge.head())
                    .collect(),
            };
            for affected in affected {
                if !queue.contains(&affected) {
                    queue.push_back(affected);
                }
            }
        }
    }

    let iterations = visits.values().max().copied().unwrap_or(0);
    trace!("icfg fixpoint reached, iterations={}", iterations);

    Ok(DataFlowResult::new(node_in, node_out, iterations))
}
