//! Whole-program call graph.
//!
//! Nodes are procedures keyed by their defining symbol; edges are call
//! sites. Two call sites to the same callee produce two parallel edges,
//! each tagged with its own call expression. A callee whose body lies
//! outside the compilation unit gets a node but stays "undefined".

use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::graph;
use crate::ir::{ExprId, IrQuery, ProcId, SymId};
use crate::output::{Dump, Emitter};
use crate::Error;

/// The kind of a call-graph edge. All direct calls are `Normal`; the
/// variant exists so clients dispatch on edge kind rather than assuming
/// it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CallEdgeKind {
    Normal,
}

/// One procedure in the call graph.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CallGraphNode {
    index: usize,
    sym: SymId,
    proc: Option<ProcId>,
    call_sites: BTreeSet<ExprId>,
}

impl CallGraphNode {
    fn new(index: usize, sym: SymId) -> CallGraphNode {
        CallGraphNode {
            index,
            sym,
            proc: None,
            call_sites: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The symbol defining this procedure.
    pub fn sym(&self) -> SymId {
        self.sym
    }

    /// The procedure body, if it is defined in this compilation unit.
    pub fn proc(&self) -> Option<ProcId> {
        self.proc
    }

    pub fn is_defined(&self) -> bool {
        self.proc.is_some()
    }

    /// Every call-site expression referencing this procedure.
    pub fn call_sites(&self) -> &BTreeSet<ExprId> {
        &self.call_sites
    }

    fn set_proc(&mut self, proc: ProcId) {
        self.proc = Some(proc);
    }

    fn add_call_site(&mut self, call: ExprId) {
        self.call_sites.insert(call);
    }
}

impl graph::Vertex for CallGraphNode {
    fn index(&self) -> usize {
        self.index
    }
    fn dot_label(&self) -> String {
        match self.proc {
            Some(proc) => format!("{} ({})", self.sym, proc),
            None => format!("{} (undefined)", self.sym),
        }
    }
}

/// One call site: a directed edge from caller to callee.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CallGraphEdge {
    head: usize,
    tail: usize,
    kind: CallEdgeKind,
    call: ExprId,
}

impl CallGraphEdge {
    pub fn new(head: usize, tail: usize, call: ExprId) -> CallGraphEdge {
        CallGraphEdge {
            head,
            tail,
            kind: CallEdgeKind::Normal,
            call,
        }
    }

    /// The index of the caller's node.
    pub fn head(&self) -> usize {
        self.head
    }

    /// The index of the callee's node.
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn kind(&self) -> CallEdgeKind {
        self.kind
    }

    /// The call expression this edge is tagged with.
    pub fn call(&self) -> ExprId {
        self.call
    }
}

impl graph::Edge for CallGraphEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
    fn dot_label(&self) -> String {
        format!("{}", self.call)
    }
}

/// A whole-program call graph: nodes are procedures by symbol, edges are
/// call sites.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CallGraph {
    graph: graph::Graph<CallGraphNode, CallGraphEdge>,
    nodes_by_sym: BTreeMap<SymId, usize>,
    next_index: usize,
}

impl CallGraph {
    pub fn new() -> CallGraph {
        CallGraph {
            graph: graph::Graph::new(),
            nodes_by_sym: BTreeMap::new(),
            next_index: 0,
        }
    }

    /// Build the call graph for every procedure the adapter exposes, in
    /// program order.
    pub fn build(ir: &dyn IrQuery) -> Result<CallGraph, Error> {
        let mut call_graph = CallGraph::new();

        for proc in ir.procedures() {
            ir.enter_procedure(proc);

            let caller_sym = ir.proc_symbol(proc);
            let caller = call_graph.find_or_add_node(caller_sym)?;
            call_graph.graph.vertex_mut(caller)?.set_proc(proc);

            for stmt in ir.statements(proc) {
                for call in ir.call_sites(stmt) {
                    let callee_sym = match ir.callee(call) {
                        Some(sym) => sym,
                        None => {
                            trace!("unresolved callee at {}", call);
                            continue;
                        }
                    };
                    let callee = call_graph.find_or_add_node(callee_sym)?;
                    call_graph.graph.vertex_mut(callee)?.add_call_site(call);
                    call_graph
                        .graph
                        .insert_edge(CallGraphEdge::new(caller, callee, call))?;
                }
            }
        }

        Ok(call_graph)
    }

    /// Returns the node for the given symbol, creating it if necessary.
    /// A second request for the same symbol returns the same node index.
    pub fn find_or_add_node(&mut self, sym: SymId) -> Result<usize, Error> {
        if let Some(&index) = self.nodes_by_sym.get(&sym) {
            return Ok(index);
        }
        let index = self.next_index;
        self.next_index += 1;
        self.graph.insert_vertex(CallGraphNode::new(index, sym))?;
        self.nodes_by_sym.insert(sym, index);
        Ok(index)
    }

    /// Returns the underlying graph
    pub fn graph(&self) -> &graph::Graph<CallGraphNode, CallGraphEdge> {
        &self.graph
    }

    /// The node index for a symbol, or `None` if the symbol never appeared
    /// as a procedure or callee.
    pub fn node_for_sym(&self, sym: SymId) -> Option<usize> {
        self.nodes_by_sym.get(&sym).copied()
    }

    pub fn node(&self, index: usize) -> Result<&CallGraphNode, Error> {
        self.graph.vertex(index)
    }

    /// Every node, in index order.
    pub fn nodes(&self) -> Vec<&CallGraphNode> {
        self.graph.vertices()
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> &[CallGraphEdge] {
        self.graph.edges()
    }

    /// Every call edge out of the given node.
    pub fn callees_of(&self, index: usize) -> Result<Vec<&CallGraphEdge>, Error> {
        self.graph.edges_out(index)
    }

    /// Every call edge into the given node.
    pub fn callers_of(&self, index: usize) -> Result<Vec<&CallGraphEdge>, Error> {
        self.graph.edges_in(index)
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.num_vertices()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.num_edges()
    }
}

impl Dump for CallGraph {
    fn dump(&self, emitter: &mut dyn Emitter) -> Result<(), Error> {
        emitter.begin_object("call_graph")?;

        emitter.begin_list("nodes")?;
        for node in self.nodes() {
            let defined = match node.proc() {
                Some(proc) => format!("{} defined by {}", node.sym(), proc),
                None => format!("{} undefined", node.sym()),
            };
            emitter.list_item(&defined)?;
        }
        emitter.end_list()?;

        emitter.begin_list("edges")?;
        for edge in self.edges() {
            let head = self.node(edge.head())?;
            let tail = self.node(edge.tail())?;
            emitter.list_item(&format!(
                "{} -> {} at {}",
                head.sym(),
                tail.sym(),
                edge.call()
            ))?;
        }
        emitter.end_list()?;

        emitter.end_object()
    }
}
