//! Per-procedure control-flow graphs.
//!
//! A [`Cfg`] is a directed [`graph::Graph`] of [`CfgNode`]s, each holding
//! an ordered run of statement handles. The host (or a test fixture)
//! constructs the graph; kestrel only walks it. Solvers require both an
//! entry and an exit node to be set.

use serde::{Deserialize, Serialize};

use crate::graph;
use crate::ir::StmtId;
use crate::Error;

/// A node of a control-flow graph: an ordered run of statements.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CfgNode {
    index: usize,
    statements: Vec<StmtId>,
}

impl CfgNode {
    fn new(index: usize) -> CfgNode {
        CfgNode {
            index,
            statements: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn statements(&self) -> &[StmtId] {
        &self.statements
    }

    /// Append a statement to this node.
    pub fn push_statement(&mut self, stmt: StmtId) {
        self.statements.push(stmt);
    }
}

impl graph::Vertex for CfgNode {
    fn index(&self) -> usize {
        self.index
    }
    fn dot_label(&self) -> String {
        let statements = self
            .statements
            .iter()
            .map(|stmt| stmt.to_string())
            .collect::<Vec<String>>();
        format!("[{}] {}", self.index, statements.join("\n"))
    }
}

/// An edge between two control-flow nodes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CfgEdge {
    head: usize,
    tail: usize,
}

impl CfgEdge {
    pub fn new(head: usize, tail: usize) -> CfgEdge {
        CfgEdge { head, tail }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }
}

impl graph::Edge for CfgEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
    fn dot_label(&self) -> String {
        format!("{} -> {}", self.head, self.tail)
    }
}

/// A control-flow graph of one procedure's statements.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Cfg {
    graph: graph::Graph<CfgNode, CfgEdge>,
    next_index: usize,
    entry: Option<usize>,
    exit: Option<usize>,
}

impl Cfg {
    pub fn new() -> Cfg {
        Cfg {
            graph: graph::Graph::new(),
            next_index: 0,
            entry: None,
            exit: None,
        }
    }

    /// Returns the underlying graph
    pub fn graph(&self) -> &graph::Graph<CfgNode, CfgEdge> {
        &self.graph
    }

    /// Allocates a new, empty node in this graph and returns a mutable
    /// reference to it.
    pub fn new_node(&mut self) -> Result<&mut CfgNode, Error> {
        let index = self.next_index;
        self.next_index += 1;
        self.graph.insert_vertex(CfgNode::new(index))?;
        self.graph.vertex_mut(index)
    }

    /// Adds an edge between two existing nodes.
    pub fn add_edge(&mut self, head: usize, tail: usize) -> Result<(), Error> {
        self.graph.insert_edge(CfgEdge::new(head, tail))
    }

    /// Sets the entry point for this `Cfg` to the given node index.
    pub fn set_entry(&mut self, entry: usize) -> Result<(), Error> {
        if self.graph.has_vertex(entry) {
            self.entry = Some(entry);
            return Ok(());
        }
        Err(Error::GraphVertexNotFound(entry))
    }

    /// Sets the exit point for this `Cfg` to the given node index.
    pub fn set_exit(&mut self, exit: usize) -> Result<(), Error> {
        if self.graph.has_vertex(exit) {
            self.exit = Some(exit);
            return Ok(());
        }
        Err(Error::GraphVertexNotFound(exit))
    }

    pub fn entry(&self) -> Option<usize> {
        self.entry
    }

    pub fn exit(&self) -> Option<usize> {
        self.exit
    }

    /// The entry index, or an error if none was ever set.
    pub fn entry_required(&self) -> Result<usize, Error> {
        self.entry.ok_or(Error::CfgNoEntry)
    }

    /// The exit index, or an error if none was ever set.
    pub fn exit_required(&self) -> Result<usize, Error> {
        self.exit.ok_or(Error::CfgNoExit)
    }

    /// Get a node by index.
    pub fn node(&self, index: usize) -> Result<&CfgNode, Error> {
        self.graph.vertex(index)
    }

    /// Get a mutable reference to a node by index.
    pub fn node_mut(&mut self, index: usize) -> Result<&mut CfgNode, Error> {
        self.graph.vertex_mut(index)
    }

    /// Get every node in this graph, in index order.
    pub fn nodes(&self) -> Vec<&CfgNode> {
        self.graph.vertices()
    }

    pub fn successor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.graph.successor_indices(index)
    }

    pub fn predecessor_indices(&self, index: usize) -> Result<Vec<usize>, Error> {
        self.graph.predecessor_indices(index)
    }
}
