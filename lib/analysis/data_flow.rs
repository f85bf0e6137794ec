//! The lattice contract every data-flow analysis supplies.
//!
//! An analysis ("problem") is a value implementing [`CfgDataFlowProblem`]:
//! the carried lattice type plus the seven callbacks the generic solver
//! drives. The solver is otherwise analysis-agnostic. The problem declares
//! its concrete [`DataFlowSet`] as an associated type, so `meet` and
//! equality across mismatched concrete set types cannot be written at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::cfg::CfgNode;
use crate::ir::{ProcId, StmtId};
use crate::output::Emitter;
use crate::Error;

/// A data-flow value: one element of an analysis's lattice.
///
/// `meet` must be commutative, associative, idempotent and monotonic; it
/// never increases information content. Every concrete lattice must have
/// finite height, or the solver will not terminate.
pub trait DataFlowSet: Clone + Debug + PartialEq {
    /// The conservative combination of two values.
    fn meet(&self, other: &Self) -> Self;
}

/// The direction a problem's facts flow through the graph.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    Forward,
    Backward,
}

/// The extension surface of an intraprocedural analysis.
///
/// `top` seeds every node with the least-informative value; the node
/// initializers may override the seed per node. `transfer` maps the set
/// flowing into one statement to the set flowing out of it (in the solve
/// direction). `entry_transfer` adjusts the set entering the procedure
/// (Forward) and `exit_transfer` the set leaving it backwards (Backward);
/// both default to the identity.
pub trait CfgDataFlowProblem {
    type Set: DataFlowSet;

    fn direction(&self) -> Direction;

    /// The least-informative lattice value.
    fn top(&self) -> Self::Set;

    /// The initial IN set for a node.
    fn initial_in(&self, _node: &CfgNode) -> Self::Set {
        self.top()
    }

    /// The initial OUT set for a node.
    fn initial_out(&self, _node: &CfgNode) -> Self::Set {
        self.top()
    }

    /// Map the set flowing into `stmt` to the set flowing out of it.
    fn transfer(&self, proc: ProcId, set: Self::Set, stmt: StmtId) -> Self::Set;

    /// Adjust the set entering the procedure at its entry node.
    fn entry_transfer(&self, _proc: ProcId, set: Self::Set) -> Self::Set {
        set
    }

    /// Adjust the set leaving the procedure at its exit node.
    fn exit_transfer(&self, _proc: ProcId, set: Self::Set) -> Self::Set {
        set
    }
}

/// The result of one solve: an IN and OUT set per graph node, plus
/// iteration diagnostics. Owned by the caller; the solver's working state
/// is gone by the time this exists.
#[derive(Clone, Debug)]
pub struct DataFlowResult<S: DataFlowSet> {
    node_in: BTreeMap<usize, S>,
    node_out: BTreeMap<usize, S>,
    iterations: usize,
}

impl<S: DataFlowSet> DataFlowResult<S> {
    pub(crate) fn new(
        node_in: BTreeMap<usize, S>,
        node_out: BTreeMap<usize, S>,
        iterations: usize,
    ) -> DataFlowResult<S> {
        DataFlowResult {
            node_in,
            node_out,
            iterations,
        }
    }

    /// The set flowing into the node, or `None` for an unknown index.
    pub fn node_in(&self, index: usize) -> Option<&S> {
        self.node_in.get(&index)
    }

    /// The set flowing out of the node, or `None` for an unknown index.
    pub fn node_out(&self, index: usize) -> Option<&S> {
        self.node_out.get(&index)
    }

    /// The maximum number of times any single node was processed before
    /// the fixpoint was reached. An acyclic graph converges at 1.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Serialize the per-node sets through the emitter, rendering each set
    /// with the given formatter.
    pub fn dump_with(
        &self,
        emitter: &mut dyn Emitter,
        format: &dyn Fn(&S) -> String,
    ) -> Result<(), Error> {
        emitter.begin_object("data_flow_result")?;
        emitter.begin_map("node_in")?;
        for (index, set) in &self.node_in {
            emitter.map_entry(&index.to_string(), &format(set))?;
        }
        emitter.end_map()?;
        emitter.begin_map("node_out")?;
        for (index, set) in &self.node_out {
            emitter.map_entry(&index.to_string(), &format(set))?;
        }
        emitter.end_map()?;
        emitter.map_entry("iterations", &self.iterations.to_string())?;
        emitter.end_object()
    }
}
