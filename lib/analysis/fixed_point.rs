//! Generic worklist fixpoint solver over one procedure's CFG.
//!
//! The solver seeds every node's IN/OUT from the problem's initializers,
//! then repeatedly pops a node, meets the boundary sets of its
//! direction-relevant predecessors, pushes the result through `transfer`
//! statement by statement, and re-enqueues the affected neighbors whenever
//! the node's stored boundary set changed. Termination follows from finite
//! lattice height and monotone meet.

use log::trace;
use std::collections::{BTreeMap, VecDeque};

use crate::analysis::{CfgDataFlowProblem, DataFlowResult, DataFlowSet, Direction};
use crate::cfg::Cfg;
use crate::ir::{IrQuery, ProcId};
use crate::Error;

/// The solver's view of one node.
///
/// Every node starts `Uninitialized`, becomes `Stable` once processed, and
/// re-enters `Unstable` whenever the relevant boundary set of one of its
/// predecessors changes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    Uninitialized,
    Stable,
    Unstable,
}

/// Iterate the given problem over one procedure's CFG to a fixpoint.
pub fn solve_cfg<P: CfgDataFlowProblem>(
    problem: &P,
    proc: ProcId,
    cfg: &Cfg,
    ir: &dyn IrQuery,
) -> Result<DataFlowResult<P::Set>, Error> {
    ir.enter_procedure(proc);
    let entry = cfg.entry_required()?;
    let exit = cfg.exit_required()?;

    let mut node_in: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut node_out: BTreeMap<usize, P::Set> = BTreeMap::new();
    let mut node_state: BTreeMap<usize, NodeState> = BTreeMap::new();
    let mut visits: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for node in cfg.nodes() {
        node_in.insert(node.index(), problem.initial_in(node));
        node_out.insert(node.index(), problem.initial_out(node));
        node_state.insert(node.index(), NodeState::Uninitialized);
        visits.insert(node.index(), 0);
    }
    // seed in the solve direction so a pass over an acyclic graph already
    // converges
    match problem.direction() {
        Direction::Forward => queue.extend(node_in.keys().cloned()),
        Direction::Backward => queue.extend(node_in.keys().rev().cloned()),
    }

    while let Some(index) = queue.pop_front() {
        *visits.get_mut(&index).unwrap() += 1;
        let node = cfg.node(index)?;

        match problem.direction() {
            Direction::Forward => {
                let mut in_set: Option<P::Set> = None;
                for pred in cfg.predecessor_indices(index)? {
                    in_set = Some(match in_set {
                        Some(set) => set.meet(&node_out[&pred]),
                        None => node_out[&pred].clone(),
                    });
                }
                let mut in_set = in_set.unwrap_or_else(|| node_in[&index].clone());
                if index == entry {
                    in_set = problem.entry_transfer(proc, in_set);
                }

                let mut out_set = in_set.clone();
                for &stmt in node.statements() {
                    out_set = problem.transfer(proc, out_set, stmt);
                }

                node_in.insert(index, in_set);
                node_state.insert(index, NodeState::Stable);

                if out_set != node_out[&index] {
                    trace!("node {} out set changed", index);
                    node_out.insert(index, out_set);
                    for succ in cfg.successor_indices(index)? {
                        node_state.insert(succ, NodeState::Unstable);
                        if !queue.contains(&succ) {
                            queue.push_back(succ);
                        }
                    }
                }
            }
            Direction::Backward => {
                let mut out_set: Option<P::Set> = None;
                for succ in cfg.successor_indices(index)? {
                    out_set = Some(match out_set {
                        Some(set) => set.meet(&node_in[&succ]),
                        None => node_in[&succ].clone(),
                    });
                }
                let mut out_set = out_set.unwrap_or_else(|| node_out[&index].clone());
                if index == exit {
                    out_set = problem.exit_transfer(proc, out_set);
                }

                let mut in_set = out_set.clone();
                for &stmt in node.statements().iter().rev() {
                    in_set = problem.transfer(proc, in_set, stmt);
                }

                node_out.insert(index, out_set);
                node_state.insert(index, NodeState::Stable);

                if in_set != node_in[&index] {
                    trace!("node {} in set changed", index);
                    node_in.insert(index, in_set);
                    for pred in cfg.predecessor_indices(index)? {
                        node_state.insert(pred, NodeState::Unstable);
                        if !queue.contains(&pred) {
                            queue.push_back(pred);
                        }
                    }
                }
            }
        }
    }

    debug_assert!(node_state.values().all(|&state| state == NodeState::Stable));

    let iterations = visits.values().max().copied().unwrap_or(0);
    trace!("fixpoint reached, iterations={}", iterations);

    Ok(DataFlowResult::new(node_in, node_out, iterations))
}
