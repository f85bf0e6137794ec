//! Implementations and traits for data-flow analysis.

pub mod activity;
pub mod alias_sets;
pub mod call_graph;
mod data_flow;
pub mod fixed_point;
pub mod interprocedural;
mod sym_set;
mod union_find;

pub use self::alias_sets::{alias_sets_bottom, alias_sets_top, AliasSetId, SymAliasSets};
pub use self::call_graph::{CallEdgeKind, CallGraph, CallGraphEdge, CallGraphNode};
pub use self::data_flow::{CfgDataFlowProblem, DataFlowResult, DataFlowSet, Direction};
pub use self::fixed_point::{solve_cfg, NodeState};
pub use self::interprocedural::{
    solve_call_graph, solve_icfg, Icfg, IcfgEdge, IcfgEdgeKind, IcfgNode, InterproceduralProblem,
};
pub use self::sym_set::SymSet;
pub use self::union_find::UnionFind;
