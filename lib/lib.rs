//! Kestrel is a generic data-flow analysis framework.
//!
//! Kestrel computes program facts (reaching definitions, liveness, aliasing,
//! side effects) by iterating analysis-supplied transfer functions to a
//! fixpoint over control-flow and call graphs. It owns no intermediate
//! representation of its own: an embedding compiler exposes statements,
//! symbols, memory references and call sites through the [`ir::IrQuery`]
//! adapter contract, and kestrel supplies everything downstream of that
//! boundary.
//!
//! The major pieces:
//!
//! * [`loc`]: abstract memory locations ([`loc::Location`]) and symbolic
//!   dereference chains ([`loc::MemRefExpr`]) that transfer functions reason
//!   about.
//! * [`graph`]: the directed graph every solver walks.
//! * [`cfg`]: per-procedure control-flow graphs over [`graph::Graph`].
//! * [`analysis`]: the lattice contract, the intraprocedural and
//!   interprocedural fixpoint solvers, the call-graph builder, and symbol
//!   alias-set construction.
//! * [`output`]: the hierarchical emitter protocol results dump through.
//!
//! Analyses run in dependency order enforced by the caller: CFGs before
//! alias sets, alias sets before flow-sensitive clients, the call graph
//! before any interprocedural propagation.

pub mod analysis;
pub mod cfg;
pub mod graph;
pub mod ir;
pub mod loc;
pub mod output;
#[cfg(test)]
pub(crate) mod tests;

/// Kestrel's error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Vertex with index {0} does not exist in graph")]
    GraphVertexNotFound(usize),
    #[error("Vertex with index {0} already exists in graph")]
    GraphVertexExists(usize),
    #[error("Control-flow graph has no entry")]
    CfgNoEntry,
    #[error("Control-flow graph has no exit")]
    CfgNoExit,
    #[error("No formal bound for actual {actual} at call {call} from {caller} into {callee}")]
    UnboundActual {
        caller: ir::ProcId,
        call: ir::ExprId,
        callee: ir::ProcId,
        actual: ir::ExprId,
    },
    #[error("Emitter protocol violation: {0}")]
    EmitterProtocol(&'static str),
    #[error("Analysis is not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("{0}")]
    Custom(String),
}

impl From<&str> for Error {
    fn from(error: &str) -> Error {
        Error::Custom(error.to_string())
    }
}

impl From<String> for Error {
    fn from(error: String) -> Error {
        Error::Custom(error)
    }
}

/// A type alias for the reference-counting pointer kestrel uses internally.
///
/// `Location` and `MemRefExpr` values are constructed once by the host IR
/// adapter and shared read-only for the rest of the analysis session. With
/// the `thread_safe` feature those shared values become `Send + Sync`
/// capable.
#[cfg(feature = "thread_safe")]
pub type RC<T> = std::sync::Arc<T>;

/// A type alias for the reference-counting pointer kestrel uses internally.
///
/// `Location` and `MemRefExpr` values are constructed once by the host IR
/// adapter and shared read-only for the rest of the analysis session. With
/// the `thread_safe` feature those shared values become `Send + Sync`
/// capable.
#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = std::rc::Rc<T>;
