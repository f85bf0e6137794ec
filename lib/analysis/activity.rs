//! Interprocedural activity propagation.
//!
//! Activity analysis marks the symbols whose values can influence a
//! procedure's outputs. The interprocedural propagation step this module
//! would run over the call graph is not implemented; the entry point
//! refuses with [`Error::Unimplemented`] so callers get a typed "analysis
//! aborted with cause" instead of silently wrong results.

use crate::analysis::{CallGraph, SymSet};
use crate::ir::{IrQuery, ProcId};
use crate::Error;

/// Per-procedure activity results.
#[derive(Clone, Debug, Default)]
pub struct ActivityResult {
    active: Vec<(ProcId, SymSet)>,
}

impl ActivityResult {
    /// The active symbols of a procedure, or `None` if the procedure was
    /// not analyzed.
    pub fn active_syms(&self, proc: ProcId) -> Option<&SymSet> {
        self.active
            .iter()
            .find(|&&(candidate, _)| candidate == proc)
            .map(|(_, syms)| syms)
    }
}

/// Propagate activity across the call graph.
///
/// Not implemented. Always returns [`Error::Unimplemented`].
pub fn interprocedural_activity(
    _ir: &dyn IrQuery,
    _call_graph: &CallGraph,
) -> Result<ActivityResult, Error> {
    Err(Error::Unimplemented("interprocedural activity propagation"))
}
