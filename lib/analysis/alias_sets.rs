//! Symbol alias-set construction.
//!
//! Partitions a procedure's accessible symbols into alias equivalence
//! classes. The bottom (conservative) builder assumes any symbol reachable
//! from outside the procedure (a global or a pass-by-reference parameter)
//! may alias any other such symbol, since no interprocedural points-to
//! information is computed at this tier. The top (optimistic) builder is
//! the identity mapping and serves as a best-case seed.

use log::trace;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::analysis::UnionFind;
use crate::ir::{IrQuery, MemRefId, ProcId, SymId};
use crate::output::{Dump, Emitter};
use crate::Error;

/// An opaque identifier for one alias equivalence class.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AliasSetId(pub usize);

/// A union-find universe over a procedure's symbols.
///
/// Mutated only through [`merge_syms`](SymAliasSets::merge_syms); queried
/// through [`find`](SymAliasSets::find), which is idempotent.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SymAliasSets {
    universe: Vec<SymId>,
    elements: FxHashMap<SymId, usize>,
    sets: UnionFind,
}

impl SymAliasSets {
    /// Creates singleton classes for every given symbol.
    pub fn new(universe: Vec<SymId>) -> SymAliasSets {
        let elements = universe
            .iter()
            .enumerate()
            .map(|(element, &sym)| (sym, element))
            .collect();
        let sets = UnionFind::new(universe.len());
        SymAliasSets {
            universe,
            elements,
            sets,
        }
    }

    /// Merges the classes of two symbols. Symbols outside the universe are
    /// ignored.
    pub fn merge_syms(&mut self, a: SymId, b: SymId) {
        match (self.elements.get(&a), self.elements.get(&b)) {
            (Some(&element_a), Some(&element_b)) => {
                self.sets.union(element_a, element_b);
            }
            _ => trace!("merge_syms outside universe: {} {}", a, b),
        }
    }

    /// The alias class of a symbol, or `None` for a symbol outside the
    /// universe.
    pub fn find(&self, sym: SymId) -> Option<AliasSetId> {
        self.elements
            .get(&sym)
            .map(|&element| AliasSetId(self.sets.find(element)))
    }

    /// The alias class of a memory reference's first base symbol found in
    /// the universe, or `None` when the reference names no known symbol.
    pub fn find_mem_ref(&self, ir: &dyn IrQuery, mem_ref: MemRefId) -> Option<AliasSetId> {
        for expr in ir.mem_ref_exprs(mem_ref) {
            for sym in expr.base_syms() {
                if let Some(class) = self.find(sym) {
                    return Some(class);
                }
            }
        }
        None
    }

    /// True if both symbols are known and share one alias class.
    pub fn same_class(&self, a: SymId, b: SymId) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(class_a), Some(class_b)) => class_a == class_b,
            (Some(_), None) | (None, Some(_)) | (None, None) => false,
        }
    }

    /// The symbols in the universe, in element order.
    pub fn syms(&self) -> &[SymId] {
        &self.universe
    }

    pub fn num_classes(&self) -> usize {
        self.sets.num_sets()
    }

    /// The alias classes as symbol groups, ordered by representative.
    pub fn classes(&self) -> Vec<Vec<SymId>> {
        let mut grouped: FxHashMap<usize, Vec<SymId>> = FxHashMap::default();
        for (element, &sym) in self.universe.iter().enumerate() {
            grouped.entry(self.sets.find(element)).or_default().push(sym);
        }
        let mut classes: Vec<(usize, Vec<SymId>)> = grouped.into_iter().collect();
        classes.sort_by_key(|&(representative, _)| representative);
        classes.into_iter().map(|(_, syms)| syms).collect()
    }
}

impl Dump for SymAliasSets {
    fn dump(&self, emitter: &mut dyn Emitter) -> Result<(), Error> {
        emitter.begin_object("alias_sets")?;
        emitter.begin_list("classes")?;
        for class in self.classes() {
            let syms = class
                .iter()
                .map(|sym| sym.to_string())
                .collect::<Vec<String>>();
            emitter.list_item(&syms.join(", "))?;
        }
        emitter.end_list()?;
        emitter.end_object()
    }
}

/// Build the conservative ("bottom") alias sets for one procedure.
///
/// Every symbol mentioned in a memory-reference-expression tree that is
/// either a pass-by-reference parameter or has a non-local location is
/// merged into one running class, together with its statically declared
/// full- and part-overlap symbols. Purely local symbols remain singleton
/// classes.
pub fn alias_sets_bottom(ir: &dyn IrQuery, proc: ProcId) -> Result<SymAliasSets, Error> {
    ir.enter_procedure(proc);

    let mut sets = SymAliasSets::new(ir.accessible_symbols(proc));

    let mut mentioned: BTreeSet<SymId> = BTreeSet::new();
    for stmt in ir.statements(proc) {
        for mem_ref in ir.mem_refs(stmt) {
            for expr in ir.mem_ref_exprs(mem_ref) {
                mentioned.extend(expr.base_syms());
            }
        }
    }

    let mut class_rep: Option<SymId> = None;
    for sym in mentioned {
        let location = ir.location(proc, sym);
        if !ir.is_ref_param(proc, sym) && location.is_local() {
            continue;
        }

        match class_rep {
            Some(rep) => sets.merge_syms(rep, sym),
            None => class_rep = Some(sym),
        }
        for &overlap in location.full_overlap_iter() {
            sets.merge_syms(sym, overlap);
        }
        for &overlap in location.part_overlap_iter() {
            sets.merge_syms(sym, overlap);
        }
    }

    trace!(
        "alias_sets_bottom: {} classes over {} symbols in {}",
        sets.num_classes(),
        sets.syms().len(),
        proc
    );

    Ok(sets)
}

/// Build the optimistic ("top") alias sets for one procedure: every symbol
/// is its own singleton class.
pub fn alias_sets_top(ir: &dyn IrQuery, proc: ProcId) -> Result<SymAliasSets, Error> {
    ir.enter_procedure(proc);
    Ok(SymAliasSets::new(ir.accessible_symbols(proc)))
}
