//! A set of symbols, used as a data-flow value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::analysis::DataFlowSet;
use crate::ir::SymId;

/// A set of symbols forming a may-lattice: `meet` is set union, so values
/// only ever move toward the conservative answer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SymSet {
    syms: BTreeSet<SymId>,
}

impl SymSet {
    pub fn new() -> SymSet {
        SymSet {
            syms: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, sym: SymId) {
        self.syms.insert(sym);
    }

    pub fn remove(&mut self, sym: SymId) {
        self.syms.remove(&sym);
    }

    pub fn contains(&self, sym: SymId) -> bool {
        self.syms.contains(&sym)
    }

    pub fn len(&self) -> usize {
        self.syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    pub fn syms(&self) -> &BTreeSet<SymId> {
        &self.syms
    }

    /// True if every symbol in `self` is also in `other`.
    pub fn is_subset(&self, other: &SymSet) -> bool {
        self.syms.is_subset(&other.syms)
    }
}

impl FromIterator<SymId> for SymSet {
    fn from_iter<I: IntoIterator<Item = SymId>>(iter: I) -> SymSet {
        SymSet {
            syms: iter.into_iter().collect(),
        }
    }
}

impl DataFlowSet for SymSet {
    fn meet(&self, other: &SymSet) -> SymSet {
        SymSet {
            syms: self.syms.union(&other.syms).cloned().collect(),
        }
    }
}

impl fmt::Display for SymSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let syms = self
            .syms
            .iter()
            .map(|sym| sym.to_string())
            .collect::<Vec<String>>();
        write!(f, "{{{}}}", syms.join(", "))
    }
}
