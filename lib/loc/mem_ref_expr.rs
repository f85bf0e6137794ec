//! Symbolic memory-reference expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::{StmtId, SymId};

/// A restriction on an access path, e.g. an array index or a field offset.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SubSetKind {
    /// A single element at a constant index.
    Index(u64),
    /// A contiguous range of elements.
    Range(u64, u64),
    /// A field at a constant byte offset.
    Field(u64),
    /// Some statically unresolvable part of the base.
    Unknown,
}

impl fmt::Display for SubSetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SubSetKind::Index(index) => write!(f, "[{}]", index),
            SubSetKind::Range(lo, hi) => write!(f, "[{}..{}]", lo, hi),
            SubSetKind::Field(offset) => write!(f, ".{}", offset),
            SubSetKind::Unknown => write!(f, "[?]"),
        }
    }
}

/// A tree describing how a symbol is dereferenced to reach a memory
/// location.
///
/// `NamedRef`, `UnnamedRef` and `UnknownRef` are the leaves; `Deref` and
/// `SubSetRef` are the unary reference operators wrapping a child
/// expression. The host IR adapter builds one `MemRefExpr` per memory
/// reference, after which the tree is immutable and shared by every
/// analysis that runs.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MemRefExpr {
    /// A direct reference to a named symbol.
    NamedRef(SymId),
    /// A reference to an unnamed, dynamically allocated object, identified
    /// by its allocation site.
    UnnamedRef(StmtId),
    /// A reference kestrel knows nothing about.
    UnknownRef,
    /// A pointer dereference of the child expression.
    Deref(Box<MemRefExpr>),
    /// A restriction of the child expression to part of the referenced
    /// object.
    SubSetRef(Box<MemRefExpr>, SubSetKind),
}

impl MemRefExpr {
    pub fn named(sym: SymId) -> MemRefExpr {
        MemRefExpr::NamedRef(sym)
    }

    pub fn unnamed(alloc_site: StmtId) -> MemRefExpr {
        MemRefExpr::UnnamedRef(alloc_site)
    }

    pub fn unknown() -> MemRefExpr {
        MemRefExpr::UnknownRef
    }

    pub fn deref(expr: MemRefExpr) -> MemRefExpr {
        MemRefExpr::Deref(Box::new(expr))
    }

    pub fn subset(expr: MemRefExpr, kind: SubSetKind) -> MemRefExpr {
        MemRefExpr::SubSetRef(Box::new(expr), kind)
    }

    /// True if this expression is a leaf, i.e. not a reference operator.
    pub fn is_leaf(&self) -> bool {
        match *self {
            MemRefExpr::NamedRef(_) | MemRefExpr::UnnamedRef(_) | MemRefExpr::UnknownRef => true,
            MemRefExpr::Deref(_) | MemRefExpr::SubSetRef(_, _) => false,
        }
    }

    /// The number of reference operators wrapping the leaf.
    pub fn depth(&self) -> usize {
        match *self {
            MemRefExpr::NamedRef(_) | MemRefExpr::UnnamedRef(_) | MemRefExpr::UnknownRef => 0,
            MemRefExpr::Deref(ref expr) => 1 + expr.depth(),
            MemRefExpr::SubSetRef(ref expr, _) => 1 + expr.depth(),
        }
    }

    /// Every named symbol mentioned anywhere in this tree, descending
    /// through the reference operators.
    pub fn base_syms(&self) -> Vec<SymId> {
        let mut syms = Vec::new();
        self.collect_base_syms(&mut syms);
        syms
    }

    fn collect_base_syms(&self, syms: &mut Vec<SymId>) {
        match *self {
            MemRefExpr::NamedRef(sym) => syms.push(sym),
            MemRefExpr::UnnamedRef(_) | MemRefExpr::UnknownRef => {}
            MemRefExpr::Deref(ref expr) => expr.collect_base_syms(syms),
            MemRefExpr::SubSetRef(ref expr, _) => expr.collect_base_syms(syms),
        }
    }

    /// Every unnamed-object allocation site mentioned in this tree.
    pub fn unnamed_sites(&self) -> Vec<StmtId> {
        match *self {
            MemRefExpr::NamedRef(_) | MemRefExpr::UnknownRef => Vec::new(),
            MemRefExpr::UnnamedRef(alloc_site) => vec![alloc_site],
            MemRefExpr::Deref(ref expr) => expr.unnamed_sites(),
            MemRefExpr::SubSetRef(ref expr, _) => expr.unnamed_sites(),
        }
    }
}

impl fmt::Display for MemRefExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemRefExpr::NamedRef(sym) => write!(f, "{}", sym),
            MemRefExpr::UnnamedRef(alloc_site) => write!(f, "alloc@{}", alloc_site),
            MemRefExpr::UnknownRef => write!(f, "?"),
            MemRefExpr::Deref(ref expr) => write!(f, "*({})", expr),
            MemRefExpr::SubSetRef(ref expr, kind) => write!(f, "({}){}", expr, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_syms_descend_through_operators() {
        // *((p)[2])
        let expr = MemRefExpr::deref(MemRefExpr::subset(
            MemRefExpr::named(SymId(7)),
            SubSetKind::Index(2),
        ));

        assert_eq!(expr.base_syms(), vec![SymId(7)]);
        assert_eq!(expr.depth(), 2);
        assert!(!expr.is_leaf());
    }

    #[test]
    fn unnamed_and_unknown_leaves_have_no_syms() {
        let expr = MemRefExpr::deref(MemRefExpr::unnamed(StmtId(3)));
        assert!(expr.base_syms().is_empty());
        assert_eq!(expr.unnamed_sites(), vec![StmtId(3)]);

        assert!(MemRefExpr::unknown().base_syms().is_empty());
        assert!(MemRefExpr::unknown().is_leaf());
    }
}
