//! Abstract memory locations.
//!
//! A [`Location`] stands for one memory object the way an analysis sees it:
//! a named variable, an unnamed heap allocation, an object only reachable
//! through pointer indirection from a parameter, a statically known part of
//! another location, or the conservative top element that may overlap
//! anything.
//!
//! Locations are produced by the host IR adapter, which also supplies the
//! statically known overlap sets for named locations. Once built they are
//! immutable; `SubSet` locations share their base through [`crate::RC`], so
//! no consumer can mutate a shared base.
//!
//! Overlap comes in two strengths. `may_overlap` is symmetric and answers
//! "could these two locations share any memory"; `must_overlap` is
//! reflexive and answers "do these two locations certainly share all their
//! memory". `Unknown` is the unique top of the may-overlap partial order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::{StmtId, SymId};
use crate::RC;

mod mem_ref_expr;

pub use self::mem_ref_expr::{MemRefExpr, SubSetKind};

static NO_SYMS: [SymId; 0] = [];

/// A named program variable and its statically declared overlaps.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NamedLoc {
    sym: SymId,
    local: bool,
    full_overlaps: Vec<SymId>,
    part_overlaps: Vec<SymId>,
}

impl NamedLoc {
    pub fn new(sym: SymId, local: bool) -> NamedLoc {
        NamedLoc {
            sym,
            local,
            full_overlaps: Vec::new(),
            part_overlaps: Vec::new(),
        }
    }

    pub fn sym(&self) -> SymId {
        self.sym
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Declare a symbol that fully overlaps this one, e.g. the other half
    /// of an EQUIVALENCE or a union member covering the whole object.
    pub fn add_full_overlap(&mut self, sym: SymId) {
        if !self.full_overlaps.contains(&sym) {
            self.full_overlaps.push(sym);
        }
    }

    /// Declare a symbol that partially overlaps this one.
    pub fn add_part_overlap(&mut self, sym: SymId) {
        if !self.part_overlaps.contains(&sym) {
            self.part_overlaps.push(sym);
        }
    }

    pub fn full_overlap_iter(&self) -> std::slice::Iter<'_, SymId> {
        self.full_overlaps.iter()
    }

    pub fn part_overlap_iter(&self) -> std::slice::Iter<'_, SymId> {
        self.part_overlaps.iter()
    }

    fn full_overlaps(&self) -> &[SymId] {
        &self.full_overlaps
    }

    fn part_overlaps(&self) -> &[SymId] {
        &self.part_overlaps
    }
}

/// A dynamically allocated, unnamed object, identified by allocation site.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UnnamedLoc {
    alloc_site: StmtId,
    local: bool,
}

impl UnnamedLoc {
    pub fn new(alloc_site: StmtId, local: bool) -> UnnamedLoc {
        UnnamedLoc { alloc_site, local }
    }

    pub fn alloc_site(&self) -> StmtId {
        self.alloc_site
    }

    pub fn is_local(&self) -> bool {
        self.local
    }
}

/// An object reachable only through pointer indirection from a parameter,
/// not otherwise nameable in the procedure.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InvisibleLoc {
    path: MemRefExpr,
}

impl InvisibleLoc {
    pub fn new(path: MemRefExpr) -> InvisibleLoc {
        InvisibleLoc { path }
    }

    pub fn path(&self) -> &MemRefExpr {
        &self.path
    }
}

/// A restriction of a base location to part of the referenced object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SubSetLoc {
    base: RC<Location>,
    kind: SubSetKind,
}

impl SubSetLoc {
    pub fn new(base: Location, kind: SubSetKind) -> SubSetLoc {
        SubSetLoc {
            base: RC::new(base),
            kind,
        }
    }

    pub fn from_shared(base: RC<Location>, kind: SubSetKind) -> SubSetLoc {
        SubSetLoc { base, kind }
    }

    pub fn base(&self) -> &Location {
        &self.base
    }

    pub fn kind(&self) -> SubSetKind {
        self.kind
    }
}

/// An abstract memory location.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Location {
    Named(NamedLoc),
    Unnamed(UnnamedLoc),
    Unknown,
    Invisible(InvisibleLoc),
    SubSet(SubSetLoc),
}

impl Location {
    /// True if this location is visible only in its owning procedure.
    pub fn is_local(&self) -> bool {
        match *self {
            Location::Named(ref named) => named.is_local(),
            Location::Unnamed(ref unnamed) => unnamed.is_local(),
            Location::Unknown => false,
            Location::Invisible(_) => false,
            Location::SubSet(ref subset) => subset.base().is_local(),
        }
    }

    /// The underlying location, with any `SubSet` restrictions stripped.
    pub fn base_loc(&self) -> &Location {
        match *self {
            Location::Named(_)
            | Location::Unnamed(_)
            | Location::Unknown
            | Location::Invisible(_) => self,
            Location::SubSet(ref subset) => subset.base().base_loc(),
        }
    }

    pub fn as_named(&self) -> Option<&NamedLoc> {
        match *self {
            Location::Named(ref named) => Some(named),
            Location::Unnamed(_)
            | Location::Unknown
            | Location::Invisible(_)
            | Location::SubSet(_) => None,
        }
    }

    /// Symbols statically known to fully overlap this location. Empty for
    /// everything but `Named`.
    pub fn full_overlap_iter(&self) -> std::slice::Iter<'_, SymId> {
        match *self {
            Location::Named(ref named) => named.full_overlap_iter(),
            Location::Unnamed(_)
            | Location::Unknown
            | Location::Invisible(_)
            | Location::SubSet(_) => NO_SYMS.iter(),
        }
    }

    /// Symbols statically known to partially overlap this location. Empty
    /// for everything but `Named`.
    pub fn part_overlap_iter(&self) -> std::slice::Iter<'_, SymId> {
        match *self {
            Location::Named(ref named) => named.part_overlap_iter(),
            Location::Unnamed(_)
            | Location::Unknown
            | Location::Invisible(_)
            | Location::SubSet(_) => NO_SYMS.iter(),
        }
    }

    /// True if the two locations could share any memory. Symmetric;
    /// `Unknown` may-overlaps everything.
    pub fn may_overlap(&self, other: &Location) -> bool {
        match (self, other) {
            (Location::SubSet(a), _) => a.base().may_overlap(other),
            (_, Location::SubSet(b)) => self.may_overlap(b.base()),

            (Location::Unknown, _) | (_, Location::Unknown) => true,

            (Location::Named(a), Location::Named(b)) => {
                a.sym() == b.sym()
                    || a.part_overlaps().contains(&b.sym())
                    || a.full_overlaps().contains(&b.sym())
                    || b.part_overlaps().contains(&a.sym())
                    || b.full_overlaps().contains(&a.sym())
            }
            (Location::Named(named), Location::Invisible(invisible))
            | (Location::Invisible(invisible), Location::Named(named)) => {
                invisible.path().base_syms().contains(&named.sym())
            }
            (Location::Named(_), Location::Unnamed(_))
            | (Location::Unnamed(_), Location::Named(_)) => false,

            (Location::Unnamed(a), Location::Unnamed(b)) => a.alloc_site() == b.alloc_site(),
            (Location::Unnamed(unnamed), Location::Invisible(invisible))
            | (Location::Invisible(invisible), Location::Unnamed(unnamed)) => invisible
                .path()
                .unnamed_sites()
                .contains(&unnamed.alloc_site()),

            (Location::Invisible(a), Location::Invisible(b)) => {
                a.path() == b.path()
                    || a.path()
                        .base_syms()
                        .iter()
                        .any(|sym| b.path().base_syms().contains(sym))
            }
        }
    }

    /// True if the two locations certainly share all their memory.
    /// Reflexive; `Unknown` must-overlaps only itself, since it carries no
    /// guarantee about anything else.
    pub fn must_overlap(&self, other: &Location) -> bool {
        match (self, other) {
            (Location::SubSet(a), Location::SubSet(b)) => {
                a.kind() == b.kind() && a.base().must_overlap(b.base())
            }
            (Location::SubSet(a), _) => a.base().must_overlap(other),
            (_, Location::SubSet(b)) => self.must_overlap(b.base()),

            (Location::Unknown, Location::Unknown) => true,
            (Location::Unknown, Location::Named(_))
            | (Location::Unknown, Location::Unnamed(_))
            | (Location::Unknown, Location::Invisible(_))
            | (Location::Named(_), Location::Unknown)
            | (Location::Unnamed(_), Location::Unknown)
            | (Location::Invisible(_), Location::Unknown) => false,

            (Location::Named(a), Location::Named(b)) => {
                a.sym() == b.sym()
                    || a.full_overlaps().contains(&b.sym())
                    || b.full_overlaps().contains(&a.sym())
            }
            (Location::Unnamed(a), Location::Unnamed(b)) => a.alloc_site() == b.alloc_site(),
            (Location::Invisible(a), Location::Invisible(b)) => a.path() == b.path(),

            (Location::Named(_), Location::Unnamed(_))
            | (Location::Named(_), Location::Invisible(_))
            | (Location::Unnamed(_), Location::Named(_))
            | (Location::Unnamed(_), Location::Invisible(_))
            | (Location::Invisible(_), Location::Named(_))
            | (Location::Invisible(_), Location::Unnamed(_)) => false,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Location::Named(ref named) => write!(f, "{}", named.sym()),
            Location::Unnamed(ref unnamed) => write!(f, "alloc@{}", unnamed.alloc_site()),
            Location::Unknown => write!(f, "unknown"),
            Location::Invisible(ref invisible) => write!(f, "invisible({})", invisible.path()),
            Location::SubSet(ref subset) => write!(f, "{}{}", subset.base(), subset.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(sym: usize, local: bool) -> Location {
        Location::Named(NamedLoc::new(SymId(sym), local))
    }

    #[test]
    fn unknown_is_the_top_of_may_overlap() {
        let locations = [
            named(0, true),
            Location::Unnamed(UnnamedLoc::new(StmtId(4), false)),
            Location::Invisible(InvisibleLoc::new(MemRefExpr::deref(MemRefExpr::named(
                SymId(1),
            )))),
            Location::Unknown,
        ];

        for location in &locations {
            assert!(Location::Unknown.may_overlap(location));
            assert!(location.may_overlap(&Location::Unknown));
        }

        // everything else sits strictly below the top
        assert!(!locations[0].may_overlap(&locations[1]));
    }

    #[test]
    fn may_overlap_is_symmetric_over_declared_sets() {
        let mut a = NamedLoc::new(SymId(0), false);
        a.add_part_overlap(SymId(1));
        let a = Location::Named(a);
        let b = named(1, false);

        assert!(a.may_overlap(&b));
        assert!(b.may_overlap(&a));

        let c = named(2, false);
        assert!(!a.may_overlap(&c));
        assert!(!c.may_overlap(&a));
    }

    #[test]
    fn must_overlap_is_reflexive() {
        let mut p = NamedLoc::new(SymId(1), false);
        p.add_full_overlap(SymId(0));
        let locations = [
            named(0, true),
            Location::Named(p),
            Location::Unnamed(UnnamedLoc::new(StmtId(2), true)),
            Location::Unknown,
        ];

        for location in &locations {
            assert!(location.must_overlap(location));
        }

        // declared full overlap, in either direction
        assert!(locations[1].must_overlap(&named(0, true)));
        assert!(named(0, true).must_overlap(&locations[1]));

        // may without must
        assert!(!Location::Unknown.must_overlap(&locations[0]));
        assert!(Location::Unknown.may_overlap(&locations[0]));
    }

    #[test]
    fn subset_forwards_to_its_base() {
        let base = named(3, true);
        let subset = Location::SubSet(SubSetLoc::new(base.clone(), SubSetKind::Index(2)));

        assert_eq!(subset.base_loc(), &base);
        assert!(subset.is_local());
        assert!(subset.may_overlap(&base));
        assert!(subset.must_overlap(&subset.clone()));

        // distinct restrictions of the same base may, but need not, be the
        // same memory
        let other = Location::SubSet(SubSetLoc::new(base, SubSetKind::Index(4)));
        assert!(subset.may_overlap(&other));
        assert!(!subset.must_overlap(&other));
    }

    #[test]
    fn invisible_overlaps_its_base_symbol() {
        let invisible = Location::Invisible(InvisibleLoc::new(MemRefExpr::deref(
            MemRefExpr::named(SymId(5)),
        )));

        assert!(invisible.may_overlap(&named(5, false)));
        assert!(named(5, false).may_overlap(&invisible));
        assert!(!invisible.may_overlap(&named(6, false)));
        assert!(!invisible.must_overlap(&named(5, false)));
    }
}
