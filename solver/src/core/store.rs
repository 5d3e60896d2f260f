//! The backtrackable store of local variable domains.
//!
//! The store keeps the current (node-local) bounds and holes of every
//! variable. Each modification is recorded with its previous value on the
//! trail; one save point is pushed per applied tree node, so undoing a node is
//! a single `restore_last`.

use crate::backtrack::{Backtrack, Trail};
use crate::core::domain::{Domain, Hole};
use crate::core::{num, Real, VarId};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BoundKind {
    Lower,
    Upper,
}

/// A bound literal: `var >= val` (lower) or `var <= val` (upper).
///
/// Used to communicate propagation reasons and learned no-goods.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BoundLit {
    pub var: VarId,
    pub kind: BoundKind,
    pub val: Real,
}

impl BoundLit {
    pub fn lower(var: VarId, val: Real) -> BoundLit {
        BoundLit {
            var,
            kind: BoundKind::Lower,
            val,
        }
    }

    pub fn upper(var: VarId, val: Real) -> BoundLit {
        BoundLit {
            var,
            kind: BoundKind::Upper,
            val,
        }
    }

    /// True if the literal holds for the given value of its variable.
    pub fn holds_at(&self, val: Real) -> bool {
        match self.kind {
            BoundKind::Lower => num::ge(val, self.val),
            BoundKind::Upper => num::le(val, self.val),
        }
    }

    /// True if the current domain makes the literal impossible.
    pub fn impossible_in(&self, dom: &DomainStore) -> bool {
        match self.kind {
            BoundKind::Lower => num::lt(dom.ub(self.var), self.val),
            BoundKind::Upper => num::gt(dom.lb(self.var), self.val),
        }
    }

    /// True if the current domain already entails the literal.
    pub fn entailed_in(&self, dom: &DomainStore) -> bool {
        match self.kind {
            BoundKind::Lower => num::ge(dom.lb(self.var), self.val),
            BoundKind::Upper => num::le(dom.ub(self.var), self.val),
        }
    }

    /// The negation of the literal, assuming an integral variable.
    pub fn negate_integral(&self) -> BoundLit {
        match self.kind {
            BoundKind::Lower => BoundLit::upper(self.var, self.val - 1.0),
            BoundKind::Upper => BoundLit::lower(self.var, self.val + 1.0),
        }
    }
}

/// Outcome of a bound tightening attempt.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Tightening {
    /// The new bound is not tighter than the current one.
    Unchanged,
    Tightened,
    /// The change empties the domain.
    Empty,
}

#[derive(Clone, Debug)]
enum DomEvent {
    Bound {
        var: VarId,
        kind: BoundKind,
        old: Real,
    },
    Holes {
        var: VarId,
        prev: Vec<Hole>,
    },
}

#[derive(Default)]
pub struct DomainStore {
    doms: Vec<Domain>,
    integral: Vec<bool>,
    trail: Trail<DomEvent>,
    /// Number of tightenings ever applied; propagation drivers use this to
    /// detect whether anything changed since they last ran.
    generation: u64,
}

impl DomainStore {
    pub fn new() -> Self {
        DomainStore::default()
    }

    /// Registers the domain of variable `v`. Must be called in id order for
    /// every variable before solving starts.
    pub fn register(&mut self, v: VarId, dom: Domain, integral: bool) {
        debug_assert_eq!(v.idx(), self.doms.len());
        self.doms.push(dom);
        self.integral.push(integral);
    }

    pub fn len(&self) -> usize {
        self.doms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doms.is_empty()
    }

    pub fn lb(&self, v: VarId) -> Real {
        self.doms[v.idx()].lb
    }

    pub fn ub(&self, v: VarId) -> Real {
        self.doms[v.idx()].ub
    }

    pub fn domain(&self, v: VarId) -> &Domain {
        &self.doms[v.idx()]
    }

    pub fn is_fixed(&self, v: VarId) -> bool {
        self.doms[v.idx()].is_fixed()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Tightens the given bound of `v` to `val`, recording the old value for
    /// undo. Integral variables have the value rounded inward first.
    pub fn tighten(&mut self, v: VarId, kind: BoundKind, val: Real) -> Tightening {
        let val = if self.integral[v.idx()] && num::finite(val) {
            match kind {
                BoundKind::Lower => num::ceil(val),
                BoundKind::Upper => num::floor(val),
            }
        } else {
            val
        };
        let dom = &mut self.doms[v.idx()];
        let old = match kind {
            BoundKind::Lower => {
                if !num::gt(val, dom.lb) {
                    return Tightening::Unchanged;
                }
                std::mem::replace(&mut dom.lb, val)
            }
            BoundKind::Upper => {
                if !num::lt(val, dom.ub) {
                    return Tightening::Unchanged;
                }
                std::mem::replace(&mut dom.ub, val)
            }
        };
        self.trail.push(DomEvent::Bound { var: v, kind, old });
        self.generation += 1;
        if self.doms[v.idx()].is_empty() {
            Tightening::Empty
        } else {
            Tightening::Tightened
        }
    }

    pub fn tighten_lb(&mut self, v: VarId, val: Real) -> Tightening {
        self.tighten(v, BoundKind::Lower, val)
    }

    pub fn tighten_ub(&mut self, v: VarId, val: Real) -> Tightening {
        self.tighten(v, BoundKind::Upper, val)
    }

    /// Excludes the half-open interval `hole` from the domain of `v`.
    pub fn add_hole(&mut self, v: VarId, hole: Hole) {
        let prev = self.doms[v.idx()].add_hole(hole);
        self.trail.push(DomEvent::Holes { var: v, prev });
        self.generation += 1;
    }

    /// True if `val` lies in the current domain of `v`.
    pub fn contains(&self, v: VarId, val: Real) -> bool {
        self.doms[v.idx()].contains(val)
    }
}

impl Backtrack for DomainStore {
    fn save_state(&mut self) -> u32 {
        self.trail.save_state()
    }

    fn num_saved(&self) -> u32 {
        self.trail.num_saved()
    }

    fn restore_last(&mut self) {
        let doms = &mut self.doms;
        self.trail.restore_last_with(|e| match e {
            DomEvent::Bound { var, kind, old } => match kind {
                BoundKind::Lower => doms[var.idx()].lb = old,
                BoundKind::Upper => doms[var.idx()].ub = old,
            },
            DomEvent::Holes { var, prev } => doms[var.idx()].set_holes(prev),
        });
        self.generation += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store(n: usize, lb: Real, ub: Real, integral: bool) -> DomainStore {
        let mut s = DomainStore::new();
        for i in 0..n {
            s.register(VarId::new(i), Domain::new(lb, ub), integral);
        }
        s
    }

    #[test]
    fn test_tighten_and_restore() {
        let mut s = store(2, 0.0, 10.0, false);
        let x = VarId::new(0);
        s.save_state();
        assert_eq!(s.tighten_lb(x, 2.0), Tightening::Tightened);
        assert_eq!(s.tighten_ub(x, 7.5), Tightening::Tightened);
        assert_eq!(s.tighten_lb(x, 1.0), Tightening::Unchanged);
        assert_eq!(s.tighten_lb(x, 8.0), Tightening::Empty);
        s.restore_last();
        assert_eq!(s.lb(x), 0.0);
        assert_eq!(s.ub(x), 10.0);
    }

    #[test]
    fn test_integral_rounding() {
        let mut s = store(1, 0.0, 10.0, true);
        let x = VarId::new(0);
        assert_eq!(s.tighten_lb(x, 1.5), Tightening::Tightened);
        assert_eq!(s.lb(x), 2.0);
        assert_eq!(s.tighten_ub(x, 7.3), Tightening::Tightened);
        assert_eq!(s.ub(x), 7.0);
    }

    #[test]
    fn test_hole_restore() {
        let mut s = store(1, 0.0, 10.0, false);
        let x = VarId::new(0);
        s.save_state();
        s.add_hole(x, Hole::new(2.0, 3.0));
        assert!(!s.contains(x, 2.5));
        s.restore_last();
        assert!(s.contains(x, 2.5));
    }

    #[test]
    fn test_nested_levels() {
        let mut s = store(1, 0.0, 10.0, false);
        let x = VarId::new(0);
        s.save_state();
        s.tighten_lb(x, 1.0);
        s.save_state();
        s.tighten_lb(x, 4.0);
        s.tighten_ub(x, 6.0);
        assert_eq!((s.lb(x), s.ub(x)), (4.0, 6.0));
        s.restore_last();
        assert_eq!((s.lb(x), s.ub(x)), (1.0, 10.0));
        s.restore(0);
        assert_eq!((s.lb(x), s.ub(x)), (0.0, 10.0));
    }
}
