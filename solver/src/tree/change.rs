//! Node-set-changes: the bundle of bound changes, hole additions, constraint
//! additions and constraint disablings that defines a node relative to its
//! parent.

use crate::backtrack::Backtrack;
use crate::cons::{ConsId, ConshdlrSet, ConsStore};
use crate::core::{BoundKind, DomainStore, Hole, Real, Tightening, VarId};

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BoundChange {
    pub var: VarId,
    pub kind: BoundKind,
    pub val: Real,
}

impl BoundChange {
    pub fn lower(var: VarId, val: Real) -> BoundChange {
        BoundChange {
            var,
            kind: BoundKind::Lower,
            val,
        }
    }

    pub fn upper(var: VarId, val: Real) -> BoundChange {
        BoundChange {
            var,
            kind: BoundKind::Upper,
            val,
        }
    }
}

/// Result of applying a node-set-change.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Applied {
    Ok,
    /// Some change emptied a domain: the node is infeasible.
    Cutoff,
}

/// The deltas a node records against its parent.
///
/// Apply and undo are symmetric: bound changes and holes are undone through
/// the domain trail (one save point per application), constraint additions
/// and disablings are reverted explicitly.
#[derive(Default, Clone, Debug)]
pub struct NodeSetChange {
    pub bounds: Vec<BoundChange>,
    pub holes: Vec<(VarId, Hole)>,
    pub added: Vec<ConsId>,
    pub disabled: Vec<ConsId>,
}

impl NodeSetChange {
    pub fn new() -> Self {
        NodeSetChange::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty() && self.holes.is_empty() && self.added.is_empty() && self.disabled.is_empty()
    }

    pub fn add_bound(&mut self, change: BoundChange) {
        self.bounds.push(change);
    }

    pub fn add_hole(&mut self, var: VarId, hole: Hole) {
        self.holes.push((var, hole));
    }

    pub fn add_cons(&mut self, id: ConsId) {
        self.added.push(id);
    }

    pub fn disable_cons(&mut self, id: ConsId) {
        self.disabled.push(id);
    }

    /// Applies the change on focus entry: pushes a domain save point, records
    /// the bound changes and holes, activates added constraints and disables
    /// the listed ones. Even on cutoff the full change is applied so that
    /// [`NodeSetChange::undo`] stays symmetric.
    pub fn apply(
        &self,
        dom: &mut DomainStore,
        conss: &mut ConsStore,
        hdlrs: &mut ConshdlrSet,
    ) -> Applied {
        dom.save_state();
        let mut cutoff = false;
        for bc in &self.bounds {
            if dom.tighten(bc.var, bc.kind, bc.val) == Tightening::Empty {
                cutoff = true;
            }
        }
        for &(v, hole) in &self.holes {
            dom.add_hole(v, hole);
        }
        for &id in &self.added {
            hdlrs.activate(conss, id);
        }
        for &id in &self.disabled {
            hdlrs.disable(conss, id);
        }
        if cutoff {
            Applied::Cutoff
        } else {
            Applied::Ok
        }
    }

    /// Undoes a previous [`NodeSetChange::apply`], restoring bounds, holes,
    /// active sets and enabled sets exactly.
    pub fn undo(&self, dom: &mut DomainStore, conss: &mut ConsStore, hdlrs: &mut ConshdlrSet) {
        for &id in self.disabled.iter().rev() {
            hdlrs.enable(conss, id);
        }
        for &id in self.added.iter().rev() {
            hdlrs.deactivate(conss, id);
        }
        dom.restore_last();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cons::linear::{LinearCons, LinearConshdlr};
    use crate::core::Domain;

    #[test]
    fn test_apply_undo_symmetry() {
        let mut dom = DomainStore::new();
        let x = VarId::new(0);
        let y = VarId::new(1);
        dom.register(x, Domain::new(0.0, 10.0), true);
        dom.register(y, Domain::new(0.0, 10.0), false);

        let mut conss = ConsStore::new();
        let mut hdlrs = ConshdlrSet::new();
        let h = hdlrs.register(Box::new(LinearConshdlr::new())).unwrap();
        let c0 = conss.add(
            "c0",
            h,
            Box::new(LinearCons::new([(x, 1.0)], 0.0, 5.0)),
            Default::default(),
            false,
            None,
        );
        let c1 = conss.add(
            "c1",
            h,
            Box::new(LinearCons::new([(y, 1.0)], 0.0, 5.0)),
            Default::default(),
            false,
            None,
        );
        hdlrs.activate(&mut conss, c1);

        let mut change = NodeSetChange::new();
        change.add_bound(BoundChange::lower(x, 2.0));
        change.add_bound(BoundChange::upper(y, 7.5));
        change.add_hole(y, Hole::new(3.0, 4.0));
        change.add_cons(c0);
        change.disable_cons(c1);

        assert_eq!(change.apply(&mut dom, &mut conss, &mut hdlrs), Applied::Ok);
        assert_eq!(dom.lb(x), 2.0);
        assert_eq!(dom.ub(y), 7.5);
        assert!(!dom.contains(y, 3.5));
        assert!(conss.cons(c0).is_active());
        assert!(!conss.cons(c1).is_enabled());
        assert_eq!(hdlrs.active_conss(h), &[c1, c0]);

        change.undo(&mut dom, &mut conss, &mut hdlrs);
        assert_eq!(dom.lb(x), 0.0);
        assert_eq!(dom.ub(y), 10.0);
        assert!(dom.contains(y, 3.5));
        assert!(!conss.cons(c0).is_active());
        assert!(conss.cons(c1).is_enabled());
        assert_eq!(hdlrs.active_conss(h), &[c1]);
    }

    #[test]
    fn test_apply_detects_cutoff() {
        let mut dom = DomainStore::new();
        let x = VarId::new(0);
        dom.register(x, Domain::new(0.0, 10.0), true);
        let mut conss = ConsStore::new();
        let mut hdlrs = ConshdlrSet::new();

        let mut change = NodeSetChange::new();
        change.add_bound(BoundChange::lower(x, 8.0));
        change.add_bound(BoundChange::upper(x, 3.0));
        assert_eq!(change.apply(&mut dom, &mut conss, &mut hdlrs), Applied::Cutoff);
        change.undo(&mut dom, &mut conss, &mut hdlrs);
        assert_eq!((dom.lb(x), dom.ub(x)), (0.0, 10.0));
    }
}
