//! Constraint objects and constraint handlers.
//!
//! A [`Cons`] is a generic, reference counted constraint record with a
//! handler-private payload; all interpretation is delegated to its
//! [`Conshdlr`]. Handlers are kept in a [`ConshdlrSet`] together with three
//! separately sorted priority views (separation, enforcement, check) and the
//! per-handler arrays of active constraints.

pub mod bounddisj;
pub mod integrality;
pub mod linear;

use crate::core::{BoundLit, DomainStore, NodeId, Real, VarId, VarStore};
use crate::err::{Result, SolverError};
use crate::lp::Lp;
use crate::sol::Sol;
use hashbrown::HashMap;
use std::any::Any;

/// Behavioral flags of a constraint.
#[derive(Copy, Clone, Debug)]
pub struct ConsFlags {
    pub separate: bool,
    pub enforce: bool,
    pub check: bool,
    pub propagate: bool,
}

impl Default for ConsFlags {
    fn default() -> Self {
        ConsFlags {
            separate: true,
            enforce: true,
            check: true,
            propagate: true,
        }
    }
}

/// A generic constraint record.
pub struct Cons {
    pub name: String,
    /// Index of the interpreting handler in the [`ConshdlrSet`].
    pub hdlr: usize,
    data: Box<dyn Any>,
    pub flags: ConsFlags,
    /// True for constraints of the original (untransformed) problem.
    pub original: bool,
    /// The node that created the constraint; `None` for global constraints.
    /// Weak: used for scope checks only.
    pub owner: Option<NodeId>,
    nuses: usize,
    active: bool,
    enabled: bool,
    deleted: bool,
    /// Position in the handler's active array, for O(1) removal.
    hdlr_pos: Option<usize>,
}

impl Cons {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Active and not temporarily disabled.
    pub fn is_enabled(&self) -> bool {
        self.active && self.enabled
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Arena of all constraints. Ids are never reused.
#[derive(Default)]
pub struct ConsStore {
    conss: Vec<Cons>,
}

impl ConsStore {
    pub fn new() -> Self {
        ConsStore::default()
    }

    pub fn len(&self) -> usize {
        self.conss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conss.is_empty()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        hdlr: usize,
        data: Box<dyn Any>,
        flags: ConsFlags,
        original: bool,
        owner: Option<NodeId>,
    ) -> ConsId {
        let id = ConsId::new(self.conss.len());
        self.conss.push(Cons {
            name: name.into(),
            hdlr,
            data,
            flags,
            original,
            owner,
            nuses: 1,
            active: false,
            enabled: true,
            deleted: false,
            hdlr_pos: None,
        });
        id
    }

    pub fn cons(&self, id: ConsId) -> &Cons {
        &self.conss[id.idx()]
    }

    pub fn cons_mut(&mut self, id: ConsId) -> &mut Cons {
        &mut self.conss[id.idx()]
    }

    pub fn data(&self, id: ConsId) -> &dyn Any {
        self.conss[id.idx()].data.as_ref()
    }

    pub fn data_mut(&mut self, id: ConsId) -> &mut dyn Any {
        self.conss[id.idx()].data.as_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConsId> {
        (0..self.conss.len()).map(ConsId::new)
    }

    /// Increments the use count.
    pub fn capture(&mut self, id: ConsId) {
        self.conss[id.idx()].nuses += 1;
    }

    /// Decrements the use count; at zero the record is marked deleted and its
    /// payload dropped. Returns true if the constraint died.
    pub fn release(&mut self, id: ConsId) -> bool {
        let cons = &mut self.conss[id.idx()];
        debug_assert!(cons.nuses > 0);
        cons.nuses -= 1;
        if cons.nuses == 0 {
            debug_assert!(!cons.active, "released constraint is still active");
            cons.deleted = true;
            cons.data = Box::new(());
            true
        } else {
            false
        }
    }

    /// Marks a constraint as deleted from the problem (presolve reductions).
    pub fn mark_deleted(&mut self, id: ConsId) {
        self.conss[id.idx()].deleted = true;
    }
}

pub use crate::core::ConsId;

/// Result of a feasibility check.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Feasibility {
    Feasible,
    Infeasible,
}

/// Result of an enforcement callback.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Enforcement {
    Feasible,
    /// The constraint is violated and the handler could not resolve it;
    /// the engine will branch.
    Infeasible,
    /// The node is infeasible altogether.
    Cutoff,
    /// The handler added a cutting row to the LP; the LP must be re-solved.
    Separated,
    /// The handler tightened a domain; propagation must re-run.
    ReducedDomain,
    /// The handler added a constraint; propagation must re-run.
    ConsAdded,
    /// The handler itself created children for the focus node.
    Branched,
}

/// Result of a propagation callback.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Propagation {
    DidNotRun,
    Unchanged,
    ReducedDomain,
    ConsAdded,
    Cutoff,
}

/// Result of a separation callback.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SepaOutcome {
    DidNotRun,
    NoCuts,
    Separated,
    Cutoff,
}

/// Result of a presolve callback.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PresolOutcome {
    DidNotRun,
    Unchanged,
    /// Some reduction was found (fixing, bound change, deletion, ...).
    Reduced,
    Cutoff,
    Unbounded,
}

/// Down/up rounding locks per variable: the number of constraints that may
/// become violated when the variable moves toward the respective direction.
#[derive(Default)]
pub struct LockTable {
    down: Vec<u32>,
    up: Vec<u32>,
}

impl LockTable {
    pub fn new(nvars: usize) -> LockTable {
        LockTable {
            down: vec![0; nvars],
            up: vec![0; nvars],
        }
    }

    pub fn add(&mut self, v: VarId, down: bool, up: bool) {
        if down {
            self.down[v.idx()] += 1;
        }
        if up {
            self.up[v.idx()] += 1;
        }
    }

    pub fn down(&self, v: VarId) -> u32 {
        self.down[v.idx()]
    }

    pub fn up(&self, v: VarId) -> u32 {
        self.up[v.idx()]
    }
}

/// Arguments of the check callback.
pub struct CheckArgs<'a> {
    pub vars: &'a VarStore,
    pub sol: &'a Sol,
    /// False if the caller already verified integrality.
    pub check_integrality: bool,
    /// False if the solution stems from an optimal LP over the current rows,
    /// so constraints represented by an LP row need not be re-checked.
    pub check_lp_rows: bool,
}

/// Context of the enforcement callbacks.
pub struct EnfoCtx<'a> {
    pub vars: &'a VarStore,
    pub dom: &'a mut DomainStore,
    pub lp: &'a mut Lp,
    pub depth: u32,
    /// Children created by a handler that returns [`Enforcement::Branched`].
    pub children: Vec<crate::plugins::branching::ChildSpec>,
}

impl EnfoCtx<'_> {
    /// Registers a child for the focus node; the handler must return
    /// [`Enforcement::Branched`] for the children to take effect.
    pub fn add_child(&mut self, child: crate::plugins::branching::ChildSpec) {
        self.children.push(child);
    }
}

/// Context of the propagation callbacks.
pub struct PropCtx<'a> {
    pub vars: &'a VarStore,
    pub dom: &'a mut DomainStore,
    pub depth: u32,
}

/// A constraint handler: the interpreter of one class of constraints.
///
/// `check`, `enforce_lp`, `enforce_pseudo` and `lock` are required; the
/// remaining slots are optional and their omission means the corresponding
/// step is skipped for this handler.
pub trait Conshdlr {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn sepa_priority(&self) -> i32 {
        0
    }

    fn enfo_priority(&self) -> i32 {
        0
    }

    fn check_priority(&self) -> i32 {
        0
    }

    /// Propagation frequency: `-1` never, `0` only during presolve, `k > 0`
    /// at depths divisible by `k`.
    fn prop_freq(&self) -> i32 {
        -1
    }

    /// False for handlers that act without constraints (e.g. integrality).
    fn needs_cons(&self) -> bool {
        true
    }

    /// Maps the payload of an original constraint into the transformed
    /// variable space.
    fn transform(&self, vars: &VarStore, data: &dyn Any) -> Result<Box<dyn Any>>;

    fn check(&self, store: &ConsStore, conss: &[ConsId], args: &CheckArgs) -> Result<Feasibility>;

    fn enforce_lp(
        &mut self,
        store: &mut ConsStore,
        conss: &[ConsId],
        ctx: &mut EnfoCtx,
    ) -> Result<Enforcement>;

    fn enforce_pseudo(
        &mut self,
        store: &ConsStore,
        conss: &[ConsId],
        vars: &VarStore,
        dom: &mut DomainStore,
    ) -> Result<Enforcement>;

    /// Contributes rounding locks of one constraint.
    fn lock(&self, store: &ConsStore, cons: ConsId, locks: &mut LockTable);

    // ---- optional slots ----

    fn init(&mut self) {}

    fn exit(&mut self) {}

    /// Contributes initial relaxation rows to the LP.
    fn init_lp(
        &mut self,
        _store: &mut ConsStore,
        _conss: &[ConsId],
        _vars: &VarStore,
        _lp: &mut Lp,
    ) -> Result<()> {
        Ok(())
    }

    fn separate(
        &mut self,
        _store: &ConsStore,
        _conss: &[ConsId],
        _ctx: &mut crate::plugins::sepa::SepaCtx,
    ) -> Result<SepaOutcome> {
        Ok(SepaOutcome::DidNotRun)
    }

    fn propagate(
        &mut self,
        _store: &ConsStore,
        _conss: &[ConsId],
        _ctx: &mut PropCtx,
    ) -> Result<Propagation> {
        Ok(Propagation::DidNotRun)
    }

    /// Explains a bound deduced by [`Conshdlr::propagate`]: returns the bound
    /// literals that together forced `inferred`.
    fn resolve_propagation(
        &self,
        _store: &ConsStore,
        _cons: ConsId,
        _vars: &VarStore,
        _dom: &DomainStore,
        _inferred: BoundLit,
    ) -> Result<Vec<BoundLit>> {
        Err(SolverError::NotImplemented {
            op: "resolve propagation",
            plugin: self.name().into(),
        })
    }

    fn presolve(
        &mut self,
        _store: &mut ConsStore,
        _conss: &[ConsId],
        _ctx: &mut crate::plugins::presol::PresolCtx,
    ) -> Result<PresolOutcome> {
        Ok(PresolOutcome::DidNotRun)
    }

    /// Notification that a constraint record is about to die.
    fn delete(&mut self, _store: &ConsStore, _cons: ConsId) {}

    fn on_active(&mut self, _cons: ConsId) {}

    fn on_deactive(&mut self, _cons: ConsId) {}

    fn on_enable(&mut self, _cons: ConsId) {}

    fn on_disable(&mut self, _cons: ConsId) {}

    fn print(&self, store: &ConsStore, cons: ConsId, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.name(), store.cons(cons).name)
    }

    /// Copy of the handler for spawning subordinate engines; `None` marks the
    /// handler as non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Conshdlr>> {
        None
    }
}

/// The registered constraint handlers with their priority views and active
/// constraint arrays.
#[derive(Default)]
pub struct ConshdlrSet {
    hdlrs: Vec<Box<dyn Conshdlr>>,
    by_name: HashMap<String, usize>,
    sepa_order: Vec<usize>,
    enfo_order: Vec<usize>,
    check_order: Vec<usize>,
    /// Active constraints per handler, in activation order.
    active: Vec<Vec<ConsId>>,
    /// Bumped on every activation change of the handler; propagation drivers
    /// use this to detect stale windows.
    activation_gen: Vec<u64>,
}

impl ConshdlrSet {
    pub fn new() -> Self {
        ConshdlrSet::default()
    }

    pub fn len(&self) -> usize {
        self.hdlrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdlrs.is_empty()
    }

    pub fn register(&mut self, hdlr: Box<dyn Conshdlr>) -> Result<usize> {
        let name = hdlr.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(SolverError::invalid_data(
                "register constraint handler",
                format!("handler `{name}` already registered"),
            ));
        }
        let idx = self.hdlrs.len();
        self.by_name.insert(name, idx);
        self.hdlrs.push(hdlr);
        self.active.push(Vec::new());
        self.activation_gen.push(0);
        self.rebuild_orders();
        Ok(idx)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn hdlr(&self, i: usize) -> &dyn Conshdlr {
        self.hdlrs[i].as_ref()
    }

    pub fn hdlr_mut(&mut self, i: usize) -> &mut dyn Conshdlr {
        self.hdlrs[i].as_mut()
    }

    fn rebuild_orders(&mut self) {
        let n = self.hdlrs.len();
        let by = |key: fn(&dyn Conshdlr) -> i32, hdlrs: &[Box<dyn Conshdlr>]| {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by_key(|&i| -key(hdlrs[i].as_ref()));
            order
        };
        self.sepa_order = by(|h| h.sepa_priority(), &self.hdlrs);
        self.enfo_order = by(|h| h.enfo_priority(), &self.hdlrs);
        self.check_order = by(|h| h.check_priority(), &self.hdlrs);
    }

    /// Handler indices in decreasing separation priority.
    pub fn sepa_order(&self) -> &[usize] {
        &self.sepa_order
    }

    /// Handler indices in decreasing enforcement priority.
    pub fn enfo_order(&self) -> &[usize] {
        &self.enfo_order
    }

    /// Handler indices in decreasing check priority.
    pub fn check_order(&self) -> &[usize] {
        &self.check_order
    }

    pub fn active_conss(&self, hdlr: usize) -> &[ConsId] {
        &self.active[hdlr]
    }

    pub fn activation_gen(&self, hdlr: usize) -> u64 {
        self.activation_gen[hdlr]
    }

    /// Activates a constraint: it joins its handler's active array.
    /// Idempotent activation is an error; the caller guards node re-entry.
    pub fn activate(&mut self, store: &mut ConsStore, id: ConsId) {
        let cons = store.cons_mut(id);
        debug_assert!(!cons.active, "constraint activated twice");
        debug_assert!(!cons.deleted);
        cons.active = true;
        let h = cons.hdlr;
        cons.hdlr_pos = Some(self.active[h].len());
        self.active[h].push(id);
        self.activation_gen[h] += 1;
        self.hdlrs[h].on_active(id);
    }

    /// Deactivates a constraint, removing it from its handler's array in
    /// O(1) by swapping with the last element.
    pub fn deactivate(&mut self, store: &mut ConsStore, id: ConsId) {
        let (h, pos) = {
            let cons = store.cons_mut(id);
            debug_assert!(cons.active, "constraint deactivated twice");
            cons.active = false;
            let pos = cons.hdlr_pos.take().expect("active constraint without position");
            (cons.hdlr, pos)
        };
        let arr = &mut self.active[h];
        let last = arr.len() - 1;
        arr.swap(pos, last);
        arr.pop();
        if pos <= last && pos < arr.len() {
            let moved = arr[pos];
            store.cons_mut(moved).hdlr_pos = Some(pos);
        }
        self.activation_gen[h] += 1;
        self.hdlrs[h].on_deactive(id);
    }

    /// Temporarily disables an active constraint.
    pub fn disable(&mut self, store: &mut ConsStore, id: ConsId) {
        let cons = store.cons_mut(id);
        debug_assert!(cons.enabled, "constraint disabled twice");
        cons.enabled = false;
        let h = cons.hdlr;
        self.activation_gen[h] += 1;
        self.hdlrs[h].on_disable(id);
    }

    /// Re-enables a previously disabled constraint.
    pub fn enable(&mut self, store: &mut ConsStore, id: ConsId) {
        let cons = store.cons_mut(id);
        debug_assert!(!cons.enabled, "constraint enabled twice");
        cons.enabled = true;
        let h = cons.hdlr;
        self.activation_gen[h] += 1;
        self.hdlrs[h].on_enable(id);
    }

    /// Releases a reference; notifies the handler before the record dies.
    pub fn release(&mut self, store: &mut ConsStore, id: ConsId) {
        let h = store.cons(id).hdlr;
        let nuses = store.cons(id).nuses;
        if nuses == 1 {
            self.hdlrs[h].delete(store, id);
        }
        store.release(id);
    }

    /// The enabled constraints of `hdlr` that carry the given flag.
    pub fn enabled_conss(
        &self,
        store: &ConsStore,
        hdlr: usize,
        flag: fn(&ConsFlags) -> bool,
    ) -> Vec<ConsId> {
        self.active[hdlr]
            .iter()
            .copied()
            .filter(|&id| {
                let c = store.cons(id);
                c.is_enabled() && flag(&c.flags)
            })
            .collect()
    }
}

/// Runs the constraint handlers' check loop on a candidate solution, in
/// decreasing check priority; the first `Infeasible` ends the pass.
pub fn check_solution(
    set: &ConshdlrSet,
    store: &ConsStore,
    vars: &VarStore,
    sol: &Sol,
    check_integrality: bool,
    check_lp_rows: bool,
) -> Result<Feasibility> {
    let args = CheckArgs {
        vars,
        sol,
        check_integrality,
        check_lp_rows,
    };
    for &h in set.check_order() {
        let conss = set.enabled_conss(store, h, |f| f.check);
        if conss.is_empty() && set.hdlr(h).needs_cons() {
            continue;
        }
        if set.hdlr(h).check(store, &conss, &args)? == Feasibility::Infeasible {
            return Ok(Feasibility::Infeasible);
        }
    }
    Ok(Feasibility::Feasible)
}

/// The objective value of a sparse solution over the active variables.
pub fn solution_objective(vars: &VarStore, sol: &Sol) -> Real {
    vars.active().map(|v| vars.var(v).obj * sol.value(v)).sum()
}
