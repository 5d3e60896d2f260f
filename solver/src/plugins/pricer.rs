//! Variable pricer plugins: adding columns to the LP during the solve.

use crate::cons::ConsStore;
use crate::core::{Domain, DomainStore, Real, VarId, VarKind, VarStore};
use crate::err::Result;
use crate::lp::{Lp, LpCol};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PriceOutcome {
    DidNotRun,
    NoColumns,
    ColumnsAdded,
}

/// Context of a pricing round, after an optimal LP solve.
pub struct PriceCtx<'a> {
    pub vars: &'a mut VarStore,
    pub dom: &'a mut DomainStore,
    pub lp: &'a mut Lp,
    /// Constraint store, so pricers can extend constraint payloads with the
    /// new columns.
    pub conss: &'a mut ConsStore,
    /// Dual multipliers of the current LP rows.
    pub duals: Vec<Real>,
    added: usize,
}

impl<'a> PriceCtx<'a> {
    pub fn new(
        vars: &'a mut VarStore,
        dom: &'a mut DomainStore,
        lp: &'a mut Lp,
        conss: &'a mut ConsStore,
        duals: Vec<Real>,
    ) -> Self {
        PriceCtx {
            vars,
            dom,
            lp,
            conss,
            duals,
            added: 0,
        }
    }

    /// Creates a new (transformed) variable together with its LP column and
    /// its coefficients in existing rows.
    pub fn add_priced_var(
        &mut self,
        name: &str,
        kind: VarKind,
        lb: Real,
        ub: Real,
        obj: Real,
        row_coefs: &[(usize, Real)],
    ) -> Result<VarId> {
        let v = self.vars.add_transformed(name, kind, lb, ub, obj)?;
        self.dom.register(v, Domain::new(lb, ub), kind.is_integral());
        let col = self.lp.add_col(LpCol {
            var: v,
            lb,
            ub,
            obj,
            integral: kind.is_integral(),
        });
        for &(row, coef) in row_coefs {
            self.lp.add_row_coef(row, col, coef);
        }
        self.added += 1;
        Ok(v)
    }

    pub fn nadded(&self) -> usize {
        self.added
    }
}

pub trait Pricer {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn default_priority(&self) -> i32 {
        0
    }

    /// Generates columns with negative reduced cost for the current duals.
    fn price(&mut self, ctx: &mut PriceCtx) -> Result<PriceOutcome>;

    /// Copy for spawning subordinate engines; `None` marks the pricer as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Pricer>> {
        None
    }
}
