//! The LP relaxation: columns, rows, basis, dive substate.
//!
//! The numerical algorithm lives behind the [`LpBackend`] trait; the engine
//! owns an [`Lp`] and is the only component allowed to mutate it outside of a
//! dive. On `Optimal` the backend provides primal values, duals and reduced
//! costs; on `Infeasible` a Farkas proof; on `Unbounded` a primal ray.

pub mod simplex;

use crate::core::{num, Real, VarId};
use crate::err::{Result, SolverError};
use hashbrown::HashMap;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LpStatus {
    NotSolved,
    Optimal,
    Infeasible,
    Unbounded,
    IterLimit,
    TimeLimit,
    Error,
}

#[derive(Clone, PartialEq, Debug)]
pub struct LpCol {
    pub var: VarId,
    pub lb: Real,
    pub ub: Real,
    pub obj: Real,
    /// True if the column must take integral values in a feasible solution.
    pub integral: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct LpRow {
    pub name: String,
    /// Sparse coefficients `(column index, value)`.
    pub coefs: Vec<(usize, Real)>,
    /// Left-hand side, `-INF` if absent.
    pub lhs: Real,
    /// Right-hand side, `INF` if absent.
    pub rhs: Real,
    /// Local rows are only valid in the subtree they were created in.
    pub local: bool,
    /// True if all coefficients and both finite sides are integral and every
    /// involved column is integral (so the row's slack is integral too).
    pub integral: bool,
}

impl LpRow {
    pub fn activity(&self, primal: &[Real]) -> Real {
        self.coefs.iter().map(|&(c, a)| a * primal[c]).sum()
    }

    /// Violation of the row at the given point (positive if infeasible).
    pub fn violation(&self, primal: &[Real]) -> Real {
        let act = self.activity(primal);
        let mut viol: Real = 0.0;
        if !num::is_neg_inf(self.lhs) {
            viol = viol.max(self.lhs - act);
        }
        if !num::is_inf(self.rhs) {
            viol = viol.max(act - self.rhs);
        }
        viol
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BasisStatus {
    Basic,
    AtLower,
    AtUpper,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Basis {
    pub cols: Vec<BasisStatus>,
    pub rows: Vec<BasisStatus>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct LpSolution {
    pub objval: Real,
    /// Primal value per column.
    pub primal: Vec<Real>,
    /// Reduced cost per column.
    pub redcost: Vec<Real>,
    /// Dual multiplier per row.
    pub dual: Vec<Real>,
}

/// Result of one backend solve.
pub struct LpOutcome {
    pub status: LpStatus,
    pub sol: Option<LpSolution>,
    pub basis: Option<Basis>,
    /// Primal ray on `Unbounded`, per column.
    pub primal_ray: Option<Vec<Real>>,
    /// Farkas multipliers per row on `Infeasible`.
    pub farkas: Option<Vec<Real>>,
    pub iterations: u64,
}

/// A nonbasic entity of an optimal tableau row, described in terms of the
/// engine-level columns and rows so separators can expand it back to the
/// original variable space. Every entity is nonnegative in any feasible
/// point.
#[derive(Copy, Clone, Debug)]
pub enum TabVar {
    /// `x[col] - lb(col)`
    ColShift(usize),
    /// `ub(col) - x[col]`
    ColNeg(usize),
    /// One half of a free-column split; not usable for rounding cuts.
    ColSplit(usize),
    /// `rhs(row) - activity(row)`
    SlackRhs(usize),
    /// `activity(row) - lhs(row)`
    SlackLhs(usize),
    /// `ub(col) - x[col]` stemming from the internal upper-bound row.
    BoundSlack(usize),
}

#[derive(Copy, Clone, Debug)]
pub struct TabEntry {
    pub coef: Real,
    pub entity: TabVar,
    /// True if the entity is integral in every integral-feasible point.
    pub integral: bool,
}

/// One row of the optimal simplex tableau: `basic = value - sum coef_i * entity_i`.
#[derive(Clone, Debug)]
pub struct TableauRow {
    /// Current value of the basic entity (in its shifted, nonnegative space).
    pub value: Real,
    pub entries: Vec<TabEntry>,
}

pub trait LpBackend {
    fn name(&self) -> &'static str;

    /// Solves `min sum obj_j x_j` subject to the rows and column bounds.
    /// `warm` is a hint that implementations may ignore.
    fn solve(&mut self, cols: &[LpCol], rows: &[LpRow], warm: Option<&Basis>) -> Result<LpOutcome>;

    /// The optimal tableau row in which `col` is basic, if the last solve was
    /// optimal and `col` is basic. Used by tableau-based separators.
    fn tableau_row(&self, col: usize) -> Option<TableauRow>;
}

struct DiveSnapshot {
    col_bounds: Vec<(Real, Real)>,
    nrows: usize,
    status: LpStatus,
    sol: Option<LpSolution>,
    basis: Option<Basis>,
    primal_ray: Option<Vec<Real>>,
    farkas: Option<Vec<Real>>,
}

/// The engine's LP relaxation state.
pub struct Lp {
    cols: Vec<LpCol>,
    rows: Vec<LpRow>,
    status: LpStatus,
    sol: Option<LpSolution>,
    basis: Option<Basis>,
    primal_ray: Option<Vec<Real>>,
    farkas: Option<Vec<Real>>,
    dive: Option<DiveSnapshot>,
    backend: Box<dyn LpBackend>,
    col_of: HashMap<VarId, usize>,
    nsolves: u64,
    iterations: u64,
}

impl Lp {
    pub fn new(backend: Box<dyn LpBackend>) -> Self {
        Lp {
            cols: Vec::new(),
            rows: Vec::new(),
            status: LpStatus::NotSolved,
            sol: None,
            basis: None,
            primal_ray: None,
            farkas: None,
            dive: None,
            backend,
            col_of: HashMap::new(),
            nsolves: 0,
            iterations: 0,
        }
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> &[LpCol] {
        &self.cols
    }

    pub fn rows(&self) -> &[LpRow] {
        &self.rows
    }

    pub fn col(&self, i: usize) -> &LpCol {
        &self.cols[i]
    }

    pub fn row(&self, i: usize) -> &LpRow {
        &self.rows[i]
    }

    pub fn col_of(&self, v: VarId) -> Option<usize> {
        self.col_of.get(&v).copied()
    }

    pub fn add_col(&mut self, col: LpCol) -> usize {
        debug_assert!(self.dive.is_none(), "columns may not be added while diving");
        let i = self.cols.len();
        self.col_of.insert(col.var, i);
        self.cols.push(col);
        self.status = LpStatus::NotSolved;
        i
    }

    pub fn add_row(&mut self, row: LpRow) -> usize {
        let i = self.rows.len();
        self.rows.push(row);
        self.status = LpStatus::NotSolved;
        i
    }

    /// Adds a coefficient to an existing row (column generation).
    pub fn add_row_coef(&mut self, row: usize, col: usize, coef: Real) {
        self.rows[row].coefs.push((col, coef));
        self.status = LpStatus::NotSolved;
    }

    /// Removes all rows with index `>= n`; forbidden while diving.
    pub fn truncate_rows(&mut self, n: usize) {
        debug_assert!(self.dive.is_none(), "rows may not be removed while diving");
        if n < self.rows.len() {
            self.rows.truncate(n);
            self.status = LpStatus::NotSolved;
        }
    }

    pub fn set_col_bounds(&mut self, i: usize, lb: Real, ub: Real) {
        if self.cols[i].lb != lb || self.cols[i].ub != ub {
            self.cols[i].lb = lb;
            self.cols[i].ub = ub;
            self.status = LpStatus::NotSolved;
        }
    }

    pub fn status(&self) -> LpStatus {
        self.status
    }

    pub fn solution(&self) -> Option<&LpSolution> {
        self.sol.as_ref()
    }

    pub fn objval(&self) -> Option<Real> {
        self.sol.as_ref().map(|s| s.objval)
    }

    pub fn basis(&self) -> Option<&Basis> {
        self.basis.as_ref()
    }

    pub fn primal_ray(&self) -> Option<&[Real]> {
        self.primal_ray.as_deref()
    }

    pub fn farkas(&self) -> Option<&[Real]> {
        self.farkas.as_deref()
    }

    /// Primal value of the column of `v` in the last optimal solution.
    pub fn value_of(&self, v: VarId) -> Option<Real> {
        let col = self.col_of(v)?;
        self.sol.as_ref().map(|s| s.primal[col])
    }

    pub fn solve_count(&self) -> u64 {
        self.nsolves
    }

    pub fn iteration_count(&self) -> u64 {
        self.iterations
    }

    pub fn solve(&mut self) -> Result<LpStatus> {
        let outcome = self.backend.solve(&self.cols, &self.rows, self.basis.as_ref())?;
        self.nsolves += 1;
        self.iterations += outcome.iterations;
        self.status = outcome.status;
        self.sol = outcome.sol;
        self.basis = outcome.basis;
        self.primal_ray = outcome.primal_ray;
        self.farkas = outcome.farkas;
        Ok(self.status)
    }

    pub fn tableau_row(&self, col: usize) -> Option<TableauRow> {
        self.backend.tableau_row(col)
    }

    pub fn in_dive(&self) -> bool {
        self.dive.is_some()
    }

    /// Enters the dive substate, snapshotting column bounds, the row set and
    /// the last solve results. Dives may not be nested.
    pub fn start_dive(&mut self) -> Result<()> {
        if self.dive.is_some() {
            return Err(SolverError::invalid_data("start dive", "dive already in progress"));
        }
        self.dive = Some(DiveSnapshot {
            col_bounds: self.cols.iter().map(|c| (c.lb, c.ub)).collect(),
            nrows: self.rows.len(),
            status: self.status,
            sol: self.sol.clone(),
            basis: self.basis.clone(),
            primal_ray: self.primal_ray.clone(),
            farkas: self.farkas.clone(),
        });
        Ok(())
    }

    /// Leaves the dive substate, restoring the pre-dive LP verbatim.
    pub fn end_dive(&mut self) -> Result<()> {
        let snap = self
            .dive
            .take()
            .ok_or_else(|| SolverError::invalid_data("end dive", "no dive in progress"))?;
        for (i, (lb, ub)) in snap.col_bounds.into_iter().enumerate() {
            self.cols[i].lb = lb;
            self.cols[i].ub = ub;
        }
        self.rows.truncate(snap.nrows);
        self.status = snap.status;
        self.sol = snap.sol;
        self.basis = snap.basis;
        self.primal_ray = snap.primal_ray;
        self.farkas = snap.farkas;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::simplex::SimplexBackend;
    use super::*;
    use crate::core::INF;

    fn lp() -> Lp {
        Lp::new(Box::new(SimplexBackend::default()))
    }

    #[test]
    fn test_dive_isolation() {
        let mut lp = lp();
        let x = lp.add_col(LpCol {
            var: VarId::new(0),
            lb: 0.0,
            ub: 1.0,
            obj: 1.0,
            integral: false,
        });
        lp.add_row(LpRow {
            name: "r".into(),
            coefs: vec![(x, 1.0)],
            lhs: 0.5,
            rhs: INF,
            local: false,
            integral: false,
        });
        lp.solve().unwrap();
        let cols_before = lp.cols().to_vec();
        let rows_before = lp.rows().to_vec();
        let basis_before = lp.basis().cloned();
        let sol_before = lp.solution().cloned();

        lp.start_dive().unwrap();
        assert!(lp.start_dive().is_err());
        lp.set_col_bounds(x, 1.0, 1.0);
        lp.add_row(LpRow {
            name: "divecut".into(),
            coefs: vec![(x, 1.0)],
            lhs: -INF,
            rhs: 2.0,
            local: true,
            integral: false,
        });
        lp.solve().unwrap();
        lp.end_dive().unwrap();

        assert_eq!(lp.cols(), cols_before.as_slice());
        assert_eq!(lp.rows(), rows_before.as_slice());
        assert_eq!(lp.basis().cloned(), basis_before);
        assert_eq!(lp.solution().cloned(), sol_before);
        assert!(lp.end_dive().is_err());
    }
}
