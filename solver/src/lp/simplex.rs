//! A dense two-phase tableau simplex.
//!
//! This is the reference [`LpBackend`]: deterministic (Bland's rule), dense,
//! and intended for the moderate LP sizes of the relaxations the engine
//! produces. Columns are normalized to nonnegative internal variables by
//! shifting at a finite lower bound, negating at a finite upper bound, or
//! splitting free columns; finite upper bounds become internal rows so that
//! the final tableau can be mapped back to engine space for tableau-based
//! separators.

use super::{
    Basis, BasisStatus, LpBackend, LpCol, LpOutcome, LpRow, LpSolution, LpStatus, TabEntry, TabVar,
    TableauRow,
};
use crate::core::{num, Real};
use crate::err::{Result, SolverError};

const PIVOT_TOL: Real = 1e-9;
const COST_TOL: Real = 1e-9;
const PHASE1_TOL: Real = 1e-7;

#[derive(Copy, Clone, Debug)]
enum ZKind {
    /// `x = lb + z`
    Shift { col: usize },
    /// `x = ub - z`
    Neg { col: usize },
    /// positive part of `x = zp - zn`
    SplitPos { col: usize },
    /// negative part of `x = zp - zn`
    SplitNeg { col: usize },
}

#[derive(Copy, Clone, PartialEq, Debug)]
enum Rel {
    Le,
    Ge,
    Eq,
}

#[derive(Copy, Clone, Debug)]
enum Origin {
    /// rhs side of engine row i
    RhsOf(usize),
    /// lhs side of engine row i
    LhsOf(usize),
    /// equality engine row i
    EqOf(usize),
    /// internal upper-bound row of engine column j
    BoundOf(usize),
}

struct IRow {
    coefs: Vec<Real>,
    rhs: Real,
    rel: Rel,
    origin: Origin,
    /// True if the row was multiplied by -1 to make its rhs nonnegative.
    negated: bool,
    slack: Option<usize>,
    art: Option<usize>,
}

/// Tableau state kept after a solve for separator queries.
struct SolveState {
    a: Vec<Vec<Real>>,
    b: Vec<Real>,
    basis: Vec<usize>,
    is_basic: Vec<bool>,
    /// Entity description per internal column; `None` for artificials.
    tabvar: Vec<Option<(TabVar, bool)>>,
    /// Engine column -> internal structural index (None for split columns).
    z_of_col: Vec<Option<usize>>,
    optimal: bool,
}

#[derive(Default)]
pub struct SimplexBackend {
    state: Option<SolveState>,
}

impl SimplexBackend {
    pub fn new() -> Self {
        SimplexBackend::default()
    }
}

impl LpBackend for SimplexBackend {
    fn name(&self) -> &'static str {
        "tableau"
    }

    fn solve(&mut self, cols: &[LpCol], rows: &[LpRow], _warm: Option<&Basis>) -> Result<LpOutcome> {
        let outcome = run(cols, rows, &mut self.state)?;
        Ok(outcome)
    }

    fn tableau_row(&self, col: usize) -> Option<TableauRow> {
        let st = self.state.as_ref()?;
        if !st.optimal {
            return None;
        }
        let z = (*st.z_of_col.get(col)?)?;
        let r = st.basis.iter().position(|&bv| bv == z)?;
        let mut entries = Vec::new();
        for (j, &coef) in st.a[r].iter().enumerate() {
            if j == z || st.is_basic[j] || coef.abs() <= PIVOT_TOL {
                continue;
            }
            // artificial columns are identically zero in any feasible point
            if let Some((entity, integral)) = st.tabvar[j] {
                entries.push(TabEntry { coef, entity, integral });
            }
        }
        Some(TableauRow {
            value: st.b[r],
            entries,
        })
    }
}

/// Column normalization: engine column -> internal structural variables.
enum ColMap {
    Shift { z: usize },
    Neg { z: usize },
    Split { zp: usize, zn: usize },
}

#[allow(clippy::needless_range_loop)]
fn run(cols: &[LpCol], rows: &[LpRow], keep: &mut Option<SolveState>) -> Result<LpOutcome> {
    *keep = None;

    // ---- normalize columns ----
    let mut zkinds: Vec<ZKind> = Vec::new();
    let mut colmap: Vec<ColMap> = Vec::with_capacity(cols.len());
    let mut bound_rows: Vec<(usize, Real)> = Vec::new(); // (engine col, ub - lb)
    for (c, col) in cols.iter().enumerate() {
        let l_finite = !num::is_neg_inf(col.lb);
        let u_finite = !num::is_inf(col.ub);
        if l_finite {
            let z = zkinds.len();
            zkinds.push(ZKind::Shift { col: c });
            colmap.push(ColMap::Shift { z });
            if u_finite {
                bound_rows.push((c, col.ub - col.lb));
            }
        } else if u_finite {
            let z = zkinds.len();
            zkinds.push(ZKind::Neg { col: c });
            colmap.push(ColMap::Neg { z });
        } else {
            let zp = zkinds.len();
            zkinds.push(ZKind::SplitPos { col: c });
            let zn = zkinds.len();
            zkinds.push(ZKind::SplitNeg { col: c });
            colmap.push(ColMap::Split { zp, zn });
        }
    }
    let nz = zkinds.len();

    // ---- normalize rows ----
    let mut irows: Vec<IRow> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let mut coefs = vec![0.0; nz];
        let mut shift = 0.0;
        for &(c, a) in &row.coefs {
            match colmap[c] {
                ColMap::Shift { z } => {
                    coefs[z] += a;
                    shift += a * cols[c].lb;
                }
                ColMap::Neg { z } => {
                    coefs[z] -= a;
                    shift += a * cols[c].ub;
                }
                ColMap::Split { zp, zn } => {
                    coefs[zp] += a;
                    coefs[zn] -= a;
                }
            }
        }
        let l_finite = !num::is_neg_inf(row.lhs);
        let u_finite = !num::is_inf(row.rhs);
        if l_finite && u_finite && num::eq(row.lhs, row.rhs) {
            irows.push(IRow {
                coefs,
                rhs: row.rhs - shift,
                rel: Rel::Eq,
                origin: Origin::EqOf(i),
                negated: false,
                slack: None,
                art: None,
            });
        } else {
            if u_finite {
                irows.push(IRow {
                    coefs: coefs.clone(),
                    rhs: row.rhs - shift,
                    rel: Rel::Le,
                    origin: Origin::RhsOf(i),
                    negated: false,
                    slack: None,
                    art: None,
                });
            }
            if l_finite {
                irows.push(IRow {
                    coefs,
                    rhs: row.lhs - shift,
                    rel: Rel::Ge,
                    origin: Origin::LhsOf(i),
                    negated: false,
                    slack: None,
                    art: None,
                });
            }
        }
    }
    for &(c, width) in &bound_rows {
        let z = match colmap[c] {
            ColMap::Shift { z } => z,
            _ => unreachable!(),
        };
        let mut coefs = vec![0.0; nz];
        coefs[z] = 1.0;
        irows.push(IRow {
            coefs,
            rhs: width,
            rel: Rel::Le,
            origin: Origin::BoundOf(c),
            negated: false,
            slack: None,
            art: None,
        });
    }

    // make every rhs nonnegative
    for ir in irows.iter_mut() {
        if ir.rhs < 0.0 {
            for a in ir.coefs.iter_mut() {
                *a = -*a;
            }
            ir.rhs = -ir.rhs;
            ir.rel = match ir.rel {
                Rel::Le => Rel::Ge,
                Rel::Ge => Rel::Le,
                Rel::Eq => Rel::Eq,
            };
            ir.negated = true;
        }
    }

    // ---- assemble the tableau ----
    let m = irows.len();
    let mut ntot = nz;
    for ir in irows.iter_mut() {
        match ir.rel {
            Rel::Le => {
                ir.slack = Some(ntot);
                ntot += 1;
            }
            Rel::Ge => {
                ir.slack = Some(ntot);
                ntot += 1;
                ir.art = Some(ntot);
                ntot += 1;
            }
            Rel::Eq => {
                ir.art = Some(ntot);
                ntot += 1;
            }
        }
    }

    let mut a = vec![vec![0.0; ntot]; m];
    let mut b = vec![0.0; m];
    let mut basis = vec![0usize; m];
    let mut is_artificial = vec![false; ntot];
    for (r, ir) in irows.iter().enumerate() {
        a[r][..nz].copy_from_slice(&ir.coefs);
        b[r] = ir.rhs;
        if let Some(s) = ir.slack {
            a[r][s] = if ir.rel == Rel::Le { 1.0 } else { -1.0 };
        }
        if let Some(art) = ir.art {
            a[r][art] = 1.0;
            is_artificial[art] = true;
        }
        basis[r] = match ir.rel {
            Rel::Le => ir.slack.unwrap(),
            _ => ir.art.unwrap(),
        };
    }

    let max_iters = 50_000u64.max(200 * (m as u64 + ntot as u64));
    let mut iterations = 0u64;

    // ---- phase 1: minimize the sum of artificials ----
    let mut d = vec![0.0; ntot];
    let mut z_obj = 0.0;
    for j in 0..ntot {
        d[j] = if is_artificial[j] { 1.0 } else { 0.0 };
    }
    for r in 0..m {
        if is_artificial[basis[r]] {
            for j in 0..ntot {
                d[j] -= a[r][j];
            }
            z_obj += b[r];
        }
    }
    let unbounded = pivot_loop(
        &mut a,
        &mut b,
        &mut d,
        &mut z_obj,
        &mut basis,
        &is_artificial,
        &mut iterations,
        max_iters,
    );
    if iterations >= max_iters {
        return Ok(not_solved(LpStatus::IterLimit, iterations));
    }
    if unbounded.is_some() {
        // the phase-1 objective is bounded below by zero
        return Err(SolverError::LpError {
            op: "simplex phase 1",
            msg: "unbounded auxiliary problem".into(),
        });
    }

    if z_obj > PHASE1_TOL {
        // infeasible: extract Farkas multipliers from the phase-1 duals
        let mut farkas = vec![0.0; rows.len()];
        for ir in &irows {
            let y_int = match ir.rel {
                Rel::Le => -d[ir.slack.unwrap()],
                Rel::Ge => d[ir.slack.unwrap()],
                Rel::Eq => 1.0 - d[ir.art.unwrap()],
            };
            let y = if ir.negated { -y_int } else { y_int };
            match ir.origin {
                Origin::RhsOf(i) | Origin::LhsOf(i) | Origin::EqOf(i) => farkas[i] += y,
                Origin::BoundOf(_) => {}
            }
        }
        return Ok(LpOutcome {
            status: LpStatus::Infeasible,
            sol: None,
            basis: None,
            primal_ray: None,
            farkas: Some(farkas),
            iterations,
        });
    }

    // drive remaining basic artificials out of the basis
    for r in 0..m {
        if !is_artificial[basis[r]] {
            continue;
        }
        debug_assert!(b[r].abs() <= PHASE1_TOL);
        if let Some(j) = (0..ntot).find(|&j| !is_artificial[j] && a[r][j].abs() > PIVOT_TOL) {
            pivot(&mut a, &mut b, &mut d, &mut z_obj, &mut basis, r, j);
        }
        // otherwise the row is redundant and stays inert
    }

    // ---- phase 2: minimize the true objective ----
    let mut c2 = vec![0.0; ntot];
    let mut const_shift = 0.0;
    for (k, kind) in zkinds.iter().enumerate() {
        match *kind {
            ZKind::Shift { col } => {
                c2[k] = cols[col].obj;
                const_shift += cols[col].obj * cols[col].lb;
            }
            ZKind::Neg { col } => {
                c2[k] = -cols[col].obj;
                const_shift += cols[col].obj * cols[col].ub;
            }
            ZKind::SplitPos { col } => c2[k] = cols[col].obj,
            ZKind::SplitNeg { col } => c2[k] = -cols[col].obj,
        }
    }
    for j in 0..ntot {
        d[j] = c2[j];
    }
    z_obj = 0.0;
    for r in 0..m {
        let cb = c2[basis[r]];
        if cb != 0.0 {
            for j in 0..ntot {
                d[j] -= cb * a[r][j];
            }
            z_obj += cb * b[r];
        }
    }
    let unbounded = pivot_loop(
        &mut a,
        &mut b,
        &mut d,
        &mut z_obj,
        &mut basis,
        &is_artificial,
        &mut iterations,
        max_iters,
    );
    if iterations >= max_iters {
        return Ok(not_solved(LpStatus::IterLimit, iterations));
    }

    if let Some(j_enter) = unbounded {
        // build the primal ray in engine space
        let mut rates = vec![0.0; nz];
        if j_enter < nz {
            rates[j_enter] = 1.0;
        }
        for r in 0..m {
            if basis[r] < nz && a[r][j_enter].abs() > PIVOT_TOL {
                rates[basis[r]] = -a[r][j_enter];
            }
        }
        let mut ray = vec![0.0; cols.len()];
        for (k, kind) in zkinds.iter().enumerate() {
            match *kind {
                ZKind::Shift { col } | ZKind::SplitPos { col } => ray[col] += rates[k],
                ZKind::Neg { col } | ZKind::SplitNeg { col } => ray[col] -= rates[k],
            }
        }
        return Ok(LpOutcome {
            status: LpStatus::Unbounded,
            sol: None,
            basis: None,
            primal_ray: Some(ray),
            farkas: None,
            iterations,
        });
    }

    // ---- optimal: extract solution, duals, reduced costs, basis ----
    let mut zval = vec![0.0; nz];
    let mut is_basic = vec![false; ntot];
    for r in 0..m {
        is_basic[basis[r]] = true;
        if basis[r] < nz {
            zval[basis[r]] = b[r];
        }
    }
    let mut primal = vec![0.0; cols.len()];
    let mut redcost = vec![0.0; cols.len()];
    for (c, col) in cols.iter().enumerate() {
        match colmap[c] {
            ColMap::Shift { z } => {
                primal[c] = col.lb + zval[z];
                redcost[c] = d[z];
            }
            ColMap::Neg { z } => {
                primal[c] = col.ub - zval[z];
                redcost[c] = -d[z];
            }
            ColMap::Split { zp, zn } => {
                primal[c] = zval[zp] - zval[zn];
                redcost[c] = d[zp];
            }
        }
    }
    let mut dual = vec![0.0; rows.len()];
    for ir in &irows {
        let y_int = match ir.rel {
            Rel::Le => -d[ir.slack.unwrap()],
            Rel::Ge => d[ir.slack.unwrap()],
            Rel::Eq => -d[ir.art.unwrap()],
        };
        let y = if ir.negated { -y_int } else { y_int };
        match ir.origin {
            Origin::RhsOf(i) | Origin::LhsOf(i) | Origin::EqOf(i) => dual[i] += y,
            Origin::BoundOf(_) => {}
        }
    }

    let mut col_status = Vec::with_capacity(cols.len());
    for c in 0..cols.len() {
        let st = match colmap[c] {
            ColMap::Shift { z } => {
                if is_basic[z] {
                    BasisStatus::Basic
                } else {
                    BasisStatus::AtLower
                }
            }
            ColMap::Neg { z } => {
                if is_basic[z] {
                    BasisStatus::Basic
                } else {
                    BasisStatus::AtUpper
                }
            }
            ColMap::Split { zp, zn } => {
                if is_basic[zp] || is_basic[zn] {
                    BasisStatus::Basic
                } else {
                    BasisStatus::AtLower
                }
            }
        };
        col_status.push(st);
    }
    let mut row_status = vec![BasisStatus::Basic; rows.len()];
    for (i, row) in rows.iter().enumerate() {
        let mut status = if num::is_inf(row.rhs) {
            BasisStatus::AtLower
        } else {
            BasisStatus::AtUpper
        };
        let mut any_slack_basic = false;
        for ir in &irows {
            match ir.origin {
                Origin::RhsOf(k) if k == i => {
                    if is_basic[ir.slack.unwrap()] {
                        any_slack_basic = true;
                    } else {
                        status = BasisStatus::AtUpper;
                    }
                }
                Origin::LhsOf(k) if k == i => {
                    if is_basic[ir.slack.unwrap()] {
                        any_slack_basic = true;
                    } else {
                        status = BasisStatus::AtLower;
                    }
                }
                Origin::EqOf(k) if k == i => status = BasisStatus::AtLower,
                _ => {}
            }
        }
        // a range row is basic only if neither side is tight
        let tight = matches!(status, BasisStatus::AtLower | BasisStatus::AtUpper) && !slack_free(i, &irows, &is_basic);
        row_status[i] = if any_slack_basic && !tight { BasisStatus::Basic } else { status };
    }

    // keep the tableau for separator queries
    let mut tabvar: Vec<Option<(TabVar, bool)>> = vec![None; ntot];
    for (k, kind) in zkinds.iter().enumerate() {
        let (tv, integral) = match *kind {
            ZKind::Shift { col } => (TabVar::ColShift(col), cols[col].integral),
            ZKind::Neg { col } => (TabVar::ColNeg(col), cols[col].integral),
            ZKind::SplitPos { col } | ZKind::SplitNeg { col } => (TabVar::ColSplit(col), false),
        };
        tabvar[k] = Some((tv, integral));
    }
    for ir in &irows {
        if let Some(s) = ir.slack {
            let (tv, integral) = match ir.origin {
                Origin::RhsOf(i) => (TabVar::SlackRhs(i), rows[i].integral),
                Origin::LhsOf(i) => (TabVar::SlackLhs(i), rows[i].integral),
                Origin::BoundOf(c) => (TabVar::BoundSlack(c), cols[c].integral),
                Origin::EqOf(_) => unreachable!("equality rows carry no slack"),
            };
            tabvar[s] = Some((tv, integral));
        }
    }
    let z_of_col = colmap
        .iter()
        .map(|cm| match cm {
            ColMap::Shift { z } | ColMap::Neg { z } => Some(*z),
            ColMap::Split { .. } => None,
        })
        .collect();
    *keep = Some(SolveState {
        a,
        b,
        basis,
        is_basic,
        tabvar,
        z_of_col,
        optimal: true,
    });

    Ok(LpOutcome {
        status: LpStatus::Optimal,
        sol: Some(LpSolution {
            objval: z_obj + const_shift,
            primal,
            redcost,
            dual,
        }),
        basis: Some(Basis {
            cols: col_status,
            rows: row_status,
        }),
        primal_ray: None,
        farkas: None,
        iterations,
    })
}

/// True if every side-row of engine row `i` has its slack basic.
fn slack_free(i: usize, irows: &[IRow], is_basic: &[bool]) -> bool {
    irows
        .iter()
        .filter(|ir| matches!(ir.origin, Origin::RhsOf(k) | Origin::LhsOf(k) if k == i))
        .all(|ir| ir.slack.map(|s| is_basic[s]).unwrap_or(false))
}

fn not_solved(status: LpStatus, iterations: u64) -> LpOutcome {
    LpOutcome {
        status,
        sol: None,
        basis: None,
        primal_ray: None,
        farkas: None,
        iterations,
    }
}

/// Runs Bland-rule pivoting until optimality, unboundedness or the iteration
/// cap. Returns the entering column on unboundedness.
#[allow(clippy::too_many_arguments)]
fn pivot_loop(
    a: &mut [Vec<Real>],
    b: &mut [Real],
    d: &mut [Real],
    z_obj: &mut Real,
    basis: &mut [usize],
    is_artificial: &[bool],
    iterations: &mut u64,
    max_iters: u64,
) -> Option<usize> {
    let ntot = d.len();
    let m = b.len();
    loop {
        if *iterations >= max_iters {
            return None;
        }
        // Bland: the smallest eligible index with a negative reduced cost
        let Some(j) = (0..ntot).find(|&j| !is_artificial[j] && d[j] < -COST_TOL) else {
            return None; // optimal
        };
        // ratio test, ties broken by the smallest basic variable index
        let mut best: Option<(Real, usize, usize)> = None; // (ratio, basic var, row)
        for r in 0..m {
            if a[r][j] > PIVOT_TOL {
                let ratio = b[r] / a[r][j];
                let key = (ratio, basis[r]);
                match best {
                    Some((br, bv, _)) if (br, bv) <= key => {}
                    _ => best = Some((ratio, basis[r], r)),
                }
            }
        }
        let Some((_, _, r)) = best else {
            return Some(j); // unbounded
        };
        pivot(a, b, d, z_obj, basis, r, j);
        *iterations += 1;
    }
}

fn pivot(
    a: &mut [Vec<Real>],
    b: &mut [Real],
    d: &mut [Real],
    z_obj: &mut Real,
    basis: &mut [usize],
    r: usize,
    j: usize,
) {
    let m = b.len();
    let ntot = d.len();
    let piv = a[r][j];
    debug_assert!(piv.abs() > PIVOT_TOL);
    for k in 0..ntot {
        a[r][k] /= piv;
    }
    b[r] /= piv;
    a[r][j] = 1.0; // guard against roundoff on the pivot element
    for rr in 0..m {
        if rr == r {
            continue;
        }
        let f = a[rr][j];
        if f.abs() > PIVOT_TOL {
            let (row_r, row_rr) = if r < rr {
                let (lo, hi) = a.split_at_mut(rr);
                (&lo[r], &mut hi[0])
            } else {
                let (lo, hi) = a.split_at_mut(r);
                (&hi[0], &mut lo[rr])
            };
            for k in 0..ntot {
                row_rr[k] -= f * row_r[k];
            }
            row_rr[j] = 0.0;
            b[rr] -= f * b[r];
        } else if f != 0.0 {
            a[rr][j] = 0.0;
        }
    }
    let f = d[j];
    if f != 0.0 {
        for k in 0..ntot {
            d[k] -= f * a[r][k];
        }
        d[j] = 0.0;
        *z_obj += f * b[r];
    }
    basis[r] = j;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{VarId, INF};

    fn col(i: usize, lb: Real, ub: Real, obj: Real) -> LpCol {
        LpCol {
            var: VarId::new(i),
            lb,
            ub,
            obj,
            integral: false,
        }
    }

    fn row(coefs: &[(usize, Real)], lhs: Real, rhs: Real) -> LpRow {
        LpRow {
            name: "r".into(),
            coefs: coefs.to_vec(),
            lhs,
            rhs,
            local: false,
            integral: false,
        }
    }

    fn solve(cols: &[LpCol], rows: &[LpRow]) -> LpOutcome {
        SimplexBackend::new().solve(cols, rows, None).unwrap()
    }

    #[test]
    fn test_bounds_only() {
        // min -x  with  x in [0, 1]
        let out = solve(&[col(0, 0.0, 1.0, -1.0)], &[]);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.objval - -1.0).abs() < 1e-9);
        assert!((sol.primal[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unbounded_with_ray() {
        // min -x  with  x >= 0, no rows
        let out = solve(&[col(0, 0.0, INF, -1.0)], &[]);
        assert_eq!(out.status, LpStatus::Unbounded);
        let ray = out.primal_ray.unwrap();
        assert!(ray[0] > 0.5);
    }

    #[test]
    fn test_infeasible_with_farkas() {
        // x in [0, 1], x >= 2
        let out = solve(&[col(0, 0.0, 1.0, 0.0)], &[row(&[(0, 1.0)], 2.0, INF)]);
        assert_eq!(out.status, LpStatus::Infeasible);
        let farkas = out.farkas.unwrap();
        assert!(farkas[0].abs() > 1e-9);
    }

    #[test]
    fn test_two_variable_corner() {
        // min -x - y  s.t.  x + 2y <= 3, x <= 2, x,y >= 0
        let cols = [col(0, 0.0, 2.0, -1.0), col(1, 0.0, INF, -1.0)];
        let rows = [row(&[(0, 1.0), (1, 2.0)], -INF, 3.0)];
        let out = solve(&cols, &rows);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.primal[0] - 2.0).abs() < 1e-9);
        assert!((sol.primal[1] - 0.5).abs() < 1e-9);
        assert!((sol.objval - -2.5).abs() < 1e-9);
    }

    #[test]
    fn test_equality_row() {
        // min x  s.t.  x + y = 1, x,y in [0, 1]
        let cols = [col(0, 0.0, 1.0, 1.0), col(1, 0.0, 1.0, 0.0)];
        let rows = [row(&[(0, 1.0), (1, 1.0)], 1.0, 1.0)];
        let out = solve(&cols, &rows);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!(sol.primal[0].abs() < 1e-9);
        assert!((sol.primal[1] - 1.0).abs() < 1e-9);
        assert!(sol.objval.abs() < 1e-9);
    }

    #[test]
    fn test_duals_and_reduced_costs() {
        // min x  s.t.  x >= 2, x in [0, 10]: dual of the row is 1
        let out = solve(&[col(0, 0.0, 10.0, 1.0)], &[row(&[(0, 1.0)], 2.0, INF)]);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.primal[0] - 2.0).abs() < 1e-9);
        assert!((sol.objval - 2.0).abs() < 1e-9);
        assert!((sol.dual[0] - 1.0).abs() < 1e-9);
        assert!(sol.redcost[0].abs() < 1e-9);
    }

    #[test]
    fn test_free_variable_split() {
        // min x  s.t.  x >= -5 via row (x free)
        let out = solve(&[col(0, -INF, INF, 1.0)], &[row(&[(0, 1.0)], -5.0, INF)]);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.primal[0] - -5.0).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_vertex_and_tableau() {
        // min -x - y  s.t.  4x + y <= 6, x + 4y <= 6, x,y in [0, 6]
        // optimum at x = y = 6/5
        let cols = [
            LpCol {
                var: VarId::new(0),
                lb: 0.0,
                ub: 6.0,
                obj: -1.0,
                integral: true,
            },
            LpCol {
                var: VarId::new(1),
                lb: 0.0,
                ub: 6.0,
                obj: -1.0,
                integral: true,
            },
        ];
        let mut r1 = row(&[(0, 4.0), (1, 1.0)], -INF, 6.0);
        r1.integral = true;
        let mut r2 = row(&[(0, 1.0), (1, 4.0)], -INF, 6.0);
        r2.integral = true;
        let mut backend = SimplexBackend::new();
        let out = backend.solve(&cols, &[r1, r2], None).unwrap();
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.primal[0] - 1.2).abs() < 1e-9);
        assert!((sol.primal[1] - 1.2).abs() < 1e-9);

        // both columns are basic; their tableau rows must expand to the
        // current basic value and reference only integral entities
        for c in 0..2 {
            let tab = backend.tableau_row(c).expect("basic column");
            assert!((tab.value - 1.2).abs() < 1e-9);
            assert!(!tab.entries.is_empty());
            for e in &tab.entries {
                assert!(e.integral);
            }
        }
        assert!(backend.tableau_row(5).is_none());
    }

    #[test]
    fn test_empty_problem() {
        let out = solve(&[], &[]);
        assert_eq!(out.status, LpStatus::Optimal);
        assert!(out.sol.unwrap().objval.abs() < 1e-12);
    }

    #[test]
    fn test_fixed_column() {
        // min x with x fixed to 3 by its bounds, plus a redundant row
        let out = solve(&[col(0, 3.0, 3.0, 1.0)], &[row(&[(0, 1.0)], -INF, 10.0)]);
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.sol.unwrap();
        assert!((sol.primal[0] - 3.0).abs() < 1e-9);
        assert!((sol.objval - 3.0).abs() < 1e-9);
    }
}
