//! Separator plugins, cut scoring and the Gomory fractional cut.

use crate::cons::SepaOutcome;
use crate::core::{num, DomainStore, Real, VarId, VarStore, EPS, INF};
use crate::err::Result;
use crate::lp::{Lp, LpStatus, TabVar};
use crate::params::ParamStore;
use hashbrown::HashMap;

/// A cutting plane over (transformed) variables.
#[derive(Clone, Debug)]
pub struct Cut {
    pub name: String,
    pub coefs: Vec<(VarId, Real)>,
    pub lhs: Real,
    pub rhs: Real,
    /// Local cuts are only valid in the subtree they were separated in;
    /// global cuts additionally enter the persistent pool.
    pub local: bool,
}

impl Cut {
    /// Violation of the cut at the given point (positive if separated).
    pub fn violation(&self, value: &dyn Fn(VarId) -> Real) -> Real {
        let act: Real = self.coefs.iter().map(|&(v, a)| a * value(v)).sum();
        let mut viol: Real = 0.0;
        if !num::is_neg_inf(self.lhs) {
            viol = viol.max(self.lhs - act);
        }
        if !num::is_inf(self.rhs) {
            viol = viol.max(act - self.rhs);
        }
        viol
    }

    fn norm(&self) -> Real {
        self.coefs.iter().map(|&(_, a)| a * a).sum::<Real>().sqrt()
    }
}

#[derive(Clone, Debug)]
pub struct ScoredCut {
    pub cut: Cut,
    pub violation: Real,
    /// `violation / norm`, the selection key.
    pub score: Real,
}

/// Tries to scale the cut coefficients to integral values with a small
/// multiplier. Returns true on success.
pub fn scale_to_integral(cut: &mut Cut, max_scale: u32) -> bool {
    for k in 1..=max_scale {
        let k = k as Real;
        let fits = cut
            .coefs
            .iter()
            .all(|&(_, a)| num::integral(a * k) && (a * k).abs() < 1e9);
        if !fits {
            continue;
        }
        for (_, a) in cut.coefs.iter_mut() {
            *a = (*a * k).round();
        }
        if !num::is_neg_inf(cut.lhs) {
            cut.lhs *= k;
        }
        if !num::is_inf(cut.rhs) {
            cut.rhs *= k;
        }
        return true;
    }
    false
}

/// Context handed to separation callbacks; collects efficacious cuts.
pub struct SepaCtx<'a> {
    pub vars: &'a VarStore,
    pub dom: &'a DomainStore,
    pub lp: &'a Lp,
    pub at_root: bool,
    pub params: &'a ParamStore,
    /// Minimal `violation / norm` for a cut to be accepted.
    pub min_efficacy: Real,
    scale_integral: bool,
    drop_nonintegral: bool,
    max_cuts: usize,
    cuts: Vec<ScoredCut>,
}

impl<'a> SepaCtx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vars: &'a VarStore,
        dom: &'a DomainStore,
        lp: &'a Lp,
        at_root: bool,
        params: &'a ParamStore,
        min_efficacy: Real,
        scale_integral: bool,
        drop_nonintegral: bool,
        max_cuts: usize,
    ) -> Self {
        SepaCtx {
            vars,
            dom,
            lp,
            at_root,
            params,
            min_efficacy,
            scale_integral,
            drop_nonintegral,
            max_cuts,
            cuts: Vec::new(),
        }
    }

    pub fn ncuts(&self) -> usize {
        self.cuts.len()
    }

    /// True while the per-round cut quota is not exhausted.
    pub fn room(&self) -> bool {
        self.cuts.len() < self.max_cuts
    }

    /// Scores the cut against the current LP solution and keeps it if it is
    /// efficacious. Returns true if the cut was accepted.
    pub fn add_cut(&mut self, mut cut: Cut) -> bool {
        if !self.room() {
            return false;
        }
        let value = |v: VarId| self.lp.value_of(v).unwrap_or_else(|| self.dom.lb(v));
        let violation = cut.violation(&value);
        let norm = cut.norm();
        if norm <= EPS {
            return false;
        }
        let score = violation / norm;
        if score < self.min_efficacy {
            return false;
        }
        if self.scale_integral {
            let scaled = scale_to_integral(&mut cut, 64);
            if !scaled && self.drop_nonintegral {
                return false;
            }
        }
        self.cuts.push(ScoredCut { cut, violation, score });
        true
    }

    pub fn into_cuts(self) -> Vec<ScoredCut> {
        self.cuts
    }
}

pub trait Separator {
    fn name(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn default_priority(&self) -> i32 {
        0
    }

    fn default_maxrounds(&self) -> i32 {
        5
    }

    fn default_maxrounds_root(&self) -> i32 {
        10
    }

    fn default_maxsepacuts(&self) -> i32 {
        50
    }

    fn default_maxsepacuts_root(&self) -> i32 {
        200
    }

    /// Registers separator-specific parameters; called at registration after
    /// the standard round and cut limits.
    fn register_params(&self, _params: &mut ParamStore) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut SepaCtx) -> Result<SepaOutcome>;

    /// Copy for spawning subordinate engines; `None` marks the separator as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Separator>> {
        None
    }
}

/// Gomory fractional cuts, read off the optimal simplex tableau.
///
/// For a basic integer column with fractional value, the tableau row
/// `x_B = b - sum a_j e_j` over nonnegative integral entities `e_j` yields the
/// valid inequality `sum frac(a_j) e_j >= frac(b)`, which is expanded back to
/// the engine's variable space. Rows containing a non-integral entity are
/// skipped.
#[derive(Default)]
pub struct GomorySep {
    ngenerated: u64,
}

impl GomorySep {
    pub fn new() -> Self {
        GomorySep::default()
    }
}

impl Separator for GomorySep {
    fn name(&self) -> &'static str {
        "gomory"
    }

    fn desc(&self) -> &'static str {
        "Gomory fractional cuts from the simplex tableau"
    }

    fn default_priority(&self) -> i32 {
        -1000
    }

    fn register_params(&self, params: &mut ParamStore) -> Result<()> {
        params.add_real(
            "separating/gomory/away",
            "minimal fractionality of a cut source row",
            0.01,
            0.0,
            0.5,
        )
    }

    fn clone_box(&self) -> Option<Box<dyn Separator>> {
        Some(Box::new(GomorySep::new()))
    }

    fn execute(&mut self, ctx: &mut SepaCtx) -> Result<SepaOutcome> {
        if ctx.lp.status() != LpStatus::Optimal {
            return Ok(SepaOutcome::DidNotRun);
        }
        let primal = match ctx.lp.solution() {
            Some(sol) => sol.primal.clone(),
            None => return Ok(SepaOutcome::DidNotRun),
        };
        let away = ctx.params.get_real("separating/gomory/away").unwrap_or(0.01);
        let mut added = 0usize;
        for c in 0..ctx.lp.ncols() {
            if !ctx.lp.col(c).integral {
                continue;
            }
            let f0 = num::frac(primal[c]);
            if f0 < away || f0 > 1.0 - away {
                continue;
            }
            let Some(tab) = ctx.lp.tableau_row(c) else {
                continue;
            };
            let Some(cut) = self.derive_cut(ctx, f0, &tab) else {
                continue;
            };
            if ctx.add_cut(cut) {
                added += 1;
                self.ngenerated += 1;
            }
            if !ctx.room() {
                break;
            }
        }
        Ok(if added > 0 {
            SepaOutcome::Separated
        } else {
            SepaOutcome::NoCuts
        })
    }
}

impl GomorySep {
    fn derive_cut(&self, ctx: &SepaCtx, f0: Real, tab: &crate::lp::TableauRow) -> Option<Cut> {
        let lp = ctx.lp;
        // accumulate  sum coefs * x  >=  bound
        let mut coefs: HashMap<usize, Real> = HashMap::new();
        let mut bound = f0;
        for e in &tab.entries {
            let f = num::frac(e.coef);
            if f <= 1e-9 || f >= 1.0 - 1e-9 {
                continue; // integral coefficient, no contribution
            }
            if !e.integral {
                return None;
            }
            match e.entity {
                TabVar::ColShift(j) => {
                    // e = x_j - lb_j
                    *coefs.entry(j).or_insert(0.0) += f;
                    bound += f * lp.col(j).lb;
                }
                TabVar::ColNeg(j) | TabVar::BoundSlack(j) => {
                    // e = ub_j - x_j
                    *coefs.entry(j).or_insert(0.0) -= f;
                    bound -= f * lp.col(j).ub;
                }
                TabVar::SlackRhs(r) => {
                    // e = rhs - a^T x
                    let row = lp.row(r);
                    for &(j, a) in &row.coefs {
                        *coefs.entry(j).or_insert(0.0) -= f * a;
                    }
                    bound -= f * row.rhs;
                }
                TabVar::SlackLhs(r) => {
                    // e = a^T x - lhs
                    let row = lp.row(r);
                    for &(j, a) in &row.coefs {
                        *coefs.entry(j).or_insert(0.0) += f * a;
                    }
                    bound += f * row.lhs;
                }
                TabVar::ColSplit(_) => return None,
            }
        }
        let mut cut_coefs: Vec<(VarId, Real)> = coefs
            .into_iter()
            .filter(|&(_, a)| a.abs() > EPS)
            .map(|(j, a)| (lp.col(j).var, a))
            .collect();
        if cut_coefs.is_empty() {
            return None;
        }
        cut_coefs.sort_by_key(|&(v, _)| v);
        Some(Cut {
            name: format!("gomory_{}", self.ngenerated),
            coefs: cut_coefs,
            lhs: bound,
            rhs: INF,
            local: !ctx.at_root,
        })
    }

    pub fn generated(&self) -> u64 {
        self.ngenerated
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Domain, VarKind};
    use crate::lp::simplex::SimplexBackend;
    use crate::lp::{LpCol, LpRow};

    /// The classic fractional instance: max x + y s.t. 4x + y <= 6,
    /// x + 4y <= 6 over integers has LP optimum (1.2, 1.2); a Gomory cut must
    /// separate it.
    #[test]
    fn test_gomory_separates_fractional_vertex() {
        let mut vars = VarStore::new();
        let mut t = Vec::new();
        for i in 0..2 {
            let o = vars
                .add_original(format!("x{i}"), VarKind::Integer, 0.0, 6.0, -1.0)
                .unwrap();
            t.push(vars.transform_var(o, -1.0));
        }
        let mut dom = DomainStore::new();
        for v in vars.ids() {
            dom.register(v, Domain::new(0.0, 6.0), true);
        }
        let mut lp = Lp::new(Box::new(SimplexBackend::new()));
        for &v in &t {
            lp.add_col(LpCol {
                var: v,
                lb: 0.0,
                ub: 6.0,
                obj: -1.0,
                integral: true,
            });
        }
        let c0 = lp.col_of(t[0]).unwrap();
        let c1 = lp.col_of(t[1]).unwrap();
        lp.add_row(LpRow {
            name: "r1".into(),
            coefs: vec![(c0, 4.0), (c1, 1.0)],
            lhs: -INF,
            rhs: 6.0,
            local: false,
            integral: true,
        });
        lp.add_row(LpRow {
            name: "r2".into(),
            coefs: vec![(c0, 1.0), (c1, 4.0)],
            lhs: -INF,
            rhs: 6.0,
            local: false,
            integral: true,
        });
        assert_eq!(lp.solve().unwrap(), LpStatus::Optimal);

        let params = ParamStore::new();
        let mut ctx = SepaCtx::new(&vars, &dom, &lp, true, &params, 1e-4, false, false, 100);
        let mut gomory = GomorySep::new();
        let outcome = gomory.execute(&mut ctx).unwrap();
        assert_eq!(outcome, SepaOutcome::Separated);
        let cuts = ctx.into_cuts();
        assert!(!cuts.is_empty());
        for sc in &cuts {
            // the cut separates the LP optimum ...
            assert!(sc.violation > 1e-6);
            // ... and is satisfied by every integral feasible point
            for x in 0..=6i32 {
                for y in 0..=6i32 {
                    if 4 * x + y <= 6 && x + 4 * y <= 6 {
                        let value = |v: VarId| {
                            if v == t[0] {
                                x as Real
                            } else {
                                y as Real
                            }
                        };
                        assert!(
                            sc.cut.violation(&value) <= 1e-6,
                            "cut {} violated at integral point ({x}, {y})",
                            sc.cut.name
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_integral_scaling() {
        let mut cut = Cut {
            name: "c".into(),
            coefs: vec![(VarId::new(0), 0.5), (VarId::new(1), 0.25)],
            lhs: 0.75,
            rhs: INF,
            local: false,
        };
        assert!(scale_to_integral(&mut cut, 8));
        assert_eq!(cut.coefs[0].1, 2.0);
        assert_eq!(cut.coefs[1].1, 1.0);
        assert_eq!(cut.lhs, 3.0);

        let mut odd = Cut {
            name: "c".into(),
            coefs: vec![(VarId::new(0), std::f64::consts::PI)],
            lhs: 1.0,
            rhs: INF,
            local: false,
        };
        assert!(!scale_to_integral(&mut odd, 64));
    }
}
