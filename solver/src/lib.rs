//! A constraint integer programming kernel.
//!
//! The engine solves problems of the form `min c^T x` subject to general
//! constraints interpreted by pluggable constraint handlers, with integrality
//! requirements on a subset of the variables. Search is branch-and-bound over
//! an LP relaxation, with constraint propagation, cutting plane separation,
//! primal heuristics and conflict learning; every one of those concerns is a
//! plugin kind that external code can extend.
//!
//! ## Example
//!
//! ```no_run
//! use sylva::core::VarKind;
//! use sylva::search::{Solver, Status};
//!
//! fn main() -> sylva::err::Result<()> {
//!     let mut solver = Solver::new()?;
//!     let x = solver.add_var("x", VarKind::Binary, 0.0, 1.0, 1.0)?;
//!     let y = solver.add_var("y", VarKind::Binary, 0.0, 1.0, 1.0)?;
//!     solver.add_linear_cons("cover", [(x, 1.0), (y, 1.0)], 1.0, sylva::core::INF)?;
//!     assert_eq!(solver.solve()?, Status::Optimal);
//!     println!("optimum: {}", solver.primal_bound());
//!     Ok(())
//! }
//! ```

pub mod backtrack;
pub mod cons;
pub mod core;
pub mod err;
pub mod lp;
pub mod params;
pub mod plugins;
pub mod prob;
pub mod search;
pub mod sol;
pub mod tree;

pub use err::{Result, SolverError};
pub use search::{Solver, Status};
