//! File reader plugins and the plain-text problem format.
//!
//! The built-in reader handles `.cip` files:
//!
//! ```text
//! # knapsack toy
//! maximize
//! var x binary obj 3
//! var y integer 0 10 obj 1
//! var z continuous 0 inf
//! con cap: 2 x + 1 y <= 8
//! con link: 1 y - 1 z = 0
//! ```
//!
//! Variable kinds are `binary` (default bounds `[0, 1]`), `integer`,
//! `implint` and `continuous`; bounds accept `inf` and `-inf`; the objective
//! coefficient defaults to zero.

use crate::cons::linear::LinearCons;
use crate::cons::{ConshdlrSet, ConsStore};
use crate::core::{Real, VarId, VarKind, INF};
use crate::err::{Result, SolverError};
use crate::plugins::Registry;
use crate::prob::{ObjSense, Problem};
use std::fmt::Write as _;
use std::path::Path;

pub trait Reader {
    /// The file extension (without dot) this reader is registered for.
    fn extension(&self) -> &'static str;

    fn desc(&self) -> &'static str {
        ""
    }

    fn read(&mut self, path: &Path, prob: &mut Problem, hdlrs: &ConshdlrSet) -> Result<()>;

    fn write(&mut self, _path: &Path, _prob: &Problem) -> Result<()> {
        Err(SolverError::NotImplemented {
            op: "write problem",
            plugin: "reader",
        })
    }

    /// Copy for spawning subordinate engines; `None` marks the reader as
    /// non-cloneable.
    fn clone_box(&self) -> Option<Box<dyn Reader>> {
        None
    }
}

/// Dispatches to the reader registered for the file's extension.
pub fn read_problem(
    readers: &mut Registry<dyn Reader>,
    path: &Path,
    prob: &mut Problem,
    hdlrs: &ConshdlrSet,
) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let idx = (0..readers.len())
        .find(|&i| readers.get(i).extension() == ext)
        .ok_or_else(|| SolverError::PluginNotFound {
            op: "read problem",
            name: format!("reader for extension `{ext}`"),
        })?;
    readers.get_mut(idx).read(path, prob, hdlrs)
}

#[derive(Default)]
pub struct CipReader;

impl CipReader {
    pub fn new() -> Self {
        CipReader
    }
}

const OP: &str = "read problem";

fn parse_bound(tok: &str, line: usize) -> Result<Real> {
    match tok {
        "inf" | "+inf" => Ok(INF),
        "-inf" => Ok(-INF),
        _ => tok
            .parse::<Real>()
            .map_err(|_| SolverError::parse(OP, line, format!("invalid bound `{tok}`"))),
    }
}

/// Parses a linear expression like `1 x + 2.5 y - z` into terms.
fn parse_terms(tokens: &[&str], prob: &Problem, line: usize) -> Result<Vec<(VarId, Real)>> {
    let mut terms = Vec::new();
    let mut sign = 1.0;
    let mut coef: Option<Real> = None;
    for &tok in tokens {
        match tok {
            "+" => {}
            "-" => sign = -sign,
            _ => {
                if let Ok(num) = tok.parse::<Real>() {
                    if coef.is_some() {
                        return Err(SolverError::parse(OP, line, format!("unexpected number `{tok}`")));
                    }
                    coef = Some(num);
                } else {
                    let var = prob
                        .find_var(tok)
                        .ok_or_else(|| SolverError::parse(OP, line, format!("unknown variable `{tok}`")))?;
                    terms.push((var, sign * coef.take().unwrap_or(1.0)));
                    sign = 1.0;
                }
            }
        }
    }
    if coef.is_some() {
        return Err(SolverError::parse(OP, line, "dangling coefficient"));
    }
    if terms.is_empty() {
        return Err(SolverError::parse(OP, line, "empty expression"));
    }
    Ok(terms)
}

fn parse_var_line(tokens: &[&str], prob: &mut Problem, line: usize) -> Result<()> {
    // var <name> <kind> [<lb> <ub>] [obj <coef>]
    let (&name, rest) = tokens
        .split_first()
        .ok_or_else(|| SolverError::parse(OP, line, "missing variable name"))?;
    let (&kind_tok, mut rest) = rest
        .split_first()
        .ok_or_else(|| SolverError::parse(OP, line, "missing variable kind"))?;
    let kind = match kind_tok {
        "binary" => VarKind::Binary,
        "integer" => VarKind::Integer,
        "implint" => VarKind::ImplInt,
        "continuous" => VarKind::Continuous,
        other => {
            return Err(SolverError::parse(OP, line, format!("unknown kind `{other}`")));
        }
    };
    let (mut lb, mut ub) = match kind {
        VarKind::Binary => (0.0, 1.0),
        _ => (0.0, INF),
    };
    if !rest.is_empty() && rest[0] != "obj" {
        if rest.len() < 2 {
            return Err(SolverError::parse(OP, line, "expected lower and upper bound"));
        }
        lb = parse_bound(rest[0], line)?;
        ub = parse_bound(rest[1], line)?;
        rest = &rest[2..];
    }
    let obj = match rest {
        [] => 0.0,
        ["obj", val] => val
            .parse::<Real>()
            .map_err(|_| SolverError::parse(OP, line, format!("invalid objective `{val}`")))?,
        _ => return Err(SolverError::parse(OP, line, "trailing tokens on var line")),
    };
    prob.add_var(name, kind, lb, ub, obj)
        .map_err(|e| SolverError::parse(OP, line, e.to_string()))?;
    Ok(())
}

fn parse_con_line(tokens: &[&str], prob: &mut Problem, hdlr: usize, line: usize) -> Result<()> {
    // con <name>: <terms> <=|>=|= <number>
    let (&name, rest) = tokens
        .split_first()
        .ok_or_else(|| SolverError::parse(OP, line, "missing constraint name"))?;
    let name = name.strip_suffix(':').unwrap_or(name);
    let rel_pos = rest
        .iter()
        .position(|&t| matches!(t, "<=" | ">=" | "=" | "=="))
        .ok_or_else(|| SolverError::parse(OP, line, "missing relation"))?;
    let terms = parse_terms(&rest[..rel_pos], prob, line)?;
    let rhs_tok = rest
        .get(rel_pos + 1)
        .ok_or_else(|| SolverError::parse(OP, line, "missing right-hand side"))?;
    let rhs: Real = rhs_tok
        .parse()
        .map_err(|_| SolverError::parse(OP, line, format!("invalid right-hand side `{rhs_tok}`")))?;
    let (lhs, rhs) = match rest[rel_pos] {
        "<=" => (-INF, rhs),
        ">=" => (rhs, INF),
        _ => (rhs, rhs),
    };
    prob.add_cons(
        name,
        hdlr,
        Box::new(LinearCons::new(terms, lhs, rhs)),
        Default::default(),
    );
    Ok(())
}

impl Reader for CipReader {
    fn extension(&self) -> &'static str {
        "cip"
    }

    fn desc(&self) -> &'static str {
        "plain text constraint integer programs"
    }

    fn clone_box(&self) -> Option<Box<dyn Reader>> {
        Some(Box::new(CipReader))
    }

    fn read(&mut self, path: &Path, prob: &mut Problem, hdlrs: &ConshdlrSet) -> Result<()> {
        let linear = hdlrs.find("linear").ok_or(SolverError::PluginNotFound {
            op: OP,
            name: "linear".into(),
        })?;
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SolverError::NoFile {
                op: OP,
                path: path.into(),
            },
            _ => SolverError::ReadError {
                op: OP,
                path: path.into(),
            },
        })?;
        prob.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
        for (lineno, raw) in content.lines().enumerate() {
            let lineno = lineno + 1;
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = text.split_whitespace().collect();
            match tokens[0] {
                "minimize" => prob.objsense = ObjSense::Minimize,
                "maximize" => prob.objsense = ObjSense::Maximize,
                "offset" => {
                    let val = tokens
                        .get(1)
                        .and_then(|t| t.parse::<Real>().ok())
                        .ok_or_else(|| SolverError::parse(OP, lineno, "invalid offset"))?;
                    prob.obj_offset = val;
                }
                "var" => parse_var_line(&tokens[1..], prob, lineno)?,
                "con" => parse_con_line(&tokens[1..], prob, linear, lineno)?,
                other => {
                    return Err(SolverError::parse(
                        OP,
                        lineno,
                        format!("unknown directive `{other}`"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, path: &Path, prob: &Problem) -> Result<()> {
        let mut out = String::new();
        let sense = match prob.objsense {
            ObjSense::Minimize => "minimize",
            ObjSense::Maximize => "maximize",
        };
        let _ = writeln!(out, "# problem {}", prob.name);
        let _ = writeln!(out, "{sense}");
        if prob.obj_offset != 0.0 {
            let _ = writeln!(out, "offset {}", prob.obj_offset);
        }
        for v in prob.vars.ids().take(prob.vars.n_original()) {
            let var = prob.vars.var(v);
            let kind = match var.kind {
                VarKind::Binary => "binary",
                VarKind::Integer => "integer",
                VarKind::ImplInt => "implint",
                VarKind::Continuous => "continuous",
            };
            let fmt_bound = |b: Real| {
                if b >= INF {
                    "inf".to_string()
                } else if b <= -INF {
                    "-inf".to_string()
                } else {
                    format!("{b}")
                }
            };
            let _ = write!(
                out,
                "var {} {kind} {} {}",
                var.name,
                fmt_bound(var.global.lb),
                fmt_bound(var.global.ub)
            );
            if var.obj != 0.0 {
                let _ = write!(out, " obj {}", var.obj);
            }
            let _ = writeln!(out);
        }
        for &c in prob.original_conss() {
            write_cons(&mut out, &prob.conss, c, &prob.vars)?;
        }
        std::fs::write(path, out).map_err(|_| SolverError::WriteError {
            op: "write problem",
            path: path.into(),
        })
    }
}

fn write_cons(
    out: &mut String,
    conss: &ConsStore,
    id: crate::cons::ConsId,
    vars: &crate::core::VarStore,
) -> Result<()> {
    let Some(data) = conss.data(id).downcast_ref::<LinearCons>() else {
        return Err(SolverError::NotImplemented {
            op: "write problem",
            plugin: "cip".into(),
        });
    };
    let _ = write!(out, "con {}:", conss.cons(id).name);
    for (i, &(v, a)) in data.terms.iter().enumerate() {
        let (sign, mag) = if a < 0.0 { ("-", -a) } else if i == 0 { ("", a) } else { ("+", a) };
        let _ = write!(out, " {sign}{mag} {}", vars.var(v).name);
    }
    if data.lhs == data.rhs {
        let _ = writeln!(out, " = {}", data.rhs);
    } else if data.lhs <= -INF {
        let _ = writeln!(out, " <= {}", data.rhs);
    } else {
        let _ = writeln!(out, " >= {}", data.lhs);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn read_text(text: &str) -> Result<Problem> {
        let dir = std::env::temp_dir().join("sylva_reader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join(format!("t{}.cip", text.len()));
        std::fs::write(&file, text).unwrap();
        let mut hdlrs = ConshdlrSet::new();
        hdlrs
            .register(Box::new(crate::cons::linear::LinearConshdlr::new()))
            .unwrap();
        let mut prob = Problem::new("test");
        let res = CipReader::new().read(&file, &mut prob, &hdlrs);
        std::fs::remove_file(&file).unwrap();
        res.map(|_| prob)
    }

    #[test]
    fn test_read_small_model() {
        let prob = read_text(
            "# toy\nmaximize\nvar x binary obj 3\nvar y integer 0 10 obj 1\ncon cap: 2 x + 1 y <= 8\n",
        )
        .unwrap();
        assert_eq!(prob.objsense, ObjSense::Maximize);
        assert_eq!(prob.n_vars(), 2);
        assert_eq!(prob.n_conss(), 1);
        let x = prob.find_var("x").unwrap();
        assert_eq!(prob.vars.var(x).obj, 3.0);
        let c = prob.original_conss()[0];
        let data = prob.conss.data(c).downcast_ref::<LinearCons>().unwrap();
        assert_eq!(data.rhs, 8.0);
        assert_eq!(data.terms.len(), 2);
    }

    #[test]
    fn test_signs_and_defaults() {
        let prob = read_text("var x continuous -inf inf\nvar y binary\ncon c: - x + y >= 0\n").unwrap();
        let x = prob.find_var("x").unwrap();
        assert!(prob.vars.var(x).global.lb <= -INF);
        let c = prob.original_conss()[0];
        let data = prob.conss.data(c).downcast_ref::<LinearCons>().unwrap();
        assert_eq!(data.terms[0].1, -1.0);
        assert_eq!(data.lhs, 0.0);
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = read_text("var x binary\ncon c: 1 q <= 2\n").unwrap_err();
        match err {
            SolverError::ParseError { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
