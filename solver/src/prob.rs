//! The problem under construction: original variables and constraints.

use crate::cons::{ConsFlags, ConsId, ConsStore};
use crate::core::{Real, VarId, VarKind, VarStore};
use crate::err::{Result, SolverError};
use hashbrown::HashMap;
use std::any::Any;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

/// The original problem space: variables, constraints, objective sense and
/// offset. The transformed counterpart is derived once solving starts.
pub struct Problem {
    pub name: String,
    pub objsense: ObjSense,
    pub obj_offset: Real,
    pub vars: VarStore,
    pub conss: ConsStore,
    by_var_name: HashMap<String, VarId>,
    original_conss: Vec<ConsId>,
}

impl Problem {
    pub fn new(name: impl Into<String>) -> Problem {
        Problem {
            name: name.into(),
            objsense: ObjSense::Minimize,
            obj_offset: 0.0,
            vars: VarStore::new(),
            conss: ConsStore::new(),
            by_var_name: HashMap::new(),
            original_conss: Vec::new(),
        }
    }

    pub fn add_var(
        &mut self,
        name: &str,
        kind: VarKind,
        lb: Real,
        ub: Real,
        obj: Real,
    ) -> Result<VarId> {
        if self.by_var_name.contains_key(name) {
            return Err(SolverError::invalid_data(
                "add variable",
                format!("variable `{name}` already exists"),
            ));
        }
        let id = self.vars.add_original(name, kind, lb, ub, obj)?;
        self.by_var_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.by_var_name.get(name).copied()
    }

    /// Adds an original constraint interpreted by the handler with index
    /// `hdlr` in the engine's handler set.
    pub fn add_cons(
        &mut self,
        name: impl Into<String>,
        hdlr: usize,
        data: Box<dyn Any>,
        flags: ConsFlags,
    ) -> ConsId {
        let id = self.conss.add(name, hdlr, data, flags, true, None);
        self.original_conss.push(id);
        id
    }

    pub fn original_conss(&self) -> &[ConsId] {
        &self.original_conss
    }

    pub fn n_vars(&self) -> usize {
        self.vars.n_original()
    }

    pub fn n_conss(&self) -> usize {
        self.original_conss.len()
    }
}
