//! The global parameter store: typed named parameters with domains, defaults,
//! change hooks and text-file persistence.
//!
//! Parameter names follow the hierarchical `section/subsection/name`
//! convention (e.g. `separating/gomory/maxroundsroot`); that naming is part
//! of the public contract.

mod io;

use crate::core::Real;
use crate::err::{Result, SolverError};
use hashbrown::HashMap;

/// The value of a parameter, tagged by kind.
#[derive(Clone, PartialEq, Debug)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    LongInt(i64),
    Real(Real),
    Char(char),
    Str(String),
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::LongInt(_) => "longint",
            ParamValue::Real(_) => "real",
            ParamValue::Char(_) => "char",
            ParamValue::Str(_) => "string",
        }
    }
}

/// Per-kind validity restriction of a parameter.
#[derive(Clone, Debug)]
enum Range {
    Free,
    Int { min: i32, max: i32 },
    LongInt { min: i64, max: i64 },
    Real { min: Real, max: Real },
    /// Allowed characters of a char parameter.
    Chars(String),
}

/// Hook run after a successful set, before the call returns. A failing hook
/// aborts the set call, but the new value is already stored; hooks should
/// only derive caches.
pub type ChangeHook = Box<dyn FnMut(&ParamValue) -> Result<()>>;

pub struct Param {
    name: String,
    desc: String,
    default: ParamValue,
    value: ParamValue,
    range: Range,
    hook: Option<ChangeHook>,
}

impl Param {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn default(&self) -> &ParamValue {
        &self.default
    }

    fn validate(&self, value: &ParamValue) -> bool {
        match (&self.range, value) {
            (Range::Free, _) => true,
            (Range::Int { min, max }, ParamValue::Int(v)) => min <= v && v <= max,
            (Range::LongInt { min, max }, ParamValue::LongInt(v)) => min <= v && v <= max,
            (Range::Real { min, max }, ParamValue::Real(v)) => *min <= *v && *v <= *max,
            (Range::Chars(allowed), ParamValue::Char(c)) => allowed.contains(*c),
            _ => true,
        }
    }
}

/// Typed named parameters, with O(1) lookup through a hash index.
#[derive(Default)]
pub struct ParamStore {
    params: Vec<Param>,
    index: HashMap<String, usize>,
}

impl ParamStore {
    pub fn new() -> Self {
        ParamStore::default()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn add(&mut self, name: String, desc: String, value: ParamValue, range: Range) -> Result<()> {
        if self.index.contains_key(&name) {
            return Err(SolverError::invalid_data(
                "add parameter",
                format!("parameter `{name}` already exists"),
            ));
        }
        self.index.insert(name.clone(), self.params.len());
        self.params.push(Param {
            name,
            desc,
            default: value.clone(),
            value,
            range,
            hook: None,
        });
        Ok(())
    }

    pub fn add_bool(&mut self, name: &str, desc: &str, default: bool) -> Result<()> {
        self.add(name.into(), desc.into(), ParamValue::Bool(default), Range::Free)
    }

    pub fn add_int(&mut self, name: &str, desc: &str, default: i32, min: i32, max: i32) -> Result<()> {
        self.add(
            name.into(),
            desc.into(),
            ParamValue::Int(default),
            Range::Int { min, max },
        )
    }

    pub fn add_longint(&mut self, name: &str, desc: &str, default: i64, min: i64, max: i64) -> Result<()> {
        self.add(
            name.into(),
            desc.into(),
            ParamValue::LongInt(default),
            Range::LongInt { min, max },
        )
    }

    pub fn add_real(&mut self, name: &str, desc: &str, default: Real, min: Real, max: Real) -> Result<()> {
        self.add(
            name.into(),
            desc.into(),
            ParamValue::Real(default),
            Range::Real { min, max },
        )
    }

    pub fn add_char(&mut self, name: &str, desc: &str, default: char, allowed: Option<&str>) -> Result<()> {
        let range = match allowed {
            Some(chars) => Range::Chars(chars.into()),
            None => Range::Free,
        };
        self.add(name.into(), desc.into(), ParamValue::Char(default), range)
    }

    pub fn add_string(&mut self, name: &str, desc: &str, default: &str) -> Result<()> {
        self.add(name.into(), desc.into(), ParamValue::Str(default.into()), Range::Free)
    }

    /// Installs a change hook on an existing parameter.
    pub fn set_hook(&mut self, name: &str, hook: ChangeHook) -> Result<()> {
        let i = self.lookup("set parameter hook", name)?;
        self.params[i].hook = Some(hook);
        Ok(())
    }

    fn lookup(&self, op: &'static str, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SolverError::ParamUnknown { op, name: name.into() })
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.params[self.lookup("get parameter", name)?].value {
            ParamValue::Bool(v) => Ok(v),
            _ => Err(self.wrong_type(name)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        match self.params[self.lookup("get parameter", name)?].value {
            ParamValue::Int(v) => Ok(v),
            _ => Err(self.wrong_type(name)),
        }
    }

    pub fn get_longint(&self, name: &str) -> Result<i64> {
        match self.params[self.lookup("get parameter", name)?].value {
            ParamValue::LongInt(v) => Ok(v),
            _ => Err(self.wrong_type(name)),
        }
    }

    pub fn get_real(&self, name: &str) -> Result<Real> {
        match self.params[self.lookup("get parameter", name)?].value {
            ParamValue::Real(v) => Ok(v),
            _ => Err(self.wrong_type(name)),
        }
    }

    pub fn get_char(&self, name: &str) -> Result<char> {
        match self.params[self.lookup("get parameter", name)?].value {
            ParamValue::Char(v) => Ok(v),
            _ => Err(self.wrong_type(name)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        match &self.params[self.lookup("get parameter", name)?].value {
            ParamValue::Str(v) => Ok(v.clone()),
            _ => Err(self.wrong_type(name)),
        }
    }

    fn wrong_type(&self, name: &str) -> SolverError {
        SolverError::ParamWrongType {
            op: "get parameter",
            name: name.into(),
        }
    }

    /// Sets the value of a parameter, validating it against the parameter's
    /// range. On success the change hook (if any) runs before returning; a
    /// hook error aborts the call with the new value already stored.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let i = self.lookup("set parameter", name)?;
        let param = &mut self.params[i];
        if param.value.kind_name() != value.kind_name() {
            return Err(SolverError::ParamWrongType {
                op: "set parameter",
                name: name.into(),
            });
        }
        if !param.validate(&value) {
            return Err(SolverError::ParamWrongValue {
                op: "set parameter",
                name: name.into(),
                value: io::format_value(&value),
            });
        }
        param.value = value;
        if let Some(hook) = &mut param.hook {
            let value = param.value.clone();
            hook(&value)?;
        }
        Ok(())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.set(name, ParamValue::Bool(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.set(name, ParamValue::Int(value))
    }

    pub fn set_longint(&mut self, name: &str, value: i64) -> Result<()> {
        self.set(name, ParamValue::LongInt(value))
    }

    pub fn set_real(&mut self, name: &str, value: Real) -> Result<()> {
        self.set(name, ParamValue::Real(value))
    }

    pub fn set_char(&mut self, name: &str, value: char) -> Result<()> {
        self.set(name, ParamValue::Char(value))
    }

    pub fn set_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.set(name, ParamValue::Str(value.into()))
    }

    /// Reads parameter assignments from a settings file. See [`mod@io`] for the
    /// grammar. Unknown parameters produce a warning on stderr and are
    /// skipped; malformed values abort with a line-numbered error.
    pub fn read_file(&mut self, path: &std::path::Path) -> Result<()> {
        io::read_file(self, path)
    }

    /// Writes every parameter as `name = value` lines.
    pub fn write_file(&self, path: &std::path::Path) -> Result<()> {
        io::write_file(self, path)
    }

    /// Parses `text` according to the parameter's kind and sets it.
    pub fn set_from_str(&mut self, name: &str, text: &str) -> Result<()> {
        let i = self.lookup("set parameter", name)?;
        let value = io::parse_value(&self.params[i].value, name, text)?;
        self.set(name, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn basic_store() -> ParamStore {
        let mut p = ParamStore::new();
        p.add_bool("display/verbose", "verbose output", false).unwrap();
        p.add_int("separating/maxrounds", "max separation rounds", 5, -1, i32::MAX)
            .unwrap();
        p.add_real("limits/time", "time limit in seconds", 1e20, 0.0, 1e20).unwrap();
        p.add_char("branching/direction", "preferred direction", 'a', Some("adu"))
            .unwrap();
        p.add_string("problem/name", "problem name", "").unwrap();
        p
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut p = basic_store();
        p.set_int("separating/maxrounds", -1).unwrap();
        assert_eq!(p.get_int("separating/maxrounds").unwrap(), -1);
        p.set_char("branching/direction", 'u').unwrap();
        assert_eq!(p.get_char("branching/direction").unwrap(), 'u');
    }

    #[test]
    fn test_invalid_values_leave_param_untouched() {
        let mut p = basic_store();
        assert!(matches!(
            p.set_int("separating/maxrounds", -2),
            Err(SolverError::ParamWrongValue { .. })
        ));
        assert_eq!(p.get_int("separating/maxrounds").unwrap(), 5);
        assert!(matches!(
            p.set_char("branching/direction", 'x'),
            Err(SolverError::ParamWrongValue { .. })
        ));
        assert_eq!(p.get_char("branching/direction").unwrap(), 'a');
    }

    #[test]
    fn test_type_and_name_errors() {
        let mut p = basic_store();
        assert!(matches!(
            p.get_bool("separating/maxrounds"),
            Err(SolverError::ParamWrongType { .. })
        ));
        assert!(matches!(
            p.set_bool("separating/maxrounds", true),
            Err(SolverError::ParamWrongType { .. })
        ));
        assert!(matches!(p.get_int("no/such/param"), Err(SolverError::ParamUnknown { .. })));
    }

    #[test]
    fn test_change_hook_runs_after_store() {
        let mut p = basic_store();
        let seen = Rc::new(Cell::new(0));
        let seen2 = seen.clone();
        p.set_hook(
            "separating/maxrounds",
            Box::new(move |v| {
                if let ParamValue::Int(i) = v {
                    seen2.set(*i);
                }
                Ok(())
            }),
        )
        .unwrap();
        p.set_int("separating/maxrounds", 7).unwrap();
        assert_eq!(seen.get(), 7);

        // a failing hook aborts the call, but the value is already stored
        p.set_hook(
            "separating/maxrounds",
            Box::new(|_| Err(SolverError::invalid_data("hook", "refused"))),
        )
        .unwrap();
        assert!(p.set_int("separating/maxrounds", 9).is_err());
        assert_eq!(p.get_int("separating/maxrounds").unwrap(), 9);
    }
}
