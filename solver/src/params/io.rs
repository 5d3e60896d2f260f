//! Text persistence of the parameter store.
//!
//! Line grammar: `WS? (name WS? "=" WS? value WS? ("#" .*)?)? EOL`.
//! Booleans are the case-insensitive tokens `TRUE`/`FALSE`, strings are
//! double-quoted with literal escapes, integers and reals use their standard
//! textual forms, characters are single printable glyphs.

use super::{ParamStore, ParamValue};
use crate::err::{Result, SolverError};
use std::fs;
use std::io::Write;
use std::path::Path;

pub(super) fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(true) => "TRUE".into(),
        ParamValue::Bool(false) => "FALSE".into(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::LongInt(v) => v.to_string(),
        ParamValue::Real(v) => format!("{v}"),
        ParamValue::Char(c) => c.to_string(),
        ParamValue::Str(s) => format!("\"{s}\""),
    }
}

/// Parses `text` into a value of the same kind as `current`.
pub(super) fn parse_value(current: &ParamValue, name: &str, text: &str) -> Result<ParamValue> {
    let op = "parse parameter value";
    let wrong = || SolverError::ParamWrongValue {
        op,
        name: name.into(),
        value: text.into(),
    };
    match current {
        ParamValue::Bool(_) => {
            if text.eq_ignore_ascii_case("true") {
                Ok(ParamValue::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(ParamValue::Bool(false))
            } else {
                Err(wrong())
            }
        }
        ParamValue::Int(_) => text.parse::<i32>().map(ParamValue::Int).map_err(|_| wrong()),
        ParamValue::LongInt(_) => text.parse::<i64>().map(ParamValue::LongInt).map_err(|_| wrong()),
        ParamValue::Real(_) => text.parse::<f64>().map(ParamValue::Real).map_err(|_| wrong()),
        ParamValue::Char(_) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_control() => Ok(ParamValue::Char(c)),
                _ => Err(wrong()),
            }
        }
        ParamValue::Str(_) => {
            let inner = text
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(wrong)?;
            Ok(ParamValue::Str(inner.into()))
        }
    }
}

/// Splits a content line into `(name, value-text)`, with the value stripped of
/// trailing comment and whitespace. Returns `None` for blank and comment-only
/// lines.
fn split_line(line: &str) -> std::result::Result<Option<(&str, &str)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let eq = trimmed.find('=').ok_or_else(|| "missing `=`".to_string())?;
    let name = trimmed[..eq].trim();
    if name.is_empty() {
        return Err("missing parameter name".into());
    }
    let rest = trimmed[eq + 1..].trim_start();
    let value = if let Some(stripped) = rest.strip_prefix('"') {
        // quoted string: the comment marker only applies after the closing quote
        let close = stripped.find('"').ok_or_else(|| "unterminated string".to_string())?;
        let tail = stripped[close + 1..].trim();
        if !tail.is_empty() && !tail.starts_with('#') {
            return Err(format!("trailing characters `{tail}` after string value"));
        }
        &rest[..close + 2]
    } else {
        let end = rest.find('#').unwrap_or(rest.len());
        rest[..end].trim_end()
    };
    if value.is_empty() {
        return Err("missing value".into());
    }
    Ok(Some((name, value)))
}

pub(super) fn read_file(store: &mut ParamStore, path: &Path) -> Result<()> {
    let op = "read parameter file";
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SolverError::NoFile { op, path: path.into() },
        _ => SolverError::ReadError { op, path: path.into() },
    })?;
    for (lineno, line) in content.lines().enumerate() {
        let lineno = lineno + 1;
        let parsed = split_line(line).map_err(|msg| SolverError::parse(op, lineno, msg))?;
        let Some((name, value)) = parsed else { continue };
        if !store.contains(name) {
            eprintln!("{}: warning: line {lineno}: unknown parameter `{name}`, skipped", path.display());
            continue;
        }
        store.set_from_str(name, value).map_err(|e| match e {
            SolverError::ParamWrongValue { name, value, .. } => SolverError::parse(
                op,
                lineno,
                format!("value `{value}` is not valid for parameter `{name}`"),
            ),
            other => other,
        })?;
    }
    Ok(())
}

pub(super) fn write_file(store: &ParamStore, path: &Path) -> Result<()> {
    let op = "write parameter file";
    let mut out = fs::File::create(path).map_err(|_| SolverError::FileCreateError { op, path: path.into() })?;
    let mut write = |s: String| -> Result<()> {
        out.write_all(s.as_bytes())
            .map_err(|_| SolverError::WriteError { op, path: path.into() })
    };
    for param in store.iter() {
        if !param.desc().is_empty() {
            write(format!("# {}\n", param.desc()))?;
        }
        write(format!("{} = {}\n", param.name(), format_value(param.value())))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> ParamStore {
        let mut p = ParamStore::new();
        p.add_bool("a/flag", "a flag", true).unwrap();
        p.add_int("a/count", "a count", 3, 0, 100).unwrap();
        p.add_real("b/ratio", "a ratio", 0.5, 0.0, 1.0).unwrap();
        p.add_string("b/text", "some text", "hello").unwrap();
        p.add_char("b/mark", "a mark", 'x', None).unwrap();
        p
    }

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("  # just a comment "), Ok(None));
        assert_eq!(split_line(""), Ok(None));
        assert_eq!(split_line("a/b = 12 # rest"), Ok(Some(("a/b", "12"))));
        assert_eq!(split_line("s = \"a # b\" # c"), Ok(Some(("s", "\"a # b\""))));
        assert!(split_line("nonsense").is_err());
        assert!(split_line("name = ").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = std::env::temp_dir().join("sylva_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("roundtrip.set");

        let mut p = store();
        p.set_bool("a/flag", false).unwrap();
        p.set_int("a/count", 42).unwrap();
        p.set_real("b/ratio", 0.25).unwrap();
        p.set_string("b/text", "with # marker").unwrap();
        p.write_file(&file).unwrap();

        let mut q = store();
        q.read_file(&file).unwrap();
        for (a, b) in p.iter().zip(q.iter()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.value(), b.value());
        }
        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn test_unknown_parameter_is_skipped() {
        let dir = std::env::temp_dir().join("sylva_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("unknown.set");
        std::fs::write(&file, "no/such = 1\na/count = 9\n").unwrap();
        let mut p = store();
        p.read_file(&file).unwrap();
        assert_eq!(p.get_int("a/count").unwrap(), 9);
        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn test_malformed_value_aborts_with_line() {
        let dir = std::env::temp_dir().join("sylva_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("malformed.set");
        std::fs::write(&file, "a/flag = TRUE\na/count = many\n").unwrap();
        let mut p = store();
        match p.read_file(&file) {
            Err(SolverError::ParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        std::fs::remove_file(&file).unwrap();
    }
}
