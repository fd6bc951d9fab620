//! Key/value text format shared by metadata and configuration files
//!
//! One `key=value` pair per line, `#` or `!` starts a comment line, blank
//! lines are ignored. Keys are written back sorted so files diff cleanly.

use crate::error::{Result, TdbError};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Ordered property map
pub type Properties = BTreeMap<String, String>;

/// Parse properties text
pub fn parse(text: &str) -> Result<Properties> {
    let mut props = Properties::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .or_else(|| line.split_once(':'))
            .ok_or_else(|| {
                TdbError::InvalidInput(format!("line {}: expected key=value: {raw}", lineno + 1))
            })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(TdbError::InvalidInput(format!(
                "line {}: empty key",
                lineno + 1
            )));
        }
        props.insert(key.to_string(), value.trim().to_string());
    }
    Ok(props)
}

/// Render properties as text, with an optional leading comment
pub fn render(props: &Properties, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
        for line in comment.lines() {
            let _ = writeln!(out, "# {line}");
        }
    }
    for (key, value) in props {
        let _ = writeln!(out, "{key}={value}");
    }
    out
}

/// Load a properties file
pub fn load(path: &Path) -> Result<Properties> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Write a properties file via a temporary sibling and rename
pub fn store(path: &Path, props: &Properties, comment: Option<&str>) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, render(props, comment))?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
