// src/kitchen/flags.rs

//! Linker flag templating
//!
//! Renders `-s -w -X symbol=value ...` from the formula's flag entries and
//! the resolved build variables.

use crate::error::{Error, Result};
use crate::formula::FlagEntry;
use crate::kitchen::variables::BuildVariables;

/// Flags always emitted first: omit the symbol table and DWARF info
pub const STRIP_FLAGS: [&str; 2] = ["-s", "-w"];

/// Render the linker flag list
///
/// The result is the strip flags followed by one `-X symbol=value` per
/// entry, in declaration order. A missing variable fails the whole render.
pub fn render(entries: &[FlagEntry], vars: &BuildVariables) -> Result<Vec<String>> {
    let mut flags: Vec<String> = STRIP_FLAGS.iter().map(|f| f.to_string()).collect();

    for entry in entries {
        let value = vars.get(&entry.variable).ok_or_else(|| {
            Error::TemplateError(format!(
                "flag for {} references unresolved variable '{}'",
                entry.symbol, entry.variable
            ))
        })?;
        flags.push(format!("-X {}", injection(&entry.symbol, value)?));
    }

    Ok(flags)
}

/// `symbol=value`, quoted when the value contains whitespace
///
/// The Go linker splits `-ldflags` on whitespace and honours `'` and `"`
/// quoting with no escapes, so a value holding whitespace and both quote
/// characters cannot be passed.
fn injection(symbol: &str, value: &str) -> Result<String> {
    let assignment = format!("{}={}", symbol, value);
    if !assignment.chars().any(char::is_whitespace) {
        return Ok(assignment);
    }

    let quote = ['\'', '"']
        .into_iter()
        .find(|q| !assignment.contains(*q))
        .ok_or_else(|| {
            Error::TemplateError(format!(
                "value for {} contains whitespace and both quote characters: {}",
                symbol, value
            ))
        })?;
    Ok(format!("{quote}{assignment}{quote}"))
}

/// Join rendered flags into the single string passed as `%(ldflags)s`
pub fn join_flags(flags: &[String]) -> String {
    flags.join(" ")
}

/// Number of `-X` injections in a rendered flag list
pub fn injection_count(flags: &[String]) -> usize {
    flags.iter().filter(|f| f.starts_with("-X ")).count()
}
