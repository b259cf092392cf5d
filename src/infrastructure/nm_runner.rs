//! Symbol extraction through `nm`.
//!
//! Lists the defined text symbols (`T`, `t`, `W`, `w`) of a binary, which are
//! the functions a uprobe based tracer can attach to.

use std::path::Path;
use std::process::Command;
use indexmap::IndexSet;
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::ports::SymbolExtractor;

const NM_PROGRAM: &str = "nm";
const FUNCTION_TYPES: &[&str] = &["T", "t", "W", "w"];

// ═══════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct NmSymbolExtractor {
    program: String,
}

impl Default for NmSymbolExtractor {
    fn default() -> Self {
        Self {
            program: NM_PROGRAM.to_string(),
        }
    }
}

impl NmSymbolExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolExtractor for NmSymbolExtractor {
    fn extract_symbols(&self, path: &str) -> Result<Vec<String>> {
        if !Path::new(path).is_file() {
            return Err(missing_binary(path));
        }

        let spec = build_command_spec(&self.program, path);
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .output()
            .map_err(|e| TraceError::config(format!("Failed to execute {}: {}", spec.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(path, stderr = stderr.trim(), "nm rejected binary");
            return Err(missing_binary(path));
        }

        let symbols = parse_nm_output(&String::from_utf8_lossy(&output.stdout));
        debug!(path, symbols = symbols.len(), "Extracted symbols");
        Ok(symbols)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Testable Command Builder
// ═══════════════════════════════════════════════════════════════════════════

/// Describes the command that would be run for a binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmCommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

pub fn build_command_spec(program: &str, path: &str) -> NmCommandSpec {
    NmCommandSpec {
        program: program.to_string(),
        args: vec!["--defined-only".to_string(), path.to_string()],
    }
}

/// Keep function symbols, first occurrence wins.
pub fn parse_nm_output(stdout: &str) -> Vec<String> {
    let mut symbols = IndexSet::new();
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // `<address> <type> <name>`; undefined symbols have no address.
        let (kind, name) = match fields.as_slice() {
            [_, kind, name] => (*kind, *name),
            [kind, name] => (*kind, *name),
            _ => continue,
        };
        if FUNCTION_TYPES.contains(&kind) {
            symbols.insert(name.to_string());
        }
    }
    symbols.into_iter().collect()
}

fn missing_binary(path: &str) -> TraceError {
    TraceError::config(format!("Could not find binary at {}", path))
}
