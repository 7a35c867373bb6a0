// This module defines error types for the module assembler using the thiserror crate
// for idiomatic Rust error handling. AssembleError is the main error enum covering the
// fatal conditions of the pipeline: structural invariant violations (a missing or
// remapped alias, a duplicate entity occurrence, a malformed function declaration run),
// unknown enumerated values encountered where a derivation has no default case,
// unresolvable symbolic callees, and unsatisfiable capability/extension/version
// requirements. The unsatisfiable variant carries a full UnsatisfiableReport listing
// every unmet item at once rather than just the first. All of these abort the entire
// assembly; one missing definition would silently corrupt all subsequent numbering, so
// there is no per-instruction skip-and-continue.

//! Error types for the module assembler.
//!
//! Using thiserror for more idiomatic error handling.

use std::fmt;

use thiserror::Error;

use crate::inst::{GlobalId, LocalId};
use crate::require::Capability;
use crate::target::Version;

/// Main error type for module assembly.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("no alias recorded for {local} while {context}")]
    MissingAlias { local: LocalId, context: &'static str },

    #[error("alias for {local} is already %{existing}; refusing remap to %{requested}")]
    AliasRemap { local: LocalId, existing: GlobalId, requested: GlobalId },

    #[error("function {func} recorded a second definition of {key}")]
    DuplicateOccurrence { func: u32, key: String },

    #[error("local %{index} defined more than once in function {func}")]
    LocalRedefined { func: u32, index: u32 },

    #[error("malformed function declaration in function {func}: {reason}")]
    MalformedFunction { func: u32, reason: String },

    #[error("unknown {what} value {value} in {opcode}")]
    UnknownEnumerant { what: &'static str, value: u64, opcode: String },

    #[error("call to `{name}` does not match any module function")]
    UnresolvedCallee { name: String },

    #[error("module requirements exceed target support:\n{0}")]
    Unsatisfiable(UnsatisfiableReport),
}

/// Result type alias for assembly operations.
pub type AssembleResult<T> = Result<T, AssembleError>;

/// Everything a target cannot satisfy, collected before aborting.
#[derive(Debug, Default)]
pub struct UnsatisfiableReport {
    /// Capabilities the target does not support, in enumerant order.
    pub capabilities: Vec<Capability>,
    /// Extensions the target does not support, sorted.
    pub extensions: Vec<String>,
    /// Version bounds that crossed: `(min, max)` with `min > max`.
    pub crossed_bounds: Option<(Version, Version)>,
    /// Target version outside the required bounds: `(target, min, max)`.
    pub unsupported_version: Option<(Version, Option<Version>, Option<Version>)>,
}

impl UnsatisfiableReport {
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
            && self.extensions.is_empty()
            && self.crossed_bounds.is_none()
            && self.unsupported_version.is_none()
    }
}

impl fmt::Display for UnsatisfiableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn line(
            f: &mut fmt::Formatter<'_>,
            first: &mut bool,
            args: fmt::Arguments<'_>,
        ) -> fmt::Result {
            if !*first {
                writeln!(f)?;
            }
            *first = false;
            write!(f, "  {args}")
        }

        let mut first = true;
        for cap in &self.capabilities {
            line(f, &mut first, format_args!("capability {cap} is not supported"))?;
        }
        for ext in &self.extensions {
            line(f, &mut first, format_args!("extension {ext} is not supported"))?;
        }
        if let Some((min, max)) = self.crossed_bounds {
            line(
                f,
                &mut first,
                format_args!("version bounds crossed: requires at least {min} but at most {max}"),
            )?;
        }
        if let Some((target, min, max)) = self.unsupported_version {
            let min = min.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
            let max = max.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
            line(
                f,
                &mut first,
                format_args!("target version {target} is outside required bounds [{min}, {max}]"),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_item() {
        let report = UnsatisfiableReport {
            capabilities: vec![Capability::Float64, Capability::Int64],
            extensions: vec!["SPV_KHR_storage_buffer_storage_class".to_string()],
            crossed_bounds: Some((Version::V1_4, Version::V1_0)),
            unsupported_version: None,
        };
        let text = report.to_string();
        assert!(text.contains("Float64"));
        assert!(text.contains("Int64"));
        assert!(text.contains("SPV_KHR_storage_buffer_storage_class"));
        assert!(text.contains("at least 1.4 but at most 1.0"));
    }

    #[test]
    fn test_error_display() {
        let err = AssembleError::MissingAlias {
            local: LocalId::new(2, 9),
            context: "hoisting a pointer type",
        };
        assert_eq!(
            err.to_string(),
            "no alias recorded for fn2:%9 while hoisting a pointer type"
        );
    }
}
