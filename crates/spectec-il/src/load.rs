//! Loading and emitting the serialized IL tree
//!
//! The elaborator exchanges specifications as a JSON tree whose object tags
//! are the IL constructor names. Loading parses, then validates; emission is
//! the exact inverse, so `load(emit(spec)) == spec` including regions.

use crate::ast::Spec;
use crate::validate::{validate, ValidateError};
use std::path::Path;
use thiserror::Error;

/// Failure to obtain a usable specification
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The tree is not syntactically the IL exchange format
    #[error("parse: {msg}")]
    Parse { msg: String },
    /// The tree parsed but is not a well-formed specification
    #[error("elaboration: {} error(s), first: {}", errors.len(), errors[0])]
    Elab { errors: Vec<ValidateError> },
}

/// Parse and validate a specification from its serialized form
pub fn load_spec_str(src: &str) -> Result<Spec, LoadError> {
    let spec: Spec = serde_json::from_str(src).map_err(|e| LoadError::Parse { msg: e.to_string() })?;
    validate(&spec).map_err(|errors| LoadError::Elab { errors })?;
    Ok(spec)
}

/// Load a specification from a file
pub fn load_spec(path: &Path) -> Result<Spec, LoadError> {
    let src = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_spec_str(&src)
}

/// Emit the canonical serialized form of a specification
pub fn emit_spec(spec: &Spec) -> Result<String, LoadError> {
    serde_json::to_string_pretty(spec).map_err(|e| LoadError::Parse { msg: e.to_string() })
}
