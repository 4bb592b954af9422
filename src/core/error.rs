use std::path::PathBuf;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur while loading schemas or processing a CFDI.
///
/// The checklist builder never returns these to its caller; each one is
/// turned into a failed step with the error text as the message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CfdiError {
    /// The input is not well-formed XML.
    #[error("XML inválido: {0}")]
    Xml(String),

    /// A schema document could not be compiled.
    #[error("schema error: {0}")]
    Schema(String),

    /// No main schema file exists in the configured directory.
    #[error("no se encontró XSD principal en: {}", dir.display())]
    SchemaNotFound { dir: PathBuf },

    /// An `xs:import`/`xs:include` could not be found in the local schema tree.
    #[error("no se pudo resolver localmente el esquema '{location}'")]
    Unresolved { location: String },

    /// Invalid configuration value or file.
    #[error("configuration error: {0}")]
    Config(String),

    /// A provider catalog or invoice store lookup failed.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The invoice store already holds a record with this UUID.
    #[error("UUID {uuid} ya registrado (cfdi.id={existing_id})")]
    DuplicateUuid { uuid: String, existing_id: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single schema violation with its position in the validated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// 1-based line of the offending element's start tag (0 when unknown).
    pub line: usize,
    /// 1-based column of the offending element's start tag (0 when unknown).
    pub column: usize,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}:{}] {}", self.line, self.column, self.message)
        }
    }
}

impl SchemaViolation {
    /// Create a violation at a known position.
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a violation with no position information.
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(0, 0, message)
    }
}

impl Serialize for SchemaViolation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_includes_position() {
        let v = SchemaViolation::new(12, 5, "The attribute 'Total' is required but missing.");
        assert_eq!(
            v.to_string(),
            "[12:5] The attribute 'Total' is required but missing."
        );
        assert_eq!(SchemaViolation::unpositioned("boom").to_string(), "boom");
    }

    #[test]
    fn duplicate_uuid_names_existing_record() {
        let err = CfdiError::DuplicateUuid {
            uuid: "6F1E2C3D-0000-4000-8000-000000000001".into(),
            existing_id: 42,
        };
        assert!(err.to_string().contains("cfdi.id=42"));
    }
}
