//! Offline XML Schema validation.
//!
//! [`SchemaValidator::load`] selects the main CFDI schema, resolves every
//! `xs:import`/`xs:include` through a [`SchemaIndex`] of the local schema
//! tree, and compiles the result once. The compiled validator is immutable
//! and can be shared across threads.
//!
//! The supported subset covers what the SAT schemas use: global and local
//! element declarations, named and anonymous simple/complex types, sequence,
//! choice and all groups with occurrence bounds, `xs:any`/`xs:anyAttribute`
//! wildcards, simpleContent extension/restriction, and the usual facets.
//! Other constructs fail compilation with [`CfdiError::Schema`].

mod compile;
mod datatypes;
mod index;
mod model;
mod validate;

use std::path::{Path, PathBuf};

use crate::core::{CfdiError, SchemaViolation, ValidatorConfig};
use crate::xml::Document;

pub use index::SchemaIndex;

/// XML Schema namespace.
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
/// XML Schema instance namespace (`xsi:` attributes are never validated).
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Result of validating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOutcome {
    pub valid: bool,
    /// Summary line for the checklist.
    pub message: String,
    /// Violations in document order, truncated to the configured limit.
    pub errors: Vec<SchemaViolation>,
    /// Number of violations before truncation.
    pub total_errors: usize,
}

/// A compiled CFDI schema set.
#[derive(Debug)]
pub struct SchemaValidator {
    schema: model::Schema,
    main_schema: PathBuf,
    index: SchemaIndex,
    max_errors: usize,
}

impl SchemaValidator {
    /// Select, resolve and compile the main schema described by `config`.
    pub fn load(config: &ValidatorConfig) -> Result<Self, CfdiError> {
        let index = SchemaIndex::build(&config.schema_dir)?;
        let main_schema = config.main_schema_path()?;
        let schema = compile::compile(&main_schema, &index)?;
        tracing::info!(
            schema = %main_schema.display(),
            elements = schema.elements.len(),
            types = schema.types.len(),
            "CFDI schema compiled"
        );
        Ok(Self {
            schema,
            main_schema,
            index,
            max_errors: config.max_reported_errors,
        })
    }

    pub fn main_schema(&self) -> &Path {
        &self.main_schema
    }

    /// File name of the main schema, as shown in the checklist.
    pub fn main_schema_name(&self) -> String {
        self.main_schema
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.main_schema.display().to_string())
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    /// Validate a document that has already been stripped of the parts the
    /// schema does not describe.
    pub fn validate(&self, doc: &Document) -> SchemaOutcome {
        let mut errors = validate::validate_document(&self.schema, doc);
        let total_errors = errors.len();
        if errors.is_empty() {
            return SchemaOutcome {
                valid: true,
                message: format!("XSD OK usando {}", self.main_schema_name()),
                errors,
                total_errors,
            };
        }

        tracing::debug!(total_errors, "schema validation failed");
        errors.truncate(self.max_errors);
        SchemaOutcome {
            valid: false,
            message: "XSD inválido (estructura CFDI no cumple).".into(),
            errors,
            total_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r###"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:t="urn:test" targetNamespace="urn:test"
           elementFormDefault="qualified" attributeFormDefault="unqualified">
  <xs:element name="Root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="Code" use="required" type="t:Code"/>
            <xs:attribute name="Amount" type="t:Amount"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="Note" type="xs:string" minOccurs="0"/>
        <xs:any namespace="##other" processContents="lax" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="Version" use="required" fixed="4.0"/>
    </xs:complexType>
  </xs:element>
  <xs:simpleType name="Code">
    <xs:restriction base="xs:string">
      <xs:enumeration value="A"/>
      <xs:enumeration value="B"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal">
      <xs:minInclusive value="0"/>
      <xs:fractionDigits value="2"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"###;

    fn validator() -> (tempfile::TempDir, SchemaValidator) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.xsd"), SCHEMA).unwrap();
        let config = ValidatorConfig::with_schema_dir(dir.path());
        let validator = SchemaValidator::load(&config).unwrap();
        (dir, validator)
    }

    fn check(xml: &str) -> SchemaOutcome {
        let (_dir, v) = validator();
        v.validate(&Document::parse_str(xml).unwrap())
    }

    #[test]
    fn accepts_valid_document() {
        let out = check(
            r#"<t:Root xmlns:t="urn:test" Version="4.0"><t:Item Code="A" Amount="1.50"/><t:Item Code="B"/><t:Note>x</t:Note><o:Ext xmlns:o="urn:other"/></t:Root>"#,
        );
        assert!(out.valid, "{:?}", out.errors);
        assert_eq!(out.message, "XSD OK usando test.xsd");
    }

    #[test]
    fn reports_attribute_problems_with_positions() {
        let out = check(
            "<t:Root xmlns:t=\"urn:test\" Version=\"3.3\">\n  <t:Item Code=\"Z\" Amount=\"-1\" Extra=\"1\"/>\n</t:Root>",
        );
        assert!(!out.valid);
        let text: Vec<String> = out.errors.iter().map(ToString::to_string).collect();
        assert!(text.iter().any(|e| e.starts_with("[1:1]") && e.contains("fixed value")));
        assert!(text.iter().any(|e| e.starts_with("[2:3]") && e.contains("'enumeration'")));
        assert!(text.iter().any(|e| e.contains("'minInclusive'")));
        assert!(text.iter().any(|e| e.contains("'Extra' is not allowed")));
    }

    #[test]
    fn reports_content_model_problems() {
        let missing = check(r#"<t:Root xmlns:t="urn:test" Version="4.0"/>"#);
        assert!(missing.errors[0].message.contains("Missing child element(s)"));
        assert!(missing.errors[0].message.contains("{urn:test}Item"));

        let unexpected = check(
            r#"<t:Root xmlns:t="urn:test" Version="4.0"><t:Item Code="A"/><t:Bogus/></t:Root>"#,
        );
        assert!(unexpected.errors[0].message.contains("This element is not expected"));

        let required = check(r#"<t:Root xmlns:t="urn:test" Version="4.0"><t:Item/></t:Root>"#);
        assert!(required.errors[0].message.contains("'Code' is required but missing"));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let out = check(r#"<Other/>"#);
        assert!(!out.valid);
        assert!(out.errors[0].message.contains("No matching global declaration"));
    }

    #[test]
    fn errors_are_truncated_but_counted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.xsd"), SCHEMA).unwrap();
        let mut config = ValidatorConfig::with_schema_dir(dir.path());
        config.max_reported_errors = 2;
        let v = SchemaValidator::load(&config).unwrap();
        let items = "<t:Item Code=\"Z\"/>".repeat(5);
        let xml = format!(r#"<t:Root xmlns:t="urn:test" Version="4.0">{items}</t:Root>"#);
        let out = v.validate(&Document::parse_str(&xml).unwrap());
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.total_errors, 5);
    }

    #[test]
    fn unresolved_import_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:import namespace="urn:x" schemaLocation="http://example.com/missing.xsd"/>
               </xs:schema>"#,
        )
        .unwrap();
        let config = ValidatorConfig::with_schema_dir(dir.path());
        let err = SchemaValidator::load(&config).unwrap_err();
        assert!(matches!(err, CfdiError::Unresolved { .. }));
    }

    #[test]
    fn unsupported_constructs_fail_compilation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:group name="g"><xs:sequence/></xs:group>
               </xs:schema>"#,
        )
        .unwrap();
        let config = ValidatorConfig::with_schema_dir(dir.path());
        assert!(matches!(
            SchemaValidator::load(&config),
            Err(CfdiError::Schema(_))
        ));
    }

    #[test]
    fn digit_facets_beyond_u32_fail_compilation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:simpleType name="Big">
                   <xs:restriction base="xs:decimal">
                     <xs:totalDigits value="4294967296"/>
                   </xs:restriction>
                 </xs:simpleType>
               </xs:schema>"#,
        )
        .unwrap();
        let config = ValidatorConfig::with_schema_dir(dir.path());
        match SchemaValidator::load(&config) {
            Err(CfdiError::Schema(msg)) => {
                assert!(msg.contains("totalDigits value '4294967296' out of range"), "{msg}")
            }
            other => panic!("expected a schema error, got {other:?}"),
        }
    }
}
