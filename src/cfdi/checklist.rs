use super::extract::extract_fields;
use super::stamp::{find_stamp, validate_stamp};
use super::strip::strip_for_schema;
use crate::core::{ValidationChecklist, ValidatorConfig};
use crate::xml::Document;
use crate::xsd::SchemaValidator;

/// Validation pipeline holding the compiled CFDI schema.
///
/// Build one at startup and share it (it is `Send + Sync`); every call is
/// independent and keeps no state between documents. A schema that failed to
/// load does not prevent construction: each checklist then reports the
/// schema step as failed with the load error as its cause.
#[derive(Debug)]
pub struct CfdiValidator {
    schema: Result<SchemaValidator, String>,
}

impl CfdiValidator {
    /// Compile the schema described by `config`.
    pub fn new(config: ValidatorConfig) -> Self {
        let schema = SchemaValidator::load(&config).map_err(|e| {
            tracing::warn!(
                schema_dir = %config.schema_dir.display(),
                error = %e,
                "CFDI schema unavailable; schema checks will fail"
            );
            e.to_string()
        });
        Self { schema }
    }

    /// Use an already compiled schema.
    pub fn with_schema(schema: SchemaValidator) -> Self {
        Self { schema: Ok(schema) }
    }

    /// The compiled schema, if it loaded.
    pub fn schema(&self) -> Option<&SchemaValidator> {
        self.schema.as_ref().ok()
    }

    /// Run the document checks: well-formedness, extraction, schema and stamp.
    ///
    /// `rfc_ok` and `uuid_ok` stay false; [`CfdiValidator::validate`] adds
    /// the business rules. Never panics and never fails: every problem is
    /// a failed step in the returned checklist.
    pub fn build_checklist(&self, xml: &[u8]) -> ValidationChecklist {
        let mut checklist = ValidationChecklist::default();

        let doc = match Document::parse(xml) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting malformed XML");
                checklist.fail("XML inválido");
                checklist.errors.push(e.to_string());
                checklist.finalize();
                return checklist;
            }
        };
        checklist.xml_ok = true;
        checklist.pass("XML bien formado");

        let extraction = extract_fields(&doc);
        checklist.timbre_ok = extraction.fields.uuid.is_some();
        checklist.errors.extend(extraction.issues);
        tracing::debug!(uuid = ?extraction.fields.uuid, rfc = ?extraction.fields.rfc_emisor, "fields extracted");

        let stripped = strip_for_schema(&doc);
        if stripped.addenda_removed > 0 {
            checklist.info("Addenda detectada: se excluye de la validación XSD pero se guarda completa");
        }
        self.check_schema(&stripped.document, &mut checklist);
        check_stamp(&doc, &mut checklist);

        checklist.extracted = Some(extraction.fields);
        checklist.finalize();
        tracing::info!(
            uuid = ?checklist.extracted.as_ref().and_then(|f| f.uuid.as_deref()),
            xsd_ok = checklist.xsd_ok,
            timbre_ok = checklist.timbre_ok,
            "CFDI checklist built"
        );
        checklist
    }

    fn check_schema(&self, doc: &Document, checklist: &mut ValidationChecklist) {
        let validator = match &self.schema {
            Ok(v) => v,
            Err(cause) => {
                checklist.fail(format!("No fue posible validar XSD: {cause}"));
                checklist.errors.push(cause.clone());
                return;
            }
        };

        let outcome = validator.validate(doc);
        tracing::debug!(valid = outcome.valid, errors = outcome.total_errors, "schema validated");
        if outcome.valid {
            checklist.xsd_ok = true;
            checklist.pass(outcome.message);
            return;
        }

        checklist.fail(outcome.message);
        let shown = outcome.errors.len();
        checklist.errors.push(if shown < outcome.total_errors {
            format!(
                "XSD: {} violaciones de esquema (se muestran {shown})",
                outcome.total_errors
            )
        } else {
            format!("XSD: {} violaciones de esquema", outcome.total_errors)
        });
        checklist.xsd_errors = outcome.errors;
    }
}

fn check_stamp(doc: &Document, checklist: &mut ValidationChecklist) {
    let Some(stamp) = find_stamp(doc.root()) else {
        checklist.timbre_ok = false;
        checklist.fail("TimbreFiscalDigital no encontrado");
        checklist
            .errors
            .push("No se encontró tfd:TimbreFiscalDigital en cfdi:Complemento".into());
        return;
    };

    let report = validate_stamp(stamp);
    if report.all_ok() {
        checklist.timbre_ok = true;
        checklist.pass("TimbreFiscalDigital válido");
    } else {
        checklist.timbre_ok = false;
        let bad: Vec<String> = report
            .failures()
            .map(|(attribute, status)| format!("{attribute}: {status}"))
            .collect();
        checklist.fail("TimbreFiscalDigital inválido");
        checklist
            .errors
            .push(format!("Timbre inválido -> {}", bad.join(", ")));
    }
    checklist.timbre = Some(report);
}
