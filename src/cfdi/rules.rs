use super::checklist::CfdiValidator;
use super::register::InvoiceRecord;
use crate::core::{CfdiError, ValidationChecklist};

/// Read access to the provider catalog.
pub trait ProviderCatalog: Send + Sync {
    /// Id of the provider registered under `rfc`, if any.
    fn provider_id_for_rfc(&self, rfc: &str) -> Result<Option<u64>, CfdiError>;
}

/// Persistent invoice storage.
pub trait InvoiceStore: Send + Sync {
    /// Id of the invoice already stored under `uuid`, if any.
    fn find_by_uuid(&self, uuid: &str) -> Result<Option<u64>, CfdiError>;

    /// Store a record and return its id.
    ///
    /// Must fail with [`CfdiError::DuplicateUuid`] when the UUID is already
    /// present; this is the only race-safe uniqueness check; the lookup in
    /// [`apply_business_rules`] is advisory.
    fn insert(&self, record: InvoiceRecord) -> Result<u64, CfdiError>;
}

/// Add the provider and duplicate-UUID checks to a checklist built by
/// [`CfdiValidator::build_checklist`], then recompute `ok`.
///
/// Nothing is checked for a document that was not well-formed.
pub fn apply_business_rules(
    checklist: &mut ValidationChecklist,
    catalog: &dyn ProviderCatalog,
    store: &dyn InvoiceStore,
) {
    check_rules(checklist, catalog, store);
}

/// Runs the checks and returns the matched provider id.
pub(crate) fn check_rules(
    checklist: &mut ValidationChecklist,
    catalog: &dyn ProviderCatalog,
    store: &dyn InvoiceStore,
) -> Option<u64> {
    let Some(fields) = checklist.extracted.clone() else {
        checklist.finalize();
        return None;
    };

    let provider_id = match fields.rfc_emisor.as_deref() {
        None => {
            checklist.rfc_ok = false;
            checklist.fail("RFC emisor no detectado en XML.");
            None
        }
        Some(rfc) => match catalog.provider_id_for_rfc(rfc) {
            Ok(Some(id)) => {
                checklist.rfc_ok = true;
                checklist.pass("RFC existe en catálogo de proveedores.");
                Some(id)
            }
            Ok(None) => {
                checklist.rfc_ok = false;
                checklist.fail("RFC NO existe en catálogo de proveedores.");
                None
            }
            Err(e) => {
                tracing::warn!(rfc, error = %e, "provider lookup failed");
                checklist.rfc_ok = false;
                checklist.fail("No fue posible consultar el catálogo de proveedores.");
                checklist.errors.push(e.to_string());
                None
            }
        },
    };

    match fields.uuid.as_deref() {
        None => {
            checklist.uuid_ok = false;
            checklist.fail("UUID no detectado en XML.");
        }
        Some(uuid) => match store.find_by_uuid(uuid) {
            Ok(Some(existing)) => {
                checklist.uuid_ok = false;
                checklist.fail(format!("UUID ya registrado (cfdi.id={existing})."));
            }
            Ok(None) => {
                checklist.uuid_ok = true;
                checklist.pass("UUID no existe en BD (OK).");
            }
            Err(e) => {
                tracing::warn!(uuid, error = %e, "invoice lookup failed");
                checklist.uuid_ok = false;
                checklist.fail("No fue posible verificar si el UUID ya está registrado.");
                checklist.errors.push(e.to_string());
            }
        },
    }

    checklist.finalize();
    provider_id
}

impl CfdiValidator {
    /// Full validation: document checks plus business rules. `ok` is the
    /// conjunction of all five checks.
    pub fn validate(
        &self,
        xml: &[u8],
        catalog: &dyn ProviderCatalog,
        store: &dyn InvoiceStore,
    ) -> ValidationChecklist {
        let mut checklist = self.build_checklist(xml);
        apply_business_rules(&mut checklist, catalog, store);
        checklist
    }
}
