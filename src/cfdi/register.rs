use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::checklist::CfdiValidator;
use super::rules::{InvoiceStore, ProviderCatalog, check_rules};
use crate::core::{CfdiError, ValidationChecklist};

/// What the registration workflow persists for an accepted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRecord {
    pub uuid: String,
    pub rfc_emisor: String,
    pub fecha_emision: NaiveDate,
    pub fecha_timbrado: Option<NaiveDate>,
    pub subtotal: Option<String>,
    pub iva: Decimal,
    pub con_iva: Option<String>,
    pub descuento: Option<String>,
    pub isr: Decimal,
    pub retenciones: Decimal,
    pub importe_pago: Option<Decimal>,
    /// Catalog id of the issuing provider.
    pub proveedor_id: u64,
    /// The submitted document, complete with stamp and addenda.
    pub xml: String,
}

/// Outcome of [`register_invoice`]. Both variants carry the full checklist
/// so the operator can see every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Accepted {
        id: u64,
        checklist: ValidationChecklist,
    },
    Refused {
        checklist: ValidationChecklist,
    },
}

impl Registration {
    pub fn checklist(&self) -> &ValidationChecklist {
        match self {
            Registration::Accepted { checklist, .. } | Registration::Refused { checklist } => {
                checklist
            }
        }
    }

    /// Stored invoice id when accepted.
    pub fn id(&self) -> Option<u64> {
        match self {
            Registration::Accepted { id, .. } => Some(*id),
            Registration::Refused { .. } => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Registration::Accepted { .. })
    }
}

/// Validate `xml` and store it when every check passes.
///
/// Refusals (any failed check, no issuance date, or a UUID inserted
/// concurrently by another submission) return [`Registration::Refused`].
/// `Err` is reserved for store failures other than a duplicate UUID.
pub fn register_invoice(
    validator: &CfdiValidator,
    xml: &[u8],
    catalog: &dyn ProviderCatalog,
    store: &dyn InvoiceStore,
) -> Result<Registration, CfdiError> {
    let mut checklist = validator.build_checklist(xml);
    let provider_id = check_rules(&mut checklist, catalog, store);

    let fields = checklist.extracted.clone();
    let record = match (fields, provider_id) {
        (Some(fields), Some(proveedor_id)) if checklist.ok => {
            match (fields.uuid, fields.rfc_emisor, fields.fecha_emision) {
                (Some(uuid), Some(rfc_emisor), Some(fecha_emision)) => Some(InvoiceRecord {
                    uuid,
                    rfc_emisor,
                    fecha_emision,
                    fecha_timbrado: fields.fecha_timbrado,
                    subtotal: fields.subtotal,
                    iva: fields.iva,
                    con_iva: fields.con_iva,
                    descuento: fields.descuento,
                    isr: fields.isr,
                    retenciones: fields.retenciones,
                    importe_pago: fields.importe_pago,
                    proveedor_id,
                    xml: String::from_utf8_lossy(xml).into_owned(),
                }),
                (_, _, None) => {
                    checklist.fail("No se pudo extraer Fecha del CFDI.");
                    checklist.ok = false;
                    None
                }
                _ => None,
            }
        }
        _ => None,
    };

    let Some(record) = record else {
        tracing::info!(failed = ?checklist.failed_checks(), "CFDI registration refused");
        return Ok(Registration::Refused { checklist });
    };

    let uuid = record.uuid.clone();
    match store.insert(record) {
        Ok(id) => {
            checklist.pass(format!("CFDI registrado (cfdi.id={id})."));
            tracing::info!(id, uuid = %uuid, "CFDI registered");
            Ok(Registration::Accepted { id, checklist })
        }
        Err(CfdiError::DuplicateUuid { existing_id, .. }) => {
            checklist.uuid_ok = false;
            checklist.fail(format!("UUID ya registrado (cfdi.id={existing_id})."));
            checklist.finalize();
            tracing::info!(uuid = %uuid, existing_id, "CFDI registration lost a duplicate race");
            Ok(Registration::Refused { checklist })
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

fn poisoned(what: &str) -> CfdiError {
    CfdiError::Lookup(format!("{what} lock poisoned"))
}

/// Provider catalog held in memory, keyed by RFC.
#[derive(Debug, Default)]
pub struct MemoryProviderCatalog {
    by_rfc: RwLock<HashMap<String, u64>>,
}

impl MemoryProviderCatalog {
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Self {
            by_rfc: RwLock::new(
                providers
                    .into_iter()
                    .map(|(id, rfc)| (rfc.into(), id))
                    .collect(),
            ),
        }
    }

    pub fn add(&self, id: u64, rfc: impl Into<String>) -> Result<(), CfdiError> {
        self.by_rfc
            .write()
            .map_err(|_| poisoned("provider catalog"))?
            .insert(rfc.into(), id);
        Ok(())
    }
}

impl ProviderCatalog for MemoryProviderCatalog {
    fn provider_id_for_rfc(&self, rfc: &str) -> Result<Option<u64>, CfdiError> {
        let map = self.by_rfc.read().map_err(|_| poisoned("provider catalog"))?;
        Ok(map.get(rfc).copied())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    last_id: u64,
    by_uuid: HashMap<String, u64>,
    records: BTreeMap<u64, InvoiceRecord>,
}

/// Invoice store held in memory. UUIDs compare case-insensitively, and
/// uniqueness is enforced atomically under the write lock.
#[derive(Debug, Default)]
pub struct MemoryInvoiceStore {
    inner: RwLock<StoreInner>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: u64) -> Option<InvoiceRecord> {
        self.inner.read().ok()?.records.get(&id).cloned()
    }
}

impl InvoiceStore for MemoryInvoiceStore {
    fn find_by_uuid(&self, uuid: &str) -> Result<Option<u64>, CfdiError> {
        let inner = self.inner.read().map_err(|_| poisoned("invoice store"))?;
        Ok(inner.by_uuid.get(&uuid.to_ascii_uppercase()).copied())
    }

    fn insert(&self, record: InvoiceRecord) -> Result<u64, CfdiError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("invoice store"))?;
        let key = record.uuid.to_ascii_uppercase();
        if let Some(&existing_id) = inner.by_uuid.get(&key) {
            return Err(CfdiError::DuplicateUuid {
                uuid: record.uuid,
                existing_id,
            });
        }
        inner.last_id += 1;
        let id = inner.last_id;
        inner.by_uuid.insert(key, id);
        inner.records.insert(id, record);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(uuid: &str) -> InvoiceRecord {
        InvoiceRecord {
            uuid: uuid.into(),
            rfc_emisor: "AAA010101AAA".into(),
            fecha_emision: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            fecha_timbrado: None,
            subtotal: Some("100.00".into()),
            iva: dec!(16.00),
            con_iva: Some("116.00".into()),
            descuento: None,
            isr: Decimal::ZERO,
            retenciones: Decimal::ZERO,
            importe_pago: Some(dec!(116.00)),
            proveedor_id: 1,
            xml: "<x/>".into(),
        }
    }

    #[test]
    fn store_assigns_ids_and_rejects_duplicates() {
        let store = MemoryInvoiceStore::new();
        assert!(store.is_empty());
        let first = store.insert(record("abc-1")).unwrap();
        let second = store.insert(record("abc-2")).unwrap();
        assert_eq!((first, second), (1, 2));

        let err = store.insert(record("ABC-1")).unwrap_err();
        assert!(matches!(err, CfdiError::DuplicateUuid { existing_id: 1, .. }));
        assert_eq!(store.find_by_uuid("ABC-2").unwrap(), Some(2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().uuid, "abc-1");
    }

    #[test]
    fn concurrent_inserts_of_one_uuid_store_once() {
        let store = std::sync::Arc::new(MemoryInvoiceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.insert(record("same")).is_ok())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn catalog_lookup() {
        let catalog = MemoryProviderCatalog::new([(3, "AAA010101AAA")]);
        catalog.add(4, "BBB010101BBB").unwrap();
        assert_eq!(catalog.provider_id_for_rfc("AAA010101AAA").unwrap(), Some(3));
        assert_eq!(catalog.provider_id_for_rfc("BBB010101BBB").unwrap(), Some(4));
        assert_eq!(catalog.provider_id_for_rfc("CCC010101CCC").unwrap(), None);
    }

    #[test]
    fn refused_registration_keeps_checklist() {
        let validator = CfdiValidator::new(crate::core::ValidatorConfig::with_schema_dir(
            "/nonexistent/xsd/dir",
        ));
        let catalog = MemoryProviderCatalog::default();
        let store = MemoryInvoiceStore::new();
        let outcome = register_invoice(&validator, b"<broken", &catalog, &store).unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.id(), None);
        assert!(!outcome.checklist().xml_ok);
        assert!(store.is_empty());
    }
}
