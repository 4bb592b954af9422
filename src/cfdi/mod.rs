//! CFDI 4.0 validation pipeline.
//!
//! [`CfdiValidator`] owns the compiled schema and runs the per-document
//! steps: well-formedness, field extraction, schema stripping and
//! validation, and Timbre Fiscal Digital checks. [`CfdiValidator::validate`]
//! adds the provider catalog and duplicate-UUID checks, and
//! [`register_invoice`] persists an invoice that passed all of them.
//!
//! ```no_run
//! use cfdi_check::cfdi::{CfdiValidator, MemoryInvoiceStore, MemoryProviderCatalog};
//! use cfdi_check::core::ValidatorConfig;
//!
//! let validator = CfdiValidator::new(ValidatorConfig::with_schema_dir("XSD/CFD/4"));
//! let xml = std::fs::read("factura.xml").unwrap();
//!
//! let checklist = validator.build_checklist(&xml);
//! println!("xml={} xsd={} timbre={}", checklist.xml_ok, checklist.xsd_ok, checklist.timbre_ok);
//! ```

mod checklist;
mod extract;
mod register;
mod rules;
mod stamp;
mod strip;

pub use checklist::CfdiValidator;
pub use extract::{Extraction, extract_fields, parse_fiscal_date};
pub use register::{
    InvoiceRecord, MemoryInvoiceStore, MemoryProviderCatalog, Registration, register_invoice,
};
pub use rules::{InvoiceStore, ProviderCatalog, apply_business_rules};
pub use stamp::{find_stamp, validate_stamp};
pub use strip::{StrippedDocument, strip_for_schema};

/// CFDI 4.0 namespace.
pub const CFDI_NS: &str = "http://www.sat.gob.mx/cfd/4";

/// Timbre Fiscal Digital namespace.
pub const TFD_NS: &str = "http://www.sat.gob.mx/TimbreFiscalDigital";

/// SAT tax code for ISR (income tax).
pub const TAX_ISR: &str = "001";

/// SAT tax code for IVA (value-added tax).
pub const TAX_IVA: &str = "002";
