//! # cfdi-check
//!
//! Validation pipeline for Mexican electronic invoices (CFDI 4.0): turns a raw
//! XML byte stream into a pass/fail checklist plus the fiscal fields the
//! registration workflow persists.
//!
//! The pipeline runs, in order:
//!
//! 1. well-formedness check ([`xml::Document::parse`]),
//! 2. fiscal field extraction from the original document ([`cfdi::extract_fields`]),
//! 3. structural stripping of the Timbre Fiscal Digital and any Addenda ([`cfdi::strip_for_schema`]),
//! 4. XSD validation against a local schema directory, never over the network ([`xsd::SchemaValidator`]),
//! 5. Timbre Fiscal Digital attribute checks ([`cfdi::validate_stamp`]),
//! 6. business rules against the provider catalog and invoice store ([`cfdi::apply_business_rules`]).
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cfdi_check::cfdi::{CfdiValidator, MemoryInvoiceStore, MemoryProviderCatalog};
//! use cfdi_check::core::ValidatorConfig;
//!
//! let validator = CfdiValidator::new(ValidatorConfig::default().with_env_overrides());
//! let catalog = MemoryProviderCatalog::new([(1, "AAA010101AAA")]);
//! let store = MemoryInvoiceStore::new();
//!
//! let xml = std::fs::read("factura.xml").unwrap();
//! let checklist = validator.validate(&xml, &catalog, &store);
//! for message in &checklist.messages {
//!     println!("{message}");
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Error type, checklist types, configuration |
//! | `xml` | Immutable document tree and serializer |
//! | `xsd` | Local schema index, XSD compiler and instance validator |
//! | `cfdi` (default) | Schema stripping, timbre checks, field extraction, checklist, business rules, registration |
//! | `json` | JSON rendering of the checklist |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "xsd")]
pub mod xsd;

#[cfg(feature = "cfdi")]
pub mod cfdi;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
