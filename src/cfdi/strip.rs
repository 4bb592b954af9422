use std::cell::Cell;

use super::{CFDI_NS, TFD_NS};
use crate::xml::Document;

/// Schema-validation copy of a CFDI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedDocument {
    pub document: Document,
    /// `tfd:TimbreFiscalDigital` elements removed from under `cfdi:Complemento`.
    pub stamps_removed: usize,
    /// `cfdi:Addenda` elements removed.
    pub addenda_removed: usize,
}

impl StrippedDocument {
    pub fn is_unchanged(&self) -> bool {
        self.stamps_removed == 0 && self.addenda_removed == 0
    }
}

/// Copy `doc` without the parts the CFDI schema does not describe: every
/// Timbre Fiscal Digital nested in a `cfdi:Complemento`, and every
/// `cfdi:Addenda`. The input is left untouched.
pub fn strip_for_schema(doc: &Document) -> StrippedDocument {
    let stamps = Cell::new(0);
    let addenda = Cell::new(0);

    let document = doc.pruned(|el, ancestors| {
        if el.is(TFD_NS, "TimbreFiscalDigital")
            && ancestors.iter().any(|a| a.is(CFDI_NS, "Complemento"))
        {
            stamps.set(stamps.get() + 1);
            true
        } else if el.is(CFDI_NS, "Addenda") {
            addenda.set(addenda.get() + 1);
            true
        } else {
            false
        }
    });

    StrippedDocument {
        document,
        stamps_removed: stamps.get(),
        addenda_removed: addenda.get(),
    }
}
