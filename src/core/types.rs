use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::error::SchemaViolation;

// ---------------------------------------------------------------------------
// Extracted fiscal fields
// ---------------------------------------------------------------------------

/// Fiscal fields read from the original (unstripped) CFDI.
///
/// `subtotal`, `con_iva` and `descuento` are kept exactly as written in the
/// document. Tax sums are computed with [`Decimal`]; a missing tax line
/// contributes zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExtractedFields {
    /// Fiscal folio from the Timbre Fiscal Digital.
    pub uuid: Option<String>,
    /// Issuer RFC (`cfdi:Emisor/@Rfc`).
    pub rfc_emisor: Option<String>,
    /// Issuance date (`cfdi:Comprobante/@Fecha`).
    pub fecha_emision: Option<NaiveDate>,
    /// Stamping date (`tfd:TimbreFiscalDigital/@FechaTimbrado`).
    pub fecha_timbrado: Option<NaiveDate>,
    /// Raw `SubTotal` attribute.
    pub subtotal: Option<String>,
    /// Raw `Total` attribute (amount including tax).
    pub con_iva: Option<String>,
    /// Raw `Descuento` attribute.
    pub descuento: Option<String>,
    /// Sum of transferred taxes with code `002` (IVA).
    pub iva: Decimal,
    /// Sum of withholdings with code `001` (ISR).
    pub isr: Decimal,
    /// Sum of withholdings whose code is neither `001` nor `002`.
    pub retenciones: Decimal,
    /// `con_iva - isr - retenciones`; absent when `Total` is missing or not numeric.
    pub importe_pago: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Timbre Fiscal Digital attribute report
// ---------------------------------------------------------------------------

/// Required attributes of `tfd:TimbreFiscalDigital` version 1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StampAttribute {
    Version,
    Uuid,
    FechaTimbrado,
    RfcProvCertif,
    SelloCfd,
    NoCertificadoSat,
    SelloSat,
}

impl StampAttribute {
    /// All required attributes, in report order.
    pub const ALL: [StampAttribute; 7] = [
        StampAttribute::Version,
        StampAttribute::Uuid,
        StampAttribute::FechaTimbrado,
        StampAttribute::RfcProvCertif,
        StampAttribute::SelloCfd,
        StampAttribute::NoCertificadoSat,
        StampAttribute::SelloSat,
    ];

    /// XML attribute name.
    pub fn name(&self) -> &'static str {
        match self {
            StampAttribute::Version => "Version",
            StampAttribute::Uuid => "UUID",
            StampAttribute::FechaTimbrado => "FechaTimbrado",
            StampAttribute::RfcProvCertif => "RfcProvCertif",
            StampAttribute::SelloCfd => "SelloCFD",
            StampAttribute::NoCertificadoSat => "NoCertificadoSAT",
            StampAttribute::SelloSat => "SelloSAT",
        }
    }
}

impl std::fmt::Display for StampAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of checking one stamp attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StampStatus {
    /// Attribute absent or empty.
    #[serde(rename = "faltante")]
    Missing,
    /// Present but fails its format rule.
    #[serde(rename = "inválido")]
    Invalid,
    #[serde(rename = "ok")]
    Ok,
}

impl StampStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StampStatus::Missing => "faltante",
            StampStatus::Invalid => "inválido",
            StampStatus::Ok => "ok",
        }
    }
}

impl std::fmt::Display for StampStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-attribute status of a Timbre Fiscal Digital, in [`StampAttribute::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StampFieldReport {
    fields: Vec<(StampAttribute, StampStatus)>,
}

impl StampFieldReport {
    pub(crate) fn push(&mut self, attribute: StampAttribute, status: StampStatus) {
        self.fields.push((attribute, status));
    }

    /// Status of one attribute, if it was checked.
    pub fn get(&self, attribute: StampAttribute) -> Option<StampStatus> {
        self.fields
            .iter()
            .find(|(a, _)| *a == attribute)
            .map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StampAttribute, StampStatus)> + '_ {
        self.fields.iter().copied()
    }

    /// True when every required attribute was checked and scored `ok`.
    pub fn all_ok(&self) -> bool {
        self.fields.len() == StampAttribute::ALL.len()
            && self.fields.iter().all(|(_, s)| *s == StampStatus::Ok)
    }

    /// Attributes that did not score `ok`.
    pub fn failures(&self) -> impl Iterator<Item = (StampAttribute, StampStatus)> + '_ {
        self.iter().filter(|(_, s)| *s != StampStatus::Ok)
    }
}

impl Serialize for StampFieldReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (attribute, status) in &self.fields {
            map.serialize_entry(attribute.name(), status)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Validation checklist
// ---------------------------------------------------------------------------

/// Aggregate result of validating one CFDI submission.
///
/// Every failure path still produces a checklist; the caller renders
/// `messages` to the operator and decides on registration with [`ok`](Self::ok).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationChecklist {
    pub xml_ok: bool,
    pub xsd_ok: bool,
    pub timbre_ok: bool,
    pub rfc_ok: bool,
    pub uuid_ok: bool,
    /// Conjunction of all the checks above.
    pub ok: bool,
    /// Operator-facing messages, each prefixed with ✅, ❌ or ℹ️.
    pub messages: Vec<String>,
    /// Technical diagnostics.
    pub errors: Vec<String>,
    /// Fields from the original document; absent when the XML is not well-formed.
    pub extracted: Option<ExtractedFields>,
    /// Schema violations, bounded by the configured maximum.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub xsd_errors: Vec<SchemaViolation>,
    /// Per-attribute stamp report; absent when no stamp element exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timbre: Option<StampFieldReport>,
}

impl ValidationChecklist {
    /// Record a passing check.
    pub(crate) fn pass(&mut self, message: impl std::fmt::Display) {
        self.messages.push(format!("✅ {message}"));
    }

    /// Record a failing check.
    pub(crate) fn fail(&mut self, message: impl std::fmt::Display) {
        self.messages.push(format!("❌ {message}"));
    }

    /// Record an informational note.
    pub(crate) fn info(&mut self, message: impl std::fmt::Display) {
        self.messages.push(format!("ℹ️ {message}"));
    }

    /// Recompute [`ok`](Self::ok) from the individual checks.
    pub fn finalize(&mut self) {
        self.ok = self.xml_ok && self.xsd_ok && self.timbre_ok && self.rfc_ok && self.uuid_ok;
    }

    /// Names of the checks that did not pass.
    pub fn failed_checks(&self) -> Vec<&'static str> {
        [
            ("xml_ok", self.xml_ok),
            ("xsd_ok", self.xsd_ok),
            ("timbre_ok", self.timbre_ok),
            ("rfc_ok", self.rfc_ok),
            ("uuid_ok", self.uuid_ok),
        ]
        .into_iter()
        .filter(|(_, passed)| !passed)
        .map(|(name, _)| name)
        .collect()
    }

    /// Render the checklist as a JSON document.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, super::CfdiError> {
        serde_json::to_string_pretty(self).map_err(|e| super::CfdiError::Io(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_all_ok_requires_every_attribute() {
        let mut report = StampFieldReport::default();
        for attr in StampAttribute::ALL.iter().take(6) {
            report.push(*attr, StampStatus::Ok);
        }
        assert!(!report.all_ok());
        report.push(StampAttribute::SelloSat, StampStatus::Ok);
        assert!(report.all_ok());
    }

    #[test]
    fn finalize_is_conjunction() {
        let mut c = ValidationChecklist {
            xml_ok: true,
            xsd_ok: true,
            timbre_ok: true,
            rfc_ok: true,
            uuid_ok: false,
            ..Default::default()
        };
        c.finalize();
        assert!(!c.ok);
        assert_eq!(c.failed_checks(), vec!["uuid_ok"]);
        c.uuid_ok = true;
        c.finalize();
        assert!(c.ok);
    }

    #[test]
    fn message_prefixes() {
        let mut c = ValidationChecklist::default();
        c.pass("XML bien formado");
        c.fail("XSD inválido");
        c.info("Addenda detectada");
        assert_eq!(c.messages[0], "✅ XML bien formado");
        assert_eq!(c.messages[1], "❌ XSD inválido");
        assert!(c.messages[2].starts_with("ℹ️"));
    }
}
