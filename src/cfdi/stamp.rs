use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use super::{CFDI_NS, TFD_NS};
use crate::core::{StampAttribute, StampFieldReport, StampStatus};
use crate::xml::Element;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Fa-f0-9]{8}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{12}$")
        .unwrap()
});

static FECHA_TIMBRADO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(20[1-9][0-9])-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])",
        r"T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]",
        r"([+-][0-2][0-9]:[0-5][0-9]|Z)?$",
    ))
    .unwrap()
});

// Certifiers are always moral persons: 3-letter prefix, 12 characters.
static RFC_PROV_CERTIF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z&Ñ]{3}[0-9]{2}(0[1-9]|1[0-2])(0[1-9]|[12][0-9]|3[01])[A-Z0-9]{2}[0-9A]$")
        .unwrap()
});

static NO_CERTIFICADO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{20}$").unwrap());

/// The `tfd:TimbreFiscalDigital` that is a direct child of any
/// `cfdi:Complemento` below `root`, first in document order.
pub fn find_stamp(root: &Element) -> Option<&Element> {
    root.descendants_named(CFDI_NS, "Complemento")
        .into_iter()
        .find_map(|c| c.child(TFD_NS, "TimbreFiscalDigital"))
}

/// Score every required stamp attribute. Values are trimmed first; an empty
/// value counts as missing.
pub fn validate_stamp(stamp: &Element) -> StampFieldReport {
    let mut report = StampFieldReport::default();
    for attribute in StampAttribute::ALL {
        let value = stamp.attr(attribute.name()).map(str::trim).unwrap_or("");
        let status = if value.is_empty() {
            StampStatus::Missing
        } else if is_well_formed(attribute, value) {
            StampStatus::Ok
        } else {
            StampStatus::Invalid
        };
        report.push(attribute, status);
    }
    report
}

fn is_well_formed(attribute: StampAttribute, value: &str) -> bool {
    match attribute {
        StampAttribute::Version => value == "1.1",
        StampAttribute::Uuid => UUID_RE.is_match(value),
        StampAttribute::FechaTimbrado => FECHA_TIMBRADO_RE.is_match(value),
        StampAttribute::RfcProvCertif => RFC_PROV_CERTIF_RE.is_match(value),
        StampAttribute::NoCertificadoSat => NO_CERTIFICADO_RE.is_match(value),
        StampAttribute::SelloCfd | StampAttribute::SelloSat => is_canonical_base64(value),
    }
}

/// Standard-alphabet base64 that survives a decode/encode round trip unchanged.
fn is_canonical_base64(value: &str) -> bool {
    STANDARD
        .decode(value)
        .is_ok_and(|bytes| STANDARD.encode(bytes) == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Document;

    const SELLO: &str = "SGVsbG8gU0FUIQ==";

    fn stamp(attrs: &str) -> Document {
        Document::parse_str(&format!(
            r#"<cfdi:Comprobante xmlns:cfdi="{CFDI_NS}" xmlns:tfd="{TFD_NS}"><cfdi:Complemento><tfd:TimbreFiscalDigital {attrs}/></cfdi:Complemento></cfdi:Comprobante>"#
        ))
        .unwrap()
    }

    fn full(overrides: &[(&str, &str)]) -> String {
        let mut attrs = vec![
            ("Version", "1.1"),
            ("UUID", "6F1E4C2A-9B7D-4E3F-A1B2-C3D4E5F60718"),
            ("FechaTimbrado", "2024-03-15T10:20:30"),
            ("RfcProvCertif", "SAT970701NN3"),
            ("SelloCFD", SELLO),
            ("NoCertificadoSAT", "00001000000504465028"),
            ("SelloSAT", SELLO),
        ];
        for &(k, v) in overrides {
            match attrs.iter().position(|(name, _)| *name == k) {
                Some(i) => attrs[i].1 = v,
                None => attrs.push((k, v)),
            }
        }
        attrs
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn report(overrides: &[(&str, &str)]) -> StampFieldReport {
        let doc = stamp(&full(overrides));
        validate_stamp(find_stamp(doc.root()).unwrap())
    }

    #[test]
    fn complete_stamp_is_ok() {
        assert!(report(&[]).all_ok());
    }

    #[test]
    fn wrong_version_is_invalid_not_missing() {
        let r = report(&[("Version", "1.0")]);
        assert_eq!(r.get(StampAttribute::Version), Some(StampStatus::Invalid));
        assert!(!r.all_ok());
    }

    #[test]
    fn blank_values_are_missing() {
        let r = report(&[("SelloSAT", "   "), ("UUID", "")]);
        assert_eq!(r.get(StampAttribute::SelloSat), Some(StampStatus::Missing));
        assert_eq!(r.get(StampAttribute::Uuid), Some(StampStatus::Missing));
    }

    #[test]
    fn format_rules() {
        let cases = [
            ("NoCertificadoSAT", "ABC", StampAttribute::NoCertificadoSat),
            ("NoCertificadoSAT", "0000100000050446502", StampAttribute::NoCertificadoSat),
            ("FechaTimbrado", "2009-03-15T10:20:30", StampAttribute::FechaTimbrado),
            ("FechaTimbrado", "2024-03-15 10:20:30", StampAttribute::FechaTimbrado),
            ("FechaTimbrado", "2024-13-15T10:20:30", StampAttribute::FechaTimbrado),
            ("RfcProvCertif", "GODE561231GR8X", StampAttribute::RfcProvCertif),
            ("UUID", "6F1E4C2A9B7D4E3FA1B2C3D4E5F60718", StampAttribute::Uuid),
            ("SelloCFD", "SGVsbG8", StampAttribute::SelloCfd),
            ("SelloSAT", "not base64!", StampAttribute::SelloSat),
        ];
        for (name, value, attribute) in cases {
            let r = report(&[(name, value)]);
            assert_eq!(r.get(attribute), Some(StampStatus::Invalid), "{name}={value}");
        }
    }

    #[test]
    fn timestamps_with_offsets_are_accepted() {
        for value in ["2024-03-15T10:20:30Z", "2024-03-15T10:20:30-06:00"] {
            let r = report(&[("FechaTimbrado", value)]);
            assert_eq!(r.get(StampAttribute::FechaTimbrado), Some(StampStatus::Ok), "{value}");
        }
    }

    #[test]
    fn stamp_must_sit_in_complemento() {
        let doc = Document::parse_str(&format!(
            r#"<cfdi:Comprobante xmlns:cfdi="{CFDI_NS}" xmlns:tfd="{TFD_NS}"><tfd:TimbreFiscalDigital/></cfdi:Comprobante>"#
        ))
        .unwrap();
        assert!(find_stamp(doc.root()).is_none());
    }
}
