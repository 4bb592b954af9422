use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::stamp::find_stamp;
use super::{CFDI_NS, TAX_ISR, TAX_IVA};
use crate::core::ExtractedFields;
use crate::xml::{Document, Element};

/// Extracted fields plus the anomalies met while reading them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub fields: ExtractedFields,
    /// Non-fatal problems (unparseable amounts, missing total), in Spanish.
    pub issues: Vec<String>,
}

/// Read the fiscal fields from the original, unstripped document.
///
/// Every `cfdi:Traslado` and `cfdi:Retencion` in the document is summed,
/// concept-level lines and the document-level summary alike. Missing
/// `Importe` attributes count as zero.
pub fn extract_fields(doc: &Document) -> Extraction {
    let root = doc.root();
    let mut issues = Vec::new();

    let rfc_emisor = root
        .find_descendant(CFDI_NS, "Emisor")
        .and_then(|e| non_empty(e.attr("Rfc")));
    let subtotal = non_empty(root.attr("SubTotal"));
    let con_iva = non_empty(root.attr("Total"));
    let descuento = non_empty(root.attr("Descuento"));

    let traslados = root.descendants_named(CFDI_NS, "Traslado");
    let retenciones_lines = root.descendants_named(CFDI_NS, "Retencion");

    let iva = sum_amounts(
        traslados.iter().filter(|t| t.attr("Impuesto") == Some(TAX_IVA)),
        &mut issues,
    );
    let isr = sum_amounts(
        retenciones_lines
            .iter()
            .filter(|r| r.attr("Impuesto") == Some(TAX_ISR)),
        &mut issues,
    );
    let retenciones = sum_amounts(
        retenciones_lines
            .iter()
            .filter(|r| !matches!(r.attr("Impuesto"), Some(TAX_ISR | TAX_IVA))),
        &mut issues,
    );

    let importe_pago = match con_iva.as_deref().map(|t| Decimal::from_str(t.trim())) {
        Some(Ok(total)) => Some(total - isr - retenciones),
        Some(Err(_)) => {
            issues.push(format!(
                "Total no numérico ('{}'): no se calcula importe_pago",
                con_iva.as_deref().unwrap_or_default()
            ));
            None
        }
        None => {
            issues.push("Total ausente: no se calcula importe_pago".to_string());
            None
        }
    };

    let stamp = find_stamp(root);
    let uuid = stamp.and_then(|s| non_empty(s.attr("UUID")));
    let fecha_timbrado = stamp
        .and_then(|s| s.attr("FechaTimbrado"))
        .and_then(parse_fiscal_date);
    let fecha_emision = root.attr("Fecha").and_then(parse_fiscal_date);

    Extraction {
        fields: ExtractedFields {
            uuid,
            rfc_emisor,
            fecha_emision,
            fecha_timbrado,
            subtotal,
            con_iva,
            descuento,
            iva,
            isr,
            retenciones,
            importe_pago,
        },
        issues,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn sum_amounts<'a>(lines: impl Iterator<Item = &'a &'a Element>, issues: &mut Vec<String>) -> Decimal {
    lines.fold(Decimal::ZERO, |acc, line| {
        let raw = line.attr("Importe").map(str::trim).unwrap_or("");
        if raw.is_empty() {
            return acc;
        }
        match Decimal::from_str(raw) {
            Ok(amount) => acc + amount,
            Err(e) => {
                tracing::warn!(
                    element = %line.qualified_name(),
                    importe = raw,
                    error = %e,
                    "unparseable tax amount counted as zero"
                );
                issues.push(format!(
                    "Importe no numérico en {}: '{raw}' (se cuenta como 0)",
                    line.qualified_name()
                ));
                acc
            }
        }
    })
}

/// Date part of an ISO-8601 timestamp.
///
/// Accepts a full date-time with an optional UTC offset or `Z`; when that
/// fails, retries with the first 19 characters (date and time, no offset),
/// then as a bare date. Returns `None` instead of failing.
pub fn parse_fiscal_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_iso_date(s).or_else(|| s.get(..19).and_then(parse_iso_date))
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let normalized = s.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
