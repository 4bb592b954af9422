//! Built-in XML Schema datatypes and facet checks.

use std::str::FromStr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use super::model::Facets;

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());
static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})(Z|[+-]\d{2}:\d{2})?$").unwrap()
});
static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(\.\d+)?(Z|[+-]\d{2}:\d{2})?$")
        .unwrap()
});
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});
static GYEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{4,}(Z|[+-]\d{2}:\d{2})?$").unwrap());
static GYEARMONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{4,}-(0[1-9]|1[0-2])(Z|[+-]\d{2}:\d{2})?$").unwrap());
static HEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2})*$").unwrap());
static NCNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}._\-]*$").unwrap());
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_:][\p{L}\p{N}._:\-]*$").unwrap());
static NMTOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}._:\-]+$").unwrap());
static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap());

/// `whiteSpace` facet values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            WhiteSpace::Preserve => value.to_string(),
            WhiteSpace::Replace => value
                .chars()
                .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
                .collect(),
            WhiteSpace::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Built-in simple types understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    NmToken,
    Decimal,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    Time,
    GYear,
    GYearMonth,
    Base64Binary,
    HexBinary,
    AnyUri,
    QName,
}

impl Builtin {
    /// Look up a type by its local name in the XML Schema namespace.
    pub fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "anySimpleType" => Builtin::AnySimpleType,
            "string" => Builtin::String,
            "normalizedString" => Builtin::NormalizedString,
            "token" => Builtin::Token,
            "language" => Builtin::Language,
            "Name" => Builtin::Name,
            "NCName" | "ID" | "IDREF" | "ENTITY" => Builtin::NcName,
            "NMTOKEN" => Builtin::NmToken,
            "decimal" => Builtin::Decimal,
            "integer" => Builtin::Integer,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            "nonPositiveInteger" => Builtin::NonPositiveInteger,
            "negativeInteger" => Builtin::NegativeInteger,
            "long" => Builtin::Long,
            "int" => Builtin::Int,
            "short" => Builtin::Short,
            "byte" => Builtin::Byte,
            "unsignedLong" => Builtin::UnsignedLong,
            "unsignedInt" => Builtin::UnsignedInt,
            "unsignedShort" => Builtin::UnsignedShort,
            "unsignedByte" => Builtin::UnsignedByte,
            "float" => Builtin::Float,
            "double" => Builtin::Double,
            "boolean" => Builtin::Boolean,
            "date" => Builtin::Date,
            "dateTime" => Builtin::DateTime,
            "time" => Builtin::Time,
            "gYear" => Builtin::GYear,
            "gYearMonth" => Builtin::GYearMonth,
            "base64Binary" => Builtin::Base64Binary,
            "hexBinary" => Builtin::HexBinary,
            "anyURI" => Builtin::AnyUri,
            "QName" => Builtin::QName,
            _ => return None,
        })
    }

    pub fn white_space(&self) -> WhiteSpace {
        match self {
            Builtin::String | Builtin::AnySimpleType => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Types whose range facets compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Builtin::Decimal
                | Builtin::Integer
                | Builtin::NonNegativeInteger
                | Builtin::PositiveInteger
                | Builtin::NonPositiveInteger
                | Builtin::NegativeInteger
                | Builtin::Long
                | Builtin::Int
                | Builtin::Short
                | Builtin::Byte
                | Builtin::UnsignedLong
                | Builtin::UnsignedInt
                | Builtin::UnsignedShort
                | Builtin::UnsignedByte
                | Builtin::Float
                | Builtin::Double
        )
    }

    /// Check the lexical form of an already whitespace-normalized value.
    pub fn check(&self, v: &str) -> Result<(), String> {
        let ok = match self {
            Builtin::AnySimpleType
            | Builtin::String
            | Builtin::NormalizedString
            | Builtin::Token
            | Builtin::AnyUri => true,
            Builtin::Language => LANGUAGE_RE.is_match(v),
            Builtin::Name => NAME_RE.is_match(v),
            Builtin::NcName => NCNAME_RE.is_match(v),
            Builtin::NmToken => NMTOKEN_RE.is_match(v),
            Builtin::QName => match v.split_once(':') {
                Some((p, l)) => NCNAME_RE.is_match(p) && NCNAME_RE.is_match(l),
                None => NCNAME_RE.is_match(v),
            },
            Builtin::Decimal => DECIMAL_RE.is_match(v),
            Builtin::Float | Builtin::Double => {
                matches!(v, "INF" | "-INF" | "NaN")
                    || (!v.contains(['i', 'I', 'n', 'N']) && v.parse::<f64>().is_ok())
            }
            Builtin::Boolean => matches!(v, "true" | "false" | "1" | "0"),
            Builtin::Date => check_date(v),
            Builtin::DateTime => check_date_time(v),
            Builtin::Time => TIME_RE.captures(v).is_some_and(|c| {
                check_clock(&c[1], &c[2], &c[3])
            }),
            Builtin::GYear => GYEAR_RE.is_match(v),
            Builtin::GYearMonth => GYEARMONTH_RE.is_match(v),
            Builtin::Base64Binary => {
                let compact: String = v.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD.decode(compact.as_bytes()).is_ok()
            }
            Builtin::HexBinary => HEX_RE.is_match(v),
            integer => return check_integer(*integer, v),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{v}' is not a valid value of the atomic type 'xs:{}'", self.xs_name()))
        }
    }

    fn xs_name(&self) -> &'static str {
        match self {
            Builtin::AnySimpleType => "anySimpleType",
            Builtin::String => "string",
            Builtin::NormalizedString => "normalizedString",
            Builtin::Token => "token",
            Builtin::Language => "language",
            Builtin::Name => "Name",
            Builtin::NcName => "NCName",
            Builtin::NmToken => "NMTOKEN",
            Builtin::Decimal => "decimal",
            Builtin::Integer => "integer",
            Builtin::NonNegativeInteger => "nonNegativeInteger",
            Builtin::PositiveInteger => "positiveInteger",
            Builtin::NonPositiveInteger => "nonPositiveInteger",
            Builtin::NegativeInteger => "negativeInteger",
            Builtin::Long => "long",
            Builtin::Int => "int",
            Builtin::Short => "short",
            Builtin::Byte => "byte",
            Builtin::UnsignedLong => "unsignedLong",
            Builtin::UnsignedInt => "unsignedInt",
            Builtin::UnsignedShort => "unsignedShort",
            Builtin::UnsignedByte => "unsignedByte",
            Builtin::Float => "float",
            Builtin::Double => "double",
            Builtin::Boolean => "boolean",
            Builtin::Date => "date",
            Builtin::DateTime => "dateTime",
            Builtin::Time => "time",
            Builtin::GYear => "gYear",
            Builtin::GYearMonth => "gYearMonth",
            Builtin::Base64Binary => "base64Binary",
            Builtin::HexBinary => "hexBinary",
            Builtin::AnyUri => "anyURI",
            Builtin::QName => "QName",
        }
    }
}

fn check_integer(ty: Builtin, v: &str) -> Result<(), String> {
    let invalid = || format!("'{v}' is not a valid value of the atomic type 'xs:{}'", ty.xs_name());
    if !INTEGER_RE.is_match(v) {
        return Err(invalid());
    }
    // Values beyond i128 can only be valid for the unbounded integer types.
    let n = match v.trim_start_matches('+').parse::<i128>() {
        Ok(n) => n,
        Err(_) => {
            let negative = v.starts_with('-');
            return match ty {
                Builtin::Integer => Ok(()),
                Builtin::NonNegativeInteger | Builtin::PositiveInteger if !negative => Ok(()),
                Builtin::NonPositiveInteger | Builtin::NegativeInteger if negative => Ok(()),
                _ => Err(invalid()),
            };
        }
    };
    let (min, max): (i128, i128) = match ty {
        Builtin::NonNegativeInteger => (0, i128::MAX),
        Builtin::PositiveInteger => (1, i128::MAX),
        Builtin::NonPositiveInteger => (i128::MIN, 0),
        Builtin::NegativeInteger => (i128::MIN, -1),
        Builtin::Long => (i64::MIN.into(), i64::MAX.into()),
        Builtin::Int => (i32::MIN.into(), i32::MAX.into()),
        Builtin::Short => (i16::MIN.into(), i16::MAX.into()),
        Builtin::Byte => (i8::MIN.into(), i8::MAX.into()),
        Builtin::UnsignedLong => (0, u64::MAX.into()),
        Builtin::UnsignedInt => (0, u32::MAX.into()),
        Builtin::UnsignedShort => (0, u16::MAX.into()),
        Builtin::UnsignedByte => (0, u8::MAX.into()),
        _ => (i128::MIN, i128::MAX),
    };
    if (min..=max).contains(&n) {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn check_date(v: &str) -> bool {
    DATE_RE
        .captures(v)
        .is_some_and(|c| valid_ymd(&c[1], &c[2], &c[3]))
}

fn check_date_time(v: &str) -> bool {
    DATETIME_RE.captures(v).is_some_and(|c| {
        valid_ymd(&c[1], &c[2], &c[3]) && check_clock(&c[4], &c[5], &c[6])
    })
}

fn valid_ymd(y: &str, m: &str, d: &str) -> bool {
    let (Ok(y), Ok(m), Ok(d)) = (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>()) else {
        return false;
    };
    NaiveDate::from_ymd_opt(y, m, d).is_some()
}

fn check_clock(h: &str, m: &str, s: &str) -> bool {
    let (Ok(h), Ok(m), Ok(s)) = (h.parse::<u32>(), m.parse::<u32>(), s.parse::<u32>()) else {
        return false;
    };
    (h < 24 && m < 60 && s < 60) || (h == 24 && m == 0 && s == 0)
}

fn parse_decimal(v: &str) -> Option<Decimal> {
    Decimal::from_str(v.trim_start_matches('+')).ok()
}

impl Facets {
    /// Check the facets of one derivation step against a normalized value.
    ///
    /// `numeric` selects numeric comparison for range facets; `list` makes the
    /// length facets count list items instead of characters.
    pub fn check(&self, v: &str, numeric: bool, list: bool) -> Result<(), String> {
        if !self.enumeration.is_empty() && !self.enumeration.contains(v) {
            return Err(format!(
                "[facet 'enumeration'] The value '{v}' is not an element of the set {{{}}}",
                abbreviate_set(self.enumeration.values())
            ));
        }

        if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.regex.is_match(v)) {
            let sources: Vec<&str> = self.patterns.iter().map(|p| p.source.as_str()).collect();
            return Err(format!(
                "[facet 'pattern'] The value '{v}' is not accepted by the pattern '{}'",
                sources.join("' | '")
            ));
        }

        let len = if list {
            v.split_whitespace().count()
        } else {
            v.chars().count()
        };
        if let Some(n) = self.length {
            if len != n {
                return Err(format!(
                    "[facet 'length'] The value '{v}' has a length of '{len}'; this differs from the allowed length of '{n}'"
                ));
            }
        }
        if let Some(n) = self.min_length {
            if len < n {
                return Err(format!(
                    "[facet 'minLength'] The value '{v}' has a length of '{len}'; this underruns the allowed minimum length of '{n}'"
                ));
            }
        }
        if let Some(n) = self.max_length {
            if len > n {
                return Err(format!(
                    "[facet 'maxLength'] The value '{v}' has a length of '{len}'; this exceeds the allowed maximum length of '{n}'"
                ));
            }
        }

        let checks = [
            ("minInclusive", &self.min_inclusive, std::cmp::Ordering::Less, true),
            ("maxInclusive", &self.max_inclusive, std::cmp::Ordering::Greater, true),
            ("minExclusive", &self.min_exclusive, std::cmp::Ordering::Greater, false),
            ("maxExclusive", &self.max_exclusive, std::cmp::Ordering::Less, false),
        ];
        for (facet, bound, bad, inclusive) in checks {
            let Some(bound) = bound else { continue };
            let Some(ord) = compare(v, bound, numeric) else {
                continue;
            };
            // Inclusive bounds reject the `bad` side; exclusive bounds require it.
            let violated = if inclusive { ord == bad } else { ord != bad };
            if violated {
                return Err(format!(
                    "[facet '{facet}'] The value '{v}' is out of the range bounded by '{bound}'"
                ));
            }
        }

        if self.total_digits.is_some() || self.fraction_digits.is_some() {
            if let Some(d) = parse_decimal(v) {
                let d = d.normalize();
                if let Some(max) = self.fraction_digits {
                    if d.scale() > max {
                        return Err(format!(
                            "[facet 'fractionDigits'] The value '{v}' has more fractional digits than are allowed ('{max}')"
                        ));
                    }
                }
                if let Some(max) = self.total_digits {
                    let digits = d.mantissa().unsigned_abs().to_string().len() as u32;
                    if digits > max {
                        return Err(format!(
                            "[facet 'totalDigits'] The value '{v}' has more digits than are allowed ('{max}')"
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Ordering of `v` relative to `bound`; `None` when not comparable.
fn compare(v: &str, bound: &str, numeric: bool) -> Option<std::cmp::Ordering> {
    if numeric {
        Some(parse_decimal(v)?.cmp(&parse_decimal(bound)?))
    } else {
        Some(v.cmp(bound))
    }
}

fn abbreviate_set(values: &[String]) -> String {
    const SHOWN: usize = 8;
    let mut shown: Vec<String> = values.iter().take(SHOWN).map(|v| format!("'{v}'")).collect();
    if values.len() > SHOWN {
        shown.push(format!("... ({} más)", values.len() - SHOWN));
    }
    shown.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::model::Pattern;

    #[test]
    fn white_space_modes() {
        assert_eq!(WhiteSpace::Preserve.apply(" a\tb "), " a\tb ");
        assert_eq!(WhiteSpace::Replace.apply(" a\tb\n"), " a b ");
        assert_eq!(WhiteSpace::Collapse.apply("  a \t b\n"), "a b");
    }

    #[test]
    fn decimal_and_integer_lexical_forms() {
        assert!(Builtin::Decimal.check("1160.00").is_ok());
        assert!(Builtin::Decimal.check("-.5").is_ok());
        assert!(Builtin::Decimal.check("1e3").is_err());
        assert!(Builtin::Decimal.check("").is_err());
        assert!(Builtin::Int.check("2147483647").is_ok());
        assert!(Builtin::Int.check("2147483648").is_err());
        assert!(Builtin::NonNegativeInteger.check("-1").is_err());
        assert!(Builtin::PositiveInteger.check("0").is_err());
        assert!(Builtin::Integer.check("123456789012345678901234567890123456789012").is_ok());
        assert!(Builtin::UnsignedByte.check("256").is_err());
    }

    #[test]
    fn date_time_forms() {
        assert!(Builtin::DateTime.check("2024-02-29T23:59:59").is_ok());
        assert!(Builtin::DateTime.check("2023-02-29T10:00:00").is_err());
        assert!(Builtin::DateTime.check("2024-01-01T24:00:00").is_ok());
        assert!(Builtin::DateTime.check("2024-01-01T25:00:00").is_err());
        assert!(Builtin::DateTime.check("2024-01-01T10:00:00.123-06:00").is_ok());
        assert!(Builtin::Date.check("2024-13-01").is_err());
        assert!(Builtin::Date.check("2024-12-01Z").is_ok());
        assert!(Builtin::Time.check("12:30:00").is_ok());
    }

    #[test]
    fn binary_forms() {
        assert!(Builtin::Base64Binary.check("SGVsbG8=").is_ok());
        assert!(Builtin::Base64Binary.check("SGVsbG8").is_err());
        assert!(Builtin::HexBinary.check("0aFF").is_ok());
        assert!(Builtin::HexBinary.check("0aF").is_err());
        assert!(Builtin::Boolean.check("yes").is_err());
    }

    fn importe_facets() -> Facets {
        Facets {
            fraction_digits: Some(6),
            min_inclusive: Some("0.000000".into()),
            patterns: vec![Pattern {
                source: "[0-9]{1,18}(.[0-9]{1,6})?".into(),
                regex: Regex::new("^(?:[0-9]{1,18}(.[0-9]{1,6})?)$").unwrap(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn importe_facets_accept_and_reject() {
        let f = importe_facets();
        assert!(f.check("1160.00", true, false).is_ok());
        assert!(f.check("0", true, false).is_ok());
        let err = f.check("1.1234567", true, false).unwrap_err();
        assert!(err.contains("pattern"), "{err}");
        let err = f.check("-1", true, false).unwrap_err();
        assert!(err.contains("pattern"), "{err}");
    }

    #[test]
    fn range_and_digit_facets() {
        let f = Facets {
            min_exclusive: Some("0".into()),
            max_inclusive: Some("100".into()),
            total_digits: Some(4),
            fraction_digits: Some(2),
            ..Default::default()
        };
        assert!(f.check("0", true, false).unwrap_err().contains("minExclusive"));
        assert!(f.check("0.01", true, false).is_ok());
        assert!(f.check("100", true, false).is_ok());
        assert!(f.check("100.5", true, false).unwrap_err().contains("maxInclusive"));
        assert!(f.check("1.005", true, false).unwrap_err().contains("fractionDigits"));
        assert!(f.check("1.50", true, false).is_ok());
        assert!(f.check("99.99", true, false).is_ok());
    }

    #[test]
    fn enumeration_and_length() {
        let f = Facets {
            enumeration: ["MXN", "USD"].into_iter().collect(),
            length: Some(3),
            ..Default::default()
        };
        assert!(f.check("MXN", false, false).is_ok());
        assert!(f.check("EUR", false, false).unwrap_err().contains("enumeration"));

        let lens = Facets {
            min_length: Some(1),
            max_length: Some(3),
            ..Default::default()
        };
        assert!(lens.check("", false, false).unwrap_err().contains("minLength"));
        assert!(lens.check("abcd", false, false).unwrap_err().contains("maxLength"));
        assert!(lens.check("a b c d", false, true).unwrap_err().contains("maxLength"));
    }

    #[test]
    fn large_catalog_membership_and_message() {
        let f = Facets {
            enumeration: (0..60_000).map(|n| format!("{n:08}")).collect(),
            ..Default::default()
        };
        assert!(f.check("00059999", false, false).is_ok());
        assert!(f.check("00000000", false, false).is_ok());
        let err = f.check("99999999", false, false).unwrap_err();
        assert!(err.contains("'00000000', '00000001'"), "{err}");
        assert!(err.contains("(59992 más)"), "{err}");
    }
}
