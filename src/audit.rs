use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Road types accepted in `tipo_via` tags.
pub const ROAD_TYPES: [&str; 9] = [
    "Avenida",
    "Calle",
    "Camino",
    "Paseo",
    "Plaza",
    "Carrera",
    "Ronda",
    "Carretera",
    "Pasaje",
];

/// Every postcode in the region starts with 28, so this is what anything
/// unrecognisable gets coerced to.
pub const FALLBACK_POSTCODE: &str = "28000";

static POSTCODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^E?(28[0-9]{3})(?:[^0-9]|$)").expect("valid postcode pattern"));

/// A road type that could not be mapped onto `ROAD_TYPES`. Written inline in
/// place of the value so the record can be found again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationError {
    pub raw: String,
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wrong value [{}]", self.raw)
    }
}

impl std::error::Error for NormalizationError {}

fn is_road_type(candidate: &str) -> bool {
    ROAD_TYPES.contains(&candidate)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().to_lowercase();
            first.to_uppercase().chain(rest.chars()).collect()
        },
        None => String::new(),
    }
}

pub fn normalize_road_type(raw: &str) -> Result<String, NormalizationError> {
    if is_road_type(raw) {
        return Ok(raw.to_string());
    }

    // Values like "Calle Mayor" carry the street name after the type.
    let candidate = match raw.split_once(' ') {
        Some((leading, _)) if is_road_type(&capitalize(leading)) => leading,
        _ => raw,
    };

    let candidate = capitalize(candidate);
    if is_road_type(&candidate) {
        Ok(candidate)
    } else {
        Err(NormalizationError { raw: raw.to_string() })
    }
}

pub fn normalize_postcode(raw: &str) -> String {
    POSTCODE_PATTERN
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str().to_string())
        .unwrap_or_else(|| FALLBACK_POSTCODE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_road_types_are_unchanged() {
        for road_type in ROAD_TYPES {
            assert_eq!(normalize_road_type(road_type).unwrap(), road_type);
        }
    }

    #[test]
    fn road_type_drops_street_name() {
        assert_eq!(normalize_road_type("avenida Libertad").unwrap(), "Avenida");
        assert_eq!(normalize_road_type("Avenida Recoletos").unwrap(), "Avenida");
        assert_eq!(normalize_road_type("Calle de Alcalá").unwrap(), "Calle");
    }

    #[test]
    fn road_type_fixes_capitalisation() {
        assert_eq!(normalize_road_type("CALLE").unwrap(), "Calle");
        assert_eq!(normalize_road_type("plaza").unwrap(), "Plaza");
    }

    #[test]
    fn unknown_road_type_reports_raw_value() {
        let err = normalize_road_type("Xyz").unwrap_err();
        assert_eq!(err.raw, "Xyz");
        assert_eq!(err.to_string(), "wrong value [Xyz]");

        let err = normalize_road_type("Travesía del Conde").unwrap_err();
        assert_eq!(err.to_string(), "wrong value [Travesía del Conde]");
    }

    #[test]
    fn empty_road_type_is_an_error() {
        assert!(normalize_road_type("").is_err());
    }

    #[test]
    fn postcode_strips_country_prefix() {
        assert_eq!(normalize_postcode("E28015"), "28015");
        assert_eq!(normalize_postcode("28015"), "28015");
        assert_eq!(normalize_postcode("28015 Madrid"), "28015");
    }

    #[test]
    fn postcode_falls_back_outside_region() {
        assert_eq!(normalize_postcode("Madrid"), FALLBACK_POSTCODE);
        assert_eq!(normalize_postcode("08001"), FALLBACK_POSTCODE);
        assert_eq!(normalize_postcode("2801"), FALLBACK_POSTCODE);
        assert_eq!(normalize_postcode("280151"), FALLBACK_POSTCODE);
        assert_eq!(normalize_postcode(""), FALLBACK_POSTCODE);
    }
}
