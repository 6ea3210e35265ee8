//! Parsing of free-form dimension strings such as `"12.5 × 30 × 4"`.
//!
//! The format is a loose convention rather than a schema: records written by
//! older clients or by the detection service (`"0.42×1.20 m"`) must still be
//! readable, so every consumer goes through [`parse_dimensions`] and treats a
//! `None` as "skip this record for this aggregate".

/// Multiplication sign separating the components
pub const SEPARATOR: char = '×';

/// Numeric components of a dimension string, in positional order
#[derive(Debug, Clone, PartialEq)]
pub struct Dimensions {
    components: Vec<f64>,
}

impl Dimensions {
    pub fn components(&self) -> &[f64] {
        &self.components
    }

    /// First component
    pub fn width(&self) -> f64 {
        self.components[0]
    }

    /// Second component. Size averages and categories are keyed on this one.
    pub fn height(&self) -> f64 {
        self.components[1]
    }

    pub fn depth(&self) -> Option<f64> {
        self.components.get(2).copied()
    }
}

/// Parse a dimension string into at least two numeric components.
///
/// Returns `None` when the separator is missing or any segment is not a
/// number. A trailing alphabetic unit on a segment (`"30 cm"`) is accepted.
pub fn parse_dimensions(raw: &str) -> Option<Dimensions> {
    let segments: Vec<&str> = raw.split(SEPARATOR).collect();
    if segments.len() < 2 {
        return None;
    }

    let components = segments
        .iter()
        .map(|segment| parse_component(segment))
        .collect::<Option<Vec<f64>>>()?;

    Some(Dimensions { components })
}

fn parse_component(segment: &str) -> Option<f64> {
    let segment = segment.trim();
    let unit_start = segment
        .find(|c: char| c.is_alphabetic())
        .unwrap_or(segment.len());
    let (number, unit) = segment.split_at(unit_start);

    if !unit.chars().all(char::is_alphabetic) {
        return None;
    }

    let value: f64 = number.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Build the canonical `"w × h [× d] unit"` form
pub fn format_dimensions(components: &[f64], unit: &str) -> String {
    let body = components
        .iter()
        .map(|v| format!("{:.1}", v))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", SEPARATOR));

    if unit.is_empty() {
        body
    } else {
        format!("{} {}", body, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_components() {
        let dims = parse_dimensions("10 × 20").unwrap();
        assert_eq!(dims.width(), 10.0);
        assert_eq!(dims.height(), 20.0);
        assert_eq!(dims.depth(), None);
    }

    #[test]
    fn test_parse_three_components_without_spaces() {
        let dims = parse_dimensions("1.5×2.25×3").unwrap();
        assert_eq!(dims.components(), &[1.5, 2.25, 3.0]);
        assert_eq!(dims.depth(), Some(3.0));
    }

    #[test]
    fn test_parse_accepts_unit_suffix() {
        let dims = parse_dimensions("0.42×1.20 m").unwrap();
        assert_eq!(dims.width(), 0.42);
        assert_eq!(dims.height(), 1.2);

        let dims = parse_dimensions("12cm × 30 cm").unwrap();
        assert_eq!(dims.height(), 30.0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_dimensions("garbage").is_none());
        assert!(parse_dimensions("").is_none());
        assert!(parse_dimensions("42").is_none());
        assert!(parse_dimensions("10 x 20").is_none());
        assert!(parse_dimensions("10 × abc").is_none());
        assert!(parse_dimensions("10 × ").is_none());
        assert!(parse_dimensions("10 × 20 × 3 c m").is_none());
        assert!(parse_dimensions("NaN × 5").is_none());
    }

    #[test]
    fn test_recovers_exact_values() {
        for (a, b) in [(0.0, 0.1), (3.25, 99.5), (-4.0, 7.75), (1200.0, 0.001)] {
            let raw = format!("{} × {}", a, b);
            let dims = parse_dimensions(&raw).unwrap();
            assert_eq!(dims.width(), a);
            assert_eq!(dims.height(), b);
        }
    }

    #[test]
    fn test_format_dimensions() {
        assert_eq!(format_dimensions(&[10.0, 20.5], "cm"), "10.0 × 20.5 cm");
        assert_eq!(format_dimensions(&[1.0, 2.0, 3.0], ""), "1.0 × 2.0 × 3.0");
    }
}
