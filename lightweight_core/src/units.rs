//! Unit conversion and display formatting for stored measurements.
//!
//! Stored weights are always kilograms. The display unit is a caller
//! preference passed into every call here, never ambient state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pounds per kilogram
const LB_PER_KG: f64 = 2.20462;

/// Display unit for weights
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum WeightUnit {
    #[default]
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "lb")]
    Pounds,
}

impl WeightUnit {
    /// Short symbol shown next to values
    pub fn symbol(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kg",
            WeightUnit::Pounds => "lb",
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for WeightUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kg" | "kgs" | "kilogram" | "kilograms" => Ok(WeightUnit::Kilograms),
            "lb" | "lbs" | "pound" | "pounds" => Ok(WeightUnit::Pounds),
            other => Err(Error::InvalidData(format!("Unknown weight unit: {}", other))),
        }
    }
}

// ============================================================================
// Weight
// ============================================================================

/// Convert a weight between units, truncating toward zero.
///
/// Truncation makes the conversion lossy: `100 kg -> 220 lb -> 99 kg`.
pub fn convert_weight(value: i32, from: WeightUnit, to: WeightUnit) -> i32 {
    if from == to {
        return value;
    }
    match (from, to) {
        (WeightUnit::Kilograms, WeightUnit::Pounds) => (value as f64 * LB_PER_KG) as i32,
        _ => (value as f64 / LB_PER_KG) as i32,
    }
}

/// Convert a stored (kilogram) weight into the display unit
pub fn display_weight(stored_kg: i32, unit: WeightUnit) -> i32 {
    convert_weight(stored_kg, WeightUnit::Kilograms, unit)
}

/// `"<weight> <symbol>"`, e.g. `"100 kg"`
pub fn format_weight(stored_kg: i32, unit: WeightUnit) -> String {
    format!("{} {}", display_weight(stored_kg, unit), unit.symbol())
}

/// `"<weight><symbol> × <reps>"`, or `"<weight><symbol>"` without reps
pub fn format_weight_with_reps(stored_kg: i32, reps: Option<i32>, unit: WeightUnit) -> String {
    let shown = display_weight(stored_kg, unit);
    match reps {
        Some(reps) => format!("{}{} × {}", shown, unit.symbol(), reps),
        None => format!("{}{}", shown, unit.symbol()),
    }
}

// ============================================================================
// Time
// ============================================================================

/// Split a duration in seconds into (hours, minutes, seconds, milliseconds)
pub fn time_components(seconds: f64) -> (i64, i64, i64, i64) {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total = seconds.trunc() as i64;
    let millis = ((seconds.fract() * 1000.0).round() as i64).min(999);
    (total / 3600, (total % 3600) / 60, total % 60, millis)
}

/// Render a duration for display.
///
/// - `H:MM:SS` when there are hours
/// - `M:SS` when there are minutes
/// - `S.mmm` for sub-second values under one second
/// - `SS"` otherwise
pub fn format_time(seconds: f64) -> String {
    let (hours, minutes, secs, millis) = time_components(seconds);
    let whole = hours * 3600 + minutes * 60 + secs;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}:{:02}", minutes, secs)
    } else if millis > 0 && whole == 0 {
        format!("{}.{:03}", secs, millis)
    } else {
        format!("{}\"", secs)
    }
}

/// Parse `SS[.mmm]`, `M:SS[.mmm]` or `H:MM:SS[.mmm]` into seconds
pub fn parse_time(input: &str) -> Result<f64> {
    let invalid = || Error::InvalidData(format!("Invalid time: {:?}", input));

    let parts: Vec<&str> = input.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    let (last, leading) = parts.split_last().ok_or_else(invalid)?;
    let seconds: f64 = last.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 || (!leading.is_empty() && seconds >= 60.0) {
        return Err(invalid());
    }

    let mut total = seconds;
    let mut scale = 60.0;
    for (i, part) in leading.iter().rev().enumerate() {
        let value: u32 = part.parse().map_err(|_| invalid())?;
        // Minutes are bounded when an hour field follows them
        if i == 0 && leading.len() == 2 && value >= 60 {
            return Err(invalid());
        }
        total += value as f64 * scale;
        scale *= 60.0;
    }

    Ok(total)
}

// ============================================================================
// Other values
// ============================================================================

/// Three significant digits in the style of C's `%.3g`
pub fn format_other(value: f64) -> String {
    format_significant(value, 3)
}

/// `format_other` followed by the lowercased unit label when one is given
pub fn format_other_with_units(value: f64, units: Option<&str>) -> String {
    let formatted = format_other(value);
    match units {
        Some(units) if !units.trim().is_empty() => {
            format!("{} {}", formatted, units.to_lowercase())
        }
        _ => formatted,
    }
}

fn format_significant(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if value == 0.0 {
        return "0".into();
    }

    // Exponent after rounding to the requested significant digits
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (scientific.clone(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(&mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_weight_identity() {
        assert_eq!(convert_weight(100, WeightUnit::Pounds, WeightUnit::Pounds), 100);
    }

    #[test]
    fn test_convert_weight_truncates() {
        assert_eq!(convert_weight(100, WeightUnit::Kilograms, WeightUnit::Pounds), 220);
        assert_eq!(convert_weight(220, WeightUnit::Pounds, WeightUnit::Kilograms), 99);
    }

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(100, WeightUnit::Kilograms), "100 kg");
        assert_eq!(format_weight(100, WeightUnit::Pounds), "220 lb");
    }

    #[test]
    fn test_format_weight_with_reps() {
        assert_eq!(
            format_weight_with_reps(100, Some(5), WeightUnit::Kilograms),
            "100kg × 5"
        );
        assert_eq!(format_weight_with_reps(100, None, WeightUnit::Pounds), "220lb");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(75.0), "1:15");
        assert_eq!(format_time(3661.0), "1:01:01");
        assert_eq!(format_time(45.0), "45\"");
        assert_eq!(format_time(0.25), "0.250");
        assert_eq!(format_time(45.5), "45\"");
        assert_eq!(format_time(0.0), "0\"");
    }

    #[test]
    fn test_time_components() {
        assert_eq!(time_components(3723.5), (1, 2, 3, 500));
        assert_eq!(time_components(-4.0), (0, 0, 0, 0));
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("45").unwrap(), 45.0);
        assert_eq!(parse_time("1:15").unwrap(), 75.0);
        assert_eq!(parse_time("1:01:01").unwrap(), 3661.0);
        assert_eq!(parse_time("0:59.5").unwrap(), 59.5);
        assert!(parse_time("1:75").is_err());
        assert!(parse_time("1:60:00").is_err());
        assert!(parse_time("abc").is_err());
        assert!(parse_time("1:2:3:4").is_err());
    }

    #[test]
    fn test_format_other() {
        assert_eq!(format_other(12.5), "12.5");
        assert_eq!(format_other(150.0), "150");
        assert_eq!(format_other(0.5), "0.5");
        assert_eq!(format_other(3.14159), "3.14");
        assert_eq!(format_other(1234.0), "1.23e+03");
        assert_eq!(format_other(0.0), "0");
        assert_eq!(format_other(999.9), "1e+03");
    }

    #[test]
    fn test_format_other_with_units() {
        assert_eq!(format_other_with_units(42.0, Some("Calories")), "42 calories");
        assert_eq!(format_other_with_units(42.0, None), "42");
    }

    #[test]
    fn test_weight_unit_parse() {
        assert_eq!("lbs".parse::<WeightUnit>().unwrap(), WeightUnit::Pounds);
        assert_eq!("KG".parse::<WeightUnit>().unwrap(), WeightUnit::Kilograms);
        assert!("stone".parse::<WeightUnit>().is_err());
    }
}
