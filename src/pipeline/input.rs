/// Parsing of numbers typed by the user.
///
/// Input is read with a `.` decimal separator regardless of locale.

use crate::error::{EsgError, Result};

/// Parse a finite number from a text field
pub fn parse_number(field: &str, text: &str) -> Result<f64> {
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|_| EsgError::validation(format!("{} is not a number: `{}`", field, text.trim())))?;
    check_finite(field, value)
}

/// Reject NaN and infinities in a value that did not come from text
pub fn check_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EsgError::validation(format!("{} must be finite, got {}", field, value)))
    }
}

/// Parse a `(min, max)` 2θ range, rejecting `max < min`
pub fn parse_two_theta_range(min_text: &str, max_text: &str) -> Result<(f64, f64)> {
    let min = parse_number("Minimum value for 2theta", min_text)?;
    let max = parse_number("Maximum value for 2theta", max_text)?;
    if max < min {
        return Err(EsgError::validation(format!(
            "not a proper range: {} to {}",
            min, max
        )));
    }
    Ok((min, max))
}
