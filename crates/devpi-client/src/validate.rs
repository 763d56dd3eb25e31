//! Argument checks shared by the resource clients.

use crate::error::{DevpiError, Result};

/// Require `value` to contain something other than whitespace.
///
/// Returns the value unchanged so it can be used inline when building paths.
pub fn non_empty<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(DevpiError::validation(format!(
            "Parameter '{name}' must be a non-empty string"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text() {
        assert_eq!(non_empty("test_param", "valid_value").unwrap(), "valid_value");
    }

    #[test]
    fn rejects_empty_and_blank() {
        for value in ["", "   ", "\t\n"] {
            let err = non_empty("test_param", value).unwrap_err();
            assert_eq!(
                err.message(),
                "Parameter 'test_param' must be a non-empty string"
            );
        }
    }
}
