//! Typed values for protocol command options

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Value of a non-argument command option ("extra" option)
///
/// Options are declared server-side with a type; the stack files only carry
/// the textual form, which is coerced into one of these variants on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum OptionValue {
    /// Boolean option
    Boolean(bool),
    /// Numeric option (signed 32-bit)
    Sint32(i32),
    /// Free-form option
    String(String),
}

impl OptionValue {
    /// Textual form, as written to stack files
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Sint32(n) => n.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    /// Native JSON form, as sent to the command issuance service
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Sint32(n) => Value::from(*n),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_value_text_forms() {
        assert_eq!(OptionValue::Boolean(true).as_text(), "true");
        assert_eq!(OptionValue::Sint32(-4).as_text(), "-4");
        assert_eq!(OptionValue::String("abc".into()).as_text(), "abc");
    }

    #[test]
    fn option_value_json_forms() {
        assert_eq!(OptionValue::Boolean(false).to_json(), Value::Bool(false));
        assert_eq!(OptionValue::Sint32(7).to_json(), serde_json::json!(7));
    }
}
