//! Command option table
//!
//! Extra (non-argument) command options are declared server-side with a type.
//! Stack files carry only the textual value; it is coerced through this table
//! on load. Options missing from the table are dropped.

use crate::error::ParseError;
use cstack_model::OptionValue;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Declared type of a command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptionKind {
    /// `"true"` is true, anything else false
    Boolean,
    /// Signed 32-bit integer
    Number,
    /// Any other declared type, kept as text
    String,
}

impl From<String> for OptionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "BOOLEAN" => Self::Boolean,
            "NUMBER" => Self::Number,
            _ => Self::String,
        }
    }
}

impl From<OptionKind> for String {
    fn from(value: OptionKind) -> Self {
        match value {
            OptionKind::Boolean => "BOOLEAN",
            OptionKind::Number => "NUMBER",
            OptionKind::String => "STRING",
        }
        .to_string()
    }
}

/// One declared option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptionInfo {
    /// Option id
    pub id: String,
    /// Declared type
    #[serde(rename = "type")]
    pub kind: OptionKind,
    /// Human readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
}

impl CommandOptionInfo {
    /// Declare an option
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            verbose_name: None,
        }
    }
}

/// Table of declared options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandOptions {
    options: Vec<CommandOptionInfo>,
}

impl CommandOptions {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a declared option
    #[must_use]
    pub fn with_option(mut self, option: CommandOptionInfo) -> Self {
        self.options.push(option);
        self
    }

    /// Declaration of an option
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CommandOptionInfo> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Declared options
    pub fn iter(&self) -> impl Iterator<Item = &CommandOptionInfo> {
        self.options.iter()
    }

    /// Coerce a textual option value
    ///
    /// Returns `Ok(None)` for undeclared options.
    pub fn coerce(&self, id: &str, text: &str) -> Result<Option<OptionValue>, ParseError> {
        let Some(option) = self.get(id) else {
            warn!(option = id, "dropping undeclared command option");
            return Ok(None);
        };
        let value = match option.kind {
            OptionKind::Boolean => OptionValue::Boolean(text == "true"),
            OptionKind::Number => OptionValue::Sint32(
                text.trim()
                    .parse()
                    .map_err(|_| ParseError::invalid_option(id, text))?,
            ),
            OptionKind::String => OptionValue::String(text.to_string()),
        };
        Ok(Some(value))
    }
}

impl FromIterator<CommandOptionInfo> for CommandOptions {
    fn from_iter<T: IntoIterator<Item = CommandOptionInfo>>(iter: T) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CommandOptions {
        CommandOptions::new()
            .with_option(CommandOptionInfo::new("cop1Bypass", OptionKind::Boolean))
            .with_option(CommandOptionInfo::new("vcId", OptionKind::Number))
            .with_option(CommandOptionInfo::new("note", OptionKind::String))
    }

    #[test]
    fn coerces_by_declared_type() {
        let t = table();
        assert_eq!(t.coerce("cop1Bypass", "true").unwrap(), Some(OptionValue::Boolean(true)));
        assert_eq!(t.coerce("cop1Bypass", "yes").unwrap(), Some(OptionValue::Boolean(false)));
        assert_eq!(t.coerce("vcId", "3").unwrap(), Some(OptionValue::Sint32(3)));
        assert_eq!(
            t.coerce("note", "hello").unwrap(),
            Some(OptionValue::String("hello".into()))
        );
    }

    #[test]
    fn undeclared_option_is_dropped() {
        assert_eq!(table().coerce("unknown", "1").unwrap(), None);
    }

    #[test]
    fn bad_number_is_rejected() {
        assert_eq!(
            table().coerce("vcId", "seven").unwrap_err(),
            ParseError::invalid_option("vcId", "seven")
        );
        assert!(table().coerce("vcId", "4294967296").is_err());
    }

    #[test]
    fn unknown_kind_reads_as_string() {
        let info: CommandOptionInfo =
            serde_json::from_str(r#"{"id": "x", "type": "TIMESTAMP"}"#).unwrap();
        assert_eq!(info.kind, OptionKind::String);
    }
}
