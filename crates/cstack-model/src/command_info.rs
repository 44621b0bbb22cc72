//! Command definitions
//!
//! Resolved from the mission database and attached to command steps after
//! load. Only the parts needed for argument enrichment and alias naming are
//! modelled.

use serde::{Deserialize, Serialize};

/// Alternative name of a command in a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandAlias {
    /// Namespace
    pub namespace: String,
    /// Name within the namespace
    pub name: String,
}

/// Raw value and label of an enumeration state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    /// Raw value
    pub value: i64,
    /// Canonical label
    pub label: String,
}

/// Type of an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentType {
    /// Engineering type (`integer`, `enumeration`, `aggregate`, `float[]`, ...)
    pub eng_type: String,
    /// States of an enumeration
    #[serde(default, rename = "enumValue", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<EnumValue>,
}

impl ArgumentType {
    /// Type with no enumeration states
    #[inline]
    #[must_use]
    pub fn new(eng_type: impl Into<String>) -> Self {
        Self {
            eng_type: eng_type.into(),
            enum_values: Vec::new(),
        }
    }

    /// Enumeration type with the given states
    #[must_use]
    pub fn enumeration<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        Self {
            eng_type: "enumeration".to_string(),
            enum_values: states
                .into_iter()
                .map(|(value, label)| EnumValue {
                    value,
                    label: label.into(),
                })
                .collect(),
        }
    }

    /// True for enumerations
    #[inline]
    #[must_use]
    pub fn is_enumeration(&self) -> bool {
        self.eng_type == "enumeration"
    }

    /// True for aggregates and arrays
    #[inline]
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.eng_type == "aggregate" || self.eng_type.ends_with("[]")
    }
}

/// Declared argument of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentInfo {
    /// Argument name
    pub name: String,
    /// Argument type
    #[serde(rename = "type")]
    pub arg_type: ArgumentType,
}

impl ArgumentInfo {
    /// Create an argument declaration
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, arg_type: ArgumentType) -> Self {
        Self {
            name: name.into(),
            arg_type,
        }
    }
}

/// Definition of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    /// Fully qualified name
    pub qualified_name: String,
    /// Aliases
    #[serde(default, rename = "alias")]
    pub aliases: Vec<CommandAlias>,
    /// Arguments declared directly on this command
    #[serde(default, rename = "argument")]
    pub arguments: Vec<ArgumentInfo>,
    /// Command this one inherits arguments from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_command: Option<Box<CommandInfo>>,
}

impl CommandInfo {
    /// Definition without aliases or arguments
    #[inline]
    #[must_use]
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            aliases: Vec::new(),
            arguments: Vec::new(),
            base_command: None,
        }
    }

    /// With an alias
    #[must_use]
    pub fn with_alias(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.aliases.push(CommandAlias {
            namespace: namespace.into(),
            name: name.into(),
        });
        self
    }

    /// With an argument
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentInfo) -> Self {
        self.arguments.push(argument);
        self
    }

    /// With a base command
    #[must_use]
    pub fn with_base(mut self, base: CommandInfo) -> Self {
        self.base_command = Some(Box::new(base));
        self
    }

    /// Find an argument on this command or any base command
    #[must_use]
    pub fn find_argument(&self, name: &str) -> Option<&ArgumentInfo> {
        let mut current = Some(self);
        while let Some(info) = current {
            if let Some(arg) = info.arguments.iter().find(|a| a.name == name) {
                return Some(arg);
            }
            current = info.base_command.as_deref();
        }
        None
    }

    /// Alias in a namespace
    #[must_use]
    pub fn alias_in(&self, namespace: &str) -> Option<&CommandAlias> {
        self.aliases.iter().find(|a| a.namespace == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_argument_walks_base_chain() {
        let base = CommandInfo::new("/BASE")
            .with_argument(ArgumentInfo::new("apid", ArgumentType::new("integer")));
        let cmd = CommandInfo::new("/BASE/CMD")
            .with_argument(ArgumentInfo::new("mode", ArgumentType::enumeration([(0, "OFF")])))
            .with_base(base);

        assert!(cmd.find_argument("mode").unwrap().arg_type.is_enumeration());
        assert_eq!(cmd.find_argument("apid").unwrap().arg_type.eng_type, "integer");
        assert!(cmd.find_argument("missing").is_none());
    }

    #[test]
    fn complex_types() {
        assert!(ArgumentType::new("aggregate").is_complex());
        assert!(ArgumentType::new("float[]").is_complex());
        assert!(!ArgumentType::new("string").is_complex());
    }

    #[test]
    fn deserializes_database_shape() {
        let info: CommandInfo = serde_json::from_value(serde_json::json!({
            "qualifiedName": "/YSS/SIMULATOR/SWITCH_VOLTAGE_ON",
            "alias": [{"namespace": "MDB:OPS Name", "name": "SWITCH_VOLTAGE_ON"}],
            "argument": [{
                "name": "voltage_num",
                "type": {"engType": "enumeration", "enumValue": [{"value": 1, "label": "ONE"}]}
            }]
        }))
        .unwrap();

        assert_eq!(info.alias_in("MDB:OPS Name").unwrap().name, "SWITCH_VOLTAGE_ON");
        assert_eq!(info.arguments[0].arg_type.enum_values[0].label, "ONE");
    }
}
