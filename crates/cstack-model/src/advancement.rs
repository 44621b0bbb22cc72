//! Advancement criteria
//!
//! A stack carries default criteria for moving from one command step to the
//! next; a command step may override either field.

use serde::{Deserialize, Deserializer, Serialize};

/// Acknowledgment waited on when a stack does not say otherwise
pub const DEFAULT_ACKNOWLEDGMENT: &str = "Acknowledge_Queued";

/// Stack-level advancement criteria
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvancementParams {
    /// Name of the acknowledgment to wait for
    pub acknowledgment: String,
    /// Delay in milliseconds applied after the acknowledgment, before advancing
    #[serde(deserialize_with = "deserialize_wait")]
    pub wait: u64,
}

impl AdvancementParams {
    /// Create criteria
    #[inline]
    #[must_use]
    pub fn new(acknowledgment: impl Into<String>, wait: u64) -> Self {
        Self {
            acknowledgment: acknowledgment.into(),
            wait,
        }
    }

    /// Apply a step override field by field
    #[must_use]
    pub fn resolve(&self, step: Option<&AdvancementOverride>) -> AdvancementParams {
        let Some(step) = step else {
            return self.clone();
        };
        AdvancementParams {
            acknowledgment: step
                .acknowledgment
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| self.acknowledgment.clone()),
            wait: step.wait.unwrap_or(self.wait),
        }
    }
}

impl Default for AdvancementParams {
    fn default() -> Self {
        Self::new(DEFAULT_ACKNOWLEDGMENT, 0)
    }
}

/// Per-step override of the stack criteria
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvancementOverride {
    /// Acknowledgment to wait for instead of the stack default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgment: Option<String>,
    /// Delay to apply instead of the stack default
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_millis"
    )]
    pub wait: Option<u64>,
}

impl AdvancementOverride {
    /// Override both fields
    #[must_use]
    pub fn new(acknowledgment: impl Into<String>, wait: u64) -> Self {
        Self {
            acknowledgment: Some(acknowledgment.into()),
            wait: Some(wait),
        }
    }

    /// True when neither field is overridden
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acknowledgment.is_none() && self.wait.is_none()
    }
}

/// Millisecond count as written by hand or by other tools
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMillis {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl RawMillis {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn clamped(self) -> u64 {
        match self {
            Self::Unsigned(ms) => ms,
            Self::Signed(ms) => u64::try_from(ms).unwrap_or(0),
            // `as` saturates; NaN becomes 0
            Self::Float(ms) => ms.max(0.0) as u64,
        }
    }
}

/// Deserialize an optional delay in milliseconds
///
/// Negative values clamp to 0 and fractions are truncated.
///
/// # Errors
///
/// Fails when the value is not a number.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawMillis>::deserialize(deserializer)?.map(RawMillis::clamped))
}

fn deserialize_wait<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    RawMillis::deserialize(deserializer).map(RawMillis::clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waits_for_queued() {
        let adv = AdvancementParams::default();
        assert_eq!(adv.acknowledgment, "Acknowledge_Queued");
        assert_eq!(adv.wait, 0);
    }

    #[test]
    fn resolve_without_override_is_stack_default() {
        let stack = AdvancementParams::new("Acknowledge_Sent", 250);
        assert_eq!(stack.resolve(None), stack);
    }

    #[test]
    fn resolve_is_field_wise() {
        let stack = AdvancementParams::new("Acknowledge_Sent", 250);

        let only_wait = AdvancementOverride {
            acknowledgment: None,
            wait: Some(0),
        };
        assert_eq!(
            stack.resolve(Some(&only_wait)),
            AdvancementParams::new("Acknowledge_Sent", 0)
        );

        let only_ack = AdvancementOverride {
            acknowledgment: Some("CommandComplete".into()),
            wait: None,
        };
        assert_eq!(
            stack.resolve(Some(&only_ack)),
            AdvancementParams::new("CommandComplete", 250)
        );
    }

    #[test]
    fn empty_acknowledgment_falls_back() {
        let stack = AdvancementParams::default();
        let blank = AdvancementOverride {
            acknowledgment: Some(String::new()),
            wait: Some(10),
        };
        assert_eq!(stack.resolve(Some(&blank)).acknowledgment, DEFAULT_ACKNOWLEDGMENT);
    }

    #[test]
    fn negative_and_fractional_waits_clamp() {
        let over: AdvancementOverride = serde_json::from_str(r#"{"wait": -250}"#).unwrap();
        assert_eq!(over.wait, Some(0));

        let over: AdvancementOverride = serde_json::from_str(r#"{"wait": 12.7}"#).unwrap();
        assert_eq!(over.wait, Some(12));

        let over: AdvancementOverride = serde_json::from_str(r#"{"wait": null}"#).unwrap();
        assert_eq!(over.wait, None);

        let stack: AdvancementParams =
            serde_json::from_str(r#"{"acknowledgment": "Acknowledge_Sent", "wait": -1}"#).unwrap();
        assert_eq!(stack, AdvancementParams::new("Acknowledge_Sent", 0));

        assert!(serde_json::from_str::<AdvancementOverride>(r#"{"wait": "soon"}"#).is_err());
    }
}
