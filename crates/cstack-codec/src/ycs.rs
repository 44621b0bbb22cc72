//! YCS (JSON) stack format
//!
//! Current files carry a `steps` array tagged by `type`; older files carry an
//! untagged `commands` array. Both are accepted, only `steps` is written.

use crate::error::{ParseError, SerializeError};
use crate::format::StackFormat;
use crate::options::CommandOptions;
use crate::{StackCodec, StackDocument};
use cstack_model::{
    deserialize_millis, AdvancementOverride, AdvancementParams, CheckStep, CommandStep, Comparison, Step, StepBody,
    StepType, TextStep, VerifyStep,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// YCS codec
#[derive(Debug, Clone, Default)]
pub struct YcsCodec {
    options: CommandOptions,
}

impl YcsCodec {
    /// Codec coercing extra options through the given table
    #[inline]
    #[must_use]
    pub fn new(options: CommandOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct YcsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commands: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advancement: Option<AdvancementOverride>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YcsCommand {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<YcsArgument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extra_options: Vec<YcsOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advancement: Option<AdvancementOverride>,
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsArgument {
    name: String,
    value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsOption {
    id: String,
    value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    parameters: Vec<YcsCheckParameter>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum YcsCheckParameter {
    Named { parameter: String },
    Bare(String),
}

impl YcsCheckParameter {
    fn into_name(self) -> String {
        match self {
            Self::Named { parameter } | Self::Bare(parameter) => parameter,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsVerify {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    condition: Vec<YcsComparison>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_millis"
    )]
    delay: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_millis"
    )]
    timeout: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct YcsComparison {
    parameter: String,
    operator: String,
    value: Value,
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn with_comment(step: Step, comment: Option<String>) -> Step {
    match comment {
        Some(comment) => step.with_comment(comment),
        None => step,
    }
}

impl YcsCodec {
    fn command_step(&self, raw: YcsCommand) -> Result<Step, ParseError> {
        let mut command = CommandStep::new(raw.name);
        command.namespace = raw.namespace;
        command.advancement = raw.advancement;
        for arg in raw.arguments {
            command.args.insert(arg.name, arg.value);
        }
        for option in raw.extra_options {
            if let Some(value) = self.options.coerce(&option.id, &option_text(&option.value))? {
                command.extra.insert(option.id, value);
            }
        }
        Ok(with_comment(Step::command(command), raw.comment))
    }

    fn tagged_step(&self, index: usize, raw: Value) -> Result<Step, ParseError> {
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MalformedJson(format!("step {index} has no type")))?;

        match tag.parse::<StepType>()? {
            StepType::Command => self.command_step(serde_json::from_value(raw)?),
            StepType::Check => {
                let check: YcsCheck = serde_json::from_value(raw)?;
                let step = Step::new(StepBody::Check(CheckStep::new(
                    check.parameters.into_iter().map(YcsCheckParameter::into_name),
                )));
                Ok(with_comment(step, check.comment))
            }
            StepType::Text => {
                let text: YcsText = serde_json::from_value(raw)?;
                Ok(with_comment(Step::new(StepBody::Text(TextStep::new(text.text))), text.comment))
            }
            StepType::Verify => {
                let verify: YcsVerify = serde_json::from_value(raw)?;
                let condition = verify
                    .condition
                    .into_iter()
                    .map(|c| -> Result<Comparison, ParseError> {
                        Ok(Comparison::new(c.parameter, c.operator.parse()?, c.value))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let body = VerifyStep {
                    condition,
                    delay: verify.delay,
                    timeout: verify.timeout,
                };
                Ok(with_comment(Step::verify(body), verify.comment))
            }
        }
    }
}

fn tagged(tag: StepType, body: impl Serialize) -> Result<Value, SerializeError> {
    let mut value = serde_json::to_value(body)?;
    if let Value::Object(map) = &mut value {
        map.insert("type".to_string(), Value::String(tag.as_str().to_string()));
    }
    Ok(value)
}

fn step_value(step: &Step) -> Result<Value, SerializeError> {
    let comment = step.comment().map(str::to_string);
    match step.body() {
        StepBody::Command(command) => tagged(
            StepType::Command,
            YcsCommand {
                name: command.name.clone(),
                namespace: command.namespace.clone(),
                comment,
                arguments: command
                    .args
                    .iter()
                    .map(|(name, value)| YcsArgument {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .collect(),
                extra_options: command
                    .extra
                    .iter()
                    .map(|(id, value)| YcsOption {
                        id: id.clone(),
                        value: Value::String(value.as_text()),
                    })
                    .collect(),
                advancement: command.advancement.clone(),
            },
        ),
        StepBody::Check(check) => tagged(
            StepType::Check,
            YcsCheck {
                comment,
                parameters: check
                    .parameters
                    .iter()
                    .map(|p| YcsCheckParameter::Named { parameter: p.clone() })
                    .collect(),
            },
        ),
        StepBody::Text(text) => tagged(
            StepType::Text,
            YcsText {
                comment,
                text: text.text.clone(),
            },
        ),
        StepBody::Verify(verify) => tagged(
            StepType::Verify,
            YcsVerify {
                comment,
                condition: verify
                    .condition
                    .iter()
                    .map(|c| YcsComparison {
                        parameter: c.parameter.clone(),
                        operator: c.operator.as_str().to_string(),
                        value: c.value.clone(),
                    })
                    .collect(),
                delay: verify.delay,
                timeout: verify.timeout,
            },
        ),
    }
}

impl StackCodec for YcsCodec {
    fn format(&self) -> StackFormat {
        StackFormat::Ycs
    }

    fn parse(&self, text: &str) -> Result<StackDocument, ParseError> {
        let doc: YcsDocument = serde_json::from_str(text)?;

        let steps = match (doc.steps, doc.commands) {
            (Some(steps), _) => steps
                .into_iter()
                .enumerate()
                .map(|(index, raw)| self.tagged_step(index, raw))
                .collect::<Result<Vec<_>, _>>()?,
            (None, Some(commands)) => commands
                .into_iter()
                .map(|raw| -> Result<Step, ParseError> {
                    self.command_step(serde_json::from_value(raw)?)
                })
                .collect::<Result<Vec<_>, _>>()?,
            (None, None) => Vec::new(),
        };

        let advancement = AdvancementParams::default().resolve(doc.advancement.as_ref());
        debug!(steps = steps.len(), "parsed ycs stack");
        Ok(StackDocument {
            steps,
            advancement: Some(advancement),
        })
    }

    fn serialize(
        &self,
        steps: &[Step],
        advancement: &AdvancementParams,
    ) -> Result<String, SerializeError> {
        let doc = YcsDocument {
            commands: None,
            steps: Some(steps.iter().map(step_value).collect::<Result<_, _>>()?),
            advancement: Some(AdvancementOverride::new(
                advancement.acknowledgment.clone(),
                advancement.wait,
            )),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CommandOptionInfo, OptionKind};
    use cstack_model::{ComparisonOperator, OptionValue, DEFAULT_ACKNOWLEDGMENT};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codec() -> YcsCodec {
        YcsCodec::new(
            CommandOptions::new().with_option(CommandOptionInfo::new("vcId", OptionKind::Number)),
        )
    }

    #[test]
    fn parses_current_schema() {
        let text = json!({
            "steps": [
                {"type": "text", "text": "# Setup"},
                {
                    "type": "command",
                    "name": "SWITCH_VOLTAGE_ON",
                    "namespace": "MDB:OPS Name",
                    "comment": "first",
                    "arguments": [{"name": "voltage_num", "value": 1}],
                    "extraOptions": [{"id": "vcId", "value": "2"}],
                    "advancement": {"wait": 500}
                },
                {"type": "check", "parameters": [{"parameter": "/YSS/SIMULATOR/BatteryVoltage1"}]},
                {
                    "type": "verify",
                    "condition": [{"parameter": "P1", "operator": "gte", "value": 3}],
                    "delay": 100,
                    "timeout": 2000
                }
            ],
            "advancement": {"acknowledgment": "Acknowledge_Sent", "wait": 250}
        })
        .to_string();

        let doc = codec().parse(&text).unwrap();
        assert_eq!(doc.advancement, Some(AdvancementParams::new("Acknowledge_Sent", 250)));
        assert_eq!(doc.steps.len(), 4);

        let cmd = doc.steps[1].as_command().unwrap();
        assert_eq!(doc.steps[1].comment(), Some("first"));
        assert_eq!(cmd.namespace.as_deref(), Some("MDB:OPS Name"));
        assert_eq!(cmd.args["voltage_num"], json!(1));
        assert_eq!(cmd.extra["vcId"], OptionValue::Sint32(2));
        assert_eq!(cmd.advancement.as_ref().unwrap().wait, Some(500));
        assert_eq!(cmd.advancement.as_ref().unwrap().acknowledgment, None);

        assert_eq!(doc.steps[2].parameters(), vec!["/YSS/SIMULATOR/BatteryVoltage1"]);

        let StepBody::Verify(verify) = doc.steps[3].body() else {
            panic!("expected verify step");
        };
        assert_eq!(verify.condition[0].operator, ComparisonOperator::Gte);
        assert_eq!(verify.delay, Some(100));
        assert_eq!(verify.timeout, Some(2000));
    }

    #[test]
    fn legacy_commands_match_steps() {
        let legacy = json!({
            "commands": [{"name": "/A", "arguments": [{"name": "x", "value": "on"}]}]
        })
        .to_string();
        let current = json!({
            "steps": [{"type": "command", "name": "/A", "arguments": [{"name": "x", "value": "on"}]}]
        })
        .to_string();

        assert_eq!(codec().parse(&legacy).unwrap(), codec().parse(&current).unwrap());
    }

    #[test]
    fn advancement_defaults() {
        let doc = codec().parse("{}").unwrap();
        assert!(doc.steps.is_empty());
        assert_eq!(doc.advancement, Some(AdvancementParams::default()));

        let doc = codec()
            .parse(r#"{"steps": [], "advancement": {"acknowledgment": ""}}"#)
            .unwrap();
        assert_eq!(doc.advancement, Some(AdvancementParams::default()));
    }

    #[test]
    fn out_of_range_delays_clamp_instead_of_failing() {
        let text = json!({
            "steps": [
                {"type": "command", "name": "/A", "advancement": {"wait": -5}},
                {"type": "verify", "condition": [], "delay": 1.5, "timeout": -1}
            ],
            "advancement": {"wait": 99.9}
        })
        .to_string();

        let doc = codec().parse(&text).unwrap();
        assert_eq!(doc.advancement, Some(AdvancementParams::new(DEFAULT_ACKNOWLEDGMENT, 99)));
        assert_eq!(doc.steps[0].as_command().unwrap().advancement.as_ref().unwrap().wait, Some(0));
        let StepBody::Verify(verify) = doc.steps[1].body() else {
            panic!("expected verify step");
        };
        assert_eq!(verify.delay, Some(1));
        assert_eq!(verify.timeout, Some(0));
    }

    #[test]
    fn unknown_step_type_is_fatal() {
        let text = r#"{"steps": [{"type": "macro"}]}"#;
        assert_eq!(
            codec().parse(text).unwrap_err(),
            ParseError::UnknownStepType("macro".into())
        );
    }

    #[test]
    fn unknown_operator_is_fatal() {
        let text = r#"{"steps": [{"type": "verify", "condition": [{"parameter": "P", "operator": "approx", "value": 1}]}]}"#;
        assert_eq!(
            codec().parse(text).unwrap_err(),
            ParseError::UnknownOperator("approx".into())
        );
    }

    #[test]
    fn malformed_json_fails() {
        assert!(matches!(codec().parse("{"), Err(ParseError::MalformedJson(_))));
        assert!(matches!(
            codec().parse(r#"{"steps": [{"name": "/A"}]}"#),
            Err(ParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn bare_check_parameters_accepted() {
        let doc = codec()
            .parse(r#"{"steps": [{"type": "check", "parameters": ["A", {"parameter": "B"}]}]}"#)
            .unwrap();
        assert_eq!(doc.steps[0].parameters(), vec!["A", "B"]);
    }

    #[test]
    fn serializes_steps_schema() {
        let steps = vec![
            Step::text("# Title"),
            Step::command(
                CommandStep::new("/A")
                    .with_arg("n", 1)
                    .with_extra("vcId", OptionValue::Sint32(7)),
            ),
        ];
        let text = codec().serialize(&steps, &AdvancementParams::default()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["steps"][0]["type"], json!("text"));
        assert_eq!(value["steps"][1]["arguments"][0], json!({"name": "n", "value": 1}));
        assert_eq!(value["steps"][1]["extraOptions"][0], json!({"id": "vcId", "value": "7"}));
        assert_eq!(
            value["advancement"],
            json!({"acknowledgment": "Acknowledge_Queued", "wait": 0})
        );
        assert!(value.get("commands").is_none());
    }
}
