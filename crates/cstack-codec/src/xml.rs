//! Legacy XML stack format
//!
//! ```xml
//! <commandStack>
//!   <command qualifiedName="/YSS/SIMULATOR/SWITCH_VOLTAGE_ON" comment="bus A">
//!     <commandArgument argumentName="voltage_num" argumentValue="1"/>
//!     <extraOptions>
//!       <extraOption id="cop1Bypass" value="true"/>
//!     </extraOptions>
//!   </command>
//! </commandStack>
//! ```
//!
//! Only command steps exist in this format. Argument values are text;
//! `"true"` and `"false"` read back as booleans, aggregates and arrays are
//! stored JSON-encoded.

use crate::error::{ParseError, SerializeError};
use crate::format::StackFormat;
use crate::options::CommandOptions;
use crate::{StackCodec, StackDocument};
use cstack_model::{AdvancementParams, CommandStep, Step, StepBody};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{debug, warn};

const COMMAND: &[u8] = b"command";
const COMMAND_ARGUMENT: &[u8] = b"commandArgument";
const EXTRA_OPTIONS: &[u8] = b"extraOptions";
const EXTRA_OPTION: &[u8] = b"extraOption";

/// XML codec
#[derive(Debug, Clone, Default)]
pub struct XmlCodec {
    options: CommandOptions,
}

impl XmlCodec {
    /// Codec coercing extra options through the given table
    #[inline]
    #[must_use]
    pub fn new(options: CommandOptions) -> Self {
        Self { options }
    }
}

struct PendingCommand {
    command: CommandStep,
    comment: Option<String>,
}

/// Streaming reader state
struct StackReader<'a> {
    options: &'a CommandOptions,
    path: Vec<Vec<u8>>,
    saw_root: bool,
    current: Option<PendingCommand>,
    steps: Vec<Step>,
}

impl<'a> StackReader<'a> {
    fn new(options: &'a CommandOptions) -> Self {
        Self {
            options,
            path: Vec::new(),
            saw_root: false,
            current: None,
            steps: Vec::new(),
        }
    }

    fn in_command(&self) -> bool {
        self.path.len() >= 2 && self.path[1] == COMMAND
    }

    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let name = e.local_name();
        let name = name.as_ref();

        match self.path.len() {
            0 => self.saw_root = true,
            1 if name == COMMAND => {
                let qualified_name = required(e, "command", "qualifiedName")?;
                let comment = attribute(e, "comment")?;
                self.current = Some(PendingCommand {
                    command: CommandStep::new(qualified_name),
                    comment,
                });
            }
            2 if self.in_command() && name == COMMAND_ARGUMENT => {
                let arg_name = required(e, "commandArgument", "argumentName")?;
                let arg_value = required(e, "commandArgument", "argumentValue")?;
                if let Some(pending) = self.current.as_mut() {
                    pending.command.args.insert(arg_name, argument_value(arg_value));
                }
            }
            3 if self.in_command() && self.path[2] == EXTRA_OPTIONS && name == EXTRA_OPTION => {
                let id = required(e, "extraOption", "id")?;
                let text = required(e, "extraOption", "value")?;
                if let Some(value) = self.options.coerce(&id, &text)? {
                    if let Some(pending) = self.current.as_mut() {
                        pending.command.extra.insert(id, value);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        if self.path.len() == 1 && name == COMMAND {
            if let Some(pending) = self.current.take() {
                let mut step = Step::command(pending.command);
                if let Some(comment) = pending.comment {
                    step = step.with_comment(comment);
                }
                self.steps.push(step);
            }
        }
    }

    fn read(mut self, text: &str) -> Result<Vec<Step>, ParseError> {
        let mut reader = Reader::from_str(text);
        loop {
            let event = reader.read_event().map_err(|err| {
                ParseError::MalformedXml(format!(
                    "at position {}: {err}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(e) => {
                    self.open(&e)?;
                    self.path.push(e.local_name().as_ref().to_vec());
                }
                Event::Empty(e) => {
                    self.open(&e)?;
                    self.close(e.local_name().as_ref());
                }
                Event::End(e) => {
                    self.path.pop();
                    self.close(e.local_name().as_ref());
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !self.saw_root {
            return Err(ParseError::MalformedXml("document has no root element".into()));
        }
        if !self.path.is_empty() {
            return Err(ParseError::MalformedXml("unexpected end of document".into()));
        }
        Ok(self.steps)
    }
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ParseError> {
    match e.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|v| Some(v.into_owned()))
            .map_err(|err| ParseError::MalformedXml(err.to_string())),
        Ok(None) => Ok(None),
        Err(err) => Err(ParseError::MalformedXml(err.to_string())),
    }
}

fn required(e: &BytesStart<'_>, element: &str, name: &str) -> Result<String, ParseError> {
    attribute(e, name)?.ok_or_else(|| ParseError::missing_attribute(element, name))
}

fn argument_value(text: String) -> Value {
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl StackCodec for XmlCodec {
    fn format(&self) -> StackFormat {
        StackFormat::Xml
    }

    fn parse(&self, text: &str) -> Result<StackDocument, ParseError> {
        let steps = StackReader::new(&self.options).read(text)?;
        debug!(steps = steps.len(), "parsed xml stack");
        Ok(StackDocument {
            steps,
            advancement: None,
        })
    }

    fn serialize(
        &self,
        steps: &[Step],
        _advancement: &AdvancementParams,
    ) -> Result<String, SerializeError> {
        let mut out = String::new();
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, "<commandStack>")?;

        for (index, step) in steps.iter().enumerate() {
            let command = match step.body() {
                StepBody::Command(command) => command,
                StepBody::Check(_) | StepBody::Text(_) | StepBody::Verify(_) => {
                    return Err(SerializeError::UnsupportedStep {
                        index,
                        step_type: step.step_type(),
                        format: StackFormat::Xml.to_string(),
                    });
                }
            };
            if command.namespace.is_some() || command.advancement.is_some() {
                warn!(step = index, "namespace and advancement are not kept in xml");
            }

            write!(out, r#"  <command qualifiedName="{}""#, escape(command.name.as_str()))?;
            if let Some(comment) = step.comment() {
                write!(out, r#" comment="{}""#, escape(comment))?;
            }
            if command.args.is_empty() && command.extra.is_empty() {
                writeln!(out, "/>")?;
                continue;
            }
            writeln!(out, ">")?;

            for (name, value) in &command.args {
                writeln!(
                    out,
                    r#"    <commandArgument argumentName="{}" argumentValue="{}"/>"#,
                    escape(name.as_str()),
                    escape(argument_text(value).as_str())
                )?;
            }
            if !command.extra.is_empty() {
                writeln!(out, "    <extraOptions>")?;
                for (id, value) in &command.extra {
                    writeln!(
                        out,
                        r#"      <extraOption id="{}" value="{}"/>"#,
                        escape(id.as_str()),
                        escape(value.as_text().as_str())
                    )?;
                }
                writeln!(out, "    </extraOptions>")?;
            }
            writeln!(out, "  </command>")?;
        }

        writeln!(out, "</commandStack>")?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CommandOptionInfo, OptionKind};
    use cstack_model::OptionValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<commandStack>
  <command qualifiedName="/YSS/SIMULATOR/SWITCH_VOLTAGE_ON" comment="bus &amp; load">
    <commandArgument argumentName="voltage_num" argumentValue="1"/>
    <commandArgument argumentName="force" argumentValue="true"/>
    <extraOptions>
      <extraOption id="cop1Bypass" value="true"/>
      <extraOption id="unknown" value="x"/>
    </extraOptions>
  </command>
  <!-- ignored -->
  <command qualifiedName="/YSS/SIMULATOR/SWITCH_VOLTAGE_OFF"/>
</commandStack>
"#;

    fn codec() -> XmlCodec {
        XmlCodec::new(
            CommandOptions::new()
                .with_option(CommandOptionInfo::new("cop1Bypass", OptionKind::Boolean)),
        )
    }

    #[test]
    fn parses_commands() {
        let doc = codec().parse(SAMPLE).unwrap();
        assert_eq!(doc.advancement, None);
        assert_eq!(doc.steps.len(), 2);

        let first = &doc.steps[0];
        assert_eq!(first.comment(), Some("bus & load"));
        let cmd = first.as_command().unwrap();
        assert_eq!(cmd.name, "/YSS/SIMULATOR/SWITCH_VOLTAGE_ON");
        assert_eq!(cmd.args["voltage_num"], json!("1"));
        assert_eq!(cmd.args["force"], json!(true));
        assert_eq!(cmd.extra.len(), 1);
        assert_eq!(cmd.extra["cop1Bypass"], OptionValue::Boolean(true));

        assert!(doc.steps[1].as_command().unwrap().args.is_empty());
    }

    #[test]
    fn missing_required_attribute_fails() {
        let text = r#"<commandStack><command comment="x"/></commandStack>"#;
        assert_eq!(
            codec().parse(text).unwrap_err(),
            ParseError::missing_attribute("command", "qualifiedName")
        );

        let text = r#"<commandStack><command qualifiedName="/A">
            <commandArgument argumentName="a"/></command></commandStack>"#;
        assert_eq!(
            codec().parse(text).unwrap_err(),
            ParseError::missing_attribute("commandArgument", "argumentValue")
        );
    }

    #[test]
    fn nested_commands_are_ignored() {
        let text = r#"<commandStack><group><command qualifiedName="/A"/></group></commandStack>"#;
        assert!(codec().parse(text).unwrap().steps.is_empty());
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(matches!(
            codec().parse("<commandStack><command qualifiedName=\"/A\">"),
            Err(ParseError::MalformedXml(_))
        ));
        assert!(matches!(codec().parse(""), Err(ParseError::MalformedXml(_))));
    }

    #[test]
    fn serializes_commands() {
        let steps = vec![
            Step::command(
                CommandStep::new("/A")
                    .with_arg("n", 5)
                    .with_arg("list", json!([1, 2]))
                    .with_extra("cop1Bypass", OptionValue::Boolean(false)),
            )
            .with_comment("say \"hi\""),
            Step::command(CommandStep::new("/B")),
        ];
        let text = codec().serialize(&steps, &AdvancementParams::default()).unwrap();

        assert!(text.contains(r#"<command qualifiedName="/A" comment="say &quot;hi&quot;">"#));
        assert!(text.contains(r#"argumentName="n" argumentValue="5""#));
        assert!(text.contains(r#"argumentValue="[1,2]""#));
        assert!(text.contains(r#"<extraOption id="cop1Bypass" value="false"/>"#));
        assert!(text.contains(r#"<command qualifiedName="/B"/>"#));
    }

    #[test]
    fn round_trip_coerces_values_to_text() {
        let steps = vec![Step::command(
            CommandStep::new("/A").with_arg("n", 5).with_arg("flag", true),
        )];
        let text = codec().serialize(&steps, &AdvancementParams::default()).unwrap();
        let back = codec().parse(&text).unwrap();

        let cmd = back.steps[0].as_command().unwrap();
        assert_eq!(cmd.args["n"], json!("5"));
        assert_eq!(cmd.args["flag"], json!(true));
    }

    #[test]
    fn non_command_steps_are_rejected() {
        let steps = vec![Step::command(CommandStep::new("/A")), Step::text("# Notes")];
        let err = codec().serialize(&steps, &AdvancementParams::default()).unwrap_err();
        assert!(matches!(err, SerializeError::UnsupportedStep { index: 1, .. }));
    }
}
