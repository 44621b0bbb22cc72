//! Stack steps
//!
//! A step is one line of a stack. Its body is a closed sum type: every
//! consumer matches on [`StepBody`] exhaustively, so adding a variant forces
//! the codec, the renumberer and the engine to be updated together.
//!
//! Each step also carries:
//! - a session-local [`StepKey`] used for identity while the sequence is
//!   edited and reordered (never persisted)
//! - runtime [`StepOutput`] (execution number, command id, error, snapshots)
//! - optionally the resolved [`CommandInfo`] for command steps

use crate::ack::{CommandHistoryRecord, CommandId};
use crate::advancement::AdvancementOverride;
use crate::command_info::CommandInfo;
use crate::error::ModelError;
use crate::parameter::{NamedParameterValue, ParameterValue};
use crate::value::OptionValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Session-local identity of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepKey(Uuid);

impl StepKey {
    /// Generate a fresh key
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminator of a step body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    /// Issues a command
    Command,
    /// Samples parameter values
    Check,
    /// Free text
    Text,
    /// Waits for a condition over parameter values
    Verify,
}

impl StepType {
    /// Tag used in stack files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Check => "check",
            Self::Text => "text",
            Self::Verify => "verify",
        }
    }
}

impl FromStr for StepType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(Self::Command),
            "check" => Ok(Self::Check),
            "text" => Ok(Self::Text),
            "verify" => Ok(Self::Verify),
            other => Err(ModelError::UnknownStepType(other.to_string())),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command to issue
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStep {
    /// Qualified name, or alias name when `namespace` is set
    pub name: String,
    /// Alias namespace
    pub namespace: Option<String>,
    /// Argument values, in declaration order
    pub args: IndexMap<String, Value>,
    /// Protocol options by option id
    pub extra: IndexMap<String, OptionValue>,
    /// Per-step advancement override
    pub advancement: Option<AdvancementOverride>,
}

impl CommandStep {
    /// Command without arguments
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            args: IndexMap::new(),
            extra: IndexMap::new(),
            advancement: None,
        }
    }

    /// Name a command after its definition, preferring an alias in
    /// `preferred_namespace` when the definition has one
    #[must_use]
    pub fn for_definition(info: &CommandInfo, preferred_namespace: Option<&str>) -> Self {
        match preferred_namespace.and_then(|ns| info.alias_in(ns)) {
            Some(alias) => Self::new(alias.name.clone()).with_namespace(alias.namespace.clone()),
            None => Self::new(info.qualified_name.clone()),
        }
    }

    /// With alias namespace
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// With an argument value
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// With a protocol option
    #[inline]
    #[must_use]
    pub fn with_extra(mut self, id: impl Into<String>, value: OptionValue) -> Self {
        self.extra.insert(id.into(), value);
        self
    }

    /// With an advancement override
    #[inline]
    #[must_use]
    pub fn with_advancement(mut self, advancement: AdvancementOverride) -> Self {
        self.advancement = Some(advancement);
        self
    }
}

impl fmt::Display for CommandStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}:")?;
        }
        f.write_str(&self.name)
    }
}

/// Parameters to sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckStep {
    /// Parameter names, in display order
    pub parameters: Vec<String>,
}

impl CheckStep {
    /// Check over the given parameters
    #[must_use]
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }
}

/// Free text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextStep {
    /// Markdown-like content
    pub text: String,
}

impl TextStep {
    /// Text step
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Comparison operator of a verify condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
}

impl ComparisonOperator {
    /// Operator as written in stack files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
        }
    }

    /// Symbolic form for display
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Neq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "neq" => Ok(Self::Neq),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            other => Err(ModelError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One term of a verify condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Parameter name
    pub parameter: String,
    /// Operator
    pub operator: ComparisonOperator,
    /// Expected value
    pub value: Value,
}

impl Comparison {
    /// Create a comparison
    #[must_use]
    pub fn new(
        parameter: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate against the latest value of the parameter
    ///
    /// A parameter without a value never satisfies a comparison. Numeric
    /// operands (including numeric strings) compare as numbers; otherwise
    /// equality compares the textual forms and ordering operators fail.
    #[must_use]
    pub fn evaluate(&self, actual: Option<&ParameterValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let actual = &actual.eng_value;

        if let (Some(a), Some(b)) = (as_number(actual), as_number(&self.value)) {
            return a
                .partial_cmp(&b)
                .is_some_and(|ordering| self.operator.accepts(ordering));
        }

        match self.operator {
            ComparisonOperator::Eq => as_text(actual) == as_text(&self.value),
            ComparisonOperator::Neq => as_text(actual) != as_text(&self.value),
            _ => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.parameter, self.operator, as_text(&self.value))
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Progress of one comparison of a running verify step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    /// Not yet satisfied
    #[default]
    Pending,
    /// Satisfied on the last evaluation
    Satisfied,
    /// Run stopped while still pending
    Cancelled,
}

/// Wait until every comparison holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyStep {
    /// Comparisons, all of which must hold
    pub condition: Vec<Comparison>,
    /// Milliseconds to wait before the first evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Milliseconds (after `delay`) before the step fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl VerifyStep {
    /// Verify over the given comparisons
    #[must_use]
    pub fn new(condition: Vec<Comparison>) -> Self {
        Self {
            condition,
            delay: None,
            timeout: None,
        }
    }

    /// With initial delay
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delay = Some(delay);
        self
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluate every comparison against a value lookup
    pub fn evaluate<'a, F>(&self, lookup: F) -> Vec<ComparisonStatus>
    where
        F: Fn(&str) -> Option<&'a ParameterValue>,
    {
        self.condition
            .iter()
            .map(|c| {
                if c.evaluate(lookup(&c.parameter)) {
                    ComparisonStatus::Satisfied
                } else {
                    ComparisonStatus::Pending
                }
            })
            .collect()
    }
}

/// Body of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepBody {
    /// Command step
    Command(CommandStep),
    /// Check step
    Check(CheckStep),
    /// Text step
    Text(TextStep),
    /// Verify step
    Verify(VerifyStep),
}

impl StepBody {
    /// Discriminator
    #[must_use]
    pub const fn step_type(&self) -> StepType {
        match self {
            Self::Command(_) => StepType::Command,
            Self::Check(_) => StepType::Check,
            Self::Text(_) => StepType::Text,
            Self::Verify(_) => StepType::Verify,
        }
    }
}

/// Runtime state of a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// Execution number of the latest run of this step
    pub execution_number: Option<u64>,
    /// Command id, once issuance resolved
    pub id: Option<CommandId>,
    /// Failure message
    pub err: Option<String>,
    /// Step is in flight
    pub executing: bool,
    /// Accumulated acknowledgments of the issued command
    pub record: Option<CommandHistoryRecord>,
    /// Acknowledgment whose stop status halted the run
    pub halted_on: Option<String>,
    /// Values sampled by a check step
    pub snapshot: Vec<NamedParameterValue>,
    /// Per-comparison results of a verify step
    pub verify_results: Vec<ComparisonStatus>,
}

impl StepOutput {
    /// Reset to the never-run state
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when the step failed (issuance error or verify timeout) or
    /// halted the run on a stop acknowledgment
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.err.is_some() || self.halted_on.is_some()
    }

    /// True when the step ran at least once since the last clear
    #[inline]
    #[must_use]
    pub fn has_outputs(&self) -> bool {
        self.execution_number.is_some()
    }
}

/// One line of a stack
#[derive(Debug, Clone)]
pub struct Step {
    key: StepKey,
    comment: Option<String>,
    body: StepBody,
    output: StepOutput,
    command_info: Option<CommandInfo>,
}

impl Step {
    /// Create a step with a fresh key
    #[must_use]
    pub fn new(body: StepBody) -> Self {
        Self {
            key: StepKey::new(),
            comment: None,
            body,
            output: StepOutput::default(),
            command_info: None,
        }
    }

    /// Command step
    #[inline]
    #[must_use]
    pub fn command(command: CommandStep) -> Self {
        Self::new(StepBody::Command(command))
    }

    /// Check step
    #[must_use]
    pub fn check<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepBody::Check(CheckStep::new(parameters)))
    }

    /// Text step
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(StepBody::Text(TextStep::new(text)))
    }

    /// Verify step
    #[inline]
    #[must_use]
    pub fn verify(verify: VerifyStep) -> Self {
        Self::new(StepBody::Verify(verify))
    }

    /// With comment
    #[inline]
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Identity key
    #[inline]
    #[must_use]
    pub fn key(&self) -> StepKey {
        self.key
    }

    /// Comment
    #[inline]
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Body
    #[inline]
    #[must_use]
    pub fn body(&self) -> &StepBody {
        &self.body
    }

    /// Discriminator
    #[inline]
    #[must_use]
    pub fn step_type(&self) -> StepType {
        self.body.step_type()
    }

    /// Command body, if this is a command step
    #[must_use]
    pub fn as_command(&self) -> Option<&CommandStep> {
        match &self.body {
            StepBody::Command(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable command body, used when enriching arguments after load
    pub fn as_command_mut(&mut self) -> Option<&mut CommandStep> {
        match &mut self.body {
            StepBody::Command(c) => Some(c),
            _ => None,
        }
    }

    /// Runtime state
    #[inline]
    #[must_use]
    pub fn output(&self) -> &StepOutput {
        &self.output
    }

    /// Mutable runtime state
    #[inline]
    pub fn output_mut(&mut self) -> &mut StepOutput {
        &mut self.output
    }

    /// Reset runtime state, keeping the definition
    pub fn clear_outputs(&mut self) {
        self.output.clear();
    }

    /// Resolved command definition
    #[inline]
    #[must_use]
    pub fn command_info(&self) -> Option<&CommandInfo> {
        self.command_info.as_ref()
    }

    /// Attach (or detach) the resolved command definition
    pub fn set_command_info(&mut self, info: Option<CommandInfo>) {
        self.command_info = info;
    }

    /// Copy of the definition under a fresh key, without runtime state
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            key: StepKey::new(),
            comment: self.comment.clone(),
            body: self.body.clone(),
            output: StepOutput::default(),
            command_info: self.command_info.clone(),
        }
    }

    /// Parameter names referenced by a check or verify step
    #[must_use]
    pub fn parameters(&self) -> Vec<&str> {
        match &self.body {
            StepBody::Check(check) => check.parameters.iter().map(String::as_str).collect(),
            StepBody::Verify(verify) => verify
                .condition
                .iter()
                .map(|c| c.parameter.as_str())
                .collect(),
            StepBody::Command(_) | StepBody::Text(_) => Vec::new(),
        }
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.comment == other.comment && self.body == other.body
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            StepBody::Command(c) => write!(f, "{c}"),
            StepBody::Check(c) => write!(f, "check {}", c.parameters.join(", ")),
            StepBody::Text(t) => f.write_str(t.text.lines().next().unwrap_or("")),
            StepBody::Verify(v) => {
                let terms: Vec<String> = v.condition.iter().map(ToString::to_string).collect();
                write!(f, "verify {}", terms.join(" and "))
            }
        }
    }
}
