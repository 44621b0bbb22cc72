//! Command definition enrichment
//!
//! After parsing, each command step is resolved against the mission database:
//! - the resolved definition is attached to the step for display
//! - enumeration arguments given as raw values are relabelled
//! - for XML stacks, aggregate and array arguments are JSON-decoded
//!
//! A failed lookup is not an error: the step keeps its raw arguments and has
//! no definition attached.

use crate::error::LookupError;
use crate::format::StackFormat;
use async_trait::async_trait;
use cstack_model::{CommandInfo, CommandStep, Step};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

/// Command definition lookup service
#[async_trait]
pub trait CommandDefinitionLookup: Send + Sync {
    /// Resolve a command by alias namespace (if any) and name
    async fn command(&self, namespace: Option<&str>, name: &str)
        -> Result<CommandInfo, LookupError>;
}

/// Outcome of an enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Command steps with a resolved definition
    pub resolved: usize,
    /// Command steps whose lookup failed
    pub unresolved: usize,
}

/// Resolve every command step concurrently and enrich its arguments
pub async fn enrich_steps(
    steps: &mut [Step],
    format: StackFormat,
    lookup: &dyn CommandDefinitionLookup,
) -> EnrichmentSummary {
    let requests: Vec<(usize, Option<String>, String)> = steps
        .iter()
        .enumerate()
        .filter_map(|(index, step)| {
            step.as_command()
                .map(|c| (index, c.namespace.clone(), c.name.clone()))
        })
        .collect();

    let results = join_all(
        requests
            .iter()
            .map(|(_, namespace, name)| lookup.command(namespace.as_deref(), name)),
    )
    .await;

    let mut summary = EnrichmentSummary::default();
    for ((index, _, name), result) in requests.iter().zip(results) {
        let step = &mut steps[*index];
        match result {
            Ok(info) => {
                if let Some(command) = step.as_command_mut() {
                    relabel_enumerations(command, &info);
                    if format == StackFormat::Xml {
                        decode_complex_arguments(command, &info);
                    }
                }
                step.set_command_info(Some(info));
                summary.resolved += 1;
            }
            Err(err) => {
                debug!(command = %name, error = %err, "command definition not resolved");
                step.set_command_info(None);
                summary.unresolved += 1;
            }
        }
    }
    summary
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace raw enumeration values by their label
///
/// Values that already equal a label are kept as they are.
pub fn relabel_enumerations(command: &mut CommandStep, info: &CommandInfo) {
    for (name, value) in &mut command.args {
        let Some(argument) = info.find_argument(name) else {
            continue;
        };
        if !argument.arg_type.is_enumeration() {
            continue;
        }
        let states = &argument.arg_type.enum_values;
        if value.as_str().is_some_and(|v| states.iter().any(|s| s.label == v)) {
            continue;
        }
        let raw = value_text(value);
        if let Some(state) = states.iter().find(|s| s.value.to_string() == raw) {
            *value = Value::String(state.label.clone());
        }
    }
}

/// Decode JSON-encoded aggregate and array arguments
pub fn decode_complex_arguments(command: &mut CommandStep, info: &CommandInfo) {
    for (name, value) in &mut command.args {
        let is_complex = info
            .find_argument(name)
            .is_some_and(|a| a.arg_type.is_complex());
        if !is_complex {
            continue;
        }
        let Value::String(encoded) = value else {
            continue;
        };
        match serde_json::from_str::<Value>(encoded) {
            Ok(decoded) => *value = decoded,
            Err(err) => warn!(argument = %name, error = %err, "leaving undecodable argument as text"),
        }
    }
}
