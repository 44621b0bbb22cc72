//! Testing utilities for the cstack workspace
//!
//! Shared fixtures and scripted collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use cstack_codec::{CommandDefinitionLookup, LookupError};
use cstack_engine::{CommandIssuer, EngineEvent, IssueError, IssueRequest};
use cstack_model::{
    Acknowledgment, CommandHistoryEntry, CommandId, CommandInfo, CommandStep, Step,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

pub const QUEUED: &str = "Acknowledge_Queued";

/// Legacy XML stack with two commands
pub const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<commandStack>
  <command qualifiedName="/YSS/SIMULATOR/SWITCH_VOLTAGE_ON" comment="power up">
    <commandArgument argumentName="voltage_num" argumentValue="1"/>
  </command>
  <command qualifiedName="/YSS/SIMULATOR/SWITCH_VOLTAGE_OFF">
    <commandArgument argumentName="voltage_num" argumentValue="1"/>
  </command>
</commandStack>
"#;

/// The command / check / command stack used by end-to-end tests
pub const THREE_STEP_YCS: &str = r#"{
  "steps": [
    {"type": "command", "name": "/CMD_A"},
    {"type": "check", "parameters": [{"parameter": "/P1"}]},
    {"type": "command", "name": "/CMD_C"}
  ],
  "advancement": {"acknowledgment": "Acknowledge_Queued", "wait": 100}
}"#;

pub fn command(name: &str) -> Step {
    Step::command(CommandStep::new(name))
}

pub fn ack_entry(id: &str, name: &str, status: &str) -> CommandHistoryEntry {
    CommandHistoryEntry::new(id).with_ack(name, Acknowledgment::new(status))
}

pub fn ack_event(id: &str, name: &str, status: &str) -> EngineEvent {
    EngineEvent::HistoryUpdated(ack_entry(id, name, status))
}

/// Issuer answering from a script
///
/// Commands succeed with ids `cmd-1`, `cmd-2`, ... unless told to fail. When
/// connected, acknowledgments scripted for a command name are pushed to the
/// event channel before the issuance call returns.
#[derive(Default)]
pub struct ScriptedIssuer {
    failures: Mutex<HashMap<String, String>>,
    acks: Mutex<HashMap<String, Vec<(String, String)>>>,
    events: Mutex<Option<UnboundedSender<EngineEvent>>>,
    issued: Mutex<Vec<IssueRequest>>,
}

impl ScriptedIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, name: &str, message: &str) -> Self {
        self.failures.lock().insert(name.to_string(), message.to_string());
        self
    }

    pub fn acknowledge(self, name: &str, ack: &str, status: &str) -> Self {
        self.acks
            .lock()
            .entry(name.to_string())
            .or_default()
            .push((ack.to_string(), status.to_string()));
        self
    }

    pub fn connect(&self, events: UnboundedSender<EngineEvent>) {
        *self.events.lock() = Some(events);
    }

    pub fn issued(&self) -> Vec<IssueRequest> {
        self.issued.lock().clone()
    }

    pub fn issued_names(&self) -> Vec<String> {
        self.issued.lock().iter().map(|r| r.name.clone()).collect()
    }
}

#[async_trait]
impl CommandIssuer for ScriptedIssuer {
    async fn issue_command(&self, request: &IssueRequest) -> Result<CommandId, IssueError> {
        let number = {
            let mut issued = self.issued.lock();
            issued.push(request.clone());
            issued.len()
        };
        if let Some(message) = self.failures.lock().get(&request.name) {
            return Err(IssueError::rejected(message.clone()));
        }

        let id = CommandId::new(format!("cmd-{number}"));
        let acks = self.acks.lock().get(&request.name).cloned().unwrap_or_default();
        if let Some(events) = self.events.lock().as_ref() {
            for (ack, status) in acks {
                let _ = events.send(ack_event(id.as_str(), &ack, &status));
            }
        }
        Ok(id)
    }
}

/// Definition lookup over a fixed table keyed by qualified name or alias name
#[derive(Debug, Default)]
pub struct StaticLookup {
    commands: Vec<CommandInfo>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, info: CommandInfo) -> Self {
        self.commands.push(info);
        self
    }
}

#[async_trait]
impl CommandDefinitionLookup for StaticLookup {
    async fn command(&self, namespace: Option<&str>, name: &str) -> Result<CommandInfo, LookupError> {
        self.commands
            .iter()
            .find(|info| match namespace {
                Some(ns) => info.alias_in(ns).is_some_and(|alias| alias.name == name),
                None => info.qualified_name == name,
            })
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }
}
