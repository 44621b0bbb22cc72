//! Command acknowledgments
//!
//! The command history service reports progress of an issued command as a
//! stream of partial updates keyed by command id. Updates for the same id
//! accumulate: a record is never replaced wholesale.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque command identifier returned by the issuance service
///
/// Used purely as a correlation token between issued steps and
/// acknowledgment updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CommandId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status of one acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AckStatus {
    /// Stage passed
    Ok,
    /// Stage failed
    Nok,
    /// Stage not yet reached
    Pending,
    /// Stage disabled for this command
    Disabled,
    /// Command cancelled at this stage
    Cancelled,
    /// Any status this client does not know about
    Other(String),
}

impl AckStatus {
    /// Wire form of the status
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK",
            Self::Nok => "NOK",
            Self::Pending => "PENDING",
            Self::Disabled => "DISABLED",
            Self::Cancelled => "CANCELLED",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for AckStatus {
    fn from(value: &str) -> Self {
        match value {
            "OK" => Self::Ok,
            "NOK" => Self::Nok,
            "PENDING" => Self::Pending,
            "DISABLED" => Self::Disabled,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AckStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<AckStatus> for String {
    fn from(value: AckStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named acknowledgment of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// Current status
    pub status: AckStatus,
    /// Time the status was reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// Optional explanation (typically set on NOK)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Acknowledgment {
    /// Create an acknowledgment without time or message
    #[inline]
    #[must_use]
    pub fn new(status: impl Into<AckStatus>) -> Self {
        Self {
            status: status.into(),
            time: None,
            message: None,
        }
    }

    /// With report time
    #[inline]
    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// With explanation
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A single update delivered by the command history stream
#[derive(Debug, Clone, PartialEq)]
pub struct CommandHistoryEntry {
    /// Command the update is about
    pub id: CommandId,
    /// Acknowledgments carried by this update
    pub acks: IndexMap<String, Acknowledgment>,
}

impl CommandHistoryEntry {
    /// Create an empty update for a command
    #[must_use]
    pub fn new(id: impl Into<CommandId>) -> Self {
        Self {
            id: id.into(),
            acks: IndexMap::new(),
        }
    }

    /// Add an acknowledgment to the update
    #[must_use]
    pub fn with_ack(mut self, name: impl Into<String>, ack: Acknowledgment) -> Self {
        self.acks.insert(name.into(), ack);
        self
    }
}

/// Accumulated acknowledgment state of one command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandHistoryRecord {
    id: CommandId,
    acks_by_name: IndexMap<String, Acknowledgment>,
}

impl CommandHistoryRecord {
    /// Start a record from its first update
    #[must_use]
    pub fn from_entry(entry: CommandHistoryEntry) -> Self {
        Self {
            id: entry.id,
            acks_by_name: entry.acks,
        }
    }

    /// Merge a later update into this record
    ///
    /// Names present in the update overwrite earlier statuses; all other
    /// names are kept. Updates for a different id are ignored.
    pub fn merge_entry(&mut self, entry: CommandHistoryEntry) {
        if entry.id != self.id {
            return;
        }
        for (name, ack) in entry.acks {
            self.acks_by_name.insert(name, ack);
        }
    }

    /// Command id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &CommandId {
        &self.id
    }

    /// Acknowledgment by name
    #[inline]
    #[must_use]
    pub fn acknowledgment(&self, name: &str) -> Option<&Acknowledgment> {
        self.acks_by_name.get(name)
    }

    /// All acknowledgments, in order of first appearance
    pub fn acknowledgments(&self) -> impl Iterator<Item = (&str, &Acknowledgment)> {
        self.acks_by_name.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct acknowledgment names
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.acks_by_name.len()
    }

    /// True when no acknowledgment was reported yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.acks_by_name.is_empty()
    }
}

/// Owned map of command id to accumulated record
///
/// Records are kept for every update received, including updates for
/// commands no step is waiting on yet: the issuance response may arrive after
/// the first acknowledgments.
#[derive(Debug, Clone, Default)]
pub struct CommandRecords {
    records: HashMap<CommandId, CommandHistoryRecord>,
}

impl CommandRecords {
    /// Create an empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update, returning the resulting record
    pub fn merge(&mut self, entry: CommandHistoryEntry) -> &CommandHistoryRecord {
        use std::collections::hash_map::Entry;

        match self.records.entry(entry.id.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().merge_entry(entry);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(CommandHistoryRecord::from_entry(entry)),
        }
    }

    /// Record for a command, if any update was received
    #[inline]
    #[must_use]
    pub fn get(&self, id: &CommandId) -> Option<&CommandHistoryRecord> {
        self.records.get(id)
    }

    /// Number of commands with a record
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no update was received
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget all records
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str, name: &str, status: &str) -> CommandHistoryEntry {
        CommandHistoryEntry::new(id).with_ack(name, Acknowledgment::new(status))
    }

    #[test]
    fn status_round_trips_through_text() {
        for text in ["OK", "NOK", "PENDING", "DISABLED", "CANCELLED", "TIMEOUT"] {
            let status = AckStatus::from(text);
            assert_eq!(status.as_str(), text);
        }
        assert_eq!(AckStatus::from("TIMEOUT"), AckStatus::Other("TIMEOUT".into()));
    }

    #[test]
    fn merge_keeps_union_of_names() {
        let mut records = CommandRecords::new();
        records.merge(update("1", "Acknowledge_Queued", "OK"));
        let rec = records.merge(update("1", "Acknowledge_Released", "PENDING"));

        assert_eq!(rec.len(), 2);
        assert_eq!(rec.acknowledgment("Acknowledge_Queued").unwrap().status, AckStatus::Ok);
        assert_eq!(
            rec.acknowledgment("Acknowledge_Released").unwrap().status,
            AckStatus::Pending
        );
    }

    #[test]
    fn merge_overwrites_same_name() {
        let mut records = CommandRecords::new();
        records.merge(update("1", "Acknowledge_Sent", "PENDING"));
        let rec = records.merge(update("1", "Acknowledge_Sent", "NOK"));

        assert_eq!(rec.len(), 1);
        assert_eq!(rec.acknowledgment("Acknowledge_Sent").unwrap().status, AckStatus::Nok);
    }

    #[test]
    fn record_ignores_other_ids() {
        let mut rec = CommandHistoryRecord::from_entry(update("1", "A", "OK"));
        rec.merge_entry(update("2", "B", "OK"));
        assert_eq!(rec.len(), 1);
        assert!(rec.acknowledgment("B").is_none());
    }

    #[test]
    fn records_are_per_id() {
        let mut records = CommandRecords::new();
        records.merge(update("1", "A", "OK"));
        records.merge(update("2", "A", "NOK"));
        assert_eq!(records.len(), 2);
        assert_eq!(
            records.get(&CommandId::new("2")).unwrap().acknowledgment("A").unwrap().status,
            AckStatus::Nok
        );
    }

    #[test]
    fn status_serde_uses_wire_form() {
        let json = serde_json::to_string(&AckStatus::Disabled).unwrap();
        assert_eq!(json, "\"DISABLED\"");
        let back: AckStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(back, AckStatus::Cancelled);
    }
}
