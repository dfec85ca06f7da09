//! Incident record handed to the handler on standard input.
//!
//! The event is deserialized from the monitoring pipeline's JSON form
//! (snake_case keys, `metadata` objects) and exposed to templates with
//! PascalCase keys, metadata promoted onto its owner: `Entity.Name`,
//! `Check.Output`, `Check.Hooks[0].Command`.

use crate::error::EventError;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Name, namespace, labels and annotations shared by every object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub metadata: ObjectMeta,
    pub entity_class: String,
    pub subscriptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Hook {
    pub metadata: ObjectMeta,
    pub command: String,
    pub output: String,
    pub status: i32,
    pub executed: i64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Check {
    pub metadata: ObjectMeta,
    pub command: String,
    pub output: String,
    pub status: u32,
    pub state: String,
    pub executed: i64,
    pub issued: i64,
    pub duration: f64,
    pub occurrences: i64,
    pub interval: u32,
    pub hooks: Vec<Hook>,
}

/// A monitoring event: one check result for one entity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Event {
    pub timestamp: i64,
    pub entity: Option<Entity>,
    pub check: Option<Check>,
}

impl Event {
    /// Parse and validate an event from its JSON form.
    pub fn from_json(input: &str) -> Result<Self, EventError> {
        let event: Event =
            serde_json::from_str(input).map_err(|e| EventError::InvalidJson(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    /// An event must carry a named entity and a named check.
    pub fn validate(&self) -> Result<(), EventError> {
        let entity = self.entity.as_ref().ok_or(EventError::Missing("entity"))?;
        if entity.metadata.name.is_empty() {
            return Err(EventError::Missing("entity name"));
        }
        let check = self.check.as_ref().ok_or(EventError::Missing("check"))?;
        if check.metadata.name.is_empty() {
            return Err(EventError::Missing("check name"));
        }
        Ok(())
    }

    pub fn entity_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.entity.as_ref().map(|e| &e.metadata.annotations)
    }

    pub fn check_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.check.as_ref().map(|c| &c.metadata.annotations)
    }

    /// Build the template data context.
    pub fn template_context(&self) -> Value {
        let entity = self.entity.clone().unwrap_or_default();
        let check = self.check.clone().unwrap_or_default();

        let hooks: Vec<Value> = check
            .hooks
            .iter()
            .map(|hook| {
                json!({
                    "Name": hook.metadata.name,
                    "Namespace": hook.metadata.namespace,
                    "Labels": hook.metadata.labels,
                    "Annotations": hook.metadata.annotations,
                    "Command": hook.command,
                    "Output": hook.output,
                    "Status": hook.status,
                    "Executed": hook.executed,
                    "Duration": hook.duration,
                })
            })
            .collect();

        json!({
            "Timestamp": self.timestamp,
            "Entity": {
                "Name": entity.metadata.name,
                "Namespace": entity.metadata.namespace,
                "Labels": entity.metadata.labels,
                "Annotations": entity.metadata.annotations,
                "EntityClass": entity.entity_class,
                "Subscriptions": entity.subscriptions,
            },
            "Check": {
                "Name": check.metadata.name,
                "Namespace": check.metadata.namespace,
                "Labels": check.metadata.labels,
                "Annotations": check.metadata.annotations,
                "Command": check.command,
                "Output": check.output,
                "Status": check.status,
                "State": check.state,
                "Executed": check.executed,
                "Issued": check.issued,
                "Duration": check.duration,
                "Occurrences": check.occurrences,
                "Interval": check.interval,
                "Hooks": hooks,
            },
        })
    }
}
