//! Trigger CRD: a filtered subscription to a Broker

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Destination, EventingStatus};
use crate::Error;

/// Trigger delivers events from a Broker whose attributes match its filter.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "eventing.relay.dev",
    version = "v1alpha1",
    kind = "Trigger",
    namespaced,
    status = "EventingStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Broker","type":"string","jsonPath":".spec.broker"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    /// Broker this trigger listens on
    pub broker: String,

    /// Exact-match filter on event attributes; empty matches everything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<TriggerFilter>,

    /// Where matching events are sent
    pub subscriber: Destination,
}

/// Attribute filter for a Trigger
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TriggerFilter {
    /// Attribute name to required value
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TriggerSpec {
    /// Validate broker name, filter and subscriber
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if self.broker.is_empty() {
            return Err(Error::validation_for_field(
                name,
                "spec.broker",
                "broker is required",
            ));
        }
        if let Some(filter) = &self.filter {
            if filter.attributes.keys().any(|k| k.is_empty()) {
                return Err(Error::validation_for_field(
                    name,
                    "spec.filter.attributes",
                    "attribute names must not be empty",
                ));
            }
        }
        self.subscriber.validate(name, "spec.subscriber")
    }
}
