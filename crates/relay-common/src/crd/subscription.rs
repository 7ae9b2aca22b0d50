//! Subscription CRD: connects a Channel to a subscriber and optional reply

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Destination, EventingStatus, ObjectRef};
use crate::Error;

/// Subscription routes events from a Channel to a subscriber.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "eventing.relay.dev",
    version = "v1alpha1",
    kind = "Subscription",
    namespaced,
    status = "EventingStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Channel events are read from
    pub channel: ObjectRef,

    /// Receiver of the events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<Destination>,

    /// Where subscriber responses are sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Destination>,
}

impl SubscriptionSpec {
    /// Validate channel reference and destinations
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if self.channel.name.is_empty() || self.channel.kind.is_empty() {
            return Err(Error::validation_for_field(
                name,
                "spec.channel",
                "channel reference requires kind and name",
            ));
        }
        if self.subscriber.is_none() && self.reply.is_none() {
            return Err(Error::validation_for_field(
                name,
                "spec",
                "expected at least one of subscriber or reply",
            ));
        }
        if let Some(subscriber) = &self.subscriber {
            subscriber.validate(name, "spec.subscriber")?;
        }
        if let Some(reply) = &self.reply {
            reply.validate(name, "spec.reply")?;
        }
        Ok(())
    }
}
