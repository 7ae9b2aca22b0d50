//! Broker CRD: an event mesh entry point that fans events out to Triggers

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{DeliverySpec, EventingStatus, ObjectRef};
use crate::Error;

/// Broker receives events and routes them to matching Triggers.
///
/// Example:
/// ```yaml
/// apiVersion: eventing.relay.dev/v1alpha1
/// kind: Broker
/// metadata:
///   name: default
///   namespace: team-a
/// spec:
///   config:
///     apiVersion: v1
///     kind: ConfigMap
///     name: broker-config
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "eventing.relay.dev",
    version = "v1alpha1",
    kind = "Broker",
    namespaced,
    status = "EventingStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.address.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSpec {
    /// Implementation-specific configuration object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ObjectRef>,

    /// Delivery retry settings applied to every Trigger of this Broker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySpec>,
}

impl BrokerSpec {
    /// Validate the broker configuration
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if let Some(config) = &self.config {
            if config.name.is_empty() {
                return Err(Error::validation_for_field(
                    name,
                    "spec.config.name",
                    "config reference requires a name",
                ));
            }
        }
        if let Some(delivery) = &self.delivery {
            delivery.validate(name)?;
        }
        Ok(())
    }
}
