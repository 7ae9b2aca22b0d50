//! Channel CRD: a durable event transport with a list of subscribers

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{DeliverySpec, EventingStatus};
use crate::Error;

/// Channel buffers events and forwards them to every subscriber.
///
/// Example:
/// ```yaml
/// apiVersion: eventing.relay.dev/v1alpha1
/// kind: Channel
/// metadata:
///   name: orders
///   namespace: shop
/// spec:
///   subscribers:
///     - uid: 2f9b
///       subscriberUri: http://billing.shop.svc
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "eventing.relay.dev",
    version = "v1alpha1",
    kind = "Channel",
    namespaced,
    status = "EventingStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.address.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    /// Subscribers currently attached to this channel
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscribers: Vec<SubscriberSpec>,

    /// Delivery retry settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySpec>,
}

/// A resolved subscriber entry written by the Subscription reconciler
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSpec {
    /// UID of the owning Subscription
    pub uid: String,

    /// Generation of the Subscription this entry was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,

    /// Resolved subscriber URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_uri: Option<String>,

    /// Resolved reply URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_uri: Option<String>,
}

impl ChannelSpec {
    /// Validate subscriber entries and delivery settings
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        for (i, sub) in self.subscribers.iter().enumerate() {
            if sub.uid.is_empty() {
                return Err(Error::validation_for_field(
                    name,
                    format!("spec.subscribers[{i}].uid"),
                    "subscriber uid is required",
                ));
            }
            if sub.subscriber_uri.is_none() && sub.reply_uri.is_none() {
                return Err(Error::validation_for_field(
                    name,
                    format!("spec.subscribers[{i}]"),
                    "expected at least one of subscriberUri or replyUri",
                ));
            }
        }
        if let Some(delivery) = &self.delivery {
            delivery.validate(name)?;
        }
        Ok(())
    }
}
