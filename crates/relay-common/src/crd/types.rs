//! Supporting types shared by the eventing CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Condition type reported once a resource is fully reconciled
pub const CONDITION_READY: &str = "Ready";

/// Status of a condition
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition for eventing resources
///
/// Transition timestamps are left to the API server, so two conditions built
/// from the same inputs compare equal.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., Ready, Addressable)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    /// Create a new condition
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Status block common to every eventing resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventingStatus {
    /// Generation most recently observed by the reconciler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Current conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Address events are delivered to, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,
}

impl EventingStatus {
    /// Set a condition, replacing any existing condition of the same type
    pub fn condition(mut self, condition: Condition) -> Self {
        self.set_condition(condition);
        self
    }

    /// Set a condition in place, replacing any existing condition of the same type
    pub fn set_condition(&mut self, condition: Condition) {
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
    }

    /// Mark the resource Ready
    pub fn mark_ready(&mut self) {
        self.set_condition(Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            "",
            "",
        ));
    }

    /// Mark the resource not Ready with a reason
    pub fn mark_not_ready(&mut self, reason: impl Into<String>, message: impl Into<String>) {
        self.set_condition(Condition::new(
            CONDITION_READY,
            ConditionStatus::False,
            reason,
            message,
        ));
    }

    /// Returns true if the Ready condition is True
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.type_ == CONDITION_READY && c.status == ConditionStatus::True)
    }
}

/// An address events can be sent to
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Addressable {
    /// Resolved URL
    pub url: String,
}

/// Reference to another Kubernetes object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// API version of the referent
    pub api_version: String,

    /// Kind of the referent
    pub kind: String,

    /// Name of the referent
    pub name: String,

    /// Namespace of the referent, defaults to the referrer's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where events are delivered: an object reference, a URI, or both
/// (the URI is then resolved relative to the object's address)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Addressable object to deliver to
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_: Option<ObjectRef>,

    /// Absolute or relative URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Destination {
    /// Destination pointing at a URI
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            ref_: None,
            uri: Some(uri.into()),
        }
    }

    /// Destination pointing at an object
    pub fn object(reference: ObjectRef) -> Self {
        Self {
            ref_: Some(reference),
            uri: None,
        }
    }

    /// Check that the destination names something deliverable
    pub fn validate(&self, resource: &str, field: &str) -> Result<(), Error> {
        match (&self.ref_, &self.uri) {
            (None, None) => Err(Error::validation_for_field(
                resource,
                field,
                "expected at least one of ref or uri",
            )),
            (Some(r), _) if r.name.is_empty() || r.kind.is_empty() => {
                Err(Error::validation_for_field(
                    resource,
                    format!("{field}.ref"),
                    "ref requires kind and name",
                ))
            }
            (None, Some(uri)) if !uri.contains("://") => Err(Error::validation_for_field(
                resource,
                format!("{field}.uri"),
                "uri must be absolute when no ref is set",
            )),
            _ => Ok(()),
        }
    }
}

/// Delivery retry settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySpec {
    /// Sink for events that could not be delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_sink: Option<Destination>,

    /// Number of delivery attempts before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<i32>,
}

impl DeliverySpec {
    /// Validate retry count and dead letter sink
    pub fn validate(&self, resource: &str) -> Result<(), Error> {
        if let Some(retry) = self.retry {
            if retry < 0 {
                return Err(Error::validation_for_field(
                    resource,
                    "spec.delivery.retry",
                    "retry must not be negative",
                ));
            }
        }
        if let Some(sink) = &self.dead_letter_sink {
            sink.validate(resource, "spec.delivery.deadLetterSink")?;
        }
        Ok(())
    }
}
