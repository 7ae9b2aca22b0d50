//! Kubernetes Event recording for relay reconcilers.
//!
//! Reconcilers emit events through [`EventPublisher`] so the same code can
//! publish through `kube::runtime::events::Recorder` in a cluster and into an
//! in-memory buffer under test.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};

/// Trait for publishing Kubernetes Events.
///
/// Implementations are expected to be fire-and-forget: `publish()` logs a
/// warning on failure but never returns an error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "ChannelReconciled")
    /// * `action` - What action was taken (e.g. "Reconcile")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Build the ObjectReference an event about `obj` should point at
pub fn object_ref<K: Resource<DynamicType = ()>>(obj: &K) -> ObjectReference {
    ObjectReference {
        api_version: Some(K::api_version(&()).into_owned()),
        kind: Some(K::kind(&()).into_owned()),
        name: Some(obj.name_any()),
        namespace: obj.namespace(),
        uid: obj.uid(),
        resource_version: obj.resource_version(),
        field_path: None,
    }
}

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// Channel reconciled and addressable
    pub const CHANNEL_RECONCILED: &str = "ChannelReconciled";
    /// Channel could not be reconciled
    pub const CHANNEL_RECONCILE_FAILED: &str = "ChannelReconcileFailed";
    /// Status update was rejected by the API server
    pub const UPDATE_FAILED: &str = "UpdateFailed";
}

/// Well-known event action strings.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Creating a dependent resource
    pub const CREATE: &str = "Create";
    /// Updating resource status
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}
