//! Reconciler contract and the dependencies handed to a reconciler at
//! construction

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::ResourceClient;
use crate::events::EventPublisher;
use crate::Error;

/// A control loop step: converge the resource named by `key`
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Reconcile the resource identified by `namespace/name` (or `name` for
    /// cluster-scoped resources)
    async fn reconcile(&self, key: &str) -> Result<(), Error>;
}

/// Everything a reconciler needs from its environment
///
/// Three clients split by resource domain: core Kubernetes types, relay
/// eventing CRDs, and schema-less access to anything else.
#[derive(Clone)]
pub struct Options {
    /// Client for core Kubernetes resources
    pub kube_client: Arc<dyn ResourceClient>,
    /// Client for relay eventing resources
    pub eventing_client: Arc<dyn ResourceClient>,
    /// Schema-less client for arbitrary resources
    pub dynamic_client: Arc<dyn ResourceClient>,
    /// Event sink
    pub recorder: Arc<dyn EventPublisher>,
    /// Span the reconciler should log under
    pub span: tracing::Span,
}

/// Split a reconcile key into namespace and name
///
/// `"ns/name"` yields `(Some("ns"), "name")`, `"name"` yields `(None, "name")`.
pub fn split_key(key: &str) -> Result<(Option<&str>, &str), Error> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((None, *name)),
        [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
            Ok((Some(*namespace), *name))
        }
        _ => Err(Error::invalid_key(key)),
    }
}
