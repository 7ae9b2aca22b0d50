//! In-memory [`ResourceClient`] that records every call
//!
//! A call is logged first, then offered to the reactor chain, then applied to
//! the [`ObjectTracker`] if no reactor handled it. The log therefore shows
//! exactly what the reconciler sent, including calls a reactor rejected.

use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use relay_common::client::{PatchKind, ResourceClient};

use crate::action::{Action, ActionRecorder, Verb};
use crate::reactor::{run_chain, Reactor};
use crate::tracker::{internal_error, not_found, ObjectTracker};

/// A simulated API client over an in-memory store
pub struct FakeClient {
    name: String,
    tracker: Mutex<ObjectTracker>,
    reactors: Mutex<Vec<Reactor>>,
    actions: Mutex<Vec<Action>>,
}

impl std::fmt::Debug for FakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeClient")
            .field("name", &self.name)
            .field("objects", &self.tracker.lock().len())
            .field("reactors", &*self.reactors.lock())
            .field("actions", &self.actions.lock().len())
            .finish()
    }
}

impl FakeClient {
    /// Create a client seeded with `seeds`
    ///
    /// Seeds are stored as given; they are not recorded as actions.
    pub fn new(
        name: impl Into<String>,
        seeds: impl IntoIterator<Item = (ApiResource, DynamicObject)>,
    ) -> Result<Self, kube::Error> {
        let mut tracker = ObjectTracker::new();
        for (resource, obj) in seeds {
            tracker.add(&resource, obj)?;
        }
        let name = name.into();
        debug!(client = %name, objects = tracker.len(), "seeded fake client");
        Ok(Self {
            name,
            tracker: Mutex::new(tracker),
            reactors: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
        })
    }

    /// Label given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a reactor to the end of the chain
    pub fn add_reactor(&self, reactor: Reactor) {
        self.reactors.lock().push(reactor);
    }

    /// Insert a reactor at the front of the chain
    pub fn prepend_reactor(&self, reactor: Reactor) {
        self.reactors.lock().insert(0, reactor);
    }

    /// Installed reactors, in evaluation order
    pub fn reactors(&self) -> Vec<Reactor> {
        self.reactors.lock().clone()
    }

    /// Read the store directly, without recording an action
    pub fn stored(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<DynamicObject> {
        self.tracker.lock().get(resource, namespace, name).ok()
    }

    /// Number of objects in the store
    pub fn stored_len(&self) -> usize {
        self.tracker.lock().len()
    }

    fn record(&self, action: &Action) {
        debug!(
            client = %self.name,
            verb = %action.verb,
            resource = %action.resource.plural,
            namespace = ?action.namespace,
            name = ?action.object_name(),
            subresource = ?action.subresource,
            "recorded action"
        );
        self.actions.lock().push(action.clone());
    }

    /// Run an action through the chain and the store
    ///
    /// The reactor list is snapshotted so handlers never run under a lock.
    pub fn invoke(&self, mut action: Action) -> Result<Option<DynamicObject>, kube::Error> {
        self.record(&action);
        let reactors = self.reactors();
        if let Some(result) = run_chain(&reactors, &mut action) {
            return match result {
                Ok(None) if matches!(action.verb, Verb::Create | Verb::Update) => {
                    Ok(action.object.take())
                }
                other => other,
            };
        }
        self.tracker.lock().react(&action)
    }

    /// List variant of [`Self::invoke`]
    ///
    /// A reactor can only fail a list; a handled success reads the store.
    pub fn invoke_list(&self, mut action: Action) -> Result<Vec<DynamicObject>, kube::Error> {
        self.record(&action);
        let reactors = self.reactors();
        if let Some(Err(e)) = run_chain(&reactors, &mut action) {
            return Err(e);
        }
        Ok(self
            .tracker
            .lock()
            .list(&action.resource, action.namespace.as_deref()))
    }

    fn expect_object(
        &self,
        result: Result<Option<DynamicObject>, kube::Error>,
        verb: Verb,
    ) -> Result<DynamicObject, kube::Error> {
        result?.ok_or_else(|| internal_error(format!("{verb} on {} returned no object", self.name)))
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn get<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
    ) -> Result<DynamicObject, kube::Error> {
        self.invoke(Action::get(resource, namespace, name))?
            .ok_or_else(|| not_found(resource, name))
    }

    async fn list<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        self.invoke_list(Action::list(resource, namespace))
    }

    async fn create<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        let result = self.invoke(Action::create(resource, namespace, obj));
        self.expect_object(result, Verb::Create)
    }

    async fn update<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        let result = self.invoke(Action::update(resource, namespace, obj));
        self.expect_object(result, Verb::Update)
    }

    async fn update_status<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        let result = self.invoke(Action::update_status(resource, namespace, obj));
        self.expect_object(result, Verb::Update)
    }

    async fn patch<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
        kind: PatchKind,
        patch: &Value,
    ) -> Result<DynamicObject, kube::Error> {
        let result = self.invoke(Action::patch(resource, namespace, name, kind, patch));
        match result? {
            Some(obj) => Ok(obj),
            None => self.tracker.lock().get(resource, namespace, name),
        }
    }

    async fn delete<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
    ) -> Result<(), kube::Error> {
        self.invoke(Action::delete(resource, namespace, name))
            .map(|_| ())
    }
}

impl ActionRecorder for FakeClient {
    fn recorder_name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    fn clear_actions(&self) {
        self.actions.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::{generate_name_reactor, induce_failure, Reaction};
    use kube::core::GroupVersionKind;
    use serde_json::json;

    fn config_maps() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"))
    }

    fn config_map(name: &str) -> DynamicObject {
        let mut obj = DynamicObject::new(name, &config_maps()).within("ns");
        obj.data = json!({"data": {"k": "v"}});
        obj
    }

    fn client() -> FakeClient {
        FakeClient::new("kube", vec![(config_maps(), config_map("seeded"))]).unwrap()
    }

    #[tokio::test]
    async fn seeds_are_readable_and_not_recorded() {
        let client = client();
        assert!(client.actions().is_empty());
        let got = client.get(&config_maps(), Some("ns"), "seeded").await.unwrap();
        assert_eq!(got.data["data"]["k"], "v");
        assert_eq!(client.actions().len(), 1);
        assert_eq!(client.actions()[0].verb, Verb::Get);
    }

    #[tokio::test]
    async fn rejected_calls_are_still_recorded() {
        let client = client();
        client.add_reactor(induce_failure("create", "configmaps"));

        let err = client
            .create(&config_maps(), Some("ns"), &config_map("new"))
            .await
            .unwrap_err();
        assert!(matches!(err, kube::Error::Api(ae) if ae.code == 500));
        assert_eq!(client.actions().len(), 1);
        assert!(client.stored(&config_maps(), Some("ns"), "new").is_none());
    }

    #[tokio::test]
    async fn action_log_keeps_what_the_caller_sent() {
        let client = client();
        client.add_reactor(generate_name_reactor());
        let mut obj = config_map("");
        obj.metadata.name = None;
        obj.metadata.generate_name = Some("cfg-".to_string());

        let created = client.create(&config_maps(), Some("ns"), &obj).await.unwrap();
        let stored_name = created.metadata.name.unwrap();
        assert!(stored_name.starts_with("cfg-"));
        assert!(client.stored(&config_maps(), Some("ns"), &stored_name).is_some());
        assert_eq!(client.actions()[0].object_name(), None);
    }

    #[tokio::test]
    async fn handled_create_without_object_echoes_request() {
        let client = client();
        client.add_reactor(Reactor::new("create", "*", |_| Reaction::Handled(Ok(None))));
        let created = client
            .create(&config_maps(), Some("ns"), &config_map("echo"))
            .await
            .unwrap();
        assert_eq!(created.metadata.name.as_deref(), Some("echo"));
        assert_eq!(client.stored_len(), 1);
    }

    #[tokio::test]
    async fn prepended_reactors_run_first() {
        let client = client();
        client.add_reactor(induce_failure("*", "*"));
        client.prepend_reactor(Reactor::new("get", "*", |_| {
            Reaction::object(config_map("from-reactor"))
        }));
        let got = client.get(&config_maps(), Some("ns"), "anything").await.unwrap();
        assert_eq!(got.metadata.name.as_deref(), Some("from-reactor"));
    }

    #[tokio::test]
    async fn list_failures_come_from_reactors() {
        let client = client();
        assert_eq!(client.list(&config_maps(), Some("ns")).await.unwrap().len(), 1);
        client.add_reactor(induce_failure("list", "configmaps"));
        assert!(client.list(&config_maps(), Some("ns")).await.is_err());
    }

    #[tokio::test]
    async fn patch_and_delete_go_through_the_store() {
        let client = client();
        let patched = client
            .patch(
                &config_maps(),
                Some("ns"),
                "seeded",
                PatchKind::Merge,
                &json!({"data": {"k": "w"}}),
            )
            .await
            .unwrap();
        assert_eq!(patched.data["data"]["k"], "w");

        client.delete(&config_maps(), Some("ns"), "seeded").await.unwrap();
        assert_eq!(client.stored_len(), 0);
        assert_eq!(client.actions().len(), 2);

        client.clear_actions();
        assert!(client.actions().is_empty());
    }
}
