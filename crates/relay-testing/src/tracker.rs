//! In-memory object store backing each fake client
//!
//! The tracker is the last stop of every reaction chain: an action no reactor
//! handled is applied here with API-server semantics (conflicts, not-found,
//! resourceVersion bumps) and answered with the status codes a real server
//! would send.

use std::collections::BTreeMap;

use kube::core::{ApiResource, DynamicObject, ErrorResponse};
use serde_json::Value;
use tracing::debug;

use relay_common::client::PatchKind;

use crate::action::{Action, PatchPayload, Verb};

/// Construct a `kube::Error` the way the API server reports failures
pub fn api_error(code: u16, reason: &str, message: impl Into<String>) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.into(),
        reason: reason.to_string(),
        code,
    })
}

/// 404 for a missing object
pub fn not_found(resource: &ApiResource, name: &str) -> kube::Error {
    api_error(
        404,
        "NotFound",
        format!("{} {name:?} not found", qualified(resource)),
    )
}

/// 409 for a name that is already taken
pub fn already_exists(resource: &ApiResource, name: &str) -> kube::Error {
    api_error(
        409,
        "AlreadyExists",
        format!("{} {name:?} already exists", qualified(resource)),
    )
}

/// 409 for a stale resourceVersion
pub fn conflict(resource: &ApiResource, name: &str) -> kube::Error {
    api_error(
        409,
        "Conflict",
        format!(
            "Operation cannot be fulfilled on {} {name:?}: the object has been modified; \
             please apply your changes to the latest version and try again",
            qualified(resource)
        ),
    )
}

/// 422 for an object that fails validation
pub fn invalid(kind: &str, name: &str, message: impl std::fmt::Display) -> kube::Error {
    api_error(422, "Invalid", format!("{kind} {name:?} is invalid: {message}"))
}

/// 400 for a malformed request
pub fn bad_request(message: impl Into<String>) -> kube::Error {
    api_error(400, "BadRequest", message)
}

/// 500 for a server-side failure
pub fn internal_error(message: impl Into<String>) -> kube::Error {
    api_error(500, "InternalError", message)
}

fn qualified(resource: &ApiResource) -> String {
    if resource.group.is_empty() {
        resource.plural.clone()
    } else {
        format!("{}.{}", resource.plural, resource.group)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    group: String,
    plural: String,
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn new(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            group: resource.group.clone(),
            plural: resource.plural.clone(),
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
        }
    }
}

/// In-memory store of schema-less objects keyed by resource, namespace and name
#[derive(Debug, Default)]
pub struct ObjectTracker {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    resource_version: u64,
    uid_seq: u64,
}

impl ObjectTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as-is, without stamping server-owned metadata
    pub fn add(&mut self, resource: &ApiResource, obj: DynamicObject) -> Result<(), kube::Error> {
        let name = required_name(resource, &obj)?;
        let key = ObjectKey::new(resource, obj.metadata.namespace.as_deref(), &name);
        if self.objects.contains_key(&key) {
            return Err(already_exists(resource, &name));
        }
        self.objects.insert(key, obj);
        Ok(())
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get one object
    pub fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, kube::Error> {
        self.objects
            .get(&ObjectKey::new(resource, namespace, name))
            .cloned()
            .ok_or_else(|| not_found(resource, name))
    }

    /// List objects of a resource, across namespaces when `namespace` is None
    pub fn list(&self, resource: &ApiResource, namespace: Option<&str>) -> Vec<DynamicObject> {
        self.objects
            .iter()
            .filter(|(k, _)| k.group == resource.group && k.plural == resource.plural)
            .filter(|(k, _)| namespace.map_or(true, |ns| k.namespace == ns))
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// Create an object, stamping uid, resourceVersion and generation
    pub fn create(
        &mut self,
        resource: &ApiResource,
        namespace: Option<&str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        let mut obj = obj.clone();
        check_namespace(namespace, &mut obj)?;
        let name = required_name(resource, &obj)?;
        let key = ObjectKey::new(resource, obj.metadata.namespace.as_deref(), &name);
        if self.objects.contains_key(&key) {
            return Err(already_exists(resource, &name));
        }

        self.uid_seq += 1;
        obj.metadata.uid = Some(format!("00000000-0000-0000-0000-{:012}", self.uid_seq));
        obj.metadata.generation = Some(1);
        obj.metadata.resource_version = Some(self.next_resource_version());
        self.objects.insert(key, obj.clone());
        Ok(obj)
    }

    /// Replace an object, or only its status when `status_only` is set
    pub fn update(
        &mut self,
        resource: &ApiResource,
        namespace: Option<&str>,
        obj: &DynamicObject,
        status_only: bool,
    ) -> Result<DynamicObject, kube::Error> {
        let mut obj = obj.clone();
        check_namespace(namespace, &mut obj)?;
        let name = required_name(resource, &obj)?;
        let key = ObjectKey::new(resource, obj.metadata.namespace.as_deref(), &name);
        let stored = self
            .objects
            .get(&key)
            .ok_or_else(|| not_found(resource, &name))?;

        if let Some(rv) = obj.metadata.resource_version.as_deref() {
            if stored.metadata.resource_version.as_deref() != Some(rv) {
                return Err(conflict(resource, &name));
            }
        }

        let mut next = if status_only {
            let mut next = stored.clone();
            set_field(&mut next.data, "status", obj.data.get("status").cloned());
            next
        } else {
            let mut next = obj;
            next.metadata.uid = stored.metadata.uid.clone();
            next.metadata.generation = stored.metadata.generation;
            if next.data.get("spec") != stored.data.get("spec") {
                next.metadata.generation = Some(stored.metadata.generation.unwrap_or(0) + 1);
            }
            next
        };
        next.metadata.resource_version = Some(self.next_resource_version());
        self.objects.insert(key, next.clone());
        Ok(next)
    }

    /// Apply a merge or JSON patch to a stored object
    pub fn patch(
        &mut self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &PatchPayload,
    ) -> Result<DynamicObject, kube::Error> {
        let key = ObjectKey::new(resource, namespace, name);
        let stored = self
            .objects
            .get(&key)
            .ok_or_else(|| not_found(resource, name))?;
        let mut doc = serde_json::to_value(stored).map_err(kube::Error::SerdeError)?;

        match patch.kind {
            PatchKind::Merge => json_patch::merge(&mut doc, &patch.body),
            PatchKind::Json => {
                let ops: json_patch::Patch = serde_json::from_value(patch.body.clone())
                    .map_err(|e| bad_request(format!("invalid json patch: {e}")))?;
                json_patch::patch(&mut doc, &ops.0)
                    .map_err(|e| invalid(&resource.kind, name, e))?;
            }
        }

        let mut next: DynamicObject = serde_json::from_value(doc)
            .map_err(|e| invalid(&resource.kind, name, e))?;
        if next.metadata.name.as_deref() != Some(name) {
            return Err(invalid(&resource.kind, name, "metadata.name is immutable"));
        }
        if next.data.get("spec") != stored.data.get("spec") {
            next.metadata.generation = Some(stored.metadata.generation.unwrap_or(0) + 1);
        }
        next.metadata.resource_version = Some(self.next_resource_version());
        self.objects.insert(key, next.clone());
        Ok(next)
    }

    /// Delete an object
    pub fn delete(
        &mut self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), kube::Error> {
        self.objects
            .remove(&ObjectKey::new(resource, namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(resource, name))
    }

    /// Apply an action no reactor handled
    ///
    /// List actions return no object; callers read lists with [`Self::list`].
    pub fn react(&mut self, action: &Action) -> Result<Option<DynamicObject>, kube::Error> {
        let ns = action.namespace.as_deref();
        let name = action.object_name().unwrap_or_default().to_string();
        debug!(
            verb = %action.verb,
            resource = %action.resource.plural,
            namespace = ?ns,
            name = %name,
            "tracker handling action"
        );

        match action.verb {
            Verb::Get => self.get(&action.resource, ns, &name).map(Some),
            Verb::List => Ok(None),
            Verb::Create => {
                let obj = required_object(action)?;
                self.create(&action.resource, ns, obj).map(Some)
            }
            Verb::Update => {
                let obj = required_object(action)?;
                self.update(&action.resource, ns, obj, action.is_status_update())
                    .map(Some)
            }
            Verb::Patch => {
                let patch = action
                    .patch
                    .as_ref()
                    .ok_or_else(|| bad_request("patch action without a patch body"))?;
                self.patch(&action.resource, ns, &name, patch).map(Some)
            }
            Verb::Delete => self.delete(&action.resource, ns, &name).map(|_| None),
        }
    }

    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

fn required_object(action: &Action) -> Result<&DynamicObject, kube::Error> {
    action
        .object
        .as_ref()
        .ok_or_else(|| bad_request(format!("{} action without an object", action.verb)))
}

fn required_name(resource: &ApiResource, obj: &DynamicObject) -> Result<String, kube::Error> {
    match obj.metadata.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(invalid(
            &resource.kind,
            "",
            "metadata.name: Required value: name or generateName is required",
        )),
    }
}

/// Default the object's namespace from the request and reject mismatches
fn check_namespace(namespace: Option<&str>, obj: &mut DynamicObject) -> Result<(), kube::Error> {
    match (namespace, obj.metadata.namespace.as_deref()) {
        (Some(ns), Some(obj_ns)) if ns != obj_ns => Err(bad_request(
            "the namespace of the provided object does not match the namespace sent on the request",
        )),
        (Some(ns), None) => {
            obj.metadata.namespace = Some(ns.to_string());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn set_field(data: &mut Value, key: &str, value: Option<Value>) {
    if !data.is_object() {
        *data = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = data.as_object_mut() {
        match value {
            Some(v) => {
                map.insert(key.to_string(), v);
            }
            None => {
                map.remove(key);
            }
        }
    }
}
