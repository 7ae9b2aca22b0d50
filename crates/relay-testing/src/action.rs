//! Records of client calls made by the reconciler under test

use std::sync::Arc;

use kube::core::{ApiResource, DynamicObject};
use serde_json::Value;

use relay_common::client::PatchKind;

/// Subresource name for status writes
pub const STATUS_SUBRESOURCE: &str = "status";

/// API verb of a recorded call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// Read a single object
    Get,
    /// Read a collection
    List,
    /// Create an object
    Create,
    /// Replace an object or its status
    Update,
    /// Patch an object
    Patch,
    /// Delete an object
    Delete,
}

impl Verb {
    /// Lowercase verb as used in reactor patterns
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a patch call
#[derive(Clone, Debug, PartialEq)]
pub struct PatchPayload {
    /// Patch strategy
    pub kind: PatchKind,
    /// Patch document
    pub body: Value,
}

/// A single call made against a fake client
#[derive(Clone, Debug)]
pub struct Action {
    /// API verb
    pub verb: Verb,
    /// Resource the call addressed
    pub resource: ApiResource,
    /// Request namespace, None for cluster-wide calls
    pub namespace: Option<String>,
    /// Object name for get/patch/delete
    pub name: Option<String>,
    /// Subresource, e.g. `status`
    pub subresource: Option<String>,
    /// Object sent with create/update
    pub object: Option<DynamicObject>,
    /// Patch sent with patch
    pub patch: Option<PatchPayload>,
}

impl Action {
    fn new(verb: Verb, resource: &ApiResource, namespace: Option<&str>) -> Self {
        Self {
            verb,
            resource: resource.clone(),
            namespace: namespace.map(str::to_string),
            name: None,
            subresource: None,
            object: None,
            patch: None,
        }
    }

    /// A get call
    pub fn get(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(Verb::Get, resource, namespace)
        }
    }

    /// A list call
    pub fn list(resource: &ApiResource, namespace: Option<&str>) -> Self {
        Self::new(Verb::List, resource, namespace)
    }

    /// A create call
    pub fn create(resource: &ApiResource, namespace: Option<&str>, obj: &DynamicObject) -> Self {
        Self {
            object: Some(obj.clone()),
            ..Self::new(Verb::Create, resource, namespace)
        }
    }

    /// An update call
    pub fn update(resource: &ApiResource, namespace: Option<&str>, obj: &DynamicObject) -> Self {
        Self {
            name: obj.metadata.name.clone(),
            object: Some(obj.clone()),
            ..Self::new(Verb::Update, resource, namespace)
        }
    }

    /// An update of the status subresource
    pub fn update_status(
        resource: &ApiResource,
        namespace: Option<&str>,
        obj: &DynamicObject,
    ) -> Self {
        Self {
            subresource: Some(STATUS_SUBRESOURCE.to_string()),
            ..Self::update(resource, namespace, obj)
        }
    }

    /// A patch call
    pub fn patch(
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        kind: PatchKind,
        body: &Value,
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            patch: Some(PatchPayload {
                kind,
                body: body.clone(),
            }),
            ..Self::new(Verb::Patch, resource, namespace)
        }
    }

    /// A delete call
    pub fn delete(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(Verb::Delete, resource, namespace)
        }
    }

    /// Returns true if the action matches a verb and resource pattern
    ///
    /// `*` matches anything. Resources match on plural or kind, ignoring case.
    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        let verb_ok = verb == "*" || verb.eq_ignore_ascii_case(self.verb.as_str());
        let resource_ok = resource == "*"
            || resource.eq_ignore_ascii_case(&self.resource.plural)
            || resource.eq_ignore_ascii_case(&self.resource.kind);
        verb_ok && resource_ok
    }

    /// Name the action targets, taken from the object when not set directly
    pub fn object_name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| {
            self.object
                .as_ref()
                .and_then(|o| o.metadata.name.as_deref())
        })
    }

    /// Returns true for writes to the status subresource
    pub fn is_status_update(&self) -> bool {
        self.verb == Verb::Update && self.subresource.as_deref() == Some(STATUS_SUBRESOURCE)
    }

    /// Returns true for calls that change stored state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.verb,
            Verb::Create | Verb::Update | Verb::Patch | Verb::Delete
        )
    }
}

/// Source of recorded actions
pub trait ActionRecorder: Send + Sync {
    /// Label identifying the recorder in failure messages
    fn recorder_name(&self) -> &str;

    /// Every action recorded so far, in call order
    fn actions(&self) -> Vec<Action>;

    /// Forget recorded actions
    fn clear_actions(&self);
}

/// Recorded actions grouped by verb, each group in call order
#[derive(Clone, Debug, Default)]
pub struct Actions {
    /// Get calls
    pub gets: Vec<Action>,
    /// List calls
    pub lists: Vec<Action>,
    /// Create calls
    pub creates: Vec<Action>,
    /// Update calls, including status updates
    pub updates: Vec<Action>,
    /// Patch calls
    pub patches: Vec<Action>,
    /// Delete calls
    pub deletes: Vec<Action>,
}

impl Actions {
    /// Updates that replaced the whole object
    pub fn object_updates(&self) -> Vec<&Action> {
        self.updates
            .iter()
            .filter(|a| !a.is_status_update())
            .collect()
    }

    /// Updates of the status subresource
    pub fn status_updates(&self) -> Vec<&Action> {
        self.updates
            .iter()
            .filter(|a| a.is_status_update())
            .collect()
    }
}

/// Ordered list of action recorders, one per fake client
#[derive(Clone, Default)]
pub struct ActionRecorderList(pub Vec<Arc<dyn ActionRecorder>>);

impl ActionRecorderList {
    /// Iterate recorders in order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ActionRecorder>> {
        self.0.iter()
    }

    /// Every action from every recorder, recorder by recorder
    pub fn all(&self) -> Vec<Action> {
        self.0.iter().flat_map(|r| r.actions()).collect()
    }

    /// Group every recorded action by verb
    pub fn actions_by_verb(&self) -> Actions {
        let mut grouped = Actions::default();
        for action in self.all() {
            let bucket = match action.verb {
                Verb::Get => &mut grouped.gets,
                Verb::List => &mut grouped.lists,
                Verb::Create => &mut grouped.creates,
                Verb::Update => &mut grouped.updates,
                Verb::Patch => &mut grouped.patches,
                Verb::Delete => &mut grouped.deletes,
            };
            bucket.push(action);
        }
        grouped
    }
}

impl std::fmt::Debug for ActionRecorderList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|r| r.recorder_name()))
            .finish()
    }
}
