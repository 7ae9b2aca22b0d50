//! Registry mapping object variants to their group/version/kind
//!
//! A [`Scheme`] is built once from a list of registration functions and is
//! read-only afterwards. Every registration records the GVK, the exact
//! `ApiResource` (so plurals never rely on guessing), and a codec that turns a
//! schema-less object back into its typed variant.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use serde_json::Value;
use tracing::debug;

use relay_common::crd::{Broker, Channel, Subscription, Trigger};
use relay_common::Error;

use crate::object::{decode_as, Object, ObjectKind, ObjectVariant};

/// A registration function contributing kinds to a scheme
pub type AddToScheme = fn(&mut Scheme);

type DecodeFn = fn(Value) -> serde_json::Result<Object>;

/// Every registration function the fake client set knows about
pub const CLIENT_SET_SCHEMES: &[AddToScheme] = &[add_kube_to_scheme, add_eventing_to_scheme];

struct SchemeEntry {
    kind: ObjectKind,
    gvk: GroupVersionKind,
    resource: ApiResource,
    decode: DecodeFn,
}

/// Immutable type registry used for kind resolution and decoding
#[derive(Default)]
pub struct Scheme {
    entries: Vec<SchemeEntry>,
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.kind, &e.gvk)))
            .finish()
    }
}

impl Scheme {
    /// Create an empty scheme
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scheme by running each registration function in order
    pub fn from_registrations(registrations: &[AddToScheme]) -> Self {
        let mut scheme = Self::new();
        for add in registrations {
            add(&mut scheme);
        }
        debug!(kinds = scheme.entries.len(), "built scheme");
        scheme
    }

    /// Scheme covering every kind the fake clients serve
    pub fn for_client_set() -> Self {
        Self::from_registrations(CLIENT_SET_SCHEMES)
    }

    /// Register `K` under its own group/version/kind
    pub fn register<K: ObjectVariant>(&mut self) {
        let resource = ApiResource::erase::<K>(&());
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        self.push(K::KIND, gvk, resource, decode_as::<K>);
    }

    /// Register `K` under an additional group/version/kind
    ///
    /// Resolution picks the first registration, so aliases registered after
    /// the canonical entry never change what the normalizer stamps.
    pub fn register_as<K: ObjectVariant>(&mut self, gvk: GroupVersionKind) {
        let mut resource = ApiResource::erase::<K>(&());
        resource.group = gvk.group.clone();
        resource.version = gvk.version.clone();
        resource.api_version = gvk.api_version();
        resource.kind = gvk.kind.clone();
        self.push(K::KIND, gvk, resource, decode_as::<K>);
    }

    fn push(
        &mut self,
        kind: ObjectKind,
        gvk: GroupVersionKind,
        resource: ApiResource,
        decode: DecodeFn,
    ) {
        if self.entries.iter().any(|e| e.kind == kind && e.gvk == gvk) {
            return;
        }
        self.entries.push(SchemeEntry {
            kind,
            gvk,
            resource,
            decode,
        });
    }

    /// Number of registered (kind, gvk) pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every GVK registered for the object's concrete type, in registration
    /// order
    ///
    /// Schema-less objects resolve to the kind they already carry.
    pub fn object_kinds(&self, obj: &Object) -> Result<Vec<GroupVersionKind>, Error> {
        if let Object::Unstructured(u) = obj {
            let types = u.types.as_ref().ok_or_else(|| {
                Error::schema_resolution(
                    ObjectKind::Unstructured.type_name(),
                    format!("object {:?} has no apiVersion/kind", obj.name()),
                )
            })?;
            return gvk_from_type_meta(types).map(|gvk| vec![gvk]);
        }

        let kinds: Vec<GroupVersionKind> = self
            .entries
            .iter()
            .filter(|e| e.kind == obj.kind())
            .map(|e| e.gvk.clone())
            .collect();
        if kinds.is_empty() {
            return Err(Error::schema_resolution(
                obj.kind().type_name(),
                "type is not registered in scheme",
            ));
        }
        Ok(kinds)
    }

    /// API resource for a GVK
    ///
    /// Unregistered GVKs get a resource with a guessed plural, the same way a
    /// dynamic client addresses kinds it has no discovery data for.
    pub fn resource_for(&self, gvk: &GroupVersionKind) -> ApiResource {
        self.entries
            .iter()
            .find(|e| &e.gvk == gvk)
            .map(|e| e.resource.clone())
            .unwrap_or_else(|| ApiResource::from_gvk(gvk))
    }

    /// API resource for a schema-less object, from its own type metadata
    pub fn resource_for_object(&self, obj: &DynamicObject) -> Result<ApiResource, Error> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        let types = obj.types.as_ref().ok_or_else(|| {
            Error::schema_resolution(
                ObjectKind::Unstructured.type_name(),
                format!("object {name:?} has no apiVersion/kind"),
            )
        })?;
        Ok(self.resource_for(&gvk_from_type_meta(types)?))
    }

    /// Decode a schema-less object into its typed variant
    ///
    /// Objects whose GVK is not registered come back as
    /// [`Object::Unstructured`].
    pub fn decode(&self, obj: &DynamicObject) -> Result<Object, Error> {
        let Some(types) = obj.types.as_ref() else {
            return Ok(Object::Unstructured(obj.clone()));
        };
        let gvk = gvk_from_type_meta(types)?;
        let Some(entry) = self.entries.iter().find(|e| e.gvk == gvk) else {
            return Ok(Object::Unstructured(obj.clone()));
        };
        let value = serde_json::to_value(obj)
            .map_err(|e| Error::encoding_for_kind(&gvk.kind, e.to_string()))?;
        (entry.decode)(value).map_err(|e| Error::encoding_for_kind(&gvk.kind, e.to_string()))
    }
}

/// Split an apiVersion into group and version
///
/// Core resources have no group: `"v1"` yields `("", "v1")`.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// GVK from type metadata, rejecting empty kinds and versions
pub fn gvk_from_type_meta(types: &TypeMeta) -> Result<GroupVersionKind, Error> {
    if types.kind.is_empty() || types.api_version.is_empty() {
        return Err(Error::schema_resolution(
            ObjectKind::Unstructured.type_name(),
            format!(
                "incomplete type metadata: apiVersion={:?} kind={:?}",
                types.api_version, types.kind
            ),
        ));
    }
    let (group, version) = parse_api_version(&types.api_version);
    Ok(GroupVersionKind::gvk(&group, &version, &types.kind))
}

/// Register the core Kubernetes types
pub fn add_kube_to_scheme(scheme: &mut Scheme) {
    scheme.register::<Namespace>();
    scheme.register::<ConfigMap>();
    scheme.register::<Secret>();
    scheme.register::<Service>();
    scheme.register::<ServiceAccount>();
    scheme.register::<Deployment>();
}

/// Register the relay eventing CRDs
pub fn add_eventing_to_scheme(scheme: &mut Scheme) {
    scheme.register::<Broker>();
    scheme.register::<Trigger>();
    scheme.register::<Channel>();
    scheme.register::<Subscription>();
}
