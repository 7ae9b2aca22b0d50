//! Client seam reconcilers use to talk to the API server
//!
//! Every call goes through [`ResourceClient`], which works on
//! `DynamicObject`s addressed by an `ApiResource`. Typed access is layered on
//! top by [`ResourceClientExt`], so the same reconciler runs against a real
//! cluster client or an in-memory fake.

use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

/// Patch strategy accepted by [`ResourceClient::patch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchKind {
    /// RFC 7386 JSON merge patch
    Merge,
    /// RFC 6902 JSON patch (list of operations)
    Json,
}

impl std::fmt::Display for PatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Trait abstracting Kubernetes API operations
///
/// Errors are the `kube::Error`s a real API server would produce, so
/// reconcilers can match on `kube::Error::Api(ae) if ae.code == 404` the same
/// way in tests and in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Get a single object
    async fn get<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
    ) -> Result<DynamicObject, kube::Error>;

    /// List objects, across all namespaces when `namespace` is None
    async fn list<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
    ) -> Result<Vec<DynamicObject>, kube::Error>;

    /// Create an object
    async fn create<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error>;

    /// Replace an object
    async fn update<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error>;

    /// Replace the status subresource of an object
    async fn update_status<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, kube::Error>;

    /// Patch an object
    async fn patch<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
        kind: PatchKind,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, kube::Error>;

    /// Delete an object
    async fn delete<'a>(
        &self,
        resource: &ApiResource,
        namespace: Option<&'a str>,
        name: &str,
    ) -> Result<(), kube::Error>;
}

/// Convert a typed resource into its dynamic form
pub fn to_dynamic<K: Serialize>(obj: &K) -> Result<DynamicObject, kube::Error> {
    let value = serde_json::to_value(obj).map_err(kube::Error::SerdeError)?;
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

/// Convert a dynamic object back into a typed resource
pub fn from_dynamic<K: DeserializeOwned>(obj: DynamicObject) -> Result<K, kube::Error> {
    let value = serde_json::to_value(obj).map_err(kube::Error::SerdeError)?;
    serde_json::from_value(value).map_err(kube::Error::SerdeError)
}

/// Typed helpers over any [`ResourceClient`]
///
/// The `ApiResource` is derived from `K` and the namespace from the object's
/// own metadata, mirroring `kube::Api<K>`.
#[async_trait]
pub trait ResourceClientExt: ResourceClient {
    /// Get a typed object
    async fn get_typed<K>(&self, namespace: Option<&str>, name: &str) -> Result<K, kube::Error>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send,
    {
        let ar = ApiResource::erase::<K>(&());
        from_dynamic(self.get(&ar, namespace, name).await?)
    }

    /// List typed objects
    async fn list_typed<K>(&self, namespace: Option<&str>) -> Result<Vec<K>, kube::Error>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Send,
    {
        let ar = ApiResource::erase::<K>(&());
        self.list(&ar, namespace)
            .await?
            .into_iter()
            .map(from_dynamic)
            .collect()
    }

    /// Create a typed object in its own namespace
    async fn create_typed<K>(&self, obj: &K) -> Result<K, kube::Error>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync,
    {
        let ar = ApiResource::erase::<K>(&());
        let dynamic = to_dynamic(obj)?;
        from_dynamic(self.create(&ar, obj.meta().namespace.as_deref(), &dynamic).await?)
    }

    /// Replace a typed object
    async fn update_typed<K>(&self, obj: &K) -> Result<K, kube::Error>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync,
    {
        let ar = ApiResource::erase::<K>(&());
        let dynamic = to_dynamic(obj)?;
        from_dynamic(self.update(&ar, obj.meta().namespace.as_deref(), &dynamic).await?)
    }

    /// Replace the status of a typed object
    async fn update_status_typed<K>(&self, obj: &K) -> Result<K, kube::Error>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync,
    {
        let ar = ApiResource::erase::<K>(&());
        let dynamic = to_dynamic(obj)?;
        from_dynamic(
            self.update_status(&ar, obj.meta().namespace.as_deref(), &dynamic)
                .await?,
        )
    }

    /// Delete a typed object by name
    async fn delete_typed<K>(&self, namespace: Option<&str>, name: &str) -> Result<(), kube::Error>
    where
        K: Resource<DynamicType = ()>,
    {
        let ar = ApiResource::erase::<K>(&());
        self.delete(&ar, namespace, name).await
    }
}

impl<T: ResourceClient + ?Sized> ResourceClientExt for T {}
