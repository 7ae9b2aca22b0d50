//! Tagged union over every resource type the harness can seed
//!
//! Each variant has a stable [`ObjectKind`] tag the [`Scheme`](crate::scheme::Scheme)
//! keys its registrations on, and a [`Domain`] deciding which fake client is
//! seeded with it.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use relay_common::crd::{Broker, Channel, Subscription, Trigger, Validate};
use relay_common::Error;

/// Which simulated client an object belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    /// Core Kubernetes resources
    Kube,
    /// relay eventing resources
    Eventing,
    /// Only reachable through the schema-less client
    Dynamic,
}

/// A concrete type that is one variant of [`Object`]
pub trait ObjectVariant:
    Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Into<Object>
{
    /// Tag of the variant holding this type
    const KIND: ObjectKind;

    /// Borrow the typed value if `obj` holds this type
    fn from_object(obj: &Object) -> Option<&Self>;
}

/// Decode a JSON value into the [`Object`] variant for `K`
pub(crate) fn decode_as<K: ObjectVariant>(value: Value) -> serde_json::Result<Object> {
    serde_json::from_value::<K>(value).map(Into::into)
}

macro_rules! objects {
    ($($variant:ident($ty:ty) => $domain:ident),* $(,)?) => {
        /// A resource instance handed to the harness
        #[derive(Clone, Debug)]
        pub enum Object {
            $(
                #[doc = concat!("A `", stringify!($variant), "`")]
                $variant($ty),
            )*
            /// An object already in schema-less form
            Unstructured(DynamicObject),
        }

        /// Variant tag of an [`Object`]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ObjectKind {
            $(
                #[doc = concat!("Tag for `", stringify!($variant), "`")]
                $variant,
            )*
            /// Tag for schema-less objects
            Unstructured,
        }

        impl ObjectKind {
            /// Name of the concrete type behind this tag
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                    Self::Unstructured => "Unstructured",
                }
            }
        }

        impl Object {
            /// Variant tag
            pub fn kind(&self) -> ObjectKind {
                match self {
                    $(Self::$variant(_) => ObjectKind::$variant,)*
                    Self::Unstructured(_) => ObjectKind::Unstructured,
                }
            }

            /// Client this object is seeded into
            pub fn domain(&self) -> Domain {
                match self {
                    $(Self::$variant(_) => Domain::$domain,)*
                    Self::Unstructured(_) => Domain::Dynamic,
                }
            }

            /// Object metadata
            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Self::$variant(o) => o.meta(),)*
                    Self::Unstructured(o) => &o.metadata,
                }
            }

            /// Serialize the wrapped value
            pub fn to_value(&self) -> serde_json::Result<Value> {
                match self {
                    $(Self::$variant(o) => serde_json::to_value(o),)*
                    Self::Unstructured(o) => serde_json::to_value(o),
                }
            }
        }

        $(
            impl From<$ty> for Object {
                fn from(obj: $ty) -> Self {
                    Self::$variant(obj)
                }
            }

            impl ObjectVariant for $ty {
                const KIND: ObjectKind = ObjectKind::$variant;

                fn from_object(obj: &Object) -> Option<&Self> {
                    match obj {
                        Object::$variant(o) => Some(o),
                        _ => None,
                    }
                }
            }
        )*
    };
}

objects! {
    Namespace(Namespace) => Kube,
    ConfigMap(ConfigMap) => Kube,
    Secret(Secret) => Kube,
    Service(Service) => Kube,
    ServiceAccount(ServiceAccount) => Kube,
    Deployment(Deployment) => Kube,
    Broker(Broker) => Eventing,
    Trigger(Trigger) => Eventing,
    Channel(Channel) => Eventing,
    Subscription(Subscription) => Eventing,
}

impl From<DynamicObject> for Object {
    fn from(obj: DynamicObject) -> Self {
        Self::Unstructured(obj)
    }
}

impl Object {
    /// Object name, empty when only `generateName` is set
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Object namespace
    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    /// Run the resource's own spec validation; types without rules pass
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Broker(o) => o.validate(),
            Self::Trigger(o) => o.validate(),
            Self::Channel(o) => o.validate(),
            Self::Subscription(o) => o.validate(),
            _ => Ok(()),
        }
    }

    /// Convert straight to schema-less form with whatever type metadata
    /// serialization produces, without consulting a scheme
    pub fn to_dynamic(&self) -> Result<DynamicObject, Error> {
        if let Self::Unstructured(o) = self {
            return Ok(o.clone());
        }
        let value = self
            .to_value()
            .map_err(|e| Error::encoding_for_kind(self.kind().type_name(), e.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| Error::encoding_for_kind(self.kind().type_name(), e.to_string()))
    }
}
