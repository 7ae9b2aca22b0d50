//! Conversion of typed objects into the schema-less form a dynamic client
//! sees on the wire
//!
//! Typed objects often leave apiVersion/kind implicit. A dynamic client only
//! ever sees serialized bytes with both fields set, so the conversion stamps
//! the kind resolved from the [`Scheme`] and round-trips through bytes rather
//! than converting field by field.

use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::Value;

use relay_common::Error;

use crate::object::Object;
use crate::scheme::Scheme;

/// Convert one object into its schema-less representation
///
/// The caller's object is left untouched. The first GVK registered for the
/// object's type wins; registering a single canonical kind per type keeps
/// that unambiguous.
pub fn to_unstructured(obj: &Object, scheme: &Scheme) -> Result<DynamicObject, Error> {
    let obj = obj.clone();
    let gvks = scheme.object_kinds(&obj)?;
    let gvk = gvks.first().ok_or_else(|| {
        Error::schema_resolution(obj.kind().type_name(), "scheme returned no kinds")
    })?;

    let mut value = obj
        .to_value()
        .map_err(|e| Error::encoding_for_kind(&gvk.kind, format!("unable to marshal: {e}")))?;
    stamp_type_meta(&mut value, gvk)?;

    let bytes = serde_json::to_vec(&value)
        .map_err(|e| Error::encoding_for_kind(&gvk.kind, format!("unable to marshal: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::encoding_for_kind(&gvk.kind, format!("unable to unmarshal: {e}")))
}

/// Convert a whole object set, stopping at the first failure
pub fn to_unstructured_all(objs: &[Object], scheme: &Scheme) -> Result<Vec<DynamicObject>, Error> {
    objs.iter().map(|o| to_unstructured(o, scheme)).collect()
}

/// Decode a schema-less object back into its typed variant
pub fn from_unstructured(obj: &DynamicObject, scheme: &Scheme) -> Result<Object, Error> {
    scheme.decode(obj)
}

fn stamp_type_meta(value: &mut Value, gvk: &GroupVersionKind) -> Result<(), Error> {
    let map = value.as_object_mut().ok_or_else(|| {
        Error::encoding_for_kind(&gvk.kind, "object did not serialize to a JSON map")
    })?;
    map.insert("apiVersion".to_string(), Value::String(gvk.api_version()));
    map.insert("kind".to_string(), Value::String(gvk.kind.clone()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{add_kube_to_scheme, CLIENT_SET_SCHEMES};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::TypeMeta;
    use relay_common::crd::{
        Channel, ChannelSpec, DeliverySpec, Destination, EventingStatus, SubscriberSpec,
    };
    use std::collections::BTreeMap;

    fn scheme() -> Scheme {
        Scheme::from_registrations(CLIENT_SET_SCHEMES)
    }

    fn sample_channel() -> Channel {
        let mut channel = Channel::new(
            "orders",
            ChannelSpec {
                subscribers: vec![SubscriberSpec {
                    uid: "sub-1".to_string(),
                    generation: Some(2),
                    subscriber_uri: Some("http://billing.shop.svc".to_string()),
                    reply_uri: None,
                }],
                delivery: Some(DeliverySpec {
                    dead_letter_sink: Some(Destination::uri("http://dlq.shop.svc")),
                    retry: Some(3),
                }),
            },
        );
        channel.metadata.namespace = Some("shop".to_string());
        channel.metadata.labels = Some(BTreeMap::from([("team".to_string(), "a".to_string())]));
        let mut status = EventingStatus::default();
        status.mark_ready();
        channel.status = Some(status);
        channel
    }

    #[test]
    fn stamps_registered_kind_and_preserves_fields() {
        let channel = sample_channel();
        let u = to_unstructured(&channel.clone().into(), &scheme()).unwrap();

        let types = u.types.clone().expect("type meta");
        assert_eq!(types.api_version, "eventing.relay.dev/v1alpha1");
        assert_eq!(types.kind, "Channel");
        assert_eq!(u.metadata, channel.metadata);
        assert_eq!(u.data["spec"], serde_json::to_value(&channel.spec).unwrap());
        assert_eq!(u.data["status"], serde_json::to_value(&channel.status).unwrap());
    }

    #[test]
    fn round_trip_decodes_to_equal_object() {
        let scheme = scheme();
        let channel = sample_channel();
        let u = to_unstructured(&channel.clone().into(), &scheme).unwrap();
        match from_unstructured(&u, &scheme).unwrap() {
            Object::Channel(back) => assert_eq!(back, channel),
            other => panic!("expected Channel, got {:?}", other.kind()),
        }
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let scheme = scheme();
        let once = to_unstructured(&sample_channel().into(), &scheme).unwrap();
        let twice = to_unstructured(&Object::Unstructured(once.clone()), &scheme).unwrap();
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn input_is_not_modified() {
        let obj: Object = sample_channel().into();
        let before = obj.to_value().unwrap();
        to_unstructured(&obj, &scheme()).unwrap();
        assert_eq!(obj.to_value().unwrap(), before);
    }

    #[test]
    fn unregistered_type_is_a_schema_resolution_error() {
        let scheme = Scheme::from_registrations(&[add_kube_to_scheme]);
        let err = to_unstructured(&sample_channel().into(), &scheme).unwrap_err();
        assert!(matches!(err, Error::SchemaResolution { .. }));
    }

    #[test]
    fn unstructured_with_empty_kind_is_rejected() {
        let obj = Object::Unstructured(DynamicObject {
            types: Some(TypeMeta {
                api_version: "v1".to_string(),
                kind: String::new(),
            }),
            metadata: ObjectMeta::default(),
            data: Value::Null,
        });
        assert!(matches!(
            to_unstructured(&obj, &scheme()),
            Err(Error::SchemaResolution { .. })
        ));
    }

    #[test]
    fn batch_conversion_aborts_on_first_failure() {
        let scheme = Scheme::from_registrations(&[add_kube_to_scheme]);
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("cfg".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let objs = vec![cm.into(), sample_channel().into()];
        assert!(to_unstructured_all(&objs, &scheme).is_err());
        assert_eq!(to_unstructured_all(&objs[..1], &scheme).unwrap().len(), 1);
    }
}
