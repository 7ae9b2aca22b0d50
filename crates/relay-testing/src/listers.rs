//! Read-only fixture over a test case's initial objects

use crate::object::{Domain, Object, ObjectVariant};

/// Initial object set, partitioned by the client that serves each object
#[derive(Clone, Debug, Default)]
pub struct Listers {
    objects: Vec<Object>,
}

impl Listers {
    /// Wrap an object set, keeping the given order
    pub fn new(objects: Vec<Object>) -> Self {
        Self { objects }
    }

    /// Core Kubernetes objects
    pub fn kube_objects(&self) -> Vec<Object> {
        self.in_domain(Domain::Kube)
    }

    /// relay eventing objects
    pub fn eventing_objects(&self) -> Vec<Object> {
        self.in_domain(Domain::Eventing)
    }

    /// Every object, in the order given
    pub fn all_objects(&self) -> Vec<Object> {
        self.objects.clone()
    }

    fn in_domain(&self, domain: Domain) -> Vec<Object> {
        self.objects
            .iter()
            .filter(|o| o.domain() == domain)
            .cloned()
            .collect()
    }

    /// Typed lookup by namespace and name
    pub fn get<K: ObjectVariant>(&self, namespace: Option<&str>, name: &str) -> Option<&K> {
        self.objects
            .iter()
            .filter(|o| o.namespace() == namespace && o.name() == name)
            .find_map(K::from_object)
    }

    /// Typed listing, across namespaces when `namespace` is None
    pub fn list<K: ObjectVariant>(&self, namespace: Option<&str>) -> Vec<&K> {
        self.objects
            .iter()
            .filter(|o| namespace.map_or(true, |ns| o.namespace() == Some(ns)))
            .filter_map(K::from_object)
            .collect()
    }
}
