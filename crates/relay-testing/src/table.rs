//! Table-driven reconciler tests
//!
//! Each [`TableRow`] seeds a fresh harness, reconciles one key and compares
//! what the reconciler did against the row's expectations. Mismatches from
//! every row are collected and reported together.

use std::fmt::Write as _;

use serde_json::Value;
use tracing::{info_span, Instrument};

use relay_common::client::PatchKind;
use relay_common::reconciler::split_key;

use crate::action::Action;
use crate::factory::Factory;
use crate::logging::init_test_logging;
use crate::object::Object;
use crate::reactor::Reactor;
use crate::unstructured::to_unstructured;

/// A delete the reconciler is expected to issue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteExpectation {
    /// Resource plural, e.g. `configmaps`
    pub resource: String,
    /// Namespace of the deleted object
    pub namespace: Option<String>,
    /// Name of the deleted object
    pub name: String,
}

/// A patch the reconciler is expected to issue
#[derive(Clone, Debug, PartialEq)]
pub struct PatchExpectation {
    /// Namespace of the patched object
    pub namespace: Option<String>,
    /// Name of the patched object
    pub name: String,
    /// Patch strategy
    pub kind: PatchKind,
    /// Patch body
    pub patch: Value,
}

/// One test case: fixture, key and expectations
#[derive(Clone, Debug, Default)]
pub struct TableRow {
    /// Case name used in failure output
    pub name: String,
    /// Initial objects
    pub objects: Vec<Object>,
    /// Key passed to the reconciler
    pub key: String,
    /// Whether reconcile should fail
    pub want_err: bool,
    /// Objects the reconciler should create, in order
    pub want_creates: Vec<Object>,
    /// Objects the reconciler should replace, in order
    pub want_updates: Vec<Object>,
    /// Objects whose status the reconciler should replace, in order
    pub want_status_updates: Vec<Object>,
    /// Deletes, in order
    pub want_deletes: Vec<DeleteExpectation>,
    /// Patches, in order
    pub want_patches: Vec<PatchExpectation>,
    /// Events, formatted `"<Type> <Reason> <note>"`
    pub want_events: Vec<String>,
    /// Reactors installed ahead of the built-in ones
    pub with_reactors: Vec<Reactor>,
    /// Allow mutations outside the key's namespace
    pub skip_namespace_validation: bool,
}

impl TableRow {
    /// Run the row and return every mismatch
    pub async fn check(&self, factory: &Factory) -> Vec<String> {
        let harness = factory.assemble(self.objects.clone(), self.with_reactors.clone());
        let result = harness
            .reconcile(&self.key)
            .instrument(info_span!("table_row", row = %self.name))
            .await;

        let mut failures = Vec::new();
        match (&result, self.want_err) {
            (Err(e), false) => failures.push(format!("unexpected reconcile error: {e}")),
            (Ok(()), true) => failures.push("expected reconcile to fail, it succeeded".to_string()),
            _ => {}
        }

        let actions = harness.actions.actions_by_verb();
        if !self.skip_namespace_validation {
            match split_key(&self.key) {
                Ok((namespace, _)) => failures.extend(namespace_mismatches(
                    namespace,
                    harness.actions.all().iter().filter(|a| a.is_mutation()),
                )),
                Err(e) => failures.push(format!("cannot check namespaces: {e}")),
            }
        }

        let creates: Vec<&Action> = actions.creates.iter().collect();
        failures.extend(compare_objects("create", &self.want_creates, &creates, factory));
        failures.extend(compare_objects(
            "update",
            &self.want_updates,
            &actions.object_updates(),
            factory,
        ));
        failures.extend(compare_objects(
            "status update",
            &self.want_status_updates,
            &actions.status_updates(),
            factory,
        ));

        let deletes: Vec<DeleteExpectation> = actions
            .deletes
            .iter()
            .map(|a| DeleteExpectation {
                resource: a.resource.plural.clone(),
                namespace: a.namespace.clone(),
                name: a.object_name().unwrap_or_default().to_string(),
            })
            .collect();
        failures.extend(compare_in_order("delete", &self.want_deletes, &deletes));

        let patches: Vec<PatchExpectation> = actions
            .patches
            .iter()
            .filter_map(|a| {
                a.patch.as_ref().map(|p| PatchExpectation {
                    namespace: a.namespace.clone(),
                    name: a.object_name().unwrap_or_default().to_string(),
                    kind: p.kind,
                    patch: p.body.clone(),
                })
            })
            .collect();
        failures.extend(compare_in_order("patch", &self.want_patches, &patches));

        failures.extend(compare_in_order(
            "event",
            &self.want_events,
            &harness.events.events(),
        ));
        failures
    }
}

fn namespace_mismatches<'a>(
    namespace: Option<&str>,
    actions: impl Iterator<Item = &'a Action>,
) -> Vec<String> {
    actions
        .filter(|a| a.namespace.as_deref() != namespace)
        .map(|a| {
            format!(
                "{} {} {:?} in namespace {:?}, expected {:?}",
                a.verb,
                a.resource.plural,
                a.object_name().unwrap_or_default(),
                a.namespace,
                namespace
            )
        })
        .collect()
}

fn compare_objects(
    label: &str,
    want: &[Object],
    got: &[&Action],
    factory: &Factory,
) -> Vec<String> {
    let mut failures = Vec::new();
    for i in 0..want.len().max(got.len()) {
        match (want.get(i), got.get(i)) {
            (Some(w), Some(g)) => {
                let want_value = match to_unstructured(w, factory.scheme())
                    .and_then(|u| serde_json::to_value(u).map_err(Into::into))
                {
                    Ok(v) => v,
                    Err(e) => {
                        failures.push(format!("{label}[{i}]: cannot normalize wanted object: {e}"));
                        continue;
                    }
                };
                let got_value = g
                    .object
                    .as_ref()
                    .and_then(|o| serde_json::to_value(o).ok())
                    .unwrap_or(Value::Null);
                if want_value != got_value {
                    failures.push(format!(
                        "{label}[{i}] differs\n    want: {want_value}\n    got:  {got_value}"
                    ));
                }
            }
            (Some(w), None) => {
                failures.push(format!("missing {label}[{i}]: {:?} {:?}", w.kind(), w.name()));
            }
            (None, Some(g)) => failures.push(format!(
                "unexpected {label}[{i}]: {} {:?}",
                g.resource.plural,
                g.object_name().unwrap_or_default()
            )),
            (None, None) => {}
        }
    }
    failures
}

fn compare_in_order<T: PartialEq + std::fmt::Debug>(
    label: &str,
    want: &[T],
    got: &[T],
) -> Vec<String> {
    let mut failures = Vec::new();
    for i in 0..want.len().max(got.len()) {
        match (want.get(i), got.get(i)) {
            (Some(w), Some(g)) if w != g => {
                failures.push(format!("{label}[{i}] differs\n    want: {w:?}\n    got:  {g:?}"))
            }
            (Some(w), None) => failures.push(format!("missing {label}[{i}]: {w:?}")),
            (None, Some(g)) => failures.push(format!("unexpected {label}[{i}]: {g:?}")),
            _ => {}
        }
    }
    failures
}

/// A list of rows run against one factory
#[derive(Clone, Debug, Default)]
pub struct Table(pub Vec<TableRow>);

impl Table {
    /// Run every row, panicking once with all failures grouped by row
    pub async fn run(&self, factory: &Factory) {
        init_test_logging();
        let mut report = String::new();
        for row in &self.0 {
            let failures = row.check(factory).await;
            if failures.is_empty() {
                continue;
            }
            let _ = writeln!(report, "row {:?}:", row.name);
            for failure in failures {
                let _ = writeln!(report, "  {failure}");
            }
        }
        if !report.is_empty() {
            panic!("table test failed\n{report}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Verb};
    use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
    use rstest::rstest;

    fn config_maps() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"))
    }

    #[rstest]
    #[case::equal(vec![1, 2], vec![1, 2], 0)]
    #[case::missing(vec![1, 2], vec![1], 1)]
    #[case::unexpected(vec![1], vec![1, 3], 1)]
    #[case::reordered(vec![1, 2], vec![2, 1], 2)]
    fn in_order_comparison_counts_mismatches(
        #[case] want: Vec<i32>,
        #[case] got: Vec<i32>,
        #[case] expected: usize,
    ) {
        assert_eq!(compare_in_order("n", &want, &got).len(), expected);
    }

    #[test]
    fn namespace_check_flags_foreign_writes() {
        let obj = DynamicObject::new("cfg", &config_maps()).within("other");
        let actions = vec![
            Action::create(&config_maps(), Some("shop"), &obj),
            Action::delete(&config_maps(), Some("other"), "cfg"),
        ];
        let failures = namespace_mismatches(Some("shop"), actions.iter());
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with(Verb::Delete.as_str()));
    }
}
