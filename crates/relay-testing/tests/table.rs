//! Table-driven runs of the sample reconcilers

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::ApiResource;
use rstest::rstest;
use serde_json::json;

use relay_common::client::{PatchKind, ResourceClient, ResourceClientExt};
use relay_common::crd::Channel;
use relay_common::reconciler::{split_key, Options, Reconciler};
use relay_common::Error;
use relay_testing::reactor::induce_failure;
use relay_testing::{DeleteExpectation, Factory, Listers, PatchExpectation, Table, TableRow};

use common::*;

fn reconciled_event(name: &str) -> String {
    format!("Normal ChannelReconciled Channel reconciled: {name:?}")
}

fn channel_rows() -> Vec<TableRow> {
    vec![
        TableRow {
            name: "channel gone".to_string(),
            key: "shop/missing".to_string(),
            ..Default::default()
        },
        TableRow {
            name: "creates dispatcher config and marks ready".to_string(),
            objects: vec![channel("orders").into()],
            key: "shop/orders".to_string(),
            want_creates: vec![dispatcher_config(&channel("orders")).into()],
            want_status_updates: vec![ready_channel("orders").into()],
            want_events: vec![reconciled_event("orders")],
            ..Default::default()
        },
        TableRow {
            name: "existing config only updates status".to_string(),
            objects: vec![
                channel("orders").into(),
                dispatcher_config(&channel("orders")).into(),
            ],
            key: "shop/orders".to_string(),
            want_status_updates: vec![ready_channel("orders").into()],
            want_events: vec![reconciled_event("orders")],
            ..Default::default()
        },
        TableRow {
            name: "ready channel is left alone".to_string(),
            objects: vec![
                ready_channel("orders").into(),
                dispatcher_config(&channel("orders")).into(),
            ],
            key: "shop/orders".to_string(),
            want_events: vec![reconciled_event("orders")],
            ..Default::default()
        },
        TableRow {
            name: "config create fails".to_string(),
            objects: vec![channel("orders").into()],
            key: "shop/orders".to_string(),
            with_reactors: vec![induce_failure("create", "configmaps")],
            want_err: true,
            want_creates: vec![dispatcher_config(&channel("orders")).into()],
            want_events: vec![
                "Warning ChannelReconcileFailed failed to create dispatcher config".to_string(),
            ],
            ..Default::default()
        },
        TableRow {
            name: "status update rejected".to_string(),
            objects: vec![channel("orders").into()],
            key: "shop/orders".to_string(),
            with_reactors: vec![induce_failure("update", "channels")],
            want_err: true,
            want_creates: vec![dispatcher_config(&channel("orders")).into()],
            want_status_updates: vec![ready_channel("orders").into()],
            want_events: vec![
                "Warning UpdateFailed failed to update channel status".to_string(),
            ],
            ..Default::default()
        },
        TableRow {
            name: "malformed key".to_string(),
            key: "shop/orders/extra".to_string(),
            want_err: true,
            skip_namespace_validation: true,
            ..Default::default()
        },
    ]
}

#[rstest]
#[case::typed(false)]
#[case::unstructured(true)]
#[tokio::test]
async fn channel_reconciler(#[case] unstructured: bool) {
    Table(channel_rows())
        .run(&Factory::new(ChannelReconciler::new, unstructured))
        .await;
}

#[tokio::test]
#[should_panic(expected = "row \"wrong expectations\"")]
async fn mismatches_fail_the_table() {
    Table(vec![TableRow {
        name: "wrong expectations".to_string(),
        objects: vec![channel("orders").into()],
        key: "shop/orders".to_string(),
        want_events: vec!["Normal SomethingElse".to_string()],
        ..Default::default()
    }])
    .run(&Factory::new(ChannelReconciler::new, false))
    .await;
}

#[tokio::test]
async fn check_reports_each_mismatch() {
    let row = TableRow {
        name: "missing everything".to_string(),
        objects: vec![channel("orders").into()],
        key: "shop/orders".to_string(),
        ..Default::default()
    };
    let failures = row
        .check(&Factory::new(ChannelReconciler::new, false))
        .await;
    assert_eq!(failures.len(), 3, "{failures:#?}");
    assert!(failures[0].starts_with("unexpected create[0]"));
    assert!(failures[1].starts_with("unexpected status update[0]"));
    assert!(failures[2].starts_with("unexpected event[0]"));
}

/// Deletes a Channel's dispatcher config and labels the Channel as retired
struct Retirer {
    opts: Options,
}

impl Retirer {
    fn new(_: &Listers, opts: Options) -> Arc<dyn Reconciler> {
        Arc::new(Self { opts })
    }
}

#[async_trait]
impl Reconciler for Retirer {
    async fn reconcile(&self, key: &str) -> Result<(), Error> {
        let (namespace, name) = split_key(key)?;
        self.opts
            .kube_client
            .delete_typed::<ConfigMap>(namespace, &format!("{name}-dispatcher"))
            .await?;
        self.opts
            .eventing_client
            .patch(
                &ApiResource::erase::<Channel>(&()),
                namespace,
                name,
                PatchKind::Merge,
                &json!({"metadata": {"labels": {"retired": "true"}}}),
            )
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn deletes_and_patches() {
    Table(vec![
        TableRow {
            name: "retires channel".to_string(),
            objects: vec![
                channel("orders").into(),
                dispatcher_config(&channel("orders")).into(),
            ],
            key: "shop/orders".to_string(),
            want_deletes: vec![DeleteExpectation {
                resource: "configmaps".to_string(),
                namespace: Some(NAMESPACE.to_string()),
                name: "orders-dispatcher".to_string(),
            }],
            want_patches: vec![PatchExpectation {
                namespace: Some(NAMESPACE.to_string()),
                name: "orders".to_string(),
                kind: PatchKind::Merge,
                patch: json!({"metadata": {"labels": {"retired": "true"}}}),
            }],
            ..Default::default()
        },
        TableRow {
            name: "missing config is a 404".to_string(),
            objects: vec![channel("orders").into()],
            key: "shop/orders".to_string(),
            want_err: true,
            want_deletes: vec![DeleteExpectation {
                resource: "configmaps".to_string(),
                namespace: Some(NAMESPACE.to_string()),
                name: "orders-dispatcher".to_string(),
            }],
            ..Default::default()
        },
    ])
    .run(&Factory::new(Retirer::new, true))
    .await;
}
