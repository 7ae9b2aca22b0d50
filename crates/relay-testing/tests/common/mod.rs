//! Sample reconcilers and fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::ResourceExt;

use relay_common::client::ResourceClientExt;
use relay_common::crd::{
    Addressable, Channel, ChannelSpec, Destination, EventingStatus, Trigger, TriggerSpec,
};
use relay_common::events::{actions, object_ref, reasons};
use relay_common::reconciler::{split_key, Options, Reconciler};
use relay_common::{Error, EVENTING_GROUP};
use relay_testing::Listers;

pub const NAMESPACE: &str = "shop";

pub fn channel(name: &str) -> Channel {
    let mut channel = Channel::new(name, ChannelSpec::default());
    channel.metadata.namespace = Some(NAMESPACE.to_string());
    channel
}

pub fn ready_channel(name: &str) -> Channel {
    let mut channel = channel(name);
    channel.status = Some(ready_status(&channel));
    channel
}

pub fn ready_status(channel: &Channel) -> EventingStatus {
    let mut status = channel.status.clone().unwrap_or_default();
    status.observed_generation = channel.metadata.generation;
    status.address = Some(Addressable {
        url: format!(
            "http://{}-channel.{}.svc.cluster.local",
            channel.name_any(),
            channel.namespace().unwrap_or_default()
        ),
    });
    status.mark_ready();
    status
}

pub fn dispatcher_config(channel: &Channel) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(format!("{}-dispatcher", channel.name_any())),
            namespace: channel.namespace(),
            labels: Some(BTreeMap::from([(
                format!("{EVENTING_GROUP}/channel"),
                channel.name_any(),
            )])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "subscribers".to_string(),
            channel.spec.subscribers.len().to_string(),
        )])),
        ..Default::default()
    }
}

pub fn config_map(name: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn trigger(name: &str) -> Trigger {
    let mut trigger = Trigger::new(
        name,
        TriggerSpec {
            broker: "default".to_string(),
            filter: None,
            subscriber: Destination::uri("http://billing.shop.svc"),
        },
    );
    trigger.metadata.namespace = Some(NAMESPACE.to_string());
    trigger
}

pub fn generated_trigger(prefix: &str) -> Trigger {
    let mut trigger = trigger("");
    trigger.metadata.name = None;
    trigger.metadata.generate_name = Some(prefix.to_string());
    trigger
}

/// Keeps a dispatcher ConfigMap per Channel and marks the Channel Ready
pub struct ChannelReconciler {
    listers: Listers,
    opts: Options,
}

impl ChannelReconciler {
    pub fn new(listers: &Listers, opts: Options) -> Arc<dyn Reconciler> {
        Arc::new(Self {
            listers: listers.clone(),
            opts,
        })
    }
}

#[async_trait]
impl Reconciler for ChannelReconciler {
    async fn reconcile(&self, key: &str) -> Result<(), Error> {
        let (namespace, name) = split_key(key)?;
        let Some(channel) = self.listers.get::<Channel>(namespace, name).cloned() else {
            tracing::debug!(key, "channel no longer exists");
            return Ok(());
        };

        let config = dispatcher_config(&channel);
        let config_name = config.name_any();
        match self
            .opts
            .kube_client
            .get_typed::<ConfigMap>(namespace, &config_name)
            .await
        {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                if let Err(e) = self.opts.kube_client.create_typed(&config).await {
                    self.opts
                        .recorder
                        .publish(
                            &object_ref(&channel),
                            EventType::Warning,
                            reasons::CHANNEL_RECONCILE_FAILED,
                            actions::CREATE,
                            Some("failed to create dispatcher config".to_string()),
                        )
                        .await;
                    return Err(e.into());
                }
            }
            Err(e) => return Err(e.into()),
        }

        let status = ready_status(&channel);
        if channel.status.as_ref() != Some(&status) {
            let mut updated = channel.clone();
            updated.status = Some(status);
            if let Err(e) = self.opts.eventing_client.update_status_typed(&updated).await {
                self.opts
                    .recorder
                    .publish(
                        &object_ref(&channel),
                        EventType::Warning,
                        reasons::UPDATE_FAILED,
                        actions::UPDATE_STATUS,
                        Some("failed to update channel status".to_string()),
                    )
                    .await;
                return Err(e.into());
            }
        }

        self.opts
            .recorder
            .publish(
                &object_ref(&channel),
                EventType::Normal,
                reasons::CHANNEL_RECONCILED,
                actions::RECONCILE,
                Some(format!("Channel reconciled: {name:?}")),
            )
            .await;
        Ok(())
    }
}

/// Reads a Channel through the client and writes it back Ready, emitting
/// nothing
pub struct SilentReadyMarker {
    opts: Options,
}

impl SilentReadyMarker {
    pub fn new(_: &Listers, opts: Options) -> Arc<dyn Reconciler> {
        Arc::new(Self { opts })
    }
}

#[async_trait]
impl Reconciler for SilentReadyMarker {
    async fn reconcile(&self, key: &str) -> Result<(), Error> {
        let (namespace, name) = split_key(key)?;
        let mut channel: Channel = self.opts.eventing_client.get_typed(namespace, name).await?;
        let mut status = channel.status.clone().unwrap_or_default();
        status.mark_ready();
        channel.status = Some(status);
        self.opts.eventing_client.update_typed(&channel).await?;
        Ok(())
    }
}

/// Emits `count` Normal events against the keyed Channel
pub struct EventEmitter {
    opts: Options,
    count: usize,
}

impl EventEmitter {
    pub fn ctor(count: usize) -> impl Fn(&Listers, Options) -> Arc<dyn Reconciler> {
        move |_, opts| Arc::new(Self { opts, count }) as Arc<dyn Reconciler>
    }
}

#[async_trait]
impl Reconciler for EventEmitter {
    async fn reconcile(&self, key: &str) -> Result<(), Error> {
        let (_, name) = split_key(key)?;
        let target = object_ref(&channel(name));
        for i in 0..self.count {
            self.opts
                .recorder
                .publish(
                    &target,
                    EventType::Normal,
                    "Tick",
                    actions::RECONCILE,
                    Some(i.to_string()),
                )
                .await;
        }
        Ok(())
    }
}

/// What a [`Writer`] call returned: the stored name, or the API status code
pub type Outcome = Result<String, u16>;

/// Shared log of [`Writer`] outcomes, labelled by what was written
pub type Outcomes = Arc<Mutex<Vec<(&'static str, Outcome)>>>;

fn outcome<K: kube::Resource>(result: Result<K, kube::Error>) -> Outcome {
    match result {
        Ok(obj) => Ok(obj.meta().name.clone().unwrap_or_default()),
        Err(kube::Error::Api(ae)) => Err(ae.code),
        Err(e) => panic!("unexpected client error: {e}"),
    }
}

/// Performs a fixed list of writes and records each outcome without failing
#[derive(Clone, Default)]
pub struct Writer {
    pub triggers: Vec<Trigger>,
    pub channel_updates: Vec<Channel>,
    pub config_maps: Vec<ConfigMap>,
    pub outcomes: Outcomes,
}

impl Writer {
    pub fn ctor(self) -> impl Fn(&Listers, Options) -> Arc<dyn Reconciler> {
        move |_, opts| {
            Arc::new(WriterReconciler {
                writer: self.clone(),
                opts,
            }) as Arc<dyn Reconciler>
        }
    }

    pub fn outcomes(&self) -> Vec<(&'static str, Outcome)> {
        self.outcomes
            .lock()
            .expect("mutex should not be poisoned")
            .clone()
    }
}

struct WriterReconciler {
    writer: Writer,
    opts: Options,
}

impl WriterReconciler {
    fn push(&self, label: &'static str, outcome: Outcome) {
        self.writer
            .outcomes
            .lock()
            .expect("mutex should not be poisoned")
            .push((label, outcome));
    }
}

#[async_trait]
impl Reconciler for WriterReconciler {
    async fn reconcile(&self, _key: &str) -> Result<(), Error> {
        for t in &self.writer.triggers {
            let result = self.opts.eventing_client.create_typed(t).await;
            self.push("trigger", outcome(result));
        }
        for c in &self.writer.channel_updates {
            let result = self.opts.eventing_client.update_typed(c).await;
            self.push("channel", outcome(result));
        }
        for cm in &self.writer.config_maps {
            let result = self.opts.kube_client.create_typed(cm).await;
            self.push("configmap", outcome(result));
        }
        Ok(())
    }
}
