//! Harness assembly: seeded fake clients, reactor chains and recorders wired
//! around one freshly constructed reconciler
//!
//! Use [`Factory::builder`] to configure a factory once per test module, then
//! call [`Factory::assemble`] per test case:
//!
//! ```text
//! let factory = Factory::builder(ChannelReconciler::new)
//!     .unstructured(true)
//!     .build();
//! let harness = factory.assemble(objects, vec![]);
//! harness.reconcile("shop/orders").await?;
//! ```

use std::sync::Arc;

use kube::core::{ApiResource, DynamicObject};
use tracing::{info_span, Instrument};

use relay_common::reconciler::{Options, Reconciler};
use relay_common::Error;

use crate::action::{Action, ActionRecorder, ActionRecorderList, Verb};
use crate::fake::FakeClient;
use crate::listers::Listers;
use crate::object::Object;
use crate::reactor::{
    generate_name_reactor, validate_creates, validate_updates, validation_reactor, Reaction,
    Reactor, ValidateFunc, ValidationContext,
};
use crate::recorder::{event_channel, EventList, MAX_EVENT_BUFFER_SIZE};
use crate::scheme::{AddToScheme, Scheme, CLIENT_SET_SCHEMES};
use crate::stats::FakeStatsReporter;
use crate::unstructured::to_unstructured;

/// Builds the reconciler under test from the fixture and its dependencies
pub type Ctor = Arc<dyn Fn(&Listers, Options) -> Arc<dyn Reconciler> + Send + Sync>;

/// The three simulated clients of one harness
#[derive(Clone, Debug)]
pub struct FakeClients {
    /// Core Kubernetes resources
    pub kube: Arc<FakeClient>,
    /// relay eventing resources
    pub eventing: Arc<FakeClient>,
    /// Every object, schema-less
    pub dynamic: Arc<FakeClient>,
}

/// A reconciler wired to fake clients, plus handles to everything it records
pub struct Harness {
    /// Reconciler under test
    pub reconciler: Arc<dyn Reconciler>,
    /// Action logs in the order dynamic, eventing, kube
    pub actions: ActionRecorderList,
    /// Events the reconciler emitted
    pub events: EventList,
    /// Stats capture point; not handed to the reconciler
    pub stats: FakeStatsReporter,
    /// Direct access to the fake clients
    pub clients: FakeClients,
    /// Fixture the reconciler was constructed with
    pub listers: Listers,
    span: tracing::Span,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("actions", &self.actions)
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Run one reconciliation of `key` inside the harness span
    pub async fn reconcile(&self, key: &str) -> Result<(), Error> {
        self.reconciler
            .reconcile(key)
            .instrument(self.span.clone())
            .await
    }

    /// Span the reconciler logs under
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Reusable harness configuration
#[derive(Clone)]
pub struct Factory {
    ctor: Ctor,
    unstructured: bool,
    event_buffer_size: usize,
    create_validator: ValidateFunc,
    update_validator: ValidateFunc,
    registrations: Vec<AddToScheme>,
    scheme: Arc<Scheme>,
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("unstructured", &self.unstructured)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl Factory {
    /// Factory with default validators, buffer size and schemes
    pub fn new(
        ctor: impl Fn(&Listers, Options) -> Arc<dyn Reconciler> + Send + Sync + 'static,
        unstructured: bool,
    ) -> Self {
        Self::builder(ctor).unstructured(unstructured).build()
    }

    /// Start configuring a factory around `ctor`
    pub fn builder(
        ctor: impl Fn(&Listers, Options) -> Arc<dyn Reconciler> + Send + Sync + 'static,
    ) -> FactoryBuilder {
        FactoryBuilder::new(Arc::new(ctor))
    }

    /// Scheme used for normalization and validation
    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Whether every seed is normalized before it reaches a client
    pub fn is_unstructured(&self) -> bool {
        self.unstructured
    }

    /// Assemble a harness, failing the test on any setup error
    ///
    /// # Panics
    ///
    /// Panics with `harness setup failed: ...` when a seed object cannot be
    /// resolved, encoded or stored.
    pub fn assemble(&self, objects: Vec<Object>, reactors: Vec<Reactor>) -> Harness {
        match self.try_assemble(objects, reactors) {
            Ok(harness) => harness,
            Err(e) => panic!("harness setup failed: {e}"),
        }
    }

    /// Assemble a harness, returning setup errors instead of panicking
    pub fn try_assemble(
        &self,
        objects: Vec<Object>,
        reactors: Vec<Reactor>,
    ) -> Result<Harness, Error> {
        let span = info_span!(
            "harness",
            unstructured = self.unstructured,
            objects = objects.len()
        );
        let entered = span.enter();

        let listers = Listers::new(objects);
        let dynamic_scheme = Scheme::from_registrations(&self.registrations);

        let kube = FakeClient::new("kube", self.seeds(&listers.kube_objects())?)?;
        let eventing = FakeClient::new("eventing", self.seeds(&listers.eventing_objects())?)?;
        let dynamic = FakeClient::new(
            "dynamic",
            unstructured_seeds(&listers.all_objects(), &dynamic_scheme)?,
        )?;

        for client in [&kube, &eventing, &dynamic] {
            for reactor in &reactors {
                client.add_reactor(reactor.clone());
            }
            client.add_reactor(generate_name_reactor());
        }

        let ctx = ValidationContext {
            scheme: self.scheme.clone(),
        };
        eventing.add_reactor(validation_reactor(
            Verb::Create,
            ctx.clone(),
            self.create_validator.clone(),
        ));
        eventing.add_reactor(validation_reactor(
            Verb::Update,
            ctx,
            self.update_validator.clone(),
        ));

        let clients = FakeClients {
            kube: Arc::new(kube),
            eventing: Arc::new(eventing),
            dynamic: Arc::new(dynamic),
        };
        let (recorder, events) = event_channel(self.event_buffer_size);

        let reconciler = (self.ctor)(
            &listers,
            Options {
                kube_client: clients.kube.clone(),
                eventing_client: clients.eventing.clone(),
                dynamic_client: clients.dynamic.clone(),
                recorder: Arc::new(recorder),
                span: span.clone(),
            },
        );

        let dynamic_log: Arc<dyn ActionRecorder> = clients.dynamic.clone();
        let eventing_log: Arc<dyn ActionRecorder> = clients.eventing.clone();
        let kube_log: Arc<dyn ActionRecorder> = clients.kube.clone();
        let actions = ActionRecorderList(vec![dynamic_log, eventing_log, kube_log]);

        drop(entered);
        Ok(Harness {
            reconciler,
            actions,
            events,
            stats: FakeStatsReporter,
            clients,
            listers,
            span,
        })
    }

    fn seeds(&self, objects: &[Object]) -> Result<Vec<(ApiResource, DynamicObject)>, Error> {
        if self.unstructured {
            return unstructured_seeds(objects, &self.scheme);
        }
        objects
            .iter()
            .map(|obj| {
                let dynamic = obj.to_dynamic()?;
                let resource = self.scheme.resource_for_object(&dynamic)?;
                Ok((resource, dynamic))
            })
            .collect()
    }
}

fn unstructured_seeds(
    objects: &[Object],
    scheme: &Scheme,
) -> Result<Vec<(ApiResource, DynamicObject)>, Error> {
    objects
        .iter()
        .map(|obj| {
            let dynamic = to_unstructured(obj, scheme)?;
            let resource = scheme.resource_for_object(&dynamic)?;
            Ok((resource, dynamic))
        })
        .collect()
}

/// Builder for [`Factory`]
pub struct FactoryBuilder {
    ctor: Ctor,
    unstructured: bool,
    event_buffer_size: usize,
    create_validator: Option<ValidateFunc>,
    update_validator: Option<ValidateFunc>,
    registrations: Vec<AddToScheme>,
}

impl FactoryBuilder {
    fn new(ctor: Ctor) -> Self {
        Self {
            ctor,
            unstructured: false,
            event_buffer_size: MAX_EVENT_BUFFER_SIZE,
            create_validator: None,
            update_validator: None,
            registrations: CLIENT_SET_SCHEMES.to_vec(),
        }
    }

    /// Seed every client with normalized objects
    pub fn unstructured(mut self, unstructured: bool) -> Self {
        self.unstructured = unstructured;
        self
    }

    /// Event buffer capacity; at least one slot is always kept
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size.max(1);
        self
    }

    /// Override the validator run on eventing creates
    pub fn create_validator(
        mut self,
        validate: impl Fn(&ValidationContext, &Action) -> Reaction + Send + Sync + 'static,
    ) -> Self {
        self.create_validator = Some(Arc::new(validate));
        self
    }

    /// Override the validator run on eventing updates
    pub fn update_validator(
        mut self,
        validate: impl Fn(&ValidationContext, &Action) -> Reaction + Send + Sync + 'static,
    ) -> Self {
        self.update_validator = Some(Arc::new(validate));
        self
    }

    /// Replace the scheme registrations
    pub fn schemes(mut self, registrations: &[AddToScheme]) -> Self {
        self.registrations = registrations.to_vec();
        self
    }

    /// Build the factory, constructing its scheme
    pub fn build(self) -> Factory {
        let scheme = Arc::new(Scheme::from_registrations(&self.registrations));
        Factory {
            ctor: self.ctor,
            unstructured: self.unstructured,
            event_buffer_size: self.event_buffer_size,
            create_validator: self
                .create_validator
                .unwrap_or_else(|| Arc::new(validate_creates)),
            update_validator: self
                .update_validator
                .unwrap_or_else(|| Arc::new(validate_updates)),
            registrations: self.registrations,
            scheme,
        }
    }
}
