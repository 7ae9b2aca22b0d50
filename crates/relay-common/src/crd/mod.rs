//! Custom Resource Definitions for relay eventing
//!
//! This module contains every CRD reconciled by relay controllers.

mod broker;
mod channel;
mod subscription;
mod trigger;
mod types;

pub use broker::{Broker, BrokerSpec};
pub use channel::{Channel, ChannelSpec, SubscriberSpec};
pub use subscription::{Subscription, SubscriptionSpec};
pub use trigger::{Trigger, TriggerFilter, TriggerSpec};
pub use types::{
    Addressable, Condition, ConditionStatus, DeliverySpec, Destination, EventingStatus,
    ObjectRef, CONDITION_READY,
};

use kube::ResourceExt;

use crate::Error;

/// Resources that can check their own spec before it is persisted
pub trait Validate {
    /// Returns a validation error describing the first problem found
    fn validate(&self) -> Result<(), Error>;
}

macro_rules! impl_validate {
    ($($kind:ty),* $(,)?) => {
        $(
            impl Validate for $kind {
                fn validate(&self) -> Result<(), Error> {
                    self.spec.validate(&self.name_any())
                }
            }
        )*
    };
}

impl_validate!(Broker, Channel, Subscription, Trigger);
