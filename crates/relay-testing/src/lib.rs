//! Test harness for relay reconcilers
//!
//! Builds three in-memory API clients seeded from a fixture, wires a reactor
//! chain into each, constructs the reconciler under test and hands back the
//! recorded actions and events for assertions.
//!
//! # Modules
//!
//! - [`object`] / [`scheme`]: the typed object union and its kind registry
//! - [`unstructured`]: conversion to the schema-less wire form
//! - [`tracker`] / [`fake`]: in-memory store and the recording client over it
//! - [`reactor`]: interception hooks, name generation and validation
//! - [`recorder`]: bounded event buffer
//! - [`factory`]: harness assembly
//! - [`table`]: table-driven runner

#![deny(missing_docs)]

pub mod action;
pub mod factory;
pub mod fake;
pub mod listers;
pub mod logging;
pub mod object;
pub mod reactor;
pub mod recorder;
pub mod scheme;
pub mod stats;
pub mod table;
pub mod tracker;
pub mod unstructured;

pub use action::{Action, ActionRecorder, ActionRecorderList, Actions, Verb};
pub use factory::{Ctor, Factory, FactoryBuilder, FakeClients, Harness};
pub use fake::FakeClient;
pub use listers::Listers;
pub use object::{Domain, Object, ObjectKind, ObjectVariant};
pub use reactor::{Reaction, Reactor, ValidateFunc, ValidationContext};
pub use recorder::{EventList, FakeRecorder, MAX_EVENT_BUFFER_SIZE};
pub use scheme::{AddToScheme, Scheme};
pub use stats::FakeStatsReporter;
pub use table::{DeleteExpectation, PatchExpectation, Table, TableRow};
pub use unstructured::to_unstructured;
