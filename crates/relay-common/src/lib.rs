//! Common types for relay: eventing CRDs, errors, and the client seams
//! reconcilers are written against.

#![deny(missing_docs)]

pub mod client;
pub mod crd;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod stats;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for relay eventing resources
pub const EVENTING_GROUP: &str = "eventing.relay.dev";

/// API version for relay eventing resources
pub const EVENTING_VERSION: &str = "v1alpha1";

