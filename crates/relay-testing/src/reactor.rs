//! Interception hooks consulted before a fake client touches its store
//!
//! A client holds an ordered `Vec<Reactor>`. Each call is offered to every
//! reactor whose verb/resource pattern matches, in order; the first one that
//! returns [`Reaction::Handled`] answers the call. Reactors that return
//! [`Reaction::Declined`] may still rewrite the action (the generate-name
//! reactor does) before the next reactor sees it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kube::core::DynamicObject;
use tracing::debug;

use crate::action::{Action, Verb};
use crate::scheme::Scheme;
use crate::tracker::{internal_error, invalid};

/// Outcome of offering an action to a reactor
#[derive(Debug)]
pub enum Reaction {
    /// Not handled; the next reactor (or the tracker) sees the action
    Declined,
    /// Handled; the result is returned to the caller as-is
    Handled(Result<Option<DynamicObject>, kube::Error>),
}

impl Reaction {
    /// Handled with an error
    pub fn error(err: kube::Error) -> Self {
        Self::Handled(Err(err))
    }

    /// Handled with an object
    pub fn object(obj: DynamicObject) -> Self {
        Self::Handled(Ok(Some(obj)))
    }

    /// Returns true unless declined
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Handler half of a reactor
pub type ReactionFunc = Arc<dyn Fn(&mut Action) -> Reaction + Send + Sync>;

/// A (verb pattern, resource pattern, handler) triple
///
/// `*` matches any verb or resource; resources match on plural or kind.
#[derive(Clone)]
pub struct Reactor {
    /// Verb pattern
    pub verb: String,
    /// Resource pattern
    pub resource: String,
    handler: ReactionFunc,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("verb", &self.verb)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl Reactor {
    /// Build a reactor from a pattern and handler
    pub fn new(
        verb: impl Into<String>,
        resource: impl Into<String>,
        handler: impl Fn(&mut Action) -> Reaction + Send + Sync + 'static,
    ) -> Self {
        Self {
            verb: verb.into(),
            resource: resource.into(),
            handler: Arc::new(handler),
        }
    }

    /// Returns true if this reactor's pattern covers the action
    pub fn handles(&self, action: &Action) -> bool {
        action.matches(&self.verb, &self.resource)
    }

    /// Run the handler
    pub fn react(&self, action: &mut Action) -> Reaction {
        (self.handler)(action)
    }
}

/// Offer an action to each matching reactor in order
///
/// Returns the first handled result, or `None` when every reactor declined.
pub fn run_chain(
    reactors: &[Reactor],
    action: &mut Action,
) -> Option<Result<Option<DynamicObject>, kube::Error>> {
    for reactor in reactors {
        if !reactor.handles(action) {
            continue;
        }
        if let Reaction::Handled(result) = reactor.react(action) {
            debug!(
                verb = %action.verb,
                resource = %action.resource.plural,
                reactor_verb = %reactor.verb,
                reactor_resource = %reactor.resource,
                "reactor handled action"
            );
            return Some(result);
        }
    }
    None
}

const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const SUFFIX_LEN: usize = 5;
const MAX_PREFIX_LEN: usize = 63 - SUFFIX_LEN;

fn name_suffix(mut seq: u64) -> String {
    let base = SUFFIX_ALPHABET.len() as u64;
    let mut suffix = [SUFFIX_ALPHABET[0]; SUFFIX_LEN];
    for slot in suffix.iter_mut().rev() {
        *slot = SUFFIX_ALPHABET[(seq % base) as usize];
        seq /= base;
    }
    suffix.iter().map(|&b| b as char).collect()
}

/// Reactor that fills in `metadata.name` from `metadata.generateName`
///
/// Mirrors the API server's server-side name generation, which the in-memory
/// store does not do. Suffixes come from a counter owned by this reactor, so
/// names are stable across runs and unique within a client. Always declines.
pub fn generate_name_reactor() -> Reactor {
    let seq = AtomicU64::new(0);
    Reactor::new(Verb::Create.as_str(), "*", move |action| {
        let Some(obj) = action.object.as_mut() else {
            return Reaction::Declined;
        };
        let has_name = obj.metadata.name.as_deref().is_some_and(|n| !n.is_empty());
        let prefix = match obj.metadata.generate_name.as_deref() {
            Some(prefix) if !has_name && !prefix.is_empty() => prefix,
            _ => return Reaction::Declined,
        };

        let prefix: String = prefix.chars().take(MAX_PREFIX_LEN).collect();
        let name = format!("{prefix}{}", name_suffix(seq.fetch_add(1, Ordering::Relaxed)));
        debug!(%name, "generated object name");
        obj.metadata.name = Some(name);
        Reaction::Declined
    })
}

/// Reactor that fails every matching call with a 500
pub fn induce_failure(verb: impl Into<String>, resource: impl Into<String>) -> Reactor {
    let verb = verb.into();
    let resource = resource.into();
    let message = format!("inducing failure for {verb} {resource}");
    Reactor::new(verb, resource, move |_| {
        Reaction::error(internal_error(message.clone()))
    })
}

/// State handed to validation callbacks
#[derive(Clone, Debug)]
pub struct ValidationContext {
    /// Scheme used to decode the action's object into its typed variant
    pub scheme: Arc<Scheme>,
}

/// Validation callback run before a create or update commits
pub type ValidateFunc = Arc<dyn Fn(&ValidationContext, &Action) -> Reaction + Send + Sync>;

/// Validate created objects with their own spec rules
pub fn validate_creates(ctx: &ValidationContext, action: &Action) -> Reaction {
    if action.verb != Verb::Create {
        return Reaction::Declined;
    }
    validate_object(ctx, action)
}

/// Validate updated objects with their own spec rules
///
/// Status updates are not validated.
pub fn validate_updates(ctx: &ValidationContext, action: &Action) -> Reaction {
    if action.verb != Verb::Update || action.is_status_update() {
        return Reaction::Declined;
    }
    validate_object(ctx, action)
}

fn validate_object(ctx: &ValidationContext, action: &Action) -> Reaction {
    let Some(obj) = action.object.as_ref() else {
        return Reaction::Declined;
    };
    let kind = obj
        .types
        .as_ref()
        .map(|t| t.kind.clone())
        .unwrap_or_else(|| action.resource.kind.clone());
    let name = obj.metadata.name.clone().unwrap_or_default();

    let result = ctx
        .scheme
        .decode(obj)
        .and_then(|typed| typed.validate());
    match result {
        Ok(()) => Reaction::Declined,
        Err(e) => {
            debug!(%kind, %name, error = %e, "validation rejected object");
            Reaction::error(invalid(&kind, &name, e))
        }
    }
}

/// Install a validation callback as a reactor on `verb`
pub fn validation_reactor(verb: Verb, ctx: ValidationContext, validate: ValidateFunc) -> Reactor {
    Reactor::new(verb.as_str(), "*", move |action| validate(&ctx, action))
}
