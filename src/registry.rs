//! Controller registry and provider map.
//!
//! The registry is the external input to the binder: an ordered sequence of
//! controller descriptors plus the factory that constructs each controller
//! from the provider map. It is read once at startup and never mutated after.

use crate::dispatcher::HandlerArg;
use crate::meta::ControllerDescriptor;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a controller handler. The message becomes the `message`
/// field of the 500 envelope, so keep it human-readable and free of
/// internals.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A bound controller instance: a group of route handlers invoked by name
/// with positionally resolved arguments.
///
/// Returning `Value::Null` means the handler produced no body (it either
/// wrote the response through its [`crate::dispatcher::ResponseSlot`]
/// argument or intends an empty response). Objects and arrays are wrapped in
/// the JSON envelope; other truthy values are sent as a raw body.
pub trait Controller: Send + Sync {
    fn call(&self, handler: &str, args: Vec<HandlerArg>) -> Result<Value, HandlerError>;
}

/// Startup-time binding failure. All variants are fatal: the adapter refuses
/// to start rather than serving a partially bound route table.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("controller `{controller}` depends on `{key}` which is not in the provider map")]
    UnresolvedDependency { controller: String, key: String },
    #[error("no provider registered for key `{key}`")]
    MissingProvider { key: String },
    #[error("provider `{key}` has a different type than requested")]
    ProviderTypeMismatch { key: String },
    #[error("failed to construct controller `{controller}`: {cause}")]
    Construction {
        controller: String,
        cause: anyhow::Error,
    },
}

/// Typed provider map: dependency key to live instance.
///
/// Lookups downcast to the requested concrete type; a missing key or a type
/// mismatch is a [`BindError`], surfaced fail-fast at construction time
/// rather than deferred to request handling.
#[derive(Default)]
pub struct ProviderMap {
    providers: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &str, provider: Arc<T>) {
        self.providers.insert(key.to_string(), provider);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.providers.contains_key(key)
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, BindError> {
        let provider = self
            .providers
            .get(key)
            .ok_or_else(|| BindError::MissingProvider {
                key: key.to_string(),
            })?;
        Arc::clone(provider)
            .downcast::<T>()
            .map_err(|_| BindError::ProviderTypeMismatch {
                key: key.to_string(),
            })
    }
}

/// Factory constructing one controller instance from the provider map.
pub type ControllerFactory =
    Box<dyn Fn(&ProviderMap) -> anyhow::Result<Arc<dyn Controller>> + Send + Sync>;

/// One registry entry: descriptor plus factory.
pub struct ControllerRegistration {
    pub descriptor: ControllerDescriptor,
    pub factory: ControllerFactory,
}

/// Ordered collection of controller registrations.
///
/// Registration order is preserved by the binder and, through it, by the
/// route table: when paths overlap, the first registered route wins.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: Vec<ControllerRegistration>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, descriptor: ControllerDescriptor, factory: F)
    where
        F: Fn(&ProviderMap) -> anyhow::Result<Arc<dyn Controller>> + Send + Sync + 'static,
    {
        self.entries.push(ControllerRegistration {
            descriptor,
            factory: Box::new(factory),
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[ControllerRegistration] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
