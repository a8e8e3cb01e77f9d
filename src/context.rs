use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::errors::Result;
use crate::resolver::PropertyResolver;

/// Replacement for a property that resolved to no value.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    Constant(Value),
    #[serde(skip)]
    Supplier(Arc<dyn Fn() -> Option<Value> + Send + Sync>),
    /// Computed from the name of the absent property.
    #[serde(skip)]
    ForProperty(Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>),
}

impl Fallback {
    pub fn constant(value: impl Into<Value>) -> Self {
        Fallback::Constant(value.into())
    }

    pub fn supplier<F>(f: F) -> Self
    where
        F: Fn() -> Option<Value> + Send + Sync + 'static,
    {
        Fallback::Supplier(Arc::new(f))
    }

    pub fn for_property<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        Fallback::ForProperty(Arc::new(f))
    }

    /// `None` when the fallback itself has nothing to offer.
    pub fn produce(&self, property: &str) -> Option<Value> {
        let value = match self {
            Fallback::Constant(v) => Some(v.clone()),
            Fallback::Supplier(f) => f(),
            Fallback::ForProperty(f) => f(property),
        };
        value.filter(|v| !v.is_null())
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Fallback::Supplier(_) => f.write_str("Supplier(..)"),
            Fallback::ForProperty(_) => f.write_str("ForProperty(..)"),
        }
    }
}

/// Caller-side knobs of an evaluation.
///
/// Fallbacks are opt-in: with none installed an absent value fails the
/// evaluation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalOptions {
    #[serde(default)]
    pub fallbacks: HashMap<String, Fallback>,
    /// Used for absent properties without a fallback of their own.
    #[serde(default)]
    pub default_fallback: Option<Fallback>,
}

impl EvalOptions {
    /// Parse options from JSON. Only constant fallbacks can be expressed there.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_fallback(mut self, property: impl Into<String>, fallback: Fallback) -> Self {
        self.fallbacks.insert(property.into(), fallback);
        self
    }

    pub fn with_default_fallback(mut self, fallback: Fallback) -> Self {
        self.default_fallback = Some(fallback);
        self
    }

    fn fallback_for(&self, property: &str) -> Option<&Fallback> {
        self.fallbacks
            .get(property)
            .or(self.default_fallback.as_ref())
    }
}

/// State of a single evaluation: the value cache and the options in force.
///
/// A property is fetched through the resolver at most once per context.
pub(crate) struct Context<'o> {
    cache: HashMap<String, Option<Value>>,
    options: &'o EvalOptions,
}

impl<'o> Context<'o> {
    pub(crate) fn new(options: &'o EvalOptions) -> Self {
        Self {
            cache: HashMap::new(),
            options,
        }
    }

    pub(crate) fn fetch<T: ?Sized>(
        &mut self,
        target: &T,
        resolver: &dyn PropertyResolver<T>,
        name: &str,
    ) -> Result<Option<Value>> {
        if let Some(cached) = self.cache.get(name) {
            trace!(property = name, "value served from cache");
            return Ok(cached.clone());
        }
        let value = resolver.resolve(target, name)?;
        trace!(property = name, present = value.is_some(), "value fetched");
        self.cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Substitute the installed fallback for an absent value.
    pub(crate) fn recover(&self, name: &str) -> Option<Value> {
        let recovered = self.options.fallback_for(name)?.produce(name);
        debug!(
            property = name,
            recovered = recovered.is_some(),
            "fallback consulted for absent value"
        );
        recovered
    }
}
