//! Evaluate the marked properties of an object and fold them into one verdict.
//!
//! A target type describes its readable properties in a [`Schema`], attaching
//! [`Marker`]s to the ones that take part in an evaluation. An [`Evaluator`]
//! bound to a target discovers the members carrying its marker kind, orders
//! them, converts each one through the [`Converter`] the marker names, and
//! reduces the converted values with the policy's operator.

pub mod errors;
pub mod context;
pub mod converters;
pub mod ordering;
pub mod resolver;
pub mod schema;
mod engine;

use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

pub use context::{EvalOptions, Fallback};
pub use converters::{
    Converter, ConverterRegistry, Couple, CoupleConverter, Single, SingleValueConverter,
};
pub use errors::{BoxError, ErrorKind, EvalError, Result};
pub use ordering::Candidate;
pub use resolver::{PropertyResolver, SerdeResolver};
pub use schema::{schema_of, Evaluable, Marker, MarkerResolver, Member, Schema, SchemaBuilder};

use engine::Pipeline;

/// What a concrete evaluator decides: which markers it reads, how members are
/// ordered, which converter a marker maps to and how results are combined.
pub trait EvaluationPolicy<T> {
    /// Result of a single conversion and of the whole evaluation.
    type Control: 'static;

    /// Kind of the markers this policy recognises.
    fn marker_kind(&self) -> &str;

    /// Evaluation order. Members comparing equal keep discovery order.
    fn ordering(&self, a: &Candidate, b: &Candidate) -> Ordering;

    /// Identifier of the converter for `marker` in the registry.
    fn converter_for(&self, marker: &Marker) -> String {
        marker.converter.clone()
    }

    /// Associative operator folding control values left to right.
    fn reduce(&self, acc: Self::Control, next: Self::Control) -> Self::Control;

    /// Extra eligibility check; members rejected here are never converted.
    fn filter(&self, _candidate: &Candidate, _target: &T) -> bool {
        true
    }

    /// Run the conversion of one member. Override to alter how a member is
    /// evaluated without exposing the rest of the pipeline.
    fn process(
        &self,
        _candidate: &Candidate,
        converter: &dyn Converter<Self::Control>,
        values: &[Option<Value>],
    ) -> Result<Self::Control> {
        converter.evaluate(values)
    }
}

/// Evaluates one target under a policy.
///
/// Every call to [`evaluate`](Evaluator::evaluate) works on its own value
/// cache, so repeated calls always observe the target afresh.
pub struct Evaluator<'t, T, P: EvaluationPolicy<T>> {
    target: &'t T,
    policy: P,
    schema: Arc<Schema<T>>,
    resolver: Option<Box<dyn PropertyResolver<T>>>,
    converters: ConverterRegistry<P::Control>,
    options: EvalOptions,
}

impl<'t, T: Evaluable, P: EvaluationPolicy<T>> Evaluator<'t, T, P> {
    /// Bind `target`, using the cached schema of its type.
    pub fn new(target: &'t T, policy: P, converters: ConverterRegistry<P::Control>) -> Self {
        Self::with_schema(target, schema_of::<T>(), policy, converters)
    }
}

impl<'t, T, P: EvaluationPolicy<T>> Evaluator<'t, T, P> {
    pub fn with_schema(
        target: &'t T,
        schema: Arc<Schema<T>>,
        policy: P,
        converters: ConverterRegistry<P::Control>,
    ) -> Self {
        Self {
            target,
            policy,
            schema,
            resolver: None,
            converters,
            options: EvalOptions::default(),
        }
    }

    /// Read property values through `resolver` instead of the schema accessors.
    pub fn with_resolver(mut self, resolver: impl PropertyResolver<T> + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> &T {
        self.target
    }

    /// Run the whole evaluation and return the folded result, or the first
    /// error met.
    pub fn evaluate(&self) -> Result<P::Control> {
        let resolver: &dyn PropertyResolver<T> = match &self.resolver {
            Some(resolver) => resolver.as_ref(),
            None => self.schema.as_ref(),
        };
        Pipeline {
            target: self.target,
            policy: &self.policy,
            members: self.schema.members(),
            markers: self.schema.as_ref(),
            resolver,
            converters: &self.converters,
            options: &self.options,
        }
        .run()
    }

    /// Same as [`evaluate`](Evaluator::evaluate), for verdict-style policies.
    pub fn validate(&self) -> Result<P::Control> {
        self.evaluate()
    }
}
