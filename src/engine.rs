use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, debug_span, trace};

use crate::context::{Context, EvalOptions};
use crate::converters::ConverterRegistry;
use crate::errors::{EvalError, Result};
use crate::ordering::Candidate;
use crate::resolver::PropertyResolver;
use crate::schema::{MarkerResolver, Member};
use crate::EvaluationPolicy;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Discovering,
    Filtering,
    Ordering,
    Evaluating,
    Reducing,
}

/// One run of the evaluation over a target. Borrowed state only; the value
/// cache lives in the [`Context`] created by [`Pipeline::run`].
pub(crate) struct Pipeline<'a, T, P: EvaluationPolicy<T>> {
    pub(crate) target: &'a T,
    pub(crate) policy: &'a P,
    pub(crate) members: &'a [Member],
    pub(crate) markers: &'a dyn MarkerResolver,
    pub(crate) resolver: &'a dyn PropertyResolver<T>,
    pub(crate) converters: &'a ConverterRegistry<P::Control>,
    pub(crate) options: &'a EvalOptions,
}

impl<T, P: EvaluationPolicy<T>> Pipeline<'_, T, P> {
    pub(crate) fn run(&self) -> Result<P::Control> {
        let span = debug_span!(
            "evaluate",
            target = std::any::type_name::<T>(),
            marker = self.policy.marker_kind()
        );
        let _guard = span.enter();

        let result = self.stages();
        match &result {
            Ok(_) => debug!("evaluation done"),
            Err(e) => debug!(error = %e, kind = ?e.kind(), "evaluation failed"),
        }
        result
    }

    fn stages(&self) -> Result<P::Control> {
        trace!(stage = ?Stage::Discovering, members = self.members.len());
        let kind = self.policy.marker_kind();

        trace!(stage = ?Stage::Filtering);
        let eligible = self
            .members
            .iter()
            .filter_map(|member| {
                self.markers
                    .marker_of(member, kind)
                    .map(|marker| Candidate { member, marker })
            })
            .filter(|candidate| self.policy.filter(candidate, self.target))
            .collect_vec();

        trace!(stage = ?Stage::Ordering, eligible = eligible.len());
        let ordered = eligible
            .into_iter()
            .sorted_by(|a, b| self.policy.ordering(a, b));

        let mut ctx = Context::new(self.options);
        let controls = ordered
            .map(|candidate| {
                trace!(stage = ?Stage::Evaluating, member = candidate.name());
                self.evaluate_member(&candidate, &mut ctx)
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(stage = ?Stage::Reducing, controls = controls.len());
        controls
            .into_iter()
            .reduce(|acc, next| self.policy.reduce(acc, next))
            .ok_or(EvalError::NoEligibleMembers)
    }

    fn evaluate_member(&self, candidate: &Candidate, ctx: &mut Context) -> Result<P::Control> {
        let Candidate { member, marker } = *candidate;
        let id = self.policy.converter_for(marker);
        let converter = self.converters.instantiate(&id, &marker.params)?;

        let names = marker.required_properties(member);
        if names.len() != converter.arity() {
            return Err(EvalError::ArityMismatch {
                converter: converter.name(),
                expected: converter.arity(),
                supplied: names.len(),
            });
        }

        let mut fetched = Vec::with_capacity(names.len());
        for name in &names {
            fetched.push(ctx.fetch(self.target, self.resolver, name)?);
        }
        // a wholly unset group is never patched up by fallbacks
        if names.len() > 1 && fetched.iter().all(Option::is_none) {
            return Err(EvalError::AllValuesUnbound {
                converter: converter.name(),
                properties: names.iter().map(|n| n.to_string()).collect(),
            });
        }

        let mut values: Vec<Option<Value>> = Vec::with_capacity(names.len());
        for (name, value) in names.iter().zip(fetched) {
            let value = value.or_else(|| ctx.recover(name));
            if value.is_none() {
                return Err(EvalError::MissingRequiredValue {
                    converter: converter.name(),
                    property: name.to_string(),
                });
            }
            values.push(value);
        }

        let control = self.policy.process(candidate, converter.as_ref(), &values)?;
        debug!(member = member.name(), converter = %id, "member converted");
        Ok(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::{Converter, Single, SingleValueConverter};
    use crate::errors::{BoxError, ErrorKind};
    use crate::ordering::by_declaration;
    use crate::schema::{Marker, Schema};
    use pretty_assertions::assert_eq;
    use std::cmp::Ordering;

    struct Sum;

    impl EvaluationPolicy<Vec<i64>> for Sum {
        type Control = i64;

        fn marker_kind(&self) -> &str {
            "sum"
        }

        fn ordering(&self, a: &Candidate, b: &Candidate) -> Ordering {
            by_declaration(a, b)
        }

        fn reduce(&self, acc: i64, next: i64) -> i64 {
            acc + next
        }
    }

    struct Identity;

    impl SingleValueConverter<i64> for Identity {
        type Input = i64;

        fn convert(&self, input: i64) -> std::result::Result<i64, BoxError> {
            Ok(input)
        }
    }

    fn run(schema: &Schema<Vec<i64>>, target: &Vec<i64>) -> Result<i64> {
        let mut converters = ConverterRegistry::<i64>::new();
        converters.register_with("id", |_| Ok(Box::new(Single(Identity)) as Box<dyn Converter<i64>>));
        let options = EvalOptions::default();
        Pipeline {
            target,
            policy: &Sum,
            members: schema.members(),
            markers: schema,
            resolver: schema,
            converters: &converters,
            options: &options,
        }
        .run()
    }

    #[test]
    fn folds_every_marked_member() {
        let schema = Schema::<Vec<i64>>::builder()
            .marked("first", |v: &Vec<i64>| v[0], Marker::new("sum", "id"))
            .property("second", |v: &Vec<i64>| v[1])
            .marked("third", |v: &Vec<i64>| v[2], Marker::new("sum", "id"))
            .build();
        assert_eq!(run(&schema, &vec![1, 10, 100]).unwrap(), 101);
    }

    #[test]
    fn nothing_marked_is_an_error() {
        let schema = Schema::<Vec<i64>>::builder()
            .property("first", |v: &Vec<i64>| v[0])
            .build();
        let err = run(&schema, &vec![1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoEligibleMembers);
    }
}
