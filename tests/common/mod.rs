#![allow(dead_code)]

use property_eval as pe;

use pe::ordering::{by_declaration, by_name};
use pe::{
    BoxError, Candidate, ConverterRegistry, CoupleConverter, Evaluable, EvaluationPolicy, Marker,
    SchemaBuilder, SingleValueConverter,
};
use serde::Deserialize;
use std::cmp::Ordering;

pub const CHECK: &str = "check";
pub const DESCRIBE: &str = "describe";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub struct Person {
    pub age: i64,
    pub name: String,
    pub nickname: Option<String>,
}

impl Person {
    pub fn new(age: i64, name: &str) -> Self {
        Self {
            age,
            name: name.to_string(),
            nickname: None,
        }
    }
}

impl Evaluable for Person {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
        schema
            .marked(
                "age",
                |p: &Person| p.age,
                Marker::new(CHECK, "range").param("min", 0).param("max", 120),
            )
            .marked("name", |p: &Person| p.name.clone(), Marker::new(CHECK, "non_empty"))
            .property("nickname", |p: &Person| p.nickname.clone())
    }
}

#[derive(Deserialize)]
pub struct Range {
    min: i64,
    max: i64,
}

impl SingleValueConverter<bool> for Range {
    type Input = i64;

    fn convert(&self, value: i64) -> Result<bool, BoxError> {
        if (self.min..=self.max).contains(&value) {
            Ok(true)
        } else {
            Err(format!("{value} outside {}..={}", self.min, self.max).into())
        }
    }

    fn message(&self) -> String {
        format!("must be between {} and {}", self.min, self.max)
    }
}

#[derive(Deserialize)]
pub struct NonEmpty;

impl SingleValueConverter<bool> for NonEmpty {
    type Input = String;

    fn convert(&self, value: String) -> Result<bool, BoxError> {
        if value.trim().is_empty() {
            Err("blank".into())
        } else {
            Ok(true)
        }
    }
}

/// `first <= second`.
#[derive(Deserialize)]
pub struct NotAfter;

impl CoupleConverter<bool> for NotAfter {
    type First = i64;
    type Second = i64;

    fn convert(&self, first: i64, second: i64) -> Result<bool, BoxError> {
        if first <= second {
            Ok(true)
        } else {
            Err(format!("{first} is after {second}").into())
        }
    }
}

#[derive(Deserialize)]
pub struct Label;

impl SingleValueConverter<String> for Label {
    type Input = String;

    fn convert(&self, value: String) -> Result<String, BoxError> {
        Ok(value)
    }
}

pub fn checks() -> ConverterRegistry<bool> {
    let mut registry = ConverterRegistry::new();
    registry.register_single::<Range>("range");
    registry.register_single::<NonEmpty>("non_empty");
    registry.register_couple::<NotAfter>("not_after");
    registry
}

pub fn labels() -> ConverterRegistry<String> {
    let mut registry = ConverterRegistry::new();
    registry.register_single::<Label>("label");
    registry
}

/// Every check must pass.
pub struct AllOf;

impl<T> EvaluationPolicy<T> for AllOf {
    type Control = bool;

    fn marker_kind(&self) -> &str {
        CHECK
    }

    fn ordering(&self, a: &Candidate, b: &Candidate) -> Ordering {
        by_declaration(a, b)
    }

    fn reduce(&self, acc: bool, next: bool) -> bool {
        acc && next
    }
}

/// Labels joined alphabetically by member name.
pub struct Joined {
    pub separator: &'static str,
}

impl<T> EvaluationPolicy<T> for Joined {
    type Control = String;

    fn marker_kind(&self) -> &str {
        DESCRIBE
    }

    fn ordering(&self, a: &Candidate, b: &Candidate) -> Ordering {
        by_name(a, b)
    }

    fn reduce(&self, acc: String, next: String) -> String {
        format!("{acc}{}{next}", self.separator)
    }
}
