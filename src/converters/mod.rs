use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{BoxError, EvalError, Result};

/// Strip the module path from a type name.
fn short_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn default_message(name: &str) -> String {
    format!("fails conversion defined in {name}")
}

/// Turns a fixed number of raw property values into one control value.
///
/// Implement [`convert_all`](Converter::convert_all) for variable arity
/// converters; fixed arities are easier through [`SingleValueConverter`] and
/// [`CoupleConverter`].
pub trait Converter<C>: Send + Sync {
    /// How many values a conversion needs.
    fn arity(&self) -> usize;

    /// Conversion logic proper. Receives exactly `arity()` present values.
    fn convert_all(&self, values: &[Value]) -> std::result::Result<C, BoxError>;

    fn name(&self) -> String {
        short_name(std::any::type_name::<Self>())
    }

    /// Why a conversion failed, as reported to the caller.
    fn message(&self) -> String {
        default_message(&self.name())
    }

    /// Check arity and presence of `values`, then convert them.
    fn evaluate(&self, values: &[Option<Value>]) -> Result<C> {
        let converter = self.name();
        if values.len() != self.arity() {
            return Err(EvalError::ArityMismatch {
                converter,
                expected: self.arity(),
                supplied: values.len(),
            });
        }
        if values.len() > 1 && values.iter().all(Option::is_none) {
            return Err(EvalError::AllValuesUnbound {
                converter,
                properties: (0..values.len()).map(|i| format!("#{i}")).collect(),
            });
        }
        let mut present = Vec::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            match value {
                Some(v) => present.push(v.clone()),
                None => {
                    return Err(EvalError::MissingRequiredValue {
                        converter,
                        property: format!("#{position}"),
                    })
                }
            }
        }
        self.convert_all(&present).map_err(|source| EvalError::Conversion {
            converter,
            message: self.message(),
            source,
        })
    }
}

/// Converter of exactly one value, decoded into `Input`.
pub trait SingleValueConverter<C>: Send + Sync {
    type Input: DeserializeOwned;

    fn convert(&self, input: Self::Input) -> std::result::Result<C, BoxError>;

    fn message(&self) -> String {
        default_message(&short_name(std::any::type_name::<Self>()))
    }
}

/// Converter of exactly two values, decoded positionally.
pub trait CoupleConverter<C>: Send + Sync {
    type First: DeserializeOwned;
    type Second: DeserializeOwned;

    fn convert(&self, first: Self::First, second: Self::Second)
        -> std::result::Result<C, BoxError>;

    fn message(&self) -> String {
        default_message(&short_name(std::any::type_name::<Self>()))
    }
}

/// Value at `position`, or an error when fewer values were supplied.
fn nth(values: &[Value], position: usize) -> std::result::Result<Value, BoxError> {
    values
        .get(position)
        .cloned()
        .ok_or_else(|| format!("no value at position {position} of {}", values.len()).into())
}

/// Adapts a [`SingleValueConverter`] to [`Converter`].
#[derive(Debug, Clone, Default)]
pub struct Single<S>(pub S);

impl<C, S: SingleValueConverter<C>> Converter<C> for Single<S> {
    fn arity(&self) -> usize {
        1
    }

    fn convert_all(&self, values: &[Value]) -> std::result::Result<C, BoxError> {
        let input = serde_json::from_value(nth(values, 0)?)?;
        self.0.convert(input)
    }

    fn name(&self) -> String {
        short_name(std::any::type_name::<S>())
    }

    fn message(&self) -> String {
        self.0.message()
    }
}

/// Adapts a [`CoupleConverter`] to [`Converter`].
#[derive(Debug, Clone, Default)]
pub struct Couple<P>(pub P);

impl<C, P: CoupleConverter<C>> Converter<C> for Couple<P> {
    fn arity(&self) -> usize {
        2
    }

    fn convert_all(&self, values: &[Value]) -> std::result::Result<C, BoxError> {
        let first = serde_json::from_value(nth(values, 0)?)?;
        let second = serde_json::from_value(nth(values, 1)?)?;
        self.0.convert(first, second)
    }

    fn name(&self) -> String {
        short_name(std::any::type_name::<P>())
    }

    fn message(&self) -> String {
        self.0.message()
    }
}

type Constructor<C> = Arc<
    dyn Fn(&Map<String, Value>) -> std::result::Result<Box<dyn Converter<C>>, String>
        + Send
        + Sync,
>;

/// Decode marker params into a converter. Unit structs only decode from
/// `null`, so empty params fall back to it.
fn from_params<K: DeserializeOwned>(params: &Map<String, Value>) -> std::result::Result<K, String> {
    match serde_json::from_value(Value::Object(params.clone())) {
        Ok(converter) => Ok(converter),
        Err(e) if params.is_empty() => {
            serde_json::from_value(Value::Null).map_err(|_| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Converter factory: maps a stable identifier to a constructor.
pub struct ConverterRegistry<C> {
    inner: Arc<HashMap<String, Constructor<C>>>,
}

impl<C> Clone for ConverterRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> Default for ConverterRegistry<C> {
    fn default() -> Self {
        Self {
            inner: Arc::new(HashMap::new()),
        }
    }
}

impl<C: 'static> ConverterRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom constructor. It receives the marker params.
    pub fn register_with<F>(&mut self, id: impl Into<String>, constructor: F)
    where
        F: Fn(&Map<String, Value>) -> std::result::Result<Box<dyn Converter<C>>, String>
            + Send
            + Sync
            + 'static,
    {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(id.into(), Arc::new(constructor));
    }

    /// Register a parameterless converter, built with `Default`.
    pub fn register<K>(&mut self, id: impl Into<String>)
    where
        K: Converter<C> + Default + 'static,
    {
        self.register_with(id, |_| Ok(Box::new(K::default()) as Box<dyn Converter<C>>));
    }

    /// Register a converter of any arity whose fields come from marker params.
    pub fn register_multi<K>(&mut self, id: impl Into<String>)
    where
        K: Converter<C> + DeserializeOwned + 'static,
    {
        self.register_with(id, |params| {
            from_params::<K>(params).map(|k| Box::new(k) as Box<dyn Converter<C>>)
        });
    }

    pub fn register_single<S>(&mut self, id: impl Into<String>)
    where
        S: SingleValueConverter<C> + DeserializeOwned + 'static,
    {
        self.register_with(id, |params| {
            from_params::<S>(params).map(|s| Box::new(Single(s)) as Box<dyn Converter<C>>)
        });
    }

    pub fn register_couple<P>(&mut self, id: impl Into<String>)
    where
        P: CoupleConverter<C> + DeserializeOwned + 'static,
    {
        self.register_with(id, |params| {
            from_params::<P>(params).map(|p| Box::new(Couple(p)) as Box<dyn Converter<C>>)
        });
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    /// Build a fresh converter instance for `id`.
    pub fn instantiate(&self, id: &str, params: &Map<String, Value>) -> Result<Box<dyn Converter<C>>> {
        let constructor = self
            .inner
            .get(id)
            .ok_or_else(|| EvalError::ConverterInstantiation {
                converter: id.to_string(),
                reason: "no converter registered under this identifier".into(),
            })?;
        constructor(params).map_err(|reason| EvalError::ConverterInstantiation {
            converter: id.to_string(),
            reason,
        })
    }
}
