//! Per-type description of the evaluable members of a target and the
//! marker side-table attached to them.
//!
//! A [`Schema`] is built once per type through [`SchemaBuilder`] and is the
//! only source of member discovery: members are reported in registration
//! order, and markers are looked up by member name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::errors::Result;

type Accessor<T> = Arc<dyn Fn(&T) -> serde_json::Result<Value> + Send + Sync>;

/// One zero-argument readable property of a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    name: String,
    return_type: &'static str,
    index: usize,
}

impl Member {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the value the accessor returns.
    pub fn return_type(&self) -> &'static str {
        self.return_type
    }

    /// Position in discovery (registration) order.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Declarative metadata attached to a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Marker type; an evaluator only recognises markers of its own kind.
    pub kind: String,
    /// Identifier of the converter in a [`crate::converters::ConverterRegistry`].
    pub converter: String,
    /// Properties fed to the converter. Empty means the marked member itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Converter parameters, deserialized into the converter on instantiation.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl Marker {
    pub fn new(kind: impl Into<String>, converter: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            converter: converter.into(),
            properties: Vec::new(),
            params: Map::new(),
            order: None,
        }
    }

    /// Feed the converter with these properties instead of the marked member.
    pub fn over<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn ordered(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Property names the converter consumes when this marker sits on `member`.
    pub fn required_properties<'a>(&'a self, member: &'a Member) -> Vec<&'a str> {
        if self.properties.is_empty() {
            vec![member.name()]
        } else {
            self.properties.iter().map(String::as_str).collect()
        }
    }
}

/// Lookup of the marker of a given kind attached to a member.
pub trait MarkerResolver {
    fn marker_of(&self, member: &Member, kind: &str) -> Option<&Marker>;
}

/// Evaluable members of `T` plus their markers.
pub struct Schema<T> {
    members: Vec<Member>,
    accessors: HashMap<String, Accessor<T>>,
    markers: HashMap<String, Vec<Marker>>,
}

impl<T> Schema<T> {
    pub fn builder() -> SchemaBuilder<T> {
        SchemaBuilder::default()
    }

    /// Members in discovery order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Invoke the accessor registered under `name`, if any.
    pub(crate) fn read(&self, target: &T, name: &str) -> Option<serde_json::Result<Value>> {
        self.accessors.get(name).map(|accessor| accessor(target))
    }
}

impl<T> MarkerResolver for Schema<T> {
    fn marker_of(&self, member: &Member, kind: &str) -> Option<&Marker> {
        self.markers
            .get(member.name())?
            .iter()
            .find(|marker| marker.kind == kind)
    }
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("members", &self.members)
            .field("markers", &self.markers)
            .finish()
    }
}

pub struct SchemaBuilder<T> {
    members: Vec<Member>,
    accessors: HashMap<String, Accessor<T>>,
    markers: HashMap<String, Vec<Marker>>,
}

impl<T> Default for SchemaBuilder<T> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            accessors: HashMap::new(),
            markers: HashMap::new(),
        }
    }
}

impl<T> SchemaBuilder<T> {
    /// Register a readable property. Re-registering a name replaces its
    /// accessor but keeps its discovery position.
    pub fn property<R, F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        T: 'static,
        R: Serialize + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let name = name.into();
        let member = Member {
            name: name.clone(),
            return_type: std::any::type_name::<R>(),
            index: self.members.len(),
        };
        match self.members.iter_mut().find(|m| m.name == name) {
            Some(existing) => {
                warn!(property = %name, "property registered twice, replacing accessor");
                existing.return_type = member.return_type;
            }
            None => self.members.push(member),
        }
        self.accessors.insert(
            name,
            Arc::new(move |target: &T| serde_json::to_value(accessor(target))),
        );
        self
    }

    /// Attach a marker to a member.
    pub fn mark(mut self, name: impl Into<String>, marker: Marker) -> Self {
        self.markers.entry(name.into()).or_default().push(marker);
        self
    }

    /// Register a property and attach a marker to it in one step.
    pub fn marked<R, F>(self, name: impl Into<String>, accessor: F, marker: Marker) -> Self
    where
        T: 'static,
        R: Serialize + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let name = name.into();
        self.property(name.clone(), accessor).mark(name, marker)
    }

    /// Attach markers from a JSON object of the form
    /// `{ "member": [ { "kind": ..., "converter": ... }, ... ] }`.
    pub fn markers_from_json(mut self, json: &str) -> Result<Self> {
        let table: HashMap<String, Vec<Marker>> = serde_json::from_str(json)?;
        for (name, markers) in table {
            self.markers.entry(name).or_default().extend(markers);
        }
        Ok(self)
    }

    pub fn build(self) -> Schema<T> {
        for name in self.markers.keys() {
            if !self.accessors.contains_key(name) {
                warn!(member = %name, "marker attached to an unregistered member is ignored");
            }
        }
        debug!(
            members = self.members.len(),
            marked = self.markers.len(),
            "schema built"
        );
        Schema {
            members: self.members,
            accessors: self.accessors,
            markers: self.markers,
        }
    }
}

/// Types that describe their own evaluable members.
pub trait Evaluable: Sized + 'static {
    fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self>;
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static SCHEMAS: OnceLock<SchemaCache> = OnceLock::new();

/// Schema of `T`, described on first use and cached for the process lifetime.
pub fn schema_of<T: Evaluable>() -> Arc<Schema<T>> {
    let cache = SCHEMAS.get_or_init(Default::default);
    let key = TypeId::of::<T>();

    let cached = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned();
    if let Some(Ok(schema)) = cached.map(|any| any.downcast::<Schema<T>>()) {
        return schema;
    }

    let built = Arc::new(T::describe(Schema::builder()).build());
    let stored = cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    stored.downcast::<Schema<T>>().unwrap_or(built)
}
