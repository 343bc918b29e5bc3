//! Declared relation schemas and the coercion transforms derived from them.
//!
//! A `Schema` is an ordered, immutable list of `Attribute`s. Relations never
//! touch attributes directly when reading or writing tuples; they go through
//! the `TupleTransform`s built here.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Bin,
    List,
    Tuple,
}

impl DataType {
    /// Coerce `value` into this type. `attribute` only feeds the error message.
    pub fn coerce(self, attribute: &str, value: Value) -> Result<Value> {
        use DataType::{Any, Bin, Bool, Float, Int, List, Str};

        let mismatch = |v: &Value| {
            Error::mismatch(
                attribute,
                format!("cannot coerce {:?} into {:?}", v.data_type(), self),
            )
        };

        match (self, value) {
            (Any, v) => Ok(v),
            (_, Value::Null) => Ok(Value::Null),
            (Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Bool, Value::Int(i)) if i == 0 || i == 1 => Ok(Value::Bool(i == 1)),
            (Bool, Value::Str(s)) => s
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| mismatch(&Value::Str(s))),
            (Int, Value::Int(i)) => Ok(Value::Int(i)),
            // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
            (Int, Value::Float(f))
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Ok(Value::Int(f as i64))
            }
            (Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(&Value::Str(s))),
            (Float, Value::Float(f)) => Ok(Value::Float(f)),
            (Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(&Value::Str(s))),
            (Str, Value::Str(s)) => Ok(Value::Str(s)),
            (Str, Value::Int(i)) => Ok(Value::Str(i.to_string())),
            (Str, Value::Float(f)) => Ok(Value::Str(f.to_string())),
            (Str, Value::Bool(b)) => Ok(Value::Str(b.to_string())),
            (Bin, Value::Bin(b)) => Ok(Value::Bin(b)),
            (Bin, Value::Str(s)) => Ok(Value::Bin(s.into_bytes())),
            (List, Value::List(items)) => Ok(Value::List(items)),
            (DataType::Tuple, v @ (Value::Tuple(_) | Value::Struct(_))) => Ok(v),
            (_, v) => Err(mismatch(&v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Appears in read output (drives the output transform).
    pub read: bool,
    /// Belongs to a wrapped sub-view rather than to the relation itself.
    pub wrap: bool,
    /// Relation the attribute originates from; set for wrapped attributes.
    pub source: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            read: false,
            wrap: false,
            source: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn read(mut self) -> Self {
        self.read = true;
        self
    }

    pub fn wrapped(mut self, source: impl Into<String>) -> Self {
        self.wrap = true;
        self.source = Some(source.into());
        self
    }

    /// Coerce one value, enforcing nullability.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(Error::mismatch(&self.name, "null for non-nullable attribute"))
            };
        }
        self.data_type.coerce(&self.name, value)
    }

    fn identity(&self) -> (Option<&str>, &str) {
        (self.source.as_deref(), &self.name)
    }
}

/// Declared cardinality of a nested (combined) child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// Association definition; opaque to the core beyond keys and cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// (parent key, child key) pairs.
    pub keys: Vec<(String, String)>,
}

impl Association {
    pub fn many(name: impl Into<String>, keys: Vec<(&str, &str)>) -> Self {
        Self::build(name, Cardinality::Many, keys)
    }

    pub fn one(name: impl Into<String>, keys: Vec<(&str, &str)>) -> Self {
        Self::build(name, Cardinality::One, keys)
    }

    fn build(name: impl Into<String>, cardinality: Cardinality, keys: Vec<(&str, &str)>) -> Self {
        let name = name.into();
        Self {
            target: name.clone(),
            name,
            cardinality,
            keys: keys
                .into_iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

pub type AssociationSet = BTreeMap<String, Association>;

type TransformFn = dyn Fn(Tuple) -> Result<Tuple> + Send + Sync;

/// Tuple -> tuple function derived from a schema (or supplied by a caller).
#[derive(Clone)]
pub struct TupleTransform {
    kind: &'static str,
    f: Arc<TransformFn>,
}

impl TupleTransform {
    pub fn new(
        kind: &'static str,
        f: impl Fn(Tuple) -> Result<Tuple> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            f: Arc::new(f),
        }
    }

    pub fn identity() -> Self {
        Self::new("identity", Ok)
    }

    pub fn call(&self, tuple: Tuple) -> Result<Tuple> {
        (self.f)(tuple)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_identity(&self) -> bool {
        self.kind == "identity"
    }
}

impl fmt::Debug for TupleTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TupleTransform({})", self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub associations: AssociationSet,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            associations: AssociationSet::new(),
        }
    }

    /// A schema with no attributes is treated as absent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_association(mut self, assoc: Association) -> Self {
        self.associations.insert(assoc.name.clone(), assoc);
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Name lookup; a relation's own attributes win over wrapped ones.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name && !a.wrap)
            .or_else(|| self.attributes.iter().find(|a| a.name == name))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn wrap_subset(&self) -> Vec<Attribute> {
        self.attributes.iter().filter(|a| a.wrap).cloned().collect()
    }

    pub fn non_wrapped_subset(&self) -> Vec<Attribute> {
        self.attributes.iter().filter(|a| !a.wrap).cloned().collect()
    }

    /// Mark every attribute as wrapped under `source`.
    pub fn wrap(&self, source: &str) -> Schema {
        Schema {
            attributes: self
                .attributes
                .iter()
                .cloned()
                .map(|a| a.wrapped(source))
                .collect(),
            associations: self.associations.clone(),
        }
    }

    /// Append attributes whose (source, name) identity is new. Associations of
    /// `self` win on name clashes.
    pub fn merge(&self, other: &Schema) -> Schema {
        let mut attributes = self.attributes.clone();
        for attr in &other.attributes {
            if !attributes.iter().any(|a| a.identity() == attr.identity()) {
                attributes.push(attr.clone());
            }
        }
        let mut associations = other.associations.clone();
        associations.extend(self.associations.clone());
        Schema {
            attributes,
            associations,
        }
    }

    /// Write-side coercion: unknown keys are stripped, known keys coerced in
    /// schema order. Identity when the schema is empty.
    pub fn to_input_transform(&self) -> TupleTransform {
        let attrs = self.non_wrapped_subset();
        if attrs.is_empty() {
            return TupleTransform::identity();
        }
        TupleTransform::new("input", move |tuple| coerce_into(&attrs, tuple))
    }

    /// Read-side coercion: projects read-flagged attributes only. Identity when
    /// no attribute is read-flagged.
    pub fn to_output_transform(&self) -> TupleTransform {
        let attrs: Vec<Attribute> = self
            .non_wrapped_subset()
            .into_iter()
            .filter(|a| a.read)
            .collect();
        if attrs.is_empty() {
            return TupleTransform::identity();
        }
        TupleTransform::new("output", move |tuple| coerce_into(&attrs, tuple))
    }
}

fn coerce_into(attrs: &[Attribute], mut tuple: Tuple) -> Result<Tuple> {
    let mut out = Tuple::with_capacity(attrs.len());
    for attr in attrs {
        match tuple.remove(&attr.name) {
            Some(v) => out.insert(attr.name.clone(), attr.coerce(v)?),
            None if attr.nullable => out.insert(attr.name.clone(), Value::Null),
            None => return Err(Error::mismatch(&attr.name, "missing from tuple")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple;

    #[test]
    fn empty_schema_transforms_are_identity() {
        let schema = Schema::empty();
        let t = tuple! { "anything" => 1, "else" => "x" };
        assert!(schema.to_input_transform().is_identity());
        assert_eq!(schema.to_output_transform().call(t.clone()).unwrap(), t);
        assert_eq!(schema.to_input_transform().call(t.clone()).unwrap(), t);
    }

    #[test]
    fn input_transform_strips_and_coerces() {
        let schema = Schema::new(vec![
            Attribute::new("id", DataType::Int),
            Attribute::new("email", DataType::Str).nullable(),
        ]);
        let out = schema
            .to_input_transform()
            .call(tuple! { "id" => "7", "junk" => true })
            .unwrap();
        assert_eq!(out, tuple! { "id" => 7, "email" => Value::Null });
    }

    #[test]
    fn int_coercion_rejects_lossy_floats() {
        assert_eq!(DataType::Int.coerce("n", Value::Float(3.0)).unwrap(), Value::Int(3));
        assert_eq!(
            DataType::Int.coerce("n", Value::Float(-9.223372036854775808e18)).unwrap(),
            Value::Int(i64::MIN)
        );
        for f in [1e30, -1e30, 9.223372036854775808e18, 2.5, f64::NAN, f64::INFINITY] {
            let err = DataType::Int.coerce("n", Value::Float(f)).unwrap_err();
            assert!(matches!(err, Error::SchemaMismatch { ref attribute, .. } if attribute == "n"));
        }
    }

    #[test]
    fn output_transform_without_read_flags_is_identity() {
        let schema = Schema::new(vec![Attribute::new("id", DataType::Int)]);
        assert!(schema.to_output_transform().is_identity());
    }

    #[test]
    fn output_transform_reports_mismatch() {
        let schema = Schema::new(vec![Attribute::new("id", DataType::Int).read()]);
        let err = schema
            .to_output_transform()
            .call(tuple! { "id" => "abc" })
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref attribute, .. } if attribute == "id"));

        let err = schema.to_output_transform().call(Tuple::new()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn merge_keeps_wrapped_attributes_distinct() {
        let users = Schema::new(vec![Attribute::new("id", DataType::Int).read()]);
        let tasks = Schema::new(vec![Attribute::new("id", DataType::Int).read()]);
        let merged = users.merge(&tasks.wrap("tasks"));
        assert_eq!(merged.attributes().len(), 2);
        assert_eq!(merged.wrap_subset().len(), 1);
        assert_eq!(merged.non_wrapped_subset().len(), 1);
        assert!(!merged.get("id").unwrap().wrap);
    }
}
