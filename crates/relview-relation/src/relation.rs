//! `Relation`: an immutable, cheaply cloned view over a dataset.
//!
//! A relation owns its dataset handle, a shared schema, the transforms derived
//! from that schema, and its meta. Every "mutation" returns a new relation
//! with fresh memo slots; the AST and compiled mapper are memoized per instance
//! and never inherited.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use relview_core::ast::{ModelRef, RelationNode};
use relview_core::prelude::{
    AssociationSet, Attribute, Error, Result, Schema, Tuple, TupleTransform, Value,
};
use relview_core::trace;
use relview_mapper::{CompiledMapper, MapperCompiler, MapperRegistry};

use crate::ast;
use crate::curried::View;
use crate::dataset::{Dataset, Restricted, TupleIter};
use crate::materialize::{Materialize, Rows};
use crate::meta::Meta;
use crate::nest::Nester;
use crate::options::Options;
use crate::pipeline::{Composite, CompositeFactory, Step};

#[derive(Clone)]
pub struct Relation {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    dataset: Arc<dyn Dataset>,
    schema: Arc<Schema>,
    mappers: Arc<MapperRegistry>,
    auto_struct: bool,
    auto_map: bool,
    meta: Meta,
    input: TupleTransform,
    output: TupleTransform,
    views: Arc<BTreeMap<String, View>>,
    compiler: Option<Arc<MapperCompiler>>,
    composite_factory: Option<CompositeFactory>,

    ast: OnceCell<Arc<RelationNode>>,
    mapper: OnceCell<Arc<CompiledMapper>>,
    associations: OnceCell<AssociationSet>,
}

impl Relation {
    pub fn build(dataset: impl Dataset + 'static, options: Options) -> Relation {
        Self::from_dataset(Arc::new(dataset), options)
    }

    /// Construct over a shared dataset handle. The relation name defaults to
    /// the dataset name.
    pub fn from_dataset(dataset: Arc<dyn Dataset>, options: Options) -> Relation {
        let schema = options.schema.unwrap_or_else(|| Arc::new(Schema::empty()));
        let input = options
            .input
            .unwrap_or_else(|| schema.to_input_transform());
        let output = options
            .output
            .unwrap_or_else(|| schema.to_output_transform());

        Relation::assemble(Inner {
            name: options.name.unwrap_or_else(|| dataset.name().to_string()),
            dataset,
            schema,
            mappers: options.mappers.unwrap_or_default(),
            auto_struct: options.auto_struct.unwrap_or(false),
            auto_map: options.auto_map.unwrap_or(false),
            meta: options.meta.unwrap_or_default(),
            input,
            output,
            views: Arc::new(options.views),
            compiler: options.compiler,
            composite_factory: options.composite_factory,
            ast: OnceCell::new(),
            mapper: OnceCell::new(),
            associations: OnceCell::new(),
        })
    }

    fn assemble(inner: Inner) -> Relation {
        trace::emit(
            "relation_new",
            &[
                ("relation", inner.name.clone()),
                ("dataset", inner.dataset.name().to_string()),
                ("input", inner.input.kind().to_string()),
                ("output", inner.output.kind().to_string()),
            ],
        );
        Relation {
            inner: Arc::new(inner),
        }
    }

    /// A new relation over `dataset`, carrying this relation's options
    /// overridden by `patch`.
    ///
    /// An empty patch keeps everything. A patch that replaces the schema also
    /// re-derives both transforms unless it supplies them.
    pub fn new(&self, dataset: Arc<dyn Dataset>, patch: Options) -> Relation {
        if patch.is_empty() && Arc::ptr_eq(&dataset, &self.inner.dataset) {
            return self.clone();
        }

        let cur = &self.inner;
        let (schema, input, output) = match patch.schema {
            Some(schema) => {
                let input = patch
                    .input
                    .unwrap_or_else(|| schema.to_input_transform());
                let output = patch
                    .output
                    .unwrap_or_else(|| schema.to_output_transform());
                (schema, input, output)
            }
            None => (
                Arc::clone(&cur.schema),
                patch.input.unwrap_or_else(|| cur.input.clone()),
                patch.output.unwrap_or_else(|| cur.output.clone()),
            ),
        };

        let views = if patch.views.is_empty() {
            Arc::clone(&cur.views)
        } else {
            let mut views = (*cur.views).clone();
            views.extend(patch.views);
            Arc::new(views)
        };

        Relation::assemble(Inner {
            name: patch.name.unwrap_or_else(|| cur.name.clone()),
            dataset,
            schema,
            mappers: patch.mappers.unwrap_or_else(|| Arc::clone(&cur.mappers)),
            auto_struct: patch.auto_struct.unwrap_or(cur.auto_struct),
            auto_map: patch.auto_map.unwrap_or(cur.auto_map),
            meta: patch.meta.unwrap_or_else(|| cur.meta.clone()),
            input,
            output,
            views,
            compiler: patch.compiler.or_else(|| cur.compiler.clone()),
            composite_factory: patch
                .composite_factory
                .or_else(|| cur.composite_factory.clone()),
            ast: OnceCell::new(),
            mapper: OnceCell::new(),
            associations: OnceCell::new(),
        })
    }

    /// `new` over the same dataset.
    pub fn with(&self, patch: Options) -> Relation {
        self.new(Arc::clone(&self.inner.dataset), patch)
    }

    pub fn with_name(&self, name: impl Into<String>) -> Relation {
        self.with(Options::new().name(name))
    }

    /// Equality filter over the dataset, keeping every option.
    pub fn restrict(&self, criteria: Tuple) -> Relation {
        let dataset = Restricted::new(Arc::clone(&self.inner.dataset), criteria);
        self.new(Arc::new(dataset), Options::new())
    }

    /// Attach a custom model and turn auto-structuring on.
    pub fn map_to(&self, model: ModelRef) -> Relation {
        let meta = Meta {
            model: Some(model),
            ..self.inner.meta.clone()
        };
        self.with(Options::new().meta(meta).auto_struct(true))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.inner.dataset
    }

    /// Downcast the dataset to its concrete type.
    pub fn native<T: Dataset + 'static>(&self) -> Option<&T> {
        self.inner.dataset.as_any().downcast_ref::<T>()
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn has_schema(&self) -> bool {
        !self.inner.schema.is_empty()
    }

    pub fn meta(&self) -> &Meta {
        &self.inner.meta
    }

    pub fn mappers(&self) -> &MapperRegistry {
        &self.inner.mappers
    }

    pub fn views(&self) -> &BTreeMap<String, View> {
        &self.inner.views
    }

    pub fn input_transform(&self) -> &TupleTransform {
        &self.inner.input
    }

    pub fn output_transform(&self) -> &TupleTransform {
        &self.inner.output
    }

    /// Run the write-side coercion over a tuple.
    pub fn coerce_input(&self, tuple: Tuple) -> Result<Tuple> {
        self.inner.input.call(tuple)
    }

    pub fn auto_struct(&self) -> bool {
        self.inner.auto_struct
    }

    pub fn auto_map(&self) -> bool {
        self.inner.auto_map
    }

    /// Nested children are shaped by their parent's mapper, never their own.
    pub fn wants_auto_struct(&self) -> bool {
        self.inner.auto_struct && self.inner.meta.is_root()
    }

    pub fn wants_auto_map(&self) -> bool {
        (self.inner.auto_map || self.inner.auto_struct) && self.inner.meta.is_root()
    }

    pub fn attribute(&self, name: &str) -> Result<&Attribute> {
        self.inner
            .schema
            .get(name)
            .ok_or_else(|| Error::AttributeNotFound {
                relation: self.inner.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn associations(&self) -> &AssociationSet {
        self.inner
            .associations
            .get_or_init(|| self.inner.schema.associations.clone())
    }

    pub fn to_ast(&self) -> Result<Arc<RelationNode>> {
        self.inner
            .ast
            .get_or_try_init(|| ast::build_ast(self).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn compiler(&self) -> Arc<MapperCompiler> {
        self.inner
            .compiler
            .clone()
            .unwrap_or_else(MapperCompiler::global)
    }

    /// Mapper compiled from this relation's AST, memoized per instance.
    pub fn mapper(&self) -> Result<Arc<CompiledMapper>> {
        self.inner
            .mapper
            .get_or_try_init(|| {
                let ast = self.to_ast()?;
                self.compiler().compile(&ast)
            })
            .map(Arc::clone)
    }

    /// Coerced tuples with nested children attached, never mapped.
    pub fn tuples(&self) -> Result<TupleIter> {
        let output = self.inner.output.clone();
        let raw = self.inner.dataset.tuples()?;
        let coerced = raw.map(move |row| row.and_then(|t| output.call(t)));
        if self.inner.meta.nodes.is_empty() {
            return Ok(Box::new(coerced));
        }
        let nester = Nester::prepare(&self.inner.meta.nodes)?;
        Ok(Box::new(
            coerced.map(move |row| row.and_then(|t| nester.attach(t))),
        ))
    }

    /// Wrap queued steps with the configured factory, or a plain `Composite`.
    pub(crate) fn compose(&self, steps: Vec<Step>) -> Composite {
        match &self.inner.composite_factory {
            Some(factory) => factory(self.clone(), steps),
            None => Composite::new(self.clone(), steps),
        }
    }
}

impl Materialize for Relation {
    fn each(&self) -> Result<Rows> {
        let tuples = self.tuples()?;
        let mapped = self.wants_auto_map();
        trace::emit(
            "materialize",
            &[
                ("relation", self.inner.name.clone()),
                ("auto_struct", self.inner.auto_struct.to_string()),
                ("auto_map", self.inner.auto_map.to_string()),
                ("nodes", self.inner.meta.nodes.len().to_string()),
                ("mapped", mapped.to_string()),
            ],
        );
        if !mapped {
            return Ok(Box::new(tuples.map(|row| row.map(Value::Tuple))));
        }
        let mapper = self.mapper()?;
        Ok(Box::new(
            tuples.map(move |row| row.and_then(|t| mapper.call(t))),
        ))
    }

    fn to_ast(&self) -> Result<Arc<RelationNode>> {
        Relation::to_ast(self)
    }
}

/// Name plus dataset identity; schema and meta are not part of equality.
impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
            && (Arc::ptr_eq(&self.inner.dataset, &other.inner.dataset)
                || self.inner.dataset.digest() == other.inner.dataset.digest())
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.inner.name)
            .field("dataset", &self.inner.dataset)
            .field("attributes", &self.inner.schema.attributes().len())
            .field("auto_struct", &self.inner.auto_struct)
            .field("auto_map", &self.inner.auto_map)
            .field("join", &self.inner.meta.join)
            .field(
                "nodes",
                &self
                    .inner
                    .meta
                    .nodes
                    .iter()
                    .map(Relation::name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
