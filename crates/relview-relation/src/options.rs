//! Option patches applied through `Relation::new`/`Relation::with`.
//!
//! Every field is optional; `None` means "keep what the relation already has".

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use relview_core::config::RelviewConfig;
use relview_core::schema::{Schema, TupleTransform};
use relview_mapper::{MapperCompiler, MapperRegistry};

use crate::curried::View;
use crate::meta::Meta;
use crate::pipeline::CompositeFactory;

#[derive(Clone, Default)]
pub struct Options {
    pub(crate) name: Option<String>,
    pub(crate) schema: Option<Arc<Schema>>,
    pub(crate) mappers: Option<Arc<MapperRegistry>>,
    pub(crate) auto_struct: Option<bool>,
    pub(crate) auto_map: Option<bool>,
    pub(crate) meta: Option<Meta>,
    pub(crate) input: Option<TupleTransform>,
    pub(crate) output: Option<TupleTransform>,
    pub(crate) views: BTreeMap<String, View>,
    pub(crate) compiler: Option<Arc<MapperCompiler>>,
    pub(crate) composite_factory: Option<CompositeFactory>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `auto_struct`/`auto_map` from process configuration.
    pub fn from_config(cfg: &RelviewConfig) -> Self {
        Self::new().auto_struct(cfg.auto_struct).auto_map(cfg.auto_map)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replacing the schema also drops derived transforms unless this patch
    /// supplies its own.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn mappers(mut self, mappers: MapperRegistry) -> Self {
        self.mappers = Some(Arc::new(mappers));
        self
    }

    pub fn auto_struct(mut self, on: bool) -> Self {
        self.auto_struct = Some(on);
        self
    }

    pub fn auto_map(mut self, on: bool) -> Self {
        self.auto_map = Some(on);
        self
    }

    /// Replaces the whole meta record.
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn input(mut self, transform: TupleTransform) -> Self {
        self.input = Some(transform);
        self
    }

    pub fn output(mut self, transform: TupleTransform) -> Self {
        self.output = Some(transform);
        self
    }

    /// Adds (or redefines) a named view.
    pub fn view(mut self, view: View) -> Self {
        self.views.insert(view.name().to_string(), view);
        self
    }

    /// Compile mappers with this compiler instead of `MapperCompiler::global()`.
    pub fn compiler(mut self, compiler: Arc<MapperCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn composite_factory(mut self, factory: CompositeFactory) -> Self {
        self.composite_factory = Some(factory);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.schema.is_none()
            && self.mappers.is_none()
            && self.auto_struct.is_none()
            && self.auto_map.is_none()
            && self.meta.is_none()
            && self.input.is_none()
            && self.output.is_none()
            && self.views.is_empty()
            && self.compiler.is_none()
            && self.composite_factory.is_none()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("name", &self.name)
            .field("schema", &self.schema.as_ref().map(|s| s.attributes().len()))
            .field("auto_struct", &self.auto_struct)
            .field("auto_map", &self.auto_map)
            .field("meta", &self.meta)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .field("compiler", &self.compiler.is_some())
            .field("composite_factory", &self.composite_factory.is_some())
            .finish()
    }
}
