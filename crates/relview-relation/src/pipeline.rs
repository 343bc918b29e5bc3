//! Deferred composition: `Composite` queues steps and replays them against
//! its base relation only when materialized.

use std::sync::Arc;

use relview_core::ast::{ModelRef, RelationNode};
use relview_core::prelude::{Error, Result, Value};
use relview_core::trace;
use relview_mapper::{Mapper, MapperRegistry};

use crate::curried::Curried;
use crate::graph::Graph;
use crate::materialize::{Materialize, Rows};
use crate::nest::CombineSpec;
use crate::options::Options;
use crate::relation::Relation;

/// Hook deciding how a relation wraps queued steps into a `Composite`.
pub type CompositeFactory = Arc<dyn Fn(Relation, Vec<Step>) -> Composite + Send + Sync>;

/// Argument to `map_with`: a registered mapper name or a model.
#[derive(Debug, Clone)]
pub enum MapTarget {
    Name(String),
    Model(ModelRef),
}

impl From<&str> for MapTarget {
    fn from(name: &str) -> Self {
        MapTarget::Name(name.to_string())
    }
}

impl From<String> for MapTarget {
    fn from(name: String) -> Self {
        MapTarget::Name(name)
    }
}

impl From<ModelRef> for MapTarget {
    fn from(model: ModelRef) -> Self {
        MapTarget::Model(model)
    }
}

/// One queued operation.
#[derive(Debug, Clone)]
pub enum Step {
    With(Options),
    Wrap(Vec<Relation>),
    Combine(Vec<(Relation, CombineSpec)>),
    View(String, Vec<Value>),
    Model(ModelRef),
    /// Applied to every materialized item, after all relation-level steps.
    Map(Mapper),
    /// Registered mappers, looked up on the replayed relation.
    MapNamed(Vec<String>),
}

impl Step {
    fn label(&self) -> &'static str {
        match self {
            Step::With(_) => "with",
            Step::Wrap(_) => "wrap",
            Step::Combine(_) => "combine",
            Step::View(..) => "view",
            Step::Model(_) => "model",
            Step::Map(_) => "map",
            Step::MapNamed(_) => "map_named",
        }
    }
}

pub trait Pipeline {
    /// Map through registered mappers (by name) or a single model.
    fn map_with(&self, targets: &[MapTarget]) -> Result<Composite>;

    /// Queue an ad hoc mapper.
    fn pipe(&self, mapper: Mapper) -> Result<Composite>;
}

enum Targets {
    Model(ModelRef),
    Names(Vec<String>),
}

/// Either a single model or only mapper names.
fn classify(targets: &[MapTarget]) -> Result<Targets> {
    match targets {
        [] => Err(Error::InvalidMapperCombination(
            "map_with needs at least one mapper name or a model".into(),
        )),
        [MapTarget::Model(model)] => Ok(Targets::Model(model.clone())),
        _ => targets
            .iter()
            .map(|t| match t {
                MapTarget::Name(name) => Ok(name.clone()),
                MapTarget::Model(model) => Err(Error::InvalidMapperCombination(format!(
                    "model '{}' cannot be combined with other mappers",
                    model.name()
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Targets::Names),
    }
}

fn lookup(registry: &MapperRegistry, names: &[String]) -> Result<Vec<Mapper>> {
    names.iter().map(|n| registry.get(n).cloned()).collect()
}

impl Pipeline for Relation {
    fn map_with(&self, targets: &[MapTarget]) -> Result<Composite> {
        match classify(targets)? {
            Targets::Model(model) => Ok(self.map_to(model).compose(vec![])),
            Targets::Names(names) => {
                let mappers = lookup(self.mappers(), &names)?;
                Ok(self.compose(mappers.into_iter().map(Step::Map).collect()))
            }
        }
    }

    fn pipe(&self, mapper: Mapper) -> Result<Composite> {
        Ok(self.compose(vec![Step::Map(mapper)]))
    }
}

impl Relation {
    /// `map_with` for a single registered mapper.
    pub fn r#as(&self, name: &str) -> Result<Composite> {
        self.map_with(&[MapTarget::from(name)])
    }
}

impl Pipeline for Graph {
    fn map_with(&self, targets: &[MapTarget]) -> Result<Composite> {
        self.relation().map_with(targets)
    }

    fn pipe(&self, mapper: Mapper) -> Result<Composite> {
        self.relation().pipe(mapper)
    }
}

impl Pipeline for Curried {
    fn map_with(&self, _targets: &[MapTarget]) -> Result<Composite> {
        Err(self.incomplete())
    }

    fn pipe(&self, _mapper: Mapper) -> Result<Composite> {
        Err(self.incomplete())
    }
}

/// A base relation plus queued steps.
#[derive(Debug, Clone)]
pub struct Composite {
    relation: Relation,
    steps: Vec<Step>,
}

impl Composite {
    pub fn new(relation: Relation, steps: Vec<Step>) -> Self {
        Self { relation, steps }
    }

    pub fn base(&self) -> &Relation {
        &self.relation
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Queue one more step. The base relation's composite factory sees the
    /// whole chain.
    pub fn then(&self, step: Step) -> Composite {
        let mut steps = self.steps.clone();
        steps.push(step);
        self.relation.compose(steps)
    }

    pub fn with(&self, patch: Options) -> Composite {
        self.then(Step::With(patch))
    }

    pub fn wrap(&self, children: Vec<Relation>) -> Composite {
        self.then(Step::Wrap(children))
    }

    pub fn combine(&self, children: Vec<(Relation, CombineSpec)>) -> Composite {
        self.then(Step::Combine(children))
    }

    pub fn view(&self, name: impl Into<String>, args: Vec<Value>) -> Composite {
        self.then(Step::View(name.into(), args))
    }

    pub fn map_to(&self, model: ModelRef) -> Composite {
        self.then(Step::Model(model))
    }

    /// Replay every relation-level step against the base relation.
    pub fn relation(&self) -> Result<Relation> {
        trace::emit(
            "composite_replay",
            &[
                ("relation", self.relation.name().to_string()),
                ("steps", self.steps.len().to_string()),
            ],
        );
        let mut current = self.relation.clone();
        for step in &self.steps {
            trace::emit(
                "replay",
                &[
                    ("relation", current.name().to_string()),
                    ("step", step.label().to_string()),
                ],
            );
            current = match step {
                Step::With(patch) => current.with(patch.clone()),
                Step::Wrap(children) => current.wrap(children)?,
                Step::Combine(children) => current.combine(children)?.into_relation(),
                Step::View(name, args) => current.view(name, args.clone())?.into_relation()?,
                Step::Model(model) => current.map_to(model.clone()),
                Step::Map(_) | Step::MapNamed(_) => current,
            };
        }
        Ok(current)
    }

    /// Item-level mappers in queue order, names resolved against `replayed`.
    fn mappers(&self, replayed: &Relation) -> Result<Vec<Mapper>> {
        let mut mappers = Vec::new();
        for step in &self.steps {
            match step {
                Step::Map(m) => mappers.push(m.clone()),
                Step::MapNamed(names) => mappers.extend(lookup(replayed.mappers(), names)?),
                _ => {}
            }
        }
        Ok(mappers)
    }
}

impl Materialize for Composite {
    fn each(&self) -> Result<Rows> {
        let relation = self.relation()?;
        let mappers = self.mappers(&relation)?;
        let rows = relation.each()?;
        if mappers.is_empty() {
            return Ok(rows);
        }
        Ok(Box::new(rows.map(move |row| {
            mappers.iter().try_fold(row?, |value, m| m.call(value))
        })))
    }

    fn to_ast(&self) -> Result<Arc<RelationNode>> {
        self.relation()?.to_ast()
    }
}

impl Pipeline for Composite {
    fn map_with(&self, targets: &[MapTarget]) -> Result<Composite> {
        match classify(targets)? {
            Targets::Model(model) => Ok(self.map_to(model)),
            Targets::Names(names) => Ok(self.then(Step::MapNamed(names))),
        }
    }

    fn pipe(&self, mapper: Mapper) -> Result<Composite> {
        Ok(self.then(Step::Map(mapper)))
    }
}
