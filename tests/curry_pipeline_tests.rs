//! Curried views and deferred composites.

mod test_data_gen;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use relview_core::prelude::*;
use relview_core::tuple;
use relview_mapper::{Mapper, MapperRegistry};
use relview_relation::dataset::TupleIter;
use relview_relation::pipeline::Step;
use relview_relation::{
    Applied, CombineSpec, Composite, CompositeFactory, Dataset, MapTarget, Materialize,
    MemoryDataset, Options, Pipeline, Relation, View,
};
use test_data_gen::*;

fn by_user() -> View {
    View::new("by_user", 1, |r: &Relation, args: &[Value]| {
        Ok(r.restrict(tuple! { "user_id" => args[0].clone() }))
    })
}

fn tasks_with_views() -> Relation {
    tasks(&local_compiler()).with(Options::new().view(by_user()))
}

#[test]
fn test_view_with_all_args_applies() {
    let applied = tasks_with_views().view("by_user", vec![Value::Int(1)]).unwrap();
    assert!(!applied.is_curried());
    let rows = applied.into_relation().unwrap().materialize().unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_view_curries_until_complete() {
    let curried = match tasks_with_views().view("by_user", vec![]).unwrap() {
        Applied::Curried(c) => c,
        Applied::Relation(_) => panic!("expected a curried view"),
    };
    assert!(curried.is_curried());
    assert_eq!(curried.arity(), 1);
    assert!(curried.args().is_empty());

    match curried.materialize() {
        Err(Error::IncompleteCurry { view, arity, given }) => {
            assert_eq!((view.as_str(), arity, given), ("by_user", 1, 0));
        }
        other => panic!("expected incomplete curry, got {other:?}"),
    }
    assert!(matches!(curried.to_ast(), Err(Error::IncompleteCurry { .. })));
    assert!(matches!(
        curried.map_with(&[MapTarget::from("x")]),
        Err(Error::IncompleteCurry { .. })
    ));

    let done = curried.call(vec![Value::Int(2)]).unwrap();
    let rows = done.into_relation().unwrap().materialize().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("title"), Some(&Value::from("Joe's task")));
}

#[test]
fn test_view_errors() {
    let r = tasks_with_views();
    assert!(matches!(
        r.view("missing", vec![]),
        Err(Error::ViewNotFound { .. })
    ));
    assert!(matches!(
        r.view("by_user", vec![Value::Int(1), Value::Int(2)]),
        Err(Error::InvalidComposition(_))
    ));
}

/// Counts how often the dataset is read.
#[derive(Debug)]
struct Counting {
    inner: MemoryDataset,
    reads: Arc<AtomicUsize>,
}

impl Dataset for Counting {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn digest(&self) -> Hash256 {
        self.inner.digest()
    }

    fn tuples(&self) -> Result<TupleIter> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.tuples()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_composite_defers_until_materialized() {
    let compiler = local_compiler();
    let reads = Arc::new(AtomicUsize::new(0));
    let users = Relation::build(
        Counting {
            inner: users_dataset(),
            reads: Arc::clone(&reads),
        },
        Options::new()
            .schema(users_schema())
            .compiler(Arc::clone(&compiler)),
    );

    let names = Mapper::new("names", |v: Value| {
        Ok(v.get("name").cloned().unwrap_or(Value::Null))
    });
    let composite = users
        .pipe(Mapper::new("noop", Ok))
        .unwrap()
        .combine(vec![(tasks(&compiler), CombineSpec::many(&[("id", "user_id")]))])
        .with(Options::new().auto_struct(true))
        .pipe(names)
        .unwrap();

    assert_eq!(composite.steps().len(), 4);
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert_eq!(compiler.cached(), 0);

    let rows = composite.materialize().unwrap();
    assert_eq!(rows, vec![Value::from("Jane"), Value::from("Joe")]);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert_eq!(compiler.cached(), 1);
}

#[test]
fn test_composite_replays_relation_steps() {
    let compiler = local_compiler();
    let composite = Composite::new(users(&compiler), vec![])
        .wrap(vec![tasks(&compiler)])
        .map_to(ModelRef::new(Person));
    let relation = composite.relation().unwrap();
    assert_eq!(relation.meta().nodes.len(), 1);
    assert!(relation.meta().model.is_some());

    let rows = composite.materialize().unwrap();
    let jane = rows[0].as_struct().unwrap();
    assert_eq!(jane.type_name(), "Person");
    assert_eq!(jane["tasks"].as_list().unwrap().len(), 3);
}

#[test]
fn test_composite_surfaces_curried_views() {
    let composite = Composite::new(tasks_with_views(), vec![]).view("by_user", vec![]);
    assert!(matches!(
        composite.materialize(),
        Err(Error::IncompleteCurry { .. })
    ));

    let complete = Composite::new(tasks_with_views(), vec![]).view("by_user", vec![Value::Int(1)]);
    assert_eq!(complete.materialize().unwrap().len(), 2);
}

#[test]
fn test_composite_factory_hook() {
    let factory: CompositeFactory = Arc::new(|relation: Relation, mut steps: Vec<Step>| {
        steps.insert(0, Step::With(Options::new().auto_struct(true)));
        Composite::new(relation, steps)
    });
    let r = users(&local_compiler()).with(Options::new().composite_factory(factory));

    let composite = r.pipe(Mapper::new("noop", Ok)).unwrap();
    assert_eq!(composite.steps().len(), 2);
    let rows = composite.materialize().unwrap();
    assert_eq!(rows[0].as_struct().unwrap().type_name(), "users");
}

#[test]
fn test_composite_resolves_mapper_names_on_replay() {
    let registry = MapperRegistry::new().register(Mapper::new("names", |v: Value| {
        Ok(v.get("name").cloned().unwrap_or(Value::Null))
    }));
    let composite = Composite::new(users(&local_compiler()), vec![])
        .with(Options::new().mappers(registry))
        .map_with(&[MapTarget::from("names")])
        .unwrap();
    assert!(matches!(composite.steps().last(), Some(Step::MapNamed(_))));
    assert_eq!(
        composite.materialize().unwrap(),
        vec![Value::from("Jane"), Value::from("Joe")]
    );

    let unknown = Composite::new(users(&local_compiler()), vec![])
        .map_with(&[MapTarget::from("names")])
        .unwrap();
    assert!(matches!(
        unknown.materialize(),
        Err(Error::MapperNotFound(name)) if name == "names"
    ));
}

#[test]
fn test_composite_factory_follows_the_chain() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let factory: CompositeFactory = Arc::new(move |relation: Relation, steps: Vec<Step>| {
        seen.fetch_add(1, Ordering::SeqCst);
        Composite::new(relation, steps)
    });
    let r = users(&local_compiler()).with(Options::new().composite_factory(factory));

    let composite = r
        .pipe(Mapper::new("noop", Ok))
        .unwrap()
        .with(Options::new().auto_struct(true))
        .pipe(Mapper::new("noop", Ok))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(composite.steps().len(), 3);
}
