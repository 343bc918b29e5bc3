//! Named views and their partially applied form.
//!
//! `Relation::view(name, args)` applies the view when enough arguments are
//! given, otherwise returns a `Curried` that waits for the rest. A curried
//! view refuses to materialize.

use std::fmt;
use std::sync::Arc;

use relview_core::ast::RelationNode;
use relview_core::prelude::{Error, Result, Value};
use relview_core::trace;

use crate::materialize::{Materialize, Rows};
use crate::relation::Relation;

type ViewFn = dyn Fn(&Relation, &[Value]) -> Result<Relation> + Send + Sync;

/// A named, fixed-arity relation transformer.
#[derive(Clone)]
pub struct View {
    name: String,
    arity: usize,
    body: Arc<ViewFn>,
}

impl View {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        body: impl Fn(&Relation, &[Value]) -> Result<Relation> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View({}/{})", self.name, self.arity)
    }
}

/// Result of applying a view: either done, or waiting for arguments.
#[derive(Debug, Clone)]
pub enum Applied {
    Relation(Relation),
    Curried(Curried),
}

impl Applied {
    pub fn is_curried(&self) -> bool {
        matches!(self, Applied::Curried(_))
    }

    pub fn into_relation(self) -> Result<Relation> {
        match self {
            Applied::Relation(r) => Ok(r),
            Applied::Curried(c) => Err(c.incomplete()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Curried {
    relation: Relation,
    view: View,
    args: Vec<Value>,
}

impl Curried {
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.view.arity
    }

    /// Append `rest` to the captured arguments and apply if complete.
    pub fn call(&self, rest: Vec<Value>) -> Result<Applied> {
        let mut args = self.args.clone();
        args.extend(rest);
        apply(&self.relation, &self.view, args)
    }

    pub(crate) fn incomplete(&self) -> Error {
        Error::IncompleteCurry {
            view: self.view.name.clone(),
            arity: self.view.arity,
            given: self.args.len(),
        }
    }
}

impl Materialize for Curried {
    fn each(&self) -> Result<Rows> {
        Err(self.incomplete())
    }

    fn to_ast(&self) -> Result<Arc<RelationNode>> {
        Err(self.incomplete())
    }

    fn is_curried(&self) -> bool {
        true
    }
}

impl Relation {
    /// Apply the named view, currying when fewer than `arity` args are given.
    pub fn view(&self, name: &str, args: Vec<Value>) -> Result<Applied> {
        let view = self
            .views()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ViewNotFound {
                relation: self.name().to_string(),
                name: name.to_string(),
            })?;
        apply(self, &view, args)
    }
}

fn apply(relation: &Relation, view: &View, args: Vec<Value>) -> Result<Applied> {
    if args.len() > view.arity {
        return Err(Error::InvalidComposition(format!(
            "view '{}' takes {} argument(s), got {}",
            view.name,
            view.arity,
            args.len()
        )));
    }
    if args.len() < view.arity {
        trace::emit(
            "curry",
            &[
                ("view", view.name.clone()),
                ("given", args.len().to_string()),
            ],
        );
        return Ok(Applied::Curried(Curried {
            relation: relation.clone(),
            view: view.clone(),
            args,
        }));
    }
    trace::emit(
        "view_apply",
        &[
            ("view", view.name.clone()),
            ("relation", relation.name().to_string()),
        ],
    );
    (view.body)(relation, &args).map(Applied::Relation)
}
