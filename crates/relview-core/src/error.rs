use thiserror::Error;

/// Canonical result for every relview crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error coming out of a dataset; kept intact so callers can downcast it.
pub type DatasetError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("attribute '{name}' not found in relation '{relation}'")]
    AttributeNotFound { relation: String, name: String },

    #[error("invalid mapper combination: {0}")]
    InvalidMapperCombination(String),

    #[error("view '{view}' is curried: expected {arity} argument(s), got {given}")]
    IncompleteCurry {
        view: String,
        arity: usize,
        given: usize,
    },

    #[error("schema mismatch on '{attribute}': {reason}")]
    SchemaMismatch { attribute: String, reason: String },

    #[error("mapper '{0}' is not registered")]
    MapperNotFound(String),

    #[error("view '{name}' is not defined on relation '{relation}'")]
    ViewNotFound { relation: String, name: String },

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("association '{name}' is not defined on relation '{relation}'")]
    AssociationNotFound { relation: String, name: String },

    // Dataset failures are never translated; the original error is the source.
    #[error("dataset error: {0}")]
    Dataset(#[source] DatasetError),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn mismatch(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any dataset-layer failure without changing its identity.
    pub fn dataset(err: impl Into<DatasetError>) -> Self {
        Error::Dataset(err.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}
