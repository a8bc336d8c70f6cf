//! Error types for the path index

use std::fmt;

use thiserror::Error;

use crate::node::Variant;

/// Result type for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Where in a compiled artifact a problem was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Artifact label (file name, "<tree>", release/variant)
    pub source: String,
    /// 1-based line for outline input, byte offset for YIN input
    pub position: Option<usize>,
    /// Slash path of the enclosing schema node, when known
    pub node_path: Option<String>,
}

impl Location {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            position: None,
            node_path: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn within(mut self, node_path: impl Into<String>) -> Self {
        self.node_path = Some(node_path.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(pos) = self.position {
            write!(f, ":{}", pos)?;
        }
        if let Some(path) = &self.node_path {
            write!(f, " ({})", path)?;
        }
        Ok(())
    }
}

/// Malformed compiled schema. Fatal to one build, never to the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("flatten failed at {location}: {message}")]
pub struct FlattenError {
    pub location: Location,
    pub message: String,
}

impl FlattenError {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

/// Path index errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error("Release {release} ({variant}) is not ready: {status}")]
    NotReady {
        release: String,
        variant: Variant,
        status: String,
    },

    #[error("No exact or partial match for path: {query}")]
    NotFound { query: String },

    #[error("Schema compilation failed for {release} ({variant}): {reason}")]
    Compile {
        release: String,
        variant: Variant,
        reason: String,
    },

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
