//! Schema Flattening
//!
//! Turns a compiled schema artifact into an ordered list of [`Node`]s, one per
//! unique absolute path. Four artifact forms are understood:
//!
//! - [`CompiledSchema::Tree`]: a JSON tree (`name`, `kind`, `key`, `children`...)
//! - [`CompiledSchema::Yin`]: YIN XML as emitted by `pyang -f yin`
//! - [`CompiledSchema::Outline`]: indentation-structured text, one node per line
//! - [`CompiledSchema::FlatPaths`]: `pyang -f flatten` output, one path per line
//!
//! Traversal is depth-first in declaration order, so the same artifact always
//! flattens to the same sequence. Any malformed fragment aborts the whole
//! flatten with a [`FlattenError`]; callers never see a partial node list.

pub mod flat_paths;
pub mod outline;
pub mod tree;
pub mod yin;

pub use tree::{KeySpec, SchemaTree};

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{FlattenError, Location};
use crate::node::Node;

/// A list node declared without a `key` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingKeyWarning {
    pub path: String,
    pub location: Location,
}

/// Non-fatal findings recorded while flattening
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenWarning {
    MissingKey(MissingKeyWarning),
    /// Second and later occurrences of a path are dropped
    DuplicatePath { path: String, location: Location },
}

impl FlattenWarning {
    pub fn path(&self) -> &str {
        match self {
            FlattenWarning::MissingKey(w) => &w.path,
            FlattenWarning::DuplicatePath { path, .. } => path,
        }
    }
}

impl fmt::Display for FlattenWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenWarning::MissingKey(w) => {
                write!(f, "list {} declares no key ({})", w.path, w.location)
            }
            FlattenWarning::DuplicatePath { path, location } => {
                write!(f, "duplicate path {} dropped ({})", path, location)
            }
        }
    }
}

/// Output of a successful flatten
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub nodes: Vec<Node>,
    pub warnings: Vec<FlattenWarning>,
}

impl Flattened {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.path.as_str())
    }
}

/// Artifact encoding, usually derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Yin,
    Tree,
    Outline,
    FlatPaths,
}

impl ArtifactFormat {
    /// `nokia-<variant>-flat-paths.txt` and any other `.txt` is a flat listing
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yin" | "xml" => Some(ArtifactFormat::Yin),
            "json" => Some(ArtifactFormat::Tree),
            "outline" => Some(ArtifactFormat::Outline),
            "txt" | "csv" => Some(ArtifactFormat::FlatPaths),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yin" => Some(ArtifactFormat::Yin),
            "tree" | "json" => Some(ArtifactFormat::Tree),
            "outline" => Some(ArtifactFormat::Outline),
            "flat-paths" | "flat" | "flatten" => Some(ArtifactFormat::FlatPaths),
            _ => None,
        }
    }
}

/// Compiled intermediate representation handed over by the schema compiler
#[derive(Debug, Clone)]
pub enum CompiledSchema {
    Tree(SchemaTree),
    Yin(String),
    Outline(String),
    FlatPaths(String),
}

impl CompiledSchema {
    /// Decode raw artifact text. JSON syntax errors surface as [`FlattenError`].
    pub fn parse(format: ArtifactFormat, text: String, source: &str) -> Result<Self, FlattenError> {
        match format {
            ArtifactFormat::Yin => Ok(CompiledSchema::Yin(text)),
            ArtifactFormat::Outline => Ok(CompiledSchema::Outline(text)),
            ArtifactFormat::FlatPaths => Ok(CompiledSchema::FlatPaths(text)),
            ArtifactFormat::Tree => serde_json::from_str(&text)
                .map(CompiledSchema::Tree)
                .map_err(|e| {
                    FlattenError::new(Location::new(source).at(e.line()), e.to_string())
                }),
        }
    }
}

/// Flatten a compiled schema. `source` labels error locations.
pub fn flatten(schema: &CompiledSchema, source: &str) -> Result<Flattened, FlattenError> {
    match schema {
        CompiledSchema::Tree(tree) => tree::flatten_tree(tree, source),
        CompiledSchema::Yin(xml) => yin::flatten_yin(xml, source),
        CompiledSchema::Outline(text) => outline::flatten_outline(text, source),
        CompiledSchema::FlatPaths(text) => flat_paths::flatten_flat_paths(text, source),
    }
}

/// Collects nodes in emission order and enforces path uniqueness
pub(crate) struct Emitter {
    source: String,
    nodes: Vec<Node>,
    seen: HashSet<String>,
    warnings: Vec<FlattenWarning>,
}

impl Emitter {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            nodes: Vec::new(),
            seen: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn location(&self, position: Option<usize>, node_path: &str) -> Location {
        let loc = Location::new(self.source.clone()).within(node_path);
        match position {
            Some(p) => loc.at(p),
            None => loc,
        }
    }

    pub(crate) fn error(
        &self,
        position: Option<usize>,
        node_path: &str,
        message: impl Into<String>,
    ) -> FlattenError {
        FlattenError::new(self.location(position, node_path), message)
    }

    /// Record a node. Returns false when the path was already emitted.
    pub(crate) fn emit(&mut self, node: Node, position: Option<usize>) -> bool {
        if !self.seen.insert(node.path.clone()) {
            let location = self.location(position, &node.path);
            self.warnings.push(FlattenWarning::DuplicatePath {
                path: node.path,
                location,
            });
            return false;
        }

        if !node.is_indexable() {
            let location = self.location(position, &node.path);
            self.warnings.push(FlattenWarning::MissingKey(MissingKeyWarning {
                path: node.path.clone(),
                location,
            }));
        }

        self.nodes.push(node);
        true
    }

    pub(crate) fn finish(self) -> Flattened {
        Flattened {
            nodes: self.nodes,
            warnings: self.warnings,
        }
    }
}

/// Append a segment to a parent path ("" is the schema root)
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent, name)
}

/// Segment names must be non-empty and free of separators and whitespace
pub(crate) fn valid_segment(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.chars().any(char::is_whitespace)
}

/// Split a YANG `key` argument ("a b c") into names
pub(crate) fn split_keys(value: &str) -> Vec<String> {
    value.split_whitespace().map(String::from).collect()
}
