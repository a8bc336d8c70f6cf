//! Schema node model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IndexError;

/// Schema root a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Operational state (`nokia-state`)
    State,
    /// Configuration (`nokia-conf`)
    Conf,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::State, Variant::Conf];

    /// Short name used in artifact file names and status output
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::State => "state",
            Variant::Conf => "conf",
        }
    }

    /// Top-level container every path of this variant hangs from
    pub fn root(&self) -> &'static str {
        match self {
            Variant::State => "state",
            Variant::Conf => "configure",
        }
    }

    /// Map the first segment of a path to its variant
    pub fn from_root(segment: &str) -> Option<Self> {
        match segment {
            "state" => Some(Variant::State),
            "configure" => Some(Variant::Conf),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "state" => Ok(Variant::State),
            "conf" | "configure" | "config" => Ok(Variant::Conf),
            other => Err(IndexError::UnknownVariant(other.to_string())),
        }
    }
}

/// Kind of schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Container,
    List,
    Leaf,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::List => "list",
            NodeKind::Leaf => "leaf",
        }
    }

    /// Parse a YANG statement keyword. `leaf-list`, `anydata` and `anyxml`
    /// are terminal data nodes and fold into `Leaf`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "container" => Some(NodeKind::Container),
            "list" => Some(NodeKind::List),
            "leaf" | "leaf-list" | "anydata" | "anyxml" => Some(NodeKind::Leaf),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flattened schema node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute slash-delimited path, unique within a release index
    pub path: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub description: String,
    /// Base type name, empty for containers and lists
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_type: String,
    /// Declared list keys in order, empty unless `kind` is `List`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl Node {
    pub fn new(path: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            description: String::new(),
            base_type: String::new(),
            keys: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Only leaves carry a base type
    pub fn with_type(mut self, base_type: impl Into<String>) -> Self {
        if self.kind == NodeKind::Leaf {
            self.base_type = base_type.into();
        }
        self
    }

    /// Only lists carry keys
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.kind == NodeKind::List {
            self.keys = keys.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Final path segment (the node's own name)
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path segments, root first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// A list without declared keys cannot be addressed by key
    pub fn is_indexable(&self) -> bool {
        self.kind != NodeKind::List || !self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_roots() {
        assert_eq!(Variant::State.root(), "state");
        assert_eq!(Variant::Conf.root(), "configure");
        assert_eq!(Variant::from_root("configure"), Some(Variant::Conf));
        assert_eq!(Variant::from_root("qos"), None);
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("conf".parse::<Variant>().unwrap(), Variant::Conf);
        assert_eq!("STATE".parse::<Variant>().unwrap(), Variant::State);
        assert!("running".parse::<Variant>().is_err());
    }

    #[test]
    fn test_kind_from_keyword() {
        assert_eq!(NodeKind::from_keyword("leaf-list"), Some(NodeKind::Leaf));
        assert_eq!(NodeKind::from_keyword("anydata"), Some(NodeKind::Leaf));
        assert_eq!(NodeKind::from_keyword("anyxml"), Some(NodeKind::Leaf));
        assert_eq!(NodeKind::from_keyword("choice"), None);
    }

    #[test]
    fn test_keys_only_on_lists() {
        let leaf = Node::new("/state/qos/name", NodeKind::Leaf).with_keys(["name"]);
        assert!(leaf.keys.is_empty());

        let list = Node::new("/state/qos/sap-egress", NodeKind::List)
            .with_keys(["sap-egress-policy-name"])
            .with_type("string");
        assert_eq!(list.keys, vec!["sap-egress-policy-name"]);
        assert!(list.base_type.is_empty());
    }

    #[test]
    fn test_name_and_depth() {
        let node = Node::new("/state/qos/sap-egress", NodeKind::List);
        assert_eq!(node.name(), "sap-egress");
        assert_eq!(node.depth(), 3);
        assert!(!node.is_indexable());
    }
}
