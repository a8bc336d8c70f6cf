//! Release Index
//!
//! Immutable, per-(release, variant) view over a flattened node list with an
//! exact-path map. Built once in a single pass; read concurrently without locks.

use std::collections::HashMap;

use crate::checksum::Checksum;
use crate::flatten::{FlattenWarning, Flattened};
use crate::node::{Node, Variant};

#[derive(Debug)]
pub struct ReleaseIndex {
    release: String,
    variant: Variant,
    /// Nodes in flatten (depth-first, declaration) order
    nodes: Vec<Node>,
    /// Index: path -> position in `nodes`
    by_path: HashMap<String, usize>,
    warnings: Vec<FlattenWarning>,
    fingerprint: Checksum,
}

impl ReleaseIndex {
    /// Build from flatten output. Nodes are expected to have unique paths;
    /// if a path repeats, the first occurrence stays addressable.
    pub fn build(release: impl Into<String>, variant: Variant, flattened: Flattened) -> Self {
        let Flattened { nodes, warnings } = flattened;

        let mut by_path = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            by_path.entry(node.path.clone()).or_insert(pos);
        }
        let fingerprint = Checksum::of_paths(nodes.iter().map(|n| n.path.as_str()));

        Self {
            release: release.into(),
            variant,
            nodes,
            by_path,
            warnings,
            fingerprint,
        }
    }

    /// Build directly from nodes (no flatten warnings)
    pub fn from_nodes(release: impl Into<String>, variant: Variant, nodes: Vec<Node>) -> Self {
        Self::build(
            release,
            variant,
            Flattened {
                nodes,
                warnings: Vec::new(),
            },
        )
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Exact lookup by absolute path - O(1)
    pub fn lookup_exact(&self, path: &str) -> Option<&Node> {
        self.by_path.get(path).map(|&pos| &self.nodes[pos])
    }

    /// Paths in iteration order
    pub fn all_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|n| n.path.as_str())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Non-fatal findings from the flatten that produced this index
    pub fn warnings(&self) -> &[FlattenWarning] {
        &self.warnings
    }

    /// SHA-256 over the ordered path list
    pub fn fingerprint(&self) -> &Checksum {
        &self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn sample() -> ReleaseIndex {
        ReleaseIndex::from_nodes(
            "25.10.R1",
            Variant::State,
            vec![
                Node::new("/state", NodeKind::Container),
                Node::new("/state/qos", NodeKind::Container),
                Node::new("/state/qos/sap-egress", NodeKind::List)
                    .with_keys(["sap-egress-policy-name"]),
                Node::new("/state/qos/sap-egress/sap-egress-policy-name", NodeKind::Leaf)
                    .with_type("string"),
            ],
        )
    }

    #[test]
    fn test_lookup_exact() {
        let index = sample();
        for path in index.all_paths() {
            assert_eq!(index.lookup_exact(path).map(|n| n.path.as_str()), Some(path));
        }
        assert!(index.lookup_exact("/state/qos/sap-ingress").is_none());
        assert!(index.lookup_exact("state/qos").is_none());
    }

    #[test]
    fn test_all_paths_order() {
        let index = sample();
        let paths: Vec<_> = index.all_paths().collect();
        assert_eq!(paths[0], "/state");
        assert_eq!(paths[3], "/state/qos/sap-egress/sap-egress-policy-name");
        assert_eq!(index.len(), 4);
        assert_eq!(index.release(), "25.10.R1");
    }

    #[test]
    fn test_fingerprint_tracks_order() {
        let a = sample();
        let b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut nodes = a.nodes().to_vec();
        nodes.reverse();
        let c = ReleaseIndex::from_nodes("25.10.R1", Variant::State, nodes);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
