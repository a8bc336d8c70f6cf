//! Example retrieval command synthesis

use std::collections::HashMap;

use crate::index::ReleaseIndex;
use crate::node::{Node, NodeKind};

pub const DEFAULT_TOOL: &str = "gnmic";
pub const DEFAULT_PLACEHOLDER: &str = "example";

/// Renders `<tool> get --path /...` for a resolved node, with every keyed
/// list along the path written as `name[key=value]`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    tool: String,
    placeholder: String,
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL, DEFAULT_PLACEHOLDER)
    }
}

impl CommandSynthesizer {
    pub fn new(tool: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Command with the placeholder value for every key
    pub fn synthesize(&self, index: &ReleaseIndex, node: &Node) -> String {
        self.synthesize_with(index, node, &HashMap::new())
    }

    /// Command with concrete key values where `values` has them
    pub fn synthesize_with(
        &self,
        index: &ReleaseIndex,
        node: &Node,
        values: &HashMap<String, String>,
    ) -> String {
        format!("{} get --path {}", self.tool, self.render_path(index, node, values))
    }

    /// Just the `--path` argument
    pub fn render_path(
        &self,
        index: &ReleaseIndex,
        node: &Node,
        values: &HashMap<String, String>,
    ) -> String {
        let segments: Vec<&str> = node.segments().collect();
        let mut rendered: Vec<String> = Vec::with_capacity(segments.len() + 1);

        let root = index.variant().root();
        let first = segments.first().map(|s| strip_prefix(s));
        if first != Some(root) {
            rendered.push(root.to_string());
        }

        let mut prefix = String::with_capacity(node.path.len());
        for (i, segment) in segments.iter().enumerate() {
            prefix.push('/');
            prefix.push_str(segment);

            // The node itself may be a candidate that is not in the index
            let current = if i + 1 == segments.len() {
                Some(node)
            } else {
                index.lookup_exact(&prefix)
            };

            let mut part = strip_prefix(segment).to_string();
            if let Some(n) = current.filter(|n| n.kind == NodeKind::List) {
                for key in &n.keys {
                    let value = values.get(key).unwrap_or(&self.placeholder);
                    part.push_str(&format!("[{}={}]", key, value));
                }
            }
            rendered.push(part);
        }

        format!("/{}", rendered.join("/"))
    }
}

fn strip_prefix(segment: &str) -> &str {
    segment.rsplit(':').next().unwrap_or(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Variant;

    fn index() -> ReleaseIndex {
        ReleaseIndex::from_nodes(
            "r1",
            Variant::State,
            vec![
                Node::new("/state", NodeKind::Container),
                Node::new("/state/qos", NodeKind::Container),
                Node::new("/state/qos/sap-egress", NodeKind::List)
                    .with_keys(["sap-egress-policy-name"]),
                Node::new("/state/qos/sap-egress/queue", NodeKind::List)
                    .with_keys(["queue-id", "fc"]),
                Node::new("/state/qos/sap-egress/queue/rate", NodeKind::Leaf).with_type("uint32"),
                Node::new("/state/log", NodeKind::List),
            ],
        )
    }

    #[test]
    fn test_list_node_command() {
        let index = index();
        let node = index.lookup_exact("/state/qos/sap-egress").unwrap();
        assert_eq!(
            CommandSynthesizer::default().synthesize(&index, node),
            "gnmic get --path /state/qos/sap-egress[sap-egress-policy-name=example]"
        );
    }

    #[test]
    fn test_nested_keys_and_leaf() {
        let index = index();
        let node = index.lookup_exact("/state/qos/sap-egress/queue/rate").unwrap();
        let synth = CommandSynthesizer::default();
        assert_eq!(
            synth.synthesize(&index, node),
            "gnmic get --path /state/qos/sap-egress[sap-egress-policy-name=example]/queue[queue-id=example][fc=example]/rate"
        );
        // idempotent
        assert_eq!(synth.synthesize(&index, node), synth.synthesize(&index, node));
    }

    #[test]
    fn test_supplied_values() {
        let index = index();
        let node = index.lookup_exact("/state/qos/sap-egress/queue").unwrap();
        let values = HashMap::from([("queue-id".to_string(), "1".to_string())]);
        assert_eq!(
            CommandSynthesizer::new("gnmic -a router:57400", "x")
                .synthesize_with(&index, node, &values),
            "gnmic -a router:57400 get --path /state/qos/sap-egress[sap-egress-policy-name=x]/queue[queue-id=1][fc=x]"
        );
    }

    #[test]
    fn test_keyless_list_and_missing_root() {
        let index = index();
        let node = index.lookup_exact("/state/log").unwrap();
        assert_eq!(
            CommandSynthesizer::default().synthesize(&index, node),
            "gnmic get --path /state/log"
        );

        let rootless = Node::new("/qos/sap-egress", NodeKind::List).with_keys(["name"]);
        assert_eq!(
            CommandSynthesizer::default().synthesize(&index, &rootless),
            "gnmic get --path /state/qos/sap-egress[name=example]"
        );
    }

    #[test]
    fn test_conf_variant_root() {
        let index = ReleaseIndex::from_nodes(
            "r1",
            Variant::Conf,
            vec![Node::new("/configure/router", NodeKind::List).with_keys(["router-name"])],
        );
        let node = index.lookup_exact("/configure/router").unwrap();
        assert_eq!(
            CommandSynthesizer::default().synthesize(&index, node),
            "gnmic get --path /configure/router[router-name=example]"
        );
    }
}
