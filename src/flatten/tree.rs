//! JSON tree artifacts

use serde::{Deserialize, Serialize};

use super::{join_path, split_keys, valid_segment, Emitter, Flattened};
use crate::error::FlattenError;
use crate::node::{Node, NodeKind};

/// List key declaration, either YANG-style ("a b") or an explicit array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Joined(String),
    Names(Vec<String>),
}

impl KeySpec {
    pub fn names(&self) -> Vec<String> {
        match self {
            KeySpec::Joined(s) => split_keys(s),
            KeySpec::Names(v) => v.iter().map(|s| s.trim().to_string()).collect(),
        }
    }
}

/// One node of a compiled schema tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaTree {
    pub name: String,
    /// module, container, list, leaf, leaf-list, choice or case
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaTree>,
}

impl SchemaTree {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: None,
            type_name: None,
            key: None,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: SchemaTree) -> Self {
        self.children.push(child);
        self
    }
}

pub(crate) fn flatten_tree(root: &SchemaTree, source: &str) -> Result<Flattened, FlattenError> {
    let mut emitter = Emitter::new(source);

    match root.kind.as_str() {
        "module" | "submodule" => walk_children(&mut emitter, root, "")?,
        _ => walk_node(&mut emitter, root, "")?,
    }

    Ok(emitter.finish())
}

fn walk_children(
    emitter: &mut Emitter,
    parent: &SchemaTree,
    parent_path: &str,
) -> Result<(), FlattenError> {
    for child in &parent.children {
        walk_node(emitter, child, parent_path)?;
    }
    Ok(())
}

fn walk_node(
    emitter: &mut Emitter,
    tree: &SchemaTree,
    parent_path: &str,
) -> Result<(), FlattenError> {
    // choice/case do not contribute a path segment
    if matches!(tree.kind.as_str(), "choice" | "case") {
        return walk_children(emitter, tree, parent_path);
    }

    let Some(kind) = NodeKind::from_keyword(&tree.kind) else {
        return Err(emitter.error(
            None,
            parent_path,
            format!("unknown node kind '{}' for '{}'", tree.kind, tree.name),
        ));
    };

    if !valid_segment(&tree.name) {
        return Err(emitter.error(None, parent_path, format!("invalid node name '{}'", tree.name)));
    }

    let path = join_path(parent_path, &tree.name);

    if kind == NodeKind::Leaf && !tree.children.is_empty() {
        return Err(emitter.error(None, &path, "leaf nodes cannot have children"));
    }

    let mut node = Node::new(path.clone(), kind)
        .with_description(tree.description.as_deref().unwrap_or("").trim());
    if let Some(t) = &tree.type_name {
        node = node.with_type(t.as_str());
    }
    if let Some(key) = &tree.key {
        node = node.with_keys(key.names());
    }

    emitter.emit(node, None);
    walk_children(emitter, tree, &path)
}
