//! YIN artifacts
//!
//! The document is first read into a small element tree so that `uses`
//! statements can be expanded against groupings declared anywhere in the
//! module, then walked depth-first.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{join_path, split_keys, valid_segment, Emitter, Flattened};
use crate::error::{FlattenError, Location};
use crate::node::{Node, NodeKind};

const YIN_PREFIX: &str = "yin";

/// Minimal owned XML element
#[derive(Debug, Default)]
struct Element {
    keyword: String,
    /// Element belongs to an extension namespace
    foreign: bool,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
    offset: usize,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, keyword: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| !c.foreign && c.keyword == keyword)
    }

    /// `<description><text>...</text></description>`
    fn description(&self) -> String {
        self.child("description")
            .and_then(|d| d.child("text"))
            .map(|t| t.text.trim().to_string())
            .unwrap_or_default()
    }
}

pub(crate) fn flatten_yin(xml: &str, source: &str) -> Result<Flattened, FlattenError> {
    let root = parse_document(xml, source)?;

    if root.foreign || !matches!(root.keyword.as_str(), "module" | "submodule") {
        return Err(FlattenError::new(
            Location::new(source).at(root.offset),
            format!("expected <module> root element, found <{}>", root.keyword),
        ));
    }

    let mut groupings = HashMap::new();
    collect_groupings(&root, &mut groupings);

    let mut walker = Walker {
        emitter: Emitter::new(source),
        groupings,
        expanding: Vec::new(),
    };
    walker.walk_children(&root, "")?;

    Ok(walker.emitter.finish())
}

fn parse_document(xml: &str, source: &str) -> Result<Element, FlattenError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = reader.buffer_position();
        let event = reader.read_event().map_err(|e| {
            FlattenError::new(Location::new(source).at(reader.buffer_position()), e.to_string())
        })?;

        match event {
            Event::Start(start) => {
                stack.push(open_element(&start, offset, source)?);
            }
            Event::Empty(start) => {
                let element = open_element(&start, offset, source)?;
                attach(element, &mut stack, &mut root, source)?;
            }
            Event::End(_) => {
                // quick-xml already verified the end tag matches
                let Some(element) = stack.pop() else {
                    return Err(FlattenError::new(
                        Location::new(source).at(offset),
                        "unbalanced end tag",
                    ));
                };
                attach(element, &mut stack, &mut root, source)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| {
                    FlattenError::new(Location::new(source).at(offset), e.to_string())
                })?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FlattenError::new(
            Location::new(source).at(open.offset),
            format!("unexpected end of document inside <{}>", open.keyword),
        ));
    }

    root.ok_or_else(|| FlattenError::new(Location::new(source), "document has no root element"))
}

fn open_element(
    start: &BytesStart<'_>,
    offset: usize,
    source: &str,
) -> Result<Element, FlattenError> {
    let name = start.name();
    let foreign = match name.prefix() {
        Some(prefix) => prefix.as_ref() != YIN_PREFIX.as_bytes(),
        None => false,
    };
    let keyword = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            FlattenError::new(Location::new(source).at(offset), e.to_string())
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| FlattenError::new(Location::new(source).at(offset), e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(Element {
        keyword,
        foreign,
        attrs,
        offset,
        ..Element::default()
    })
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
    source: &str,
) -> Result<(), FlattenError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(FlattenError::new(
            Location::new(source).at(element.offset),
            "multiple root elements",
        ));
    }
    *root = Some(element);
    Ok(())
}

/// Groupings are resolved by local name; the first declaration wins.
fn collect_groupings<'a>(element: &'a Element, out: &mut HashMap<String, &'a Element>) {
    for child in &element.children {
        if child.foreign {
            continue;
        }
        if child.keyword == "grouping" {
            if let Some(name) = child.attr("name") {
                out.entry(name.to_string()).or_insert(child);
            }
        }
        collect_groupings(child, out);
    }
}

fn local_name(reference: &str) -> &str {
    reference.rsplit(':').next().unwrap_or(reference)
}

struct Walker<'a> {
    emitter: Emitter,
    groupings: HashMap<String, &'a Element>,
    /// Groupings currently being expanded, for cycle detection
    expanding: Vec<String>,
}

impl<'a> Walker<'a> {
    fn walk_children(
        &mut self,
        parent: &'a Element,
        parent_path: &str,
    ) -> Result<(), FlattenError> {
        for child in &parent.children {
            if child.foreign {
                continue;
            }
            match child.keyword.as_str() {
                "container" | "list" | "leaf" | "leaf-list" | "anydata" | "anyxml" => {
                    self.walk_data_node(child, parent_path)?;
                }
                "choice" | "case" => self.walk_children(child, parent_path)?,
                "uses" => self.expand_uses(child, parent_path)?,
                // grouping, typedef, rpc, notification, augment, etc.
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_data_node(
        &mut self,
        element: &'a Element,
        parent_path: &str,
    ) -> Result<(), FlattenError> {
        let Some(kind) = NodeKind::from_keyword(&element.keyword) else {
            return Ok(());
        };
        let name = element.attr("name").unwrap_or_default();
        if !valid_segment(name) {
            return Err(self.emitter.error(
                Some(element.offset),
                parent_path,
                format!("<{}> has invalid or missing name '{}'", element.keyword, name),
            ));
        }

        let path = join_path(parent_path, name);
        let mut node = Node::new(path.clone(), kind).with_description(element.description());
        if let Some(type_name) = element.child("type").and_then(|t| t.attr("name")) {
            node = node.with_type(type_name);
        }
        if let Some(keys) = element.child("key").and_then(|k| k.attr("value")) {
            node = node.with_keys(split_keys(keys));
        }

        self.emitter.emit(node, Some(element.offset));

        if kind != NodeKind::Leaf {
            self.walk_children(element, &path)?;
        }
        Ok(())
    }

    fn expand_uses(&mut self, uses: &'a Element, parent_path: &str) -> Result<(), FlattenError> {
        let reference = uses.attr("name").unwrap_or_default();
        let name = local_name(reference).to_string();

        let Some(grouping) = self.groupings.get(&name).copied() else {
            return Err(self.emitter.error(
                Some(uses.offset),
                parent_path,
                format!("uses unknown grouping '{}'", reference),
            ));
        };
        if self.expanding.contains(&name) {
            return Err(self.emitter.error(
                Some(uses.offset),
                parent_path,
                format!("grouping '{}' uses itself", name),
            ));
        }

        self.expanding.push(name);
        let result = self.walk_children(grouping, parent_path);
        self.expanding.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::FlattenWarning;

    const MODULE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<module name="nokia-state"
        xmlns="urn:ietf:params:xml:ns:yang:yin:1"
        xmlns:sros-ext="urn:nokia.com:sros:ns:yang:sr:extensions">
  <namespace uri="urn:nokia.com:sros:ns:yang:sr:state"/>
  <prefix value="state"/>
  <grouping name="stats">
    <leaf name="packets">
      <type name="yang:counter64"/>
    </leaf>
  </grouping>
  <container name="state">
    <description><text>Operational state</text></description>
    <container name="qos">
      <list name="sap-egress">
        <key value="sap-egress-policy-name"/>
        <sros-ext:sros-ext-note value="ignored"/>
        <leaf name="sap-egress-policy-name">
          <type name="types-sros:named-item"/>
          <description>
            <text>Name of the SAP egress policy</text>
          </description>
        </leaf>
        <choice name="rate-mode">
          <case name="pir">
            <leaf name="pir"><type name="int32"/></leaf>
          </case>
        </choice>
        <uses name="state:stats"/>
      </list>
    </container>
  </container>
</module>"#;

    #[test]
    fn test_yin_paths() {
        let out = flatten_yin(MODULE, "nokia-state.yin").unwrap();
        let paths: Vec<_> = out.paths().collect();
        assert_eq!(
            paths,
            vec![
                "/state",
                "/state/qos",
                "/state/qos/sap-egress",
                "/state/qos/sap-egress/sap-egress-policy-name",
                "/state/qos/sap-egress/pir",
                "/state/qos/sap-egress/packets",
            ]
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_yin_metadata() {
        let out = flatten_yin(MODULE, "nokia-state.yin").unwrap();
        assert_eq!(out.nodes[0].description, "Operational state");
        assert_eq!(out.nodes[2].kind, NodeKind::List);
        assert_eq!(out.nodes[2].keys, vec!["sap-egress-policy-name"]);
        assert_eq!(out.nodes[3].base_type, "types-sros:named-item");
        assert_eq!(out.nodes[3].description, "Name of the SAP egress policy");
        assert_eq!(out.nodes[5].base_type, "yang:counter64");
    }

    #[test]
    fn test_yin_missing_key_warns() {
        let xml = r#"<module name="m">
  <container name="state">
    <list name="log">
      <leaf name="id"><type name="string"/></leaf>
    </list>
  </container>
</module>"#;
        let out = flatten_yin(xml, "m.yin").unwrap();
        assert_eq!(out.nodes.len(), 3);
        assert!(matches!(
            &out.warnings[0],
            FlattenWarning::MissingKey(w) if w.path == "/state/log"
        ));
    }

    #[test]
    fn test_yin_anydata_is_leaf() {
        let xml = r#"<module name="m">
  <container name="state">
    <anydata name="payload"/>
    <anyxml name="blob"><description><text>Opaque</text></description></anyxml>
  </container>
</module>"#;
        let out = flatten_yin(xml, "m.yin").unwrap();
        let paths: Vec<_> = out.paths().collect();
        assert_eq!(paths, vec!["/state", "/state/payload", "/state/blob"]);
        assert!(out.nodes[1..].iter().all(|n| n.kind == NodeKind::Leaf));
        assert_eq!(out.nodes[2].description, "Opaque");
    }

    #[test]
    fn test_yin_malformed_fails() {
        let xml = r#"<module name="m"><container name="state"></leaf></module>"#;
        let err = flatten_yin(xml, "m.yin").unwrap_err();
        assert_eq!(err.location.source, "m.yin");
        assert!(err.location.position.is_some());
    }

    #[test]
    fn test_yin_truncated_fails() {
        let xml = r#"<module name="m"><container name="state">"#;
        assert!(flatten_yin(xml, "m.yin").is_err());
    }

    #[test]
    fn test_yin_requires_module_root() {
        let err = flatten_yin(r#"<container name="state"/>"#, "m.yin").unwrap_err();
        assert!(err.message.contains("module"));
    }

    #[test]
    fn test_yin_unknown_grouping_fails() {
        let xml = r#"<module name="m">
  <container name="state"><uses name="missing"/></container>
</module>"#;
        let err = flatten_yin(xml, "m.yin").unwrap_err();
        assert!(err.message.contains("missing"));
        assert_eq!(err.location.node_path.as_deref(), Some("/state"));
    }

    #[test]
    fn test_yin_recursive_grouping_fails() {
        let xml = r#"<module name="m">
  <grouping name="g">
    <container name="c"><uses name="g"/></container>
  </grouping>
  <container name="state"><uses name="g"/></container>
</module>"#;
        assert!(flatten_yin(xml, "m.yin").is_err());
    }
}
