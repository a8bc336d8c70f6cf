//! Outline artifacts
//!
//! One schema node per line, nested by two-space indentation:
//!
//! ```text
//! container state
//!   container qos description="QoS state"
//!     list sap-egress key="sap-egress-policy-name"
//!       leaf sap-egress-policy-name type="string"
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use super::{join_path, split_keys, valid_segment, Emitter, Flattened};
use crate::error::FlattenError;
use crate::node::{Node, NodeKind};

const INDENT: usize = 2;

#[derive(Debug, Default, PartialEq)]
struct Line<'a> {
    keyword: &'a str,
    name: &'a str,
    key: Option<String>,
    type_name: Option<String>,
    description: Option<String>,
}

pub(crate) fn flatten_outline(text: &str, source: &str) -> Result<Flattened, FlattenError> {
    let mut emitter = Emitter::new(source);
    // (path, kind) of each open ancestor, outermost first
    let mut stack: Vec<(String, NodeKind)> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let body = raw.trim_start_matches(' ');
        if body.trim().is_empty() || body.starts_with('#') {
            continue;
        }

        let parent_path = stack.last().map(|(p, _)| p.clone()).unwrap_or_default();

        if body.starts_with('\t') {
            return Err(emitter.error(
                Some(lineno),
                &parent_path,
                "tabs are not allowed in indentation",
            ));
        }

        let indent = raw.len() - body.len();
        if indent % INDENT != 0 {
            return Err(emitter.error(
                Some(lineno),
                &parent_path,
                format!("indentation of {} is not a multiple of {}", indent, INDENT),
            ));
        }
        let level = indent / INDENT;
        if level > stack.len() {
            return Err(emitter.error(Some(lineno), &parent_path, "indentation skips a level"));
        }
        stack.truncate(level);

        let parent_path = stack.last().map(|(p, _)| p.clone()).unwrap_or_default();
        if let Some((_, NodeKind::Leaf)) = stack.last() {
            return Err(emitter.error(
                Some(lineno),
                &parent_path,
                "leaf nodes cannot have children",
            ));
        }

        let line = parse_line(body.trim_end())
            .map_err(|msg| emitter.error(Some(lineno), &parent_path, msg))?;

        let Some(kind) = NodeKind::from_keyword(line.keyword) else {
            return Err(emitter.error(
                Some(lineno),
                &parent_path,
                format!("unknown node kind '{}'", line.keyword),
            ));
        };

        let path = join_path(&parent_path, line.name);
        let mut node = Node::new(path.clone(), kind)
            .with_description(line.description.unwrap_or_default());
        if let Some(t) = line.type_name {
            node = node.with_type(t);
        }
        if let Some(k) = line.key {
            node = node.with_keys(split_keys(&k));
        }

        emitter.emit(node, Some(lineno));
        stack.push((path, kind));
    }

    Ok(emitter.finish())
}

fn parse_line(body: &str) -> Result<Line<'_>, String> {
    let (keyword, rest) = split_word(body);
    let (name, mut rest) = split_word(rest);
    if !valid_segment(name) {
        return Err(format!("missing node name after '{}'", keyword));
    }

    let mut line = Line {
        keyword,
        name,
        ..Line::default()
    };

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let Some(eq) = rest.find('=') else {
            return Err(format!("expected attribute=\"value\", found '{}'", rest));
        };
        let attr = rest[..eq].trim();
        let (value, remainder) = parse_quoted(&rest[eq + 1..])?;
        rest = remainder;

        match attr {
            "key" => line.key = Some(value),
            "type" => line.type_name = Some(value),
            "description" => line.description = Some(value),
            other => return Err(format!("unknown attribute '{}'", other)),
        }
    }

    Ok(line)
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Read a `"..."` value honouring `\"` and `\\`; returns (value, remainder).
fn parse_quoted(s: &str) -> Result<(String, &str), String> {
    let Some(body) = s.strip_prefix('"') else {
        return Err("attribute value must be quoted".to_string());
    };

    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &body[i + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            _ => value.push(c),
        }
    }
    Err("unterminated quoted value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::FlattenWarning;

    const OUTLINE: &str = "\
# nokia-state outline
container state
  container qos description=\"QoS \\\"state\\\"\"
    list sap-egress key=\"sap-egress-policy-name\"
      leaf sap-egress-policy-name type=\"string\"

      leaf description type=\"string\"
  container port
    list ethernet
";

    #[test]
    fn test_outline_paths() {
        let out = flatten_outline(OUTLINE, "state.outline").unwrap();
        let paths: Vec<_> = out.paths().collect();
        assert_eq!(
            paths,
            vec![
                "/state",
                "/state/qos",
                "/state/qos/sap-egress",
                "/state/qos/sap-egress/sap-egress-policy-name",
                "/state/qos/sap-egress/description",
                "/state/port",
                "/state/port/ethernet",
            ]
        );
    }

    #[test]
    fn test_outline_attributes() {
        let out = flatten_outline(OUTLINE, "state.outline").unwrap();
        assert_eq!(out.nodes[1].description, "QoS \"state\"");
        assert_eq!(out.nodes[2].keys, vec!["sap-egress-policy-name"]);
        assert_eq!(out.nodes[3].base_type, "string");
        assert!(matches!(
            &out.warnings[0],
            FlattenWarning::MissingKey(w) if w.path == "/state/port/ethernet"
        ));
    }

    #[test]
    fn test_outline_skipped_level_reports_line() {
        let err = flatten_outline("container state\n      leaf x\n", "s.outline").unwrap_err();
        assert_eq!(err.location.position, Some(2));
    }

    #[test]
    fn test_outline_odd_indent() {
        let err = flatten_outline("container state\n   leaf x\n", "s.outline").unwrap_err();
        assert!(err.message.contains("multiple"));
    }

    #[test]
    fn test_outline_leaf_children_rejected() {
        let err = flatten_outline("leaf a\n  leaf b\n", "s.outline").unwrap_err();
        assert_eq!(err.location.position, Some(2));
    }

    #[test]
    fn test_outline_bad_tokens() {
        assert!(flatten_outline("widget state\n", "s").is_err());
        assert!(flatten_outline("container\n", "s").is_err());
        assert!(flatten_outline("leaf a type=string\n", "s").is_err());
        assert!(flatten_outline("leaf a type=\"string\n", "s").is_err());
        assert!(flatten_outline("leaf a units=\"ms\"\n", "s").is_err());
    }
}
