//! Flat path listings
//!
//! The CSV written by `pyang -f flatten`: an optional header row, then one
//! absolute path per line. Recognised columns are `xpath`, `keyword`, `type`
//! (or `data_type`, `primitive_type`) and `description`; any others are
//! ignored.
//!
//! ```text
//! xpath,keyword,type,description
//! /nokia-state:state,container,,"Operational state of the system"
//! /nokia-state:state/port[port-id],list,,
//! /nokia-state:state/port[port-id]/port-id,leaf,types-sros:port,
//! ```
//!
//! Module prefixes are stripped from every segment and key names are read
//! from `[...]` predicates. Ancestors without a row of their own are filled
//! in as containers, or as lists when a predicate names their keys. Without a
//! `keyword` column a row is a leaf unless other rows hang below it.

use std::collections::{HashMap, HashSet};

use super::{join_path, valid_segment, Emitter, Flattened};
use crate::error::FlattenError;
use crate::node::{Node, NodeKind};

/// Statements that never contribute a path segment
const TRANSPARENT: [&str; 2] = ["choice", "case"];

/// Statements whose subtree is not part of the data tree
const OUTSIDE_DATA_TREE: [&str; 3] = ["rpc", "action", "notification"];

/// Column positions; without a header the path is the only column
#[derive(Debug, Default, PartialEq)]
struct Columns {
    path: usize,
    keyword: Option<usize>,
    type_name: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let find = |names: &[&str]| {
            names.iter().find_map(|name| {
                fields
                    .iter()
                    .position(|f| f.trim().eq_ignore_ascii_case(name))
            })
        };
        Some(Self {
            path: find(&["xpath", "path"])?,
            keyword: find(&["keyword"]),
            type_name: find(&["type", "data_type", "primitive_type"]),
            description: find(&["description"]),
        })
    }
}

#[derive(Debug, PartialEq)]
struct Segment {
    name: String,
    keys: Vec<String>,
}

/// A row, or an ancestor that only appeared inside other rows' paths
#[derive(Debug)]
struct Entry {
    path: String,
    kind: Option<NodeKind>,
    keys: Vec<String>,
    type_name: String,
    description: String,
    line: usize,
    explicit: bool,
}

impl Entry {
    fn implicit(path: String, keys: Vec<String>, line: usize) -> Self {
        Self {
            path,
            kind: None,
            keys,
            type_name: String::new(),
            description: String::new(),
            line,
            explicit: false,
        }
    }
}

pub(crate) fn flatten_flat_paths(text: &str, source: &str) -> Result<Flattened, FlattenError> {
    let mut emitter = Emitter::new(source);
    let mut columns = Columns::default();
    let mut entries: Vec<Entry> = Vec::new();
    // path -> index of its latest entry
    let mut by_path: HashMap<String, usize> = HashMap::new();
    // roots of rpc/notification subtrees
    let mut excluded: Vec<String> = Vec::new();
    let mut seen_row = false;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields = split_fields(line).map_err(|msg| emitter.error(Some(lineno), "", msg))?;

        let first_row = !seen_row;
        seen_row = true;
        if first_row && !line.starts_with('/') {
            columns = Columns::from_header(&fields)
                .ok_or_else(|| emitter.error(Some(lineno), "", "header has no xpath column"))?;
            continue;
        }
        if !line.contains('/') {
            continue;
        }

        let field = |column: Option<usize>| {
            column
                .and_then(|i| fields.get(i))
                .map(|f| f.trim())
                .unwrap_or_default()
        };

        let raw_path = field(Some(columns.path));
        if !raw_path.starts_with('/') {
            return Err(emitter.error(
                Some(lineno),
                "",
                format!("expected an absolute path, found '{}'", raw_path),
            ));
        }
        let segments = parse_path(raw_path).map_err(|msg| emitter.error(Some(lineno), "", msg))?;
        let Some((last, ancestors)) = segments.split_last() else {
            return Err(emitter.error(Some(lineno), "", "empty path"));
        };
        let path = segments
            .iter()
            .fold(String::new(), |parent, s| join_path(&parent, &s.name));

        if excluded
            .iter()
            .any(|root| path == *root || path.starts_with(&format!("{}/", root)))
        {
            continue;
        }

        let keyword = field(columns.keyword);
        if OUTSIDE_DATA_TREE.contains(&keyword) {
            excluded.push(path);
            continue;
        }
        if TRANSPARENT.contains(&keyword) {
            continue;
        }
        let kind = match keyword {
            "" => None,
            keyword => Some(NodeKind::from_keyword(keyword).ok_or_else(|| {
                emitter.error(
                    Some(lineno),
                    &path,
                    format!("unknown node kind '{}'", keyword),
                )
            })?),
        };

        let mut parent = String::new();
        for segment in ancestors {
            parent = join_path(&parent, &segment.name);
            match by_path.get(&parent) {
                Some(&i) => {
                    if entries[i].keys.is_empty() {
                        entries[i].keys = segment.keys.clone();
                    }
                }
                None => {
                    by_path.insert(parent.clone(), entries.len());
                    entries.push(Entry::implicit(parent.clone(), segment.keys.clone(), lineno));
                }
            }
        }

        let mut entry = Entry {
            path: path.clone(),
            kind,
            keys: last.keys.clone(),
            type_name: field(columns.type_name).to_string(),
            description: field(columns.description).to_string(),
            line: lineno,
            explicit: true,
        };
        match by_path.get(&path) {
            // a filled-in ancestor gets its own row later: update in place
            Some(&i) if !entries[i].explicit => {
                if entry.keys.is_empty() {
                    entry.keys = std::mem::take(&mut entries[i].keys);
                }
                entries[i] = entry;
            }
            _ => {
                by_path.insert(path, entries.len());
                entries.push(entry);
            }
        }
    }

    let parents: HashSet<&str> = entries
        .iter()
        .filter_map(|e| e.path.rsplit_once('/').map(|(parent, _)| parent))
        .collect();

    for entry in &entries {
        let has_children = parents.contains(entry.path.as_str());
        let kind = match entry.kind {
            Some(NodeKind::Leaf) if has_children => {
                return Err(emitter.error(
                    Some(entry.line),
                    &entry.path,
                    "leaf nodes cannot have children",
                ));
            }
            Some(kind) => kind,
            None if !has_children => NodeKind::Leaf,
            None if entry.keys.is_empty() => NodeKind::Container,
            None => NodeKind::List,
        };

        let node = Node::new(entry.path.clone(), kind)
            .with_description(entry.description.clone())
            .with_type(entry.type_name.clone())
            .with_keys(entry.keys.clone());
        emitter.emit(node, Some(entry.line));
    }

    Ok(emitter.finish())
}

/// Split a CSV row, honouring `"..."` fields with `""` escapes
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

/// Split an absolute xpath on `/` outside predicates
fn parse_path(raw: &str) -> Result<Vec<Segment>, String> {
    let mut parts = Vec::new();
    let mut start = 1;
    let mut depth = 0usize;

    for (i, c) in raw.char_indices().skip(1) {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1).ok_or("unbalanced ']' in path")?,
            '/' if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '[' in path".to_string());
    }
    parts.push(&raw[start..]);

    parts.into_iter().map(parse_segment).collect()
}

/// `prefix:name[k1][k2=v]` -> name plus key names
fn parse_segment(text: &str) -> Result<Segment, String> {
    let (head, mut rest) = match text.find('[') {
        Some(i) => text.split_at(i),
        None => (text, ""),
    };
    let name = local_name(head);
    if !valid_segment(name) {
        return Err(format!("invalid path segment '{}'", text));
    }

    let mut keys = Vec::new();
    while let Some(body) = rest.strip_prefix('[') {
        let Some(end) = body.find(']') else {
            return Err(format!("unterminated predicate in '{}'", text));
        };
        let predicate = &body[..end];
        match predicate.split_once('=') {
            Some((key, _)) => keys.push(local_name(key.trim()).to_string()),
            None => keys.extend(predicate.split_whitespace().map(|k| local_name(k).to_string())),
        }
        rest = &body[end + 1..];
    }
    if !rest.is_empty() {
        return Err(format!("unexpected '{}' after predicate in '{}'", rest, text));
    }

    keys.retain(|k| !k.is_empty());
    Ok(Segment {
        name: name.to_string(),
        keys,
    })
}

fn local_name(s: &str) -> &str {
    s.split_once(':').map_or(s, |(_, local)| local)
}
