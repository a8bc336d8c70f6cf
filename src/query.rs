//! Query Engine
//!
//! Exact, closest-match and free-text lookups over a [`ReleaseIndex`].
//! All operations are pure reads.

use std::cmp::Reverse;
use std::sync::OnceLock;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use serde::Serialize;

use crate::error::{IndexError, Result};
use crate::index::ReleaseIndex;
use crate::node::Node;

/// How a query was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Partial,
}

#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub node: &'a Node,
    pub kind: MatchKind,
}

impl Match<'_> {
    pub fn is_partial(&self) -> bool {
        self.kind == MatchKind::Partial
    }
}

/// Fuzzy search result
#[derive(Debug, Clone, Copy)]
pub struct FuzzyHit<'a> {
    pub node: &'a Node,
    pub score: i64,
}

fn predicate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("predicate pattern is valid"))
}

/// Canonicalise a user-supplied path: strip `[key=value]` predicates and
/// `module:` prefixes, drop empty segments, make it absolute.
///
/// `nokia-state:state/qos/sap-egress[sap-egress-policy-name=p1]/` becomes
/// `/state/qos/sap-egress`.
pub fn normalize_path(query: &str) -> String {
    let stripped = predicate_re().replace_all(query.trim(), "");
    let mut out = String::with_capacity(stripped.len() + 1);
    for segment in stripped.split('/').map(str::trim).filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment.rsplit(':').next().unwrap_or(segment));
    }
    out
}

pub struct QueryEngine<'a> {
    index: &'a ReleaseIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a ReleaseIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &'a ReleaseIndex {
        self.index
    }

    /// Exact lookup of the normalised query
    pub fn exact(&self, query: &str) -> Option<&'a Node> {
        self.index.lookup_exact(&normalize_path(query))
    }

    /// Best-effort candidate when no exact path exists.
    ///
    /// Candidates must share at least the first segment with the query.
    /// Ranking: deepest shared segment prefix, then a final-segment name hint
    /// (one name contains the other, case-insensitive) for nodes below the
    /// shared prefix, then shortest path, then lexicographic order.
    pub fn find_partial(&self, query: &str) -> Option<&'a Node> {
        let normalized = normalize_path(query);
        let wanted: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let last = wanted.last()?.to_lowercase();

        self.index
            .nodes()
            .iter()
            .filter_map(|node| {
                let shared = node
                    .segments()
                    .zip(&wanted)
                    .take_while(|(segment, want)| segment == *want)
                    .count();
                if shared == 0 {
                    return None;
                }
                let depth = node.depth();
                let name = node.name().to_lowercase();
                let hinted = depth > shared && (name.contains(&last) || last.contains(&name));
                Some(((Reverse(shared), !hinted, depth, node.path.as_str()), node))
            })
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, node)| node)
    }

    /// Exact match, falling back to [`find_partial`](Self::find_partial).
    pub fn resolve(&self, query: &str) -> Result<Match<'a>> {
        if let Some(node) = self.exact(query) {
            return Ok(Match {
                node,
                kind: MatchKind::Exact,
            });
        }
        self.find_partial(query)
            .map(|node| Match {
                node,
                kind: MatchKind::Partial,
            })
            .ok_or_else(|| IndexError::NotFound {
                query: query.to_string(),
            })
    }

    /// Nodes with any path segment containing `text` (case-insensitive), in
    /// index order, at most `limit`. Blank text matches nothing.
    pub fn search(&self, text: &str, limit: usize) -> Vec<&'a Node> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.index
            .nodes()
            .iter()
            .filter(|node| {
                node.segments()
                    .any(|segment| segment.to_lowercase().contains(&needle))
            })
            .take(limit)
            .collect()
    }

    /// Skim-style fuzzy match against node names and full paths, best first
    pub fn fuzzy_search(&self, text: &str, limit: usize) -> Vec<FuzzyHit<'a>> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut hits: Vec<FuzzyHit<'a>> = self
            .index
            .nodes()
            .iter()
            .filter_map(|node| {
                let by_name = matcher.fuzzy_match(node.name(), text);
                let by_path = matcher.fuzzy_match(&node.path, text);
                by_name.max(by_path).map(|score| FuzzyHit { node, score })
            })
            .collect();

        // stable sort keeps index order between equal scores
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, Variant};

    fn index() -> ReleaseIndex {
        let paths = [
            ("/state", NodeKind::Container),
            ("/state/qos", NodeKind::Container),
            ("/state/qos/sap-egress", NodeKind::List),
            ("/state/qos/sap-egress/sap-egress-policy-name", NodeKind::Leaf),
            ("/state/qos/sap-ingress", NodeKind::List),
            ("/state/qos/sap-ingress/Egress-Override", NodeKind::Leaf),
            ("/state/port", NodeKind::List),
        ];
        ReleaseIndex::from_nodes(
            "r1",
            Variant::State,
            paths.iter().map(|(p, k)| Node::new(*p, *k)).collect(),
        )
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("nokia-state:state/qos/sap-egress[sap-egress-policy-name=p1]/"),
            "/state/qos/sap-egress"
        );
        assert_eq!(normalize_path("/state/port[port-id=1/1/1]/ethernet"), "/state/port/ethernet");
        assert_eq!(normalize_path("//state//qos"), "/state/qos");
        assert_eq!(normalize_path("  "), "");
    }

    #[test]
    fn test_resolve_exact() {
        let index = index();
        let engine = QueryEngine::new(&index);
        let m = engine.resolve("/nokia-state:state/qos/sap-egress").unwrap();
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.node.path, "/state/qos/sap-egress");
    }

    #[test]
    fn test_partial_prefers_deepest_ancestor() {
        let index = index();
        let engine = QueryEngine::new(&index);
        let m = engine.resolve("/state/qos/sap-egress/unknown-leaf").unwrap();
        assert!(m.is_partial());
        assert_eq!(m.node.path, "/state/qos/sap-egress");
    }

    #[test]
    fn test_partial_name_hint() {
        let index = index();
        let engine = QueryEngine::new(&index);
        assert_eq!(
            engine.find_partial("/state/qos/sap-egres").map(|n| n.path.as_str()),
            Some("/state/qos/sap-egress")
        );
        assert_eq!(
            engine.find_partial("/state/qos/policy-name").map(|n| n.path.as_str()),
            Some("/state/qos/sap-egress/sap-egress-policy-name")
        );
    }

    #[test]
    fn test_partial_tie_break_is_deterministic() {
        let idx = ReleaseIndex::from_nodes(
            "r1",
            Variant::State,
            vec![
                Node::new("/a/b/d", NodeKind::Leaf),
                Node::new("/a/b/c", NodeKind::Leaf),
            ],
        );
        let engine = QueryEngine::new(&idx);
        for _ in 0..10 {
            assert_eq!(engine.find_partial("/a/b/x").unwrap().path, "/a/b/c");
        }
    }

    #[test]
    fn test_not_found_without_shared_first_segment() {
        let index = index();
        let engine = QueryEngine::new(&index);
        assert!(matches!(
            engine.resolve("/configure/qos"),
            Err(IndexError::NotFound { query }) if query == "/configure/qos"
        ));
        assert!(engine.resolve("").is_err());
    }

    #[test]
    fn test_search_segments_case_insensitive() {
        let index = index();
        let engine = QueryEngine::new(&index);
        let hits: Vec<_> = engine.search("EGRESS", 100).iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            hits,
            vec![
                "/state/qos/sap-egress",
                "/state/qos/sap-egress/sap-egress-policy-name",
                "/state/qos/sap-ingress/Egress-Override",
            ]
        );
    }

    #[test]
    fn test_search_limit_and_empty() {
        let index = index();
        let engine = QueryEngine::new(&index);
        assert_eq!(engine.search("egress", 1).len(), 1);
        assert!(engine.search("nothing-here", 10).is_empty());
        assert!(engine.search("   ", 10).is_empty());
        // matches are per segment, never across a separator
        assert!(engine.search("qos/sap", 10).is_empty());
    }

    #[test]
    fn test_fuzzy_search() {
        let index = index();
        let engine = QueryEngine::new(&index);
        let hits = engine.fuzzy_search("sapegr", 3);
        assert!(!hits.is_empty());
        assert!(hits.len() <= 3);
        assert!(hits[0].node.path.contains("sap-egress"));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
