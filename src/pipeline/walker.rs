//! Walker module - enumerates string leaves of a record
//!
//! Traversal rules:
//! - The starting container sits at depth 0; each nested mapping or sequence is one
//!   level deeper than its parent.
//! - A container deeper than `max_depth` is abandoned with a warning; its siblings are
//!   still visited.
//! - Excluded keys are matched against mapping keys only. Sequence indices are never
//!   excluded, but the elements of a sequence under an excluded key are unreachable.
//! - Leaves are yielded depth-first in document order.

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;

use super::field_path::FieldPath;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkConfig {
    pub excluded_keys: HashSet<String>,
    /// `None` walks without a depth limit
    pub max_depth: Option<usize>,
}

impl WalkConfig {
    pub fn new<I, S>(excluded_keys: I, max_depth: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_keys: excluded_keys.into_iter().map(Into::into).collect(),
            max_depth,
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.excluded_keys.contains(key)
    }

    fn too_deep(&self, depth: usize) -> bool {
        self.max_depth.is_some_and(|max| depth > max)
    }
}

/// A string leaf found during traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub path: FieldPath,
    pub value: &'a str,
}

struct Frame<'a> {
    node: &'a Value,
    path: FieldPath,
    depth: usize,
}

/// Lazy depth-first iterator over the string leaves of a record.
pub struct Walk<'a> {
    config: &'a WalkConfig,
    stack: Vec<Frame<'a>>,
    abandoned: usize,
}

impl<'a> Walk<'a> {
    /// Number of subtrees dropped so far for exceeding the depth limit
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    fn push_children(&mut self, frame: &Frame<'a>) {
        let child_depth = frame.depth + 1;
        match frame.node {
            Value::Object(map) => {
                // reversed so the first key is popped first
                for (key, value) in map.iter().rev() {
                    if self.config.is_excluded(key) {
                        info!("Skipping excluded key: {}", frame.path.key(key.as_str()));
                        continue;
                    }
                    self.stack.push(Frame {
                        node: value,
                        path: frame.path.key(key.as_str()),
                        depth: child_depth,
                    });
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate().rev() {
                    self.stack.push(Frame {
                        node: value,
                        path: frame.path.index(index),
                        depth: child_depth,
                    });
                }
            }
            _ => {}
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            match frame.node {
                Value::String(value) => {
                    return Some(Candidate {
                        path: frame.path,
                        value: value.as_str(),
                    });
                }
                Value::Object(_) | Value::Array(_) => {
                    if self.config.too_deep(frame.depth) {
                        warn!(
                            "Maximum depth {} exceeded at {}, abandoning subtree",
                            self.config.max_depth.unwrap_or_default(),
                            frame.path
                        );
                        self.abandoned += 1;
                        continue;
                    }
                    self.push_children(&frame);
                }
                other => {
                    debug!("Skipping non-string value at {}: {}", frame.path, type_name(other));
                }
            }
        }
        None
    }
}

/// Walk the whole record
pub fn walk<'a>(record: &'a Value, config: &'a WalkConfig) -> Walk<'a> {
    walk_from(record, FieldPath::root(), config)
}

/// Walk the subtree `node`, which lives at `origin` inside its record. Yielded paths are
/// absolute so they can be replaced in the full record.
pub fn walk_from<'a>(node: &'a Value, origin: FieldPath, config: &'a WalkConfig) -> Walk<'a> {
    Walk {
        config,
        stack: vec![Frame {
            node,
            path: origin,
            depth: 0,
        }],
        abandoned: 0,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn paths(record: &Value, config: &WalkConfig) -> Vec<String> {
        walk(record, config).map(|c| c.path.to_string()).collect()
    }

    #[test]
    fn yields_strings_in_document_order() {
        let record = json!({
            "title": "t",
            "count": 3,
            "post": {"img": "https://example.com/a.jpg", "ok": true, "caption": "c"},
            "tail": "z"
        });

        assert_eq!(
            paths(&record, &WalkConfig::default()),
            vec!["title", "post.img", "post.caption", "tail"]
        );
    }

    #[test]
    fn sequences_are_walked_with_indices() {
        let record = json!({"images": ["a", {"url": "b"}, 7, null]});

        assert_eq!(
            paths(&record, &WalkConfig::default()),
            vec!["images[0]", "images[1].url"]
        );
    }

    #[test]
    fn excluded_keys_hide_whole_subtrees() {
        let record = json!({
            "keep": "a",
            "skip": {"deep": "b", "list": ["c"]},
            "nested": {"skip": "d", "other": "e"},
            "items": [{"skip": "f"}, {"fine": "g"}]
        });
        let config = WalkConfig::new(["skip"], None);

        let found = paths(&record, &config);
        assert_eq!(found, vec!["keep", "nested.other", "items[1].fine"]);
        for candidate in walk(&record, &config) {
            assert!(!candidate.path.passes_through("skip"));
        }
    }

    #[test]
    fn depth_limit_abandons_only_the_deep_branch() {
        let record = json!({
            "l0": "root",
            "a": {"l1": "one", "b": {"l2": "two", "c": {"l3": "three"}}},
            "sibling": {"s1": "four"}
        });
        let config = WalkConfig::new(Vec::<String>::new(), Some(2));

        let mut walk = walk(&record, &config);
        let found: Vec<String> = walk.by_ref().map(|c| c.path.to_string()).collect();

        assert_eq!(found, vec!["l0", "a.l1", "a.b.l2", "sibling.s1"]);
        assert_eq!(walk.abandoned(), 1);
    }

    #[test]
    fn sequences_count_as_a_level() {
        let record = json!({"a": [["x"]]});
        let config = WalkConfig::new(Vec::<String>::new(), Some(1));

        let mut walk = walk(&record, &config);
        assert_eq!(walk.next(), None);
        assert_eq!(walk.abandoned(), 1);
    }

    #[test]
    fn zero_depth_only_reads_the_top_level() {
        let record = json!({"a": "x", "b": {"c": "y"}});
        let config = WalkConfig::new(Vec::<String>::new(), Some(0));

        assert_eq!(paths(&record, &config), vec!["a"]);
    }

    #[test]
    fn walk_from_keeps_absolute_paths() {
        let record = json!({"page": {"links": {"img1": "u1"}}});
        let origin = FieldPath::from_keys(["page", "links"]);
        let node = origin.get(&record).unwrap();
        let config = WalkConfig::default();

        let found: Vec<String> = walk_from(node, origin, &config)
            .map(|c| c.path.to_string())
            .collect();
        assert_eq!(found, vec!["page.links.img1"]);
    }

    #[test]
    fn very_deep_records_do_not_overflow_the_stack() {
        let mut record = json!("leaf");
        for _ in 0..1_000 {
            record = json!({ "n": record });
        }
        let config = WalkConfig::default();

        assert_eq!(walk(&record, &config).count(), 1);
    }
}
