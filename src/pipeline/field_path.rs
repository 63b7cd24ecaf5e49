use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a record, as the ordered keys/indices leading to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(|k| Segment::Key(k.into())).collect())
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.into()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any mapping key along the path equals `key`
    pub fn passes_through(&self, key: &str) -> bool {
        self.0
            .iter()
            .any(|segment| matches!(segment, Segment::Key(k) if k == key))
    }

    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(record, |node, segment| match segment {
            Segment::Key(k) => node.as_object()?.get(k),
            Segment::Index(i) => node.as_array()?.get(*i),
        })
    }

    pub fn get_mut<'a>(&self, record: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(record, |node, segment| match segment {
            Segment::Key(k) => node.as_object_mut()?.get_mut(k),
            Segment::Index(i) => node.as_array_mut()?.get_mut(*i),
        })
    }

    /// Overwrite the value at this path. Returns `false` when the path no longer exists.
    pub fn replace(&self, record: &mut Value, value: Value) -> bool {
        match self.get_mut(record) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => write!(f, "{}", k)?,
                Segment::Key(k) => write!(f, ".{}", k)?,
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_mixes_keys_and_indices() {
        let path = FieldPath::root().key("post").key("images").index(2).key("url");
        assert_eq!(path.to_string(), "post.images[2].url");
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn replace_writes_through_arrays() {
        let mut record = json!({"a": [{"b": "x"}, {"b": "y"}]});
        let path = FieldPath::root().key("a").index(1).key("b");

        assert!(path.replace(&mut record, json!("z")));
        assert_eq!(record, json!({"a": [{"b": "x"}, {"b": "z"}]}));
    }

    #[test]
    fn replace_on_missing_path_is_a_no_op() {
        let mut record = json!({"a": {"b": "x"}});
        let path = FieldPath::from_keys(["a", "c", "d"]);

        assert!(!path.replace(&mut record, json!("z")));
        assert_eq!(record, json!({"a": {"b": "x"}}));
    }
}
