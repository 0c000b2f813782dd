use serde::Serialize;

/// One node of a hierarchical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Flat text value.
    Scalar(String),
    /// Named sub-record with ordered keys.
    Group(Entry),
    /// Multi-valued group; each element is a separate node.
    Collection(Vec<Node>),
}

impl Node {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Entry> {
        match self {
            Node::Group(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Node]> {
        match self {
            Node::Collection(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// True when the node carries no data: an empty group or collection.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Scalar(_) => false,
            Node::Group(entry) => entry.is_empty(),
            Node::Collection(items) => items.iter().all(Node::is_empty),
        }
    }

    /// Short name of the node shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Group(_) => "group",
            Node::Collection(_) => "collection",
        }
    }
}

/// Generic hierarchical record produced by a record source.
///
/// Scalar nodes are the simple fields, groups and collections the complex
/// fields. Field order follows the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Entry {
    fields: Vec<(String, Node)>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an entry from ordered fields. A repeated key keeps its first
    /// position and its last value.
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        let mut entry = Entry::new();
        for (key, node) in fields {
            entry.insert(key, node);
        }
        entry
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, node: Node) {
        let key = key.into();
        match self.fields.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = node,
            None => self.fields.push((key, node)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, node)| node)
    }

    pub fn simple(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_scalar)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Scalar fields in source order.
    pub fn simple_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(name, node)| node.as_scalar().map(|value| (name.as_str(), value)))
    }

    /// Group and collection fields in source order.
    pub fn complex_fields(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields
            .iter()
            .filter(|(_, node)| !matches!(node, Node::Scalar(_)))
            .map(|(name, node)| (name.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Convenience builder for tests and in-memory sources.
#[derive(Debug, Default)]
pub struct EntryBuilder {
    entry: Entry,
}

impl EntryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry.insert(key, Node::Scalar(value.into()));
        self
    }

    pub fn group(mut self, key: impl Into<String>, entry: Entry) -> Self {
        self.entry.insert(key, Node::Group(entry));
        self
    }

    pub fn collection(mut self, key: impl Into<String>, items: Vec<Node>) -> Self {
        self.entry.insert(key, Node::Collection(items));
        self
    }

    pub fn node(mut self, key: impl Into<String>, node: Node) -> Self {
        self.entry.insert(key, node);
        self
    }

    pub fn build(self) -> Entry {
        self.entry
    }
}
