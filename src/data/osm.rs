use std::collections::HashMap;

/// Element kinds found at the top level of an .osm document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_tag_name(name: &[u8]) -> Option<Self> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            b"relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub key: String,
    pub value: String,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Annotation {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A node, way or relation as read from the document. Owns all of its data,
/// nothing here points back into the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub attributes: HashMap<String, String>,
    pub annotations: Vec<Annotation>,
    pub node_refs: Vec<String>,
}

impl RawElement {
    pub fn new(kind: ElementKind) -> Self {
        RawElement {
            kind,
            attributes: HashMap::new(),
            annotations: Vec::new(),
            node_refs: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[cfg(test)]
impl RawElement {
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.push(Annotation::new(key, value));
        self
    }

    pub fn with_node_ref(mut self, node_id: &str) -> Self {
        self.node_refs.push(node_id.to_string());
        self
    }

    pub fn child_count(&self) -> usize {
        self.annotations.len() + self.node_refs.len()
    }
}
