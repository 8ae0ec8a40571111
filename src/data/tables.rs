//! Flat records written to the output tables. Column orders here must match the
//! column order of the SQL tables the CSVs are loaded into.

use std::borrow::Cow;

pub const DEFAULT_NODE_ID: &str = "0";
pub const DEFAULT_NODE_LAT: &str = "0.0";
pub const DEFAULT_NODE_LON: &str = "0.0";
pub const DEFAULT_NODE_USER: &str = "default";
pub const DEFAULT_NODE_UID: &str = "0";
pub const DEFAULT_NODE_VERSION: &str = "0";
pub const DEFAULT_NODE_CHANGESET: &str = "0";
pub const DEFAULT_NODE_TIMESTAMP: &str = "2000-01-01T00:00:00Z";

pub const DEFAULT_TAG_TYPE: &str = "regular";

pub const NODE_FIELDS: [&str; 8] = ["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"];
pub const TAG_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_NODE_FIELDS: [&str; 3] = ["id", "node_id", "position"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Nodes,
    NodeTags,
    Ways,
    WayNodes,
    WayTags,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Nodes,
        Table::NodeTags,
        Table::Ways,
        Table::WayNodes,
        Table::WayTags,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::NodeTags => "nodes_tags",
            Table::Ways => "ways",
            Table::WayNodes => "ways_nodes",
            Table::WayTags => "ways_tags",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    /// Name the table is written under until the whole run has succeeded.
    pub fn partial_file_name(&self) -> String {
        format!("{}.csv.partial", self.name())
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Nodes => &NODE_FIELDS,
            Table::NodeTags | Table::WayTags => &TAG_FIELDS,
            Table::Ways => &WAY_FIELDS,
            Table::WayNodes => &WAY_NODE_FIELDS,
        }
    }
}

/// A record that can be written as one row: values come out in column order.
pub trait Row {
    fn values(&self) -> Vec<Cow<'_, str>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedNode {
    pub id: String,
    pub lat: String,
    pub lon: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

impl Default for ShapedNode {
    fn default() -> Self {
        ShapedNode {
            id: DEFAULT_NODE_ID.to_string(),
            lat: DEFAULT_NODE_LAT.to_string(),
            lon: DEFAULT_NODE_LON.to_string(),
            user: DEFAULT_NODE_USER.to_string(),
            uid: DEFAULT_NODE_UID.to_string(),
            version: DEFAULT_NODE_VERSION.to_string(),
            changeset: DEFAULT_NODE_CHANGESET.to_string(),
            timestamp: DEFAULT_NODE_TIMESTAMP.to_string(),
        }
    }
}

impl Row for ShapedNode {
    fn values(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.id.as_str()),
            Cow::Borrowed(self.lat.as_str()),
            Cow::Borrowed(self.lon.as_str()),
            Cow::Borrowed(self.user.as_str()),
            Cow::Borrowed(self.uid.as_str()),
            Cow::Borrowed(self.version.as_str()),
            Cow::Borrowed(self.changeset.as_str()),
            Cow::Borrowed(self.timestamp.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedWay {
    pub id: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

impl Row for ShapedWay {
    fn values(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.id.as_str()),
            Cow::Borrowed(self.user.as_str()),
            Cow::Borrowed(self.uid.as_str()),
            Cow::Borrowed(self.version.as_str()),
            Cow::Borrowed(self.changeset.as_str()),
            Cow::Borrowed(self.timestamp.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WayNodeRef {
    pub way_id: String,
    pub node_id: String,
    pub position: usize,
}

impl Row for WayNodeRef {
    fn values(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.way_id.as_str()),
            Cow::Borrowed(self.node_id.as_str()),
            Cow::Owned(self.position.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub owner_id: String,
    pub key: String,
    pub value: String,
    pub tag_type: String,
}

impl Row for TagRecord {
    fn values(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.owner_id.as_str()),
            Cow::Borrowed(self.key.as_str()),
            Cow::Borrowed(self.value.as_str()),
            Cow::Borrowed(self.tag_type.as_str()),
        ]
    }
}

/// Everything one source element turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedElement {
    Node {
        node: ShapedNode,
        tags: Vec<TagRecord>,
    },
    Way {
        way: ShapedWay,
        nodes: Vec<WayNodeRef>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn element_type(&self) -> &'static str {
        match self {
            ShapedElement::Node { .. } => "node",
            ShapedElement::Way { .. } => "way",
        }
    }

    /// Every row of the element, paired with the table it belongs to.
    pub fn rows(&self) -> Vec<(Table, &dyn Row)> {
        match self {
            ShapedElement::Node { node, tags } => {
                let mut rows: Vec<(Table, &dyn Row)> = vec![(Table::Nodes, node as &dyn Row)];
                rows.extend(tags.iter().map(|tag| (Table::NodeTags, tag as &dyn Row)));
                rows
            },
            ShapedElement::Way { way, nodes, tags } => {
                let mut rows: Vec<(Table, &dyn Row)> = vec![(Table::Ways, way as &dyn Row)];
                rows.extend(nodes.iter().map(|node| (Table::WayNodes, node as &dyn Row)));
                rows.extend(tags.iter().map(|tag| (Table::WayTags, tag as &dyn Row)));
                rows
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_matches_its_table_width() {
        let element = ShapedElement::Way {
            way: ShapedWay {
                id: "7".to_string(),
                user: "ana".to_string(),
                uid: "1".to_string(),
                version: "2".to_string(),
                changeset: "3".to_string(),
                timestamp: DEFAULT_NODE_TIMESTAMP.to_string(),
            },
            nodes: vec![WayNodeRef { way_id: "7".to_string(), node_id: "1".to_string(), position: 0 }],
            tags: vec![TagRecord {
                owner_id: "7".to_string(),
                key: "highway".to_string(),
                value: "residential".to_string(),
                tag_type: DEFAULT_TAG_TYPE.to_string(),
            }],
        };

        let rows = element.rows();
        assert_eq!(rows.len(), 3);
        for (table, row) in rows {
            assert_eq!(row.values().len(), table.columns().len(), "{}", table.name());
        }
    }

    #[test]
    fn default_node_uses_documented_values() {
        let values: Vec<String> = ShapedNode::default().values().into_iter().map(|v| v.into_owned()).collect();
        assert_eq!(
            values,
            vec!["0", "0.0", "0.0", "default", "0", "0", "0", "2000-01-01T00:00:00Z"]
        );
    }
}
