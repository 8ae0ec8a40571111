use log::warn;

use crate::audit::{normalize_postcode, normalize_road_type};
use crate::data::osm::{Annotation, ElementKind, RawElement};
use crate::data::tables::{ShapedElement, ShapedNode, ShapedWay, TagRecord, WayNodeRef, WAY_FIELDS};
use crate::errors::{Error, ErrorKind, Result};
use crate::tags::decompose;

/// Turns one raw element into its table rows. Relations are not shaped.
pub fn shape(element: &RawElement) -> Result<Option<ShapedElement>> {
    match element.kind {
        ElementKind::Node => Ok(Some(shape_node(element))),
        ElementKind::Way => shape_way(element).map(Some),
        ElementKind::Relation => Ok(None),
    }
}

fn shape_node(element: &RawElement) -> ShapedElement {
    let defaults = ShapedNode::default();
    let attribute_or = |name: &str, default: String| {
        element.attribute(name).map(str::to_string).unwrap_or(default)
    };

    let node = ShapedNode {
        id: attribute_or("id", defaults.id),
        lat: attribute_or("lat", defaults.lat),
        lon: attribute_or("lon", defaults.lon),
        user: attribute_or("user", defaults.user),
        uid: attribute_or("uid", defaults.uid),
        version: attribute_or("version", defaults.version),
        changeset: attribute_or("changeset", defaults.changeset),
        timestamp: attribute_or("timestamp", defaults.timestamp),
    };
    let tags = shape_tags(&node.id, &element.annotations);

    ShapedElement::Node { node, tags }
}

fn shape_way(element: &RawElement) -> Result<ShapedElement> {
    let missing: Vec<&str> = WAY_FIELDS
        .iter()
        .copied()
        .filter(|field| element.attribute(field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Error::new(
            ErrorKind::MissingRequiredField,
            format!(
                "way {} is missing required attributes: {}",
                element.attribute("id").unwrap_or("<no id>"),
                missing.join(", "),
            ),
        ));
    }

    let required = |name: &str| element.attribute(name).unwrap_or_default().to_string();
    let way = ShapedWay {
        id: required("id"),
        user: required("user"),
        uid: required("uid"),
        version: required("version"),
        changeset: required("changeset"),
        timestamp: required("timestamp"),
    };

    let nodes = element.node_refs
        .iter()
        .enumerate()
        .map(|(position, node_id)| WayNodeRef {
            way_id: way.id.clone(),
            node_id: node_id.clone(),
            position,
        })
        .collect();
    let tags = shape_tags(&way.id, &element.annotations);

    Ok(ShapedElement::Way { way, nodes, tags })
}

fn shape_tags(owner_id: &str, annotations: &[Annotation]) -> Vec<TagRecord> {
    annotations
        .iter()
        .map(|annotation| {
            let (tag_type, key) = decompose(&annotation.key);
            let value = normalize_value(owner_id, &key, &annotation.value);
            TagRecord {
                owner_id: owner_id.to_string(),
                key,
                value,
                tag_type,
            }
        })
        .collect()
}

fn normalize_value(owner_id: &str, key: &str, value: &str) -> String {
    match key {
        "tipo_via" => normalize_road_type(value).unwrap_or_else(|err| {
            warn!(owner_id = owner_id, value = value; "Unrecognised road type");
            err.to_string()
        }),
        "postal_code" | "postcode" => normalize_postcode(value),
        _ => value.to_string(),
    }
}
