use crate::algorithm::{self, Line};
use anyhow::Result;
use log::{debug, warn};
use std::collections::HashMap;

/// Highway classes a car can be matched onto.
pub const DRIVABLE_HIGHWAYS: [&str; 14] = [
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "service",
    "motorway_link",
    "trunk_link",
    "primary_link",
    "secondary_link",
    "tertiary_link",
    "living_street",
];

/**
 * Road network held in memory, read from a geojson FeatureCollection of
 * LineStrings.
 */
pub struct Network {
    edges_index: HashMap<String, usize>, // edge id -> index
    nodes_index: HashMap<String, usize>, // node id -> index
    pub edges: Vec<Edge>,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    id: String,
    from: String,
    to: String,
    length: f64, // meters
    oneway: bool,
    name: String,
    geometry: Line,
}

impl Edge {
    pub fn new(
        id: String,
        from: String,
        to: String,
        oneway: bool,
        name: String,
        geometry: Line,
    ) -> Self {
        Edge {
            id,
            from,
            to,
            length: geometry.length(),
            oneway,
            name,
            geometry,
        }
    }
}

impl Edge {
    pub fn get_from_node(&self) -> &str {
        &self.from
    }

    pub fn get_edge_id(&self) -> &str {
        &self.id
    }

    pub fn get_to_node(&self) -> &str {
        &self.to
    }

    pub fn get_length(&self) -> f64 {
        self.length
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_geometry(&self) -> &Line {
        &self.geometry
    }

    // return min, max corners
    pub fn get_geom_rect(&self) -> (algorithm::Point, algorithm::Point) {
        self.geometry.bbox()
    }
}

fn property_id(properties: &geojson::JsonObject, key: &str) -> Result<String> {
    match properties.get(key) {
        Some(v) if v.is_i64() || v.is_u64() => Ok(v.to_string()),
        Some(v) if v.is_string() => Ok(v.as_str().unwrap_or_default().to_string()),
        _ => Err(anyhow::anyhow!("feature property {} missing", key)),
    }
}

fn property_oneway(properties: &geojson::JsonObject) -> bool {
    match properties.get("oneway") {
        Some(v) if v.is_boolean() => v.as_bool().unwrap_or(false),
        Some(v) if v.is_string() => matches!(v.as_str(), Some("yes") | Some("true") | Some("1")),
        Some(v) if v.is_i64() => v.as_i64() == Some(1),
        _ => false,
    }
}

fn is_drivable(properties: &geojson::JsonObject) -> bool {
    match properties.get("highway").and_then(|v| v.as_str()) {
        Some(class) => DRIVABLE_HIGHWAYS.contains(&class),
        None => true,
    }
}

impl TryFrom<geojson::GeoJson> for Network {
    type Error = anyhow::Error;
    fn try_from(value: geojson::GeoJson) -> std::result::Result<Self, Self::Error> {
        let mut network = Network {
            edges_index: HashMap::new(),
            nodes_index: HashMap::new(),
            edges: Vec::new(),
            nodes: Vec::new(),
        };
        let feature_collection = match value {
            geojson::GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(anyhow::anyhow!("not a feature collection")),
        };
        let mut skipped = 0;
        for feature in feature_collection.features {
            let (geometry, properties) = match (feature.geometry, feature.properties) {
                (Some(g), Some(p)) => (g, p),
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            if !is_drivable(&properties) {
                skipped += 1;
                continue;
            }
            let geometry: Line = geometry.try_into()?;
            let name = properties
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let edge = Edge::new(
                property_id(&properties, "edge_id")?,
                property_id(&properties, "from_node_id")?,
                property_id(&properties, "to_node_id")?,
                property_oneway(&properties),
                name,
                geometry,
            );
            if network.find_node_by_id(edge.get_from_node()).is_none() {
                network.add_node(edge.from.clone())?;
            }
            if network.find_node_by_id(edge.get_to_node()).is_none() {
                network.add_node(edge.to.clone())?;
            }
            if let Err(e) = network.add_edge(edge) {
                warn!("skip feature: {}", e);
            }
        }
        debug!(
            "network loaded, edges: {}, nodes: {}, skipped features: {}",
            network.edges.len(),
            network.nodes.len(),
            skipped
        );
        if network.edges.is_empty() {
            return Err(anyhow::anyhow!("network has no drivable edge"));
        }
        Ok(network)
    }
}

impl Network {
    pub fn find_edge_by_index(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    pub fn find_edge_by_id(&self, id: &str) -> Option<&Edge> {
        self.edges_index.get(id).map(|index| &self.edges[*index])
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<usize> {
        self.nodes_index.get(id).copied()
    }

    /// 添加node
    pub fn add_node(&mut self, node: String) -> Result<usize> {
        if !self.nodes_index.contains_key(&node) {
            self.nodes.push(node.clone());
            self.nodes_index.insert(node, self.nodes.len() - 1);
            Ok(self.nodes.len() - 1)
        } else {
            Err(anyhow::anyhow!("node already exists"))
        }
    }

    /// 添加edge
    pub fn add_edge(&mut self, edge: Edge) -> Result<usize> {
        if !self.edges_index.contains_key(&edge.id) {
            self.edges_index.insert(edge.id.clone(), self.edges.len());
            self.edges.push(edge);
            Ok(self.edges.len() - 1)
        } else {
            Err(anyhow::anyhow!("edge {} already exists", edge.id))
        }
    }
}
