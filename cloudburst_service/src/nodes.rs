/// Node registry for the cloudburst early-warning deployment.
///
/// Defines the sensor nodes the live generator produces rows for, along with
/// their coordinates and whether they are backed by a physical station.
/// Nodes are static for the lifetime of the process; the registry below is
/// the default deployment and may be replaced by `[[nodes]]` in the config.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Node metadata
// ---------------------------------------------------------------------------

/// Static configuration for a single sensor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier, e.g. "node0".
    pub node_id: String,
    /// WGS84 latitude.
    pub lat: f64,
    /// WGS84 longitude.
    pub lon: f64,
    /// Whether surface readings come from the hardware feed rather than replay.
    #[serde(default)]
    pub hardware: bool,
}

impl Node {
    pub fn new(node_id: &str, lat: f64, lon: f64, hardware: bool) -> Self {
        Self {
            node_id: node_id.to_string(),
            lat,
            lon,
            hardware,
        }
    }
}

/// The five-node demo cluster in the Dehradun foothills, roughly 500 m apart.
/// `node0` is the Raspberry Pi station; the rest replay the Stage-1 dataset.
pub fn default_nodes() -> Vec<Node> {
    vec![
        Node::new("node0", 30.2000, 78.0000, true),
        Node::new("node1", 30.2050, 78.0050, false),
        Node::new("node2", 30.2100, 78.0100, false),
        Node::new("node3", 30.1950, 77.9950, false),
        Node::new("node4", 30.2150, 78.0150, false),
    ]
}

/// Returns the ids of all nodes, in registry order.
pub fn all_node_ids(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(|n| n.node_id.as_str()).collect()
}

/// Looks up a node by id. Returns `None` if not found.
pub fn find_node<'a>(nodes: &'a [Node], node_id: &str) -> Option<&'a Node> {
    nodes.iter().find(|n| n.node_id == node_id)
}

/// The single hardware-backed node, if any.
pub fn hardware_node(nodes: &[Node]) -> Option<&Node> {
    nodes.iter().find(|n| n.hardware)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
