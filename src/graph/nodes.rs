//! Render graph node types: typed ports, a small set of node kinds, and the
//! DAG container itself. Generalizes the teacher's `RenderPlan`/`Pass`/
//! `SurfaceId` idiom (integer-handle nodes, enum-tagged pass kinds) to a
//! graph with named, typed connections instead of a flat pass list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::timeline::model::TransitionKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// The four port data kinds a connection can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Image,
    Scalar,
    Vector,
    Color,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub ty: PortType,
}

/// A resolved value flowing into a port at graph-construction time (scalars
/// used for e.g. tone-map parameters); image ports just carry the upstream
/// node id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeValue {
    Scalar(f64),
    Vector(f64, f64),
    Color(f64, f64, f64, f64),
    String(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NodeKind {
    /// A clip's source frame: `{asset_id, source_start_seconds, duration_seconds}`.
    Source {
        asset_id: String,
        source_start_seconds: f64,
        duration_seconds: f64,
    },
    Transition {
        transition_kind: TransitionKind,
        progress: f64,
    },
    /// Additive stack composite of N image inputs, in z-order.
    Composite,
    /// `{Density, Color}` named-port volumetric composite.
    VolumetricComposite,
    /// Named input ports, one per filter band, with a fixed artistic palette.
    MultiChannelComposite { band_colors: BTreeMap<String, [f32; 3]> },
    ToneMap {
        black_point: f64,
        white_point: f64,
        gamma: f64,
    },
    AcesOutput,
    Output,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub properties: BTreeMap<String, NodeValue>,
    /// port name -> (producer node, producer output port name)
    pub inputs: BTreeMap<String, (NodeId, String)>,
    pub outputs: Vec<Port>,
}

impl Node {
    pub fn connect(&mut self, port: &str, from: NodeId, from_port: &str) -> ExportResult<()> {
        if !self.input_port_names().contains(&port.to_string()) {
            return Err(ExportError::validation(format!(
                "node {:?} has no input port '{}'",
                self.id, port
            )));
        }
        self.inputs.insert(port.to_string(), (from, from_port.to_string()));
        Ok(())
    }

    fn input_port_names(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Source { .. } => vec![],
            NodeKind::Transition { .. } => vec!["a".into(), "b".into()],
            NodeKind::Composite => (0..self.inputs.len().max(8))
                .map(|i| format!("layer{i}"))
                .collect(),
            NodeKind::VolumetricComposite => vec!["Density".into(), "Color".into()],
            NodeKind::MultiChannelComposite { band_colors } => {
                band_colors.keys().cloned().collect()
            }
            NodeKind::ToneMap { .. } => vec!["source".into()],
            NodeKind::AcesOutput => vec!["source".into()],
            NodeKind::Output => vec!["source".into()],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RenderGraph {
    nodes: BTreeMap<u32, Node>,
    next_id: u32,
    pub output: Option<NodeId>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            output: None,
        }
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let outputs = match &kind {
            NodeKind::Output => vec![],
            _ => vec![Port {
                name: "out".into(),
                ty: match kind {
                    NodeKind::ToneMap { .. } | NodeKind::AcesOutput => PortType::Color,
                    _ => PortType::Image,
                },
            }],
        };
        let is_output = matches!(kind, NodeKind::Output);
        self.nodes.insert(
            id.0,
            Node {
                id,
                kind,
                properties: BTreeMap::new(),
                inputs: BTreeMap::new(),
                outputs,
            },
        );
        if is_output {
            self.output = Some(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id.0)
    }

    pub fn connect(&mut self, to: NodeId, port: &str, from: NodeId, from_port: &str) -> ExportResult<()> {
        if !self.nodes.contains_key(&from.0) {
            return Err(ExportError::validation(format!(
                "connect: source node {:?} does not exist",
                from
            )));
        }
        let node = self
            .nodes
            .get_mut(&to.0)
            .ok_or_else(|| ExportError::validation(format!("connect: node {:?} does not exist", to)))?;
        node.connect(port, from, from_port)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Topological order via Kahn's algorithm, rooted at every node with no
    /// outstanding consumer dependency issue; fails if a cycle is detected
    /// (the graph must be acyclic by construction).
    pub fn topological_order(&self) -> ExportResult<Vec<NodeId>> {
        let mut incoming: BTreeMap<u32, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for node in self.nodes.values() {
            *incoming.entry(node.id.0).or_insert(0) += node.inputs.len();
        }

        let mut ready: Vec<u32> = incoming
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();
        ready.sort_unstable();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut consumed = incoming;

        while let Some(id) = ready.pop() {
            order.push(NodeId(id));
            // any node consuming `id`'s output becomes one step closer to ready
            for (other_id, other) in &self.nodes {
                if order.iter().any(|o| o.0 == *other_id) {
                    continue;
                }
                if other.inputs.values().any(|(from, _)| from.0 == id) {
                    if let Some(c) = consumed.get_mut(other_id) {
                        *c = c.saturating_sub(1);
                        if *c == 0 && !ready.contains(other_id) {
                            ready.push(*other_id);
                        }
                    }
                }
            }
            ready.sort_unstable();
        }

        if order.len() != self.nodes.len() {
            return Err(ExportError::validation("render graph contains a cycle"));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topological_order_respects_dependencies() {
        let mut g = RenderGraph::new();
        let src = g.add_node(NodeKind::Source {
            asset_id: "a".into(),
            source_start_seconds: 0.0,
            duration_seconds: 1.0,
        });
        let tone = g.add_node(NodeKind::ToneMap {
            black_point: 0.0,
            white_point: 1.0,
            gamma: 2.8,
        });
        let out = g.add_node(NodeKind::Output);
        g.connect(tone, "source", src, "out").unwrap();
        g.connect(out, "source", tone, "out").unwrap();

        let order = g.topological_order().unwrap();
        let pos = |id: NodeId| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(src) < pos(tone));
        assert!(pos(tone) < pos(out));
    }

    #[test]
    fn connect_rejects_unknown_port() {
        let mut g = RenderGraph::new();
        let src = g.add_node(NodeKind::Source {
            asset_id: "a".into(),
            source_start_seconds: 0.0,
            duration_seconds: 1.0,
        });
        let out = g.add_node(NodeKind::Output);
        assert!(g.connect(out, "nonexistent", src, "out").is_err());
    }
}
