//! Render graph: per-segment DAG construction.

pub mod builder;
pub mod nodes;

pub use builder::build_graph;
pub use nodes::{Node, NodeId, NodeKind, Port, RenderGraph};
