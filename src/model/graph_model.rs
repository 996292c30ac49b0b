use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use super::{Edge, Flag, Model};

/// A state graph that is inconsistent with the flag conventions.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ModelError {
    #[display("flag label '{label}' on non-loop edge {from} -> {to}")]
    FlagOnEdge {
        label: String,
        from: usize,
        to: usize,
    },
    #[display("no state is flagged as start state")]
    MissingStart,
    #[display("{count} states are flagged as start state")]
    MultipleStart { count: usize },
}

/// A [`Model`] over a fixed [`petgraph`] graph whose edge weights are labels.
///
/// Construction checks that flag labels only occur on self-loops and that
/// exactly one state is the start state.
#[derive(Debug, Clone)]
pub struct GraphModel<N = ()> {
    graph: DiGraph<N, String>,
    flags: Vec<u8>,
    start: NodeIndex,
}

impl<N> GraphModel<N> {
    pub fn new(graph: DiGraph<N, String>) -> Result<Self, ModelError> {
        let mut flags = vec![0u8; graph.node_count()];
        for edge in graph.edge_references() {
            if let Some(flag) = Flag::from_label(edge.weight()) {
                if edge.source() != edge.target() {
                    return Err(ModelError::FlagOnEdge {
                        label: edge.weight().clone(),
                        from: edge.source().index(),
                        to: edge.target().index(),
                    });
                }
                flags[edge.source().index()] |= 1 << flag as u8;
            }
        }

        let starts: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter(|(_, bits)| *bits & (1 << Flag::Start as u8) != 0)
            .map(|(i, _)| i)
            .collect();
        let start = match starts.as_slice() {
            [] => return Err(ModelError::MissingStart),
            [start] => NodeIndex::new(*start),
            _ => {
                return Err(ModelError::MultipleStart {
                    count: starts.len(),
                })
            }
        };

        Ok(Self {
            graph,
            flags,
            start,
        })
    }

    pub fn graph(&self) -> &DiGraph<N, String> {
        &self.graph
    }

    pub fn weight(&self, node: NodeIndex) -> Option<&N> {
        self.graph.node_weight(node)
    }

    pub fn start(&self) -> NodeIndex {
        self.start
    }
}

impl GraphModel<()> {
    /// Build a model over nodes `0..node_count` from `(source, target, label)` triples.
    pub fn from_edges<'a>(
        node_count: usize,
        edges: impl IntoIterator<Item = (usize, usize, &'a str)>,
    ) -> Result<Self, ModelError> {
        let mut graph = DiGraph::with_capacity(node_count, 0);
        for _ in 0..node_count {
            graph.add_node(());
        }
        for (source, target, label) in edges {
            graph.add_edge(
                NodeIndex::new(source),
                NodeIndex::new(target),
                label.to_string(),
            );
        }
        Self::new(graph)
    }
}

impl<N> Model for GraphModel<N> {
    type Node = NodeIndex;

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn node_set(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    fn out_edges(&self, node: &NodeIndex) -> impl Iterator<Item = Edge<NodeIndex>> + '_ {
        self.graph.edges(*node).map(|e| Edge {
            source: e.source(),
            target: e.target(),
            label: e.weight().clone(),
        })
    }

    fn is_special(&self, node: &NodeIndex, flag: Flag) -> bool {
        self.flags[node.index()] & (1 << flag as u8) != 0
    }

    fn node_index(&self, node: &NodeIndex) -> usize {
        node.index()
    }

    fn start_index(&self) -> Option<usize> {
        Some(self.start.index())
    }
}
