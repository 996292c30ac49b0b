//! The view of an explored state space that the checkers consume.
//!
//! A [`Model`] is read-only: nodes are states, edges are transitions labelled
//! with (the textual form of) the rule application that caused them. Special
//! state properties like "this is the start state" are encoded as self-loops
//! whose label is the text of a [`Flag`].

mod graph_model;

use std::{fmt::Debug, hash::Hash};

use once_cell::sync::Lazy;

pub use graph_model::{GraphModel, ModelError};

use crate::logic::Proposition;

/// Special per-state properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum Flag {
    #[display("start")]
    Start,
    #[display("final")]
    Final,
    #[display("open")]
    Open,
    #[display("result")]
    Result,
}

static FLAG_PROPOSITIONS: Lazy<[Proposition; 4]> =
    Lazy::new(|| Flag::ALL.map(|flag| Proposition::id(flag.label())));

impl Flag {
    pub const ALL: [Flag; 4] = [Flag::Start, Flag::Final, Flag::Open, Flag::Result];

    /// The self-loop label marking a state with this flag.
    pub fn label(self) -> &'static str {
        match self {
            Flag::Start => "start",
            Flag::Final => "final",
            Flag::Open => "open",
            Flag::Result => "result",
        }
    }

    pub fn from_label(label: &str) -> Option<Flag> {
        Flag::ALL.into_iter().find(|flag| flag.label() == label)
    }

    /// The atomic proposition that holds exactly in states carrying this flag.
    pub fn proposition(self) -> &'static Proposition {
        &FLAG_PROPOSITIONS[self as usize]
    }
}

/// A labelled transition of a [`Model`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge<N> {
    pub source: N,
    pub target: N,
    pub label: String,
}

impl<N: PartialEq> Edge<N> {
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// A finite, already explored state graph.
pub trait Model {
    type Node: Clone + Debug + Eq + Hash;

    fn node_count(&self) -> usize;

    fn node_set(&self) -> impl Iterator<Item = Self::Node> + '_;

    /// All outgoing edges of a node, flag self-loops included.
    fn out_edges(&self, node: &Self::Node) -> impl Iterator<Item = Edge<Self::Node>> + '_;

    fn is_special(&self, node: &Self::Node, flag: Flag) -> bool;

    /// Dense, stable index in `0..node_count()`.
    fn node_index(&self, node: &Self::Node) -> usize;

    /// The flag that an edge label stands for, if any.
    fn get_flag(&self, label: &str) -> Option<Flag> {
        Flag::from_label(label)
    }

    /// Index of the start state, for models that know it without a search.
    fn start_index(&self) -> Option<usize> {
        None
    }
}

/// The unique start state of a model.
///
/// Panics if the model has no start state, or more than one.
pub fn start_node<M: Model>(model: &M) -> M::Node {
    if let Some(index) = model.start_index() {
        if let Some(node) = model.node_set().find(|n| model.node_index(n) == index) {
            return node;
        }
    }
    let mut starts = model
        .node_set()
        .filter(|n| model.is_special(n, Flag::Start));
    match (starts.next(), starts.next()) {
        (Some(start), None) => start,
        _ => panic!("model does not have a unique start state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_labels() {
        for flag in Flag::ALL {
            assert_eq!(Flag::from_label(flag.label()), Some(flag));
            assert_eq!(flag.to_string(), flag.label());
            assert_eq!(flag.proposition(), &Proposition::id(flag.label()));
        }
        assert_eq!(Flag::from_label("begin"), None);
    }
}
