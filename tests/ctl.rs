use std::collections::HashMap;

use gtverify::model::Edge;
use gtverify::prelude::*;
use petgraph::graph::{DiGraph, NodeIndex};
use pretty_assertions::assert_eq;

/// Two processes taking turns at a critical section, as an explored state space
/// whose nodes are named.
struct Mutex {
    names: Vec<&'static str>,
    edges: Vec<(usize, usize, &'static str)>,
}

impl Mutex {
    fn new() -> Self {
        let names = vec!["idle", "try0", "try1", "crit0", "crit1"];
        let edges = vec![
            (0, 0, "start"),
            (0, 1, "req(0)"),
            (0, 2, "req(1)"),
            (1, 3, "enter(0)"),
            (2, 4, "enter(1)"),
            (3, 0, "leave(0)"),
            (4, 0, "leave(1)"),
        ];
        Self { names, edges }
    }

    fn index(&self, name: &str) -> usize {
        self.names.iter().position(|n| *n == name).unwrap()
    }
}

impl Model for Mutex {
    type Node = &'static str;

    fn node_count(&self) -> usize {
        self.names.len()
    }

    fn node_set(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }

    fn out_edges(&self, node: &&'static str) -> impl Iterator<Item = Edge<&'static str>> + '_ {
        let source = self.index(node);
        self.edges
            .iter()
            .filter(move |(s, _, _)| *s == source)
            .map(|(s, t, label)| Edge {
                source: self.names[*s],
                target: self.names[*t],
                label: label.to_string(),
            })
    }

    fn is_special(&self, node: &&'static str, flag: Flag) -> bool {
        let index = self.index(node);
        self.edges
            .iter()
            .any(|(s, t, label)| *s == index && *t == index && *label == flag.label())
    }

    fn node_index(&self, node: &&'static str) -> usize {
        self.index(node)
    }
}

fn check(text: &str, model: &Mutex) -> HashMap<&'static str, bool> {
    let formula: Formula = text.parse().unwrap();
    let marker = CtlMarker::new(&formula, model).unwrap();
    model
        .node_set()
        .map(|n| (n, marker.has_node_value(&n, true)))
        .collect()
}

#[test]
fn mutual_exclusion_properties() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let model = Mutex::new();

    let never_both = CtlMarker::new(&"A G !(enter(_) & leave(_))".parse().unwrap(), &model).unwrap();
    assert!(never_both.has_value(true));
    assert_eq!(never_both.count(true), 5);

    let live = CtlMarker::new(&"A G E F enter(1)".parse().unwrap(), &model).unwrap();
    assert!(live.has_value(true));

    // process 1 may keep the section forever
    let fair = CtlMarker::new(&"A F enter(0)".parse().unwrap(), &model).unwrap();
    assert!(fair.has_value(false));
    assert_eq!(fair.states(true).copied().collect::<Vec<_>>(), vec!["try0"]);

    let choice = check("E X enter(0) & E X enter(1)", &model);
    assert_eq!(choice["idle"], true);
    assert_eq!(choice["try0"], false);

    let wildcard = check("enter(_) <-> (enter(0) | enter(1))", &model);
    assert!(wildcard.values().all(|v| *v));

    let label = check("\"leave(1)\"", &model);
    assert_eq!(
        label.iter().filter(|(_, v)| **v).map(|(k, _)| *k).collect::<Vec<_>>(),
        vec!["crit1"]
    );
}

#[test]
fn start_state_is_found_without_an_index() {
    let model = Mutex::new();
    let marker = CtlMarker::new(&"start & E X enter(1)".parse().unwrap(), &model).unwrap();
    assert!(marker.has_value(true));
    assert!(marker.has_node_value(&"idle", true));
}

#[test]
fn graph_model_with_node_weights() {
    let mut graph = DiGraph::<&str, String>::new();
    let a = graph.add_node("a");
    let b = graph.add_node("b");
    graph.add_edge(a, a, "start".into());
    graph.add_edge(a, b, "go".into());
    graph.add_edge(b, b, "final".into());

    let model = GraphModel::new(graph).unwrap();
    assert_eq!(model.weight(model.start()), Some(&"a"));

    let marker = CtlMarker::new(&"A F final".parse().unwrap(), &model).unwrap();
    assert!(marker.has_value(true));
    assert_eq!(
        marker.states(true).copied().collect::<Vec<_>>(),
        vec![NodeIndex::new(0), NodeIndex::new(1)]
    );

    // the final flag makes `b` no successor of itself
    let marker = CtlMarker::new(&"E X final".parse().unwrap(), &model).unwrap();
    assert_eq!(marker.states(true).copied().collect::<Vec<_>>(), vec![a]);
}

#[test]
fn missing_start_is_rejected() {
    let err = GraphModel::from_edges(2, [(0, 1, "go")]).unwrap_err();
    assert_eq!(err.to_string(), "no state is flagged as start state");
}

#[test]
fn one_formula_one_conversion() {
    let formula: Formula = "G p".parse().unwrap();
    assert!(formula.to_ltl_formula().is_ok());
    let err = formula.to_ctl_formula().unwrap_err();
    assert_eq!(err.messages().len(), 1);

    let model = GraphModel::from_edges(1, [(0, 0, "start")]).unwrap();
    let formula: Formula = "A G p".parse().unwrap();
    CtlMarker::new(&formula, &model).unwrap();
    assert!(formula.to_ltl_formula().is_err());
}
