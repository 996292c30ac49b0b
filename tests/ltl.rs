use std::{cell::RefCell, rc::Rc};

use gtverify::buchi::{never_claim, Literal, TranslatorEdge, TranslatorGraph, TranslatorNode};
use gtverify::logic::PropositionRegistry;
use gtverify::model::start_node;
use gtverify::product::{Counterexample, ProductId, ProductListener, ProductStateSet};
use gtverify::prelude::*;
use petgraph::graph::NodeIndex;

/// Two processes taking turns at a critical section:
/// idle -> try(i) -> crit(i) -> idle.
fn mutex() -> GraphModel {
    GraphModel::from_edges(
        5,
        [
            (0, 0, "start"),
            (0, 1, "req(0)"),
            (0, 2, "req(1)"),
            (1, 3, "enter(0)"),
            (2, 4, "enter(1)"),
            (3, 0, "leave(0)"),
            (4, 0, "leave(1)"),
        ],
    )
    .unwrap()
}

fn registry() -> PropositionRegistry {
    PropositionRegistry::new(
        ["enter(0)", "enter(1)", "req(0)"].map(|p| Proposition::parse(p).unwrap()),
    )
    .unwrap()
}

/// The automaton for `F G !p`: guess a point after which `p` never holds.
fn eventually_always_not(p: &str) -> impl Fn(&Formula) -> anyhow::Result<TranslatorGraph> {
    let atom = Proposition::parse(p).unwrap();
    move |_: &Formula| {
        Ok(TranslatorGraph {
            nodes: vec![
                TranslatorNode {
                    name: "guess".into(),
                    accepting: false,
                },
                TranslatorNode {
                    name: "never".into(),
                    accepting: true,
                },
            ],
            initial: Some(0),
            edges: vec![
                TranslatorEdge {
                    source: 0,
                    target: 0,
                    action: "".into(),
                    guard: vec![],
                },
                TranslatorEdge {
                    source: 0,
                    target: 1,
                    action: "".into(),
                    guard: vec![Literal::negative(atom.clone())],
                },
                TranslatorEdge {
                    source: 1,
                    target: 1,
                    action: "".into(),
                    guard: vec![Literal::negative(atom.clone())],
                },
            ],
        })
    }
}

/// Every step of the lasso follows a model edge, or stutters in a deadlock.
fn assert_is_run(model: &GraphModel, cx: &Counterexample<NodeIndex>) {
    assert!(!cx.cycle.is_empty());
    let states: Vec<NodeIndex> = cx
        .system_states()
        .chain(cx.cycle.first().map(|p| &p.state))
        .copied()
        .collect();
    assert_eq!(states[0], start_node(model));
    for pair in states.windows(2) {
        let proper: Vec<_> = model
            .out_edges(&pair[0])
            .filter(|e| model.get_flag(&e.label).is_none())
            .collect();
        if proper.is_empty() {
            assert_eq!(pair[0], pair[1]);
        } else {
            assert!(proper.iter().any(|e| e.target == pair[1]), "{pair:?}");
        }
    }
}

#[test]
fn mutual_exclusion_is_an_invariant() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // claim for F (enter(0) & enter(1))
    let claim = "never {
T0_init:
	if
	:: (enter_0_ && enter_1_) -> goto accept_all
	:: (1) -> goto T0_init
	fi;
accept_all:
	skip
}";
    let translator = |_: &Formula| never_claim::parse(claim, &registry());
    let outcome = check_ltl(
        &mutex(),
        &"G !(enter(0) & enter(1))".parse().unwrap(),
        &translator,
        SearchConfig::default(),
    )
    .unwrap();
    assert!(outcome.is_satisfied());
}

#[test]
fn entering_is_reachable() {
    // claim for F enter(1)
    let claim = "never {
T0_init:
	if
	:: (enter_1_) -> goto accept_all
	:: (1) -> goto T0_init
	fi;
accept_all:
	skip
}";
    let model = mutex();
    let translator = |_: &Formula| never_claim::parse(claim, &registry());
    let outcome = check_ltl(
        &model,
        &"G !enter(1)".parse().unwrap(),
        &translator,
        SearchConfig::default(),
    )
    .unwrap();
    let cx = outcome.counterexample().unwrap();
    assert_is_run(&model, cx);
    assert!(cx.system_states().any(|s| *s == NodeIndex::new(2)));
}

#[test]
fn idle_recurs_but_process_zero_may_starve() {
    let model = mutex();

    let outcome = check_ltl(
        &model,
        &"G F req(0)".parse().unwrap(),
        &eventually_always_not("req(0)"),
        SearchConfig::default(),
    )
    .unwrap();
    assert!(outcome.is_satisfied());

    let outcome = check_ltl(
        &model,
        &"G F enter(0)".parse().unwrap(),
        &eventually_always_not("enter(0)"),
        SearchConfig::default(),
    )
    .unwrap();
    let cx = outcome.counterexample().unwrap();
    assert_is_run(&model, cx);
    assert!(cx.cycle.iter().all(|p| p.state != NodeIndex::new(1)));
}

#[derive(Default)]
struct Progress {
    added: usize,
    closed: usize,
}

impl ProductListener<NodeIndex> for Progress {
    fn add_update(&mut self, _set: &ProductStateSet<NodeIndex>, _id: ProductId) {
        self.added += 1;
    }

    fn close_update(&mut self, set: &ProductStateSet<NodeIndex>, id: ProductId) {
        assert!(set.is_closed(id));
        self.closed += 1;
    }
}

#[test]
fn listeners_follow_the_search() {
    let model = mutex();
    let buchi = BuchiGraph::from_formula(
        &"!G F req(0)".parse().unwrap(),
        &eventually_always_not("req(0)"),
    )
    .unwrap();
    let progress = Rc::new(RefCell::new(Progress::default()));

    let mut search = NestedDfs::new(&model, &buchi, SearchConfig::default());
    search.add_listener(progress.clone());
    assert!(search.run().is_satisfied());

    let space = search.space();
    let progress = progress.borrow();
    assert_eq!(progress.added, space.state_count());
    assert_eq!(progress.closed, space.state_count());
    assert_eq!(space.closed_count(), space.state_count());
    assert!(!space.has_open_states());
}
