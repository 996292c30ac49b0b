use std::collections::HashMap;

use super::{Color, ProductId, ProductState, ProductStateSet, ProductTransition, SharedListener};
use crate::{
    buchi::{BuchiGraph, LtlTranslator, TransitionRef},
    logic::{Formula, Proposition},
    model::{start_node, Flag, Model},
};

/// Bounds for the nested search.
///
/// Without a `max_depth` the search is exhaustive. With one, the search runs
/// in iterations: whenever a state had to be left unexplored because the stack
/// was already `max_depth` deep, another iteration follows with the bound
/// raised by `depth_step`, up to `max_iterations` iterations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub max_depth: Option<usize>,
    pub depth_step: usize,
    pub max_iterations: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            depth_step: 1,
            max_iterations: None,
        }
    }
}

impl SearchConfig {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn depth_step(mut self, depth_step: usize) -> Self {
        self.depth_step = depth_step.max(1);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// An accepting lasso: the `prefix` leads from the initial product state to
/// the first state of `cycle`, and the last state of `cycle` leads back to
/// its first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample<S> {
    pub prefix: Vec<ProductState<S>>,
    pub cycle: Vec<ProductState<S>>,
}

impl<S> Counterexample<S> {
    /// The system states along the lasso, prefix first.
    pub fn system_states(&self) -> impl Iterator<Item = &S> {
        self.prefix.iter().chain(&self.cycle).map(|p| &p.state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LtlOutcome<S> {
    /// No accepting run exists.
    Satisfied,
    /// An accepting run exists.
    Violated(Counterexample<S>),
    /// The depth bound still cut the search off after the last allowed iteration.
    Inconclusive { iterations: usize },
}

impl<S> LtlOutcome<S> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, LtlOutcome::Satisfied)
    }

    pub fn counterexample(&self) -> Option<&Counterexample<S>> {
        match self {
            LtlOutcome::Violated(cx) => Some(cx),
            _ => None,
        }
    }
}

/// A stack frame of either search.
struct Frame {
    id: ProductId,
    successors: Vec<ProductId>,
    next: usize,
}

/// Nested depth-first search for accepting runs of the product of a model
/// and a Büchi automaton.
///
/// The outer (blue) search paints states cyan while they are on its stack
/// and blue once finished. When it finishes an accepting state, an inner
/// (red) search through blue states looks for a way back to the cyan stack,
/// which closes an accepting cycle.
pub struct NestedDfs<'a, M: Model> {
    model: &'a M,
    buchi: &'a BuchiGraph,
    space: ProductStateSet<M::Node>,
    config: SearchConfig,
    propositions: HashMap<M::Node, Vec<Proposition>>,
    iteration: usize,
}

impl<'a, M: Model> NestedDfs<'a, M> {
    pub fn new(model: &'a M, buchi: &'a BuchiGraph, config: SearchConfig) -> Self {
        Self {
            model,
            buchi,
            space: ProductStateSet::new(),
            config,
            propositions: HashMap::new(),
            iteration: 0,
        }
    }

    pub fn space(&self) -> &ProductStateSet<M::Node> {
        &self.space
    }

    pub fn add_listener(&mut self, listener: SharedListener<M::Node>) {
        self.space.add_listener(listener);
    }

    /// Number of iterations run so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// Search from the start state of the model and the initial location.
    pub fn run(&mut self) -> LtlOutcome<M::Node> {
        let start = ProductState {
            state: start_node(self.model),
            location: self.buchi.initial(),
        };
        let (root, _) = self.space.insert(start);
        let mut bound = self.config.max_depth;

        loop {
            self.iteration += 1;
            self.space.reset_colors();
            let mut cut = false;

            if let Some(cx) = self.blue(root, bound, &mut cut) {
                tracing::info!(
                    "accepting run found in iteration {}: prefix {}, cycle {}",
                    self.iteration,
                    cx.prefix.len(),
                    cx.cycle.len()
                );
                return LtlOutcome::Violated(cx);
            }
            if !cut {
                tracing::info!(
                    "no accepting run among {} product states",
                    self.space.state_count()
                );
                return LtlOutcome::Satisfied;
            }
            if self
                .config
                .max_iterations
                .is_some_and(|max| self.iteration >= max)
            {
                tracing::info!("search still cut off after {} iterations", self.iteration);
                return LtlOutcome::Inconclusive {
                    iterations: self.iteration,
                };
            }

            bound = bound.map(|b| b + self.config.depth_step.max(1));
            tracing::debug!(
                "iteration {} cut off, deepening to {bound:?}",
                self.iteration
            );
        }
    }

    fn blue(
        &mut self,
        root: ProductId,
        bound: Option<usize>,
        cut: &mut bool,
    ) -> Option<Counterexample<M::Node>> {
        self.space.set_color(root, Color::Cyan);
        let mut stack = vec![self.frame(root)];

        while let Some(frame) = stack.last_mut() {
            let source = frame.id;
            if let Some(&target) = frame.successors.get(frame.next) {
                frame.next += 1;
                match self.space.color(target) {
                    Color::Cyan if self.is_accepting(source) || self.is_accepting(target) => {
                        return Some(self.lasso(&stack, target, &[]));
                    }
                    Color::White if bound.is_some_and(|b| stack.len() >= b) => {
                        self.space.set_iteration(target, self.iteration);
                        *cut = true;
                    }
                    Color::White => {
                        self.space.set_color(target, Color::Cyan);
                        let frame = self.frame(target);
                        stack.push(frame);
                    }
                    _ => {}
                }
            } else {
                if self.is_accepting(source) {
                    if let Some(cx) = self.red(source, &stack) {
                        return Some(cx);
                    }
                    self.space.set_color(source, Color::Red);
                } else {
                    self.space.set_color(source, Color::Blue);
                }
                stack.pop();
            }
        }
        None
    }

    fn red(&mut self, seed: ProductId, blue: &[Frame]) -> Option<Counterexample<M::Node>> {
        let mut stack = vec![self.frame(seed)];

        while let Some(frame) = stack.last_mut() {
            if let Some(&target) = frame.successors.get(frame.next) {
                frame.next += 1;
                match self.space.color(target) {
                    Color::Cyan => {
                        let path: Vec<ProductId> = stack.iter().skip(1).map(|f| f.id).collect();
                        return Some(self.lasso(blue, target, &path));
                    }
                    Color::Blue => {
                        self.space.set_color(target, Color::Red);
                        let frame = self.frame(target);
                        stack.push(frame);
                    }
                    _ => {}
                }
            } else {
                stack.pop();
            }
        }
        None
    }

    /// The lasso closing at `entry`, a state on the blue stack, optionally
    /// reaching it again through a red `path` from the top of the blue stack.
    fn lasso(
        &self,
        blue: &[Frame],
        entry: ProductId,
        path: &[ProductId],
    ) -> Counterexample<M::Node> {
        let Some(k) = blue.iter().position(|f| f.id == entry) else {
            unreachable!("cyan state {entry} is not on the search stack")
        };
        let state = |id: ProductId| self.space.state(id).clone();
        Counterexample {
            prefix: blue[..k].iter().map(|f| state(f.id)).collect(),
            cycle: blue[k..]
                .iter()
                .map(|f| f.id)
                .chain(path.iter().copied())
                .map(state)
                .collect(),
        }
    }

    fn frame(&mut self, id: ProductId) -> Frame {
        Frame {
            id,
            successors: self.explore(id).iter().map(|t| t.target).collect(),
            next: 0,
        }
    }

    fn is_accepting(&self, id: ProductId) -> bool {
        self.buchi.is_accepting(self.space.state(id).location)
    }

    /// The successors of a product state, computed on first request.
    fn explore(&mut self, id: ProductId) -> &[ProductTransition] {
        if self.space.outgoing(id).is_none() {
            let transitions = self.expand(id);
            if transitions.is_empty() {
                self.space.set_pocket(id);
            }
            self.space.set_outgoing(id, transitions);
            self.space.set_closed(id);
        }
        self.space.outgoing(id).unwrap_or_default()
    }

    fn expand(&mut self, id: ProductId) -> Vec<ProductTransition> {
        let ProductState { state, location } = self.space.state(id).clone();
        let buchi = self.buchi;
        let steps = self.steps(&state);
        let satisfied = self.propositions(&state).to_vec();

        let mut transitions = vec![];
        for (index, t) in buchi.transitions(location).enumerate() {
            if !t.is_enabled(&satisfied) {
                continue;
            }
            for (next, event) in &steps {
                let (target, inserted) = self.space.insert(ProductState {
                    state: next.clone(),
                    location: t.target,
                });
                let transition = ProductTransition {
                    source: id,
                    target,
                    event: event.clone(),
                    buchi: TransitionRef { location, index },
                };
                if inserted {
                    self.space.set_incoming(target, transition.clone());
                }
                transitions.push(transition);
            }
        }
        tracing::trace!(
            "explored {id} = ({state:?}, {location}): {} successors",
            transitions.len()
        );
        transitions
    }

    /// System successors of a state along its non-flag edges; a deadlocked
    /// state stutters.
    fn steps(&self, state: &M::Node) -> Vec<(M::Node, Option<String>)> {
        let steps: Vec<_> = self
            .model
            .out_edges(state)
            .filter(|e| self.model.get_flag(&e.label).is_none())
            .map(|e| (e.target, Some(e.label)))
            .collect();
        if steps.is_empty() {
            vec![(state.clone(), None)]
        } else {
            steps
        }
    }

    /// The propositions holding in a system state: its outgoing labels and its flags.
    fn propositions(&mut self, state: &M::Node) -> &[Proposition] {
        let model = self.model;
        self.propositions.entry(state.clone()).or_insert_with(|| {
            let mut props: Vec<Proposition> = model
                .out_edges(state)
                .filter(|e| model.get_flag(&e.label).is_none())
                .map(|e| {
                    Proposition::parse_label(&e.label).unwrap_or_else(|| Proposition::label(e.label))
                })
                .collect();
            props.extend(
                Flag::ALL
                    .into_iter()
                    .filter(|flag| model.is_special(state, *flag))
                    .map(|flag| flag.proposition().clone()),
            );
            props
        })
    }
}

/// Check that every run of the model satisfies an LTL formula, by searching
/// for an accepting run of the automaton of its negation.
pub fn check_ltl<M: Model>(
    model: &M,
    formula: &Formula,
    translator: &impl LtlTranslator,
    config: SearchConfig,
) -> anyhow::Result<LtlOutcome<M::Node>> {
    let negated = formula.to_ltl_formula()?.not();
    let buchi = BuchiGraph::from_formula(&negated, translator)?;
    tracing::info!(
        "checking {formula} over {} states against a {}-location automaton",
        model.node_count(),
        buchi.location_count()
    );
    let mut search = NestedDfs::new(model, &buchi, config);
    Ok(search.run())
}

#[cfg(test)]
mod tests {
    use petgraph::graph::NodeIndex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        buchi::{never_claim, LocationId, TranslatorGraph},
        ctl::CtlMarker,
        model::GraphModel,
    };

    const ALWAYS_P: &str = "never { /* G p */
accept_init:
	if
	:: (p) -> goto accept_init
	fi;
}
";

    const EVENTUALLY_NOT_P: &str = "never { /* F !p */
T0_init:
	if
	:: (!p) -> goto accept_all
	:: (1) -> goto T0_init
	fi;
accept_all:
	skip
}
";

    fn claim(promela: &'static str) -> impl Fn(&Formula) -> anyhow::Result<TranslatorGraph> {
        move |_: &Formula| never_claim::parse(promela, &())
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn ps(state: usize, location: usize) -> ProductState<NodeIndex> {
        ProductState {
            state: n(state),
            location: LocationId(location),
        }
    }

    /// s0 -p-> s1 -q-> s2
    fn loses_p() -> GraphModel {
        GraphModel::from_edges(3, [(0, 0, "start"), (0, 1, "p"), (1, 2, "q")]).unwrap()
    }

    /// s0 -p-> s1 -p-> s0
    fn keeps_p() -> GraphModel {
        GraphModel::from_edges(2, [(0, 0, "start"), (0, 1, "p"), (1, 0, "p")]).unwrap()
    }

    #[test]
    fn always_p_holds() {
        let outcome = check_ltl(
            &keeps_p(),
            &"G p".parse().unwrap(),
            &claim(EVENTUALLY_NOT_P),
            SearchConfig::default(),
        )
        .unwrap();
        assert_eq!(outcome, LtlOutcome::Satisfied);
    }

    #[test]
    fn always_p_fails_with_lasso() {
        let outcome = check_ltl(
            &loses_p(),
            &"G p".parse().unwrap(),
            &claim(EVENTUALLY_NOT_P),
            SearchConfig::default(),
        )
        .unwrap();
        let cx = outcome.counterexample().unwrap().clone();
        // s1 has no p, so the automaton moves to accept_all, and s2 stutters there
        assert_eq!(cx.prefix, vec![ps(0, 0), ps(1, 0)]);
        assert_eq!(cx.cycle, vec![ps(2, 1)]);
        assert_eq!(
            cx.system_states().copied().collect::<Vec<_>>(),
            vec![n(0), n(1), n(2)]
        );
    }

    #[test]
    fn translator_sees_the_negation() {
        let translator = |f: &Formula| {
            assert_eq!(f.to_string(), "!G p");
            never_claim::parse(EVENTUALLY_NOT_P, &())
        };
        check_ltl(&keeps_p(), &"G p".parse().unwrap(), &translator, SearchConfig::default())
            .unwrap();
    }

    #[test]
    fn ctl_formulas_are_rejected() {
        let err = check_ltl(
            &keeps_p(),
            &"A G p".parse().unwrap(),
            &claim(EVENTUALLY_NOT_P),
            SearchConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not allowed in LTL"));
    }

    #[test]
    fn formulas_marked_as_ctl_are_rejected() {
        let model = keeps_p();
        let formula: Formula = "p".parse().unwrap();
        CtlMarker::new(&formula, &model).unwrap();
        let err = check_ltl(&model, &formula, &claim(EVENTUALLY_NOT_P), SearchConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("already in use as a CTL formula"));

        // a checked formula is taken for LTL from then on
        let formula: Formula = "p".parse().unwrap();
        check_ltl(&model, &formula, &claim(EVENTUALLY_NOT_P), SearchConfig::default()).unwrap();
        assert!(!formula.is_ctl_formula());
        assert!(CtlMarker::new(&formula, &model).is_err());
    }

    #[test]
    fn stuck_product_states_are_pockets() {
        let buchi = BuchiGraph::from_formula(&"G p".parse().unwrap(), &claim(ALWAYS_P)).unwrap();

        let model = loses_p();
        let mut search = NestedDfs::new(&model, &buchi, SearchConfig::default());
        assert_eq!(search.run(), LtlOutcome::Satisfied);
        let space = search.space();
        let stuck = space.find(&ps(1, 0)).unwrap();
        assert!(space.is_pocket(stuck));
        assert!(!space.is_pocket(space.find(&ps(0, 0)).unwrap()));
        assert_eq!(space.state_count(), 2);
        assert!(!space.has_open_states());
        let incoming = space.incoming(stuck).unwrap();
        assert_eq!(incoming.event.as_deref(), Some("p"));

        let model = keeps_p();
        let mut search = NestedDfs::new(&model, &buchi, SearchConfig::default());
        let cx = search.run().counterexample().unwrap().clone();
        assert!(cx.prefix.is_empty());
        assert_eq!(cx.cycle, vec![ps(0, 0), ps(1, 0)]);
    }

    #[test]
    fn depth_bound_deepens_until_complete() {
        // s0 -p-> s1 -p-> s2 -p-> s3, s3 deadlocks
        let model = GraphModel::from_edges(
            4,
            [(0, 0, "start"), (0, 1, "p"), (1, 2, "p"), (2, 3, "p")],
        )
        .unwrap();
        let negation = claim(EVENTUALLY_NOT_P);
        let buchi = BuchiGraph::from_formula(&"!G p".parse().unwrap(), &negation).unwrap();

        let config = SearchConfig::default().max_depth(2);
        let mut search = NestedDfs::new(&model, &buchi, config.clone());
        // s3 has no p, so it is a violation, found once the bound reaches it
        let cx = search.run().counterexample().unwrap().clone();
        assert_eq!(search.iterations(), 4);
        assert_eq!(cx.prefix.len(), 4);
        assert_eq!(cx.cycle, vec![ps(3, 1)]);
        let space = search.space();
        assert_eq!(space.iteration(space.find(&ps(1, 0)).unwrap()), 0);
        assert_eq!(space.iteration(space.find(&ps(2, 0)).unwrap()), 1);
        assert_eq!(space.iteration(space.find(&ps(3, 0)).unwrap()), 2);
        assert_eq!(space.iteration(space.find(&ps(3, 1)).unwrap()), 3);

        let mut search = NestedDfs::new(&model, &buchi, config.max_iterations(2));
        assert_eq!(search.run(), LtlOutcome::Inconclusive { iterations: 2 });
    }
}
