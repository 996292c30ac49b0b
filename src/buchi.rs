//! Büchi automata for LTL formulas.
//!
//! The heavy lifting of turning an LTL formula into an automaton is left to an
//! [`LtlTranslator`]: anything that produces a [`TranslatorGraph`] for a
//! formula. [`BuchiGraph::from_translation`] then re-hosts that graph into
//! dense [`LocationId`]s with proposition-guarded [`BuchiTransition`]s, which
//! is what the product search works with.
//!
//! ```
//! use gtverify::buchi::{never_claim, BuchiGraph};
//! use gtverify::logic::{Formula, Proposition};
//!
//! let claim = "never {\naccept_init:\n\tif\n\t:: (p) -> goto accept_init\n\tfi;\n}";
//! let translator = |_: &Formula| never_claim::parse(claim, &());
//! let buchi = BuchiGraph::from_formula(&"G p".parse().unwrap(), &translator).unwrap();
//! let satisfied = [Proposition::id("p")];
//! assert!(buchi.transitions(buchi.initial()).all(|t| t.is_enabled(&satisfied)));
//! ```

#[cfg(feature = "ltl3ba")]
mod ltl3ba;
pub mod never_claim;

use std::{collections::HashMap, fmt::Display, hash::Hash};

use anyhow::Context;
use itertools::Itertools;
use regex::Regex;

use crate::logic::{Formula, Proposition};

#[cfg(feature = "ltl3ba")]
pub use ltl3ba::Ltl3ba;

/// A possibly negated atomic proposition in a transition guard.
#[derive(Debug, Clone)]
pub struct Literal {
    atom: Proposition,
    negated: bool,
    /// the atom text read as an anchored regular expression, if it is one
    pattern: Option<Regex>,
}

impl Literal {
    pub fn new(atom: Proposition, negated: bool) -> Self {
        let pattern = Regex::new(&format!("^(?:{})$", atom.text())).ok();
        Self {
            atom,
            negated,
            pattern,
        }
    }

    pub fn positive(atom: Proposition) -> Self {
        Self::new(atom, false)
    }

    pub fn negative(atom: Proposition) -> Self {
        Self::new(atom, true)
    }

    pub fn atom(&self) -> &Proposition {
        &self.atom
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Whether the atom stands for the given satisfied proposition, either by
    /// proposition matching or by reading the atom as a pattern over its text.
    pub fn matches(&self, prop: &Proposition) -> bool {
        self.atom.matches(prop)
            || self
                .pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&prop.text()))
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.atom == other.atom && self.negated == other.negated
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.atom.hash(state);
        self.negated.hash(state);
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        write!(f, "{}", self.atom)
    }
}

/// The automaton graph produced by an [`LtlTranslator`], before re-hosting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatorGraph {
    pub nodes: Vec<TranslatorNode>,
    pub initial: Option<usize>,
    pub edges: Vec<TranslatorEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorNode {
    pub name: String,
    pub accepting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorEdge {
    pub source: usize,
    pub target: usize,
    pub action: String,
    /// conjunction of literals; empty means `true`
    pub guard: Vec<Literal>,
}

/// Turns an LTL formula into an automaton graph.
pub trait LtlTranslator {
    fn translate(&self, formula: &Formula) -> anyhow::Result<TranslatorGraph>;
}

impl<F> LtlTranslator for F
where
    F: Fn(&Formula) -> anyhow::Result<TranslatorGraph>,
{
    fn translate(&self, formula: &Formula) -> anyhow::Result<TranslatorGraph> {
        self(formula)
    }
}

/// Dense label of a location of a [`BuchiGraph`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
#[display("q{_0}")]
pub struct LocationId(pub usize);

/// Refers to the `index`th outgoing transition of `location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionRef {
    pub location: LocationId,
    pub index: usize,
}

/// The label of a Büchi transition: an action name and a guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuchiLabel {
    pub action: String,
    pub guard: Vec<Literal>,
}

impl Display for BuchiLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/[{}]", self.action, self.guard.iter().join(","))
    }
}

#[derive(Debug, Clone)]
pub struct BuchiTransition {
    pub source: LocationId,
    pub target: LocationId,
    pub label: BuchiLabel,
    text: String,
}

impl BuchiTransition {
    fn new(source: LocationId, target: LocationId, label: BuchiLabel) -> Self {
        let text = label.to_string();
        Self {
            source,
            target,
            label,
            text,
        }
    }

    /// Whether the guard holds when exactly the given propositions are satisfied:
    /// every positive literal matches some satisfied proposition, and no
    /// negative literal does.
    pub fn is_enabled(&self, satisfied: &[Proposition]) -> bool {
        self.label.guard.iter().all(|literal| {
            let matched = satisfied.iter().any(|p| literal.matches(p));
            literal.negated != matched
        })
    }

    /// Canonical text of the label, `action/[a,!b]`.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Display for BuchiTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.text, self.target)
    }
}

#[derive(Debug, Clone)]
pub struct BuchiLocation {
    pub id: LocationId,
    pub accepting: bool,
    transitions: Vec<BuchiTransition>,
}

impl BuchiLocation {
    pub fn transitions(&self) -> &[BuchiTransition] {
        &self.transitions
    }
}

/// A Büchi automaton over proposition-guarded transitions.
#[derive(Debug, Clone)]
pub struct BuchiGraph {
    locations: Vec<BuchiLocation>,
    initial: LocationId,
}

impl BuchiGraph {
    /// Restrict the formula to LTL, translate it, and re-host the result.
    pub fn from_formula(
        formula: &Formula,
        translator: &impl LtlTranslator,
    ) -> anyhow::Result<Self> {
        let ltl = formula.to_ltl_formula()?;
        let graph = translator
            .translate(&ltl)
            .with_context(|| format!("translating '{ltl}' to a Büchi automaton"))?;
        let buchi = Self::from_translation(&graph);
        tracing::debug!(
            "built Büchi automaton for {ltl}: {} locations, {} transitions",
            buchi.location_count(),
            buchi.transition_count()
        );
        Ok(buchi)
    }

    /// Re-host a translator graph. Locations are numbered in depth-first
    /// discovery order from the initial node; nodes unreachable from it are
    /// dropped. Without an initial node, the automaton gets a fresh initial
    /// location with no transitions, accepting nothing.
    pub fn from_translation(graph: &TranslatorGraph) -> Self {
        let mut locations = vec![];
        let Some(initial) = graph.initial else {
            locations.push(BuchiLocation {
                id: LocationId(0),
                accepting: false,
                transitions: vec![],
            });
            return Self {
                locations,
                initial: LocationId(0),
            };
        };

        let mut outgoing: Vec<Vec<&TranslatorEdge>> = vec![vec![]; graph.nodes.len()];
        for edge in &graph.edges {
            outgoing[edge.source].push(edge);
        }

        let mut ids: HashMap<usize, LocationId> = HashMap::new();
        let mut stack = vec![];
        let mut visit = |node: usize, locations: &mut Vec<BuchiLocation>, stack: &mut Vec<usize>| {
            *ids.entry(node).or_insert_with(|| {
                let id = LocationId(locations.len());
                locations.push(BuchiLocation {
                    id,
                    accepting: graph.nodes[node].accepting,
                    transitions: vec![],
                });
                stack.push(node);
                id
            })
        };
        visit(initial, &mut locations, &mut stack);

        while let Some(node) = stack.pop() {
            let source = visit(node, &mut locations, &mut stack);
            for edge in &outgoing[node] {
                let target = visit(edge.target, &mut locations, &mut stack);
                let label = BuchiLabel {
                    action: edge.action.clone(),
                    guard: edge.guard.clone(),
                };
                locations[source.0]
                    .transitions
                    .push(BuchiTransition::new(source, target, label));
            }
        }

        Self {
            locations,
            initial: LocationId(0),
        }
    }

    pub fn initial(&self) -> LocationId {
        self.initial
    }

    pub fn location(&self, id: LocationId) -> &BuchiLocation {
        &self.locations[id.0]
    }

    pub fn locations(&self) -> &[BuchiLocation] {
        &self.locations
    }

    pub fn is_accepting(&self, id: LocationId) -> bool {
        self.location(id).accepting
    }

    pub fn transitions(&self, id: LocationId) -> impl Iterator<Item = &BuchiTransition> {
        self.location(id).transitions.iter()
    }

    pub fn transition(&self, r: TransitionRef) -> &BuchiTransition {
        &self.location(r.location).transitions[r.index]
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn transition_count(&self) -> usize {
        self.locations.iter().map(|l| l.transitions.len()).sum()
    }
}
