//! CTL model checking by marking.
//!
//! The [`CtlMarker`] computes, for every subformula of a CTL formula, the set
//! of states of a [`Model`] that satisfy it. Sets are bit vectors indexed by
//! [`Model::node_index`], and the temporal operators are computed by backward
//! propagation over a predecessor table built in a single pass over the model.
//!
//! Atomic propositions are interpreted on transitions: a proposition holds in a
//! state if the state has an outgoing edge whose label matches it (see
//! [`Proposition::matches`]). Flag propositions (`start`, `final`, ...) hold
//! in the states carrying the corresponding flag.


use std::collections::{HashMap, VecDeque};

use bitvec::prelude::*;

use crate::logic::{FormatError, Formula, LogicOp, Proposition};
use crate::model::{Flag, Model};

/// The satisfaction sets of a CTL formula and all its subformulas over a model.
pub struct CtlMarker<'m, M: Model> {
    model: &'m M,
    formula: Formula,
    /// nodes by index
    nodes: Vec<M::Node>,
    subformulas: HashMap<Formula, usize>,
    props: Vec<Proposition>,
    prop_index: HashMap<Proposition, usize>,
    start_prop: usize,
    prop_marks: Vec<BitVec>,
    marks: Vec<Option<BitVec>>,
    /// for every node, the source of every incoming non-flag edge
    backward: Vec<Vec<usize>>,
    /// number of outgoing non-flag edges of every node
    out_count: Vec<usize>,
}

impl<'m, M: Model> CtlMarker<'m, M> {
    /// Convert `formula` to CTL and mark it over `model`.
    pub fn new(formula: &Formula, model: &'m M) -> Result<Self, FormatError> {
        let formula = formula.to_ctl_formula()?;
        let node_count = model.node_count();
        let mut marker = Self {
            model,
            formula: formula.clone(),
            nodes: Vec::with_capacity(node_count),
            subformulas: HashMap::new(),
            props: vec![],
            prop_index: HashMap::new(),
            start_prop: 0,
            prop_marks: vec![],
            marks: vec![],
            backward: vec![vec![]; node_count],
            out_count: vec![0; node_count],
        };
        marker.start_prop = marker.register_prop(Flag::Start.proposition());
        marker.register(&formula);
        marker.scan_model();
        marker.mark(&formula);
        tracing::debug!(
            "marked {formula} over {node_count} states: {} subformulas, {} propositions",
            marker.subformulas.len(),
            marker.props.len()
        );
        Ok(marker)
    }

    fn register_prop(&mut self, prop: &Proposition) -> usize {
        if let Some(&index) = self.prop_index.get(prop) {
            return index;
        }
        let index = self.props.len();
        self.props.push(prop.clone());
        self.prop_index.insert(prop.clone(), index);
        self.prop_marks.push(bitvec![0; self.backward.len()]);
        index
    }

    /// Number all distinct subformulas and propositions, in discovery order.
    fn register(&mut self, formula: &Formula) {
        if self.subformulas.contains_key(formula) {
            return;
        }
        self.subformulas.insert(formula.clone(), self.marks.len());
        self.marks.push(None);
        if let Some(prop) = formula.proposition() {
            self.register_prop(prop);
        }
        for arg in formula.args() {
            self.register(arg);
        }
    }

    /// One pass over the model: predecessor table, out-degrees, proposition marks.
    fn scan_model(&mut self) {
        let model = self.model;
        let mut nodes: Vec<Option<M::Node>> = vec![None; model.node_count()];
        for node in model.node_set() {
            let index = model.node_index(&node);
            nodes[index] = Some(node);
        }
        self.nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(i, n)| n.unwrap_or_else(|| panic!("model has no node with index {i}")))
            .collect();

        let mut by_label: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, prop) in self.props.iter().enumerate() {
            by_label.entry(prop.text()).or_default().push(index);
            if let Some(name) = prop.name() {
                by_name.entry(name.to_string()).or_default().push(index);
            }
        }

        for source in 0..self.nodes.len() {
            for edge in model.out_edges(&self.nodes[source]) {
                if model.get_flag(&edge.label).is_some() {
                    continue;
                }
                let target = model.node_index(&edge.target);
                self.backward[target].push(source);
                self.out_count[source] += 1;

                if let Some(matching) = by_label.get(&edge.label) {
                    for &p in matching {
                        self.prop_marks[p].set(source, true);
                    }
                }
                if let Some(action) = Proposition::parse_label(&edge.label) {
                    // labels also match the printed form of the parsed label
                    let text = action.text();
                    let labels = by_label.get(&text).filter(|_| text != edge.label);
                    let candidates = action.name().and_then(|name| by_name.get(name));
                    for &p in labels.into_iter().flatten() {
                        self.prop_marks[p].set(source, true);
                    }
                    for &p in candidates.into_iter().flatten() {
                        if self.props[p].matches(&action) {
                            self.prop_marks[p].set(source, true);
                        }
                    }
                }
            }
        }

        let flag_props: Vec<(Flag, usize)> = Flag::ALL
            .into_iter()
            .filter_map(|flag| Some((flag, *self.prop_index.get(flag.proposition())?)))
            .collect();
        for (index, node) in self.nodes.iter().enumerate() {
            for &(flag, p) in &flag_props {
                if model.is_special(node, flag) {
                    self.prop_marks[p].set(index, true);
                }
            }
        }
    }

    fn index_of(&self, formula: &Formula) -> usize {
        self.subformulas[formula]
    }

    /// Compute the satisfaction set of a registered subformula, and of its
    /// subformulas first.
    fn mark(&mut self, formula: &Formula) -> usize {
        let index = self.index_of(formula);
        if self.marks[index].is_some() {
            return index;
        }
        let result = if formula.op().is_path_quantifier() {
            self.mark_quantified(formula)
        } else {
            let args: Vec<usize> = formula.args().iter().map(|arg| self.mark(arg)).collect();
            self.mark_connective(formula, &args)
        };
        self.marks[index] = Some(result);
        index
    }

    /// `A`/`E` directly over `X` or `U`; the only temporal shapes left after
    /// [`Formula::to_ctl_formula`].
    fn mark_quantified(&mut self, formula: &Formula) -> BitVec {
        let path = formula.arg1();
        let inner: Vec<usize> = path.args().iter().map(|arg| self.mark(arg)).collect();
        match (formula.op(), path.op()) {
            (LogicOp::Exists, LogicOp::Next) => self.exists_next(inner[0]),
            (LogicOp::Forall, LogicOp::Next) => self.forall_next(inner[0]),
            (LogicOp::Exists, LogicOp::Until) => self.exists_until(inner[0], inner[1]),
            (LogicOp::Forall, LogicOp::Until) => self.forall_until(inner[0], inner[1]),
            (q, op) => unreachable!("'{q} {op}' should have been rewritten before marking"),
        }
    }

    fn mark_connective(&self, formula: &Formula, args: &[usize]) -> BitVec {
        let n = self.nodes.len();
        match formula.op() {
            LogicOp::True => bitvec![1; n],
            LogicOp::False => bitvec![0; n],
            LogicOp::Prop => {
                let prop = formula
                    .proposition()
                    .unwrap_or_else(|| unreachable!("proposition node without proposition"));
                self.prop_marks[self.prop_index[prop]].clone()
            }
            LogicOp::Not => self.pointwise1(args[0], |a| !a),
            LogicOp::And => self.pointwise2(args[0], args[1], |a, b| a && b),
            LogicOp::Or => self.pointwise2(args[0], args[1], |a, b| a || b),
            LogicOp::Implies => self.pointwise2(args[0], args[1], |a, b| !a || b),
            LogicOp::Follows => self.pointwise2(args[0], args[1], |a, b| a || !b),
            // (φ → ψ) ∧ (ψ → φ)
            LogicOp::Equiv => self.pointwise2(args[0], args[1], |a, b| (!a || b) && (!b || a)),
            op => unreachable!("'{op}' outside a path quantifier cannot be marked"),
        }
    }

    fn marks_at(&self, index: usize) -> &BitSlice {
        self.marks[index]
            .as_deref()
            .unwrap_or_else(|| unreachable!("subformula {index} is not marked yet"))
    }

    fn pointwise1(&self, a: usize, f: impl Fn(bool) -> bool) -> BitVec {
        self.marks_at(a).iter().by_vals().map(f).collect()
    }

    fn pointwise2(&self, a: usize, b: usize, f: impl Fn(bool, bool) -> bool) -> BitVec {
        let a = self.marks_at(a);
        let b = self.marks_at(b);
        a.iter()
            .by_vals()
            .zip(b.iter().by_vals())
            .map(|(x, y)| f(x, y))
            .collect()
    }

    /// States with some successor in `arg`.
    fn exists_next(&self, arg: usize) -> BitVec {
        let mut result = bitvec![0; self.nodes.len()];
        for i in self.marks_at(arg).iter_ones() {
            for &pred in &self.backward[i] {
                result.set(pred, true);
            }
        }
        result
    }

    /// States all of whose successors are in `arg`; deadlocks trivially.
    fn forall_next(&self, arg: usize) -> BitVec {
        let mut counts = vec![0usize; self.nodes.len()];
        for i in self.marks_at(arg).iter_ones() {
            for &pred in &self.backward[i] {
                counts[pred] += 1;
            }
        }
        counts
            .iter()
            .zip(&self.out_count)
            .map(|(marked, total)| marked == total)
            .collect()
    }

    /// Backward closure of `goal` through `path` states.
    fn exists_until(&self, path: usize, goal: usize) -> BitVec {
        let path = self.marks_at(path);
        let mut result = self.marks_at(goal).to_bitvec();
        let mut queue: VecDeque<usize> = result.iter_ones().collect();
        while let Some(i) = queue.pop_front() {
            for &pred in &self.backward[i] {
                if !result[pred] && path[pred] {
                    result.set(pred, true);
                    queue.push_back(pred);
                }
            }
        }
        result
    }

    /// Backward closure of `goal` through `path` states all of whose
    /// successors are already in the result.
    fn forall_until(&self, path: usize, goal: usize) -> BitVec {
        let path = self.marks_at(path);
        let mut result = self.marks_at(goal).to_bitvec();
        let mut counts = vec![0usize; self.nodes.len()];
        let mut queue: VecDeque<usize> = result.iter_ones().collect();
        while let Some(i) = queue.pop_front() {
            for &pred in &self.backward[i] {
                if result[pred] {
                    continue;
                }
                counts[pred] += 1;
                if path[pred] && counts[pred] == self.out_count[pred] {
                    result.set(pred, true);
                    queue.push_back(pred);
                }
            }
        }
        result
    }

    /// The CTL formula that was marked (the rewrite of the input formula).
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn model(&self) -> &'m M {
        self.model
    }

    /// The satisfaction set of the top-level formula.
    pub fn marks(&self) -> &BitSlice {
        self.marks_at(self.index_of(&self.formula))
    }

    /// The satisfaction set of a subformula of [`CtlMarker::formula`].
    pub fn satisfaction(&self, formula: &Formula) -> Option<&BitSlice> {
        let index = *self.subformulas.get(formula)?;
        self.marks[index].as_deref()
    }

    /// The satisfaction set of a registered proposition.
    pub fn proposition_marks(&self, prop: &Proposition) -> Option<&BitSlice> {
        let index = *self.prop_index.get(prop)?;
        Some(&self.prop_marks[index])
    }

    fn start_index(&self) -> usize {
        if let Some(index) = self.model.start_index() {
            return index;
        }
        let mut starts = self.prop_marks[self.start_prop].iter_ones();
        match (starts.next(), starts.next()) {
            (Some(start), None) => start,
            _ => panic!("model does not have a unique start state"),
        }
    }

    /// Whether the formula has the given truth value in the start state.
    pub fn has_value(&self, value: bool) -> bool {
        self.marks()[self.start_index()] == value
    }

    /// Whether the formula has the given truth value in `node`.
    pub fn has_node_value(&self, node: &M::Node, value: bool) -> bool {
        self.marks()[self.model.node_index(node)] == value
    }

    /// Number of states in which the formula has the given truth value.
    pub fn count(&self, value: bool) -> usize {
        let ones = self.marks().count_ones();
        if value {
            ones
        } else {
            self.nodes.len() - ones
        }
    }

    /// The states in which the formula has the given truth value, lazily.
    pub fn states(&self, value: bool) -> States<'_, M::Node> {
        States {
            marks: self.marks(),
            nodes: &self.nodes,
            value,
            next: 0,
        }
    }
}

/// Iterator over the states with a given truth value, scanning the bit vector.
/// Clone it to restart from the current position.
#[derive(Clone)]
pub struct States<'a, N> {
    marks: &'a BitSlice,
    nodes: &'a [N],
    value: bool,
    next: usize,
}

impl<'a, N> Iterator for States<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.marks.len() {
            let i = self.next;
            self.next += 1;
            if self.marks[i] == self.value {
                return Some(&self.nodes[i]);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.marks.len() - self.next))
    }
}
