//! The on-the-fly product of a system state space and a Büchi automaton.
//!
//! Product states are uniqued by their immutable key, a [`ProductState`].
//! Everything the search learns about a state at run time lives in a side
//! arena indexed by [`ProductId`].

mod search;

use std::{cell::RefCell, collections::HashMap, fmt::Debug, hash::Hash, rc::Rc};

pub use search::{check_ltl, Counterexample, LtlOutcome, NestedDfs, SearchConfig};

use crate::buchi::{LocationId, TransitionRef};

/// A system state paired with an automaton location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductState<S> {
    pub state: S,
    pub location: LocationId,
}

/// Dense id of a state in a [`ProductStateSet`], in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("p{_0}")]
pub struct ProductId(pub usize);

/// Search colours of the nested depth-first search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// not yet visited
    #[default]
    White,
    /// on the stack of the outer search
    Cyan,
    /// finished by the outer search
    Blue,
    /// visited by an inner search
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductTransition {
    pub source: ProductId,
    pub target: ProductId,
    /// label of the system edge taken, or `None` when a deadlocked state stutters
    pub event: Option<String>,
    pub buchi: TransitionRef,
}

#[derive(Debug, Clone, Default)]
struct ProductMeta {
    color: Color,
    pocket: bool,
    iteration: usize,
    closed: bool,
    incoming: Option<ProductTransition>,
    outgoing: Option<Vec<ProductTransition>>,
}

/// Notified when a [`ProductStateSet`] grows or a state in it is closed.
pub trait ProductListener<S> {
    fn add_update(&mut self, _set: &ProductStateSet<S>, _id: ProductId) {}

    fn close_update(&mut self, _set: &ProductStateSet<S>, _id: ProductId) {}
}

pub type SharedListener<S> = Rc<RefCell<dyn ProductListener<S>>>;

/// The set of product states found so far.
pub struct ProductStateSet<S> {
    index: HashMap<ProductState<S>, ProductId>,
    states: Vec<ProductState<S>>,
    meta: Vec<ProductMeta>,
    closed_count: usize,
    listeners: Vec<SharedListener<S>>,
}

impl<S> Default for ProductStateSet<S> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            states: vec![],
            meta: vec![],
            closed_count: 0,
            listeners: vec![],
        }
    }
}

impl<S: Debug> Debug for ProductStateSet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductStateSet")
            .field("states", &self.states)
            .field("closed_count", &self.closed_count)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<S: Clone + Eq + Hash> ProductStateSet<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state unless an equal one is already present.
    ///
    /// Returns the id of the existing state, or `None` if the state is new.
    pub fn add_state(&mut self, state: ProductState<S>) -> Option<ProductId> {
        match self.insert(state) {
            (id, false) => Some(id),
            (_, true) => None,
        }
    }

    /// Like [`Self::add_state`], but always yields the id, along with
    /// whether the state was inserted.
    pub(crate) fn insert(&mut self, state: ProductState<S>) -> (ProductId, bool) {
        if let Some(id) = self.index.get(&state) {
            return (*id, false);
        }
        let id = ProductId(self.states.len());
        self.index.insert(state.clone(), id);
        self.states.push(state);
        self.meta.push(ProductMeta::default());
        for listener in &self.listeners {
            listener.borrow_mut().add_update(self, id);
        }
        (id, true)
    }

    pub fn find(&self, state: &ProductState<S>) -> Option<ProductId> {
        self.index.get(state).copied()
    }
}

impl<S> ProductStateSet<S> {
    /// Mark a state as fully explored.
    pub fn set_closed(&mut self, id: ProductId) {
        let meta = &mut self.meta[id.0];
        if !meta.closed {
            meta.closed = true;
            self.closed_count += 1;
        }
        for listener in &self.listeners {
            listener.borrow_mut().close_update(self, id);
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed_count
    }

    pub fn open_state_count(&self) -> usize {
        self.state_count() - self.closed_count
    }

    pub fn has_open_states(&self) -> bool {
        self.open_state_count() > 0
    }

    pub fn add_listener(&mut self, listener: SharedListener<S>) {
        self.listeners.push(listener);
    }

    /// Panics if the listener was never added.
    pub fn remove_listener(&mut self, listener: &SharedListener<S>) {
        let position = self
            .listeners
            .iter()
            .position(|l| std::ptr::addr_eq(Rc::as_ptr(l), Rc::as_ptr(listener)));
        assert!(position.is_some(), "removing a listener that was never added");
        if let Some(position) = position {
            self.listeners.remove(position);
        }
    }

    pub fn state(&self, id: ProductId) -> &ProductState<S> {
        &self.states[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, &ProductState<S>)> {
        self.states.iter().enumerate().map(|(i, s)| (ProductId(i), s))
    }

    pub fn color(&self, id: ProductId) -> Color {
        self.meta[id.0].color
    }

    pub fn set_color(&mut self, id: ProductId, color: Color) {
        self.meta[id.0].color = color;
    }

    /// Paint every state white again, keeping everything else.
    pub fn reset_colors(&mut self) {
        for meta in &mut self.meta {
            meta.color = Color::White;
        }
    }

    /// Whether the state is known to have no successors.
    pub fn is_pocket(&self, id: ProductId) -> bool {
        self.meta[id.0].pocket
    }

    /// Panics if the state is already a pocket.
    pub fn set_pocket(&mut self, id: ProductId) {
        let meta = &mut self.meta[id.0];
        assert!(!meta.pocket, "pocket flag of {id} is already set");
        meta.pocket = true;
    }

    /// The search iteration that last cut the search off at this state, or 0.
    pub fn iteration(&self, id: ProductId) -> usize {
        self.meta[id.0].iteration
    }

    pub fn set_iteration(&mut self, id: ProductId, iteration: usize) {
        self.meta[id.0].iteration = iteration;
    }

    pub fn is_closed(&self, id: ProductId) -> bool {
        self.meta[id.0].closed
    }

    /// The transition through which the state was first reached.
    pub fn incoming(&self, id: ProductId) -> Option<&ProductTransition> {
        self.meta[id.0].incoming.as_ref()
    }

    pub fn set_incoming(&mut self, id: ProductId, transition: ProductTransition) {
        self.meta[id.0].incoming = Some(transition);
    }

    /// The successors of the state, once it has been explored.
    pub fn outgoing(&self, id: ProductId) -> Option<&[ProductTransition]> {
        self.meta[id.0].outgoing.as_deref()
    }

    pub fn set_outgoing(&mut self, id: ProductId, transitions: Vec<ProductTransition>) {
        self.meta[id.0].outgoing = Some(transitions);
    }
}
