//! Model checking over explored state graphs.
//!
//! Two checkers share one formula language ([`logic::Formula`]):
//!
//! - [`ctl::CtlMarker`] labels every state of a finite [`model::Model`] with
//!   the truth of a CTL formula.
//! - [`product::check_ltl`] searches the product of a model and the Büchi
//!   automaton ([`buchi::BuchiGraph`]) of a negated LTL formula for an
//!   accepting lasso.

pub mod buchi;
pub mod ctl;
pub mod logic;
pub mod model;
pub mod product;

pub use logic::Formula;
pub use model::Model;

pub mod prelude {
    #[cfg(feature = "ltl3ba")]
    pub use crate::buchi::Ltl3ba;
    pub use crate::buchi::{BuchiGraph, LtlTranslator};
    pub use crate::ctl::CtlMarker;
    pub use crate::logic::{FormatError, Formula, Proposition};
    pub use crate::model::{Edge, Flag, GraphModel, Model};
    pub use crate::product::{check_ltl, LtlOutcome, NestedDfs, SearchConfig};
}
