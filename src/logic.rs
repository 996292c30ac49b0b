//! Temporal formulas over atomic propositions.
//!
//! A [`Formula`] is an immutable, cheaply clonable tree. The same tree can be
//! fed to the CTL marker (after [`Formula::to_ctl_formula`]) or to the Büchi
//! builder (after [`Formula::to_ltl_formula`]); each formula remembers which of
//! the two it was converted for, and refuses the other.
//!
//! ```
//! use gtverify::logic::Formula;
//!
//! let f: Formula = "A G (request -> A F grant)".parse().unwrap();
//! assert!(f.is_ctl_formula());
//! assert!(!f.is_ltl_formula());
//! ```

mod op;
mod parser;
mod proposition;
mod registry;
mod restrict;

use std::{fmt::Display, hash::Hash, sync::Arc};

use itertools::Itertools;
use once_cell::sync::OnceCell;

pub use op::{LogicOp, OpTable};
pub use parser::ParseError;
pub use proposition::{Argument, Constant, Proposition};
pub use registry::{PropositionMapping, PropositionRegistry};

/// Illegal operator combinations found while restricting a formula to CTL or LTL.
///
/// Carries one message per offending subformula.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct FormatError {
    messages: Vec<String>,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn from_messages(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages.iter().join("\n"))
    }
}

/// A temporal formula.
#[derive(Clone)]
pub struct Formula(Arc<FormulaNode>);

struct FormulaNode {
    op: LogicOp,
    args: Vec<Formula>,
    prop: Option<Proposition>,
    conversion: OnceCell<Conversion>,
}

enum Conversion {
    Ctl(Result<Formula, FormatError>),
    Ltl(Result<Formula, FormatError>),
}

impl Formula {
    fn build(op: LogicOp, args: Vec<Formula>, prop: Option<Proposition>) -> Self {
        assert_eq!(
            args.len(),
            op.arity(),
            "operator {op} takes {} arguments",
            op.arity()
        );
        assert_eq!(
            prop.is_some(),
            op == LogicOp::Prop,
            "only proposition nodes carry a proposition"
        );
        Self(Arc::new(FormulaNode {
            op,
            args,
            prop,
            conversion: OnceCell::new(),
        }))
    }

    pub fn tt() -> Self {
        Self::build(LogicOp::True, vec![], None)
    }

    pub fn ff() -> Self {
        Self::build(LogicOp::False, vec![], None)
    }

    /// Build a proposition node. Panics if the proposition is named by a
    /// reserved word like `X` or `true`, which would print as something else.
    pub fn prop(prop: impl Into<Proposition>) -> Self {
        let prop = prop.into();
        if let Some(name) = prop.name() {
            assert!(
                !parser::is_reserved(name),
                "'{name}' is reserved and cannot name a proposition"
            );
        }
        Self::build(LogicOp::Prop, vec![], Some(prop))
    }

    /// Build a node for a unary operator. Panics if `op` is not unary.
    pub fn unary(op: LogicOp, arg: Formula) -> Self {
        Self::build(op, vec![arg], None)
    }

    /// Build a node for a binary operator. Panics if `op` is not binary.
    pub fn binary(op: LogicOp, arg1: Formula, arg2: Formula) -> Self {
        Self::build(op, vec![arg1, arg2], None)
    }

    pub fn not(self) -> Self {
        Self::unary(LogicOp::Not, self)
    }

    pub fn and(self, other: Self) -> Self {
        Self::binary(LogicOp::And, self, other)
    }

    pub fn or(self, other: Self) -> Self {
        Self::binary(LogicOp::Or, self, other)
    }

    pub fn implies(self, other: Self) -> Self {
        Self::binary(LogicOp::Implies, self, other)
    }

    pub fn follows(self, other: Self) -> Self {
        Self::binary(LogicOp::Follows, self, other)
    }

    pub fn equiv(self, other: Self) -> Self {
        Self::binary(LogicOp::Equiv, self, other)
    }

    pub fn next(self) -> Self {
        Self::unary(LogicOp::Next, self)
    }

    pub fn until(self, other: Self) -> Self {
        Self::binary(LogicOp::Until, self, other)
    }

    pub fn weak_until(self, other: Self) -> Self {
        Self::binary(LogicOp::WeakUntil, self, other)
    }

    pub fn release(self, other: Self) -> Self {
        Self::binary(LogicOp::Release, self, other)
    }

    pub fn strong_release(self, other: Self) -> Self {
        Self::binary(LogicOp::StrongRelease, self, other)
    }

    pub fn always(self) -> Self {
        Self::unary(LogicOp::Always, self)
    }

    pub fn eventually(self) -> Self {
        Self::unary(LogicOp::Eventually, self)
    }

    /// Wrap in the universal path quantifier `A`.
    pub fn forall(self) -> Self {
        Self::unary(LogicOp::Forall, self)
    }

    /// Wrap in the existential path quantifier `E`.
    pub fn exists(self) -> Self {
        Self::unary(LogicOp::Exists, self)
    }

    pub fn op(&self) -> LogicOp {
        self.0.op
    }

    pub fn args(&self) -> &[Formula] {
        &self.0.args
    }

    /// First child. Panics on nullary nodes.
    pub fn arg1(&self) -> &Formula {
        &self.0.args[0]
    }

    /// Second child. Panics on nodes of arity < 2.
    pub fn arg2(&self) -> &Formula {
        &self.0.args[1]
    }

    pub fn proposition(&self) -> Option<&Proposition> {
        self.0.prop.as_ref()
    }

    /// The distinct propositions occurring in this formula, in discovery order.
    pub fn props(&self) -> Vec<Proposition> {
        let mut props = vec![];
        self.collect_props(&mut props);
        props
    }

    fn collect_props(&self, props: &mut Vec<Proposition>) {
        if let Some(p) = self.proposition() {
            if !props.contains(p) {
                props.push(p.clone());
            }
        }
        for arg in self.args() {
            arg.collect_props(props);
        }
    }

    /// Parse a formula from its textual syntax.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parser::parse_formula(text)
    }

    /// The CTL rewrite of this formula: `Q F φ` becomes `Q(true U φ)` and
    /// `Q G φ` becomes `¬Q'(true U ¬φ)`, leaving only `X` and `U` under path
    /// quantifiers.
    ///
    /// Fails if the formula is not CTL, or if it was already converted to LTL.
    pub fn to_ctl_formula(&self) -> Result<Formula, FormatError> {
        match self
            .0
            .conversion
            .get_or_init(|| Conversion::Ctl(restrict::to_ctl(self)))
        {
            Conversion::Ctl(result) => result.clone(),
            Conversion::Ltl(_) => Err(FormatError::new(format!(
                "'{self}' is already in use as an LTL formula"
            ))),
        }
    }

    /// The LTL rewrite of this formula, using only operators that common
    /// LTL-to-Büchi translators understand (no `<-`, `W` or `M`).
    ///
    /// Fails if the formula contains path quantifiers, or if it was already
    /// converted to CTL.
    pub fn to_ltl_formula(&self) -> Result<Formula, FormatError> {
        match self
            .0
            .conversion
            .get_or_init(|| Conversion::Ltl(restrict::to_ltl(self)))
        {
            Conversion::Ltl(result) => result.clone(),
            Conversion::Ctl(_) => Err(FormatError::new(format!(
                "'{self}' is already in use as a CTL formula"
            ))),
        }
    }

    /// Whether [`Formula::to_ctl_formula`] would succeed. Does not tag the formula.
    pub fn is_ctl_formula(&self) -> bool {
        match self.0.conversion.get() {
            Some(Conversion::Ctl(result)) => result.is_ok(),
            Some(Conversion::Ltl(_)) => false,
            None => restrict::to_ctl(self).is_ok(),
        }
    }

    /// Whether [`Formula::to_ltl_formula`] would succeed. Does not tag the formula.
    pub fn is_ltl_formula(&self) -> bool {
        match self.0.conversion.get() {
            Some(Conversion::Ltl(result)) => result.is_ok(),
            Some(Conversion::Ctl(_)) => false,
            None => restrict::to_ltl(self).is_ok(),
        }
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.op == other.0.op
                && self.0.prop == other.0.prop
                && self.0.args == other.0.args)
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.op.hash(state);
        self.0.prop.hash(state);
        self.0.args.hash(state);
    }
}

impl std::str::FromStr for Formula {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl From<Proposition> for Formula {
    fn from(p: Proposition) -> Self {
        Formula::prop(p)
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.op();
        match op.arity() {
            0 => match self.proposition() {
                Some(p) => write!(f, "{p}"),
                None => write!(f, "{}", op.symbol()),
            },
            1 => {
                let sep = if op == LogicOp::Not { "" } else { " " };
                write!(f, "{}{sep}", op.symbol())?;
                write_operand(f, self.arg1(), self.arg1().op().priority() < op.priority())
            }
            _ => {
                // binary operators associate to the right
                let left = self.arg1();
                let right = self.arg2();
                write_operand(f, left, left.op().priority() <= op.priority())?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right.op().priority() < op.priority())
            }
        }
    }
}

fn write_operand(
    f: &mut std::fmt::Formatter<'_>,
    operand: &Formula,
    parenthesize: bool,
) -> std::fmt::Result {
    if parenthesize {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl std::fmt::Debug for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Formula({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Formula {
        Formula::prop(name)
    }

    #[test]
    fn display_parenthesizes_by_priority() {
        let f = p("a").or(p("b")).and(p("c").not());
        assert_eq!(f.to_string(), "(a | b) & !c");

        let f = p("a").until(p("b")).until(p("c"));
        assert_eq!(f.to_string(), "(a U b) U c");

        let f = p("a").until(p("b").until(p("c")));
        assert_eq!(f.to_string(), "a U b U c");

        let f = p("a").eventually().forall().always();
        assert_eq!(f.to_string(), "G A F a");

        let f = p("a").and(p("b")).next().exists();
        assert_eq!(f.to_string(), "E X (a & b)");
    }

    #[test]
    #[should_panic(expected = "'X' is reserved")]
    fn operator_names_are_not_propositions() {
        p("X");
    }

    #[test]
    #[should_panic(expected = "'true' is reserved")]
    fn constant_names_are_not_calls() {
        Formula::prop(Proposition::call("true", [Argument::from("a")]));
    }

    #[test]
    fn printed_propositions_parse_back() {
        for f in [
            p("Xa"),
            p("trueish"),
            Formula::prop(Proposition::label("X")),
            Formula::prop(Proposition::call("go", [Argument::Wildcard, Argument::from("n1")])),
        ] {
            assert_eq!(Formula::parse(&f.to_string()).unwrap(), f);
        }
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(p("a").and(p("b")), p("a").and(p("b")));
        assert_ne!(p("a").and(p("b")), p("b").and(p("a")));
        assert_ne!(p("a"), Formula::prop(Proposition::label("a")));
        assert_ne!(p("a").or(p("b")), p("a").and(p("b")));
    }

    #[test]
    #[should_panic]
    fn arity_is_checked() {
        Formula::unary(LogicOp::And, p("a"));
    }

    #[test]
    fn props_in_discovery_order() {
        let f = p("b").and(p("a").or(p("b")));
        assert_eq!(f.props(), vec![Proposition::id("b"), Proposition::id("a")]);
    }

    #[test]
    fn conversions_are_exclusive() {
        let f = p("a").and(p("b"));
        assert!(f.to_ctl_formula().is_ok());
        assert!(f.to_ctl_formula().is_ok());
        let err = f.to_ltl_formula().unwrap_err();
        assert!(err.to_string().contains("CTL"));

        let g = p("a").and(p("b"));
        assert!(g.to_ltl_formula().is_ok());
        assert!(g.to_ctl_formula().is_err());
        assert!(!g.is_ctl_formula());
        assert!(g.is_ltl_formula());

        // asking does not tag
        let h = p("a").and(p("b"));
        assert!(h.is_ctl_formula());
        assert!(h.is_ltl_formula());
        assert!(h.to_ltl_formula().is_ok());
    }
}
