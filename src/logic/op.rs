use std::collections::HashMap;

use once_cell::sync::Lazy;

/// The operators a [`super::Formula`] node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicOp {
    True,
    False,
    Prop,

    Not,
    And,
    Or,
    Implies,
    /// Reverse implication: `a <- b` means `b -> a`.
    Follows,
    Equiv,

    Next,
    Until,
    WeakUntil,
    Release,
    StrongRelease,
    Always,
    Eventually,

    Forall,
    Exists,
}

impl LogicOp {
    pub const ALL: [LogicOp; 18] = [
        LogicOp::True,
        LogicOp::False,
        LogicOp::Prop,
        LogicOp::Not,
        LogicOp::And,
        LogicOp::Or,
        LogicOp::Implies,
        LogicOp::Follows,
        LogicOp::Equiv,
        LogicOp::Next,
        LogicOp::Until,
        LogicOp::WeakUntil,
        LogicOp::Release,
        LogicOp::StrongRelease,
        LogicOp::Always,
        LogicOp::Eventually,
        LogicOp::Forall,
        LogicOp::Exists,
    ];

    /// Number of child formulas a node with this operator has.
    pub fn arity(self) -> usize {
        use LogicOp::*;
        match self {
            True | False | Prop => 0,
            Not | Next | Always | Eventually | Forall | Exists => 1,
            And | Or | Implies | Follows | Equiv | Until | WeakUntil | Release | StrongRelease => 2,
        }
    }

    /// Binding strength, higher binds tighter. Only used for printing and parsing.
    pub fn priority(self) -> u8 {
        use LogicOp::*;
        match self {
            True | False | Prop => 10,
            Not | Next | Always | Eventually | Forall | Exists => 9,
            Until | WeakUntil | Release | StrongRelease => 8,
            And => 7,
            Or => 6,
            Implies | Follows => 5,
            Equiv => 4,
        }
    }

    /// The textual symbol of the operator. Empty for [`LogicOp::Prop`].
    pub fn symbol(self) -> &'static str {
        use LogicOp::*;
        match self {
            True => "true",
            False => "false",
            Prop => "",
            Not => "!",
            And => "&",
            Or => "|",
            Implies => "->",
            Follows => "<-",
            Equiv => "<->",
            Next => "X",
            Until => "U",
            WeakUntil => "W",
            Release => "R",
            StrongRelease => "M",
            Always => "G",
            Eventually => "F",
            Forall => "A",
            Exists => "E",
        }
    }

    /// Look up an operator by its symbol.
    pub fn from_symbol(symbol: &str) -> Option<LogicOp> {
        OpTable::standard().get(symbol)
    }

    /// Operators that talk about the future of a single path.
    pub fn is_temporal(self) -> bool {
        use LogicOp::*;
        matches!(
            self,
            Next | Until | WeakUntil | Release | StrongRelease | Always | Eventually
        )
    }

    pub fn is_path_quantifier(self) -> bool {
        matches!(self, LogicOp::Forall | LogicOp::Exists)
    }

    /// Whether the operator may appear in a CTL formula at all.
    pub fn is_ctl_op(self) -> bool {
        !matches!(
            self,
            LogicOp::WeakUntil | LogicOp::Release | LogicOp::StrongRelease
        )
    }

    /// Whether the operator may appear in an LTL formula at all.
    pub fn is_ltl_op(self) -> bool {
        !self.is_path_quantifier()
    }

    /// The other path quantifier. Identity on everything else.
    pub fn dual_quantifier(self) -> LogicOp {
        match self {
            LogicOp::Forall => LogicOp::Exists,
            LogicOp::Exists => LogicOp::Forall,
            op => op,
        }
    }
}

impl std::fmt::Display for LogicOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicOp::Prop => write!(f, "prop"),
            op => write!(f, "{}", op.symbol()),
        }
    }
}

/// Symbol lookup table, built once and never mutated afterwards.
#[derive(Debug)]
pub struct OpTable(HashMap<&'static str, LogicOp>);

static STANDARD_OPS: Lazy<OpTable> = Lazy::new(|| {
    OpTable(
        LogicOp::ALL
            .iter()
            .filter(|op| **op != LogicOp::Prop)
            .map(|op| (op.symbol(), *op))
            .collect(),
    )
});

impl OpTable {
    pub fn standard() -> &'static OpTable {
        &STANDARD_OPS
    }

    pub fn get(&self, symbol: &str) -> Option<LogicOp> {
        self.0.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_round_trip() {
        for op in LogicOp::ALL {
            if op == LogicOp::Prop {
                assert_eq!(LogicOp::from_symbol(op.symbol()), None);
            } else {
                assert_eq!(LogicOp::from_symbol(op.symbol()), Some(op));
            }
        }
    }

    #[test]
    fn membership() {
        assert!(!LogicOp::Release.is_ctl_op());
        assert!(LogicOp::Until.is_ctl_op());
        assert!(!LogicOp::Exists.is_ltl_op());
        assert!(LogicOp::Release.is_ltl_op());
        assert_eq!(LogicOp::Forall.dual_quantifier(), LogicOp::Exists);
    }
}
