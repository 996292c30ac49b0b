use std::fmt::Display;

use itertools::Itertools;

/// A constant argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    Str(String),
    Int(i64),
}

impl Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Str(s) => write_quoted(f, s),
            Constant::Int(i) => write!(f, "{i}"),
        }
    }
}

/// One argument of a [`Proposition::Call`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Argument {
    /// A bound name, e.g. a node identifier.
    Name(String),
    Const(Constant),
    /// `_`, matches any argument.
    Wildcard,
}

impl Argument {
    pub fn matches(&self, other: &Argument) -> bool {
        match (self, other) {
            (Argument::Wildcard, _) | (_, Argument::Wildcard) => true,
            (a, b) => a == b,
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Name(name) => write!(f, "{name}"),
            Argument::Const(c) => write!(f, "{c}"),
            Argument::Wildcard => write!(f, "_"),
        }
    }
}

impl From<&str> for Argument {
    fn from(name: &str) -> Self {
        if name == "_" {
            Argument::Wildcard
        } else {
            Argument::Name(name.to_string())
        }
    }
}

impl From<i64> for Argument {
    fn from(i: i64) -> Self {
        Argument::Const(Constant::Int(i))
    }
}

/// An atomic proposition: something that holds or fails in a single state.
///
/// Propositions are tested against the labels of the outgoing edges of a state
/// (typically the names of applicable rules, possibly with their arguments),
/// or against the special state flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Proposition {
    /// A (possibly dotted) rule or label name without arguments.
    /// Matches any call of that name.
    Id(String),
    /// A rule name applied to arguments.
    Call { name: String, args: Vec<Argument> },
    /// Raw label text, matched literally.
    Label(String),
}

impl Proposition {
    pub fn id(name: impl Into<String>) -> Self {
        Proposition::Id(name.into())
    }

    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Argument>) -> Self {
        Proposition::Call {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Proposition::Label(text.into())
    }

    /// The rule name of an `Id` or `Call` proposition.
    pub fn name(&self) -> Option<&str> {
        match self {
            Proposition::Id(name) | Proposition::Call { name, .. } => Some(name),
            Proposition::Label(_) => None,
        }
    }

    /// The text an edge label must have to match this proposition exactly.
    pub fn text(&self) -> String {
        match self {
            Proposition::Label(text) => text.clone(),
            p => p.to_string(),
        }
    }

    /// Whether the two propositions may describe the same thing.
    ///
    /// - `p` matches `p` and any call `p(..)`
    /// - `p(a, b)` matches `p(c, d)` iff the arities agree and each argument pair
    ///   matches (`_` matches anything)
    /// - a `Label` matches anything with the same textual form
    pub fn matches(&self, other: &Proposition) -> bool {
        use Proposition::*;
        match (self, other) {
            (Label(_), _) | (_, Label(_)) => self.text() == other.text(),
            (Id(a), Id(b)) | (Id(a), Call { name: b, .. }) | (Call { name: a, .. }, Id(b)) => {
                a == b
            }
            (
                Call {
                    name: a,
                    args: a_args,
                },
                Call {
                    name: b,
                    args: b_args,
                },
            ) => {
                a == b
                    && a_args.len() == b_args.len()
                    && a_args.iter().zip(b_args).all(|(x, y)| x.matches(y))
            }
        }
    }
}

impl Display for Proposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proposition::Id(name) => write!(f, "{name}"),
            Proposition::Call { name, args } => {
                write!(f, "{name}({})", args.iter().join(","))
            }
            Proposition::Label(text) => write_quoted(f, text),
        }
    }
}

impl From<&str> for Proposition {
    fn from(name: &str) -> Self {
        Proposition::id(name)
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str) -> std::fmt::Result {
    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(args: &[&str]) -> Proposition {
        Proposition::call("p", args.iter().map(|a| Argument::from(*a)))
    }

    #[test]
    fn call_matches_id_both_ways() {
        let id = Proposition::id("p");
        assert!(p(&["x"]).matches(&id));
        assert!(id.matches(&p(&["x"])));
        assert!(!Proposition::id("q").matches(&p(&["x"])));
    }

    #[test]
    fn distinct_constants_do_not_match() {
        assert!(!p(&["a"]).matches(&p(&["b"])));
        assert!(p(&["a"]).matches(&p(&["a"])));
        assert!(!p(&["a"]).matches(&p(&["a", "b"])));
    }

    #[test]
    fn wildcard_matches_anything() {
        assert!(p(&["_"]).matches(&p(&["anything"])));
        assert!(p(&["anything"]).matches(&p(&["_"])));
        let int = Proposition::call("p", [Argument::from(3)]);
        assert!(p(&["_"]).matches(&int));
    }

    #[test]
    fn label_matches_textual_form() {
        assert!(Proposition::label("p(a)").matches(&p(&["a"])));
        assert!(p(&["a"]).matches(&Proposition::label("p(a)")));
        assert!(!Proposition::label("p(a)").matches(&p(&["_"])));
        assert!(Proposition::label("open").matches(&Proposition::id("open")));
    }

    #[test]
    fn display() {
        let call = Proposition::call(
            "move",
            [
                Argument::Name("n1".into()),
                Argument::Const(Constant::Str("say \"hi\"".into())),
                Argument::Wildcard,
                Argument::from(-2),
            ],
        );
        assert_eq!(call.to_string(), r#"move(n1,"say \"hi\"",_,-2)"#);
        assert_eq!(Proposition::label("a b").to_string(), "\"a b\"");
        assert_eq!(Proposition::label("a b").text(), "a b");
    }
}
