//! Textual syntax for formulas and propositions.
//!
//! Binary operators associate to the right. From loosest to tightest:
//! `<->`, `-> <-`, `|`, `&`, `U W R M`, then the prefix operators
//! `! X G F A E`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, anychar, char, digit1, multispace0, none_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult,
};

use super::{Argument, Constant, Formula, LogicOp, Proposition};

/// A formula or proposition could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("cannot parse '{input}' at '{rest}'")]
pub struct ParseError {
    input: String,
    rest: String,
}

const RESERVED: &[&str] = &[
    "X", "U", "W", "R", "M", "G", "F", "A", "E", "true", "false",
];

pub(super) fn is_reserved(name: &str) -> bool {
    name == "_" || RESERVED.contains(&name)
}

pub(super) fn parse_formula(input: &str) -> Result<Formula, ParseError> {
    all_consuming(ws(equiv))(input)
        .finish()
        .map(|(_, f)| f)
        .map_err(|e| ParseError {
            input: input.to_string(),
            rest: e.input.to_string(),
        })
}

impl Proposition {
    /// Parse a proposition: an identifier, a quoted label, or a call.
    pub fn parse(input: &str) -> Result<Proposition, ParseError> {
        all_consuming(ws(proposition))(input)
            .finish()
            .map(|(_, p)| p)
            .map_err(|e| ParseError {
                input: input.to_string(),
                rest: e.input.to_string(),
            })
    }

    /// Interpret an edge label as a rule identifier or call, if it is one.
    pub fn parse_label(label: &str) -> Option<Proposition> {
        match Self::parse(label) {
            Ok(p @ (Proposition::Id(_) | Proposition::Call { .. })) => Some(p),
            _ => None,
        }
    }
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A word-like operator that must not run into an identifier.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(terminated(tag(kw), not(satisfy(is_ident_char))))
}

fn symbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(tag(sym))
}

fn binary_level<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Formula>,
    this: fn(&'a str) -> IResult<&'a str, Formula>,
    operator: impl FnMut(&'a str) -> IResult<&'a str, LogicOp>,
) -> IResult<&'a str, Formula> {
    let (rest, lhs) = operand(input)?;
    let (rest, tail) = opt(pair(operator, this))(rest)?;
    Ok(match tail {
        Some((op, rhs)) => (rest, Formula::binary(op, lhs, rhs)),
        None => (rest, lhs),
    })
}

fn equiv(input: &str) -> IResult<&str, Formula> {
    binary_level(input, implies, equiv, value(LogicOp::Equiv, symbol("<->")))
}

fn implies(input: &str) -> IResult<&str, Formula> {
    binary_level(
        input,
        or,
        implies,
        alt((
            value(LogicOp::Implies, symbol("->")),
            value(
                LogicOp::Follows,
                ws(terminated(tag("<-"), not(char('>')))),
            ),
        )),
    )
}

fn or(input: &str) -> IResult<&str, Formula> {
    binary_level(input, and, or, value(LogicOp::Or, symbol("|")))
}

fn and(input: &str) -> IResult<&str, Formula> {
    binary_level(input, temporal, and, value(LogicOp::And, symbol("&")))
}

fn temporal(input: &str) -> IResult<&str, Formula> {
    binary_level(
        input,
        unary,
        temporal,
        alt((
            value(LogicOp::Until, keyword("U")),
            value(LogicOp::WeakUntil, keyword("W")),
            value(LogicOp::Release, keyword("R")),
            value(LogicOp::StrongRelease, keyword("M")),
        )),
    )
}

fn unary(input: &str) -> IResult<&str, Formula> {
    let prefix = alt((
        value(LogicOp::Not, symbol("!")),
        value(LogicOp::Next, keyword("X")),
        value(LogicOp::Always, keyword("G")),
        value(LogicOp::Eventually, keyword("F")),
        value(LogicOp::Forall, keyword("A")),
        value(LogicOp::Exists, keyword("E")),
    ));
    alt((
        map(pair(prefix, unary), |(op, arg)| Formula::unary(op, arg)),
        atom,
    ))(input)
}

fn atom(input: &str) -> IResult<&str, Formula> {
    alt((
        map(keyword("true"), |_| Formula::tt()),
        map(keyword("false"), |_| Formula::ff()),
        delimited(symbol("("), equiv, symbol(")")),
        map(ws(proposition), Formula::prop),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// A dotted name like `rules.move`, not a reserved word and not `_`.
fn qualified_name(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(identifier, many0_count(pair(char('.'), identifier)))),
        |name: &str| !is_reserved(name),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((preceded(char('\\'), anychar), none_of("\\\"")))),
            char('"'),
        ),
        |chars| chars.into_iter().collect(),
    )(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

fn argument(input: &str) -> IResult<&str, Argument> {
    ws(alt((
        value(
            Argument::Wildcard,
            terminated(tag("_"), not(satisfy(is_ident_char))),
        ),
        map(string_literal, |s| Argument::Const(Constant::Str(s))),
        map(integer, |i| Argument::Const(Constant::Int(i))),
        map(identifier, |name| Argument::Name(name.to_string())),
    )))(input)
}

fn proposition(input: &str) -> IResult<&str, Proposition> {
    alt((
        map(string_literal, Proposition::Label),
        map(
            tuple((
                qualified_name,
                opt(delimited(
                    symbol("("),
                    separated_list0(char(','), argument),
                    char(')'),
                )),
            )),
            |(name, args)| match args {
                Some(args) => Proposition::call(name, args),
                None => Proposition::id(name),
            },
        ),
    ))(input)
}
