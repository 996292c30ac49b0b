//! Just enough parsing to read the Promela never claims printed by ltl2ba/ltl3ba.
//!
//! ```text
//! never { /* F !p */
//! T0_init:
//!     if
//!     :: (!p) -> goto accept_all
//!     :: (1) -> goto T0_init
//!     fi;
//! accept_all:
//!     skip
//! }
//! ```
//!
//! States whose name contains `accept_` are accepting, and the state whose
//! name ends in `_init` is initial (or else the first one declared). A `skip`
//! body accepts anything from then on; a `false;` body accepts nothing.

use std::collections::HashMap;

use anyhow::{anyhow, bail};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair},
    Finish, IResult,
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Literal, TranslatorEdge, TranslatorGraph, TranslatorNode};
use crate::logic::PropositionMapping;

static STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+):").unwrap());
static TRANSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::\s*(.+?)\s*->\s*goto\s+(\w+)").unwrap());

/// A guard literal before its atom is resolved: `None` for `1`, `Some((name, negated))` otherwise.
type RawLiteral<'a> = Option<(&'a str, bool)>;

/// Parse a never claim, resolving guard identifiers through `mapping`.
///
/// Each disjunct of a guard becomes its own edge.
pub fn parse(promela: &str, mapping: &impl PropositionMapping) -> anyhow::Result<TranslatorGraph> {
    let mut graph = TranslatorGraph::default();
    let mut ids: HashMap<String, usize> = HashMap::new();
    // (source, disjuncts, target name), resolved once all states are known
    let mut pending: Vec<(usize, Vec<Vec<RawLiteral>>, String)> = vec![];
    let mut current: Option<usize> = None;

    for line in promela.lines() {
        if let Some(captures) = STATE.captures(line) {
            let name = &captures[1];
            if ids.contains_key(name) {
                bail!("state '{name}' is declared twice");
            }
            let id = graph.nodes.len();
            graph.nodes.push(TranslatorNode {
                name: name.to_string(),
                accepting: name.contains("accept_"),
            });
            ids.insert(name.to_string(), id);
            if name.ends_with("_init") {
                graph.initial = Some(id);
            }
            current = Some(id);
        } else if let Some(captures) = TRANSITION.captures(line) {
            let source = current.ok_or_else(|| anyhow!("transition outside of a state: {line}"))?;
            let (guard, target) = match (captures.get(1), captures.get(2)) {
                (Some(guard), Some(target)) => (guard.as_str(), target.as_str()),
                _ => unreachable!("both groups are mandatory"),
            };
            let disjuncts = parse_guard(guard)
                .map_err(|e| anyhow!("cannot parse guard '{guard}' at '{}'", e.input))?;
            pending.push((source, disjuncts, target.to_string()));
        } else if line.trim() == "skip" {
            let source = current.ok_or_else(|| anyhow!("skip outside of a state"))?;
            graph.nodes[source].accepting = true;
            pending.push((source, vec![vec![]], graph.nodes[source].name.clone()));
        }
    }

    if graph.initial.is_none() && !graph.nodes.is_empty() {
        graph.initial = Some(0);
    }

    let names: Vec<String> = graph.nodes.iter().map(|n| n.name.clone()).collect();
    for (source, disjuncts, target) in pending {
        let target = *ids
            .get(&target)
            .ok_or_else(|| anyhow!("goto unknown state '{target}' from '{}'", names[source]))?;
        for conjunct in disjuncts {
            let guard = conjunct
                .into_iter()
                .flatten()
                .map(|(name, negated)| {
                    mapping
                        .map(name)
                        .map(|atom| Literal::new(atom, negated))
                        .ok_or_else(|| anyhow!("unknown proposition '{name}' in never claim"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            graph.edges.push(TranslatorEdge {
                source,
                target,
                action: String::new(),
                guard,
            });
        }
    }

    Ok(graph)
}

fn parse_guard(input: &str) -> Result<Vec<Vec<RawLiteral>>, nom::error::Error<&str>> {
    all_consuming(disjunction)(input)
        .finish()
        .map(|(_, disjuncts)| disjuncts.into_iter().flatten().collect())
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// `Some(None)` is the trivially true literal; `None` is `0`, which kills the conjunct.
fn literal(input: &str) -> IResult<&str, Option<RawLiteral>> {
    ws(alt((
        value(Some(None), tag("1")),
        value(None, tag("0")),
        map(pair(opt(ws(char('!'))), identifier), |(neg, name)| {
            Some(Some((name, neg.is_some())))
        }),
    )))(input)
}

/// `None` if some literal is `0`.
fn conjunction(input: &str) -> IResult<&str, Option<Vec<RawLiteral>>> {
    map(separated_list1(tag("&&"), literal), |literals| {
        literals.into_iter().collect()
    })(input)
}

fn disjunct(input: &str) -> IResult<&str, Option<Vec<RawLiteral>>> {
    ws(alt((delimited(char('('), conjunction, char(')')), conjunction)))(input)
}

fn disjunction(input: &str) -> IResult<&str, Vec<Option<Vec<RawLiteral>>>> {
    separated_list1(tag("||"), disjunct)(input)
}
