//! Restriction of general temporal formulas to the CTL and LTL fragments.
//!
//! Both conversions rebuild the whole tree, so a converted formula never shares
//! nodes (and with them, conversion caches) with its source.

use super::{FormatError, Formula, LogicOp};

pub(super) fn to_ctl(formula: &Formula) -> Result<Formula, FormatError> {
    let mut errors = vec![];
    let result = ctl(formula, &mut errors);
    if errors.is_empty() {
        Ok(result)
    } else {
        Err(FormatError::from_messages(errors))
    }
}

pub(super) fn to_ltl(formula: &Formula) -> Result<Formula, FormatError> {
    let mut errors = vec![];
    let result = ltl(formula, &mut errors);
    if errors.is_empty() {
        Ok(result)
    } else {
        Err(FormatError::from_messages(errors))
    }
}

fn leaf(formula: &Formula) -> Formula {
    match formula.proposition() {
        Some(p) => Formula::prop(p.clone()),
        None if formula.op() == LogicOp::True => Formula::tt(),
        None => Formula::ff(),
    }
}

/// Rebuild `formula` with the same operator, converting the children with `f`.
fn rebuild(
    formula: &Formula,
    errors: &mut Vec<String>,
    f: fn(&Formula, &mut Vec<String>) -> Formula,
) -> Formula {
    match formula.op().arity() {
        0 => leaf(formula),
        1 => Formula::unary(formula.op(), f(formula.arg1(), errors)),
        _ => Formula::binary(
            formula.op(),
            f(formula.arg1(), errors),
            f(formula.arg2(), errors),
        ),
    }
}

fn ctl(formula: &Formula, errors: &mut Vec<String>) -> Formula {
    let op = formula.op();
    if !op.is_ctl_op() {
        errors.push(format!("operator '{op}' is not allowed in CTL: {formula}"));
        return rebuild(formula, errors, ctl);
    }
    if op.is_temporal() {
        errors.push(format!(
            "temporal operator '{op}' must be directly inside a path quantifier: {formula}"
        ));
        return rebuild(formula, errors, ctl);
    }
    if !op.is_path_quantifier() {
        return rebuild(formula, errors, ctl);
    }

    let path = formula.arg1();
    match path.op() {
        LogicOp::Next => Formula::unary(op, ctl(path.arg1(), errors).next()),
        LogicOp::Until => Formula::unary(
            op,
            ctl(path.arg1(), errors).until(ctl(path.arg2(), errors)),
        ),
        LogicOp::Eventually => Formula::unary(op, Formula::tt().until(ctl(path.arg1(), errors))),
        LogicOp::Always => Formula::unary(
            op.dual_quantifier(),
            Formula::tt().until(ctl(path.arg1(), errors).not()),
        )
        .not(),
        path_op if path_op.is_temporal() => {
            errors.push(format!(
                "operator '{path_op}' is not allowed in CTL: {path}"
            ));
            Formula::unary(op, rebuild(path, errors, ctl))
        }
        _ => {
            errors.push(format!(
                "path quantifier '{op}' must be followed by a temporal operator: {formula}"
            ));
            Formula::unary(op, ctl(path, errors))
        }
    }
}

fn ltl(formula: &Formula, errors: &mut Vec<String>) -> Formula {
    let op = formula.op();
    match op {
        LogicOp::Forall | LogicOp::Exists => {
            errors.push(format!(
                "path quantifier '{op}' is not allowed in LTL: {formula}"
            ));
            rebuild(formula, errors, ltl)
        }
        LogicOp::Follows => ltl(formula.arg2(), errors).implies(ltl(formula.arg1(), errors)),
        LogicOp::WeakUntil => {
            let a = ltl(formula.arg1(), errors);
            let b = ltl(formula.arg2(), errors);
            a.clone().until(b).or(a.always())
        }
        LogicOp::StrongRelease => {
            let a = ltl(formula.arg1(), errors);
            let b = ltl(formula.arg2(), errors);
            b.clone().until(a.and(b))
        }
        _ => rebuild(formula, errors, ltl),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    #[test]
    fn ctl_rewrites_eventually_and_always() {
        assert_eq!(
            to_ctl(&parse("E F a")).unwrap().to_string(),
            "E (true U a)"
        );
        assert_eq!(
            to_ctl(&parse("A G a")).unwrap().to_string(),
            "!E (true U !a)"
        );
        assert_eq!(
            to_ctl(&parse("E G a")).unwrap().to_string(),
            "!A (true U !a)"
        );
        assert_eq!(
            to_ctl(&parse("A (a U E X b)")).unwrap().to_string(),
            "A (a U E X b)"
        );
    }

    #[test]
    fn ctl_rewrite_is_idempotent() {
        for text in ["A G (a -> A F b)", "E (a U b) <-> !E X c", "a <- b"] {
            let once = to_ctl(&parse(text)).unwrap();
            let twice = to_ctl(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once.to_string(), twice.to_string());
        }
    }

    #[test]
    fn ctl_reports_every_illegal_combination() {
        let err = to_ctl(&parse("F a & A (a W b) & E c")).unwrap_err();
        assert_eq!(err.messages().len(), 3, "{err}");
        assert!(err.messages()[0].contains("'F'"));
        assert!(err.messages()[1].contains("'W'"));
        assert!(err.messages()[2].contains("'E'"));
    }

    #[test]
    fn ltl_rejects_quantifiers() {
        let err = to_ltl(&parse("G a & A X b & E F c")).unwrap_err();
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn ltl_rewrites_unsupported_operators() {
        assert_eq!(to_ltl(&parse("a <- b")).unwrap().to_string(), "b -> a");
        assert_eq!(
            to_ltl(&parse("a W b")).unwrap().to_string(),
            "a U b | G a"
        );
        assert_eq!(
            to_ltl(&parse("a M b")).unwrap().to_string(),
            "b U (a & b)"
        );
        assert_eq!(to_ltl(&parse("G (a R b)")).unwrap().to_string(), "G (a R b)");
    }
}
