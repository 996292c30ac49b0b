use std::process::Command;

use anyhow::{anyhow, bail, Context};

use super::{never_claim, LtlTranslator, TranslatorGraph};
use crate::logic::{Formula, LogicOp, PropositionRegistry};

/// Translates formulas by running the external `ltl3ba` tool and reading
/// back the never claim it prints.
#[derive(Debug, Clone)]
pub struct Ltl3ba {
    binary: String,
}

impl Default for Ltl3ba {
    fn default() -> Self {
        Self {
            binary: "ltl3ba".to_string(),
        }
    }
}

impl Ltl3ba {
    /// Use a differently named or located executable.
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

impl LtlTranslator for Ltl3ba {
    fn translate(&self, formula: &Formula) -> anyhow::Result<TranslatorGraph> {
        let formula = formula.to_ltl_formula()?;
        let mut registry = PropositionRegistry::empty();
        let input = render(&formula, &mut registry)?;
        tracing::debug!("running {} -f '{input}'", self.binary);

        let output = Command::new(&self.binary)
            .args(["-f", &input])
            .output()
            .with_context(|| format!("failed to run '{}'", self.binary))?;
        let promela = String::from_utf8_lossy(&output.stdout);

        if promela.contains("expected predicate") || !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} couldn't translate '{input}': {promela}{stderr}",
                self.binary
            ));
        }

        never_claim::parse(&promela, &registry)
    }
}

/// The formula in ltl3ba's input syntax, registering its propositions on the way.
fn render(formula: &Formula, registry: &mut PropositionRegistry) -> anyhow::Result<String> {
    use LogicOp::*;
    if let Some(p) = formula.proposition() {
        return registry.add(p.clone());
    }
    let mut arg = |i: usize| render(&formula.args()[i], registry);
    Ok(match formula.op() {
        True => "true".to_string(),
        False => "false".to_string(),
        Prop => unreachable!("proposition node without a proposition"),
        Not => format!("!({})", arg(0)?),
        Next => format!("X ({})", arg(0)?),
        Always => format!("[] ({})", arg(0)?),
        Eventually => format!("<> ({})", arg(0)?),
        And => format!("({}) && ({})", arg(0)?, arg(1)?),
        Or => format!("({}) || ({})", arg(0)?, arg(1)?),
        Implies => format!("({}) -> ({})", arg(0)?, arg(1)?),
        Equiv => format!("({}) <-> ({})", arg(0)?, arg(1)?),
        Until => format!("({}) U ({})", arg(0)?, arg(1)?),
        Release => format!("({}) V ({})", arg(0)?, arg(1)?),
        op @ (Follows | WeakUntil | StrongRelease | Forall | Exists) => {
            bail!("operator '{op}' has no ltl3ba counterpart in {formula}")
        }
    })
}
