use std::collections::HashMap;

use super::Proposition;

/// Maps identifiers used by an external LTL translator to [`Proposition`]s.
///
/// Translators like `ltl3ba` only accept plain lowercase identifiers as atoms,
/// while propositions can be calls with quoted arguments. When registering a
/// proposition, its textual form is squashed into such an identifier; the
/// registry remembers the way back.
#[derive(Clone, Debug, Default)]
pub struct PropositionRegistry {
    by_name: HashMap<String, Proposition>,
    names: HashMap<Proposition, String>,
}

impl PropositionRegistry {
    /// Create an empty [`PropositionRegistry`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a [`PropositionRegistry`] pre-populated with a list of propositions.
    pub fn new(ps: impl IntoIterator<Item = Proposition>) -> anyhow::Result<Self> {
        let mut props = Self::empty();
        for p in ps {
            props.add(p)?;
        }
        Ok(props)
    }

    /// Add a proposition and return the identifier standing for it.
    /// Adding the same proposition twice yields the same identifier.
    pub fn add(&mut self, p: Proposition) -> anyhow::Result<String> {
        if let Some(name) = self.names.get(&p) {
            return Ok(name.clone());
        }
        let disp = p.to_string();
        let name = disp
            .to_lowercase()
            .replace(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'), "_");
        // `true` and `false` are constants to the translator
        let name = if name.starts_with(|ch: char| !ch.is_ascii_alphabetic())
            || name == "true"
            || name == "false"
        {
            format!("p_{name}")
        } else {
            name
        };

        if let Some(old) = self.by_name.get(&name) {
            anyhow::bail!(
                "propositions {old} and {disp} both map to the identifier '{name}'"
            );
        }
        self.by_name.insert(name.clone(), p.clone());
        self.names.insert(p, name.clone());
        Ok(name)
    }

    /// The identifier of a registered proposition.
    pub fn name_of(&self, p: &Proposition) -> Option<&str> {
        self.names.get(p).map(String::as_str)
    }
}

/// Maps the identifier of a proposition back to the proposition.
///
/// Basically, the reverse of what the [`PropositionRegistry`] provides.
pub trait PropositionMapping {
    fn map(&self, name: &str) -> Option<Proposition>;
}

impl PropositionMapping for PropositionRegistry {
    fn map(&self, name: &str) -> Option<Proposition> {
        self.by_name.get(name).cloned()
    }
}

/// Every identifier stands for the [`Proposition::Id`] of the same name.
impl PropositionMapping for () {
    fn map(&self, name: &str) -> Option<Proposition> {
        Some(Proposition::id(name))
    }
}
