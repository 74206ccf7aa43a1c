use crate::derive::{expand_templates, validate};
use crate::{
    Coercion, CoercionPolicy, Derivation, Grammar, ParseError, PatternRegistry, PatternRule,
    SectionTable,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything needed to turn one log vintage into properties: global
/// patterns, the section grammar, the section table, derivations and
/// policies.
///
/// Profiles are immutable once built and cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    patterns: PatternRegistry,
    grammar: Option<Grammar>,
    sections: SectionTable,
    derivations: Vec<Derivation>,
    coercion_policy: CoercionPolicy,
}

impl Profile {
    pub fn builder(name: impl Into<String>) -> ProfileBuilder {
        ProfileBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &PatternRegistry {
        &self.patterns
    }

    pub fn grammar(&self) -> Option<Grammar> {
        self.grammar
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    /// Derivations with `{section}` templates already expanded.
    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    pub fn coercion_policy(&self) -> CoercionPolicy {
        self.coercion_policy
    }

    /// Same profile with a different section grammar, for logs whose
    /// vintage differs from the one the profile was written for.
    pub fn with_grammar(&self, grammar: Option<Grammar>) -> Profile {
        Profile {
            grammar,
            ..self.clone()
        }
    }
}

pub struct ProfileBuilder {
    name: String,
    patterns: PatternRegistry,
    grammar: Option<Grammar>,
    sections: SectionTable,
    derivations: Vec<Derivation>,
    coercion_policy: CoercionPolicy,
}

impl ProfileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patterns: PatternRegistry::new(),
            grammar: None,
            sections: SectionTable::default(),
            derivations: Vec::new(),
            coercion_policy: CoercionPolicy::default(),
        }
    }

    pub fn pattern(mut self, key: &str, regex: &str, coercion: Coercion) -> Result<Self, ParseError> {
        self.patterns.push(PatternRule::new(key, regex, coercion)?);
        Ok(self)
    }

    pub fn rule(mut self, rule: PatternRule) -> Self {
        self.patterns.push(rule);
        self
    }

    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    pub fn sections(mut self, sections: SectionTable) -> Self {
        self.sections = sections;
        self
    }

    pub fn derive(mut self, derivation: Derivation) -> Self {
        self.derivations.push(derivation);
        self
    }

    pub fn coercion_policy(mut self, policy: CoercionPolicy) -> Self {
        self.coercion_policy = policy;
        self
    }

    /// Expands section templates and validates the derivation order.
    pub fn build(self) -> Result<Profile, ParseError> {
        let derivations = expand_templates(&self.derivations, &self.sections.prefixes());
        validate(&derivations)?;

        debug!(
            profile = %self.name,
            patterns = self.patterns.len(),
            grammar = ?self.grammar,
            derivations = derivations.len(),
            "Built profile"
        );

        Ok(Profile {
            name: self.name,
            patterns: self.patterns,
            grammar: self.grammar,
            sections: self.sections,
            derivations,
            coercion_policy: self.coercion_policy,
        })
    }
}

/// JSON form of a global pattern rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub key: String,
    pub regex: String,
    #[serde(default = "default_coercion")]
    pub coerce: Coercion,
}

fn default_coercion() -> Coercion {
    Coercion::Int
}

/// JSON form of a profile, for vintages that have no built-in profile.
///
/// ```json
/// {
///   "name": "gbfs-eager",
///   "patterns": [{"key": "plan_length", "regex": "\\[GBFS\\] Plan length: (\\d+)"}],
///   "grammar": "equals-pipe",
///   "derivations": [{"kind": "coverage", "solved": "plan_length", "policy": "solved-only"}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    #[serde(default)]
    pub grammar: Option<Grammar>,
    #[serde(default)]
    pub sections: Option<SectionTable>,
    #[serde(default)]
    pub derivations: Vec<Derivation>,
    #[serde(default)]
    pub coercion_policy: CoercionPolicy,
}

impl ProfileSpec {
    pub fn build(&self) -> Result<Profile, ParseError> {
        let mut builder = Profile::builder(self.name.clone()).coercion_policy(self.coercion_policy);

        for pattern in &self.patterns {
            builder = builder.pattern(&pattern.key, &pattern.regex, pattern.coerce)?;
        }
        if let Some(grammar) = self.grammar {
            builder = builder.grammar(grammar);
        }
        if let Some(sections) = &self.sections {
            builder = builder.sections(sections.clone());
        }
        for derivation in &self.derivations {
            builder = builder.derive(derivation.clone());
        }

        builder.build()
    }
}
