use crate::{ParseError, PropertyMap, PropertyValue};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

/// How a captured string becomes a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    Int,
    /// Finite floats only.
    Float,
    /// Like `Float`, but also accepts `inf` in any case.
    FloatOrInf,
    Str,
}

impl Coercion {
    /// Returns `None` when `raw` is not a valid value of this type.
    pub fn apply(self, raw: &str) -> Option<PropertyValue> {
        match self {
            Coercion::Int => raw.trim().parse::<i64>().ok().map(PropertyValue::Int),
            Coercion::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(PropertyValue::Float),
            Coercion::FloatOrInf => {
                let raw = raw.trim();
                if raw.eq_ignore_ascii_case("inf") {
                    Some(PropertyValue::Float(f64::INFINITY))
                } else {
                    Coercion::Float.apply(raw)
                }
            }
            Coercion::Str => Some(PropertyValue::Str(raw.to_string())),
        }
    }
}

/// What a global pattern does when its first match does not coerce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoercionPolicy {
    /// Give up on the key.
    #[default]
    FirstMatch,
    /// Keep looking at later matches and take the first one that coerces.
    FallThrough,
}

/// A global scalar pattern: the first match anywhere in the log wins.
#[derive(Debug, Clone)]
pub struct PatternRule {
    key: String,
    regex: Regex,
    coercion: Coercion,
}

impl PatternRule {
    /// Compiles `pattern` in multi-line mode, so `^`/`$` anchor at line
    /// boundaries while the search still covers the whole document.
    pub fn new(
        key: impl Into<String>,
        pattern: &str,
        coercion: Coercion,
    ) -> Result<Self, ParseError> {
        let key = key.into();
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|source| ParseError::InvalidRegex {
                key: key.clone(),
                source,
            })?;

        Ok(Self {
            key,
            regex,
            coercion,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// Searches `text` for this rule's value.
    pub fn extract(&self, text: &str, policy: CoercionPolicy) -> Option<PropertyValue> {
        let mut matches = self.regex.captures_iter(text);

        match policy {
            CoercionPolicy::FirstMatch => {
                let caps = matches.next()?;
                self.coerce(&caps)
            }
            CoercionPolicy::FallThrough => matches.find_map(|caps| self.coerce(&caps)),
        }
    }

    fn coerce(&self, caps: &Captures<'_>) -> Option<PropertyValue> {
        // Group 1 when the pattern has one, otherwise the whole match.
        let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
        let value = self.coercion.apply(raw);

        if value.is_none() {
            trace!(key = %self.key, raw, "Coercion failed, treating as no match");
        }

        value
    }
}

/// Ordered list of global pattern rules.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: PatternRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule to `text`. When two rules share a key, the first
    /// one that produces a value in this pass keeps it.
    pub fn apply(&self, text: &str, policy: CoercionPolicy, props: &mut PropertyMap) {
        let mut written: HashSet<&str> = HashSet::new();

        for rule in &self.rules {
            if written.contains(rule.key()) {
                continue;
            }
            if let Some(value) = rule.extract(text, policy) {
                props.insert(rule.key(), value);
                written.insert(rule.key());
            }
        }

        debug!(
            rules = self.rules.len(),
            matched = written.len(),
            "Applied global patterns"
        );
    }
}

impl FromIterator<PatternRule> for PatternRegistry {
    fn from_iter<I: IntoIterator<Item = PatternRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
