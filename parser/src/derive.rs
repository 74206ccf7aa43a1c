use crate::{ParseError, PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Placeholder expanded to every section prefix of a profile.
pub const SECTION_PLACEHOLDER: &str = "{section}";

/// Which runs count as covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoveragePolicy {
    /// Only runs that printed a solution.
    SolvedOnly,
    /// Solved runs, plus runs that proved the task unsolvable.
    #[default]
    SolvedOrUnsolvable,
}

fn one() -> f64 {
    1.0
}

/// A post-pass computation over already-extracted properties.
///
/// Every variant writes nothing when an input is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// `key = 1` when `marker` is present, else `0`.
    Flag { marker: String, key: String },
    /// `to = from / divisor`.
    Scale {
        from: String,
        to: String,
        divisor: f64,
    },
    /// `to = numerator / numerator_divisor / denominator`, skipped when the
    /// denominator is zero.
    Ratio {
        numerator: String,
        denominator: String,
        to: String,
        #[serde(default = "one")]
        numerator_divisor: f64,
    },
    /// `to = max / median`, or `1.0` when either sample is zero.
    Skew {
        max: String,
        median: String,
        to: String,
    },
    /// `coverage = 1` for covered runs, else `0`.
    Coverage {
        solved: String,
        #[serde(default)]
        policy: CoveragePolicy,
    },
}

impl Derivation {
    pub const COVERAGE_KEY: &'static str = "coverage";
    pub const UNSOLVABLE_KEY: &'static str = "unsolvable";

    pub fn flag(marker: &str, key: &str) -> Self {
        Derivation::Flag {
            marker: marker.to_string(),
            key: key.to_string(),
        }
    }

    pub fn scale(from: &str, to: &str, divisor: f64) -> Self {
        Derivation::Scale {
            from: from.to_string(),
            to: to.to_string(),
            divisor,
        }
    }

    pub fn ratio(numerator: &str, denominator: &str, to: &str) -> Self {
        Derivation::Ratio {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            to: to.to_string(),
            numerator_divisor: 1.0,
        }
    }

    pub fn scaled_ratio(numerator: &str, numerator_divisor: f64, denominator: &str, to: &str) -> Self {
        Derivation::Ratio {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            to: to.to_string(),
            numerator_divisor,
        }
    }

    pub fn skew(max: &str, median: &str, to: &str) -> Self {
        Derivation::Skew {
            max: max.to_string(),
            median: median.to_string(),
            to: to.to_string(),
        }
    }

    pub fn coverage(solved: &str, policy: CoveragePolicy) -> Self {
        Derivation::Coverage {
            solved: solved.to_string(),
            policy,
        }
    }

    /// Keys this derivation reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Derivation::Flag { marker, .. } => vec![marker.as_str()],
            Derivation::Scale { from, .. } => vec![from.as_str()],
            Derivation::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            Derivation::Skew { max, median, .. } => vec![max.as_str(), median.as_str()],
            Derivation::Coverage {
                solved,
                policy: CoveragePolicy::SolvedOrUnsolvable,
            } => vec![solved.as_str(), Self::UNSOLVABLE_KEY],
            Derivation::Coverage { solved, .. } => vec![solved.as_str()],
        }
    }

    /// Key this derivation writes.
    pub fn output(&self) -> &str {
        match self {
            Derivation::Flag { key, .. } => key.as_str(),
            Derivation::Scale { to, .. } | Derivation::Ratio { to, .. } | Derivation::Skew { to, .. } => {
                to.as_str()
            }
            Derivation::Coverage { .. } => Self::COVERAGE_KEY,
        }
    }

    pub fn is_section_template(&self) -> bool {
        self.output().contains(SECTION_PLACEHOLDER)
            || self.inputs().iter().any(|k| k.contains(SECTION_PLACEHOLDER))
    }

    /// Copy of this derivation with `{section}` replaced by `prefix`.
    pub fn instantiate(&self, prefix: &str) -> Self {
        let fill = |key: &str| key.replace(SECTION_PLACEHOLDER, prefix);

        match self {
            Derivation::Flag { marker, key } => Derivation::Flag {
                marker: fill(marker),
                key: fill(key),
            },
            Derivation::Scale { from, to, divisor } => Derivation::Scale {
                from: fill(from),
                to: fill(to),
                divisor: *divisor,
            },
            Derivation::Ratio {
                numerator,
                denominator,
                to,
                numerator_divisor,
            } => Derivation::Ratio {
                numerator: fill(numerator),
                denominator: fill(denominator),
                to: fill(to),
                numerator_divisor: *numerator_divisor,
            },
            Derivation::Skew { max, median, to } => Derivation::Skew {
                max: fill(max),
                median: fill(median),
                to: fill(to),
            },
            Derivation::Coverage { solved, policy } => Derivation::Coverage {
                solved: fill(solved),
                policy: *policy,
            },
        }
    }

    pub fn apply(&self, props: &mut PropertyMap) {
        let value = match self {
            Derivation::Flag { marker, .. } => Some(PropertyValue::Int(i64::from(
                props.get(marker).map_or(false, PropertyValue::is_truthy),
            ))),
            Derivation::Scale { from, divisor, .. } => {
                if *divisor == 0.0 {
                    None
                } else {
                    props.get_f64(from).map(|v| PropertyValue::Float(v / divisor))
                }
            }
            Derivation::Ratio {
                numerator,
                denominator,
                numerator_divisor,
                ..
            } => ratio(props, numerator, *numerator_divisor, denominator),
            Derivation::Skew { max, median, .. } => skew(props, max, median),
            Derivation::Coverage { solved, policy } => {
                let covered = props.contains_key(solved)
                    || (*policy == CoveragePolicy::SolvedOrUnsolvable
                        && props
                            .get(Self::UNSOLVABLE_KEY)
                            .map_or(false, PropertyValue::is_truthy));
                Some(PropertyValue::Int(i64::from(covered)))
            }
        };

        if let Some(value) = value {
            props.insert(self.output(), value);
        }
    }
}

fn ratio(props: &PropertyMap, numerator: &str, numerator_divisor: f64, denominator: &str) -> Option<PropertyValue> {
    let num = props.get_f64(numerator)?;
    let den = props.get_f64(denominator)?;

    if den == 0.0 || numerator_divisor == 0.0 {
        return None;
    }

    Some(PropertyValue::Float(num / numerator_divisor / den))
}

fn skew(props: &PropertyMap, max: &str, median: &str) -> Option<PropertyValue> {
    let max = props.get_f64(max)?;
    let median = props.get_f64(median)?;

    let value = if max > 0.0 && median > 0.0 {
        max / median
    } else {
        1.0
    };

    Some(PropertyValue::Float(value))
}

/// Replaces every `{section}` template with one copy per prefix, keeping
/// declaration order.
pub fn expand_templates(derivations: &[Derivation], prefixes: &[&str]) -> Vec<Derivation> {
    let mut expanded = Vec::with_capacity(derivations.len());

    for derivation in derivations {
        if derivation.is_section_template() {
            expanded.extend(prefixes.iter().map(|p| derivation.instantiate(p)));
        } else {
            expanded.push(derivation.clone());
        }
    }

    expanded
}

/// Checks that the derivations form a DAG in declaration order: none reads
/// its own output, and none reads a key that only a later one writes.
pub fn validate(derivations: &[Derivation]) -> Result<(), ParseError> {
    for (idx, derivation) in derivations.iter().enumerate() {
        let output = derivation.output();

        for input in derivation.inputs() {
            if input == output {
                return Err(ParseError::InvalidDerivation {
                    output: output.to_string(),
                    input: input.to_string(),
                    reason: "is its own output",
                });
            }
            if derivations[idx + 1..].iter().any(|later| later.output() == input) {
                return Err(ParseError::InvalidDerivation {
                    output: output.to_string(),
                    input: input.to_string(),
                    reason: "is only written by a later derivation",
                });
            }
        }
    }

    Ok(())
}

/// Runs `derivations` in order.
pub fn derive_all(derivations: &[Derivation], props: &mut PropertyMap) {
    let before = props.len();

    for derivation in derivations {
        derivation.apply(props);
    }

    debug!(
        derivations = derivations.len(),
        added = props.len().saturating_sub(before),
        "Applied derivations"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_derivations() -> Vec<Derivation> {
        vec![
            Derivation::flag("invalid_marker", "invalid"),
            Derivation::flag("unsolvable_marker", "unsolvable"),
            Derivation::scale("search_time_ms", "search_time", 1000.0),
            Derivation::scale("total_time_ms", "total_time", 1000.0),
            Derivation::scaled_ratio("search_time_ns", 1000.0, "num_expanded", "search_time_us_per_expanded"),
            Derivation::ratio("search_time", "num_expanded", "search_time_per_expanded"),
            Derivation::scale("peak_memory_usage_bytes", "memory", 1_000_000.0),
            Derivation::coverage("length", CoveragePolicy::SolvedOrUnsolvable),
        ]
    }

    #[test]
    fn test_unit_conversions() {
        let mut props = PropertyMap::new();
        props.insert("total_time_ms", 4000i64);
        props.insert("peak_memory_usage_bytes", 21311488i64);

        derive_all(&search_derivations(), &mut props);

        assert_eq!(props.get_f64("total_time"), Some(4.0));
        let memory = props.get_f64("memory").unwrap();
        assert!((memory - 21.311488).abs() < 1e-9);
    }

    #[test]
    fn test_empty_map_never_panics_and_only_writes_flags() {
        let mut props = PropertyMap::new();
        derive_all(&search_derivations(), &mut props);

        assert_eq!(props.get_i64("invalid"), Some(0));
        assert_eq!(props.get_i64("unsolvable"), Some(0));
        assert_eq!(props.get_i64("coverage"), Some(0));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_zero_or_missing_denominator_skips_ratio() {
        let mut props = PropertyMap::new();
        props.insert("search_time_ms", 3i64);
        props.insert("search_time_ns", 3_000_000i64);
        props.insert("num_expanded", 0i64);
        derive_all(&search_derivations(), &mut props);
        assert!(!props.contains_key("search_time_per_expanded"));
        assert!(!props.contains_key("search_time_us_per_expanded"));
        assert_eq!(props.get_f64("search_time"), Some(0.003));

        let mut props = PropertyMap::new();
        props.insert("search_time_ms", 3i64);
        derive_all(&search_derivations(), &mut props);
        assert!(!props.contains_key("search_time_per_expanded"));
    }

    #[test]
    fn test_missing_numerator_skips_ratio() {
        let mut props = PropertyMap::new();
        props.insert("num_expanded", 20i64);
        derive_all(&search_derivations(), &mut props);
        assert!(!props.contains_key("search_time_us_per_expanded"));
        assert!(!props.contains_key("search_time_per_expanded"));
    }

    #[test]
    fn test_rates() {
        let mut props = PropertyMap::new();
        props.insert("search_time_ms", 4i64);
        props.insert("search_time_ns", 4_000_000i64);
        props.insert("num_expanded", 20i64);
        derive_all(&search_derivations(), &mut props);

        assert_eq!(props.get_f64("search_time_us_per_expanded"), Some(200.0));
        let per_expanded = props.get_f64("search_time_per_expanded").unwrap();
        assert!((per_expanded - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn test_coverage_policies() {
        let mut unsolvable = PropertyMap::new();
        unsolvable.insert("unsolvable", 1i64);

        let mut props = unsolvable.clone();
        Derivation::coverage("length", CoveragePolicy::SolvedOrUnsolvable).apply(&mut props);
        assert_eq!(props.get_i64("coverage"), Some(1));

        let mut props = unsolvable;
        Derivation::coverage("length", CoveragePolicy::SolvedOnly).apply(&mut props);
        assert_eq!(props.get_i64("coverage"), Some(0));

        let mut props = PropertyMap::new();
        props.insert("plan_length", 13i64);
        Derivation::coverage("plan_length", CoveragePolicy::SolvedOnly).apply(&mut props);
        assert_eq!(props.get_i64("coverage"), Some(1));
    }

    #[test]
    fn test_flags_follow_markers() {
        let mut props = PropertyMap::new();
        props.insert("invalid_marker", "Plan invalid");
        derive_all(&search_derivations(), &mut props);
        assert_eq!(props.get_i64("invalid"), Some(1));
        assert_eq!(props.get_i64("unsolvable"), Some(0));
    }

    #[test]
    fn test_skew() {
        let mut props = PropertyMap::new();
        props.insert("ff_rule_tmax_ms", 1812i64);
        props.insert("ff_rule_tmed_ms", 15i64);
        props.insert("axiom_rule_tmax_ms", 0i64);
        props.insert("axiom_rule_tmed_ms", 0i64);

        let rules = expand_templates(
            &[Derivation::skew("{section}_rule_tmax_ms", "{section}_rule_tmed_ms", "{section}_rule_skew_ms")],
            &["axiom", "ff", "succgen"],
        );
        assert_eq!(rules.len(), 3);
        derive_all(&rules, &mut props);

        assert_eq!(props.get_f64("ff_rule_skew_ms"), Some(1812.0 / 15.0));
        assert_eq!(props.get_f64("axiom_rule_skew_ms"), Some(1.0));
        assert!(!props.contains_key("succgen_rule_skew_ms"));
    }

    #[test]
    fn test_reapplying_is_idempotent() {
        let mut props = PropertyMap::new();
        props.insert("search_time_ms", 3i64);
        props.insert("num_expanded", 20i64);
        props.insert("length", 13i64);

        derive_all(&search_derivations(), &mut props);
        let once = props.clone();
        derive_all(&search_derivations(), &mut props);
        assert_eq!(props, once);
    }

    #[test]
    fn test_validate_accepts_declared_order() {
        assert!(validate(&search_derivations()).is_ok());
    }

    #[test]
    fn test_validate_rejects_self_reference() {
        let err = validate(&[Derivation::flag("unsolvable", "unsolvable")]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDerivation { reason: "is its own output", .. }));
    }

    #[test]
    fn test_validate_rejects_forward_reads() {
        let rules = vec![
            Derivation::ratio("search_time", "num_expanded", "search_time_per_expanded"),
            Derivation::scale("search_time_ms", "search_time", 1000.0),
        ];
        assert!(validate(&rules).is_err());
    }

    #[test]
    fn test_derivation_json_shape() {
        let json = r#"[
            {"kind": "scale", "from": "total_time_ms", "to": "total_time", "divisor": 1000},
            {"kind": "ratio", "numerator": "search_time", "denominator": "expansions", "to": "search_time_per_expanded"},
            {"kind": "coverage", "solved": "plan_length", "policy": "solved-only"}
        ]"#;
        let rules: Vec<Derivation> = serde_json::from_str(json).unwrap();
        assert_eq!(rules[0], Derivation::scale("total_time_ms", "total_time", 1000.0));
        assert_eq!(
            rules[1],
            Derivation::ratio("search_time", "expansions", "search_time_per_expanded")
        );
        assert_eq!(rules[2], Derivation::coverage("plan_length", CoveragePolicy::SolvedOnly));
    }
}
