use crate::base_grammar::{Capture, SeqOut, SubPattern};
use crate::Coercion;
use once_cell::sync::Lazy;

// Same block layout as the colon grammar, but time lines carry a
// nanosecond reading next to the millisecond one:
//
// [ProgramStatistics] T_total - wallclock time total: 2 ms (2345678 ns)
//
// The parenthesized part is optional per line.

pub(crate) const SEQ_OUT: &[SeqOut] = &[
    SeqOut {
        total: "total_ms",
        par: "par_ms",
        out: "seq_out_ms",
    },
    SeqOut {
        total: "total_ns",
        par: "par_ns",
        out: "seq_out_ns",
    },
];

const TIME: &str = r":\s*(?P<ms>\d+)\s*ms(?:\s*\(\s*(?P<ns>\d+)\s*ns\))?$";

fn scalar(pattern: &str, suffix: &'static str, coercion: Coercion) -> SubPattern {
    SubPattern::new(pattern, vec![Capture::new("v", suffix, coercion)])
        .expect("static regex must compile")
}

fn time(block: &str, label: &str, ms: &'static str, ns: &'static str) -> SubPattern {
    SubPattern::new(
        &format!(r"^\[{block}\].*{label}.*{TIME}"),
        vec![
            Capture::new("ms", ms, Coercion::Int),
            Capture::new("ns", ns, Coercion::Int),
        ],
    )
    .expect("static regex must compile")
}

pub(crate) static RULES: Lazy<Vec<SubPattern>> = Lazy::new(|| {
    vec![
        scalar(
            r"^\[ProgramStatistics\].*Num executions:\s*(?P<v>\d+)$",
            "prog_n_exec",
            Coercion::Int,
        ),
        time("ProgramStatistics", "T_par_region", "par_ms", "par_ns"),
        time("ProgramStatistics", "T_total", "total_ms", "total_ns"),
        scalar(
            r"(?i)^\[ProgramStatistics\].*Parallel fraction:\s*(?P<v>[0-9]*\.?[0-9]+)$",
            "par_frac",
            Coercion::Float,
        ),
        scalar(
            r"^\[AggregatedRuleStatistics\].*Number of samples:\s*(?P<v>\d+)$",
            "rule_samples",
            Coercion::Int,
        ),
        time("AggregatedRuleStatistics", "T_min", "rule_tmin_ms", "rule_tmin_ns"),
        time("AggregatedRuleStatistics", "T_max", "rule_tmax_ms", "rule_tmax_ns"),
        time("AggregatedRuleStatistics", "T_med", "rule_tmed_ms", "rule_tmed_ns"),
        scalar(
            r"(?i)^\[AggregatedRuleStatistics\].*Skew:\s*(?P<v>inf|[0-9]*\.?[0-9]+)$",
            "rule_skew",
            Coercion::FloatOrInf,
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyValue;

    fn first_match(line: &str) -> Option<Vec<(&'static str, PropertyValue)>> {
        RULES.iter().find_map(|r| r.apply(line))
    }

    #[test]
    fn test_both_units_are_captured() {
        assert_eq!(
            first_match("[ProgramStatistics] T_par_region - wallclock time inside parallel region: 3 ms (3456789 ns)"),
            Some(vec![
                ("par_ms", PropertyValue::Int(3)),
                ("par_ns", PropertyValue::Int(3456789)),
            ])
        );
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_med_par_region - median wallclock time inside parallel region: 0 ms (812 ns)"),
            Some(vec![
                ("rule_tmed_ms", PropertyValue::Int(0)),
                ("rule_tmed_ns", PropertyValue::Int(812)),
            ])
        );
    }

    #[test]
    fn test_missing_secondary_unit_keeps_primary() {
        assert_eq!(
            first_match("[ProgramStatistics] T_total - wallclock time total: 7 ms"),
            Some(vec![("total_ms", PropertyValue::Int(7))])
        );
    }

    #[test]
    fn test_skew_line_is_not_a_time_line() {
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_max_par_region / T_med_par_region - Skew: 2.50"),
            Some(vec![("rule_skew", PropertyValue::Float(2.5))])
        );
    }
}
