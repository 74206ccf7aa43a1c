use crate::base_grammar::{Capture, SeqOut, SubPattern};
use crate::Coercion;
use once_cell::sync::Lazy;

// [Successor generator] Summary
// [ProgramStatistics] T_par_region - wallclock time inside parallel region: 0 ms
// [ProgramStatistics] T_total - wallclock time total: 0 ms
// [ProgramStatistics] Parallel fraction: 1.00
// [AggregatedRuleStatistics] Number of samples: 3
// [AggregatedRuleStatistics] T_min_par_region - minimum wallclock time inside parallel region: 0 ms
// [AggregatedRuleStatistics] T_max_par_region - maximum wallclock time inside parallel region: 0 ms
// [AggregatedRuleStatistics] T_med_par_region - median wallclock time inside parallel region: 0 ms
// [AggregatedRuleStatistics] T_max_par_region / T_med_par_region - Skew: 1.00

pub(crate) const SEQ_OUT: &[SeqOut] = &[SeqOut {
    total: "total_ms",
    par: "par_ms",
    out: "seq_out_ms",
}];

fn rule(pattern: &str, suffix: &'static str, coercion: Coercion) -> SubPattern {
    SubPattern::new(pattern, vec![Capture::new("v", suffix, coercion)])
        .expect("static regex must compile")
}

pub(crate) static RULES: Lazy<Vec<SubPattern>> = Lazy::new(|| {
    vec![
        rule(
            r"^\[ProgramStatistics\].*Num executions:\s*(?P<v>\d+)$",
            "prog_n_exec",
            Coercion::Int,
        ),
        rule(
            r"^\[ProgramStatistics\].*T_par_region.*:\s*(?P<v>\d+)\s*ms$",
            "par_ms",
            Coercion::Int,
        ),
        rule(
            r"^\[ProgramStatistics\].*T_total.*:\s*(?P<v>\d+)\s*ms$",
            "total_ms",
            Coercion::Int,
        ),
        rule(
            r"(?i)^\[ProgramStatistics\].*Parallel fraction:\s*(?P<v>[0-9]*\.?[0-9]+)$",
            "par_frac",
            Coercion::Float,
        ),
        rule(
            r"^\[AggregatedRuleStatistics\].*Number of samples:\s*(?P<v>\d+)$",
            "rule_samples",
            Coercion::Int,
        ),
        rule(
            r"^\[AggregatedRuleStatistics\].*T_min.*:\s*(?P<v>\d+)\s*ms$",
            "rule_tmin_ms",
            Coercion::Int,
        ),
        rule(
            r"^\[AggregatedRuleStatistics\].*T_max.*:\s*(?P<v>\d+)\s*ms$",
            "rule_tmax_ms",
            Coercion::Int,
        ),
        rule(
            r"^\[AggregatedRuleStatistics\].*T_med.*:\s*(?P<v>\d+)\s*ms$",
            "rule_tmed_ms",
            Coercion::Int,
        ),
        rule(
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
    fn test_program_statistics_lines() {
        assert_eq!(
            first_match("[ProgramStatistics] T_par_region - wallclock time inside parallel region: 4 ms"),
            Some(vec![("par_ms", PropertyValue::Int(4))])
        );
        assert_eq!(
            first_match("[ProgramStatistics] T_total - wallclock time total: 5 ms"),
            Some(vec![("total_ms", PropertyValue::Int(5))])
        );
        assert_eq!(
            first_match("[ProgramStatistics] parallel FRACTION: 0.74"),
            Some(vec![("par_frac", PropertyValue::Float(0.74))])
        );
        assert_eq!(
            first_match("[ProgramStatistics] Num executions: 10"),
            Some(vec![("prog_n_exec", PropertyValue::Int(10))])
        );
    }

    #[test]
    fn test_skew_line_is_not_taken_by_time_rules() {
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_max_par_region / T_med_par_region - Skew: 117.36"),
            Some(vec![("rule_skew", PropertyValue::Float(117.36))])
        );
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_max_par_region / T_med_par_region - Skew: inf"),
            Some(vec![("rule_skew", PropertyValue::Float(f64::INFINITY))])
        );
    }

    #[test]
    fn test_aggregated_time_lines() {
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_min_par_region - minimum wallclock time inside parallel region: 0 ms"),
            Some(vec![("rule_tmin_ms", PropertyValue::Int(0))])
        );
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_max_par_region - maximum wallclock time inside parallel region: 1812 ms"),
            Some(vec![("rule_tmax_ms", PropertyValue::Int(1812))])
        );
        assert_eq!(
            first_match("[AggregatedRuleStatistics] T_med_par_region - median wallclock time inside parallel region: 15 ms"),
            Some(vec![("rule_tmed_ms", PropertyValue::Int(15))])
        );
    }

    #[test]
    fn test_unrelated_lines_do_not_match() {
        assert!(first_match("[GBFS] Plan cost: 13").is_none());
        assert!(first_match("[ProgramStatistics] N_exec =         10    | executions").is_none());
    }
}
