use crate::base_grammar::{Capture, SeqOut, SubPattern};
use crate::Coercion;
use once_cell::sync::Lazy;

// [ProgramStatistics] N_exec =         10    | executions
// [ProgramStatistics] T_seq  =          0 ms | sequential time
// [AggregatedRuleStatistics] T_tot_skew =       2.87    | skew total time (T_tot_max / T_tot_med)
// [AggregatedRuleWorkerStatistics] OA     =        1.33 | overapproximation ratio (1 + N_pen / N_gen)

pub(crate) const SEQ_OUT: &[SeqOut] = &[SeqOut {
    total: "prog_t_tot",
    par: "prog_t_par",
    out: "seq_out_ms",
}];

const PROG: &str = "ProgramStatistics";
const RULE: &str = "AggregatedRuleStatistics";
const WORKER: &str = "AggregatedRuleWorkerStatistics";

const COUNT: &str = r"\d+";
const RATIO: &str = r"[0-9]*\.?[0-9]+";

/// `[block] label = <value> <unit> | ...`; the label must be followed by
/// `=` so `T_tot` never claims a `T_tot_min` line.
fn field(block: &str, label: &str, value: &str, unit: &str, suffix: &'static str) -> SubPattern {
    let coercion = if value == RATIO {
        Coercion::Float
    } else {
        Coercion::Int
    };

    SubPattern::new(
        &format!(r"^\[{block}\]\s+{label}\s*=\s*(?P<v>{value})\s*{unit}\s*.*$"),
        vec![Capture::new("v", suffix, coercion)],
    )
    .expect("static regex must compile")
}

pub(crate) static RULES: Lazy<Vec<SubPattern>> = Lazy::new(|| {
    vec![
        field(PROG, "N_exec", COUNT, "", "prog_n_exec"),
        field(PROG, "T_seq", COUNT, "ms", "prog_t_seq"),
        field(PROG, "T_par", COUNT, "ms", "prog_t_par"),
        field(PROG, "T_tot", COUNT, "ms", "prog_t_tot"),
        field(PROG, "T_avg", COUNT, "us", "prog_t_avg"),
        field(PROG, "PF", RATIO, "", "prog_pf"),
        field(RULE, "N_exec", COUNT, "", "rule_n_exec"),
        field(RULE, "N_samples", COUNT, "", "rule_n_samples"),
        field(RULE, "T_seq", COUNT, "ms", "rule_t_seq"),
        field(RULE, "T_par", COUNT, "ms", "rule_t_par"),
        field(RULE, "T_tot", COUNT, "ms", "rule_t_tot"),
        field(RULE, "T_avg", COUNT, "us", "rule_t_avg"),
        field(RULE, "PF", RATIO, "", "rule_pf"),
        field(RULE, "T_tot_min", COUNT, "ms", "rule_t_tot_min"),
        field(RULE, "T_tot_max", COUNT, "ms", "rule_t_tot_max"),
        field(RULE, "T_tot_med", COUNT, "ms", "rule_t_tot_med"),
        field(RULE, "T_tot_skew", RATIO, "", "rule_skew_tot"),
        field(RULE, "T_avg_min", COUNT, "us", "rule_t_avg_min"),
        field(RULE, "T_avg_max", COUNT, "us", "rule_t_avg_max"),
        field(RULE, "T_avg_med", COUNT, "us", "rule_t_avg_med"),
        field(RULE, "T_avg_skew", RATIO, "", "rule_skew_avg"),
        field(WORKER, "N_exec", COUNT, "", "rule_worker_n_exec"),
        field(WORKER, "N_gen", COUNT, "", "rule_worker_n_gen"),
        field(WORKER, "N_pen", COUNT, "", "rule_worker_n_pen"),
        field(WORKER, "OA", RATIO, "", "rule_worker_oa"),
    ]
});
