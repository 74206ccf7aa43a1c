use crate::base_grammar::{section_header, Grammar, SeqOut};
use crate::{PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Section titles printed by the planner and the key prefixes they map to.
pub const DEFAULT_SECTIONS: &[(&str, &str)] = &[
    ("Successor generator", "succgen"),
    ("Axiom evaluator", "axiom"),
    ("FFHeuristic", "ff"),
];

/// Canonical section title -> property key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionTable(BTreeMap<String, String>);

impl SectionTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, title: impl Into<String>, prefix: impl Into<String>) {
        self.0.insert(title.into(), prefix.into());
    }

    pub fn prefix_for(&self, title: &str) -> Option<&str> {
        self.0.get(title).map(String::as_str)
    }

    /// Distinct prefixes, sorted.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.0.values().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        DEFAULT_SECTIONS.iter().copied().collect()
    }
}

impl<T: Into<String>, P: Into<String>> FromIterator<(T, P)> for SectionTable {
    fn from_iter<I: IntoIterator<Item = (T, P)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(t, p)| (t.into(), p.into())).collect())
    }
}

/// Scanner state between two lines: the prefix of the section being read,
/// or `None` outside any recognized section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState<'a> {
    pub section: Option<&'a str>,
}

/// Walks a log line by line and files grammar matches under
/// `{prefix}_{suffix}` keys of the section currently open.
pub struct SectionScanner<'a> {
    grammar: Grammar,
    table: &'a SectionTable,
}

impl<'a> SectionScanner<'a> {
    pub fn new(grammar: Grammar, table: &'a SectionTable) -> Self {
        Self { grammar, table }
    }

    /// Processes one line and returns the state for the next one.
    pub fn step(&self, state: ScanState<'a>, line: &str, props: &mut PropertyMap) -> ScanState<'a> {
        let line = line.trim();
        if line.is_empty() {
            return state;
        }

        if let Some(title) = section_header(line) {
            let section = self.table.prefix_for(title);
            if section.is_none() {
                trace!(title, "Unrecognized section, clearing scope");
            }
            return ScanState { section };
        }

        let Some(prefix) = state.section else {
            return state;
        };

        if let Some(values) = self.grammar.rules().iter().find_map(|rule| rule.apply(line)) {
            for (suffix, value) in values {
                props.insert(format!("{prefix}_{suffix}"), value);
            }
        }

        state
    }

    /// Scans the whole document, then derives the per-section
    /// sequential-out times.
    pub fn scan(&self, text: &str, props: &mut PropertyMap) {
        let before = props.len();
        let mut state = ScanState::default();

        for line in text.lines() {
            state = self.step(state, line, props);
        }

        self.add_seq_out(props);

        debug!(
            grammar = %self.grammar,
            written = props.len().saturating_sub(before),
            "Scanned section blocks"
        );
    }

    fn add_seq_out(&self, props: &mut PropertyMap) {
        for prefix in self.table.prefixes() {
            for pair in self.grammar.seq_out_pairs() {
                if let Some(value) = seq_out(props, prefix, pair) {
                    props.insert(format!("{prefix}_{}", pair.out), value);
                }
            }
        }
    }
}

fn seq_out(props: &PropertyMap, prefix: &str, pair: &SeqOut) -> Option<PropertyValue> {
    let total = props.get(&format!("{prefix}_{}", pair.total))?;
    let par = props.get(&format!("{prefix}_{}", pair.par))?;

    match (total, par) {
        (PropertyValue::Int(t), PropertyValue::Int(p)) => Some(PropertyValue::Int((t - p).max(0))),
        _ => {
            let (t, p) = (total.as_f64()?, par.as_f64()?);
            Some(PropertyValue::Float((t - p).max(0.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLON_LOG: &str = "\
[GBFS] Plan found.
[Successor generator] Summary
[ProgramStatistics] T_par_region - wallclock time inside parallel region: 0 ms
[ProgramStatistics] T_total - wallclock time total: 0 ms
[ProgramStatistics] Parallel fraction: 1.00
[AggregatedRuleStatistics] Number of samples: 3
[Axiom evaluator] Summary
[ProgramStatistics] T_par_region - wallclock time inside parallel region: 0 ms
[ProgramStatistics] T_total - wallclock time total: 0 ms
[AggregatedRuleStatistics] Number of samples: 0
[FFHeuristic] Summary
[ProgramStatistics] T_par_region - wallclock time inside parallel region: 2 ms
[ProgramStatistics] T_total - wallclock time total: 5 ms
[ProgramStatistics] Parallel fraction: 0.40
[AggregatedRuleStatistics] Number of samples: 7
[Total] Peak memory usage: 21311488 bytes
";

    fn scan(grammar: Grammar, text: &str) -> PropertyMap {
        let table = SectionTable::default();
        let mut props = PropertyMap::new();
        SectionScanner::new(grammar, &table).scan(text, &mut props);
        props
    }

    #[test]
    fn test_step_threads_state() {
        let table = SectionTable::default();
        let scanner = SectionScanner::new(Grammar::LegacyColon, &table);
        let mut props = PropertyMap::new();

        let state = scanner.step(ScanState::default(), "[FFHeuristic] Summary", &mut props);
        assert_eq!(state.section, Some("ff"));

        let state = scanner.step(state, "   ", &mut props);
        assert_eq!(state.section, Some("ff"));

        let state = scanner.step(state, "[Mystery block] Summary", &mut props);
        assert_eq!(state.section, None);
        assert!(props.is_empty());
    }

    #[test]
    fn test_sections_are_isolated() {
        let text = "\
[Successor generator] Summary
[ProgramStatistics] Num executions: 10
[FFHeuristic] Summary
[ProgramStatistics] Num executions: 7
";
        let props = scan(Grammar::LegacyColon, text);
        assert_eq!(props.get_i64("succgen_prog_n_exec"), Some(10));
        assert_eq!(props.get_i64("ff_prog_n_exec"), Some(7));
        assert!(!props.contains_key("axiom_prog_n_exec"));
    }

    #[test]
    fn test_zero_valued_block_emits_zeros() {
        let props = scan(Grammar::LegacyColon, COLON_LOG);
        assert_eq!(props.get_i64("axiom_par_ms"), Some(0));
        assert_eq!(props.get_i64("axiom_total_ms"), Some(0));
        assert_eq!(props.get_i64("axiom_rule_samples"), Some(0));
        assert_eq!(props.get_i64("axiom_seq_out_ms"), Some(0));
        // no "Parallel fraction" line in that block
        assert!(!props.contains_key("axiom_par_frac"));
    }

    #[test]
    fn test_seq_out_is_total_minus_parallel() {
        let props = scan(Grammar::LegacyColon, COLON_LOG);
        assert_eq!(props.get_i64("ff_seq_out_ms"), Some(3));
        assert_eq!(props.get_f64("ff_par_frac"), Some(0.4));
        assert_eq!(props.get_i64("ff_rule_samples"), Some(7));
    }

    #[test]
    fn test_seq_out_never_negative() {
        let text = "\
[FFHeuristic] Summary
[ProgramStatistics] T_par_region - wallclock time inside parallel region: 6 ms
[ProgramStatistics] T_total - wallclock time total: 5 ms
";
        let props = scan(Grammar::LegacyColon, text);
        assert_eq!(props.get_i64("ff_seq_out_ms"), Some(0));
    }

    #[test]
    fn test_unknown_section_body_is_discarded() {
        let text = "\
[FFHeuristic] Summary
[ProgramStatistics] T_total - wallclock time total: 5 ms
[Landmarks] Summary
[ProgramStatistics] T_total - wallclock time total: 99 ms
";
        let props = scan(Grammar::LegacyColon, text);
        assert_eq!(props.get_i64("ff_total_ms"), Some(5));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_lines_before_first_header_are_ignored() {
        let text = "[ProgramStatistics] T_total - wallclock time total: 5 ms\n";
        assert!(scan(Grammar::LegacyColon, text).is_empty());
    }

    #[test]
    fn test_dual_unit_writes_both_keys_and_both_seq_out() {
        let text = "\
[Successor generator] Summary
[ProgramStatistics] T_par_region - wallclock time inside parallel region: 1 ms (1500000 ns)
[ProgramStatistics] T_total - wallclock time total: 3 ms (3250000 ns)
";
        let props = scan(Grammar::DualUnit, text);
        assert_eq!(props.get_i64("succgen_par_ms"), Some(1));
        assert_eq!(props.get_i64("succgen_par_ns"), Some(1_500_000));
        assert_eq!(props.get_i64("succgen_total_ns"), Some(3_250_000));
        assert_eq!(props.get_i64("succgen_seq_out_ms"), Some(2));
        assert_eq!(props.get_i64("succgen_seq_out_ns"), Some(1_750_000));
    }

    #[test]
    fn test_equals_pipe_seq_out_uses_program_totals() {
        let text = "\
[FFHeuristic] Summary
[ProgramStatistics] T_par  =       4296 ms | parallel time
[ProgramStatistics] T_tot  =       5774 ms | total time
";
        let props = scan(Grammar::EqualsPipe, text);
        assert_eq!(props.get_i64("ff_seq_out_ms"), Some(1478));
    }

    #[test]
    fn test_custom_table() {
        let table: SectionTable = vec![("Landmarks", "lm")].into_iter().collect();
        let mut props = PropertyMap::new();
        SectionScanner::new(Grammar::LegacyColon, &table).scan(
            "[Landmarks] Summary\n[ProgramStatistics] T_total - wallclock time total: 9 ms\n",
            &mut props,
        );
        assert_eq!(props.get_i64("lm_total_ms"), Some(9));
    }
}
