//! Built-in profiles, one per planner log vintage.
//!
//! To support a new vintage, either add a constructor here and list it in
//! `all_profiles()`, or describe it as a `ProfileSpec` in JSON and register
//! it at runtime. Nothing in `profile_registry.rs` needs to change.
use crate::{Coercion, CoveragePolicy, Derivation, Grammar, ParseError, Profile, ProfileBuilder};
use tracing::info;

pub const SEARCH: &str = "search";
pub const GBFS_LAZY: &str = "gbfs-lazy";
pub const DATALOG: &str = "datalog";
pub const SEARCH_DATALOG: &str = "search-datalog";
pub const ASTAR_EAGER: &str = "astar-eager";
pub const GROUND_TASK: &str = "ground-task";

/// Returns every built-in profile.
pub fn all_profiles() -> Vec<Profile> {
    info!("Initializing built-in profiles");

    [
        search(),
        gbfs_lazy(),
        datalog(),
        search_datalog(),
        astar_eager(),
        ground_task(),
    ]
    .into_iter()
    .map(|profile| profile.expect("built-in profile must compile"))
    .collect()
}

/// Search statistics printed by the current planner:
///
/// ```text
/// Num objects: 4
/// [GBFS] Start node h_value: 3
/// [Search] Search time: 0 ms (743179 ns)
/// [Search] Number of expanded states: 4
/// [Search] Number of generated states: 7
/// [GBFS] Plan cost: 3
/// [GBFS] Plan length: 3
/// [Total] Peak memory usage: 513306624 bytes
/// [Total] Total time: 4 ms
/// ```
pub fn search() -> Result<Profile, ParseError> {
    let builder = search_patterns(Profile::builder(SEARCH), &GBFS)?;
    search_derivations(builder).build()
}

/// Older lazy GBFS binary: different key names for the same search lines,
/// and colon-style section summaries.
pub fn gbfs_lazy() -> Result<Profile, ParseError> {
    Profile::builder(GBFS_LAZY)
        .pattern("plan_cost", r"\[GBFS\] Plan cost: (\d+)", Coercion::Int)?
        .pattern("plan_length", r"\[GBFS\] Plan length: (\d+)", Coercion::Int)?
        .pattern("search_time_ms", r"\[Search\] Search time: (\d+)\s*ms", Coercion::Int)?
        .pattern("expansions", r"\[Search\] Number of expanded states: (\d+)", Coercion::Int)?
        .pattern("generated", r"\[Search\] Number of generated states: (\d+)", Coercion::Int)?
        .pattern("total_time_ms", r"\[Total\] Total time: (\d+)\s*ms", Coercion::Int)?
        .pattern(
            "peak_memory_usage_bytes",
            r"\[Total\] Peak memory usage: (\d+) bytes",
            Coercion::Int,
        )?
        .grammar(Grammar::LegacyColon)
        .derive(Derivation::scale("search_time_ms", "search_time", 1000.0))
        .derive(Derivation::scale("total_time_ms", "total_time", 1000.0))
        .derive(Derivation::scale("peak_memory_usage_bytes", "memory", 1_000_000.0))
        .derive(Derivation::ratio("search_time", "expansions", "search_time_per_expanded"))
        .derive(Derivation::skew(
            "{section}_rule_tmax_ms",
            "{section}_rule_tmed_ms",
            "{section}_rule_skew_ms",
        ))
        .derive(Derivation::coverage("plan_length", CoveragePolicy::SolvedOnly))
        .build()
}

/// Equals-pipe datalog summaries only.
pub fn datalog() -> Result<Profile, ParseError> {
    Profile::builder(DATALOG).grammar(Grammar::EqualsPipe).build()
}

/// The profiling experiments: search statistics plus datalog summaries.
pub fn search_datalog() -> Result<Profile, ParseError> {
    let builder = search_patterns(Profile::builder(SEARCH_DATALOG), &GBFS)?.grammar(Grammar::EqualsPipe);
    search_derivations(builder).build()
}

/// A* runs tag their search lines `[ASTAR]`, start from an f value, and
/// report nanoseconds next to milliseconds, both for the total time and
/// inside section summaries.
pub fn astar_eager() -> Result<Profile, ParseError> {
    let builder = search_patterns(Profile::builder(ASTAR_EAGER), &ASTAR)?
        .pattern(
            "total_time_ns",
            r"\[Total\] Total time: \d+\s*ms \((\d+) ns\)",
            Coercion::Int,
        )?
        .grammar(Grammar::DualUnit)
        .derive(Derivation::skew(
            "{section}_rule_tmax_ms",
            "{section}_rule_tmed_ms",
            "{section}_rule_skew_ms",
        ))
        .derive(Derivation::skew(
            "{section}_rule_tmax_ns",
            "{section}_rule_tmed_ns",
            "{section}_rule_skew_ns",
        ));
    search_derivations(builder).build()
}

/// Grounding statistics.
pub fn ground_task() -> Result<Profile, ParseError> {
    let mut builder = Profile::builder(GROUND_TASK)
        .pattern("num_fluent_atoms", r"Num fluent atoms: (\d+)", Coercion::Int)?
        .pattern("num_derived_atoms", r"Num derived atoms: (\d+)", Coercion::Int)?
        .pattern("num_ground_actions", r"Num ground actions: (\d+)", Coercion::Int)?
        .pattern("num_ground_axioms", r"Num ground axioms: (\d+)", Coercion::Int)?
        .pattern(
            "total_task_grounding_time",
            r"Total task grounding time: (\d+) ms",
            Coercion::Int,
        )?
        .pattern("num_rules", r"num_rules: (\d+)", Coercion::Int)?;

    for key in [
        "init_total_time_min",
        "init_total_time_max",
        "init_total_time_median",
        "ground_total_time_min",
        "ground_total_time_max",
        "ground_total_time_median",
        "merge_total_time",
        "merge_total_time_average_over_rules",
    ] {
        builder = builder.pattern(key, &format!(r"{key}: (\d+) ms"), Coercion::Int)?;
    }

    builder.build()
}

/// Lines a search algorithm prints under its own `[TAG]` prefix.
struct SearchBlock {
    tag: &'static str,
    start_key: &'static str,
    start_label: &'static str,
    start_value: &'static str,
    start_coercion: Coercion,
}

const GBFS: SearchBlock = SearchBlock {
    tag: "GBFS",
    start_key: "initial_h_value",
    start_label: "h_value",
    start_value: r"\d+",
    start_coercion: Coercion::Int,
};

// f values are printed as floats
const ASTAR: SearchBlock = SearchBlock {
    tag: "ASTAR",
    start_key: "initial_f_value",
    start_label: "f_value",
    start_value: r"[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?",
    start_coercion: Coercion::Float,
};

fn search_patterns(builder: ProfileBuilder, block: &SearchBlock) -> Result<ProfileBuilder, ParseError> {
    let SearchBlock {
        tag,
        start_key,
        start_label,
        start_value,
        start_coercion,
    } = block;

    builder
        .pattern("cost", &format!(r"\[{tag}\] Plan cost: (\d+)"), Coercion::Int)?
        .pattern("length", &format!(r"\[{tag}\] Plan length: (\d+)"), Coercion::Int)?
        .pattern(
            start_key,
            &format!(r"\[{tag}\] Start node {start_label}: ({start_value})"),
            *start_coercion,
        )?
        .pattern("search_time_ms", r"\[Search\] Search time: (\d+)\s*ms", Coercion::Int)?
        .pattern(
            "search_time_ns",
            r"\[Search\] Search time: \d+\s*ms \((\d+) ns\)",
            Coercion::Int,
        )?
        .pattern("num_expanded", r"\[Search\] Number of expanded states: (\d+)", Coercion::Int)?
        .pattern("num_generated", r"\[Search\] Number of generated states: (\d+)", Coercion::Int)?
        .pattern("total_time_ms", r"\[Total\] Total time: (\d+)\s*ms", Coercion::Int)?
        .pattern(
            "peak_memory_usage_bytes",
            r"\[Total\] Peak memory usage: (\d+) bytes",
            Coercion::Int,
        )?
        .pattern("unsolvable_marker", r"(Task is unsolvable!)", Coercion::Str)?
        .pattern("invalid_marker", r"(Plan invalid)", Coercion::Str)?
        .pattern("num_objects", r"Num objects: (\d+)", Coercion::Int)
}

fn search_derivations(builder: ProfileBuilder) -> ProfileBuilder {
    builder
        .derive(Derivation::flag("invalid_marker", "invalid"))
        .derive(Derivation::flag("unsolvable_marker", "unsolvable"))
        .derive(Derivation::scale("search_time_ms", "search_time", 1000.0))
        .derive(Derivation::scale("total_time_ms", "total_time", 1000.0))
        .derive(Derivation::scaled_ratio(
            "search_time_ns",
            1000.0,
            "num_expanded",
            "search_time_us_per_expanded",
        ))
        .derive(Derivation::ratio("search_time", "num_expanded", "search_time_per_expanded"))
        .derive(Derivation::scale("peak_memory_usage_bytes", "memory", 1_000_000.0))
        .derive(Derivation::coverage("length", CoveragePolicy::SolvedOrUnsolvable))
}
