// Parser crate for planner run logs
// Turns one run's log text into a flat map of named properties

pub mod types;
pub mod pattern;
pub mod section;
pub mod derive;
pub mod profile;
pub mod profiles;
pub mod assembler;
pub mod profile_registry;

// Section grammars
pub mod base_grammar;
mod colon_grammar;
mod equals_grammar;
mod dual_unit_grammar;

// Re-export main types
pub use types::*;
pub use pattern::{Coercion, CoercionPolicy, PatternRegistry, PatternRule};
pub use base_grammar::{detect_grammar, Grammar};
pub use section::{ScanState, SectionScanner, SectionTable};
pub use derive::{CoveragePolicy, Derivation};
pub use profile::{PatternSpec, Profile, ProfileBuilder, ProfileSpec};
pub use profiles::all_profiles;
pub use assembler::LogParser;
pub use profile_registry::{GrammarChoice, ProfileRegistry};
