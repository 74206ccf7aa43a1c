use crate::{Coercion, ParseError, PropertyValue};
use crate::{colon_grammar, dual_unit_grammar, equals_grammar};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line convention used inside `[Section] Summary` blocks.
///
/// Each planner vintage printed its statistics differently, so the grammar
/// is picked per invocation rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grammar {
    /// `[Block] Label - description: value unit`
    LegacyColon,
    /// `[Block] Label = value unit | comment`
    EqualsPipe,
    /// `[Block] Label - description: value ms (value ns)`
    DualUnit,
}

impl Grammar {
    pub const ALL: [Grammar; 3] = [Grammar::LegacyColon, Grammar::EqualsPipe, Grammar::DualUnit];

    pub fn name(self) -> &'static str {
        match self {
            Grammar::LegacyColon => "legacy-colon",
            Grammar::EqualsPipe => "equals-pipe",
            Grammar::DualUnit => "dual-unit",
        }
    }

    /// Ordered sub-patterns; the first one that matches a line claims it.
    pub fn rules(self) -> &'static [SubPattern] {
        match self {
            Grammar::LegacyColon => colon_grammar::RULES.as_slice(),
            Grammar::EqualsPipe => equals_grammar::RULES.as_slice(),
            Grammar::DualUnit => dual_unit_grammar::RULES.as_slice(),
        }
    }

    /// (total, parallel) pairs the scanner turns into time spent outside the
    /// parallel region.
    pub fn seq_out_pairs(self) -> &'static [SeqOut] {
        match self {
            Grammar::LegacyColon => colon_grammar::SEQ_OUT,
            Grammar::EqualsPipe => equals_grammar::SEQ_OUT,
            Grammar::DualUnit => dual_unit_grammar::SEQ_OUT,
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Grammar {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grammar::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| ParseError::UnknownGrammar(s.to_string()))
    }
}

/// One named capture group of a sub-pattern and the key suffix it feeds.
#[derive(Debug, Clone, Copy)]
pub struct Capture {
    pub group: &'static str,
    pub suffix: &'static str,
    pub coercion: Coercion,
}

impl Capture {
    pub const fn new(group: &'static str, suffix: &'static str, coercion: Coercion) -> Self {
        Self {
            group,
            suffix,
            coercion,
        }
    }
}

/// A section body line pattern. Optional groups that did not participate
/// in the match are skipped; any present group that fails to coerce turns
/// the whole line into a non-match.
#[derive(Debug, Clone)]
pub struct SubPattern {
    regex: Regex,
    captures: Vec<Capture>,
}

impl SubPattern {
    pub fn new(pattern: &str, captures: Vec<Capture>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            captures,
        })
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.captures.iter().map(|c| c.suffix)
    }

    pub fn apply(&self, line: &str) -> Option<Vec<(&'static str, PropertyValue)>> {
        let caps = self.regex.captures(line)?;
        let mut values = Vec::with_capacity(self.captures.len());

        for capture in &self.captures {
            if let Some(m) = caps.name(capture.group) {
                values.push((capture.suffix, capture.coercion.apply(m.as_str())?));
            }
        }

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }
}

/// `out = max(0, total - par)`, all three being key suffixes.
#[derive(Debug, Clone, Copy)]
pub struct SeqOut {
    pub total: &'static str,
    pub par: &'static str,
    pub out: &'static str,
}

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?P<name>[^\]]+)\]\s+Summary$").expect("static regex must compile"));

// Detection only looks at statistics block lines, so trailing `[Total]` or
// `[Search]` lines after the last summary never vote.
static EQUALS_PIPE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:ProgramStatistics|AggregatedRule\w*)\]\s+\w+\s*=\s*\S+.*\|")
        .expect("static regex must compile")
});

static DUAL_UNIT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:ProgramStatistics|AggregatedRule\w*)\].*:\s*\d+\s*ms\s*\(\s*\d+\s*ns\)$")
        .expect("static regex must compile")
});

static COLON_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:ProgramStatistics|AggregatedRule\w*)\].*:\s*\S+")
        .expect("static regex must compile")
});

/// Returns the section title if `line` (already trimmed) is a
/// `[Title] Summary` header.
pub fn section_header(line: &str) -> Option<&str> {
    SECTION_HEADER
        .captures(line)
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str())
}

/// Guesses the grammar from the body lines of `[..] Summary` blocks.
///
/// Equals-pipe wins over dual-unit, which wins over legacy-colon. Returns
/// `None` when the log has no section bodies at all.
pub fn detect_grammar(text: &str) -> Option<Grammar> {
    let mut in_section = false;
    let mut seen_colon = false;
    let mut seen_dual = false;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if section_header(line).is_some() {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }

        if EQUALS_PIPE_LINE.is_match(line) {
            return Some(Grammar::EqualsPipe);
        }
        if DUAL_UNIT_LINE.is_match(line) {
            seen_dual = true;
        } else if COLON_LINE.is_match(line) {
            seen_colon = true;
        }
    }

    if seen_dual {
        Some(Grammar::DualUnit)
    } else if seen_colon {
        Some(Grammar::LegacyColon)
    } else {
        None
    }
}
