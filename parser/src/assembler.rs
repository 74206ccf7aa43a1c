use crate::derive::derive_all;
use crate::section::SectionScanner;
use crate::{Profile, PropertyMap};
use std::sync::Arc;
use tracing::debug;

/// Turns one run's log text into its property map using a fixed profile.
///
/// Parsing does no I/O and holds no state between runs, so one parser can
/// be shared across threads.
#[derive(Debug, Clone)]
pub struct LogParser {
    profile: Arc<Profile>,
}

impl LogParser {
    pub fn new(profile: impl Into<Arc<Profile>>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Global patterns, then section blocks, then derivations.
    pub fn parse(&self, text: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        self.parse_into(text, &mut props);
        props
    }

    /// Like [`parse`](Self::parse), but adds to an existing map. Keys this
    /// profile produces overwrite older values; everything else is kept.
    pub fn parse_into(&self, text: &str, props: &mut PropertyMap) {
        let profile = &self.profile;
        debug!(profile = profile.name(), bytes = text.len(), "Parsing run log");

        profile
            .patterns()
            .apply(text, profile.coercion_policy(), props);

        if let Some(grammar) = profile.grammar() {
            SectionScanner::new(grammar, profile.sections()).scan(text, props);
        }

        derive_all(profile.derivations(), props);

        debug!(
            profile = profile.name(),
            properties = props.len(),
            "Parsed run log"
        );
    }
}
