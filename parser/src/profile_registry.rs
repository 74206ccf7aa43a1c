use crate::base_grammar::detect_grammar;
use crate::profiles::all_profiles;
use crate::{Grammar, LogParser, ParseError, Profile, ProfileSpec, PropertyMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Section grammar to parse with: the profile's own, detected from the log,
/// or a fixed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrammarChoice {
    #[default]
    Profile,
    Auto,
    Fixed(Grammar),
}

impl GrammarChoice {
    /// `None` or empty keeps the profile's grammar; `auto` detects it.
    pub fn from_param(param: Option<&str>) -> Result<Self, ParseError> {
        match param.map(str::trim) {
            None | Some("") => Ok(GrammarChoice::Profile),
            Some("auto") => Ok(GrammarChoice::Auto),
            Some(name) => name.parse().map(GrammarChoice::Fixed),
        }
    }
}

/// ProfileRegistry - holds the profiles runs can be parsed with
///
/// ## Adding a New Profile
///
/// Built-in profiles live in `profiles.rs`; no changes to this file are
/// required. Vintages without a built-in can be described as JSON
/// `ProfileSpec`s and loaded with [`ProfileRegistry::load_specs`].
pub struct ProfileRegistry {
    profiles: Vec<Arc<Profile>>,
}

impl ProfileRegistry {
    /// Create a registry with every built-in profile.
    pub fn new() -> Self {
        info!("Initializing ProfileRegistry");
        let profiles: Vec<Arc<Profile>> = all_profiles().into_iter().map(Arc::new).collect();

        info!(
            "Registered {} profiles: {}",
            profiles.len(),
            profiles.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Self { profiles }
    }

    /// Register a profile, replacing any profile of the same name.
    pub fn register(&mut self, profile: Profile) {
        let name = profile.name().to_string();

        if let Some(slot) = self.profiles.iter_mut().find(|p| p.name() == name) {
            warn!("Replacing existing profile: {}", name);
            *slot = Arc::new(profile);
        } else {
            info!("Registering custom profile: {}", name);
            self.profiles.push(Arc::new(profile));
        }
    }

    /// Build and register every spec in a JSON array. Nothing is registered
    /// if any spec fails to build.
    pub fn load_specs(&mut self, json: &str) -> Result<Vec<String>, ParseError> {
        let specs: Vec<ProfileSpec> = serde_json::from_str(json)?;
        let profiles = specs
            .iter()
            .map(ProfileSpec::build)
            .collect::<Result<Vec<_>, _>>()?;

        let names = profiles.iter().map(|p| p.name().to_string()).collect();
        for profile in profiles {
            self.register(profile);
        }
        Ok(names)
    }

    pub fn load_specs_from_path(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>, ParseError> {
        let path = path.as_ref();
        info!("Loading custom profiles from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        self.load_specs(&json)
    }

    /// Get profile by name
    pub fn get(&self, name: &str) -> Option<Arc<Profile>> {
        debug!("Looking up profile by name: {}", name);
        let result = self.profiles.iter().find(|p| p.name() == name).cloned();

        if result.is_none() {
            warn!("Profile not found: {}", name);
        }

        result
    }

    /// Profile names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name()).collect()
    }

    pub fn parser(&self, name: &str) -> Result<LogParser, ParseError> {
        self.get(name)
            .map(LogParser::new)
            .ok_or_else(|| ParseError::UnknownProfile(name.to_string()))
    }

    pub fn parse(&self, name: &str, text: &str) -> Result<PropertyMap, ParseError> {
        Ok(self.parser(name)?.parse(text))
    }

    /// Parse with the section grammar detected from the log itself. Falls
    /// back to the profile's own grammar when the log has no section bodies.
    pub fn parse_auto(&self, name: &str, text: &str) -> Result<PropertyMap, ParseError> {
        self.parse_with(name, text, GrammarChoice::Auto)
            .map(|(props, _)| props)
    }

    /// Parse with the grammar picked by `choice`, returning the properties
    /// and the grammar actually used.
    pub fn parse_with(
        &self,
        name: &str,
        text: &str,
        choice: GrammarChoice,
    ) -> Result<(PropertyMap, Option<Grammar>), ParseError> {
        let profile = self
            .get(name)
            .ok_or_else(|| ParseError::UnknownProfile(name.to_string()))?;

        let grammar = match choice {
            GrammarChoice::Profile => profile.grammar(),
            GrammarChoice::Auto => {
                let detected = detect_grammar(text);
                debug!("Detected grammar {:?} for profile '{}'", detected, name);
                detected.or(profile.grammar())
            }
            GrammarChoice::Fixed(grammar) => Some(grammar),
        };

        let parser = if grammar == profile.grammar() {
            LogParser::new(profile)
        } else {
            info!(
                "Overriding grammar of profile '{}' with {:?}",
                name,
                grammar.map(Grammar::name)
            );
            LogParser::new(profile.with_grammar(grammar))
        };

        Ok((parser.parse(text), grammar))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
