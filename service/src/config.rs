use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PROFILE: &str = "search";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Service settings, read from `RUNLOG_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    /// JSON array of custom profile specs, loaded on top of the built-ins.
    pub profiles_path: Option<PathBuf>,
    pub default_profile: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_value = lookup("RUNLOG_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                var: "RUNLOG_ADDR",
                value: addr_value.clone(),
                source,
            })?;

        let data_dir = lookup("RUNLOG_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        if data_dir.trim().is_empty() {
            return Err(ConfigError::Empty("RUNLOG_DATA_DIR"));
        }

        let default_profile =
            lookup("RUNLOG_DEFAULT_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        if default_profile.trim().is_empty() {
            return Err(ConfigError::Empty("RUNLOG_DEFAULT_PROFILE"));
        }

        Ok(Self {
            addr,
            data_dir: PathBuf::from(data_dir),
            profiles_path: lookup("RUNLOG_PROFILES")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            default_profile,
        })
    }
}
