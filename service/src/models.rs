use chrono::{DateTime, Utc};
use runlog_parser::Grammar;
use serde::{Deserialize, Serialize};

/// Stored next to a run's properties as `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub profile: String,
    /// Section grammar the log was scanned with, if any.
    pub grammar: Option<Grammar>,
    pub log_bytes: usize,
    pub property_count: usize,
    pub parsed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunResponse {
    pub run_id: String,
    pub profile: String,
    pub property_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseQuery {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub grammar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_meta_json() {
        let meta = RunMeta {
            run_id: "r1".into(),
            profile: "datalog".into(),
            grammar: Some(Grammar::EqualsPipe),
            log_bytes: 120,
            property_count: 9,
            parsed_at: Utc::now(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["grammar"], "equals-pipe");

        let back: RunMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
