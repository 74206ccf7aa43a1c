use crate::models::RunMeta;
use chrono::Utc;
use runlog_parser::{Grammar, PropertyMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const PROPERTIES_FILE: &str = "properties.json";
const META_FILE: &str = "run.json";

/// One directory per run under `base_path`, holding `properties.json` and
/// `run.json`.
pub struct RunStorage {
    base_path: PathBuf,
}

impl RunStorage {
    pub fn new(base_path: impl AsRef<Path>) -> io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn create_run(&self) -> io::Result<String> {
        let run_id = Uuid::new_v4().to_string();
        fs::create_dir_all(self.run_path(&run_id)?)?;
        Ok(run_id)
    }

    /// Run ids come from URLs, so anything that is not a uuid is treated as
    /// an unknown run.
    pub fn run_path(&self, run_id: &str) -> io::Result<PathBuf> {
        Uuid::parse_str(run_id).map_err(|_| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such run: {}", run_id))
        })?;
        Ok(self.base_path.join(run_id))
    }

    pub fn run_exists(&self, run_id: &str) -> bool {
        self.run_path(run_id).map(|p| p.is_dir()).unwrap_or(false)
    }

    /// Returns whether the run existed.
    pub fn delete_run(&self, run_id: &str) -> io::Result<bool> {
        let run_path = self.run_path(run_id)?;
        if run_path.exists() {
            fs::remove_dir_all(run_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn write_properties(&self, run_id: &str, props: &PropertyMap) -> Result<(), Box<dyn std::error::Error>> {
        let path = self.run_path(run_id)?.join(PROPERTIES_FILE);
        let json = serde_json::to_string_pretty(props)?;
        let mut file = fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Read back as plain JSON: an infinite skew was written as `null`,
    /// which has no `PropertyValue` form.
    pub fn read_properties(&self, run_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        let path = self.run_path(run_id)?.join(PROPERTIES_FILE);
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn write_meta(&self, run_id: &str, meta: &RunMeta) -> Result<(), Box<dyn std::error::Error>> {
        let path = self.run_path(run_id)?.join(META_FILE);
        let json = serde_json::to_string_pretty(meta)?;
        let mut file = fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn read_meta(&self, run_id: &str) -> Result<RunMeta, Box<dyn std::error::Error>> {
        let path = self.run_path(run_id)?.join(META_FILE);
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Write a parsed run and its metadata to storage
pub fn store_run(
    storage: &RunStorage,
    run_id: &str,
    profile: &str,
    grammar: Option<Grammar>,
    log_bytes: usize,
    props: &PropertyMap,
) -> Result<RunMeta, Box<dyn std::error::Error>> {
    storage.write_properties(run_id, props)?;

    let meta = RunMeta {
        run_id: run_id.to_string(),
        profile: profile.to_string(),
        grammar,
        log_bytes,
        property_count: props.len(),
        parsed_at: Utc::now(),
    };
    storage.write_meta(run_id, &meta)?;

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (RunStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("runlog_storage_{}", Uuid::new_v4()));
        (RunStorage::new(&dir).unwrap(), dir)
    }

    #[test]
    fn test_store_and_read_run() {
        let (storage, dir) = temp_storage();
        let run_id = storage.create_run().unwrap();

        let mut props = PropertyMap::new();
        props.insert("cost", 13i64);
        props.insert("memory", 21.311488);
        props.insert("ff_rule_skew", f64::INFINITY);

        let meta = store_run(&storage, &run_id, "search", None, 512, &props).unwrap();
        assert_eq!(meta.property_count, 3);

        let stored = storage.read_properties(&run_id).unwrap();
        assert_eq!(stored["cost"], 13);
        assert!((stored["memory"].as_f64().unwrap() - 21.311488).abs() < 1e-9);
        assert!(stored["ff_rule_skew"].is_null());

        assert_eq!(storage.read_meta(&run_id).unwrap(), meta);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_delete_run() {
        let (storage, dir) = temp_storage();
        let run_id = storage.create_run().unwrap();
        assert!(storage.run_exists(&run_id));

        assert!(storage.delete_run(&run_id).unwrap());
        assert!(!storage.run_exists(&run_id));
        assert!(!storage.delete_run(&run_id).unwrap());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_rejects_non_uuid_ids() {
        let (storage, dir) = temp_storage();
        let err = storage.run_path("../etc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(storage.read_meta("../etc").is_err());
        assert!(!storage.run_exists("../etc"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_run_is_an_error() {
        let (storage, dir) = temp_storage();
        let run_id = Uuid::new_v4().to_string();
        assert!(storage.read_properties(&run_id).is_err());

        fs::remove_dir_all(dir).unwrap();
    }
}
