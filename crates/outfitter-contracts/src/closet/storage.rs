use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::OutfitError;

/// Named string slots, the shape of a browser's local storage.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, OutfitError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), OutfitError>;
}

/// All slots live in one JSON object file. Writes re-read the file and only
/// replace the slot being written, so two handles on the same file keep each
/// other's slots.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, OutfitError> {
        let Some(slots) = read_json_object(&self.path)? else {
            return Ok(None);
        };
        match slots.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Ok(Some(raw.clone())),
            Some(other) => Err(OutfitError::persistence(format!(
                "slot '{key}' in {} holds {} instead of a string",
                self.path.display(),
                json_type_name(other)
            ))),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), OutfitError> {
        // An unreadable file is replaced rather than blocking every write.
        let mut slots = match read_json_object(&self.path) {
            Ok(slots) => slots.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "storage file unreadable; overwriting it and discarding its other slots"
                );
                Map::new()
            }
        };
        slots.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &slots)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, OutfitError> {
        Ok(self.slots.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), OutfitError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn read_json_object(path: &Path) -> Result<Option<Map<String, Value>>, OutfitError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(OutfitError::persistence(format!(
                "failed reading {}: {err}",
                path.display()
            )))
        }
    };
    let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
        OutfitError::persistence(format!("{} is not valid JSON: {err}", path.display()))
    })?;
    match parsed {
        Value::Object(slots) => Ok(Some(slots)),
        other => Err(OutfitError::persistence(format!(
            "{} holds {} instead of an object",
            path.display(),
            json_type_name(&other)
        ))),
    }
}

fn write_json_object(path: &Path, slots: &Map<String, Value>) -> Result<(), OutfitError> {
    let write = || -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(slots)?)?;
        Ok(())
    };
    write().map_err(|err| {
        OutfitError::persistence(format!("failed writing {}: {err:#}", path.display()))
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStorage, KeyValueStorage, MemoryStorage};

    #[test]
    fn file_storage_missing_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = FileStorage::new(temp.path().join("storage.json"));
        assert_eq!(storage.get_item("closet")?, None);
        Ok(())
    }

    #[test]
    fn file_storage_round_trip_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("storage.json");
        let mut storage = FileStorage::new(&path);
        storage.set_item("closet", "[1,2]")?;
        assert_eq!(storage.get_item("closet")?, Some("[1,2]".to_string()));
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn file_storage_keeps_other_handles_slots() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        let mut storage_a = FileStorage::new(&path);
        let mut storage_b = FileStorage::new(&path);

        storage_a.set_item("a", "1")?;
        storage_b.set_item("b", "2")?;
        storage_a.set_item("c", "3")?;

        let reader = FileStorage::new(&path);
        assert_eq!(reader.get_item("a")?, Some("1".to_string()));
        assert_eq!(reader.get_item("b")?, Some("2".to_string()));
        assert_eq!(reader.get_item("c")?, Some("3".to_string()));
        Ok(())
    }

    #[test]
    fn file_storage_reports_malformed_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        std::fs::write(&path, "{not json")?;
        let mut storage = FileStorage::new(&path);
        let err = storage.get_item("closet").err();
        assert_eq!(err.map(|err| err.kind()), Some("persistence"));

        storage.set_item("closet", "[]")?;
        assert_eq!(storage.get_item("closet")?, Some("[]".to_string()));
        Ok(())
    }

    #[test]
    fn write_over_unreadable_file_keeps_only_new_slot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        std::fs::write(&path, r#"["not", "an", "object"]"#)?;

        let mut storage = FileStorage::new(&path);
        storage.set_item("closet", "[]")?;

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(written, serde_json::json!({"closet": "[]"}));
        Ok(())
    }

    #[test]
    fn file_storage_rejects_non_string_slot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        std::fs::write(&path, r#"{"closet": [1, 2]}"#)?;
        let storage = FileStorage::new(&path);
        assert!(storage.get_item("closet").is_err());
        assert_eq!(storage.get_item("other")?, None);
        Ok(())
    }

    #[test]
    fn memory_storage_basic() -> anyhow::Result<()> {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k")?, None);
        storage.set_item("k", "v")?;
        assert_eq!(storage.get_item("k")?, Some("v".to_string()));
        Ok(())
    }
}
