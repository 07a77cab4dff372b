use ergo_check::equivalence::EquivalenceStore;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Keeps proven equivalences in a JSON file mapping a normal form to its known equivalents.
///
/// Every save reads the file, merges and writes it back; concurrent processes may overwrite
/// each other's additions.
pub(crate) struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    fn read(&self) -> BTreeMap<String, Vec<String>> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }
}

impl EquivalenceStore for JsonFileStore {
    fn load(&self, key: &str) -> Vec<String> {
        self.read().remove(key).unwrap_or_default()
    }

    fn save(&self, key: &str, values: &[String]) {
        let mut entries = self.read();
        let known = entries.entry(key.to_owned()).or_insert_with(Vec::new);
        for value in values {
            if !known.contains(value) {
                known.push(value.clone());
            }
        }
        let written = serde_json::to_string_pretty(&entries)
            .map_err(|e| e.to_string())
            .and_then(|text| fs::write(&self.path, text).map_err(|e| e.to_string()));
        if let Err(error) = written {
            warn!(store = %self.path.display(), error = %error, "cannot save equivalence");
        }
    }
}
