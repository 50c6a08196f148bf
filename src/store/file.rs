//! Counter store persisted as a flat JSON object.
//!
//! The file holds one map of `"{context}__{key}"` to count. Every mutation
//! rewrites the file through a sibling temp file, synced before it is renamed
//! over the original. The in-memory map only changes once that write succeeds.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use super::backend::CounterStore;
use super::context::{storage_key, Context};
use crate::error::{Result, UsageGateError};

/// Counter store backed by a JSON file on local disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, u64>>,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store; it is created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                UsageGateError::Store(format!(
                    "Failed to parse counter file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = values.len(), "Opened counter store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, u64>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let encoded = serde_json::to_vec_pretty(values)?;
        let mut file = File::create(&tmp)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        trace!(path = %self.path.display(), entries = values.len(), "Persisted counters");
        Ok(())
    }
}

impl CounterStore for JsonFileStore {
    fn set_counter(&self, value: u64, key: &str, context: &Context) -> Result<()> {
        let mut values = self.values.lock();
        let mut updated = values.clone();
        updated.insert(storage_key(key, context), value);

        self.persist(&updated)?;
        *values = updated;
        Ok(())
    }

    fn counter_value(&self, key: &str, context: &Context) -> Result<u64> {
        let values = self.values.lock();
        Ok(values.get(&storage_key(key, context)).copied().unwrap_or(0))
    }

    fn clear(&self, context: &Context) -> Result<()> {
        let prefix = context.key_prefix();
        let mut values = self.values.lock();
        let mut updated = values.clone();
        updated.retain(|key, _| !key.starts_with(&prefix));

        self.persist(&updated)?;
        debug!(
            context = %context,
            removed = values.len() - updated.len(),
            "Cleared counter context"
        );
        *values = updated;
        Ok(())
    }

    fn entries(&self, context: &Context) -> Result<BTreeMap<String, u64>> {
        let prefix = context.key_prefix();
        let values = self.values.lock();
        Ok(values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix.as_str())
                    .map(|rest| (rest.to_string(), *value))
            })
            .collect())
    }
}
