use super::{AdapterError, AdapterResult, FetchFilter, SourceAdapter, SourceRecord};
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only adapter over a JSON array of raw records exported to a file.
pub struct JsonSnapshot<R> {
    name: String,
    path: PathBuf,
    _record: PhantomData<R>,
}

impl<R> JsonSnapshot<R> {
    pub fn new(name: &str, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            path: path.as_ref().to_path_buf(),
            _record: PhantomData,
        }
    }
}

impl<R> SourceAdapter for JsonSnapshot<R>
where
    R: SourceRecord + DeserializeOwned + Clone,
{
    type Record = R;

    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_collection(&mut self, filter: &FetchFilter) -> AdapterResult<Vec<R>> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| AdapterError::Snapshot(format!("{}: {}", self.path.display(), e)))?;

        let records: Vec<R> = serde_json::from_str(&content)
            .map_err(|e| AdapterError::Malformed(format!("{}: {}", self.path.display(), e)))?;

        let total = records.len();
        let kept: Vec<R> = records
            .into_iter()
            .filter(|r| filter.accepts(r.record_date()))
            .collect();

        debug!(
            snapshot = %self.path.display(),
            total,
            kept = kept.len(),
            "loaded snapshot"
        );
        Ok(kept)
    }
}
