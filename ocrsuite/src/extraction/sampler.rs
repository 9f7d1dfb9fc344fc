use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{OcrError, Result};
use crate::models::{FieldMap, Lookup};

/// Sampler code (lowercased) to the field names it allows, in declared spelling.
type SamplerTable = HashMap<String, Vec<String>>;

/// Named field allow-lists applied to extraction results.
///
/// The table is an immutable snapshot; loading builds a new table and swaps it
/// in, so requests never observe a partially loaded state.
#[derive(Default)]
pub struct SamplerProvider {
    table: RwLock<Arc<SamplerTable>>,
}

impl SamplerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{ "samplerCode": ["field", ...], ... }` and replaces the table.
    ///
    /// Entries whose value is not an array are ignored, as are blank or
    /// non-string field names. Malformed JSON leaves the current table in place.
    pub fn load_from_json(&self, json: &str) -> Result<usize> {
        let table = match parse_table(json) {
            Ok(table) => table,
            Err(e) => {
                error!(error = %e, "Failed to load samplers; keeping current table");
                return Err(e);
            }
        };

        let count = table.len();
        self.swap(table);
        info!(count, "Samplers loaded");
        Ok(count)
    }

    /// Loads the sampler file at `path`. A missing file yields an empty table.
    pub fn load_from_path(&self, path: &Path) -> Result<usize> {
        match std::fs::read_to_string(path) {
            Ok(json) => self.load_from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Sampler file not found; no samplers configured");
                self.swap(SamplerTable::new());
                Ok(0)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read sampler file");
                Err(OcrError::Io(e))
            }
        }
    }

    pub fn lookup(&self, code: &str) -> Lookup<Vec<String>> {
        self.snapshot().get(&code.to_lowercase()).cloned().into()
    }

    /// Restricts `fields` to the sampler's allow-list, keyed by the sampler's
    /// spelling. Blank or unknown codes return the fields unchanged.
    pub fn apply(&self, fields: &FieldMap, sampler_code: Option<&str>) -> FieldMap {
        let Some(code) = sampler_code.map(str::trim).filter(|c| !c.is_empty()) else {
            return fields.clone();
        };

        let allowed = match self.lookup(code) {
            Lookup::Found(allowed) => allowed,
            Lookup::NotFound => {
                warn!(sampler = %code, "Unknown sampler; returning all fields");
                return fields.clone();
            }
        };

        let filtered: FieldMap = allowed
            .iter()
            .filter_map(|name| fields.get(name).map(|value| (name.as_str(), value)))
            .collect();

        debug!(
            sampler = %code,
            before = fields.len(),
            after = filtered.len(),
            "Sampler applied"
        );
        filtered
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Arc<SamplerTable> {
        let guard = self
            .table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn swap(&self, table: SamplerTable) {
        let mut guard = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(table);
    }
}

fn parse_table(json: &str) -> Result<SamplerTable> {
    let root: Value = serde_json::from_str(json)?;
    let Value::Object(entries) = root else {
        return Err(OcrError::Validation(
            "Sampler configuration must be a JSON object".to_string(),
        ));
    };

    let mut table = SamplerTable::with_capacity(entries.len());
    for (code, value) in entries {
        let Value::Array(items) = value else {
            debug!(sampler = %code, "Skipping sampler that is not an array");
            continue;
        };

        let fields = items
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .collect();
        table.insert(code.to_lowercase(), fields);
    }

    Ok(table)
}
