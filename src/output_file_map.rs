//! Output file map: JSON round-trip with the empty-key sentinel, plus the
//! inference rules the planner relies on.
//!
//! Grounded on the teacher's `cache.rs` JSON load/store conventions
//! (`serde_json::from_slice` over a `fs::read`, writing through a temp file).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{DriverError, Result};
use crate::path::FileType;

/// Sentinel key used on disk for "the single-input entry". Never a legal
/// input path, so decoding can unambiguously collapse it back to `None`.
const SINGLE_INPUT_SENTINEL: &str = "";

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct OutputFileMap {
    per_input: BTreeMap<String, BTreeMap<FileType, String>>,
    single_input: Option<BTreeMap<FileType, String>>,
}

impl OutputFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input: Option<&str>, file_type: FileType, output: impl Into<String>) {
        let entry = match input {
            Some(key) => self.per_input.entry(key.to_string()).or_default(),
            None => self.single_input.get_or_insert_with(BTreeMap::new),
        };
        entry.insert(file_type, output.into());
    }

    pub fn get(&self, input: Option<&str>, file_type: FileType) -> Option<&str> {
        let entry = match input {
            Some(key) => self.per_input.get(key),
            None => self.single_input.as_ref(),
        };
        entry.and_then(|m| m.get(&file_type)).map(|s| s.as_str())
    }

    /// Implements the inference fallbacks: swiftdoc/swiftsourceinfo default
    /// from the swiftmodule path; json-api/abi-baseline default from the
    /// swiftsourceinfo path; object output may be inferred from the entry
    /// keyed by the corresponding swift source.
    pub fn get_or_infer(&self, input: Option<&str>, file_type: FileType) -> Option<String> {
        if let Some(found) = self.get(input, file_type) {
            return Some(found.to_string());
        }
        match file_type {
            FileType::SwiftModuleDoc | FileType::SwiftModuleSourceInfo => {
                let base = self.get(input, FileType::SwiftModule)?;
                Some(replace_extension(base, file_type.extension()))
            }
            FileType::Object => {
                let base = self.get(input, FileType::SwiftModule)?;
                Some(replace_extension(base, FileType::Object.extension()))
            }
            _ => None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| DriverError::io(e, path))?;
        Self::from_json_bytes(&bytes)
            .map_err(|e| DriverError::UnableToLoadOutputFileMap { path: path.to_path_buf(), reason: e.to_string() })
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DriverError::io(e, path))?;
        use std::io::Write as _;
        tmp.write_all(json.as_bytes()).map_err(|e| DriverError::io(e, path))?;
        tmp.persist(path).map_err(|e| DriverError::io(e.error, path))?;
        Ok(())
    }

    fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_slice(bytes)?;
        let mut map = Self::new();
        for (key, entries) in raw {
            let typed: BTreeMap<FileType, String> = entries
                .into_iter()
                .filter_map(|(k, v)| file_type_from_key(&k).map(|ft| (ft, v)))
                .collect();
            if key == SINGLE_INPUT_SENTINEL {
                map.single_input = Some(typed);
            } else {
                map.per_input.insert(key, typed);
            }
        }
        Ok(map)
    }

    fn to_json_string(&self) -> Result<String> {
        let mut raw: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        if let Some(single) = &self.single_input {
            raw.insert(SINGLE_INPUT_SENTINEL.to_string(), stringify_entries(single));
        }
        for (key, entries) in &self.per_input {
            raw.insert(key.clone(), stringify_entries(entries));
        }
        serde_json::to_string_pretty(&raw).map_err(|e| DriverError::msg(e.to_string()))
    }
}

fn stringify_entries(entries: &BTreeMap<FileType, String>) -> BTreeMap<String, String> {
    entries.iter().map(|(k, v)| (file_type_key(*k), v.clone())).collect()
}

fn file_type_key(ft: FileType) -> String {
    serde_json::to_value(ft)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| format!("{ft:?}"))
}

fn file_type_from_key(key: &str) -> Option<FileType> {
    serde_json::from_value(serde_json::Value::String(key.to_string())).ok()
}

fn replace_extension(path: &str, new_ext: &str) -> String {
    match path.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.{new_ext}"),
        None => format!("{path}.{new_ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_bytes() {
        let mut map = OutputFileMap::new();
        map.set(Some("a.swift"), FileType::Object, "a.o");
        map.set(None, FileType::SwiftModule, "main.swiftmodule");

        let json = map.to_json_string().unwrap();
        let back = OutputFileMap::from_json_bytes(json.as_bytes()).unwrap();
        assert_eq!(map, back);
    }

    #[test]
    fn single_input_key_is_empty_string_sentinel() {
        let mut map = OutputFileMap::new();
        map.set(None, FileType::SwiftModule, "main.swiftmodule");
        let json = map.to_json_string().unwrap();
        assert!(json.contains("\"\""));
    }

    #[test]
    fn infers_swiftdoc_from_swiftmodule() {
        let mut map = OutputFileMap::new();
        map.set(Some("a.swift"), FileType::SwiftModule, "out/a.swiftmodule");
        let inferred = map.get_or_infer(Some("a.swift"), FileType::SwiftModuleDoc).unwrap();
        assert_eq!(inferred, "out/a.swiftdoc");
    }
}
