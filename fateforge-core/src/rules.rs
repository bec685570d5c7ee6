//! Read-only access to the static D&D 5e ruleset.
//!
//! The ruleset is the dnd5eapi.co 2014 dump: a tree of JSON documents
//! addressed by path (`races/elf`, `classes/wizard/levels/5`, ...). Records
//! reference each other either as embedded sub-documents or as bare
//! path/URL pointers; [`RecordRef`] classifies those shapes at the boundary
//! so the rest of the crate never matches on raw JSON.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// URL namespace prefix used throughout the dataset's cross-references.
const API_PREFIX: &str = "/api/2014";

/// The dataset's top-level categories. `list_category` only accepts these.
pub const CATEGORIES: &[&str] = &[
    "ability-scores",
    "alignments",
    "backgrounds",
    "classes",
    "conditions",
    "damage-types",
    "equipment",
    "equipment-categories",
    "feats",
    "features",
    "languages",
    "magic-items",
    "magic-schools",
    "monsters",
    "proficiencies",
    "races",
    "rule-sections",
    "rules",
    "skills",
    "spells",
    "subclasses",
    "subraces",
    "traits",
    "weapon-properties",
];

/// Errors from ruleset lookups.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("no rules record at '{0}'")]
    NotFound(String),

    #[error("unknown rules category '{0}'")]
    InvalidCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only, caching lookup over the ruleset directory.
///
/// Records are immutable once loaded; repeated lookups of the same path
/// return the same cached `Rc`. The cache is append-only for the lifetime
/// of the repository, and the repository is single-threaded by construction
/// (`Rc`/`RefCell`) — a multi-threaded host would have to swap these for
/// `Arc`/`Mutex`, which the compiler enforces.
#[derive(Debug)]
pub struct RulesRepository {
    root: PathBuf,
    cache: RefCell<HashMap<String, Rc<Value>>>,
}

impl RulesRepository {
    /// Open a repository over a dataset root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The dataset root this repository reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetch the record at `path`.
    ///
    /// Accepts both dataset-relative paths (`races/elf`) and the URL form
    /// used inside records (`/api/2014/races/elf`); a trailing `.json` is
    /// optional. Fails with [`RulesError::NotFound`] when no record exists.
    pub fn get(&self, path: &str) -> Result<Rc<Value>, RulesError> {
        let key = normalize_path(path);

        if let Some(record) = self.cache.borrow().get(&key) {
            return Ok(Rc::clone(record));
        }

        let file = self.root.join(&key);
        if !file.is_file() {
            return Err(RulesError::NotFound(key));
        }
        let content = std::fs::read_to_string(&file)?;
        let record: Value = serde_json::from_str(&content)?;
        let record = Rc::new(record);
        self.cache
            .borrow_mut()
            .insert(key, Rc::clone(&record));
        Ok(record)
    }

    /// List every record in a top-level category, keyed by index.
    ///
    /// Fails with [`RulesError::InvalidCategory`] if `name` is not one of
    /// [`CATEGORIES`]. The result is sorted by index so listings are
    /// deterministic.
    pub fn list_category(&self, name: &str) -> Result<BTreeMap<String, Rc<Value>>, RulesError> {
        if !CATEGORIES.contains(&name) {
            return Err(RulesError::InvalidCategory(name.to_string()));
        }

        let dir = self.root.join(name);
        let mut records = BTreeMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let record = self.get(&format!("{name}/{stem}"))?;
            records.insert(stem.to_string(), record);
        }
        Ok(records)
    }
}

/// Normalize a record path to a cache key / file path relative to the root.
fn normalize_path(path: &str) -> String {
    let path = path.replace(API_PREFIX, "");
    let path = path.trim_matches('/');
    if path.ends_with(".json") {
        path.to_string()
    } else {
        format!("{path}.json")
    }
}

/// A cross-reference inside a rules record.
///
/// Dataset fields are sometimes an embedded sub-document, sometimes a bare
/// pointer (a URL string or an `{index, name, url}` stub), and sometimes
/// missing entirely. Classify once here, then work with concrete values.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordRef {
    /// The referenced document is embedded in place.
    Embedded(Value),
    /// Only a path to the document is present; fetch it to resolve.
    Pointer(String),
    /// The field is absent or null.
    Absent,
}

impl RecordRef {
    /// Classify a record field.
    pub fn classify(field: Option<&Value>) -> RecordRef {
        match field {
            None | Some(Value::Null) => RecordRef::Absent,
            Some(Value::String(path)) => RecordRef::Pointer(path.clone()),
            Some(Value::Object(map)) => {
                // {index, name, url} stubs are pointers; anything richer is
                // an embedded document.
                let stub = map.contains_key("url")
                    && map.keys().all(|k| k == "index" || k == "name" || k == "url");
                if stub {
                    RecordRef::Pointer(map["url"].as_str().unwrap_or_default().to_string())
                } else {
                    RecordRef::Embedded(Value::Object(map.clone()))
                }
            }
            Some(other) => RecordRef::Embedded(other.clone()),
        }
    }

    /// Resolve to a concrete record, fetching pointers through `repo`.
    pub fn resolve(&self, repo: &RulesRepository) -> Result<Option<Rc<Value>>, RulesError> {
        match self {
            RecordRef::Absent => Ok(None),
            RecordRef::Pointer(path) => repo.get(path).map(Some),
            RecordRef::Embedded(value) => Ok(Some(Rc::new(value.clone()))),
        }
    }
}

/// The `index` field of a record, if present.
pub fn index_of(record: &Value) -> Option<&str> {
    record.get("index").and_then(Value::as_str)
}

/// The `name` field of a record, if present.
pub fn name_of(record: &Value) -> Option<&str> {
    record.get("name").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureDataset;
    use serde_json::json;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("races/elf"), "races/elf.json");
        assert_eq!(normalize_path("/races/elf.json"), "races/elf.json");
        assert_eq!(normalize_path("/api/2014/races/elf"), "races/elf.json");
    }

    #[test]
    fn test_get_and_cache() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let first = repo.get("races/elf").expect("elf record");
        let second = repo.get("/api/2014/races/elf").expect("elf record again");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(index_of(&first), Some("elf"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let err = repo.get("races/tarrasque-kin").unwrap_err();
        assert!(matches!(err, RulesError::NotFound(_)));
    }

    #[test]
    fn test_list_category() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let races = repo.list_category("races").expect("races listing");
        assert!(races.contains_key("elf"));
        assert!(races.contains_key("human"));

        let err = repo.list_category("planes-of-existence").unwrap_err();
        assert!(matches!(err, RulesError::InvalidCategory(_)));
    }

    #[test]
    fn test_record_ref_classification() {
        assert_eq!(RecordRef::classify(None), RecordRef::Absent);
        assert_eq!(RecordRef::classify(Some(&Value::Null)), RecordRef::Absent);

        let pointer = json!("/api/2014/spells/fire-bolt");
        assert_eq!(
            RecordRef::classify(Some(&pointer)),
            RecordRef::Pointer("/api/2014/spells/fire-bolt".to_string())
        );

        let stub = json!({"index": "elf", "name": "Elf", "url": "/api/2014/races/elf"});
        assert_eq!(
            RecordRef::classify(Some(&stub)),
            RecordRef::Pointer("/api/2014/races/elf".to_string())
        );

        let embedded = json!({"index": "darkvision", "range": 60});
        assert!(matches!(
            RecordRef::classify(Some(&embedded)),
            RecordRef::Embedded(_)
        ));
    }

    #[test]
    fn test_record_ref_resolution() {
        let fixture = FixtureDataset::new();
        let repo = fixture.repository();

        let stub = json!({"index": "elf", "name": "Elf", "url": "/api/2014/races/elf"});
        let resolved = RecordRef::classify(Some(&stub))
            .resolve(&repo)
            .expect("resolves")
            .expect("present");
        assert_eq!(name_of(&resolved), Some("Elf"));

        assert!(RecordRef::Absent.resolve(&repo).expect("ok").is_none());
    }
}
