//! Persisted "what is selected" state: the job and contest the user drilled
//! into, plus the active page.
//!
//! Everything goes through a string-only key/value medium. The read path is
//! the only place that decides whether a stored value means "no selection".

#[cfg(test)]
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Domain, Identifier, Page};

/// Literal written for an explicit "no selection".
pub const NULL_TEXT: &str = "null";

/// String-only persistent key/value storage.
///
/// `write` and `remove` must be visible to the next `read` on the same value
/// before they return, and must survive a process restart.
pub trait KeyValueMedium {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory medium. Clones share the same map, so a second store built from
/// a clone behaves like the app after a restart.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

#[cfg(test)]
impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueMedium for MemoryMedium {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every change.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileMedium {
    /// Opens the state file. A missing file is an empty store; an unreadable
    /// or corrupt one is logged and also treated as empty so the app still
    /// starts on the list views.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => {
                    info!("Loaded {} state entries from {}", entries.len(), path.display());
                    entries
                }
                Err(err) => {
                    warn!("Ignoring corrupt state file {}: {}", path.display(), err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(err) => {
                warn!("Cannot read state file {}: {}", path.display(), err);
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(&self.entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueMedium for FileMedium {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Raw state of one selection key, before collapsing to `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    NeverSet,
    Cleared,
    Selected(Identifier),
}

impl Selection {
    pub fn into_identifier(self) -> Option<Identifier> {
        match self {
            Selection::Selected(id) => Some(id),
            Selection::NeverSet | Selection::Cleared => None,
        }
    }
}

/// Absent, blank and the exact literal `null` all mean "nothing selected".
/// Anything else is an id and comes back byte for byte.
pub fn normalize_persisted(raw: Option<&str>) -> Selection {
    match raw {
        None => Selection::NeverSet,
        Some(text) if text.trim().is_empty() || text == NULL_TEXT => Selection::Cleared,
        Some(text) => Selection::Selected(Identifier::new(text)),
    }
}

pub struct SelectionStore {
    medium: Box<dyn KeyValueMedium>,
}

impl SelectionStore {
    pub fn new(medium: Box<dyn KeyValueMedium>) -> Self {
        Self { medium }
    }

    pub fn selection(&self, domain: Domain) -> Selection {
        normalize_persisted(self.medium.read(domain.storage_key()).as_deref())
    }

    pub fn get(&self, domain: Domain) -> Option<Identifier> {
        self.selection(domain).into_identifier()
    }

    /// `None` stores an explicit reset, distinguishable from never set.
    pub fn set(&mut self, domain: Domain, id: Option<Identifier>) -> Result<(), StoreError> {
        let text = id.as_ref().map_or(NULL_TEXT, Identifier::as_str);
        debug!("Selection {} <- {}", domain, text);
        self.medium.write(domain.storage_key(), text)
    }

    /// Forgets the key entirely.
    pub fn clear(&mut self, domain: Domain) -> Result<(), StoreError> {
        debug!("Selection {} cleared", domain);
        self.medium.remove(domain.storage_key())
    }

    pub fn page(&self) -> Page {
        Page::from_persisted(self.medium.read(Page::STORAGE_KEY).as_deref())
    }

    pub fn set_page(&mut self, page: Page) -> Result<(), StoreError> {
        self.medium.write(Page::STORAGE_KEY, page.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> (MemoryMedium, SelectionStore) {
        let medium = MemoryMedium::new();
        let store = SelectionStore::new(Box::new(medium.clone()));
        (medium, store)
    }

    #[test]
    fn fresh_store_has_no_selection() {
        let (_, store) = memory_store();
        assert_eq!(store.selection(Domain::Job), Selection::NeverSet);
        assert_eq!(store.get(Domain::Contest), None);
        assert_eq!(store.page(), Page::Home);
    }

    #[test]
    fn null_like_values_collapse_to_none() {
        for raw in ["", "   ", "null"] {
            let mut medium = MemoryMedium::new();
            medium.write("jobId", raw).unwrap();
            let store = SelectionStore::new(Box::new(medium));
            assert_eq!(store.get(Domain::Job), None, "raw value {raw:?}");
            assert_eq!(store.selection(Domain::Job), Selection::Cleared);
        }
    }

    #[test]
    fn set_none_differs_from_never_set() {
        let (_, mut store) = memory_store();
        store.set(Domain::Job, None).unwrap();
        assert_eq!(store.selection(Domain::Job), Selection::Cleared);
        assert_eq!(store.selection(Domain::Contest), Selection::NeverSet);

        store.clear(Domain::Job).unwrap();
        assert_eq!(store.selection(Domain::Job), Selection::NeverSet);
    }

    #[test]
    fn selection_survives_reload() {
        let (medium, mut store) = memory_store();
        store.set(Domain::Job, Some(Identifier::from(42))).unwrap();
        store.set(Domain::Contest, Some(Identifier::from("spring-cup"))).unwrap();
        assert_eq!(store.get(Domain::Job), Some(Identifier::from(42)));

        let reloaded = SelectionStore::new(Box::new(medium));
        assert_eq!(reloaded.get(Domain::Job), Some(Identifier::from(42)));
        assert_eq!(reloaded.get(Domain::Contest), Some(Identifier::from("spring-cup")));
    }

    #[test]
    fn padded_ids_round_trip_unchanged() {
        let (medium, mut store) = memory_store();
        store.set(Domain::Job, Some(Identifier::new(" 7 "))).unwrap();
        store.set(Domain::Contest, Some(Identifier::new(" null "))).unwrap();
        assert_eq!(store.get(Domain::Job), Some(Identifier::new(" 7 ")));

        let reloaded = SelectionStore::new(Box::new(medium));
        assert_eq!(reloaded.get(Domain::Job), Some(Identifier::new(" 7 ")));
        assert_eq!(
            reloaded.selection(Domain::Contest),
            Selection::Selected(Identifier::new(" null "))
        );
    }

    #[test]
    fn domains_are_independent() {
        let (_, mut store) = memory_store();
        store.set(Domain::Contest, Some(Identifier::from(3))).unwrap();
        store.set(Domain::Job, Some(Identifier::from(9))).unwrap();
        store.set(Domain::Job, None).unwrap();
        assert_eq!(store.get(Domain::Contest), Some(Identifier::from(3)));
    }

    #[test]
    fn file_medium_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = SelectionStore::new(Box::new(FileMedium::open(&path)));
        store.set(Domain::Job, Some(Identifier::from(7))).unwrap();
        store.set(Domain::Contest, None).unwrap();
        store.set_page(Page::Status).unwrap();
        assert_eq!(store.get(Domain::Job), Some(Identifier::from(7)));

        let reopened = SelectionStore::new(Box::new(FileMedium::open(&path)));
        assert_eq!(reopened.get(Domain::Job), Some(Identifier::from(7)));
        assert_eq!(reopened.selection(Domain::Contest), Selection::Cleared);
        assert_eq!(reopened.page(), Page::Status);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = SelectionStore::new(Box::new(FileMedium::open(&path)));
        assert_eq!(store.get(Domain::Job), None);

        store.set(Domain::Job, Some(Identifier::from(1))).unwrap();
        let reopened = SelectionStore::new(Box::new(FileMedium::open(&path)));
        assert_eq!(reopened.get(Domain::Job), Some(Identifier::from(1)));
    }
}
