//! Live per-mod configuration stores
//!
//! A [`Store`] binds one mod's schema to its persisted document. Reads never
//! touch the disk; saving is explicit and batched by the caller. Writes fire
//! change events on the store's own bus and then on the process-wide bus.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::compat::{classify, Compatibility, ConflictHandler, ConflictPolicy, VersionConflict};
use crate::error::{ConfigError, Result};
use crate::events::{global_bus, ConfigChanged, EventBus};
use crate::key::{Key, KeyDef};
use crate::persist::{self, Document, LoadOutcome};
use crate::schema::Schema;
use crate::settings::Settings;
use crate::value::{ConfigKind, ConfigValue};

/// Persistence status of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Uninitialized,
    Loading,
    /// Loaded (or started empty); saving is permitted
    Ready,
    /// An incompatible persisted version was refused under
    /// [`ConflictPolicy::Error`]; saving is refused until a reload succeeds
    Blocked,
}

/// Typed key-value store for one mod, bound to one schema
///
/// Shared via `Arc` for the mod's whole lifetime. All operations are safe
/// from any thread; reads never block on IO.
pub struct Store {
    mod_id: String,
    schema: Arc<Schema>,
    path: PathBuf,
    pretty: bool,
    values: RwLock<HashMap<String, ConfigValue>>,
    status: RwLock<StoreStatus>,
    events: EventBus,
    // Serializes mutation + event emission so subscribers observe events in
    // mutation order.
    write_order: Mutex<()>,
    // Serializes saves on this store; different stores save independently.
    save_lock: Mutex<()>,
}

impl Store {
    /// Open the store for `mod_id`, loading its persisted document
    ///
    /// Never fails: an absent or corrupt document starts the store empty, and
    /// an incompatible version resolves through `handler` (default:
    /// [`ConflictPolicy::Error`], which blocks saving).
    pub fn open(
        mod_id: impl Into<String>,
        schema: Arc<Schema>,
        settings: &Settings,
        handler: Option<&dyn ConflictHandler>,
    ) -> Arc<Self> {
        let mod_id = mod_id.into();
        let path = persist::document_path(&settings.document_root(), &mod_id);
        let store = Self {
            mod_id,
            schema,
            path,
            pretty: settings.storage.pretty,
            values: RwLock::new(HashMap::new()),
            status: RwLock::new(StoreStatus::Uninitialized),
            events: EventBus::new(),
            write_order: Mutex::new(()),
            save_lock: Mutex::new(()),
        };
        store.load(handler);
        Arc::new(store)
    }

    pub fn mod_id(&self) -> &str {
        &self.mod_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn status(&self) -> StoreStatus {
        *self.status.read()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// This store's own change bus; the process-wide bus is
    /// [`global_bus`](crate::events::global_bus)
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Enumerate the schema's keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &Arc<KeyDef>> {
        self.schema.keys()
    }

    /// Get the current value for `key`
    ///
    /// Returns the explicitly-set value if present, else a freshly computed
    /// default (never persisted as a side effect), else `None`. Fails only
    /// when `key` does not belong to this store's schema.
    pub fn try_get<T: ConfigKind>(&self, key: &Key<T>) -> Result<Option<T>> {
        self.check_owned(key.def())?;

        if let Some(stored) = self.values.read().get(key.name()) {
            match T::from_value(stored) {
                Some(value) => return Ok(Some(value)),
                None => {
                    // Values are kind-checked on entry, so this only trips if
                    // a key was redeclared at a new type without a version
                    // bump. Degrade to the default.
                    tracing::warn!(
                        mod_id = %self.mod_id,
                        key = %key.name(),
                        stored = %stored.kind(),
                        "stored value kind does not match key declaration; using default"
                    );
                }
            }
        }

        Ok(key.compute_default())
    }

    /// Set `key` to `value`
    ///
    /// Rejected if the key's validator refuses the value; nothing is stored
    /// and no event fires. On success the per-store bus fires first, then the
    /// process-wide bus. Re-setting an unchanged value still fires events:
    /// writes are last-writer-wins with no redundancy suppression.
    pub fn set<T: ConfigKind>(&self, key: &Key<T>, value: T) -> Result<()> {
        self.set_with_cause(key, value, None)
    }

    /// [`set`](Store::set) with a free-text label describing the cause,
    /// carried on the emitted event
    pub fn set_with_cause<T: ConfigKind>(
        &self,
        key: &Key<T>,
        value: T,
        cause: Option<&str>,
    ) -> Result<()> {
        self.check_owned(key.def())?;
        if !key.validate(&value) {
            return Err(ConfigError::Validation {
                key: key.name().to_string(),
            });
        }

        let stored = value.into_value();
        let _order = self.write_order.lock();
        self.values
            .write()
            .insert(key.name().to_string(), stored.clone());

        let event = ConfigChanged {
            mod_id: self.mod_id.clone(),
            key: key.name().to_string(),
            value: stored,
            cause: cause.map(str::to_string),
            at: Utc::now(),
        };
        self.events.emit(&event);
        global_bus().emit(&event);
        Ok(())
    }

    /// Serialize all explicitly-set values plus the schema version tag to
    /// this mod's document
    ///
    /// Blocking IO; callers batch changes and invoke this off any
    /// latency-sensitive path. Refused while [`StoreStatus::Blocked`].
    pub fn save(&self) -> Result<()> {
        let _io = self.save_lock.lock();
        if self.status() != StoreStatus::Ready {
            return Err(ConfigError::SaveBlocked {
                mod_id: self.mod_id.clone(),
            });
        }

        let values: BTreeMap<String, serde_json::Value> = self
            .values
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        let entries = values.len();

        let document = Document::new(self.schema.version(), values);
        persist::write_document(&self.path, &document, self.pretty)?;

        tracing::debug!(
            mod_id = %self.mod_id,
            path = %self.path.display(),
            entries,
            "configuration saved"
        );
        Ok(())
    }

    /// Discard in-memory values and re-run the load sequence
    ///
    /// This is the external reset that can leave [`StoreStatus::Blocked`]
    /// once the version conflict is resolved.
    pub fn reload(&self, handler: Option<&dyn ConflictHandler>) {
        let _io = self.save_lock.lock();
        let _order = self.write_order.lock();
        self.load(handler);
    }

    fn check_owned(&self, def: &Arc<KeyDef>) -> Result<()> {
        if self.schema.contains(def) {
            Ok(())
        } else {
            Err(ConfigError::ForeignKey {
                key: def.name().to_string(),
            })
        }
    }

    fn set_status(&self, status: StoreStatus) {
        *self.status.write() = status;
    }

    fn load(&self, handler: Option<&dyn ConflictHandler>) {
        self.set_status(StoreStatus::Loading);
        self.values.write().clear();

        match persist::read_document(&self.path) {
            LoadOutcome::Absent => {
                tracing::debug!(
                    mod_id = %self.mod_id,
                    "no persisted configuration; starting empty"
                );
                self.set_status(StoreStatus::Ready);
            }
            LoadOutcome::Corrupt(reason) => {
                tracing::warn!(
                    mod_id = %self.mod_id,
                    %reason,
                    "persisted configuration is corrupt; starting empty"
                );
                self.set_status(StoreStatus::Ready);
            }
            LoadOutcome::Loaded(document) => self.adopt_document(document, handler),
        }
    }

    fn adopt_document(&self, document: Document, handler: Option<&dyn ConflictHandler>) {
        let persisted = match document.version() {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!(
                    mod_id = %self.mod_id,
                    error = %e,
                    "persisted configuration has an unparseable version; starting empty"
                );
                self.set_status(StoreStatus::Ready);
                return;
            }
        };
        let declared = self.schema.version().clone();

        match classify(&persisted, &declared) {
            Compatibility::Identical | Compatibility::Compatible => {
                self.adopt_values(document.values);
                self.set_status(StoreStatus::Ready);
            }
            Compatibility::Incompatible => {
                let conflict = VersionConflict {
                    mod_id: self.mod_id.clone(),
                    persisted,
                    declared,
                };
                // Invoked at most once per load.
                let policy = handler
                    .map(|h| h.handle(&conflict))
                    .unwrap_or_default();
                tracing::warn!(
                    mod_id = %self.mod_id,
                    persisted = %conflict.persisted,
                    declared = %conflict.declared,
                    ?policy,
                    "incompatible persisted configuration version"
                );
                match policy {
                    ConflictPolicy::Error => self.set_status(StoreStatus::Blocked),
                    ConflictPolicy::Clobber => self.set_status(StoreStatus::Ready),
                    ConflictPolicy::ForceLoad => {
                        self.adopt_values(document.values);
                        self.set_status(StoreStatus::Ready);
                    }
                }
            }
        }
    }

    fn adopt_values(&self, raw: BTreeMap<String, serde_json::Value>) {
        let mut values = self.values.write();
        for (name, json) in raw {
            let Some(def) = self.schema.get(&name) else {
                // Keys removed since the document was written are dropped;
                // forwards compatible.
                tracing::debug!(
                    mod_id = %self.mod_id,
                    key = %name,
                    "dropping persisted key absent from current schema"
                );
                continue;
            };

            match def.adopt(&json) {
                Ok(value) => {
                    values.insert(name, value);
                }
                Err(e) => {
                    // Per-key failure only; this key keeps its computed
                    // default.
                    tracing::warn!(
                        mod_id = %self.mod_id,
                        key = %name,
                        error = %e,
                        "persisted value rejected; using computed default"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("mod_id", &self.mod_id)
            .field("version", self.schema.version())
            .field("status", &self.status())
            .finish()
    }
}
