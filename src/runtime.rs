//! Host-facing bootstrap for the configuration subsystem
//!
//! The mod loader calls [`init`] once during startup, then [`register_mod`]
//! for each mod it instantiates. Nothing here propagates failures back into
//! the host: errors are logged and degrade to defaults.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::compat::ConflictHandler;
use crate::schema::Schema;
use crate::settings::Settings;
use crate::store::Store;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

struct Runtime {
    settings: Settings,
    stores: Mutex<HashMap<String, Arc<Store>>>,
}

impl Runtime {
    fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            stores: Mutex::new(HashMap::new()),
        }
    }
}

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::with_settings(load_settings()))
}

fn load_settings() -> Settings {
    match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load subsystem settings; using defaults");
            Settings::default()
        }
    }
}

/// Initialize the subsystem with settings from the default locations
///
/// Idempotent; a second call is ignored. Also installs the tracing
/// subscriber if none is installed yet.
pub fn init() {
    init_with(None)
}

/// Initialize the subsystem with explicit settings
pub fn init_with(settings: Option<Settings>) {
    let settings = settings.unwrap_or_else(load_settings);

    let filter = settings
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // A host-installed subscriber wins; ignore the error.
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    if RUNTIME.set(Runtime::with_settings(settings)).is_err() {
        tracing::debug!("configuration subsystem already initialized");
    }
}

/// Register a mod's schema and open (or fetch) its store
///
/// Registering the same mod id again returns the existing store; a store
/// lives for the mod's whole lifetime.
pub fn register_mod(
    mod_id: &str,
    schema: Arc<Schema>,
    handler: Option<&dyn ConflictHandler>,
) -> Arc<Store> {
    let runtime = runtime();
    let mut stores = runtime.stores.lock();
    if let Some(existing) = stores.get(mod_id) {
        tracing::debug!(mod_id, "mod already registered; returning existing store");
        return Arc::clone(existing);
    }

    let store = Store::open(mod_id, schema, &runtime.settings, handler);
    stores.insert(mod_id.to_string(), Arc::clone(&store));
    tracing::debug!(
        mod_id,
        version = %store.schema().version(),
        status = ?store.status(),
        "mod configuration registered"
    );
    store
}

/// Fetch the store for an already-registered mod
pub fn store_for(mod_id: &str) -> Option<Arc<Store>> {
    RUNTIME
        .get()
        .and_then(|runtime| runtime.stores.lock().get(mod_id).cloned())
}
