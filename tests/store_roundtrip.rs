//! End-to-end tests for load, save, version resolution, and concurrency
//!
//! Each test works against a real document directory via `tempfile`, the way
//! a mod's configuration lives under the host install.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use semver::Version;
use tempfile::TempDir;

use lodestone_config::{
    ConfigError, ConflictPolicy, Key, Schema, Settings, Store, StoreStatus,
};

fn settings_in(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.storage.root = dir.path().to_path_buf();
    settings
}

fn count_key() -> Key<i64> {
    Key::<i64>::builder("count", "how many things to spawn")
        .default_value(0)
        .build()
        .unwrap()
}

#[test]
fn save_then_reload_reproduces_values() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let name = Key::<String>::builder("name", "display name").build().unwrap();
    let schema = Schema::define(
        Version::new(1, 0, 0),
        vec![count.def().clone(), name.def().clone()],
    )
    .unwrap();

    let store = Store::open("roundtrip-mod", schema.clone(), &settings, None);
    store.set(&count, 5).unwrap();
    store.set(&name, "alpha".to_string()).unwrap();
    store.save().unwrap();

    let reloaded = Store::open("roundtrip-mod", schema, &settings, None);
    assert_eq!(reloaded.status(), StoreStatus::Ready);
    assert_eq!(reloaded.try_get(&count).unwrap(), Some(5));
    assert_eq!(reloaded.try_get(&name).unwrap(), Some("alpha".to_string()));
}

#[test]
fn minor_version_bump_keeps_values_and_defaults_new_keys() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();
    let store = Store::open("upgrade-mod", v1, &settings, None);
    store.set(&count, 5).unwrap();
    store.save().unwrap();

    // v1.1.0 adds "flag"; same major, so the document loads cleanly.
    let count = count_key();
    let flag = Key::<bool>::builder("flag", "a new toggle")
        .default_value(false)
        .build()
        .unwrap();
    let v1_1 = Schema::define(
        Version::new(1, 1, 0),
        vec![count.def().clone(), flag.def().clone()],
    )
    .unwrap();

    let upgraded = Store::open("upgrade-mod", v1_1, &settings, None);
    assert_eq!(upgraded.status(), StoreStatus::Ready);
    assert_eq!(upgraded.try_get(&count).unwrap(), Some(5));
    // Computed default, not persisted until explicitly set.
    assert_eq!(upgraded.try_get(&flag).unwrap(), Some(false));

    upgraded.save().unwrap();
    match lodestone_config::persist::read_document(upgraded.path()) {
        lodestone_config::LoadOutcome::Loaded(document) => {
            assert!(document.values.contains_key("count"));
            assert!(!document.values.contains_key("flag"));
            assert_eq!(document.schema_version, "1.1.0");
        }
        other => panic!("expected Loaded, got {:?}", other),
    }
}

#[test]
fn removed_key_is_dropped_silently() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let legacy = Key::<i64>::builder("legacy", "obsolete knob").build().unwrap();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![legacy.def().clone()]).unwrap();
    let store = Store::open("shrinking-mod", v1, &settings, None);
    store.set(&legacy, 3).unwrap();
    store.save().unwrap();

    // Current schema no longer declares "legacy".
    let count = count_key();
    let v1_1 = Schema::define(Version::new(1, 1, 0), vec![count.def().clone()]).unwrap();
    let current = Store::open("shrinking-mod", v1_1, &settings, None);

    assert_eq!(current.status(), StoreStatus::Ready);
    assert_eq!(current.try_get(&count).unwrap(), Some(0));
}

#[test]
fn major_mismatch_invokes_handler_once_and_default_blocks() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();
    let store = Store::open("breaking-mod", v1, &settings, None);
    store.set(&count, 5).unwrap();
    store.save().unwrap();

    // No handler: defaults to Error, store is blocked, save refused.
    let count = count_key();
    let v2 = Schema::define(Version::new(2, 0, 0), vec![count.def().clone()]).unwrap();
    let blocked = Store::open("breaking-mod", v2.clone(), &settings, None);
    assert_eq!(blocked.status(), StoreStatus::Blocked);
    assert_eq!(blocked.try_get(&count).unwrap(), Some(0));
    assert!(matches!(
        blocked.save(),
        Err(ConfigError::SaveBlocked { .. })
    ));

    // With a handler: invoked exactly once, policy honored.
    let invocations = Arc::new(AtomicUsize::new(0));
    let invocations2 = Arc::clone(&invocations);
    let handler = move |conflict: &lodestone_config::VersionConflict| {
        invocations2.fetch_add(1, Ordering::SeqCst);
        assert_eq!(conflict.persisted, Version::new(1, 0, 0));
        assert_eq!(conflict.declared, Version::new(2, 0, 0));
        ConflictPolicy::ForceLoad
    };
    let forced = Store::open("breaking-mod", v2, &settings, Some(&handler));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(forced.status(), StoreStatus::Ready);
    assert_eq!(forced.try_get(&count).unwrap(), Some(5));
}

#[test]
fn clobber_discards_document_and_next_save_overwrites() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();
    let store = Store::open("clobber-mod", v1, &settings, None);
    store.set(&count, 42).unwrap();
    store.save().unwrap();

    let count = count_key();
    let v2 = Schema::define(Version::new(2, 0, 0), vec![count.def().clone()]).unwrap();
    let handler = |_: &lodestone_config::VersionConflict| ConflictPolicy::Clobber;
    let clobbered = Store::open("clobber-mod", v2, &settings, Some(&handler));

    assert_eq!(clobbered.status(), StoreStatus::Ready);
    assert_eq!(clobbered.try_get(&count).unwrap(), Some(0));

    clobbered.save().unwrap();
    match lodestone_config::persist::read_document(clobbered.path()) {
        lodestone_config::LoadOutcome::Loaded(document) => {
            assert_eq!(document.schema_version, "2.0.0");
            assert!(document.values.is_empty());
        }
        other => panic!("expected Loaded, got {:?}", other),
    }
}

#[test]
fn force_load_keeps_defaults_for_mismatched_keys() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    // v1 persisted "count" as a string.
    let old_count = Key::<String>::builder("count", "was a string once")
        .build()
        .unwrap();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![old_count.def().clone()]).unwrap();
    let store = Store::open("retyped-mod", v1, &settings, None);
    store.set(&old_count, "five".to_string()).unwrap();
    store.save().unwrap();

    // v2 declares "count" as an int; force-load adopts what it can.
    let count = count_key();
    let v2 = Schema::define(Version::new(2, 0, 0), vec![count.def().clone()]).unwrap();
    let handler = |_: &lodestone_config::VersionConflict| ConflictPolicy::ForceLoad;
    let forced = Store::open("retyped-mod", v2, &settings, Some(&handler));

    assert_eq!(forced.status(), StoreStatus::Ready);
    // The mismatched key degrades to its computed default; not a store failure.
    assert_eq!(forced.try_get(&count).unwrap(), Some(0));
}

#[test]
fn blocked_store_recovers_through_reload() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let v1 = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();
    let store = Store::open("stuck-mod", v1, &settings, None);
    store.set(&count, 8).unwrap();
    store.save().unwrap();

    let count = count_key();
    let v2 = Schema::define(Version::new(2, 0, 0), vec![count.def().clone()]).unwrap();
    let blocked = Store::open("stuck-mod", v2, &settings, None);
    assert_eq!(blocked.status(), StoreStatus::Blocked);

    let handler = |_: &lodestone_config::VersionConflict| ConflictPolicy::ForceLoad;
    blocked.reload(Some(&handler));
    assert_eq!(blocked.status(), StoreStatus::Ready);
    assert_eq!(blocked.try_get(&count).unwrap(), Some(8));
    blocked.save().unwrap();
}

#[test]
fn corrupt_document_starts_empty() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let schema = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();

    let path = lodestone_config::persist::document_path(dir.path(), "garbled-mod");
    std::fs::write(&path, "definitely { not json").unwrap();

    let store = Store::open("garbled-mod", schema, &settings, None);
    assert_eq!(store.status(), StoreStatus::Ready);
    assert_eq!(store.try_get(&count).unwrap(), Some(0));
}

#[test]
fn concurrent_sets_on_same_key_stay_coherent() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);

    let count = count_key();
    let schema = Schema::define(Version::new(1, 0, 0), vec![count.def().clone()]).unwrap();
    let store = Store::open("racy-mod", schema, &settings, None);

    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let observed2 = Arc::clone(&observed);
    store.events().subscribe(move |event| {
        if let lodestone_config::ConfigValue::Int(i) = event.value {
            observed2.lock().push(i);
        }
    });

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let store = Arc::clone(&store);
            let key = count.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    store.set(&key, w * 1000 + i).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let final_value = store.try_get(&count).unwrap().unwrap();
    let events = observed.lock();
    assert_eq!(events.len(), 200);
    // The last delivered event must agree with the final stored value.
    assert_eq!(*events.last().unwrap(), final_value);
}
