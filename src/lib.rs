//! Lodestone Mod Configuration
//!
//! A typed, versioned, persistent key-value configuration store for mods
//! running under the Lodestone mod loader.
//!
//! ## Features
//!
//! - **Typed Keys**: Each key declares its value kind, an optional computed
//!   default, and an optional validator
//! - **Semantic Versioning**: Every schema carries a semver tag; persisted
//!   documents record the version that produced them
//! - **Compatibility Resolution**: Same major version loads cleanly; a major
//!   mismatch escalates to the mod's own policy (error, clobber, force-load)
//! - **Change Notifications**: Per-store and process-wide event buses with
//!   revocable subscriptions
//! - **Explicit Persistence**: One JSON document per mod, rewritten only on
//!   an explicit save
//!
//! ## Architecture
//!
//! ```text
//! config/
//! ├── gravity-tweaks.json      one document per mod:
//! ├── minimap.json             {
//! └── shader-pack.json           "schema_version": "1.2.0",
//!                                "saved_at": "...",
//!                                "checksum": "...",
//!                                "values": { "count": 5, ... }
//!                              }
//! ```
//!
//! A mod declares keys, defines a [`Schema`], and registers it through
//! [`runtime::register_mod`]; the returned [`Store`] is its configuration
//! for the rest of the process.

pub mod checksum;
pub mod compat;
pub mod error;
pub mod events;
pub mod key;
pub mod persist;
pub mod runtime;
pub mod schema;
pub mod settings;
pub mod store;
pub mod value;

pub use checksum::Checksum;
pub use compat::{classify, Compatibility, ConflictHandler, ConflictPolicy, VersionConflict};
pub use error::{ConfigError, Result};
pub use events::{global_bus, ConfigChanged, EventBus, SubscriptionId};
pub use key::{Key, KeyBuilder, KeyDef};
pub use persist::{Document, LoadOutcome};
pub use schema::Schema;
pub use settings::Settings;
pub use store::{Store, StoreStatus};
pub use value::{ConfigKind, ConfigValue, ValueKind};
