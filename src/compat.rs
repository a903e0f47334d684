//! Version compatibility classification and conflict policies
//!
//! Follows the semver contract: equal versions are identical, a shared major
//! version is compatible regardless of minor/patch direction, and a differing
//! major version is incompatible and escalates to the mod's policy.

use semver::Version;

/// Relationship between a persisted schema version and the declared one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Identical,
    Compatible,
    Incompatible,
}

/// Classify `persisted` against `declared`
pub fn classify(persisted: &Version, declared: &Version) -> Compatibility {
    if persisted == declared {
        Compatibility::Identical
    } else if persisted.major == declared.major {
        Compatibility::Compatible
    } else {
        Compatibility::Incompatible
    }
}

/// What to do with an incompatible persisted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Refuse the document and block saving, so the incompatible on-disk
    /// data is never silently destroyed. The default.
    #[default]
    Error,
    /// Discard the on-disk contents; the next save overwrites the document
    /// under the declared version.
    Clobber,
    /// Adopt the document's values anyway; per-key type mismatches degrade
    /// to that key's computed default.
    ForceLoad,
}

/// Details of one version conflict, handed to the mod's handler
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub mod_id: String,
    pub persisted: Version,
    pub declared: Version,
}

/// Mod-supplied policy decision for incompatible persisted versions
///
/// Invoked at most once per load, only when classification is
/// [`Compatibility::Incompatible`]. Without a handler the store behaves as
/// if [`ConflictPolicy::Error`] was returned.
pub trait ConflictHandler: Send + Sync {
    fn handle(&self, conflict: &VersionConflict) -> ConflictPolicy;
}

impl<F> ConflictHandler for F
where
    F: Fn(&VersionConflict) -> ConflictPolicy + Send + Sync,
{
    fn handle(&self, conflict: &VersionConflict) -> ConflictPolicy {
        self(conflict)
    }
}
