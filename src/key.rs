//! Typed key descriptors
//!
//! A [`Key<T>`] is the typed handle a mod declares and keeps; the erased
//! [`KeyDef`] behind it is what schemas store and what untyped enumeration
//! sees. Both are immutable after construction.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ConfigError, Result};
use crate::value::{ConfigKind, ConfigValue, ValueKind};

type DefaultFn = dyn Fn() -> ConfigValue + Send + Sync;
type ValidatorFn = dyn Fn(&ConfigValue) -> bool + Send + Sync;

/// Type-erased key descriptor shared between a [`Key<T>`] and its schema
pub struct KeyDef {
    name: String,
    description: String,
    kind: ValueKind,
    internal_only: bool,
    default: Option<Box<DefaultFn>>,
    validator: Option<Box<ValidatorFn>>,
}

impl KeyDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Advisory flag: callers enumerating keys from outside the owning mod
    /// should skip internal keys by convention. The store never enforces it.
    pub fn internal_only(&self) -> bool {
        self.internal_only
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Compute a fresh default value, if one was declared
    pub fn compute_default(&self) -> Option<ConfigValue> {
        self.default.as_ref().map(|f| f())
    }

    /// Check a value against the declared kind and the validator (if any)
    pub fn validate(&self, value: &ConfigValue) -> bool {
        if !self.accepts_kind(value.kind()) {
            return false;
        }
        match &self.validator {
            Some(validate) => validate(value),
            None => true,
        }
    }

    /// Adopt a loosely-typed persisted value at this key's declared kind
    ///
    /// This is the per-key step of loading a document: a failure here keeps
    /// this key on its computed default without failing the whole document.
    pub fn adopt(&self, raw: &serde_json::Value) -> Result<ConfigValue> {
        let value = ConfigValue::from_json(raw).ok_or_else(|| ConfigError::NullValue {
            key: self.name.clone(),
        })?;
        let value = self.widen(value);
        if value.kind() != self.kind {
            return Err(ConfigError::TypeMismatch {
                key: self.name.clone(),
                expected: self.kind,
                actual: value.kind(),
            });
        }
        if !self.validate(&value) {
            return Err(ConfigError::Validation {
                key: self.name.clone(),
            });
        }
        Ok(value)
    }

    fn accepts_kind(&self, kind: ValueKind) -> bool {
        kind == self.kind || (self.kind == ValueKind::Float && kind == ValueKind::Int)
    }

    // Whole numbers round-trip through JSON as integers; widen them back
    // for float keys.
    fn widen(&self, value: ConfigValue) -> ConfigValue {
        match (self.kind, value) {
            (ValueKind::Float, ConfigValue::Int(i)) => ConfigValue::Float(i as f64),
            (_, value) => value,
        }
    }
}

impl fmt::Debug for KeyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("internal_only", &self.internal_only)
            .field("has_default", &self.default.is_some())
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Typed handle to one configuration item
///
/// Cheap to clone; all clones share the same [`KeyDef`], which is also the
/// identity a store checks when deciding whether a key belongs to its schema.
pub struct Key<T: ConfigKind> {
    def: Arc<KeyDef>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ConfigKind> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            _marker: PhantomData,
        }
    }
}

impl<T: ConfigKind> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.def).finish()
    }
}

impl<T: ConfigKind> Key<T> {
    /// Start building a key; fails at `build` if name or description is empty
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> KeyBuilder<T> {
        KeyBuilder {
            name: name.into(),
            description: description.into(),
            internal_only: false,
            default: None,
            validator: None,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn description(&self) -> &str {
        self.def.description()
    }

    /// The shared erased descriptor, as handed to [`Schema::define`]
    ///
    /// [`Schema::define`]: crate::schema::Schema::define
    pub fn def(&self) -> &Arc<KeyDef> {
        &self.def
    }

    pub fn compute_default(&self) -> Option<T> {
        self.def
            .compute_default()
            .and_then(|v| T::from_value(&v))
    }

    pub fn validate(&self, value: &T) -> bool {
        self.def.validate(&value.clone().into_value())
    }
}

/// Builder for [`Key<T>`]
pub struct KeyBuilder<T: ConfigKind> {
    name: String,
    description: String,
    internal_only: bool,
    default: Option<Box<dyn Fn() -> T + Send + Sync>>,
    validator: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ConfigKind> KeyBuilder<T> {
    /// Declare a computed default, evaluated freshly on each defaulted read
    pub fn default_with(mut self, compute: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.default = Some(Box::new(compute));
        self
    }

    /// Declare a constant default value
    pub fn default_value(self, value: T) -> Self {
        self.default_with(move || value.clone())
    }

    /// Declare a validator; without one, every value of `T` is valid
    pub fn validator(mut self, validate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Box::new(validate));
        self
    }

    /// Mark the key as internal to the owning mod (advisory only)
    pub fn internal_only(mut self) -> Self {
        self.internal_only = true;
        self
    }

    pub fn build(self) -> Result<Key<T>> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyKeyField { field: "name" });
        }
        if self.description.is_empty() {
            return Err(ConfigError::EmptyKeyField {
                field: "description",
            });
        }

        let default = self.default.map(|compute| {
            Box::new(move || compute().into_value()) as Box<DefaultFn>
        });
        let validator = self.validator.map(|validate| {
            Box::new(move |value: &ConfigValue| {
                T::from_value(value).map(|v| validate(&v)).unwrap_or(false)
            }) as Box<ValidatorFn>
        });

        Ok(Key {
            def: Arc::new(KeyDef {
                name: self.name,
                description: self.description,
                kind: T::KIND,
                internal_only: self.internal_only,
                default,
                validator,
            }),
            _marker: PhantomData,
        })
    }
}
