//! Resolution keys
//!
//! Every provider, store entry, and dependency descriptor is indexed by a
//! [`Key`]: either the identity of a Rust type or a plain string name.
//! [`LazyKey`] defers the key computation until resolution actually reaches
//! it, which breaks declaration-order circularity between two registrations
//! without implying a runtime value cycle.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Identifier for providers, store entries, and dependency descriptors.
///
/// Identity equality (not structural equality) governs map membership:
/// two `Key::of::<T>()` for the same `T` are equal, two string keys are
/// equal iff the strings are.
///
/// # Examples
///
/// ```rust
/// use inject_container::Key;
///
/// struct Database;
///
/// let by_type = Key::of::<Database>();
/// let by_name = Key::name("database");
///
/// assert_eq!(by_type, Key::of::<Database>());
/// assert_ne!(by_name, Key::name("db"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Identity of a Rust type.
    Type {
        /// `TypeId` of the target type.
        id: TypeId,
        /// Fully qualified type name, kept for diagnostics.
        name: &'static str,
    },
    /// A plain string identifier.
    Name(Cow<'static, str>),
}

impl Key {
    /// Key for a Rust type.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for a string identifier.
    #[inline]
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Key::Name(name.into())
    }

    /// Human-readable name used in log output and error messages.
    #[inline]
    pub fn display_name(&self) -> &str {
        match self {
            Key::Type { name, .. } => name,
            Key::Name(name) => name,
        }
    }

    /// The `TypeId` behind a type key, `None` for string keys.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Key::Type { id, .. } => Some(*id),
            Key::Name(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Deferred handle to a [`Key`].
///
/// The wrapped thunk runs only when resolution traversal reaches this
/// reference, so two registrations may point at each other without either
/// needing the other's key at declaration time.
///
/// # Examples
///
/// ```rust
/// use inject_container::{Key, LazyKey};
///
/// struct Repository;
///
/// let lazy = LazyKey::new(|| Key::of::<Repository>());
/// assert_eq!(lazy.resolve(), Key::of::<Repository>());
/// ```
#[derive(Clone)]
pub struct LazyKey {
    thunk: Arc<dyn Fn() -> Key + Send + Sync>,
}

impl LazyKey {
    /// Wrap a thunk producing the concrete key.
    pub fn new(thunk: impl Fn() -> Key + Send + Sync + 'static) -> Self {
        Self {
            thunk: Arc::new(thunk),
        }
    }

    /// Lazy reference to a type key.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Key::of::<T>)
    }

    /// Deref to the concrete key.
    #[inline]
    pub fn resolve(&self) -> Key {
        (self.thunk)()
    }
}

impl fmt::Debug for LazyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyKey").finish_non_exhaustive()
    }
}

/// What resolution APIs accept: a concrete key or a lazy reference.
///
/// Lazy references are unwrapped with [`KeyRef::unwrap_key`] before any map
/// lookup or graph insertion.
#[derive(Debug, Clone)]
pub enum KeyRef {
    /// An already-concrete key.
    Concrete(Key),
    /// A deferred reference, unwrapped on first use.
    Lazy(LazyKey),
}

impl KeyRef {
    /// The concrete key, running the lazy thunk if needed.
    #[inline]
    pub fn unwrap_key(&self) -> Key {
        match self {
            KeyRef::Concrete(key) => key.clone(),
            KeyRef::Lazy(lazy) => lazy.resolve(),
        }
    }
}

impl From<Key> for KeyRef {
    fn from(key: Key) -> Self {
        KeyRef::Concrete(key)
    }
}

impl From<LazyKey> for KeyRef {
    fn from(lazy: LazyKey) -> Self {
        KeyRef::Lazy(lazy)
    }
}

impl From<&'static str> for KeyRef {
    fn from(name: &'static str) -> Self {
        KeyRef::Concrete(Key::name(name))
    }
}

impl From<String> for KeyRef {
    fn from(name: String) -> Self {
        KeyRef::Concrete(Key::name(name))
    }
}
