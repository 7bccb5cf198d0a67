//! Request-scoped layering
//!
//! A [`ScopedContainer`] is a thin wrapper over a layered child container
//! plus a unique [`Scope`] id, for callers that hand one resolution scope to
//! each unit of work (typically one per request) and want to tell them apart
//! in logs.

use crate::container::InjectContainer;
use crate::error::Result;
use crate::key::{Key, KeyRef};
use crate::metadata::{Instance, TypeSpec};
use crate::provider::Provider;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Unique scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// Generate a new unique scope id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// A layered child container with an associated scope id.
///
/// Local registrations shadow the parent's; everything else falls through.
///
/// # Examples
///
/// ```rust
/// use inject_container::{FnProvider, InjectContainer, ScopedContainer};
///
/// struct RequestId(&'static str);
///
/// let root = InjectContainer::new();
/// let request = ScopedContainer::from_parent(&root);
/// request.register_provider(FnProvider::new(|_| Ok(RequestId("req-123"))));
///
/// # futures::executor::block_on(async {
/// let id = request.get_instance::<RequestId>().await.unwrap();
/// assert_eq!(id.0, "req-123");
/// # });
/// ```
pub struct ScopedContainer {
    container: Arc<InjectContainer>,
    scope: Scope,
}

impl ScopedContainer {
    /// Create a scope layered over a parent container.
    pub fn from_parent(parent: &Arc<InjectContainer>) -> Self {
        let scope = Scope::new();

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            scope_id = scope.id(),
            parent_depth = parent.depth(),
            "Creating scoped container"
        );

        Self {
            container: parent.new_child(),
            scope,
        }
    }

    /// Create a scope layered over another scope.
    pub fn from_scope(parent: &ScopedContainer) -> Self {
        Self {
            scope: Scope::new(),
            container: parent.container.new_child(),
        }
    }

    /// The scope identifier.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Register a provider local to this scope, shadowing the parent's.
    pub fn register_provider(&self, provider: impl Provider + 'static) {
        self.container.register_provider(provider);
    }

    /// Register a type descriptor (shared with the whole tree).
    pub fn register_type(&self, spec: TypeSpec) {
        self.container.register_type(spec);
    }

    /// Resolve a key within this scope.
    pub async fn resolve(&self, key: impl Into<KeyRef>) -> Result<Instance> {
        self.container.resolve(key).await
    }

    /// Typed resolution within this scope.
    pub async fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.get_instance::<T>().await
    }

    /// Whether a provider for `key` is visible from this scope.
    pub fn contains_provider(&self, key: &Key) -> bool {
        self.container.contains_provider(key)
    }

    /// Whether a cached instance for `key` is visible from this scope.
    pub fn contains_instance(&self, key: &Key) -> bool {
        self.container.contains_instance(key)
    }

    /// The underlying layered container.
    pub fn container(&self) -> &Arc<InjectContainer> {
        &self.container
    }

    /// Layer depth of the underlying container.
    pub fn depth(&self) -> u32 {
        self.container.depth()
    }
}

impl std::fmt::Debug for ScopedContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("scope", &self.scope)
            .field("container", &self.container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FnProvider;

    struct AppConfig {
        name: &'static str,
    }

    #[allow(dead_code)]
    struct RequestContext {
        id: &'static str,
    }

    #[test]
    fn test_scope_ids_unique() {
        let a = Scope::new();
        let b = Scope::new();
        assert_ne!(a.id(), b.id());
        assert!(format!("{a}").starts_with("scope-"));
    }

    #[tokio::test]
    async fn test_scoped_container_layers_over_parent() {
        let root = InjectContainer::new();
        root.register_provider(FnProvider::new(|_| Ok(AppConfig { name: "app" })));

        let request = ScopedContainer::from_parent(&root);
        request.register_provider(FnProvider::new(|_| Ok(RequestContext { id: "req-1" })));

        // scope sees both; root sees only its own
        assert!(request.contains_provider(&Key::of::<AppConfig>()));
        assert!(request.contains_provider(&Key::of::<RequestContext>()));
        assert!(!root.contains_provider(&Key::of::<RequestContext>()));

        let config = request.get_instance::<AppConfig>().await.unwrap();
        assert_eq!(config.name, "app");
    }

    #[tokio::test]
    async fn test_nested_scopes() {
        let root = InjectContainer::new();
        root.register_provider(FnProvider::new(|_| Ok(AppConfig { name: "app" })));

        let outer = ScopedContainer::from_parent(&root);
        let inner = ScopedContainer::from_scope(&outer);

        assert_eq!(inner.depth(), 2);
        assert!(inner.contains_provider(&Key::of::<AppConfig>()));
        assert_ne!(outer.scope(), inner.scope());
    }
}
