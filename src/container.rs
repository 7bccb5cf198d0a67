//! The inject container
//!
//! [`InjectContainer`] is the resolution API: it owns the provider registry
//! and the singleton instance store, consults the shared
//! [`MetadataRegistry`] for constructible types, and checks the dependency
//! graph before every instantiation. Containers layer: a child created with
//! [`InjectContainer::new_child`] checks its own state first and falls
//! through to its parent, so local registrations shadow global ones without
//! duplicating global singletons.

use crate::error::{InjectError, Result};
use crate::graph;
use crate::key::{Key, KeyRef};
use crate::metadata::{Args, InjectKind, Instance, MetadataRegistry, ParamSpec, TypeSpec};
use crate::provider::Provider;
use ahash::RandomState;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

fn small_map<V>() -> DashMap<Key, V, RandomState> {
    // few entries expected per container; 8 shards keeps creation cheap
    DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8)
}

/// Runtime registry that resolves object graphs by key, caching one
/// singleton instance per key per container.
///
/// Containers are handled through `Arc`: the `Arc` identity is what
/// self-injection returns and what children hold as their parent link.
///
/// # Examples
///
/// ```rust
/// use inject_container::{FnProvider, InjectContainer, Key, TypeSpec};
///
/// struct Config { url: String }
/// struct Database { config: std::sync::Arc<Config> }
///
/// let container = InjectContainer::new();
/// container.register_provider(FnProvider::new(|_| Ok(Config { url: "postgres://localhost".into() })));
/// container.register_type(
///     TypeSpec::builder::<Database>()
///         .param(0, Key::of::<Config>())
///         .constructor(|args| Ok(Database { config: args.get::<Config>(0)? })),
/// );
///
/// # futures::executor::block_on(async {
/// let db = container.get_instance::<Database>().await.unwrap();
/// assert_eq!(db.config.url, "postgres://localhost");
/// # });
/// ```
pub struct InjectContainer {
    /// Type descriptors and the capability index, shared by the whole tree.
    metadata: Arc<MetadataRegistry>,
    /// Registered providers, exactly one per key; re-registration overwrites.
    providers: DashMap<Key, Arc<dyn Provider>, RandomState>,
    /// Singleton store: written at most once per key, never evicted.
    store: DashMap<Key, Instance, RandomState>,
    /// Per-key construction locks so overlapping first-time resolutions of
    /// one key await a single construction instead of racing.
    gates: DashMap<Key, Arc<Mutex<()>>, RandomState>,
    parent: Option<Arc<InjectContainer>>,
    depth: u32,
}

impl InjectContainer {
    /// Create a new root container with its own metadata registry.
    pub fn new() -> Arc<Self> {
        Self::with_metadata(Arc::new(MetadataRegistry::new()))
    }

    /// Create a root container over an existing metadata registry.
    pub fn with_metadata(metadata: Arc<MetadataRegistry>) -> Arc<Self> {
        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            depth = 0,
            "Creating root inject container"
        );

        Arc::new(Self {
            metadata,
            providers: small_map(),
            store: small_map(),
            gates: small_map(),
            parent: None,
            depth: 0,
        })
    }

    /// Create a child container layered over this one.
    ///
    /// The child shares the metadata registry, checks its own providers and
    /// store first, and falls through to this container on a local miss.
    /// It never mutates this container's state.
    pub fn new_child(self: &Arc<Self>) -> Arc<Self> {
        let depth = self.depth + 1;

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            parent_depth = self.depth,
            child_depth = depth,
            "Creating layered child container"
        );

        Arc::new(Self {
            metadata: Arc::clone(&self.metadata),
            providers: small_map(),
            store: small_map(),
            gates: small_map(),
            parent: Some(Arc::clone(self)),
            depth,
        })
    }

    /// The metadata registry shared by this container tree.
    pub fn metadata(&self) -> &Arc<MetadataRegistry> {
        &self.metadata
    }

    /// Layer depth, 0 for a root container.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a provider under its declared key, overwriting any existing
    /// registration for that exact key. Errors surface at resolution time
    /// only.
    pub fn register_provider(&self, provider: impl Provider + 'static) {
        let provider: Arc<dyn Provider> = Arc::new(provider);
        let key = provider.key();

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            key = key.display_name(),
            params = provider.params().len(),
            depth = self.depth,
            "Registering provider"
        );

        for capability in provider.capabilities() {
            self.metadata.add_implementation(capability, key.clone());
        }
        self.providers.insert(key, provider);
    }

    /// Register a type descriptor in the shared metadata registry, making
    /// its key constructible by the default class provider.
    pub fn register_type(&self, spec: TypeSpec) {
        self.metadata.register(spec);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a key (concrete, string, or lazy) to its instance.
    ///
    /// Lazy references are unwrapped first; the dependency graph is checked
    /// before any construction; singletons are cached in the first container
    /// that constructs them.
    pub async fn resolve(self: &Arc<Self>, key: impl Into<KeyRef>) -> Result<Instance> {
        let key = key.into().unwrap_key();
        self.resolve_key(key).await
    }

    /// Typed resolution of `Key::of::<T>()`.
    pub async fn get_instance<T: Send + Sync + 'static>(self: &Arc<Self>) -> Result<Arc<T>> {
        let key = Key::of::<T>();
        let instance = self.resolve_key(key.clone()).await?;
        instance
            .downcast::<T>()
            .map_err(|_| InjectError::TypeMismatch {
                key: key.display_name().to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    fn resolve_key(self: &Arc<Self>, key: Key) -> BoxFuture<'static, Result<Instance>> {
        let this = Arc::clone(self);
        Box::pin(async move {
            // self-injection: hand out the container the request entered
            if key == Key::of::<InjectContainer>() {
                return Ok(Arc::clone(&this) as Instance);
            }

            graph::check_dependencies(&this, &key)?;

            if let Some(provider) = this.provider_lookup(&key) {
                return this
                    .with_gate(&key, async {
                        let instance = this.invoke_provider(&key, provider.as_ref()).await?;
                        this.store.insert(key.clone(), instance.clone());

                        #[cfg(feature = "logging")]
                        trace!(
                            target: "inject_container",
                            key = key.display_name(),
                            depth = this.depth,
                            "Provider instance cached"
                        );

                        Ok(instance)
                    })
                    .await;
            }

            if let Some(spec) = this.metadata.spec(&key) {
                return this
                    .with_gate(&key, this.construct_class(&key, spec))
                    .await;
            }

            // an abstract key whose implementation was resolved earlier is
            // served straight from the store
            if let Some(existing) = this.store_lookup(&key) {
                return Ok(existing);
            }

            #[cfg(feature = "logging")]
            debug!(
                target: "inject_container",
                key = key.display_name(),
                depth = this.depth,
                "No provider, descriptor, or stored instance for key"
            );

            Err(InjectError::ProviderNotFound {
                key: key.display_name().to_string(),
            })
        })
    }

    /// Serialize first-time construction of one key: the store is checked
    /// again under the lock, so every overlapping resolver of an unresolved
    /// key awaits the same construction and observes the same instance.
    async fn with_gate<F>(&self, key: &Key, construct: F) -> Result<Instance>
    where
        F: Future<Output = Result<Instance>>,
    {
        if let Some(existing) = self.store_lookup(key) {
            return Ok(existing);
        }

        let gate = self
            .gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = gate.lock().await;

        if let Some(existing) = self.store_lookup(key) {
            return Ok(existing);
        }

        construct.await
    }

    async fn invoke_provider(
        self: &Arc<Self>,
        key: &Key,
        provider: &dyn Provider,
    ) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "inject_container",
            key = key.display_name(),
            depth = self.depth,
            "Invoking provider factory"
        );

        let args = self.resolve_args(provider.params()).await?;
        provider
            .provide(args)
            .await
            .map_err(|source| InjectError::Construction {
                type_name: key.display_name().to_string(),
                source,
            })
    }

    /// Default class provider: construct from the registered descriptor,
    /// cache, then inject properties.
    async fn construct_class(
        self: &Arc<Self>,
        key: &Key,
        spec: Arc<TypeSpec>,
    ) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: "inject_container",
            key = key.display_name(),
            depth = self.depth,
            "Constructing via default class provider"
        );

        let args = self.resolve_args(spec.params().to_vec()).await?;
        let instance =
            (spec.construct)(args)
                .await
                .map_err(|source| InjectError::Construction {
                    type_name: key.display_name().to_string(),
                    source,
                })?;

        // Cached before property injection: a property that circularly
        // references back to this key observes the stored instance instead
        // of re-entering construction. A later property failure leaves this
        // entry in place.
        self.store.insert(key.clone(), instance.clone());

        for property in spec.properties() {
            if property.kind != InjectKind::ClassProperty {
                continue;
            }
            let value = self.resolve(property.key.clone()).await?;
            let assign = spec.assign.as_ref().ok_or_else(|| {
                InjectError::PropertyInjection {
                    type_name: key.display_name().to_string(),
                    property: property.name,
                    source: "no assign callable registered".into(),
                }
            })?;
            assign(&instance, property, value).map_err(|source| {
                InjectError::PropertyInjection {
                    type_name: key.display_name().to_string(),
                    property: property.name,
                    source,
                }
            })?;
        }

        Ok(instance)
    }

    /// Resolve declared parameters in index order into positional [`Args`].
    async fn resolve_args(self: &Arc<Self>, mut params: Vec<ParamSpec>) -> Result<Args> {
        params.sort_by_key(|param| param.index);
        let len = params.last().map(|param| param.index + 1).unwrap_or(0);
        let mut args = Args::new(len);
        for param in params {
            let value = self.resolve(param.key.clone()).await?;
            args.set(param.index, value);
        }
        Ok(args)
    }

    // =========================================================================
    // Lookup predicates
    // =========================================================================

    /// Find a provider for `key` in this container or any ancestor: direct
    /// key match first, then any registered implementation of the key as a
    /// capability. The first container with a match serves it exclusively.
    pub(crate) fn provider_lookup(&self, key: &Key) -> Option<Arc<dyn Provider>> {
        let mut node = self;
        loop {
            if let Some(provider) = node.provider_local(key) {
                return Some(provider);
            }
            match &node.parent {
                Some(parent) => node = parent.as_ref(),
                None => return None,
            }
        }
    }

    fn provider_local(&self, key: &Key) -> Option<Arc<dyn Provider>> {
        if let Some(entry) = self.providers.get(key) {
            return Some(entry.value().clone());
        }
        for implementation in self.metadata.implementations(key) {
            if let Some(entry) = self.providers.get(&implementation) {
                return Some(entry.value().clone());
            }
        }
        None
    }

    /// Find a stored instance for `key` in this container or any ancestor,
    /// directly or through the capability index.
    pub(crate) fn store_lookup(&self, key: &Key) -> Option<Instance> {
        let mut node = self;
        loop {
            if let Some(instance) = node.store_local(key) {
                return Some(instance);
            }
            match &node.parent {
                Some(parent) => node = parent.as_ref(),
                None => return None,
            }
        }
    }

    fn store_local(&self, key: &Key) -> Option<Instance> {
        if let Some(entry) = self.store.get(key) {
            return Some(entry.value().clone());
        }
        for implementation in self.metadata.implementations(key) {
            if let Some(entry) = self.store.get(&implementation) {
                return Some(entry.value().clone());
            }
        }
        None
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether a provider for `key` is visible from this container.
    pub fn contains_provider(&self, key: &Key) -> bool {
        self.provider_lookup(key).is_some()
    }

    /// Whether a cached instance for `key` is visible from this container.
    pub fn contains_instance(&self, key: &Key) -> bool {
        self.store_lookup(key).is_some()
    }

    /// Number of instances cached in this container (parents excluded).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when this container has cached nothing itself.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl std::fmt::Debug for InjectContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectContainer")
            .field("depth", &self.depth)
            .field("providers", &self.providers.len())
            .field("instances", &self.store.len())
            .finish()
    }
}
