//! Injection metadata
//!
//! There is no ambient reflection here: everything the container knows about
//! a type is declared up front through a [`TypeSpec`] and recorded in a
//! [`MetadataRegistry`] shared by a whole container tree. A spec carries the
//! ordered constructor parameter descriptors, the injected property
//! descriptors, the abstract capability keys the type satisfies, and the
//! callables that actually construct the value and assign its properties.

use crate::error::BoxError;
use crate::key::{Key, KeyRef};
use ahash::RandomState;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// A type-erased resolved instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Descriptor for one constructor or factory parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Positional index the resolved value is placed at.
    pub index: usize,
    /// Key (possibly lazy) of the dependency.
    pub key: KeyRef,
}

/// Where an injection descriptor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectKind {
    /// Injected onto a named property after construction.
    ClassProperty,
    /// Injected as a method parameter; not consumed by property injection.
    ClassMethodParameter,
}

/// Descriptor for one injected property.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    /// Property name, handed to the assign callable.
    pub name: &'static str,
    /// Injection kind; only [`InjectKind::ClassProperty`] entries are
    /// applied after construction.
    pub kind: InjectKind,
    /// Key (possibly lazy) of the injected value.
    pub key: KeyRef,
}

type ConstructFn =
    Box<dyn Fn(Args) -> BoxFuture<'static, std::result::Result<Instance, BoxError>> + Send + Sync>;
type AssignFn =
    Box<dyn Fn(&Instance, &PropertySpec, Instance) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Positional arguments resolved for a constructor or provider factory.
///
/// Indices without a declared descriptor stay unfilled and read as `None`.
pub struct Args {
    slots: Vec<Option<Instance>>,
}

impl Args {
    pub(crate) fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots }
    }

    pub(crate) fn set(&mut self, index: usize, value: Instance) {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(value);
    }

    /// Number of positional slots, filled or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot exists at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The raw instance at `index`, if that slot was filled.
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.slots.get(index).and_then(|slot| slot.as_ref())
    }

    /// Downcast the instance at `index` to `T`.
    ///
    /// Errors when the slot is unfilled or holds a different type.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> std::result::Result<Arc<T>, BoxError> {
        let instance = self
            .raw(index)
            .ok_or_else(|| BoxError::from(format!("argument {index} was not resolved")))?;
        instance.clone().downcast::<T>().map_err(|_| {
            BoxError::from(format!(
                "argument {index} is not a '{}'",
                std::any::type_name::<T>()
            ))
        })
    }
}

/// Registration-time description of a constructible type.
///
/// Built with [`TypeSpec::builder`]; the builder's `constructor` /
/// `constructor_async` call finalizes the spec.
///
/// # Examples
///
/// ```rust
/// use inject_container::{Key, TypeSpec};
///
/// struct Config { url: String }
/// struct Database { config: std::sync::Arc<Config> }
///
/// let config = TypeSpec::builder::<Config>()
///     .constructor(|_| Ok(Config { url: "postgres://localhost".into() }));
///
/// let database = TypeSpec::builder::<Database>()
///     .param(0, Key::of::<Config>())
///     .constructor(|args| Ok(Database { config: args.get::<Config>(0)? }));
/// ```
pub struct TypeSpec {
    pub(crate) key: Key,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) properties: Vec<PropertySpec>,
    pub(crate) capabilities: Vec<Key>,
    pub(crate) construct: ConstructFn,
    pub(crate) assign: Option<AssignFn>,
}

impl TypeSpec {
    /// Start a spec for `T`, keyed by `Key::of::<T>()`.
    pub fn builder<T: Send + Sync + 'static>() -> TypeSpecBuilder<T> {
        TypeSpecBuilder {
            key: Key::of::<T>(),
            params: Vec::new(),
            properties: Vec::new(),
            capabilities: Vec::new(),
            assign: None,
            _marker: PhantomData,
        }
    }

    /// The key this spec constructs.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Constructor parameter descriptors in declared order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Injected property descriptors.
    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }
}

impl std::fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeSpec")
            .field("key", &self.key)
            .field("params", &self.params.len())
            .field("properties", &self.properties.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Fluent builder for [`TypeSpec`]; see [`TypeSpec::builder`].
pub struct TypeSpecBuilder<T> {
    key: Key,
    params: Vec<ParamSpec>,
    properties: Vec<PropertySpec>,
    capabilities: Vec<Key>,
    assign: Option<AssignFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeSpecBuilder<T> {
    /// Declare a constructor parameter at `index`.
    pub fn param(mut self, index: usize, key: impl Into<KeyRef>) -> Self {
        self.params.push(ParamSpec {
            index,
            key: key.into(),
        });
        self
    }

    /// Declare an injected property, applied after construction.
    pub fn property(mut self, name: &'static str, key: impl Into<KeyRef>) -> Self {
        self.properties.push(PropertySpec {
            name,
            kind: InjectKind::ClassProperty,
            key: key.into(),
        });
        self
    }

    /// Declare an abstract capability key this type satisfies, making it a
    /// candidate for lookups by that key.
    pub fn capability(mut self, key: Key) -> Self {
        self.capabilities.push(key);
        self
    }

    /// Install the callable that writes resolved property values onto the
    /// instance. Required when any property is declared; the target type
    /// provides interior mutability for the written fields.
    pub fn assign<F>(mut self, assign: F) -> Self
    where
        F: Fn(&T, &PropertySpec, Instance) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.assign = Some(Box::new(move |instance, spec, value| {
            let typed = instance.clone().downcast::<T>().map_err(|_| {
                BoxError::from(format!(
                    "assign target is not a '{}'",
                    std::any::type_name::<T>()
                ))
            })?;
            assign(&typed, spec, value)
        }));
        self
    }

    /// Finalize with a synchronous constructor.
    pub fn constructor<F>(self, construct: F) -> TypeSpec
    where
        F: Fn(Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.finish(Box::new(move |args| {
            let result = construct(args).map(|value| Arc::new(value) as Instance);
            Box::pin(std::future::ready(result))
        }))
    }

    /// Finalize with a constructor that performs asynchronous work.
    pub fn constructor_async<F, Fut>(self, construct: F) -> TypeSpec
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        self.finish(Box::new(move |args| {
            let fut = construct(args);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as Instance) })
        }))
    }

    fn finish(self, construct: ConstructFn) -> TypeSpec {
        TypeSpec {
            key: self.key,
            params: self.params,
            properties: self.properties,
            capabilities: self.capabilities,
            construct,
            assign: self.assign,
        }
    }
}

/// Side-table of type descriptors, shared by a container and all of its
/// children.
///
/// Also maintains the capability index: abstract key to the keys of the
/// registered implementations satisfying it, in registration order.
pub struct MetadataRegistry {
    types: DashMap<Key, Arc<TypeSpec>, RandomState>,
    implementations: DashMap<Key, Vec<Key>, RandomState>,
}

impl MetadataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            types: DashMap::with_hasher(RandomState::new()),
            implementations: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register a type descriptor, overwriting any previous one for the same
    /// key and indexing its declared capabilities.
    pub fn register(&self, spec: TypeSpec) {
        #[cfg(feature = "logging")]
        debug!(
            target: "inject_container",
            key = spec.key.display_name(),
            params = spec.params.len(),
            properties = spec.properties.len(),
            "Registering type descriptor"
        );

        for capability in &spec.capabilities {
            self.add_implementation(capability.clone(), spec.key.clone());
        }
        self.types.insert(spec.key.clone(), Arc::new(spec));
    }

    pub(crate) fn add_implementation(&self, capability: Key, implementation: Key) {
        let mut entry = self.implementations.entry(capability).or_default();
        if !entry.contains(&implementation) {
            entry.push(implementation);
        }
    }

    /// The descriptor registered for `key`, if any.
    pub fn spec(&self, key: &Key) -> Option<Arc<TypeSpec>> {
        self.types.get(key).map(|entry| entry.value().clone())
    }

    /// Whether `key` can be constructed without an explicit provider.
    pub fn is_constructible(&self, key: &Key) -> bool {
        self.types.contains_key(key)
    }

    /// Ordered constructor parameter descriptors for `key`; empty when the
    /// key has no descriptor.
    pub fn constructor_params(&self, key: &Key) -> Vec<ParamSpec> {
        self.spec(key)
            .map(|spec| spec.params.clone())
            .unwrap_or_default()
    }

    /// Injected property descriptors for `key`; empty when the key has no
    /// descriptor.
    pub fn injection_properties(&self, key: &Key) -> Vec<PropertySpec> {
        self.spec(key)
            .map(|spec| spec.properties.clone())
            .unwrap_or_default()
    }

    /// Keys of registered implementations of an abstract capability key.
    pub fn implementations(&self, capability: &Key) -> Vec<Key> {
        self.implementations
            .get(capability)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("types", &self.types.len())
            .field("capabilities", &self.implementations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config {
        url: String,
    }

    #[allow(dead_code)]
    struct Database {
        config: Arc<Config>,
    }

    #[test]
    fn test_builder_records_descriptors() {
        let spec = TypeSpec::builder::<Database>()
            .param(0, Key::of::<Config>())
            .property("config", Key::of::<Config>())
            .constructor(|args| {
                Ok(Database {
                    config: args.get::<Config>(0)?,
                })
            });

        assert_eq!(spec.key(), &Key::of::<Database>());
        assert_eq!(spec.params().len(), 1);
        assert_eq!(spec.params()[0].index, 0);
        assert_eq!(spec.properties().len(), 1);
        assert_eq!(spec.properties()[0].kind, InjectKind::ClassProperty);
    }

    #[test]
    fn test_registry_query_surface() {
        let registry = MetadataRegistry::new();
        registry.register(TypeSpec::builder::<Config>().constructor(|_| {
            Ok(Config {
                url: "test".into(),
            })
        }));

        assert!(registry.is_constructible(&Key::of::<Config>()));
        assert!(!registry.is_constructible(&Key::of::<Database>()));
        assert!(registry.constructor_params(&Key::of::<Config>()).is_empty());
        assert!(registry.constructor_params(&Key::of::<Database>()).is_empty());
    }

    #[test]
    fn test_capability_index_keeps_registration_order() {
        let registry = MetadataRegistry::new();
        let capability = Key::name("storage");

        registry.register(
            TypeSpec::builder::<Config>()
                .capability(capability.clone())
                .constructor(|_| Ok(Config { url: "a".into() })),
        );
        registry.register(
            TypeSpec::builder::<Database>()
                .capability(capability.clone())
                .constructor(|_| Err("needs config".into())),
        );

        let impls = registry.implementations(&capability);
        assert_eq!(impls, vec![Key::of::<Config>(), Key::of::<Database>()]);
        assert!(registry.implementations(&Key::name("other")).is_empty());
    }

    #[test]
    fn test_args_unfilled_slots() {
        let mut args = Args::new(2);
        args.set(1, Arc::new(Config { url: "x".into() }) as Instance);

        assert_eq!(args.len(), 2);
        assert!(args.raw(0).is_none());
        assert!(args.get::<Config>(0).is_err());
        assert_eq!(args.get::<Config>(1).unwrap().url, "x");
        // wrong type downcast
        assert!(args.get::<Database>(1).is_err());
    }

    #[tokio::test]
    async fn test_async_constructor() {
        let spec = TypeSpec::builder::<Config>().constructor_async(|_| async {
            Ok(Config {
                url: "async".into(),
            })
        });

        let instance = (spec.construct)(Args::new(0)).await.unwrap();
        let config = instance.downcast::<Config>().unwrap();
        assert_eq!(config.url, "async");
    }
}
