//! # Inject Container - Layered Runtime Dependency Injection
//!
//! A runtime registry that resolves object graphs by key, lazily
//! instantiates and caches singletons, and detects circular dependencies
//! before they cause infinite recursion or deadlock.
//!
//! ## Features
//!
//! - 🔑 **Key-based resolution** - resolve by type, string name, or lazy reference
//! - 🏭 **Providers** - factories whose own parameters are injected recursively
//! - 🧩 **Default class provider** - constructor and property injection from
//!   registered type descriptors, no explicit factory needed
//! - 🔄 **Cycle detection** - the dependency graph is checked before any
//!   constructor runs, and every cycle is reported as a chain of names
//! - 📚 **Layered containers** - children shadow locally and fall through to
//!   their parent, for per-request scopes over global singletons
//! - 🚦 **Deduplicated construction** - overlapping first-time resolutions of
//!   one key await a single construction
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use inject_container::{FnProvider, InjectContainer, Key, TypeSpec};
//!
//! struct Config { url: String }
//! struct UserService { config: std::sync::Arc<Config> }
//!
//! let container = InjectContainer::new();
//!
//! // a provider factory for Config
//! container.register_provider(FnProvider::new(|_| {
//!     Ok(Config { url: "postgres://localhost".into() })
//! }));
//!
//! // UserService is constructible from its descriptor alone
//! container.register_type(
//!     TypeSpec::builder::<UserService>()
//!         .param(0, Key::of::<Config>())
//!         .constructor(|args| Ok(UserService { config: args.get::<Config>(0)? })),
//! );
//!
//! # futures::executor::block_on(async {
//! let users = container.get_instance::<UserService>().await.unwrap();
//! let again = container.get_instance::<UserService>().await.unwrap();
//! assert!(std::sync::Arc::ptr_eq(&users, &again)); // cached singleton
//! # });
//! ```
//!
//! ## Layered scopes
//!
//! ```rust
//! use inject_container::{FnProvider, InjectContainer};
//!
//! #[derive(Clone)]
//! struct Greeting(&'static str);
//!
//! let root = InjectContainer::new();
//! root.register_provider(FnProvider::new(|_| Ok(Greeting("hello"))));
//!
//! // the request scope shadows the global registration
//! let request = root.new_child();
//! request.register_provider(FnProvider::new(|_| Ok(Greeting("hi there"))));
//!
//! # futures::executor::block_on(async {
//! assert_eq!(request.get_instance::<Greeting>().await.unwrap().0, "hi there");
//! assert_eq!(root.get_instance::<Greeting>().await.unwrap().0, "hello");
//! # });
//! ```
//!
//! ## Sharp edges
//!
//! Instances are cached *before* their properties are injected, so a
//! property that circularly references back observes the
//! partially-constructed instance. The flip side: a failed property
//! injection leaves the partially-initialized instance cached. Callers that
//! need rollback semantics must tear the container down.

mod container;
mod context;
mod error;
mod graph;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod metadata;
mod provider;
mod scope;

pub use container::InjectContainer;
pub use context::{Transaction, TransactionContext, TransactionRegistry};
pub use error::{BoxError, InjectError, Result};
pub use key::{Key, KeyRef, LazyKey};
pub use metadata::{
    Args, InjectKind, Instance, MetadataRegistry, ParamSpec, PropertySpec, TypeSpec,
    TypeSpecBuilder,
};
pub use provider::{FnProvider, Provider};
pub use scope::{Scope, ScopedContainer};

// Re-export tracing macros for convenience when logging is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, BoxError, FnProvider, InjectContainer, InjectError, Instance, Key, KeyRef, LazyKey,
        MetadataRegistry, Provider, Result, Scope, ScopedContainer, Transaction,
        TransactionContext, TransactionRegistry, TypeSpec,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Logger {
        level: &'static str,
    }

    #[tokio::test]
    async fn test_logger_provider_resolves_one_singleton() {
        static FACTORY_RUNS: AtomicU32 = AtomicU32::new(0);

        let container = InjectContainer::new();
        container.register_provider(FnProvider::new(|_| {
            FACTORY_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Logger { level: "info" })
        }));

        let first = container.get_instance::<Logger>().await.unwrap();
        let second = container.get_instance::<Logger>().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.level, "info");
        assert_eq!(FACTORY_RUNS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutually_dependent_constructors_are_rejected() {
        #[derive(Debug)]
        struct OrderService;
        struct BillingService;

        let container = InjectContainer::new();
        container.register_type(
            TypeSpec::builder::<OrderService>()
                .param(0, Key::of::<BillingService>())
                .constructor(|_| Ok(OrderService)),
        );
        container.register_type(
            TypeSpec::builder::<BillingService>()
                .param(0, Key::of::<OrderService>())
                .constructor(|_| Ok(BillingService)),
        );

        let err = container.get_instance::<OrderService>().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("OrderService"));
        assert!(message.contains("BillingService"));
    }

    #[tokio::test]
    async fn test_polymorphic_injection_without_alias() {
        struct PostgresStore {
            dsn: &'static str,
        }
        struct Repository {
            store: Instance,
        }

        let storage = Key::name("storage");

        let container = InjectContainer::new();
        container.register_provider(
            FnProvider::new(|_| {
                Ok(PostgresStore {
                    dsn: "postgres://localhost",
                })
            })
            .capability(storage.clone()),
        );
        container.register_type(
            TypeSpec::builder::<Repository>()
                .param(0, storage.clone())
                .constructor(|args| {
                    Ok(Repository {
                        store: args.raw(0).cloned().ok_or("storage missing")?,
                    })
                }),
        );

        // the concrete store resolves first; the repository's abstract
        // "storage" parameter is then satisfied by the same instance
        let concrete = container.get_instance::<PostgresStore>().await.unwrap();
        let repository = container.get_instance::<Repository>().await.unwrap();
        let store = repository.store.clone().downcast::<PostgresStore>().unwrap();
        assert_eq!(store.dsn, "postgres://localhost");
        assert!(Arc::ptr_eq(&store, &concrete));
    }

    #[tokio::test]
    async fn test_request_scope_over_global_container() {
        struct AppConfig {
            name: &'static str,
        }
        struct RequestUser {
            id: u64,
        }

        let root = InjectContainer::new();
        root.register_provider(FnProvider::new(|_| Ok(AppConfig { name: "app" })));
        let global_config = root.get_instance::<AppConfig>().await.unwrap();

        let request = ScopedContainer::from_parent(&root);
        request.register_provider(FnProvider::new(|_| Ok(RequestUser { id: 7 })));

        // global singleton is shared into the scope, request state is local
        let scoped_config = request.get_instance::<AppConfig>().await.unwrap();
        assert!(Arc::ptr_eq(&global_config, &scoped_config));
        assert_eq!(request.get_instance::<RequestUser>().await.unwrap().id, 7);
        assert!(root.get_instance::<RequestUser>().await.is_err());
    }

    #[tokio::test]
    async fn test_container_injects_itself_into_factories() {
        struct Spawner {
            container: Arc<InjectContainer>,
        }

        let container = InjectContainer::new();
        container.register_provider(
            FnProvider::new(|args: Args| {
                Ok(Spawner {
                    container: args.get::<InjectContainer>(0)?,
                })
            })
            .param(0, Key::of::<InjectContainer>()),
        );

        let spawner = container.get_instance::<Spawner>().await.unwrap();
        assert!(Arc::ptr_eq(&spawner.container, &container));
    }
}
