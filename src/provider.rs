//! Instance providers
//!
//! A [`Provider`] associates one key with a factory whose own parameters are
//! themselves injectable: the container resolves the declared [`ParamSpec`]
//! list recursively before invoking [`Provider::provide`]. Implement the
//! trait directly for stateful providers, or wrap a closure with
//! [`FnProvider`].

use crate::error::BoxError;
use crate::key::{Key, KeyRef};
use crate::metadata::{Args, Instance, ParamSpec};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A registered factory responsible for producing one key's instance.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The key this provider satisfies.
    fn key(&self) -> Key;

    /// The factory's own declared parameters, resolved recursively and
    /// handed to [`Provider::provide`] at their indices.
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    /// Abstract capability keys this provider's instances satisfy.
    fn capabilities(&self) -> Vec<Key> {
        Vec::new()
    }

    /// Produce the instance. Invoked at most once per container; the result
    /// is cached as a singleton.
    async fn provide(&self, args: Args) -> std::result::Result<Instance, BoxError>;
}

type FactoryFn =
    Box<dyn Fn(Args) -> BoxFuture<'static, std::result::Result<Instance, BoxError>> + Send + Sync>;

/// A [`Provider`] built from a closure.
///
/// # Examples
///
/// ```rust
/// use inject_container::{FnProvider, InjectContainer};
///
/// struct Logger { level: String }
///
/// let container = InjectContainer::new();
/// container.register_provider(FnProvider::new(|_| Ok(Logger { level: "info".into() })));
///
/// # futures::executor::block_on(async {
/// let logger = container.get_instance::<Logger>().await.unwrap();
/// assert_eq!(logger.level, "info");
/// # });
/// ```
pub struct FnProvider {
    key: Key,
    params: Vec<ParamSpec>,
    capabilities: Vec<Key>,
    factory: FactoryFn,
}

impl FnProvider {
    /// Provider for `T`, keyed by `Key::of::<T>()`, from a synchronous
    /// factory closure.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::with_key(Key::of::<T>(), factory)
    }

    /// Provider registered under an explicit key (e.g. a string key).
    pub fn with_key<T, F>(key: Key, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            key,
            params: Vec::new(),
            capabilities: Vec::new(),
            factory: Box::new(move |args| {
                let result = factory(args).map(|value| Arc::new(value) as Instance);
                Box::pin(std::future::ready(result))
            }),
        }
    }

    /// Provider for `T` from a factory performing asynchronous work.
    pub fn new_async<T, F, Fut>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        Self::with_key_async(Key::of::<T>(), factory)
    }

    /// Async factory registered under an explicit key.
    pub fn with_key_async<T, F, Fut>(key: Key, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, BoxError>> + Send + 'static,
    {
        Self {
            key,
            params: Vec::new(),
            capabilities: Vec::new(),
            factory: Box::new(move |args| {
                let fut = factory(args);
                Box::pin(async move { fut.await.map(|value| Arc::new(value) as Instance) })
            }),
        }
    }

    /// Declare a factory parameter at `index`.
    pub fn param(mut self, index: usize, key: impl Into<KeyRef>) -> Self {
        self.params.push(ParamSpec {
            index,
            key: key.into(),
        });
        self
    }

    /// Declare an abstract capability key this provider satisfies.
    pub fn capability(mut self, key: Key) -> Self {
        self.capabilities.push(key);
        self
    }
}

#[async_trait]
impl Provider for FnProvider {
    fn key(&self) -> Key {
        self.key.clone()
    }

    fn params(&self) -> Vec<ParamSpec> {
        self.params.clone()
    }

    fn capabilities(&self) -> Vec<Key> {
        self.capabilities.clone()
    }

    async fn provide(&self, args: Args) -> std::result::Result<Instance, BoxError> {
        (self.factory)(args).await
    }
}

impl std::fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider")
            .field("key", &self.key)
            .field("params", &self.params.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Logger {
        level: String,
    }

    #[tokio::test]
    async fn test_fn_provider_produces_instances() {
        let provider = FnProvider::new(|_| {
            Ok(Logger {
                level: "debug".into(),
            })
        });

        assert_eq!(provider.key(), Key::of::<Logger>());
        assert!(provider.params().is_empty());

        let instance = provider.provide(Args::new(0)).await.unwrap();
        let logger = instance.downcast::<Logger>().unwrap();
        assert_eq!(logger.level, "debug");
    }

    #[tokio::test]
    async fn test_string_keyed_provider() {
        let provider = FnProvider::with_key(Key::name("logger"), |_| {
            Ok(Logger {
                level: "warn".into(),
            })
        });

        assert_eq!(provider.key(), Key::name("logger"));
    }

    #[test]
    fn test_declared_params_keep_indices() {
        let provider = FnProvider::new(|args: Args| {
            Ok(Logger {
                level: format!("{} args", args.len()),
            })
        })
        .param(1, Key::name("config"))
        .param(0, Key::name("sink"));

        let params = provider.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].index, 1);
        assert_eq!(params[1].index, 0);
    }
}
