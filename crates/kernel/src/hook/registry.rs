//! Hook registry - indexes which modules provide which hooks.
//!
//! Hooks are registered as factories and instantiated on first use. An
//! instance is cached per (hook name, key). A factory that fails is logged
//! and its registration removed, so one broken module does not take the
//! rest of the application down with it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::auth::{Authorizer, MODULE_PERMISSION_NS};

type Factory<H> = Arc<dyn Fn() -> anyhow::Result<Arc<H>> + Send + Sync>;

struct Registration<H: ?Sized> {
    key: String,
    module: Option<String>,
    factory: Factory<H>,
}

struct Inner<H: ?Sized> {
    hooks: HashMap<String, Vec<Registration<H>>>,
    instances: HashMap<String, HashMap<String, Arc<H>>>,
}

/// Registry mapping hook names to lazily created implementations.
///
/// Implementations are returned in registration order.
pub struct HookRegistry<H: ?Sized> {
    inner: RwLock<Inner<H>>,
}

impl<H: ?Sized + Send + Sync> Default for HookRegistry<H> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                hooks: HashMap::new(),
                instances: HashMap::new(),
            }),
        }
    }
}

impl<H: ?Sized + Send + Sync> HookRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `name` under `key`.
    ///
    /// `module` is the providing module; `None` for the application itself.
    /// Registering an existing key replaces it and drops its cached instance.
    pub fn register<F>(&self, name: &str, key: &str, module: Option<&str>, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<H>> + Send + Sync + 'static,
    {
        let name = normalize_name(name);
        let mut inner = self.inner.write();

        if let Some(cached) = inner.instances.get_mut(&name) {
            cached.remove(key);
        }

        let registrations = inner.hooks.entry(name).or_default();
        let registration = Registration {
            key: key.to_string(),
            module: module.map(str::to_string),
            factory: Arc::new(factory),
        };
        match registrations.iter_mut().find(|r| r.key == key) {
            Some(existing) => *existing = registration,
            None => registrations.push(registration),
        }
    }

    /// Register an already created instance.
    pub fn register_instance(&self, name: &str, key: &str, module: Option<&str>, instance: Arc<H>)
    where
        H: 'static,
    {
        self.register(name, key, module, move || Ok(Arc::clone(&instance)));
    }

    /// Whether anything is registered for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.inner
            .read()
            .hooks
            .get(&normalize_name(name))
            .is_some_and(|r| !r.is_empty())
    }

    /// Registered keys for `name`, in registration order.
    pub fn keys(&self, name: &str) -> Vec<String> {
        self.inner
            .read()
            .hooks
            .get(&normalize_name(name))
            .map(|r| r.iter().map(|r| r.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Get or create the instance registered under (`name`, `key`).
    ///
    /// Returns `None` when nothing is registered or the factory fails; in
    /// the latter case the registration is removed.
    pub fn create_instance(&self, name: &str, key: &str) -> Option<Arc<H>> {
        let name = normalize_name(name);

        let factory = {
            let inner = self.inner.read();
            if let Some(instance) = inner.instances.get(&name).and_then(|i| i.get(key)) {
                return Some(Arc::clone(instance));
            }
            let registration = inner.hooks.get(&name)?.iter().find(|r| r.key == key)?;
            Arc::clone(&registration.factory)
        };

        match factory() {
            Ok(instance) => {
                // A concurrent caller may have stored an instance meanwhile.
                let mut inner = self.inner.write();
                let cached = inner
                    .instances
                    .entry(name)
                    .or_default()
                    .entry(key.to_string())
                    .or_insert(instance);
                Some(Arc::clone(cached))
            }
            Err(e) => {
                warn!(
                    hook = %name,
                    key,
                    error = %format!("{e:#}"),
                    "failed to create hook instance, unregistering it"
                );
                self.unregister(&name, key);
                None
            }
        }
    }

    /// Remove a registration and its cached instance.
    pub fn unregister(&self, name: &str, key: &str) {
        let name = normalize_name(name);
        let mut inner = self.inner.write();

        if let Some(registrations) = inner.hooks.get_mut(&name) {
            registrations.retain(|r| r.key != key);
            if registrations.is_empty() {
                inner.hooks.remove(&name);
            }
        }
        if let Some(cached) = inner.instances.get_mut(&name) {
            cached.remove(key);
        }
    }

    /// All instances of `name` the authorizer may see.
    ///
    /// Module hooks require the `module/<name>` permission. Hooks that fail
    /// to instantiate are skipped.
    pub fn all(&self, name: &str, authorizer: &dyn Authorizer) -> Vec<Arc<H>> {
        self.permitted_keys(name, authorizer)
            .into_iter()
            .filter_map(|key| self.create_instance(name, &key))
            .collect()
    }

    /// The first instance of `name` the authorizer may see.
    pub fn first(&self, name: &str, authorizer: &dyn Authorizer) -> Option<Arc<H>> {
        self.permitted_keys(name, authorizer)
            .into_iter()
            .find_map(|key| self.create_instance(name, &key))
    }

    /// Forget every registration and instance.
    pub fn clean(&self) {
        let mut inner = self.inner.write();
        inner.hooks.clear();
        inner.instances.clear();
    }

    fn permitted_keys(&self, name: &str, authorizer: &dyn Authorizer) -> Vec<String> {
        let inner = self.inner.read();
        let Some(registrations) = inner.hooks.get(&normalize_name(name)) else {
            return Vec::new();
        };

        registrations
            .iter()
            .filter(|r| match &r.module {
                Some(module) => {
                    let permitted = authorizer.can(&format!("{MODULE_PERMISSION_NS}{module}"));
                    if !permitted {
                        debug!(hook = name, module = %module, "hook hidden by module permission");
                    }
                    permitted
                }
                None => true,
            })
            .map(|r| r.key.clone())
            .collect()
    }
}

/// `grapher/detail` and `Grapher/Detail` name the same hook.
pub fn normalize_name(name: &str) -> String {
    name.split('/')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("/")
}
