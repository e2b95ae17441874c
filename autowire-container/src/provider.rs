//! Service providers: modules of related bindings.
//!
//! A provider groups the bindings of one concern (mail, persistence…)
//! behind a single `register()` call. A *deferred* provider declares the
//! identifiers it provides up front; its `register()` only runs the first
//! time one of them is resolved.
//!
//! # Examples
//! ```
//! use autowire_container::prelude::*;
//!
//! struct MailProvider;
//!
//! impl ServiceProvider for MailProvider {
//!     fn register(&self, container: &Container) -> Result<()> {
//!         container.singleton("mailer.host", Implementation::value("smtp.local"))
//!     }
//!
//!     fn is_deferred(&self) -> bool {
//!         true
//!     }
//!
//!     fn provides(&self) -> Vec<Identifier> {
//!         vec!["mailer.host".into()]
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_instance("MailProvider", MailProvider, &[]).unwrap();
//!
//! let host = container.get("mailer.host").unwrap();
//! assert_eq!(host.as_str(), Some("smtp.local"));
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::builder::{AliasBuilder, Builder, Implementation};
use crate::container::Container;
use crate::error::{DeferredProviderError, Error, Missing, NotFoundError, Result};
use crate::id::Identifier;
use crate::lifetime::Lifetime;
use crate::value::{Instance, Value};

/// A module that registers related bindings into a container.
pub trait ServiceProvider: Send + Sync {
    /// Installs the provider's bindings.
    ///
    /// Called once: right away, or for deferred providers the first time
    /// one of [`provides`](ServiceProvider::provides) is resolved.
    ///
    /// A deferred provider must bind its own ids before resolving them
    /// here; resolving one that is still deferred fails instead of
    /// registering the provider a second time.
    fn register(&self, container: &Container) -> Result<()>;

    /// Called once when the container boots, deferred providers included,
    /// or right after registration for providers added later. A deferred
    /// provider may boot before its `register()` has run.
    fn boot(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    fn is_deferred(&self) -> bool {
        false
    }

    /// Identifiers a deferred provider binds.
    fn provides(&self) -> Vec<Identifier> {
        Vec::new()
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// One registered provider and its progress.
pub(crate) struct ProviderRecord {
    id: Identifier,
    provider: Arc<dyn ServiceProvider>,
    deferred: bool,
    registered: OnceCell<()>,
    /// Thread inside `register()`, if any.
    registering: Mutex<Option<ThreadId>>,
    booted: OnceCell<()>,
}

/// Registered providers, in registration order.
#[derive(Default)]
pub(crate) struct ProviderTable {
    records: Vec<Arc<ProviderRecord>>,
    by_id: HashMap<Identifier, Arc<ProviderRecord>>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, record: Arc<ProviderRecord>, aliases: &[Identifier]) {
        for alias in aliases {
            self.by_id.insert(alias.clone(), record.clone());
        }
        self.by_id.insert(record.id.clone(), record.clone());
        self.records.push(record);
    }

    fn get(&self, id: &str) -> Option<Arc<ProviderRecord>> {
        self.by_id.get(id).cloned()
    }

    fn records(&self) -> Vec<Arc<ProviderRecord>> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Placeholder bound to each identifier of a deferred provider.
struct DeferredBuilder {
    record: Arc<ProviderRecord>,
    id: Identifier,
}

impl Builder for DeferredBuilder {
    fn build(&self, container: &Container) -> Result<Value> {
        container.register_provider_now(&self.record)?;

        if container.is_pending_with(&self.id, self) {
            return Err(Error::construction(
                format!("service provider '{}'", self.record.id),
                format!("register() did not bind '{}'", self.id),
            ));
        }
        container.resolve_rebound(&self.id)
    }

    fn describe(&self) -> String {
        format!("Deferred({})", self.record.id)
    }
}

impl Container {
    /// Registers a provider class, autowiring it as a singleton.
    ///
    /// The class must expose the `ServiceProvider` view
    /// (`.implements::<dyn ServiceProvider>(..)`). Each alias resolves to
    /// the same provider instance.
    pub fn register(&self, class: impl Into<Identifier>, aliases: &[&str]) -> Result<Arc<dyn ServiceProvider>> {
        let id = class.into();
        if !self.is_bound(&id) {
            self.singleton(id.clone(), Implementation::Class(id.clone()))?;
        }

        let value = self.get(&id)?;
        let provider = value.downcast::<dyn ServiceProvider>().ok_or_else(|| Error::TypeMismatch {
            id: id.clone(),
            expected: type_name::<dyn ServiceProvider>(),
            actual: value.type_name(),
        })?;

        self.install_provider(id, provider.clone(), aliases)?;
        Ok(provider)
    }

    /// Registers an already constructed provider under `id`.
    pub fn register_instance<P: ServiceProvider + 'static>(
        &self,
        id: impl Into<Identifier>,
        provider: P,
        aliases: &[&str],
    ) -> Result<Arc<dyn ServiceProvider>> {
        let id = id.into();
        let object = Arc::new(provider);
        let provider: Arc<dyn ServiceProvider> = object.clone();
        let instance = Instance::builder(id.clone(), object)
            .implements::<dyn ServiceProvider>("ServiceProvider", provider.clone())
            .build();

        self.singleton(id.clone(), instance)?;
        self.install_provider(id, provider.clone(), aliases)?;
        Ok(provider)
    }

    fn install_provider(&self, id: Identifier, provider: Arc<dyn ServiceProvider>, aliases: &[&str]) -> Result<()> {
        let deferred = provider.is_deferred();
        let provides = provider.provides();
        if deferred && provides.is_empty() {
            return Err(Error::DeferredProvider(DeferredProviderError { provider: id }));
        }

        let aliases: Vec<Identifier> = aliases.iter().map(|alias| Identifier::from(*alias)).collect();
        for alias in &aliases {
            self.bind_builder(alias.clone(), Arc::new(AliasBuilder::new(id.clone())), Lifetime::Singleton);
        }

        debug!(provider = provider.name(), id = %id, deferred, "Registering service provider");
        let record = Arc::new(ProviderRecord {
            id,
            provider,
            deferred,
            registered: OnceCell::new(),
            registering: Mutex::new(None),
            booted: OnceCell::new(),
        });
        self.inner.providers.write().insert(record.clone(), &aliases);

        if deferred {
            for provided in provides {
                let placeholder = DeferredBuilder {
                    record: record.clone(),
                    id: provided.clone(),
                };
                self.bind_builder(provided, Arc::new(placeholder), Lifetime::Transient);
            }
            return Ok(());
        }

        self.register_provider_now(&record)
    }

    /// Runs a provider's `register()` unless it already ran, booting it
    /// too if the container has already booted.
    pub(crate) fn register_provider_now(&self, record: &ProviderRecord) -> Result<()> {
        let current = thread::current().id();
        if record.registered.get().is_none() && *record.registering.lock() == Some(current) {
            return Err(Error::construction(
                format!("service provider '{}'", record.id),
                "register() resolved an id the provider itself still defers",
            ));
        }

        record.registered.get_or_try_init(|| {
            debug!(provider = record.provider.name(), deferred = record.deferred, "Calling register()");
            *record.registering.lock() = Some(current);
            let registered = record.provider.register(self);
            *record.registering.lock() = None;
            registered
        })?;

        if self.is_booted() {
            self.boot_provider(record)?;
        }
        Ok(())
    }

    fn boot_provider(&self, record: &ProviderRecord) -> Result<()> {
        record.booted.get_or_try_init(|| {
            debug!(provider = record.provider.name(), "Calling boot()");
            record.provider.boot(self)
        })?;
        Ok(())
    }

    /// Boots every provider, deferred ones included. Deferred providers
    /// are not registered by booting.
    #[instrument(skip(self), name = "container_boot")]
    pub fn boot(&self) -> Result<()> {
        self.mark_booted();
        let records = self.inner.providers.read().records();

        for record in &records {
            self.boot_provider(record)?;
        }

        let deferred = records.iter().filter(|record| record.deferred).count();
        info!(providers = records.len(), deferred, "Container booted");
        Ok(())
    }

    /// Returns the provider registered under `id` or one of its aliases.
    pub fn get_provider(&self, id: &str) -> Result<Arc<dyn ServiceProvider>> {
        self.inner
            .providers
            .read()
            .get(id)
            .map(|record| record.provider.clone())
            .ok_or_else(|| Error::NotFound(NotFoundError::new(Missing::Provider(id.into()))))
    }
}
