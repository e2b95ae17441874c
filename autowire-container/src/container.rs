//! # The Container: heart of autowire
//!
//! Maps identifiers to builders and autowires classes nobody bound.
//!
//! # Architecture
//! ```text
//! get("Newsletter")
//!   └─ registry: Cached? ──yes──> value
//!        │ no
//!        ▼
//!      builder.build()            ClassBuilder: for each constructor parameter
//!        └─ resolve_dependency ──>   explicit arg | contextual | binding | default
//!             └─ (recurse)
//! ```
//!
//! # Examples
//! ```rust
//! use autowire_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! #[derive(Default)]
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::builder()
//!     .define(ClassDescriptor::interface("Logger"))
//!     .define(
//!         ClassDescriptor::class::<ConsoleLogger>("ConsoleLogger")
//!             .implements::<dyn Logger>("Logger", |this| this as Arc<dyn Logger>)
//!             .default_constructor(),
//!     )
//!     .define(
//!         ClassDescriptor::class::<UserService>("UserService")
//!             .needs("logger", "Logger")
//!             .constructor(|args| Ok(UserService { logger: args.object::<dyn Logger>(0)? })),
//!     )
//!     .build();
//!
//! container.singleton("Logger", "ConsoleLogger").unwrap();
//!
//! let service = container.resolve::<UserService>("UserService").unwrap();
//! assert_eq!(service.logger.log("hi"), "[console] hi");
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use autowire_support::rendering::suggest_similar;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::builder::{Argument, Builder, ClassBuilder, Implementation};
use crate::callback::Invokable;
use crate::catalog::Catalog;
use crate::config::ContainerConfig;
use crate::contextual::{ContextualBindingBuilder, ContextualBindings};
use crate::descriptor::{ClassDescriptor, ClassKind, Visibility};
use crate::error::{CircularDependencyError, Error, Missing, NotFoundError, Result};
use crate::id::Identifier;
use crate::lifetime::Lifetime;
use crate::parameter::{Parameter, ParameterInspector};
use crate::provider::ProviderTable;
use crate::registry::{Lookup, Registry};
use crate::trace::{BuildTrace, FrameKey};
use crate::value::Value;

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`] with its configuration and class catalog.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .config(settings.container)
///     .discover()
///     .define(ClassDescriptor::interface("Logger"))
///     .build();
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    classes: Vec<ClassDescriptor>,
    discover: bool,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Cache autowired classes nobody bound as singletons.
    pub fn resolve_unbound_as_singleton(mut self, enabled: bool) -> Self {
        self.config.resolve_unbound_as_singleton = enabled;
        self
    }

    /// Adds a class to the catalog.
    pub fn define(mut self, class: impl Into<ClassDescriptor>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Adds every class registered with `submit_class!`.
    pub fn discover(mut self) -> Self {
        self.discover = true;
        self
    }

    pub fn build(self) -> Container {
        let catalog = if self.discover { Catalog::discovered() } else { Catalog::new() };
        for class in self.classes {
            catalog.define(class);
        }

        debug!(
            classes = catalog.len(),
            resolve_unbound_as_singleton = self.config.resolve_unbound_as_singleton,
            "Building container"
        );

        Container {
            inner: Arc::new(Inner {
                config: self.config,
                catalog,
                inspector: ParameterInspector::new(),
                registry: RwLock::new(Registry::new()),
                contextual: RwLock::new(ContextualBindings::new()),
                tags: RwLock::new(HashMap::new()),
                providers: RwLock::new(ProviderTable::new()),
                callbacks: DashMap::new(),
                trace: BuildTrace::new(),
                booted: AtomicBool::new(false),
            }),
        }
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// A member of a tag.
#[derive(Clone)]
enum TagMember {
    /// Resolved through the normal path.
    Entry(Identifier),
    Built(Arc<dyn Builder>),
}

pub(crate) struct Inner {
    pub(crate) config: ContainerConfig,
    pub(crate) catalog: Catalog,
    pub(crate) inspector: ParameterInspector,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) contextual: RwLock<ContextualBindings>,
    tags: RwLock<HashMap<String, Vec<TagMember>>>,
    pub(crate) providers: RwLock<ProviderTable>,
    pub(crate) callbacks: DashMap<String, Invokable>,
    pub(crate) trace: BuildTrace,
    pub(crate) booted: AtomicBool,
}

/// Dependency injection container.
///
/// Cloning is cheap and yields a handle to the same container. Every
/// operation runs to completion before returning and no lock is held while
/// user code runs, but a container keeps a single build trace, so resolve
/// from one thread at a time.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<Inner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// An empty container with the default configuration.
    pub fn new() -> Self {
        ContainerBuilder::new().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Adds or redefines a class. An implicit binding created for the old
    /// definition is dropped.
    pub fn define(&self, class: impl Into<ClassDescriptor>) {
        let class = class.into();
        let name = class.name().clone();
        self.inner.catalog.define(class);
        self.inner.registry.write().forget_automatic(&name);
    }

    // ── Binding ──

    /// Registers a transient binding.
    ///
    /// A class implementation must name an instantiable class, unless it is
    /// itself bound, in which case `id` becomes an alias of it.
    pub fn bind(&self, id: impl Into<Identifier>, implementation: impl Into<Implementation>) -> Result<()> {
        self.bind_with(id, implementation, Vec::new())
    }

    /// Binds a class to itself: `bind_self("Foo")` is `bind("Foo", "Foo")`.
    pub fn bind_self(&self, id: impl Into<Identifier>) -> Result<()> {
        let id = id.into();
        self.bind(id.clone(), Implementation::Class(id))
    }

    /// Like [`bind`](Container::bind), calling `after_build` methods on
    /// every instance of a class implementation.
    pub fn bind_with(
        &self,
        id: impl Into<Identifier>,
        implementation: impl Into<Implementation>,
        after_build: Vec<String>,
    ) -> Result<()> {
        self.install(id.into(), implementation.into(), after_build, Lifetime::Transient)
    }

    /// Registers a binding that is built once, then reused.
    pub fn singleton(&self, id: impl Into<Identifier>, implementation: impl Into<Implementation>) -> Result<()> {
        self.singleton_with(id, implementation, Vec::new())
    }

    pub fn singleton_self(&self, id: impl Into<Identifier>) -> Result<()> {
        let id = id.into();
        self.singleton(id.clone(), Implementation::Class(id))
    }

    pub fn singleton_with(
        &self,
        id: impl Into<Identifier>,
        implementation: impl Into<Implementation>,
        after_build: Vec<String>,
    ) -> Result<()> {
        self.install(id.into(), implementation.into(), after_build, Lifetime::Singleton)
    }

    fn install(
        &self,
        id: Identifier,
        implementation: Implementation,
        after_build: Vec<String>,
        lifetime: Lifetime,
    ) -> Result<()> {
        let builder = implementation.into_builder(self, &id, after_build)?;
        self.bind_builder(id, builder, lifetime);
        Ok(())
    }

    pub(crate) fn bind_builder(&self, id: Identifier, builder: Arc<dyn Builder>, lifetime: Lifetime) {
        self.inner.registry.write().bind(id, builder, lifetime);
    }

    /// Removes a binding and its cached value. Returns `true` if `id` was bound.
    pub fn unbind(&self, id: &str) -> bool {
        self.inner.registry.write().unbind(id)
    }

    /// Binds `id` to a decorator chain, outermost first.
    ///
    /// Every element but the last receives the element after it as its
    /// first constructor argument; the last is the base implementation.
    /// `after_build` methods run on the outermost instance.
    pub fn bind_decorators<I, T>(&self, id: impl Into<Identifier>, chain: I, after_build: Vec<String>) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        self.decorate(id.into(), chain, after_build, Lifetime::Transient)
    }

    pub fn singleton_decorators<I, T>(
        &self,
        id: impl Into<Identifier>,
        chain: I,
        after_build: Vec<String>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        self.decorate(id.into(), chain, after_build, Lifetime::Singleton)
    }

    fn decorate<I, T>(&self, id: Identifier, chain: I, after_build: Vec<String>, lifetime: Lifetime) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        let chain: Vec<Identifier> = chain.into_iter().map(Into::into).collect();
        if chain.is_empty() {
            return Err(Error::EmptyDecoratorChain { id });
        }

        let mut wrapped: Option<Arc<dyn Builder>> = None;
        for (position, class) in chain.iter().enumerate().rev() {
            let mut builder = ClassBuilder::new(self, class)?;
            if let Some(inner) = wrapped.take() {
                builder = builder.with_argument_at(0, Argument::Builder(inner));
            }
            if position == 0 {
                builder = builder.with_after_build(after_build.clone());
            }
            wrapped = Some(Arc::new(builder));
        }

        debug!(id = %id, chain = ?chain, "Bound decorator chain");
        if let Some(builder) = wrapped {
            self.bind_builder(id, builder, lifetime);
        }
        Ok(())
    }

    // ── Contextual ──

    /// Starts a contextual binding for `consumer`:
    /// `when(consumer).needs(dependency).give(implementation)`.
    pub fn when(&self, consumer: impl Into<Identifier>) -> ContextualBindingBuilder<'_> {
        ContextualBindingBuilder::new(self, consumer.into())
    }

    pub(crate) fn add_contextual(&self, consumer: Identifier, needs: Identifier, builder: Arc<dyn Builder>) {
        self.inner.contextual.write().insert(consumer, needs, builder);
    }

    pub(crate) fn contextual(&self, consumer: &Identifier, parameter: &Parameter) -> Option<Arc<dyn Builder>> {
        self.inner.contextual.read().find(consumer, parameter)
    }

    // ── Lookup ──

    /// `true` if `id` is bound, or names a known class or interface.
    ///
    /// Known is not the same as buildable: an abstract class "has" an
    /// entry, but getting it fails.
    pub fn has(&self, id: &str) -> bool {
        self.inner.registry.read().contains(id) || self.inner.catalog.contains(id)
    }

    /// `true` if someone bound `id` explicitly.
    pub fn is_bound(&self, id: &str) -> bool {
        self.inner.registry.read().contains_explicit(id)
    }

    pub fn is_singleton(&self, id: &str) -> bool {
        self.inner.registry.read().lifetime(id) == Some(Lifetime::Singleton)
    }

    /// Bound identifiers, sorted.
    pub fn ids(&self) -> Vec<Identifier> {
        self.inner.registry.read().ids()
    }

    /// Resolves `id`.
    ///
    /// # Errors
    /// [`Error::NotFound`] if `id` is neither bound nor a known class;
    /// [`Error::Build`] for anything that fails on the way.
    pub fn get(&self, id: &str) -> Result<Value> {
        trace!(id, "Resolving");
        if !self.has(id) {
            return Err(self.not_found(id));
        }
        let id = Identifier::from(id);
        self.resolve_dependency(&id, id.quoted())
    }

    /// Same as [`get`](Container::get).
    pub fn make(&self, id: &str) -> Result<Value> {
        self.get(id)
    }

    /// Resolves `id` and returns it seen as `T`.
    ///
    /// ```rust,ignore
    /// let logger: Arc<dyn Logger> = container.resolve::<dyn Logger>("Logger")?;
    /// ```
    pub fn resolve<T: ?Sized + 'static>(&self, id: &str) -> Result<Arc<T>> {
        let value = self.get(id)?;
        value.downcast::<T>().ok_or_else(|| Error::TypeMismatch {
            id: id.into(),
            expected: type_name::<T>(),
            actual: value.type_name(),
        })
    }

    /// Builds a fresh `class` with explicit constructor arguments.
    ///
    /// A bound `class` is built from the class its binding (or alias
    /// chain) autowires. The shared instance of a singleton is never
    /// reused or replaced.
    ///
    /// # Errors
    /// [`Error::NotAClassBinding`] if `class` is bound to something other
    /// than a class.
    pub fn make_with(&self, class: &str, arguments: Vec<Argument>) -> Result<Value> {
        let class = Identifier::from(class);
        let builder = self
            .class_builder(&class)
            .map_err(|err| self.inner.trace.fail_at(class.quoted(), err))?
            .with_arguments(arguments);
        self.build_top(&builder, &class)
    }

    /// The class builder behind `id`, following aliases. Unbound ids are
    /// looked up in the catalog.
    pub(crate) fn class_builder(&self, id: &Identifier) -> Result<ClassBuilder> {
        let mut current = id.clone();
        let mut path = Vec::new();

        loop {
            let Some(origin) = self.inner.registry.read().origin(&current) else {
                return ClassBuilder::new(self, &current);
            };

            if let Some(class) = origin.as_class() {
                return Ok(class.clone());
            }

            let Some(target) = origin.alias_target() else {
                return Err(Error::NotAClassBinding { id: current });
            };

            let seen = path.contains(target);
            path.push(std::mem::replace(&mut current, target.clone()));
            if seen {
                path.push(current);
                let chain = path.iter().map(Identifier::quoted).collect();
                return Err(Error::CircularDependency(CircularDependencyError { chain }));
            }
        }
    }

    fn not_found(&self, id: &str) -> Error {
        let mut known = self.inner.registry.read().ids();
        known.extend(self.inner.catalog.names());
        let names: Vec<&str> = known.iter().map(Identifier::as_str).collect();
        let suggestions = suggest_similar(id, &names, self.inner.config.max_suggestions);

        Error::NotFound(NotFoundError::new(Missing::Entry(id.into())).with_suggestions(suggestions))
    }

    // ── Resolution core ──

    /// Resolves `id` as one step of a larger resolution, `crumb` naming
    /// the step in error trails.
    pub(crate) fn resolve_dependency(&self, id: &Identifier, crumb: String) -> Result<Value> {
        let lookup = self.inner.registry.read().lookup(id);

        let (builder, lifetime, generation) = match lookup {
            Lookup::Cached(value) => {
                trace!(id = %id, "Cache hit");
                return Ok(value);
            }
            Lookup::Pending {
                builder,
                lifetime,
                generation,
            } => (builder, lifetime, generation),
            Lookup::Unbound => match self.register_automatic(id) {
                Ok(pending) => pending,
                Err(err) => return Err(self.inner.trace.fail_at(crumb, err)),
            },
        };

        let value = self
            .inner
            .trace
            .run(crumb, Some(FrameKey::Binding(id.clone(), generation)), || builder.build(self))?;

        if lifetime.is_shared() {
            self.inner.registry.write().materialize(id, generation, &value);
        }
        Ok(value)
    }

    fn register_automatic(&self, class: &Identifier) -> Result<(Arc<dyn Builder>, Lifetime, u64)> {
        let builder: Arc<dyn Builder> = Arc::new(ClassBuilder::new(self, class)?);
        let lifetime = if self.inner.config.resolve_unbound_as_singleton {
            Lifetime::Singleton
        } else {
            Lifetime::Transient
        };

        let generation = self
            .inner
            .registry
            .write()
            .bind_automatic(class.clone(), builder.clone(), lifetime);
        Ok((builder, lifetime, generation))
    }

    /// Builds `id` again after its binding was replaced mid-resolution,
    /// inside the frame that is already open for it.
    pub(crate) fn resolve_rebound(&self, id: &Identifier) -> Result<Value> {
        let lookup = self.inner.registry.read().lookup(id);

        match lookup {
            Lookup::Cached(value) => Ok(value),
            Lookup::Pending {
                builder,
                lifetime,
                generation,
            } => {
                let value = builder.build(self)?;
                if lifetime.is_shared() {
                    self.inner.registry.write().materialize(id, generation, &value);
                }
                Ok(value)
            }
            Lookup::Unbound => Err(self.not_found(id)),
        }
    }

    /// Builds with a builder that is not bound to anything.
    pub(crate) fn build_nested(&self, builder: &dyn Builder, crumb: String) -> Result<Value> {
        let key = FrameKey::Builder(std::ptr::from_ref(builder).cast::<()>().addr());
        self.inner.trace.run(crumb, Some(key), || builder.build(self))
    }

    /// Builds `id` as a top-level request, bypassing its binding.
    pub(crate) fn build_top(&self, builder: &dyn Builder, id: &Identifier) -> Result<Value> {
        self.build_nested(builder, id.quoted())
    }

    pub(crate) fn describe_class(&self, class: &str) -> Option<Arc<ClassDescriptor>> {
        self.inner.catalog.describe(class)
    }

    pub(crate) fn parameters(&self, class: &Arc<ClassDescriptor>) -> Arc<[Parameter]> {
        self.inner.inspector.parameters(class)
    }

    /// Whether resolving `class` has a chance of succeeding.
    pub(crate) fn can_resolve(&self, class: &str) -> bool {
        if self.inner.registry.read().contains(class) {
            return true;
        }
        self.describe_class(class).is_some_and(|descriptor| {
            descriptor.kind() == ClassKind::Class
                && descriptor.is_instantiable()
                && descriptor.visibility() == Visibility::Public
        })
    }

    /// `true` while `id` is still bound to `builder` itself.
    pub(crate) fn is_pending_with(&self, id: &str, builder: &dyn Builder) -> bool {
        let lookup = self.inner.registry.read().lookup(id);
        match lookup {
            Lookup::Pending { builder: pending, .. } => {
                std::ptr::addr_eq(Arc::as_ptr(&pending), std::ptr::from_ref(builder))
            }
            _ => false,
        }
    }

    // ── Tags ──

    /// Appends members to `tag`. Class identifiers are resolved through
    /// their bindings when the tag is read; anything else is built as is.
    pub fn tag<I, T>(&self, members: I, tag: &str) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Implementation>,
    {
        let mut added = Vec::new();
        for member in members {
            let member = match member.into() {
                Implementation::Class(id) => TagMember::Entry(id),
                other => TagMember::Built(other.into_builder(self, &Identifier::from(tag), Vec::new())?),
            };
            added.push(member);
        }

        debug!(tag, members = added.len(), "Tagged");
        self.inner.tags.write().entry(tag.to_string()).or_default().extend(added);
        Ok(())
    }

    /// Resolves every member of `tag`, in tagging order.
    pub fn tagged(&self, tag: &str) -> Result<Vec<Value>> {
        let members = self
            .inner
            .tags
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::NotFound(NotFoundError::new(Missing::Tag(tag.to_string()))))?;

        members
            .iter()
            .map(|member| match member {
                TagMember::Entry(id) => self.get(id),
                TagMember::Built(builder) => self.build_nested(builder.as_ref(), format!("#{tag}")),
            })
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.inner.tags.read().contains_key(tag)
    }

    // ── Array-style access ──

    /// Binds `id` as a singleton, like assigning to an array key.
    pub fn set(&self, id: impl Into<Identifier>, implementation: impl Into<Implementation>) -> Result<()> {
        self.singleton(id, implementation)
    }

    /// Resolves `id`, which must have been bound explicitly.
    pub fn fetch(&self, id: &str) -> Result<Value> {
        if !self.is_bound(id) {
            return Err(self.not_found(id));
        }
        self.get(id)
    }

    /// Removes the binding of `id` and the tag of the same name.
    pub fn remove(&self, id: &str) {
        self.unbind(id);
        if self.inner.tags.write().remove(id).is_some() {
            debug!(tag = id, "Removed tag");
        }
    }

    // ── Internal handles ──

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<Inner>) -> Option<Container> {
        inner.upgrade().map(|inner| Container { inner })
    }

    pub(crate) fn cached_callback(&self, key: &str) -> Option<Invokable> {
        self.inner.callbacks.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn cache_callback(&self, key: String, invokable: &Invokable) {
        self.inner.callbacks.insert(key, invokable.clone());
    }

    pub fn is_booted(&self) -> bool {
        self.inner.booted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_booted(&self) {
        self.inner.booted.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.inner.registry.read().len())
            .field("classes", &self.inner.catalog.len())
            .field("contextual", &self.inner.contextual.read().len())
            .field("providers", &self.inner.providers.read().len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::builder::{Argument, Builder, Implementation};
    pub use crate::callback::{CallbackTarget, Invokable};
    pub use crate::config::ContainerConfig;
    pub use crate::descriptor::{ClassDefinition, ClassDescriptor, ClassKind, Visibility};
    pub use crate::error::{BoxError, Error, ErrorKind, Result};
    pub use crate::id::Identifier;
    pub use crate::lifetime::Lifetime;
    pub use crate::parameter::ParameterDescriptor;
    pub use crate::provider::ServiceProvider;
    pub use crate::value::{Arguments, Instance, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
