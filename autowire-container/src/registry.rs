//! Binding registry: what every identifier currently resolves to.
//!
//! Each binding is a two-state cell: [`Slot::Pending`] holds the builder,
//! [`Slot::Cached`] holds the value a singleton was built into. The only
//! way from the first state to the second is [`Registry::materialize`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::builder::Builder;
use crate::id::Identifier;
use crate::lifetime::Lifetime;
use crate::value::Value;

static GENERATION: AtomicU64 = AtomicU64::new(1);

/// Current content of a binding.
#[derive(Clone)]
pub(crate) enum Slot {
    Pending(Arc<dyn Builder>),
    Cached(Value),
}

/// Registration entry for a single identifier.
#[derive(Clone)]
pub(crate) struct Binding {
    pub slot: Slot,
    /// What the binding was created with, still known once cached.
    pub origin: Arc<dyn Builder>,
    pub lifetime: Lifetime,
    /// Changes on every (re)bind, so a value built for an older binding
    /// is never cached into a newer one.
    pub generation: u64,
    /// Created implicitly by resolving an unbound class.
    pub automatic: bool,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = match &self.slot {
            Slot::Pending(builder) => builder.describe(),
            Slot::Cached(value) => format!("Cached({})", value.type_name()),
        };
        f.debug_struct("Binding")
            .field("slot", &slot)
            .field("lifetime", &self.lifetime)
            .field("generation", &self.generation)
            .field("automatic", &self.automatic)
            .finish()
    }
}

/// Result of looking an identifier up.
pub(crate) enum Lookup {
    Cached(Value),
    Pending {
        builder: Arc<dyn Builder>,
        lifetime: Lifetime,
        generation: u64,
    },
    Unbound,
}

/// Stores all bindings.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    bindings: HashMap<Identifier, Binding>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a binding, replacing any previous one (and its cached value).
    ///
    /// Returns the binding's generation.
    pub fn bind(&mut self, id: Identifier, builder: Arc<dyn Builder>, lifetime: Lifetime) -> u64 {
        self.insert(id, builder, lifetime, false)
    }

    /// Installs the implicit binding of an unbound class.
    pub fn bind_automatic(&mut self, id: Identifier, builder: Arc<dyn Builder>, lifetime: Lifetime) -> u64 {
        self.insert(id, builder, lifetime, true)
    }

    fn insert(&mut self, id: Identifier, builder: Arc<dyn Builder>, lifetime: Lifetime, automatic: bool) -> u64 {
        let generation = GENERATION.fetch_add(1, Ordering::Relaxed);
        debug!(
            id = %id,
            lifetime = %lifetime,
            builder = %builder.describe(),
            automatic,
            "Bound identifier"
        );

        let replaced = self.bindings.insert(
            id,
            Binding {
                slot: Slot::Pending(builder.clone()),
                origin: builder,
                lifetime,
                generation,
                automatic,
            },
        );
        if let Some(previous) = replaced {
            trace!(generation = previous.generation, "Replaced previous binding");
        }
        generation
    }

    /// Removes a binding. Returns `true` if there was one.
    pub fn unbind(&mut self, id: &str) -> bool {
        let removed = self.bindings.remove(id).is_some();
        if removed {
            debug!(id, "Unbound identifier");
        }
        removed
    }

    /// Drops the implicit binding of a class, if that is what `id` has.
    pub fn forget_automatic(&mut self, id: &str) {
        if self.bindings.get(id).is_some_and(|binding| binding.automatic) {
            self.bindings.remove(id);
            trace!(id, "Dropped automatic binding");
        }
    }

    pub fn lookup(&self, id: &str) -> Lookup {
        match self.bindings.get(id) {
            None => Lookup::Unbound,
            Some(Binding {
                slot: Slot::Cached(value),
                ..
            }) => Lookup::Cached(value.clone()),
            Some(Binding {
                slot: Slot::Pending(builder),
                lifetime,
                generation,
                ..
            }) => Lookup::Pending {
                builder: builder.clone(),
                lifetime: *lifetime,
                generation: *generation,
            },
        }
    }

    /// Replaces a singleton's builder with the value it built.
    ///
    /// Does nothing if the binding was replaced (or removed) since
    /// `generation` was looked up, or is not a singleton.
    pub fn materialize(&mut self, id: &str, generation: u64, value: &Value) -> bool {
        match self.bindings.get_mut(id) {
            Some(binding) if binding.generation == generation && binding.lifetime.is_shared() => {
                trace!(id, "Caching singleton");
                binding.slot = Slot::Cached(value.clone());
                true
            }
            _ => false,
        }
    }

    /// The builder `id` was bound with, even after its value was cached.
    pub fn origin(&self, id: &str) -> Option<Arc<dyn Builder>> {
        self.bindings.get(id).map(|binding| binding.origin.clone())
    }

    /// Returns `true` for explicit and implicit bindings.
    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    /// Returns `true` only for bindings someone created on purpose.
    pub fn contains_explicit(&self, id: &str) -> bool {
        self.bindings.get(id).is_some_and(|binding| !binding.automatic)
    }

    pub fn lifetime(&self, id: &str) -> Option<Lifetime> {
        self.bindings.get(id).map(|binding| binding.lifetime)
    }

    pub fn is_cached(&self, id: &str) -> bool {
        matches!(self.bindings.get(id), Some(Binding { slot: Slot::Cached(_), .. }))
    }

    /// Bound identifiers, sorted.
    pub fn ids(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = self.bindings.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Builders of bindings that have not been materialized yet.
    pub fn builders(&self) -> Vec<(Identifier, Arc<dyn Builder>)> {
        let mut builders: Vec<(Identifier, Arc<dyn Builder>)> = self
            .bindings
            .iter()
            .filter_map(|(id, binding)| match &binding.slot {
                Slot::Pending(builder) => Some((id.clone(), builder.clone())),
                Slot::Cached(_) => None,
            })
            .collect();
        builders.sort_by(|a, b| a.0.cmp(&b.0));
        builders
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::builder::ValueBuilder;

    fn value_builder() -> Arc<dyn Builder> {
        Arc::new(ValueBuilder::new(Value::from(42)))
    }

    #[test]
    fn bind_and_lookup() {
        let mut registry = Registry::new();
        assert!(matches!(registry.lookup("answer"), Lookup::Unbound));

        registry.bind("answer".into(), value_builder(), Lifetime::Transient);
        assert!(matches!(registry.lookup("answer"), Lookup::Pending { .. }));
        assert!(registry.contains_explicit("answer"));
        assert_eq!(registry.lifetime("answer"), Some(Lifetime::Transient));
    }

    #[test]
    fn materialize_caches_singletons_only() {
        let mut registry = Registry::new();
        let singleton = registry.bind("shared".into(), value_builder(), Lifetime::Singleton);
        let transient = registry.bind("fresh".into(), value_builder(), Lifetime::Transient);

        assert!(registry.materialize("shared", singleton, &Value::from(1)));
        assert!(!registry.materialize("fresh", transient, &Value::from(1)));

        assert!(matches!(registry.lookup("shared"), Lookup::Cached(Value::Int(1))));
        assert!(registry.is_cached("shared"));
        assert!(!registry.is_cached("fresh"));
        assert!(registry.origin("shared").is_some());
        assert!(registry.origin("missing").is_none());
    }

    #[test]
    fn rebinding_clears_cache_and_rejects_stale_values() {
        let mut registry = Registry::new();
        let first = registry.bind("shared".into(), value_builder(), Lifetime::Singleton);
        registry.materialize("shared", first, &Value::from(1));

        let second = registry.bind("shared".into(), value_builder(), Lifetime::Singleton);
        assert_ne!(first, second);
        assert!(matches!(registry.lookup("shared"), Lookup::Pending { .. }));

        assert!(!registry.materialize("shared", first, &Value::from(2)));
        assert!(registry.materialize("shared", second, &Value::from(3)));
    }

    #[test]
    fn automatic_bindings_can_be_forgotten() {
        let mut registry = Registry::new();
        registry.bind_automatic("Clock".into(), value_builder(), Lifetime::Transient);
        registry.bind("Mailer".into(), value_builder(), Lifetime::Transient);

        assert!(registry.contains("Clock"));
        assert!(!registry.contains_explicit("Clock"));

        registry.forget_automatic("Clock");
        registry.forget_automatic("Mailer");
        assert!(!registry.contains("Clock"));
        assert!(registry.contains("Mailer"));
    }

    #[test]
    fn unbind_and_listing() {
        let mut registry = Registry::new();
        registry.bind("b".into(), value_builder(), Lifetime::Transient);
        registry.bind("a".into(), value_builder(), Lifetime::Singleton);

        assert_eq!(registry.ids(), vec![Identifier::from("a"), Identifier::from("b")]);
        assert_eq!(registry.builders().len(), 2);

        assert!(registry.unbind("a"));
        assert!(!registry.unbind("a"));
        assert_eq!(registry.len(), 1);
    }
}
