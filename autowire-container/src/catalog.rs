//! The class catalog: every class the container knows how to inspect.
//!
//! Classes are defined at runtime with [`Catalog::define`], or at link
//! time with [`submit_class!`](crate::submit_class) and picked up by
//! [`Catalog::discovered`].
//!
//! ```
//! use autowire_container::catalog::Catalog;
//! use autowire_container::descriptor::ClassDescriptor;
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! let catalog = Catalog::new();
//! catalog.define(ClassDescriptor::class::<Clock>("Clock").default_constructor());
//!
//! assert!(catalog.contains("Clock"));
//! assert!(catalog.describe("Calendar").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::ClassDescriptor;
use crate::id::Identifier;

/// Link-time registration of a class, collected by `inventory`.
pub struct ClassRegistration {
    describe: fn() -> ClassDescriptor,
}

impl ClassRegistration {
    pub const fn new(describe: fn() -> ClassDescriptor) -> Self {
        Self { describe }
    }

    pub fn describe(&self) -> ClassDescriptor {
        (self.describe)()
    }
}

inventory::collect!(ClassRegistration);

/// Registers a class descriptor at link time.
///
/// The function must return something convertible into a
/// [`ClassDescriptor`]:
///
/// ```ignore
/// fn clock() -> ClassDescriptor {
///     ClassDescriptor::class::<Clock>("Clock").default_constructor().into()
/// }
///
/// autowire_container::submit_class!(clock);
/// ```
#[macro_export]
macro_rules! submit_class {
    ($describe:path) => {
        $crate::inventory::submit! {
            $crate::catalog::ClassRegistration::new($describe)
        }
    };
}

/// Runtime type-descriptor service.
#[derive(Default)]
pub struct Catalog {
    classes: RwLock<HashMap<Identifier, Arc<ClassDescriptor>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every class submitted with `submit_class!`.
    pub fn discovered() -> Self {
        let catalog = Self::new();
        for registration in inventory::iter::<ClassRegistration> {
            catalog.define(registration.describe());
        }
        debug!(classes = catalog.len(), "Discovered classes");
        catalog
    }

    /// Defines (or redefines) a class. Returns the previous descriptor.
    pub fn define(&self, descriptor: impl Into<ClassDescriptor>) -> Option<Arc<ClassDescriptor>> {
        let descriptor = Arc::new(descriptor.into());
        let name = descriptor.name().clone();
        debug!(class = %name, kind = ?descriptor.kind(), "Defining class");
        self.classes.write().insert(name, descriptor)
    }

    pub fn describe(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Known class names, sorted.
    pub fn names(&self) -> Vec<Identifier> {
        let mut names: Vec<Identifier> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("classes", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Discovered;

    fn discovered_class() -> ClassDescriptor {
        ClassDescriptor::class::<Discovered>("Tests\\Discovered")
            .default_constructor()
            .into()
    }

    crate::submit_class!(discovered_class);

    #[test]
    fn define_and_describe() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());

        catalog.define(ClassDescriptor::interface("Logger"));
        catalog.define(ClassDescriptor::abstract_class("Repository"));

        assert!(catalog.contains("Logger"));
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.names().iter().map(Identifier::as_str).collect::<Vec<_>>(),
            vec!["Logger", "Repository"]
        );
    }

    #[test]
    fn redefining_returns_previous() {
        let catalog = Catalog::new();
        assert!(catalog.define(ClassDescriptor::interface("Logger")).is_none());

        let previous = catalog.define(ClassDescriptor::abstract_class("Logger"));
        assert!(previous.is_some());
        assert_eq!(
            catalog.describe("Logger").map(|d| d.kind()),
            Some(crate::descriptor::ClassKind::Abstract)
        );
    }

    #[test]
    fn discovered_includes_submitted_classes() {
        let catalog = Catalog::discovered();

        let descriptor = catalog.describe("Tests\\Discovered").unwrap();
        assert!(descriptor.is_instantiable());
    }
}
