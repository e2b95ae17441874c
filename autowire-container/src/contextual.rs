//! Contextual bindings: "when `C` needs `D`, give `Z`".
//!
//! An override only applies while the container resolves the constructor
//! parameters of `C` itself. It is not inherited by `D`'s own dependencies.
//!
//! ```
//! use autowire_container::prelude::*;
//!
//! #[derive(Default)]
//! struct Report;
//!
//! let container = Container::builder()
//!     .define(
//!         ClassDescriptor::class::<Report>("Report")
//!             .parameter(ParameterDescriptor::typed("title", "string"))
//!             .constructor(|_| Ok(Report)),
//!     )
//!     .build();
//!
//! container.when("Report").needs("$title").give(Implementation::value("Quarterly")).unwrap();
//! assert!(container.get("Report").is_ok());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::builder::{Builder, Implementation};
use crate::container::Container;
use crate::error::Result;
use crate::id::Identifier;
use crate::parameter::Parameter;

/// Override table keyed by (consumer, needed type or `$parameter`).
#[derive(Default)]
pub(crate) struct ContextualBindings {
    overrides: HashMap<(Identifier, Identifier), Arc<dyn Builder>>,
}

impl ContextualBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, consumer: Identifier, needs: Identifier, builder: Arc<dyn Builder>) {
        debug!(consumer = %consumer, needs = %needs, builder = %builder.describe(), "Contextual binding");
        self.overrides.insert((consumer, needs), builder);
    }

    /// Override for one parameter of `consumer`: by `$name` first, then by
    /// the parameter's class.
    pub fn find(&self, consumer: &Identifier, parameter: &Parameter) -> Option<Arc<dyn Builder>> {
        let by_name = Identifier::parameter(parameter.name());
        self.overrides
            .get(&(consumer.clone(), by_name))
            .or_else(|| {
                parameter
                    .class()
                    .and_then(|class| self.overrides.get(&(consumer.clone(), class.clone())))
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// First step of `when(..).needs(..).give(..)`.
#[must_use = "call .needs(..).give(..) to register the binding"]
pub struct ContextualBindingBuilder<'a> {
    container: &'a Container,
    consumer: Identifier,
}

impl<'a> ContextualBindingBuilder<'a> {
    pub(crate) fn new(container: &'a Container, consumer: Identifier) -> Self {
        Self { container, consumer }
    }

    /// The dependency to override: a class or interface name, or a
    /// `$name` token for a parameter.
    pub fn needs(self, dependency: impl Into<Identifier>) -> ContextualNeeds<'a> {
        ContextualNeeds {
            container: self.container,
            consumer: self.consumer,
            needs: dependency.into(),
        }
    }
}

/// Second step of `when(..).needs(..).give(..)`.
#[must_use = "call .give(..) to register the binding"]
pub struct ContextualNeeds<'a> {
    container: &'a Container,
    consumer: Identifier,
    needs: Identifier,
}

impl ContextualNeeds<'_> {
    /// Registers what the consumer receives instead.
    pub fn give(self, implementation: impl Into<Implementation>) -> Result<()> {
        let builder = implementation
            .into()
            .into_builder(self.container, &self.needs, Vec::new())?;
        self.container.add_contextual(self.consumer, self.needs, builder);
        Ok(())
    }
}
