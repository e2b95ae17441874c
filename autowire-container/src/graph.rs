//! Dependency graph validation.
//!
//! Walks every binding and the classes they autowire without building
//! anything:
//! - Detects circular dependencies
//! - Checks that every dependency is bound or names a buildable class
//!
//! Resolution detects both problems too, but only on the path it takes.
//! [`Container::validate`] checks the whole graph up front.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::builder::{Builder, ClassBuilder};
use crate::container::Container;
use crate::error::{BuildError, CircularDependencyError, Error, Missing, NotFoundError, Result};
use crate::id::Identifier;
use crate::registry::Lookup;

/// Depth-first search over the binding graph.
///
/// Keeps the current path to detect cycles and the set of finished
/// nodes so shared dependencies are walked once.
pub(crate) struct GraphValidator<'a> {
    container: &'a Container,
    visiting: HashSet<Identifier>,
    validated: HashSet<Identifier>,
    path: Vec<Identifier>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            container,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every binding of the container.
    ///
    /// # Errors
    /// - [`Error::CircularDependency`] when a binding reaches itself
    /// - [`Error::Build`] wrapping the cause when a dependency can not be
    ///   built, with the path that leads to it
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let builders = self.container.inner.registry.read().builders();
        debug!(bindings = builders.len(), "Starting dependency graph validation");

        for (id, builder) in builders {
            if !self.validated.contains(&id) {
                self.visit(&id, Some(builder))?;
            }
        }

        debug!(validated = self.validated.len(), "Dependency graph validation passed");
        Ok(())
    }

    fn visit(&mut self, id: &Identifier, builder: Option<Arc<dyn Builder>>) -> Result<()> {
        if self.validated.contains(id) {
            return Ok(());
        }

        if self.visiting.contains(id) {
            let start = self.path.iter().position(|seen| seen == id).unwrap_or(0);
            let chain: Vec<String> = self.path[start..]
                .iter()
                .chain(std::iter::once(id))
                .map(Identifier::quoted)
                .collect();
            warn!(cycle = ?chain, "Circular dependency detected");

            return Err(Error::CircularDependency(CircularDependencyError { chain }));
        }

        let builder = match builder {
            Some(builder) => builder,
            None => match self.builder_for(id) {
                Ok(Some(builder)) => builder,
                Ok(None) => {
                    self.validated.insert(id.clone());
                    return Ok(());
                }
                Err(err) => return Err(self.fail(id, err)),
            },
        };

        self.visiting.insert(id.clone());
        self.path.push(id.clone());

        for dependency in builder.dependencies(self.container) {
            self.visit(&dependency, None)?;
        }

        self.path.pop();
        self.visiting.remove(id);
        self.validated.insert(id.clone());
        Ok(())
    }

    /// The builder resolution would use for `id`, or `None` when it is
    /// already a cached value.
    fn builder_for(&self, id: &Identifier) -> Result<Option<Arc<dyn Builder>>> {
        let lookup = self.container.inner.registry.read().lookup(id);
        match lookup {
            Lookup::Cached(_) => Ok(None),
            Lookup::Pending { builder, .. } => Ok(Some(builder)),
            Lookup::Unbound if self.container.catalog().contains(id) => {
                Ok(Some(Arc::new(ClassBuilder::new(self.container, id)?)))
            }
            Lookup::Unbound => Err(Error::NotFound(NotFoundError::new(Missing::Entry(id.clone())))),
        }
    }

    fn fail(&self, id: &Identifier, err: Error) -> Error {
        let trail = self.path.iter().chain(std::iter::once(id)).map(Identifier::quoted).collect();
        Error::Build(BuildError {
            trail,
            source: Box::new(err),
        })
    }
}

impl Container {
    /// Checks the whole dependency graph without building anything.
    ///
    /// Deferred providers are not registered by validation, so the ids
    /// they provide count as satisfied.
    pub fn validate(&self) -> Result<()> {
        GraphValidator::new(self).validate()
    }
}
