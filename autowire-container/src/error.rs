//! Error types for container operations.
//!
//! Every failure is one of three kinds (see [`ErrorKind`]): the requested
//! thing was never registered, building it failed, or a service provider
//! was configured inconsistently. Failures below the top of a resolution
//! are wrapped once into [`Error::Build`], whose message is a breadcrumb
//! trail from what the caller asked for down to the precise cause:
//!
//! ```text
//! 'Newsletter' => Mailer $mailer => Logger $logger => Error while making Logger $logger: class 'Logger' is not instantiable.
//! ```

use std::fmt;

use autowire_support::rendering::{render_chain, sentence, shorten_type_name};

use crate::id::Identifier;

/// Boxed error returned by user constructors, hooks and methods.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nothing is registered under the requested identifier, tag or provider.
    NotFound,
    /// Something went wrong while building a value.
    Container,
    /// A service provider declared itself deferred without providing anything.
    ProviderConfiguration,
}

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested identifier, tag or provider was never registered.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// A failure below the top level, with the breadcrumb trail leading to it.
    #[error(transparent)]
    Build(BuildError),

    /// A value transitively depends on itself.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// Target is an interface, abstract class or enum, or has no constructor.
    #[error("Class '{class}' is not instantiable")]
    NotInstantiable { class: Identifier },

    /// Target's constructor is protected or private.
    #[error("Constructor of class '{class}' is not public")]
    NonPublicConstructor { class: Identifier },

    /// A required constructor parameter has no binding, no type and no default.
    #[error("{}", .0)]
    UnresolvableParameter(UnresolvableParameterError),

    /// User code (constructor, hook, factory, method) returned an error.
    #[error("{context} failed: {source}")]
    Construction {
        context: String,
        #[source]
        source: BoxError,
    },

    /// User code panicked while the container was running it.
    #[error("Fatal error in {context}: {message}")]
    Fatal { context: String, message: String },

    /// `bind_decorators` was called with no implementations.
    #[error("Cannot bind decorators for '{id}': the decorator chain is empty")]
    EmptyDecoratorChain { id: Identifier },

    /// Explicit arguments were given for an identifier bound to a value,
    /// a factory or a custom builder.
    #[error("'{id}' is not bound to a class, so it cannot be built with arguments")]
    NotAClassBinding { id: Identifier },

    /// `callback` was given a target it cannot call.
    #[error("Invalid callback {target}: {reason}")]
    InvalidCallback { target: String, reason: String },

    /// An after-build hook or callback method is not declared on the class.
    #[error("Method '{method}' does not exist on class '{class}'")]
    UnknownMethod { class: Identifier, method: String },

    /// The resolved value does not expose the requested Rust type.
    #[error("'{id}' resolved to {actual}, which is not a {}", shorten_type_name(.expected))]
    TypeMismatch {
        id: Identifier,
        expected: &'static str,
        actual: String,
    },

    /// A constructor read an argument that is missing or of the wrong type.
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// A deferred service provider does not declare any provided ids.
    #[error("{}", .0)]
    DeferredProvider(DeferredProviderError),

    /// An [`Invokable`](crate::callback::Invokable) outlived its container.
    #[error("The container behind this callback has been dropped")]
    ContainerDropped,
}

impl Error {
    /// Maps the error onto its [`ErrorKind`].
    ///
    /// Only failures about the *requested* identifier are `NotFound`;
    /// a missing dependency deeper in the graph surfaces as a
    /// `Container` error wrapping the not-found cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::DeferredProvider(_) => ErrorKind::ProviderConfiguration,
            _ => ErrorKind::Container,
        }
    }

    /// Returns `true` for [`ErrorKind::NotFound`] errors.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns the innermost cause, unwrapping build trails.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Build(build) => build.source.root_cause(),
            other => other,
        }
    }

    /// Wraps an error returned by user code.
    pub fn construction(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Construction {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// What a [`NotFoundError`] failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// No binding and no class under this identifier.
    Entry(Identifier),
    /// Nothing was ever tagged with this name.
    Tag(String),
    /// No service provider registered under this identifier.
    Provider(Identifier),
}

/// Error when nothing is registered under a name.
///
/// Includes "did you mean?" suggestions from the known identifiers.
#[derive(Debug)]
pub struct NotFoundError {
    pub missing: Missing,
    pub suggestions: Vec<String>,
}

impl NotFoundError {
    pub fn new(missing: Missing) -> Self {
        Self {
            missing,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.missing {
            Missing::Entry(id) => write!(f, "No entry or class found for '{id}'")?,
            Missing::Tag(tag) => write!(f, "Tag '{tag}' is not defined")?,
            Missing::Provider(id) => write!(f, "Service provider '{id}' is not registered")?,
        }

        if !self.suggestions.is_empty() {
            let quoted: Vec<String> = self.suggestions.iter().map(|s| format!("'{s}'")).collect();
            write!(f, " (did you mean {}?)", quoted.join(", "))?;
        }

        Ok(())
    }
}

/// A failure somewhere inside a resolution, with the breadcrumbs of every
/// step that was in progress when it happened (outermost first).
#[derive(Debug)]
pub struct BuildError {
    pub trail: Vec<String>,
    pub source: Box<Error>,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.trail.last().map(String::as_str).unwrap_or("value");
        write!(
            f,
            "{} => Error while making {last}: {}",
            render_chain(&self.trail),
            sentence(&self.source.to_string()),
        )
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Error when a value transitively depends on itself.
///
/// Shows the full chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Breadcrumbs from the first occurrence of the repeated step to the
    /// repeated step again.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected: {}", render_chain(&self.chain))
    }
}

/// Error when a required parameter can be neither resolved nor defaulted.
#[derive(Debug)]
pub struct UnresolvableParameterError {
    pub class: Identifier,
    /// Breadcrumb of the parameter, e.g. `string $host`.
    pub parameter: String,
}

impl fmt::Display for UnresolvableParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unresolvable parameter [{}] of class '{}': auto-wiring is not magic, \
             bind it contextually, pass a build argument or declare a default value",
            self.parameter, self.class,
        )
    }
}

/// Error when a deferred provider provides nothing.
#[derive(Debug)]
pub struct DeferredProviderError {
    pub provider: Identifier,
}

impl fmt::Display for DeferredProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service provider '{}' is deferred but does not declare any provided ids",
            self.provider,
        )
    }
}

/// Error reading a constructor argument.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("Argument #{index} was not supplied")]
    Missing { index: usize },

    #[error("Argument #{index} is {actual}, expected {expected}")]
    Mismatch {
        index: usize,
        expected: String,
        actual: String,
    },
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
