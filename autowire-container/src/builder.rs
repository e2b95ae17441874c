//! Builders: the strategies that turn a binding into a value.
//!
//! - [`ValueBuilder`]: hands out a pre-built value
//! - [`FactoryBuilder`]: calls a closure with the container
//! - [`ClassBuilder`]: autowires a class constructor
//! - [`AliasBuilder`]: resolves another identifier
//!
//! What a binding points at is decided once, when it is created, from the
//! closed [`Implementation`] sum. Explicit constructor arguments are the
//! equally closed [`Argument`] sum.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::trace;

use crate::container::Container;
use crate::descriptor::{ClassDescriptor, ClassKind, Visibility};
use crate::error::{Error, Missing, NotFoundError, Result};
use crate::id::Identifier;
use crate::parameter::Parameter;
use crate::value::{Arguments, Instance, Value};

/// Type-erased factory closure.
pub type FactoryFn = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

/// Produces one value on demand.
///
/// Building is repeatable: every call performs a fresh construction unless
/// the builder holds a pre-built value. Caching singletons is the
/// registry's job.
pub trait Builder: Send + Sync {
    fn build(&self, container: &Container) -> Result<Value>;

    /// Short label for logs and debug output.
    fn describe(&self) -> String;

    /// Identifiers this builder resolves from the container, used by
    /// static graph validation.
    fn dependencies(&self, _container: &Container) -> Vec<Identifier> {
        Vec::new()
    }

    /// The class constructor behind this builder, if it autowires one.
    fn as_class(&self) -> Option<&ClassBuilder> {
        None
    }

    /// The identifier this builder forwards to, if it is an alias.
    fn alias_target(&self) -> Option<&Identifier> {
        None
    }
}

impl fmt::Debug for dyn Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ── Value ──

/// Returns the same value on every build.
pub struct ValueBuilder {
    value: Value,
}

impl ValueBuilder {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into() }
    }
}

impl Builder for ValueBuilder {
    fn build(&self, _container: &Container) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn describe(&self) -> String {
        format!("Value({})", self.value.type_name())
    }
}

// ── Factory ──

/// Invokes a closure with the container on every build.
pub struct FactoryBuilder {
    factory: FactoryFn,
}

impl FactoryBuilder {
    pub fn new(factory: FactoryFn) -> Self {
        Self { factory }
    }
}

impl Builder for FactoryBuilder {
    fn build(&self, container: &Container) -> Result<Value> {
        guard_fatal(|| "factory closure".to_string(), || (self.factory)(container))
    }

    fn describe(&self) -> String {
        "Closure".to_string()
    }
}

// ── Alias ──

/// Resolves another identifier through the normal path.
pub struct AliasBuilder {
    target: Identifier,
}

impl AliasBuilder {
    pub fn new(target: impl Into<Identifier>) -> Self {
        Self { target: target.into() }
    }

    #[inline]
    pub fn target(&self) -> &Identifier {
        &self.target
    }
}

impl Builder for AliasBuilder {
    fn build(&self, container: &Container) -> Result<Value> {
        container.resolve_dependency(&self.target, self.target.quoted())
    }

    fn describe(&self) -> String {
        format!("Alias({})", self.target)
    }

    fn dependencies(&self, _container: &Container) -> Vec<Identifier> {
        vec![self.target.clone()]
    }

    fn alias_target(&self) -> Option<&Identifier> {
        Some(&self.target)
    }
}

// ── Class ──

/// An explicit constructor argument.
#[derive(Clone)]
pub enum Argument {
    /// Used as is.
    Value(Value),
    /// Built on every construction.
    Builder(Arc<dyn Builder>),
    /// Resolved from the container by identifier.
    Reference(Identifier),
}

impl Argument {
    pub fn value(value: impl Into<Value>) -> Self {
        Argument::Value(value.into())
    }

    pub fn reference(id: impl Into<Identifier>) -> Self {
        Argument::Reference(id.into())
    }

    pub fn builder(builder: impl Builder + 'static) -> Self {
        Argument::Builder(Arc::new(builder))
    }

    fn resolve(&self, container: &Container, crumb: String) -> Result<Value> {
        match self {
            Argument::Value(value) => Ok(value.clone()),
            Argument::Builder(builder) => container.build_nested(builder.as_ref(), crumb),
            Argument::Reference(id) => container.resolve_dependency(id, crumb),
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Argument::Builder(builder) => f.debug_tuple("Builder").field(&builder.describe()).finish(),
            Argument::Reference(id) => f.debug_tuple("Reference").field(id).finish(),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// Autowires a class constructor.
///
/// Each parameter is taken from, in order: an explicit argument at its
/// position, a contextual binding for the class (`$name` first, then the
/// parameter's type), the container (class-typed parameters), or the
/// parameter's default. Arguments beyond the declared parameters are
/// passed through after them.
#[derive(Clone)]
pub struct ClassBuilder {
    class: Arc<ClassDescriptor>,
    arguments: Vec<Option<Argument>>,
    after_build: Vec<String>,
}

impl ClassBuilder {
    /// Checks that `class` exists and can be instantiated.
    pub fn new(container: &Container, class: &Identifier) -> Result<Self> {
        let descriptor = container.describe_class(class).ok_or_else(|| {
            Error::NotFound(NotFoundError::new(Missing::Entry(class.clone())))
        })?;

        if descriptor.kind() != ClassKind::Class || !descriptor.is_instantiable() {
            return Err(Error::NotInstantiable { class: class.clone() });
        }
        if descriptor.visibility() != Visibility::Public {
            return Err(Error::NonPublicConstructor { class: class.clone() });
        }

        Ok(Self {
            class: descriptor,
            arguments: Vec::new(),
            after_build: Vec::new(),
        })
    }

    /// Explicit arguments, positioned from the first parameter.
    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments = arguments.into_iter().map(Some).collect();
        self
    }

    /// One explicit argument at a parameter position.
    pub fn with_argument_at(mut self, position: usize, argument: Argument) -> Self {
        if self.arguments.len() <= position {
            self.arguments.resize_with(position + 1, || None);
        }
        self.arguments[position] = Some(argument);
        self
    }

    /// Methods called on the new instance, in order.
    pub fn with_after_build(mut self, methods: Vec<String>) -> Self {
        self.after_build = methods;
        self
    }

    #[inline]
    pub fn class(&self) -> &Identifier {
        self.class.name()
    }

    fn explicit(&self, position: usize) -> Option<&Argument> {
        self.arguments.get(position).and_then(Option::as_ref)
    }

    fn resolve_parameter(&self, container: &Container, parameter: &Parameter) -> Result<Value> {
        let consumer = self.class.name();
        let crumb = parameter.breadcrumb();

        if let Some(contextual) = container.contextual(consumer, parameter) {
            trace!(consumer = %consumer, parameter = parameter.name(), "Using contextual binding");
            return container.build_nested(contextual.as_ref(), crumb);
        }

        match parameter.class() {
            Some(class) if !container.can_resolve(class) && parameter.is_optional() => {
                parameter.default_or_fail(consumer)
            }
            Some(class) if !container.can_resolve(class) && parameter.allows_null() => Ok(Value::Null),
            Some(class) => container.resolve_dependency(class, crumb),
            None => parameter.default_or_fail(consumer),
        }
    }
}

impl Builder for ClassBuilder {
    fn build(&self, container: &Container) -> Result<Value> {
        let parameters = container.parameters(&self.class);
        let mut values = Vec::with_capacity(parameters.len().max(self.arguments.len()));

        for parameter in parameters.iter() {
            let value = match self.explicit(parameter.position()) {
                Some(argument) => argument.resolve(container, parameter.breadcrumb())?,
                None => self.resolve_parameter(container, parameter)?,
            };
            values.push(value);
        }

        for (position, argument) in self.arguments.iter().enumerate().skip(parameters.len()) {
            if let Some(argument) = argument {
                values.push(argument.resolve(container, format!("#{position}"))?);
            }
        }

        let class = &self.class;
        let instance = guard_fatal(
            || format!("{}::__construct()", class.name()),
            || class.instantiate(Arguments::new(values), &self.after_build),
        )?;
        Ok(Value::Object(instance))
    }

    fn describe(&self) -> String {
        format!("Class({})", self.class.name())
    }

    fn dependencies(&self, container: &Container) -> Vec<Identifier> {
        let mut dependencies = Vec::new();
        for parameter in container.parameters(&self.class).iter() {
            match self.explicit(parameter.position()) {
                Some(Argument::Reference(id)) => dependencies.push(id.clone()),
                Some(Argument::Builder(builder)) => dependencies.extend(builder.dependencies(container)),
                Some(Argument::Value(_)) => {}
                None => {
                    if let Some(contextual) = container.contextual(self.class.name(), parameter) {
                        dependencies.extend(contextual.dependencies(container));
                    } else if let Some(class) = parameter.class() {
                        if !parameter.is_optional() && !parameter.allows_null() {
                            dependencies.push(class.clone());
                        }
                    }
                }
            }
        }
        dependencies
    }

    fn as_class(&self) -> Option<&ClassBuilder> {
        Some(self)
    }
}

// ── Implementation ──

/// What a binding, contextual override or tag member points at.
#[derive(Clone)]
pub enum Implementation {
    /// A class to autowire, or another binding to alias.
    Class(Identifier),
    /// A pre-built value.
    Value(Value),
    /// A closure called with the container.
    Factory(FactoryFn),
    /// A ready-made builder.
    Builder(Arc<dyn Builder>),
}

impl Implementation {
    pub fn class(id: impl Into<Identifier>) -> Self {
        Implementation::Class(id.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Implementation::Value(value.into())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        Implementation::Factory(Arc::new(factory))
    }

    pub fn builder(builder: impl Builder + 'static) -> Self {
        Implementation::Builder(Arc::new(builder))
    }

    /// Turns the implementation bound under `id` into a builder.
    ///
    /// A class that is itself bound under another identifier becomes an
    /// alias of that binding. With `after_build` methods it is built from
    /// that binding's class instead, the methods replacing its own.
    /// `after_build` only applies to classes.
    pub fn into_builder(
        self,
        container: &Container,
        id: &Identifier,
        after_build: Vec<String>,
    ) -> Result<Arc<dyn Builder>> {
        let builder: Arc<dyn Builder> = match self {
            Implementation::Class(target) if &target != id && container.is_bound(&target) => {
                if after_build.is_empty() {
                    Arc::new(AliasBuilder::new(target))
                } else {
                    Arc::new(container.class_builder(&target)?.with_after_build(after_build))
                }
            }
            Implementation::Class(target) => {
                Arc::new(ClassBuilder::new(container, &target)?.with_after_build(after_build))
            }
            Implementation::Value(value) => Arc::new(ValueBuilder::new(value)),
            Implementation::Factory(factory) => Arc::new(FactoryBuilder::new(factory)),
            Implementation::Builder(builder) => builder,
        };
        Ok(builder)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Class(id) => f.debug_tuple("Class").field(id).finish(),
            Implementation::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Implementation::Factory(_) => f.write_str("Factory"),
            Implementation::Builder(builder) => f.debug_tuple("Builder").field(&builder.describe()).finish(),
        }
    }
}

impl From<&str> for Implementation {
    fn from(id: &str) -> Self {
        Implementation::Class(id.into())
    }
}

impl From<String> for Implementation {
    fn from(id: String) -> Self {
        Implementation::Class(id.into())
    }
}

impl From<Identifier> for Implementation {
    fn from(id: Identifier) -> Self {
        Implementation::Class(id)
    }
}

impl From<&Identifier> for Implementation {
    fn from(id: &Identifier) -> Self {
        Implementation::Class(id.clone())
    }
}

impl From<Value> for Implementation {
    fn from(value: Value) -> Self {
        Implementation::Value(value)
    }
}

impl From<Instance> for Implementation {
    fn from(instance: Instance) -> Self {
        Implementation::Value(Value::Object(instance))
    }
}

// ── Panic isolation ──

/// Runs user code, turning a panic into [`Error::Fatal`].
pub(crate) fn guard_fatal<T>(
    context: impl FnOnce() -> String,
    run: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Fatal {
            context: context(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fixtures::{self, Mailer};

    #[test]
    fn value_builder_returns_same_value() {
        let container = fixtures::container();
        let builder = ValueBuilder::new(Value::object(42u8));

        let a = builder.build(&container).unwrap();
        let b = builder.build(&container).unwrap();
        assert!(a.same(&b));
        assert_eq!(builder.describe(), "Value(u8)");
    }

    #[test]
    fn factory_builder_is_not_memoized() {
        let container = fixtures::container();
        let builder = FactoryBuilder::new(Arc::new(|_: &Container| Ok(Value::object(String::from("fresh")))));

        let a = builder.build(&container).unwrap();
        let b = builder.build(&container).unwrap();
        assert!(!a.same(&b));
    }

    #[test]
    fn factory_panic_becomes_fatal_error() {
        let container = fixtures::container();
        let builder = FactoryBuilder::new(Arc::new(|_: &Container| panic!("database unreachable")));

        let err = builder.build(&container).unwrap_err();
        assert!(matches!(err, Error::Fatal { ref message, .. } if message == "database unreachable"));
    }

    #[test]
    fn class_builder_autowires_constructor() {
        let container = fixtures::container();
        let builder = ClassBuilder::new(&container, &"Mailer".into()).unwrap();

        let value = builder.build(&container).unwrap();
        let mailer = value.downcast::<Mailer>().unwrap();
        assert_eq!(mailer.host, "localhost");
        assert_eq!(mailer.logger.name(), "file");
    }

    #[test]
    fn explicit_argument_wins_at_its_position() {
        let container = fixtures::container();
        let builder = ClassBuilder::new(&container, &"Mailer".into())
            .unwrap()
            .with_argument_at(1, Argument::value("smtp.example.org"));

        let mailer = builder.build(&container).unwrap().downcast::<Mailer>().unwrap();
        assert_eq!(mailer.host, "smtp.example.org");
    }

    #[test]
    fn reference_argument_resolves_binding() {
        let container = fixtures::container();
        container.bind("null.logger", "NullLogger").unwrap();

        let builder = ClassBuilder::new(&container, &"Mailer".into())
            .unwrap()
            .with_arguments([Argument::reference("null.logger")]);

        let mailer = builder.build(&container).unwrap().downcast::<Mailer>().unwrap();
        assert_eq!(mailer.logger.name(), "null");
    }

    #[test]
    fn unknown_class_is_not_found() {
        let container = fixtures::container();
        let err = ClassBuilder::new(&container, &"Nowhere".into()).err().unwrap();

        assert!(err.is_not_found());
    }

    #[test]
    fn abstract_class_is_not_instantiable() {
        let container = fixtures::container();
        let err = ClassBuilder::new(&container, &"BaseRepository".into()).err().unwrap();

        assert!(matches!(err, Error::NotInstantiable { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn private_constructor_is_rejected() {
        let container = fixtures::container();
        let err = ClassBuilder::new(&container, &"Secret".into()).err().unwrap();

        assert!(matches!(err, Error::NonPublicConstructor { .. }));
    }

    #[test]
    fn class_implementation_aliases_other_bindings() {
        let container = fixtures::container();
        container.singleton("Logger", "FileLogger").unwrap();

        let builder = Implementation::from("Logger")
            .into_builder(&container, &"logger".into(), Vec::new())
            .unwrap();
        assert_eq!(builder.describe(), "Alias(Logger)");
        assert_eq!(builder.dependencies(&container), vec![Identifier::from("Logger")]);
    }

    #[test]
    fn class_dependencies_skip_optional_parameters() {
        let container = fixtures::container();
        let builder = ClassBuilder::new(&container, &"Mailer".into()).unwrap();

        assert_eq!(builder.dependencies(&container), vec![Identifier::from("Logger")]);
    }
}
