//! Class descriptors.
//!
//! Rust has no runtime reflection, so every class the container can
//! autowire is described up front: its constructor parameters, how to
//! instantiate it, the interfaces it can be seen as, and the methods the
//! container may call on it (after-build hooks and callbacks).
//!
//! [`ClassDefinition<T>`] is the typed side, written once per Rust type.
//! [`ClassDescriptor`] is the erased side the resolver works with.
//!
//! ```
//! use std::sync::Arc;
//! use autowire_container::descriptor::ClassDescriptor;
//!
//! trait Logger: Send + Sync {}
//! #[derive(Default)]
//! struct NullLogger;
//! impl Logger for NullLogger {}
//!
//! let descriptor = ClassDescriptor::class::<NullLogger>("NullLogger")
//!     .implements::<dyn Logger>("Logger", |this| this as Arc<dyn Logger>)
//!     .default_constructor()
//!     .into_descriptor();
//!
//! assert!(descriptor.is_instantiable());
//! assert_eq!(descriptor.interfaces()[0].as_str(), "Logger");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{ArgumentError, BoxError, Error, Result};
use crate::id::Identifier;
use crate::parameter::ParameterDescriptor;
use crate::value::{Arguments, Instance, InstanceBuilder, Value};

/// Erased constructor: resolved arguments and after-build hook names in,
/// finished instance out.
pub type InstantiateFn = Arc<dyn Fn(Arguments, &[String]) -> Result<Instance> + Send + Sync>;

/// Erased instance method.
pub type MethodFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;

/// Erased static method.
pub type StaticMethodFn = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

type ConstructorFn<T> = Arc<dyn Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync>;
type HookFn<T> = Arc<dyn Fn(&mut T) -> std::result::Result<(), BoxError> + Send + Sync>;
type ViewFn<T> = Arc<dyn Fn(InstanceBuilder<T>) -> InstanceBuilder<T> + Send + Sync>;

/// What sort of type a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Abstract,
    Interface,
    Enum,
}

/// Constructor visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Erased description of one class.
pub struct ClassDescriptor {
    name: Identifier,
    kind: ClassKind,
    visibility: Visibility,
    parameters: Vec<ParameterDescriptor>,
    interfaces: Vec<Identifier>,
    constructor: Option<InstantiateFn>,
    methods: HashMap<String, MethodFn>,
    static_methods: HashMap<String, StaticMethodFn>,
}

impl ClassDescriptor {
    /// Starts describing a concrete class implemented by `T`.
    pub fn class<T: Any + Send + Sync>(name: impl Into<Identifier>) -> ClassDefinition<T> {
        ClassDefinition::new(name)
    }

    /// Describes an interface. Interfaces are never instantiable.
    pub fn interface(name: impl Into<Identifier>) -> Self {
        Self::uninstantiable(name, ClassKind::Interface)
    }

    /// Describes an abstract class.
    pub fn abstract_class(name: impl Into<Identifier>) -> Self {
        Self::uninstantiable(name, ClassKind::Abstract)
    }

    /// Describes an enum.
    pub fn enumeration(name: impl Into<Identifier>) -> Self {
        Self::uninstantiable(name, ClassKind::Enum)
    }

    fn uninstantiable(name: impl Into<Identifier>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            parameters: Vec::new(),
            interfaces: Vec::new(),
            constructor: None,
            methods: HashMap::new(),
            static_methods: HashMap::new(),
        }
    }

    /// Adds a static method to an already erased descriptor.
    pub fn with_static_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Container) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = erase_static(&self.name, &name, method);
        self.static_methods.insert(name, method);
        self
    }

    #[inline]
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    #[inline]
    pub fn interfaces(&self) -> &[Identifier] {
        &self.interfaces
    }

    /// Concrete class with a constructor. Visibility is checked separately.
    pub fn is_instantiable(&self) -> bool {
        self.kind == ClassKind::Class && self.constructor.is_some()
    }

    /// Runs the constructor, then every named after-build hook in order.
    pub fn instantiate(&self, arguments: Arguments, after_build: &[String]) -> Result<Instance> {
        let constructor = self.constructor.as_ref().ok_or_else(|| Error::NotInstantiable {
            class: self.name.clone(),
        })?;
        constructor(arguments, after_build)
    }

    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    pub fn static_method(&self, name: &str) -> Option<&StaticMethodFn> {
        self.static_methods.get(name)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("parameters", &self.parameters.len())
            .field("interfaces", &self.interfaces)
            .finish()
    }
}

/// Typed builder for a [`ClassDescriptor`].
pub struct ClassDefinition<T> {
    name: Identifier,
    visibility: Visibility,
    parameters: Vec<ParameterDescriptor>,
    constructor: Option<ConstructorFn<T>>,
    views: Vec<(Identifier, ViewFn<T>)>,
    hooks: HashMap<String, HookFn<T>>,
    methods: HashMap<String, MethodFn>,
    static_methods: HashMap<String, StaticMethodFn>,
}

impl<T: Any + Send + Sync> ClassDefinition<T> {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            parameters: Vec::new(),
            constructor: None,
            views: Vec::new(),
            hooks: HashMap::new(),
            methods: HashMap::new(),
            static_methods: HashMap::new(),
        }
    }

    /// Appends a constructor parameter.
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Appends a constructor parameter typed with a class or interface.
    pub fn needs(self, name: impl Into<String>, ty: impl Into<Identifier>) -> Self {
        self.parameter(ParameterDescriptor::typed(name, ty))
    }

    /// Sets the constructor. It receives the resolved arguments in
    /// parameter order.
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Arguments) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Declares that instances can be seen as the interface `name`,
    /// reached through `cast` (usually `|this| this as Arc<dyn Trait>`).
    pub fn implements<U: ?Sized + Send + Sync + 'static>(
        mut self,
        name: impl Into<Identifier>,
        cast: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let interface = name.clone();
        let view: ViewFn<T> = Arc::new(move |builder: InstanceBuilder<T>| {
            let view = cast(builder.object().clone());
            builder.implements::<U>(interface.clone(), view)
        });
        self.views.push((name, view));
        self
    }

    /// Declares a hook that can be named as an after-build method. Hooks
    /// run on the freshly constructed value, before it is shared.
    pub fn after_build<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    /// Declares an instance method callable through the container.
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let class = self.name.clone();
        let context = format!("{class}::{name}()");
        let erased: MethodFn = Arc::new(move |instance: &Instance| {
            let this = instance.get::<T>().ok_or_else(|| Error::TypeMismatch {
                id: class.clone(),
                expected: std::any::type_name::<T>(),
                actual: instance.class().to_string(),
            })?;
            method(&this).map_err(|source| from_user(&context, source))
        });
        self.methods.insert(name, erased);
        self
    }

    /// Declares a static method callable through the container.
    pub fn static_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Container) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let method = erase_static(&self.name, &name, method);
        self.static_methods.insert(name, method);
        self
    }

    pub fn into_descriptor(self) -> ClassDescriptor {
        self.into()
    }
}

impl<T: Any + Send + Sync + Default> ClassDefinition<T> {
    /// Uses `T::default()` as the constructor.
    pub fn default_constructor(self) -> Self {
        self.constructor(|_| Ok(T::default()))
    }
}

impl<T: Any + Send + Sync> From<ClassDefinition<T>> for ClassDescriptor {
    fn from(definition: ClassDefinition<T>) -> Self {
        let ClassDefinition {
            name,
            visibility,
            parameters,
            constructor,
            views,
            hooks,
            methods,
            static_methods,
        } = definition;

        let interfaces: Vec<Identifier> = views.iter().map(|(name, _)| name.clone()).collect();
        let class = name.clone();
        let views: Vec<ViewFn<T>> = views.into_iter().map(|(_, view)| view).collect();

        let method_table = methods.clone();

        let constructor = constructor.map(|construct| {
            let erased: InstantiateFn = Arc::new(move |arguments: Arguments, after_build: &[String]| {
                let mut object = construct(&arguments)
                    .map_err(|source| from_user(&format!("{class}::__construct()"), source))?;

                let mut plain_methods = Vec::new();
                for hook_name in after_build {
                    match hooks.get(hook_name) {
                        Some(hook) => hook(&mut object)
                            .map_err(|source| from_user(&format!("{class}::{hook_name}()"), source))?,
                        None => plain_methods.push(hook_name),
                    }
                }

                let instance = views
                    .iter()
                    .fold(Instance::builder(class.clone(), Arc::new(object)), |builder, view| view(builder))
                    .build();

                // Names that are not hooks may still be plain methods,
                // called once the value is shared.
                for method_name in plain_methods {
                    let method = method_table.get(method_name.as_str()).ok_or_else(|| Error::UnknownMethod {
                        class: class.clone(),
                        method: method_name.clone(),
                    })?;
                    method(&instance)?;
                }

                Ok(instance)
            });
            erased
        });

        ClassDescriptor {
            name,
            kind: ClassKind::Class,
            visibility,
            parameters,
            interfaces,
            constructor,
            methods,
            static_methods,
        }
    }
}

fn erase_static<F>(class: &Identifier, name: &str, method: F) -> StaticMethodFn
where
    F: Fn(&Container) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
{
    let context = format!("{class}::{name}()");
    Arc::new(move |container: &Container| method(container).map_err(|source| from_user(&context, source)))
}

/// Wraps an error returned by user code, keeping argument errors intact.
fn from_user(context: &str, source: BoxError) -> Error {
    match source.downcast::<ArgumentError>() {
        Ok(argument) => Error::Argument(*argument),
        Err(source) => Error::construction(context, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Shape: Send + Sync {
        fn sides(&self) -> usize;
    }

    #[derive(Default)]
    struct Polygon {
        sides: usize,
        initialised: AtomicUsize,
    }

    impl Shape for Polygon {
        fn sides(&self) -> usize {
            self.sides
        }
    }

    fn polygon() -> ClassDescriptor {
        ClassDescriptor::class::<Polygon>("Polygon")
            .parameter(ParameterDescriptor::typed("sides", "int").with_default(3))
            .constructor(|args| {
                Ok(Polygon {
                    sides: args.int(0)? as usize,
                    ..Polygon::default()
                })
            })
            .implements::<dyn Shape>("Shape", |this| this as Arc<dyn Shape>)
            .after_build("double", |this| {
                this.sides *= 2;
                Ok(())
            })
            .method("touch", |this| {
                Ok(Value::from(this.initialised.fetch_add(1, Ordering::SeqCst) as i64 + 1))
            })
            .into_descriptor()
    }

    #[test]
    fn instantiate_exposes_interface_views() {
        let descriptor = polygon();
        let instance = descriptor
            .instantiate(Arguments::new(vec![Value::from(4)]), &[])
            .unwrap();

        assert_eq!(instance.class().as_str(), "Polygon");
        assert_eq!(instance.get::<dyn Shape>().unwrap().sides(), 4);
        assert!(instance.is_instance_of("Shape"));
    }

    #[test]
    fn hooks_run_before_methods_in_declared_order() {
        let descriptor = polygon();
        let instance = descriptor
            .instantiate(
                Arguments::new(vec![Value::from(5)]),
                &["double".to_string(), "touch".to_string()],
            )
            .unwrap();

        let polygon = instance.get::<Polygon>().unwrap();
        assert_eq!(polygon.sides, 10);
        assert_eq!(polygon.initialised.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_after_build_name_fails() {
        let err = polygon()
            .instantiate(Arguments::new(vec![Value::from(3)]), &["explode".to_string()])
            .unwrap_err();

        assert!(matches!(err, Error::UnknownMethod { ref method, .. } if method == "explode"));
    }

    #[test]
    fn constructor_argument_errors_stay_argument_errors() {
        let err = polygon()
            .instantiate(Arguments::new(vec![Value::from("many")]), &[])
            .unwrap_err();

        assert!(matches!(err, Error::Argument(ArgumentError::Mismatch { index: 0, .. })));
    }

    #[test]
    fn methods_are_callable_on_instances() {
        let descriptor = polygon();
        let instance = descriptor.instantiate(Arguments::new(vec![Value::from(3)]), &[]).unwrap();

        let touch = descriptor.method("touch").unwrap();
        assert_eq!(touch(&instance).unwrap().as_int(), Some(1));
        assert_eq!(touch(&instance).unwrap().as_int(), Some(2));
        assert!(descriptor.method("missing").is_none());
    }

    #[test]
    fn interfaces_are_not_instantiable() {
        let interface = ClassDescriptor::interface("Shape");

        assert_eq!(interface.kind(), ClassKind::Interface);
        assert!(!interface.is_instantiable());
        assert!(matches!(
            interface.instantiate(Arguments::default(), &[]),
            Err(Error::NotInstantiable { .. })
        ));
    }

    #[test]
    fn private_constructor_is_recorded() {
        let descriptor = ClassDescriptor::class::<Polygon>("Polygon")
            .default_constructor()
            .visibility(Visibility::Private)
            .into_descriptor();

        assert!(descriptor.is_instantiable());
        assert_eq!(descriptor.visibility(), Visibility::Private);
    }
}
