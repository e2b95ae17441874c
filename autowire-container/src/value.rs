//! Values handed out by the container.
//!
//! Everything the container can produce is a [`Value`]: a scalar, a list,
//! a callable wrapper, or an [`Instance`]: a shared, type-erased object
//! that remembers its class and the interfaces it was built to expose.
//!
//! # Views
//! Rust cannot downcast `Arc<dyn Any>` to a trait object, so an instance
//! stores one typed *view* per type it can be seen as: the concrete type
//! itself plus every interface declared for its class. [`Instance::get`]
//! looks the requested view up.
//!
//! ```
//! use std::sync::Arc;
//! use autowire_container::value::Instance;
//!
//! trait Greeter: Send + Sync { fn greet(&self) -> String; }
//! struct English;
//! impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
//!
//! let object = Arc::new(English);
//! let instance = Instance::builder("English", object.clone())
//!     .implements::<dyn Greeter>("Greeter", object)
//!     .build();
//!
//! assert!(instance.is_instance_of("Greeter"));
//! assert_eq!(instance.get::<dyn Greeter>().unwrap().greet(), "hello");
//! assert!(instance.get::<English>().is_some());
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use autowire_support::rendering::shorten_type_name;

use crate::callback::Invokable;
use crate::error::ArgumentError;
use crate::id::Identifier;

type View = Box<dyn Any + Send + Sync>;

struct InstanceInner {
    class: Identifier,
    object: Arc<dyn Any + Send + Sync>,
    interfaces: Vec<Identifier>,
    views: HashMap<TypeId, View>,
}

/// A shared object built by (or handed to) the container.
///
/// Cloning an instance clones the handle, not the object: clones are
/// [`same`](Instance::same) as the original.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl Instance {
    /// Wraps a value, using its Rust type name as the class.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Identifier::of::<T>(), Arc::new(value))
    }

    /// Wraps a value under an explicit class name.
    pub fn named<T: Any + Send + Sync>(class: impl Into<Identifier>, value: T) -> Self {
        Self::from_arc(class, Arc::new(value))
    }

    /// Wraps an already shared object under an explicit class name.
    pub fn from_arc<T: Any + Send + Sync>(class: impl Into<Identifier>, object: Arc<T>) -> Self {
        InstanceBuilder::new(class, object).build()
    }

    /// Starts an instance that also exposes interface views.
    pub fn builder<T: Any + Send + Sync>(
        class: impl Into<Identifier>,
        object: Arc<T>,
    ) -> InstanceBuilder<T> {
        InstanceBuilder::new(class, object)
    }

    /// Returns the class the object was built as.
    #[inline]
    pub fn class(&self) -> &Identifier {
        &self.inner.class
    }

    /// Returns the interface names the object was built to expose.
    #[inline]
    pub fn interfaces(&self) -> &[Identifier] {
        &self.inner.interfaces
    }

    /// Returns `true` if `name` is the object's class or one of its interfaces.
    pub fn is_instance_of(&self, name: &str) -> bool {
        self.inner.class.as_str() == name || self.inner.interfaces.iter().any(|i| i.as_str() == name)
    }

    /// Returns the object seen as `U`, if the instance carries that view.
    ///
    /// `U` is either the concrete type or a trait object declared with
    /// [`InstanceBuilder::implements`].
    pub fn get<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        self.inner
            .views
            .get(&TypeId::of::<Arc<U>>())
            .and_then(|view| view.downcast_ref::<Arc<U>>())
            .cloned()
    }

    /// Reference equality: both handles point at the same object.
    #[inline]
    pub fn same(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner.object, &other.inner.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", shorten_type_name(&self.inner.class))
    }
}

/// Assembles an [`Instance`] and its interface views.
pub struct InstanceBuilder<T> {
    class: Identifier,
    object: Arc<T>,
    interfaces: Vec<Identifier>,
    views: HashMap<TypeId, View>,
}

impl<T: Any + Send + Sync> InstanceBuilder<T> {
    pub fn new(class: impl Into<Identifier>, object: Arc<T>) -> Self {
        let mut views: HashMap<TypeId, View> = HashMap::new();
        views.insert(TypeId::of::<Arc<T>>(), Box::new(object.clone()));

        Self {
            class: class.into(),
            object,
            interfaces: Vec::new(),
            views,
        }
    }

    /// Returns the concrete object being wrapped.
    #[inline]
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Declares that the object implements `interface`, reachable as `U`.
    pub fn implements<U: ?Sized + Send + Sync + 'static>(
        mut self,
        interface: impl Into<Identifier>,
        view: Arc<U>,
    ) -> Self {
        self.views.insert(TypeId::of::<Arc<U>>(), Box::new(view));
        self.interfaces.push(interface.into());
        self
    }

    pub fn build(self) -> Instance {
        let object: Arc<dyn Any + Send + Sync> = self.object;
        Instance {
            inner: Arc::new(InstanceInner {
                class: self.class,
                object,
                interfaces: self.interfaces,
                views: self.views,
            }),
        }
    }
}

/// Anything the container can produce.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Instance),
    Callable(Invokable),
}

impl Value {
    /// Wraps a Rust value as an object named after its type.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Instance::new(value))
    }

    /// Host-style type label used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "string".into(),
            Value::List(_) => "array".into(),
            Value::Object(instance) => instance.class().to_string(),
            Value::Callable(_) => "callable".into(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Invokable> {
        match self {
            Value::Callable(invokable) => Some(invokable),
            _ => None,
        }
    }

    /// Returns the object seen as `U`; `None` for non-objects or missing views.
    pub fn downcast<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        self.as_object()?.get::<U>()
    }

    /// Reference equality for objects and callables; `false` otherwise.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.same(b),
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(instance) => write!(f, "{instance:?}"),
            Value::Callable(invokable) => write!(f, "{invokable:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Object(instance)
    }
}

impl From<Invokable> for Value {
    fn from(invokable: Invokable) -> Self {
        Value::Callable(invokable)
    }
}

/// Resolved constructor arguments, in parameter order.
///
/// Handed to the constructor closure of a
/// [`ClassDefinition`](crate::descriptor::ClassDefinition).
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Returns the raw value at `index`.
    pub fn value(&self, index: usize) -> Result<&Value, ArgumentError> {
        self.values.get(index).ok_or(ArgumentError::Missing { index })
    }

    /// Returns the object at `index` seen as `U`.
    pub fn object<U: ?Sized + 'static>(&self, index: usize) -> Result<Arc<U>, ArgumentError> {
        let value = self.value(index)?;
        value.downcast::<U>().ok_or_else(|| mismatch(index, type_name::<U>(), value))
    }

    /// Like [`object`](Arguments::object), but `null` becomes `None`.
    pub fn optional<U: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<U>>, ArgumentError> {
        match self.value(index)? {
            Value::Null => Ok(None),
            _ => self.object::<U>(index).map(Some),
        }
    }

    pub fn string(&self, index: usize) -> Result<String, ArgumentError> {
        let value = self.value(index)?;
        value.as_str().map(str::to_string).ok_or_else(|| mismatch(index, "string", value))
    }

    pub fn int(&self, index: usize) -> Result<i64, ArgumentError> {
        let value = self.value(index)?;
        value.as_int().ok_or_else(|| mismatch(index, "int", value))
    }

    pub fn float(&self, index: usize) -> Result<f64, ArgumentError> {
        let value = self.value(index)?;
        value.as_float().ok_or_else(|| mismatch(index, "float", value))
    }

    pub fn bool(&self, index: usize) -> Result<bool, ArgumentError> {
        let value = self.value(index)?;
        value.as_bool().ok_or_else(|| mismatch(index, "bool", value))
    }

    pub fn list(&self, index: usize) -> Result<Vec<Value>, ArgumentError> {
        let value = self.value(index)?;
        value.as_list().map(<[Value]>::to_vec).ok_or_else(|| mismatch(index, "array", value))
    }
}

fn mismatch(index: usize, expected: &str, actual: &Value) -> ArgumentError {
    ArgumentError::Mismatch {
        index,
        expected: shorten_type_name(expected),
        actual: actual.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn area(&self) -> f64;
    }

    #[derive(Debug)]
    struct Square(f64);

    impl Shape for Square {
        fn area(&self) -> f64 {
            self.0 * self.0
        }
    }

    fn square(side: f64) -> Instance {
        let object = Arc::new(Square(side));
        Instance::builder("Square", object.clone())
            .implements::<dyn Shape>("Shape", object)
            .build()
    }

    #[test]
    fn instance_exposes_concrete_and_interface_views() {
        let instance = square(3.0);

        assert_eq!(instance.get::<Square>().unwrap().0, 3.0);
        assert_eq!(instance.get::<dyn Shape>().unwrap().area(), 9.0);
        assert!(instance.get::<String>().is_none());
    }

    #[test]
    fn instance_of_checks_class_and_interfaces() {
        let instance = square(1.0);

        assert!(instance.is_instance_of("Square"));
        assert!(instance.is_instance_of("Shape"));
        assert!(!instance.is_instance_of("Circle"));
    }

    #[test]
    fn clones_are_the_same_object() {
        let a = square(2.0);
        let b = a.clone();
        let c = square(2.0);

        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    #[test]
    fn value_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::from(1).type_name(), "int");
        assert_eq!(Value::Object(square(1.0)).type_name(), "Square");
    }

    #[test]
    fn arguments_typed_access() {
        let args = Arguments::new(vec![
            Value::Object(square(2.0)),
            Value::from("smtp.local"),
            Value::from(25),
            Value::Null,
        ]);

        assert_eq!(args.object::<dyn Shape>(0).unwrap().area(), 4.0);
        assert_eq!(args.string(1).unwrap(), "smtp.local");
        assert_eq!(args.int(2).unwrap(), 25);
        assert_eq!(args.float(2).unwrap(), 25.0);
        assert!(args.optional::<dyn Shape>(3).unwrap().is_none());
    }

    #[test]
    fn arguments_report_missing_and_mismatch() {
        let args = Arguments::new(vec![Value::from("text")]);

        assert!(matches!(args.int(0), Err(ArgumentError::Mismatch { index: 0, .. })));
        assert!(matches!(args.string(4), Err(ArgumentError::Missing { index: 4 })));

        let err = args.object::<Square>(0).unwrap_err();
        assert_eq!(err.to_string(), "Argument #0 is string, expected Square");
    }
}
