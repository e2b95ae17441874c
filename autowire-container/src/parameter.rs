//! Constructor parameter inspection.
//!
//! A [`ParameterDescriptor`] is what a class declares about one
//! constructor parameter: its name, its type hint and its default.
//! [`Parameter::inspect`] classifies it into a [`ParameterType`] the
//! resolver can act on:
//!
//! | hint | classification |
//! |---|---|
//! | none | [`ParameterType::Untyped`] |
//! | `string`, `int`, `bool`, … | [`ParameterType::Scalar`] |
//! | two or more types | [`ParameterType::Union`] |
//! | any other single name | [`ParameterType::Class`] |
//!
//! Only `Class` parameters are ever autowired; the others can only be
//! satisfied by a build argument, a contextual binding or their default.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::descriptor::ClassDescriptor;
use crate::error::{Error, Result, UnresolvableParameterError};
use crate::id::Identifier;
use crate::value::Value;

/// Declared type of a constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeHint {
    /// A single type: `Logger`, `string`.
    Named(Identifier),
    /// A single type that also accepts null: `?Logger`.
    Nullable(Identifier),
    /// Several types: `int|string`, `Logger|null`.
    Union(Vec<Identifier>),
}

/// What a class declares about one constructor parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    name: String,
    hint: Option<TypeHint>,
    default: Option<Value>,
}

impl ParameterDescriptor {
    /// An untyped parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: None,
            default: None,
        }
    }

    /// A parameter with a single type hint.
    pub fn typed(name: impl Into<String>, ty: impl Into<Identifier>) -> Self {
        Self::new(name).with_hint(TypeHint::Named(ty.into()))
    }

    /// A parameter with a nullable single type hint.
    pub fn nullable(name: impl Into<String>, ty: impl Into<Identifier>) -> Self {
        Self::new(name).with_hint(TypeHint::Nullable(ty.into()))
    }

    /// A parameter with a union type hint.
    pub fn union<I, T>(name: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        Self::new(name).with_hint(TypeHint::Union(types.into_iter().map(Into::into).collect()))
    }

    pub fn with_hint(mut self, hint: TypeHint) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Declares a default value, making the parameter optional.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn hint(&self) -> Option<&TypeHint> {
        self.hint.as_ref()
    }

    #[inline]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Built-in value types that can never be autowired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    String,
    Int,
    Bool,
    Float,
    Array,
    Callable,
    Iterable,
    Mixed,
}

impl Scalar {
    /// Recognises a scalar type name.
    pub fn parse(name: &str) -> Option<Self> {
        let scalar = match name {
            "string" => Scalar::String,
            "int" => Scalar::Int,
            "bool" => Scalar::Bool,
            "float" => Scalar::Float,
            "array" => Scalar::Array,
            "callable" => Scalar::Callable,
            "iterable" => Scalar::Iterable,
            "mixed" => Scalar::Mixed,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scalar::String => "string",
            Scalar::Int => "int",
            Scalar::Bool => "bool",
            Scalar::Float => "float",
            Scalar::Array => "array",
            Scalar::Callable => "callable",
            Scalar::Iterable => "iterable",
            Scalar::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a parameter's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    Untyped,
    Scalar(Scalar),
    Union(Vec<Identifier>),
    /// A class, interface or enum name.
    Class(Identifier),
}

/// An inspected constructor parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    position: usize,
    ty: ParameterType,
    nullable: bool,
    default: Option<Value>,
}

impl Parameter {
    /// Classifies the parameter declared at `position`.
    pub fn inspect(position: usize, descriptor: &ParameterDescriptor) -> Self {
        let (ty, nullable) = match descriptor.hint() {
            None => (ParameterType::Untyped, true),
            Some(TypeHint::Named(name)) => (classify(name), false),
            Some(TypeHint::Nullable(name)) => (classify(name), true),
            Some(TypeHint::Union(types)) => {
                let nullable = types.iter().any(|t| t.as_str() == "null");
                match types.as_slice() {
                    [single] => (classify(single), nullable),
                    _ => (ParameterType::Union(types.clone()), nullable),
                }
            }
        };

        Self {
            name: descriptor.name().to_string(),
            position,
            ty,
            nullable,
            default: descriptor.default().cloned(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn ty(&self) -> &ParameterType {
        &self.ty
    }

    /// Returns the class to autowire, or `None` for untyped, scalar and
    /// union parameters.
    pub fn class(&self) -> Option<&Identifier> {
        match &self.ty {
            ParameterType::Class(class) => Some(class),
            _ => None,
        }
    }

    /// A parameter is optional iff it declares a default.
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    #[inline]
    pub fn allows_null(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the default, or fails for a required parameter of `consumer`.
    pub fn default_or_fail(&self, consumer: &Identifier) -> Result<Value> {
        self.default.clone().ok_or_else(|| {
            Error::UnresolvableParameter(UnresolvableParameterError {
                class: consumer.clone(),
                parameter: self.breadcrumb(),
            })
        })
    }

    /// Renders the parameter as `<type> $<name>`.
    pub fn breadcrumb(&self) -> String {
        match self.type_label() {
            Some(label) => format!("{label} ${}", self.name),
            None => format!("${}", self.name),
        }
    }

    fn type_label(&self) -> Option<String> {
        let prefix = if self.nullable { "?" } else { "" };
        match &self.ty {
            ParameterType::Untyped => None,
            ParameterType::Scalar(scalar) => Some(format!("{prefix}{scalar}")),
            ParameterType::Class(class) => Some(format!("{prefix}{class}")),
            ParameterType::Union(types) => Some(
                types.iter().map(Identifier::as_str).collect::<Vec<_>>().join("|"),
            ),
        }
    }
}

fn classify(name: &Identifier) -> ParameterType {
    match Scalar::parse(name) {
        Some(scalar) => ParameterType::Scalar(scalar),
        None => ParameterType::Class(name.clone()),
    }
}

/// Caches inspected parameter lists per declaring class.
///
/// Entries remember which descriptor they were computed from, so a class
/// redefined in the catalog is inspected again.
#[derive(Default)]
pub struct ParameterInspector {
    cache: DashMap<Identifier, (Arc<ClassDescriptor>, Arc<[Parameter]>)>,
}

impl ParameterInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the inspected constructor parameters of `class`.
    pub fn parameters(&self, class: &Arc<ClassDescriptor>) -> Arc<[Parameter]> {
        if let Some(entry) = self.cache.get(class.name()) {
            let (described, parameters) = entry.value();
            if Arc::ptr_eq(described, class) {
                return parameters.clone();
            }
        }

        let parameters: Arc<[Parameter]> = class
            .parameters()
            .iter()
            .enumerate()
            .map(|(position, descriptor)| Parameter::inspect(position, descriptor))
            .collect();

        self.cache
            .insert(class.name().clone(), (class.clone(), parameters.clone()));
        parameters
    }

    /// Number of classes currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
