//! Binding identifiers.
//!
//! An [`Identifier`] names an entry in the container: an interface or
//! class name from the [`Catalog`](crate::catalog::Catalog), or an
//! arbitrary slug such as `"mailer.transport"`.

use std::any::type_name;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Uniquely identifies a binding, a class or a parameter in the container.
///
/// Cloning is cheap (the text is reference counted). Because it
/// dereferences to `str`, maps keyed by `Identifier` can be queried
/// with a plain `&str`.
///
/// # Examples
/// ```
/// use autowire_container::id::Identifier;
///
/// let id = Identifier::from("App\\Mailer");
/// assert_eq!(id.as_str(), "App\\Mailer");
///
/// // Parameter tokens start with `$`
/// let host = Identifier::parameter("host");
/// assert!(host.is_parameter());
/// assert_eq!(host.as_str(), "$host");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Creates an identifier from any string.
    #[inline]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Creates an identifier from a Rust type's name.
    ///
    /// ```
    /// use autowire_container::id::Identifier;
    ///
    /// let id = Identifier::of::<String>();
    /// assert_eq!(id.as_str(), "alloc::string::String");
    /// ```
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::from(type_name::<T>()))
    }

    /// Creates the `$name` token used to target a constructor parameter
    /// by name in contextual bindings.
    #[inline]
    pub fn parameter(name: &str) -> Self {
        Self(Arc::from(format!("${name}")))
    }

    /// Returns `true` for `$name` parameter tokens.
    #[inline]
    pub fn is_parameter(&self) -> bool {
        self.0.starts_with('$')
    }

    /// Returns the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier quoted the way breadcrumbs show it.
    #[inline]
    pub fn quoted(&self) -> String {
        format!("'{}'", self.0)
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&String> for Identifier {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl From<&Identifier> for Identifier {
    fn from(id: &Identifier) -> Self {
        id.clone()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:?})", &*self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MyStruct;

    #[test]
    fn id_of_type() {
        let id = Identifier::of::<MyStruct>();
        assert!(id.contains("MyStruct"));
        assert!(!id.is_parameter());
    }

    #[test]
    fn id_equality_same_text() {
        assert_eq!(Identifier::from("mailer"), Identifier::from(String::from("mailer")));
    }

    #[test]
    fn id_inequality_different_text() {
        assert_ne!(Identifier::from("mailer"), Identifier::from("Mailer"));
    }

    #[test]
    fn parameter_token() {
        let id = Identifier::parameter("host");
        assert!(id.is_parameter());
        assert_eq!(id.to_string(), "$host");
        assert_eq!(id.quoted(), "'$host'");
    }

    #[test]
    fn id_in_hashmap_queried_by_str() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Identifier::from("App\\Logger"), "logger");
        map.insert(Identifier::from("App\\Mailer"), "mailer");
        assert_eq!(map.get("App\\Logger"), Some(&"logger"));
        assert_eq!(map.get("App\\Queue"), None);
    }

    #[test]
    fn unsized_type_id() {
        trait MyTrait {}
        let id = Identifier::of::<dyn MyTrait>();
        assert!(id.contains("MyTrait"));
    }
}
