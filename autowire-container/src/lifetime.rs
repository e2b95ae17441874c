//! Binding lifetimes.
//!
//! A lifetime decides whether a binding is rebuilt on every resolution:
//! - [`Lifetime::Transient`]: new value every time
//! - [`Lifetime::Singleton`]: built once, then cached in the binding itself
use std::fmt;

/// Defines how long a resolved value lives inside the container.
///
/// # Examples
/// ```
/// use autowire_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton.is_shared());
/// assert!(!Lifetime::Transient.is_shared());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// New value built on every resolve call.
    ///
    /// Never cached. Each `get()` runs the binding's builder again.
    #[default]
    Transient,

    /// One value shared by every resolution.
    ///
    /// Built on first resolve; the binding entry then holds the value
    /// itself until the id is re-bound or unbound.
    Singleton,
}

impl Lifetime {
    /// Returns `true` if values of this lifetime are cached.
    #[inline]
    pub fn is_shared(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => write!(f, "Transient"),
            Lifetime::Singleton => write!(f, "Singleton"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_default_is_transient() {
        assert_eq!(Lifetime::default(), Lifetime::Transient);
    }

    #[test]
    fn lifetime_is_shared() {
        assert!(Lifetime::Singleton.is_shared());
        assert!(!Lifetime::Transient.is_shared());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(format!("{}", Lifetime::Singleton), "Singleton");
        assert_eq!(format!("{}", Lifetime::Transient), "Transient");
    }
}
