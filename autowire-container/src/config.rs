//! Container-wide policy settings.

use serde::{Deserialize, Serialize};

/// Settings that change how a [`Container`](crate::container::Container)
/// resolves identifiers nobody bound explicitly.
///
/// Deserializable, so it can be loaded from the application's own config
/// file; missing fields fall back to their defaults.
///
/// # Examples
/// ```
/// use autowire_container::config::ContainerConfig;
///
/// let config = ContainerConfig::default();
/// assert!(!config.resolve_unbound_as_singleton);
/// assert_eq!(config.max_suggestions, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Cache classes that are autowired without a binding as singletons
    /// after their first build.
    pub resolve_unbound_as_singleton: bool,

    /// How many "did you mean?" candidates a not-found error lists.
    pub max_suggestions: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            resolve_unbound_as_singleton: false,
            max_suggestions: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial_config() {
        let config: ContainerConfig =
            serde_json::from_str(r#"{ "resolve_unbound_as_singleton": true }"#).unwrap();

        assert!(config.resolve_unbound_as_singleton);
        assert_eq!(config.max_suggestions, 3);
    }

    #[test]
    fn serialize_round_trip_keeps_fields() {
        let config = ContainerConfig {
            resolve_unbound_as_singleton: true,
            max_suggestions: 0,
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"max_suggestions\":0"));
    }
}
