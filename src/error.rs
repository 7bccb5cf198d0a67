//! Error types for container resolution

use thiserror::Error;

/// Boxed error type accepted from provider factories and constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by container resolution.
///
/// All failures are immediately fatal to the triggering resolution call;
/// the container itself stays usable afterwards.
#[derive(Error, Debug)]
pub enum InjectError {
    /// The dependency graph contains at least one cycle. Detected before any
    /// constructor or factory runs; carries every cycle as an ordered chain
    /// of key names.
    #[error("found cycle dependencies in: {}", format_cycles(.cycles))]
    CircularDependency {
        /// Each cycle as the ordered list of key names on it.
        cycles: Vec<Vec<String>>,
    },

    /// The key has no registered provider, no registered type descriptor,
    /// and no stored instance.
    #[error("no provider found for key '{key}'")]
    ProviderNotFound {
        /// Display name of the missing key.
        key: String,
    },

    /// A provider factory or constructor returned an error.
    #[error("construction of '{type_name}' failed: {source}")]
    Construction {
        /// Display name of the key being constructed.
        type_name: String,
        /// The upstream error, unmodified.
        #[source]
        source: BoxError,
    },

    /// Assigning a resolved property onto an instance failed. The
    /// partially-initialized instance stays cached; see the crate docs.
    #[error("property injection '{type_name}.{property}' failed: {source}")]
    PropertyInjection {
        /// Display name of the owning type's key.
        type_name: String,
        /// Declared property name.
        property: &'static str,
        /// The upstream error, unmodified.
        #[source]
        source: BoxError,
    },

    /// A resolved instance could not be downcast to the requested type.
    #[error("instance for '{key}' is not a '{expected}'")]
    TypeMismatch {
        /// Display name of the resolved key.
        key: String,
        /// The requested Rust type.
        expected: &'static str,
    },
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut chain = cycle.clone();
            if let Some(first) = cycle.first() {
                chain.push(first.clone());
            }
            chain.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, InjectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = InjectError::CircularDependency {
            cycles: vec![vec!["A".into(), "B".into()]],
        };
        assert_eq!(err.to_string(), "found cycle dependencies in: A -> B -> A");
    }

    #[test]
    fn test_multiple_cycles_are_enumerated() {
        let err = InjectError::CircularDependency {
            cycles: vec![vec!["A".into(), "B".into()], vec!["C".into()]],
        };
        let msg = err.to_string();
        assert!(msg.contains("A -> B -> A"));
        assert!(msg.contains("C -> C"));
        assert!(msg.contains(" | "));
    }

    #[test]
    fn test_not_found_names_the_key() {
        let err = InjectError::ProviderNotFound {
            key: "logger".into(),
        };
        assert_eq!(err.to_string(), "no provider found for key 'logger'");
    }

    #[test]
    fn test_construction_preserves_source() {
        let err = InjectError::Construction {
            type_name: "Database".into(),
            source: "connection refused".into(),
        };
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
