//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::BuildError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &BuildError) -> String {
    match e {
        BuildError::ConfigError(msg) => format!("Configuration error: {}", msg),
        BuildError::RequiredUnitFailed { unit, source } => {
            format!("Required unit '{}' could not be imported: {}", unit, source)
        }
        other => other.to_string(),
    }
}
