//! Unified error handling for the navigation core.
//!
//! Every failure in this crate is recoverable at the session boundary:
//! callers decide whether to retry, keep a stale route, or surface the
//! error to the user.

use thiserror::Error;

/// Unified error type for navigation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// Directions API call failed, timed out, or returned no route
    #[error("{}", route_unavailable_message(.message, .status_code))]
    RouteUnavailable {
        message: String,
        status_code: Option<u16>,
    },
    /// Route geometry is malformed
    #[error("Invalid route ({point_count} points, minimum {minimum_required} required): {message}")]
    InvalidRoute {
        point_count: usize,
        minimum_required: usize,
        message: String,
    },
    /// Position source reported an error
    #[error("Position unavailable: {message}")]
    PositionUnavailable { message: String },
    /// Speech output failed (non-fatal)
    #[error("Narration failed: {message}")]
    NarrationFailure { message: String },
    /// Coordinates outside WGS84 range or not finite
    #[error("Invalid coordinates: {message}")]
    InvalidCoordinates { message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
    /// Operation not allowed in the session's current state
    #[error("Cannot {action} while session is {from}")]
    InvalidTransition { from: String, action: String },
}

fn route_unavailable_message(message: &str, status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!("Route unavailable (HTTP {}): {}", code, message),
        None => format!("Route unavailable: {}", message),
    }
}

impl NavError {
    pub(crate) fn route_unavailable(message: impl Into<String>) -> Self {
        NavError::RouteUnavailable {
            message: message.into(),
            status_code: None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        NavError::ConfigError {
            message: message.into(),
        }
    }
}

/// Result type alias for navigation operations.
pub type Result<T> = std::result::Result<T, NavError>;

/// Extension trait for converting Option to NavError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid route error.
    fn ok_or_invalid_route(self, point_count: usize, message: &str) -> Result<T>;

    /// Convert Option to Result with a route unavailable error.
    fn ok_or_route_unavailable(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_route(self, point_count: usize, message: &str) -> Result<T> {
        self.ok_or_else(|| NavError::InvalidRoute {
            point_count,
            minimum_required: 2,
            message: message.to_string(),
        })
    }

    fn ok_or_route_unavailable(self, message: &str) -> Result<T> {
        self.ok_or_else(|| NavError::route_unavailable(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NavError::InvalidRoute {
            point_count: 1,
            minimum_required: 2,
            message: "empty geometry".to_string(),
        };
        assert!(err.to_string().contains("1 points"));
        assert!(err.to_string().contains("empty geometry"));

        let err = NavError::RouteUnavailable {
            message: "forbidden".to_string(),
            status_code: Some(403),
        };
        assert_eq!(err.to_string(), "Route unavailable (HTTP 403): forbidden");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_invalid_route(0, "no geometry"),
            Err(NavError::InvalidRoute { point_count: 0, .. })
        ));
        assert!(matches!(
            None::<i32>.ok_or_route_unavailable("no routes"),
            Err(NavError::RouteUnavailable { status_code: None, .. })
        ));
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(NavError::config("bad").to_string(), "Configuration error: bad");
    }
}
